/// Flattening of nested JSON records into table rows.
///
/// A [`Schema`] says which top-level fields are scalars and which are
/// nested objects (with their child keys). Nested field `home_team` with
/// child `full_name` becomes column `home_team_full_name`; the parent
/// object never survives as a column. Every record is checked against the
/// schema, so a record whose shape drifts is reported instead of silently
/// producing wrong columns.
use crate::{Cell, Table};
use log::warn;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    /// Child keys, in column order.
    Nested(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub shape: FieldShape,
}

/// Ordered description of a record's top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(mut self, name: &str) -> Self {
        self.fields.push(Field { name: name.to_owned(), shape: FieldShape::Scalar });
        self
    }

    pub fn nested<I, S>(mut self, name: &str, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let children = children.into_iter().map(Into::into).collect();
        self.fields.push(Field { name: name.to_owned(), shape: FieldShape::Nested(children) });
        self
    }

    /// Declared layout of a game record from the public games endpoint.
    pub fn games() -> Self {
        const TEAM: [&str; 7] =
            ["id", "abbreviation", "city", "conference", "division", "full_name", "name"];
        Schema::new()
            .scalar("id")
            .scalar("date")
            .nested("home_team", TEAM)
            .scalar("home_team_score")
            .scalar("period")
            .scalar("postseason")
            .scalar("season")
            .scalar("status")
            .scalar("time")
            .nested("visitor_team", TEAM)
            .scalar("visitor_team_score")
    }

    /// Derive a schema from one record: object-valued fields are nested,
    /// everything else is scalar. Field and child order follow the record.
    pub fn infer(record: &Map<String, Value>) -> Self {
        let fields = record
            .iter()
            .map(|(name, value)| {
                let shape = match value {
                    Value::Object(obj) => FieldShape::Nested(obj.keys().cloned().collect()),
                    _ => FieldShape::Scalar,
                };
                Field { name: name.clone(), shape }
            })
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flattened column names: scalars keep their name, nested children
    /// become `<parent>_<child>` in the parent's position.
    pub fn column_names(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for field in &self.fields {
            match &field.shape {
                FieldShape::Scalar => columns.push(field.name.clone()),
                FieldShape::Nested(children) => {
                    columns.extend(children.iter().map(|c| format!("{}_{c}", field.name)));
                }
            }
        }
        columns
    }
}

/// What to do when a record does not match the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShapePolicy {
    /// Abort with a [`ShapeError`].
    #[default]
    Strict,
    /// Write nulls for the offending cells, drop undeclared fields, log a warning.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// A nested field holds something other than an object.
    NotAnObject,
    /// A scalar field (or nested child) holds an object.
    UnexpectedObject,
    MissingField,
    UndeclaredField,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKind::NotAnObject => f.write_str("is not an object"),
            MismatchKind::UnexpectedObject => f.write_str("holds an object where a scalar was expected"),
            MismatchKind::MissingField => f.write_str("is missing"),
            MismatchKind::UndeclaredField => f.write_str("is not declared by the schema"),
        }
    }
}

/// A record that does not match the schema. `field` uses `parent.child`
/// for nested children; `row` is the index within the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    pub page: u32,
    pub row: usize,
    pub field: String,
    pub kind: MismatchKind,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} row {}: field `{}` {}", self.page, self.row, self.field, self.kind)
    }
}

impl std::error::Error for ShapeError {}

/// Flatten one page of records against `schema`, preserving record order.
pub fn flatten_page(
    records: &[Map<String, Value>],
    schema: &Schema,
    page: u32,
    policy: ShapePolicy,
) -> Result<Table, ShapeError> {
    let mut table = Table::new(schema.column_names());
    for (row, record) in records.iter().enumerate() {
        let checker = ShapeChecker { page, row, policy };
        table.push_row(flatten_record(record, schema, &checker)?);
    }
    Ok(table)
}

struct ShapeChecker {
    page: u32,
    row: usize,
    policy: ShapePolicy,
}

impl ShapeChecker {
    fn mismatch(&self, field: String, kind: MismatchKind) -> Result<(), ShapeError> {
        let err = ShapeError { page: self.page, row: self.row, field, kind };
        match self.policy {
            ShapePolicy::Strict => Err(err),
            ShapePolicy::Lenient => {
                warn!("{err}; continuing with nulls");
                Ok(())
            }
        }
    }
}

fn flatten_record(
    record: &Map<String, Value>,
    schema: &Schema,
    checker: &ShapeChecker,
) -> Result<Vec<Cell>, ShapeError> {
    let mut cells = Vec::new();

    for field in schema.fields() {
        let value = record.get(&field.name);
        match (&field.shape, value) {
            (FieldShape::Scalar, Some(Value::Object(_))) => {
                checker.mismatch(field.name.clone(), MismatchKind::UnexpectedObject)?;
                cells.push(Cell::Null);
            }
            (FieldShape::Scalar, Some(v)) => cells.push(Cell::from_json(v)),
            (FieldShape::Scalar, None) => {
                checker.mismatch(field.name.clone(), MismatchKind::MissingField)?;
                cells.push(Cell::Null);
            }
            (FieldShape::Nested(children), Some(Value::Object(obj))) => {
                for child in children {
                    let path = || format!("{}.{child}", field.name);
                    match obj.get(child) {
                        Some(Value::Object(_)) => {
                            checker.mismatch(path(), MismatchKind::UnexpectedObject)?;
                            cells.push(Cell::Null);
                        }
                        Some(v) => cells.push(Cell::from_json(v)),
                        None => {
                            checker.mismatch(path(), MismatchKind::MissingField)?;
                            cells.push(Cell::Null);
                        }
                    }
                }
                for key in obj.keys().filter(|k| !children.contains(k)) {
                    checker.mismatch(format!("{}.{key}", field.name), MismatchKind::UndeclaredField)?;
                }
            }
            (FieldShape::Nested(children), other) => {
                let kind = if other.is_some() {
                    MismatchKind::NotAnObject
                } else {
                    MismatchKind::MissingField
                };
                checker.mismatch(field.name.clone(), kind)?;
                cells.extend(std::iter::repeat_n(Cell::Null, children.len()));
            }
        }
    }

    for key in record.keys().filter(|k| schema.field(k).is_none()) {
        checker.mismatch(key.clone(), MismatchKind::UndeclaredField)?;
    }

    Ok(cells)
}
