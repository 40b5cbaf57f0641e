//! Reshaping of the flattened games table into the two analysis views.

pub mod east_west;
pub mod home;

use hoops_api::{Cell, Table};
use std::fmt;

pub const EAST: &str = "East";
pub const WEST: &str = "West";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    MissingColumn(String),
    /// `row` is the index in the input table.
    NotNumeric { column: String, row: usize },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::MissingColumn(name) => write!(f, "table has no column `{name}`"),
            AnalysisError::NotNumeric { column, row } => {
                write!(f, "column `{column}` holds a non-integer value at row {row}")
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

/// A column resolved once per call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Col<'a> {
    name: &'a str,
    index: usize,
}

impl<'a> Col<'a> {
    pub(crate) fn find(table: &Table, name: &'a str) -> Result<Self, AnalysisError> {
        table
            .column_index(name)
            .map(|index| Col { name, index })
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_owned()))
    }

    pub(crate) fn cell<'r>(&self, row: &'r [Cell]) -> &'r Cell {
        &row[self.index]
    }

    pub(crate) fn text<'r>(&self, row: &'r [Cell]) -> Option<&'r str> {
        self.cell(row).as_str()
    }

    pub(crate) fn int(&self, row: &[Cell], row_index: usize) -> Result<i64, AnalysisError> {
        self.opt_int(row, row_index)?.ok_or_else(|| self.not_numeric(row_index))
    }

    /// Like [`Col::int`], but a null cell is `None` rather than an error.
    pub(crate) fn opt_int(&self, row: &[Cell], row_index: usize) -> Result<Option<i64>, AnalysisError> {
        match self.cell(row) {
            Cell::Null => Ok(None),
            cell => cell.as_i64().map(Some).ok_or_else(|| self.not_numeric(row_index)),
        }
    }

    fn not_numeric(&self, row_index: usize) -> AnalysisError {
        AnalysisError::NotNumeric { column: self.name.to_owned(), row: row_index }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_is_reported_by_name() {
        let table = Table::new(vec!["id".into()]);
        let err = Col::find(&table, "home_team_score").unwrap_err();
        assert_eq!(err, AnalysisError::MissingColumn("home_team_score".into()));
        assert_eq!(err.to_string(), "table has no column `home_team_score`");
    }

    #[test]
    fn non_integer_cell_reports_position() {
        let table = Table::from_rows(vec!["score".into()], vec![vec![Cell::Null], vec![Cell::from("DNP")]]);
        let col = Col::find(&table, "score").unwrap();
        let err = col.int(&table.rows()[0], 0).unwrap_err();
        assert_eq!(err, AnalysisError::NotNumeric { column: "score".into(), row: 0 });
        let err = col.opt_int(&table.rows()[1], 1).unwrap_err();
        assert_eq!(err, AnalysisError::NotNumeric { column: "score".into(), row: 1 });
    }

    #[test]
    fn null_cell_is_absent_not_an_error() {
        let table = Table::from_rows(vec!["score".into()], vec![vec![Cell::Null], vec![Cell::Float(98.0)]]);
        let col = Col::find(&table, "score").unwrap();
        assert_eq!(col.opt_int(&table.rows()[0], 0), Ok(None));
        assert_eq!(col.opt_int(&table.rows()[1], 1), Ok(Some(98)));
    }
}
