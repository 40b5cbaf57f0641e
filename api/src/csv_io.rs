use crate::{Cell, Table};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum CsvError {
    Io(io::Error, PathBuf),
    Csv(csv::Error, PathBuf),
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsvError::Io(e, path) => write!(f, "I/O error for {}: {e}", path.display()),
            CsvError::Csv(e, path) => write!(f, "CSV error for {}: {e}", path.display()),
        }
    }
}

impl std::error::Error for CsvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CsvError::Io(e, _) => Some(e),
            CsvError::Csv(e, _) => Some(e),
        }
    }
}

impl Table {
    /// Write the table as comma-separated text with a header row and no
    /// index column. Parent directories are created; an existing file is
    /// replaced.
    pub fn write_csv(&self, path: &Path) -> Result<(), CsvError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CsvError::Io(e, parent.to_owned()))?;
        }
        let file = fs::File::create(path).map_err(|e| CsvError::Io(e, path.to_owned()))?;
        self.write_to(file).map_err(|e| CsvError::Csv(e, path.to_owned()))
    }

    /// Same bytes `write_csv` would put on disk.
    pub fn to_csv_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn write_to<W: io::Write>(&self, sink: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(sink);
        if !self.columns().is_empty() {
            writer.write_record(self.columns())?;
        }
        for row in self.rows() {
            writer.write_record(row.iter().map(Cell::to_string))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a table written by [`Table::write_csv`]. Types are inferred per
    /// column, see [`ColumnKind`].
    pub fn read_csv(path: &Path) -> Result<Table, CsvError> {
        let file = fs::File::open(path).map_err(|e| CsvError::Io(e, path.to_owned()))?;
        Self::read_from(file).map_err(|e| CsvError::Csv(e, path.to_owned()))
    }

    fn read_from<R: io::Read>(source: R) -> Result<Table, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        let kinds: Vec<ColumnKind> = (0..columns.len())
            .map(|i| ColumnKind::infer(records.iter().filter_map(|r| r.get(i))))
            .collect();
        let mut table = Table::new(columns);
        for record in &records {
            table.push_row(kinds.iter().zip(record.iter()).map(|(kind, raw)| kind.cell(raw)).collect());
        }
        Ok(table)
    }
}

/// What a whole CSV column holds. A column is numeric or boolean only when
/// every non-empty field is; otherwise every field, empty ones included,
/// is kept as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Empty,
    Number,
    Bool,
    Text,
}

impl ColumnKind {
    fn infer<'a>(fields: impl Iterator<Item = &'a str>) -> Self {
        let mut kind = ColumnKind::Empty;
        for raw in fields.filter(|raw| !raw.is_empty()) {
            let field = match Cell::parse(raw) {
                Cell::Int(_) | Cell::Float(_) => ColumnKind::Number,
                Cell::Bool(_) => ColumnKind::Bool,
                _ => return ColumnKind::Text,
            };
            kind = match kind {
                ColumnKind::Empty => field,
                k if k == field => k,
                _ => return ColumnKind::Text,
            };
        }
        kind
    }

    fn cell(self, raw: &str) -> Cell {
        match self {
            ColumnKind::Text => Cell::Text(raw.to_owned()),
            // Numbers stay per cell so `2` and `2.5` in one column reload as
            // Int and Float.
            _ => Cell::parse(raw),
        }
    }
}
