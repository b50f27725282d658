use crate::error::{Error, Result};
use calamine::{open_workbook, Data, Range, Reader, Xls, Xlsx};
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Rows of display strings read from the first sheet of an input file.
///
/// Rows may have different lengths. Empty cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Wraps already materialized rows.
    #[must_use]
    pub const fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Returns the rows in input order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of cells across all rows.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

impl From<Vec<Vec<String>>> for RawTable {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self::new(rows)
    }
}

/// Tabular formats accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Office Open XML workbook
    Xlsx,
    /// Legacy BIFF workbook
    Xls,
    /// Comma separated values
    Csv,
}

impl TableFormat {
    /// Detects the format from the file extension, ignoring case.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Returns all accepted extensions.
    #[must_use]
    pub const fn extensions() -> &'static [&'static str] {
        &["xlsx", "xls", "csv"]
    }
}

/// Reads the first sheet of `path` into a [`RawTable`].
///
/// # Errors
///
/// Returns [`Error::UnreadableFile`] if the extension is not supported,
/// the file cannot be opened, or its contents are not valid for the format.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let format = TableFormat::from_path(path).ok_or_else(|| {
        Error::unreadable(
            path,
            format!(
                "unsupported file type (expected one of: {})",
                TableFormat::extensions().join(", ")
            ),
        )
    })?;

    let table = match format {
        TableFormat::Xlsx => read_workbook::<Xlsx<_>>(path)?,
        TableFormat::Xls => read_workbook::<Xls<_>>(path)?,
        TableFormat::Csv => read_csv(path)?,
    };

    debug!(
        "Read {} rows ({} cells) from {} as {:?}",
        table.len(),
        table.cell_count(),
        path.display(),
        format
    );

    Ok(table)
}

fn read_workbook<R>(path: &Path) -> Result<RawTable>
where
    R: Reader<BufReader<File>>,
    R::Error: Display,
{
    let mut workbook: R =
        open_workbook(path).map_err(|e: R::Error| Error::unreadable(path, e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::unreadable(path, "workbook contains no sheets"))?
        .map_err(|e| Error::unreadable(path, e.to_string()))?;

    Ok(range_to_table(&range))
}

fn range_to_table(range: &Range<Data>) -> RawTable {
    range
        .rows()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect::<Vec<Vec<String>>>()
        .into()
}

fn read_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::unreadable(path, e.to_string()))?;

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| Error::unreadable(path, e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .collect(),
        );
    }

    Ok(RawTable::new(rows))
}
