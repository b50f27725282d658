use crate::{
    config::Config,
    error::{Error, Result},
    record::ExtractionRecord,
};
use once_cell::sync::Lazy;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

const FILE_PREFIX: &str = "processed";
const FILE_EXTENSION: &str = "xlsx";

/// Header fill
const HEADER_FILL: u32 = 0x0036_6092;
/// Data row border
const BODY_BORDER: u32 = 0x00CC_CCCC;
/// Zebra stripe fill
const STRIPE_FILL: u32 = 0x00F2_F2F2;

/// Style shared by every generated workbook.
pub static STANDARD_STYLE: Lazy<SheetStyle> = Lazy::new(SheetStyle::standard);

/// A column of the output sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Header text
    pub title: &'static str,
    /// Width in character units
    pub width: f64,
}

/// Declarative description of how the output sheet looks.
///
/// The renderer applies it uniformly: one format for the header, one for
/// plain data rows and one for striped data rows.
#[derive(Debug, Clone)]
pub struct SheetStyle {
    /// Worksheet name
    pub sheet_name: &'static str,
    /// OEM and Model columns, in order
    pub columns: [ColumnSpec; 2],
    /// Header cell format
    pub header: Format,
    /// Header row height in points
    pub header_height: f64,
    /// Format for unstriped data rows
    pub body: Format,
    /// Format for striped data rows
    pub body_striped: Format,
    /// Data row height in points
    pub body_height: f64,
    /// Keep the header visible under vertical scroll
    pub freeze_header: bool,
}

impl SheetStyle {
    /// The standard OEM/Model layout.
    #[must_use]
    pub fn standard() -> Self {
        let header = Format::new()
            .set_bold()
            .set_font_size(12)
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::Black);

        let body = Format::new()
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::RGB(BODY_BORDER));

        let body_striped = body
            .clone()
            .set_background_color(Color::RGB(STRIPE_FILL));

        Self {
            sheet_name: "OEM and Models",
            columns: [
                ColumnSpec {
                    title: "OEM",
                    width: 30.0,
                },
                ColumnSpec {
                    title: "Model",
                    width: 40.0,
                },
            ],
            header,
            header_height: 25.0,
            body,
            body_striped,
            body_height: 20.0,
            freeze_header: true,
        }
    }

    /// Format for the data row at 0-based `index`.
    ///
    /// Every second data row (odd index) is striped.
    #[must_use]
    pub const fn body_format(&self, index: usize) -> &Format {
        if index % 2 == 1 {
            &self.body_striped
        } else {
            &self.body
        }
    }
}

/// A workbook persisted by [`WorkbookRenderer::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedWorkbook {
    /// Generated file name, e.g. `processed_1718035200000.xlsx`
    pub file_name: String,
    /// Full path of the written file
    pub path: PathBuf,
}

/// Builds styled two-column workbooks and writes them atomically.
pub struct WorkbookRenderer {
    output_dir: PathBuf,
    style: &'static SheetStyle,
}

impl WorkbookRenderer {
    /// Creates a renderer writing into the configured output directory.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_output_dir(&config.output_dir)
    }

    /// Creates a renderer writing into `output_dir`.
    #[must_use]
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            style: &STANDARD_STYLE,
        }
    }

    /// Builds the in-memory workbook for `records`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the sheet cannot be populated, for
    /// example when there are more rows than a worksheet can hold.
    pub fn build_workbook(&self, records: &[ExtractionRecord]) -> Result<Workbook> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        self.fill_sheet(sheet, records)
            .map_err(|e| Error::write(&self.output_dir, e))?;
        Ok(workbook)
    }

    fn fill_sheet(
        &self,
        sheet: &mut Worksheet,
        records: &[ExtractionRecord],
    ) -> std::result::Result<(), XlsxError> {
        let style = self.style;
        sheet.set_name(style.sheet_name)?;

        for (col, column) in (0u16..).zip(style.columns.iter()) {
            sheet.set_column_width(col, column.width)?;
            sheet.write_string_with_format(0, col, column.title, &style.header)?;
        }
        sheet.set_row_height(0, style.header_height)?;

        for (index, record) in records.iter().enumerate() {
            let row = u32::try_from(index + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
            let format = style.body_format(index);

            sheet.write_string_with_format(row, 0, &record.oem, format)?;
            sheet.write_string_with_format(row, 1, &record.model, format)?;
            sheet.set_row_height(row, style.body_height)?;
        }

        if style.freeze_header {
            sheet.set_freeze_panes(1, 0)?;
        }

        Ok(())
    }

    /// Writes `records` to a new uniquely named workbook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the output directory cannot be created,
    /// the workbook cannot be serialized, or the file cannot be written.
    pub fn render(&self, records: &[ExtractionRecord]) -> Result<RenderedWorkbook> {
        let mut workbook = self.build_workbook(records)?;
        let bytes = workbook
            .save_to_buffer()
            .map_err(|e| Error::write(&self.output_dir, e))?;

        fs::create_dir_all(&self.output_dir).map_err(|e| Error::write(&self.output_dir, e))?;

        let (file_name, path) = self.reserve_path()?;
        if let Err(e) = write_file_atomic(&path, &bytes) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        info!(
            "Wrote {} records to {}",
            records.len(),
            path.display()
        );

        Ok(RenderedWorkbook { file_name, path })
    }

    /// Claims `processed_<epoch-ms>.xlsx`, stepping the timestamp forward
    /// until a name is free. The claimed file exists (empty) on return.
    fn reserve_path(&self) -> Result<(String, PathBuf)> {
        let mut stamp = chrono::Utc::now().timestamp_millis();

        loop {
            let file_name = output_file_name(stamp);
            let path = self.output_dir.join(&file_name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok((file_name, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} already exists, trying next timestamp", path.display());
                    stamp += 1;
                }
                Err(e) => return Err(Error::write(&path, e)),
            }
        }
    }
}

/// Output file name for a millisecond timestamp.
#[must_use]
pub fn output_file_name(epoch_millis: i64) -> String {
    format!("{FILE_PREFIX}_{epoch_millis}.{FILE_EXTENSION}")
}

/// Writes through a temporary sibling and renames it over `path`.
fn write_file_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::write(&temp_path, e))?;

    let written = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::write(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::write(path, e)
    })
}
