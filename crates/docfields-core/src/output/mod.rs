//! Result tables: CSV and XLSX writers and row aggregation.

use std::fs::File;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::{debug, info};

use crate::error::{ConfigError, DocfieldsError, Result};
use crate::models::Record;

/// Name of the first column of every table.
pub const FILE_NAME_COLUMN: &str = "file_name";

/// Output names containing this marker are renamed after the input batch.
const BATCH_NAME_MARKER: &str = "system";

/// Prefix of the input path segment that names a batch.
const BATCH_SEGMENT_PREFIX: &str = "RCV";

/// Table format, selected by output extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> std::result::Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("xlsx") => Ok(TableFormat::Xlsx),
            _ => Err(ConfigError::OutputFormat(path.to_path_buf())),
        }
    }
}

/// Row-oriented table sink.
pub trait TableWriter {
    fn write_header(&mut self, fields: &[String]) -> Result<()>;

    fn write_row(&mut self, values: &[String]) -> Result<()>;

    /// Flush and close the table.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// CSV output via the `csv` crate.
pub struct CsvTable {
    writer: csv::Writer<File>,
}

impl CsvTable {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl TableWriter for CsvTable {
    fn write_header(&mut self, fields: &[String]) -> Result<()> {
        self.write_row(fields)
    }

    fn write_row(&mut self, values: &[String]) -> Result<()> {
        self.writer.write_record(values)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Single-sheet XLSX output via `rust_xlsxwriter`.
pub struct XlsxTable {
    path: PathBuf,
    sheet: Worksheet,
    next_row: u32,
}

impl XlsxTable {
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            sheet: Worksheet::new(),
            next_row: 0,
        }
    }
}

impl TableWriter for XlsxTable {
    fn write_header(&mut self, fields: &[String]) -> Result<()> {
        self.write_row(fields)
    }

    fn write_row(&mut self, values: &[String]) -> Result<()> {
        for (col, value) in values.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
            self.sheet.write_string(self.next_row, col, value)?;
        }
        self.next_row += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let XlsxTable { path, sheet, .. } = *self;
        let mut workbook = Workbook::new();
        workbook.push_worksheet(sheet);
        workbook.save(&path)?;
        Ok(())
    }
}

/// Open the writer matching the output extension.
pub fn open_table(path: &Path) -> Result<Box<dyn TableWriter>> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => Ok(Box::new(CsvTable::create(path)?)),
        TableFormat::Xlsx => Ok(Box::new(XlsxTable::create(path))),
    }
}

/// Write `file_name` plus `columns` as the header, then one row per record.
///
/// Records are written in the order given; missing values are empty cells.
/// Returns the number of data rows.
pub fn write_table<'a, I>(writer: &mut dyn TableWriter, columns: &[String], records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push(FILE_NAME_COLUMN.to_string());
    header.extend(columns.iter().cloned());
    writer.write_header(&header)?;

    let mut rows = 0;
    for record in records {
        let mut row = Vec::with_capacity(columns.len() + 1);
        row.push(record.filename.clone());
        row.extend(record.row(columns));
        writer.write_row(&row)?;
        rows += 1;
    }
    Ok(rows)
}

/// Sort records by file name and write them to `path`.
///
/// Fails with [`DocfieldsError::EmptyResult`] before touching `path` when
/// there is nothing to write.
pub fn write_records(path: &Path, columns: &[String], records: Vec<Record>) -> Result<usize> {
    if records.is_empty() {
        return Err(DocfieldsError::EmptyResult);
    }
    let mut records = records;
    records.sort_by(|a, b| a.filename.cmp(&b.filename));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = open_table(path)?;
    let rows = write_table(writer.as_mut(), columns, &records)?;
    writer.finish()?;

    info!("Wrote {} rows to {:?}", rows, path);
    Ok(rows)
}

/// Output path for a config-mode run.
///
/// When the output file name contains `system`, the table is named after the
/// first segment of `input` starting with `RCV`, keeping the output's
/// directory and extension. Otherwise `output` is returned unchanged.
pub fn batch_output_path(input: &Path, output: &Path) -> PathBuf {
    let marked = output
        .file_name()
        .map(|n| n.to_string_lossy().contains(BATCH_NAME_MARKER))
        .unwrap_or(false);
    if !marked {
        return output.to_path_buf();
    }

    let segment = input
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .find(|s| s.starts_with(BATCH_SEGMENT_PREFIX));

    match segment {
        Some(segment) => {
            let name = match output.extension() {
                Some(ext) => format!("{}.{}", segment, ext.to_string_lossy()),
                None => segment,
            };
            let renamed = output.with_file_name(name);
            debug!("Renaming output {:?} -> {:?}", output, renamed);
            renamed
        }
        None => output.to_path_buf(),
    }
}
