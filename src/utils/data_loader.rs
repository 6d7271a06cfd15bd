//! Tabular data loading and saving for CSV and XLSX files

use crate::error::{KeeperError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// File format of a client table, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
    /// Legacy Excel workbook, read-only
    Xls,
}

impl TableFormat {
    /// Detect the format from a path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "xlsx" => Ok(TableFormat::Xlsx),
            "xls" => Ok(TableFormat::Xls),
            _ => Err(KeeperError::ConfigError(format!(
                "unsupported table format '{}' for {}: expected .csv, .xlsx or .xls",
                ext,
                path.display()
            ))),
        }
    }

    /// Like [`TableFormat::from_path`], restricted to formats that can be written
    pub fn for_output(path: &Path) -> Result<Self> {
        match Self::from_path(path)? {
            TableFormat::Xls => Err(xls_not_writable(path)),
            format => Ok(format),
        }
    }
}

fn xls_not_writable(path: &Path) -> KeeperError {
    KeeperError::ConfigError(format!(
        "cannot write legacy .xls to {}: use .xlsx",
        path.display()
    ))
}

/// Loader for client tables
pub struct DataLoader {
    /// Rows used for CSV schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows scanned for CSV type inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(KeeperError::PathError(path.display().to_string()));
        }

        let df = match TableFormat::from_path(path)? {
            TableFormat::Csv => self.load_csv(path)?,
            TableFormat::Xlsx | TableFormat::Xls => self.load_xlsx(path)?,
        };

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded table");
        Ok(df)
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    /// Load the first worksheet of an XLSX or XLS workbook.
    ///
    /// The first row is the header. A column whose non-empty cells are all
    /// numeric becomes Float64, anything else becomes String.
    pub fn load_xlsx(&self, path: &Path) -> Result<DataFrame> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| KeeperError::DataError(format!("{} has no worksheets", path.display())))??;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(cells) => cells.iter().map(|c| c.to_string()).collect(),
            None => return Ok(DataFrame::empty()),
        };
        let body: Vec<&[Data]> = rows.collect();

        let columns = header
            .iter()
            .enumerate()
            .map(|(col_idx, name)| {
                let cells: Vec<Option<&Data>> = body
                    .iter()
                    .map(|row| row.get(col_idx).filter(|c| !is_blank(c)))
                    .collect();

                let numeric = cells.iter().flatten().all(|c| cell_as_f64(c).is_some());
                if numeric {
                    let values: Vec<Option<f64>> =
                        cells.iter().map(|c| c.and_then(cell_as_f64)).collect();
                    Column::new(name.as_str().into(), values)
                } else {
                    let values: Vec<Option<String>> =
                        cells.iter().map(|c| c.map(|c| c.to_string())).collect();
                    Column::new(name.as_str().into(), values)
                }
            })
            .collect::<Vec<Column>>();

        Ok(DataFrame::new(columns)?)
    }
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_as_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        Data::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Writer for annotated tables and rating reports
pub struct DataSaver;

impl DataSaver {
    /// Write a table in the format implied by the path's extension,
    /// creating parent directories as needed
    pub fn save_auto(df: &mut DataFrame, path: &Path) -> Result<()> {
        let format = TableFormat::for_output(path)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        match format {
            TableFormat::Csv => Self::save_csv(df, path)?,
            TableFormat::Xlsx => Self::save_xlsx(df, path)?,
            TableFormat::Xls => return Err(xls_not_writable(path)),
        }

        debug!(path = %path.display(), rows = df.height(), "Saved table");
        Ok(())
    }

    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }

    /// Save to XLSX, one worksheet with a header row
    pub fn save_xlsx(df: &DataFrame, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();

        for (col_idx, column) in df.get_columns().iter().enumerate() {
            let col_idx = col_idx as u16;
            sheet.write_string(0, col_idx, column.name().as_str())?;

            if is_numeric_dtype(column.dtype()) {
                let casted = column.cast(&DataType::Float64)?;
                for (row_idx, value) in casted.f64()?.into_iter().enumerate() {
                    if let Some(v) = value {
                        sheet.write_number(row_idx as u32 + 1, col_idx, v)?;
                    }
                }
            } else {
                let casted = column.cast(&DataType::String)?;
                for (row_idx, value) in casted.str()?.into_iter().enumerate() {
                    if let Some(v) = value {
                        sheet.write_string(row_idx as u32 + 1, col_idx, v)?;
                    }
                }
            }
        }

        workbook.save(path)?;
        Ok(())
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
