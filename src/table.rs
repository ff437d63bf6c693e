//! CSV in and out. Everything goes through polars' CSV reader and writer; columns are kept as text
//! since the tables here are small and untyped.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use polars::prelude::{
    CsvReadOptions, CsvWriter, DataFrame, NamedFrom, QuoteStyle, SerReader, SerWriter, Series,
};

use crate::error::{Error, Result};
use crate::rtypes::Value;

///Write `rows` to `filename` with every field quoted, the header (if any) first.
///
///A header whose length differs from the first row is refused before anything is written.
pub fn write_csv(rows: &[Vec<Value>], filename: &Path, header: Option<&[&str]>) -> Result<()> {
    if let (Some(header), Some(first)) = (header, rows.first()) {
        if header.len() != first.len() {
            return Err(Error::HeaderMismatch);
        }
    }
    let width = header
        .map(<[&str]>::len)
        .or_else(|| rows.first().map(Vec::len))
        .unwrap_or(0);
    if let Some(i) = rows.iter().position(|r| r.len() != width) {
        return Err(Error::RaggedRow(i));
    }
    let mut file = File::create(filename)?;
    if let Some(header) = header {
        //written by hand so that the header is quoted like the data
        let line: Vec<String> = header.iter().map(|h| quote(h)).collect();
        writeln!(file, "{}", line.join(","))?;
    }
    if rows.is_empty() {
        return Ok(());
    }
    //one text column per field
    let columns: Vec<Series> = (0..width)
        .map(|j| {
            let values: Vec<Option<String>> = rows.iter().map(|r| r[j].to_field()).collect();
            Series::new(&format!("column_{}", j + 1), values)
        })
        .collect();
    let mut df = DataFrame::new(columns)?;
    CsvWriter::new(file)
        .include_header(false)
        .with_quote_style(QuoteStyle::Always)
        .finish(&mut df)?;
    log::debug!("wrote {} rows to {}", rows.len(), filename.display());
    Ok(())
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

///A CSV file read as text: the first line and everything after it
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    ///Index of a header column by exact name
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

fn text_columns(df: &DataFrame) -> Result<Vec<Vec<Option<String>>>> {
    let columns = df
        .get_columns()
        .iter()
        .map(|s| s.str().map(|ca| ca.clone()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((0..df.height())
        .map(|i| {
            columns
                .iter()
                .map(|ca| ca.get(i).map(str::to_string))
                .collect()
        })
        .collect())
}

///Read a CSV file as a header and text rows. Missing cells read as empty strings.
pub fn read_table(path: &Path) -> Result<Table> {
    //schema inference off: every column stays a string
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    let mut lines = text_columns(&df)?
        .into_iter()
        .map(|line| line.into_iter().map(Option::unwrap_or_default).collect());
    let header = lines.next().unwrap_or_default();
    let rows = lines.collect();
    Ok(Table { header, rows })
}

///Parse CSV text without a header line. Empty unquoted cells are `None`.
pub fn parse_records(text: &str) -> Result<Vec<Vec<Option<String>>>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(text.as_bytes().to_vec()))
        .finish()?;
    text_columns(&df)
}
