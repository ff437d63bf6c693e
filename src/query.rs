//! Plumbing shared by the report scripts: building a select clause together with its header,
//! turning result rows into named records, and emitting them.

use std::io::{self, Write};
use std::path::Path;

use itertools::Itertools;

use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::gateway::Connector;
use crate::rtypes::{Parameters, Value};
use crate::table::write_csv;

///Well designation from zero based row and column, e.g. row 3, column 1 is `D2`.
///
///Only rows A to Z have a designation; anything else is an error.
pub fn well_from_row_col(row: i64, column: i64) -> Result<String> {
    if !(0..26).contains(&row) {
        return Err(Error::WellRow(row));
    }
    //A-Z are 65-90
    let letter = char::from(b'A' + row as u8);
    Ok(format!("{}{}", letter, column + 1))
}

///A ready to run query: text, bound parameters and the header its records render under
#[derive(Debug, Clone)]
pub struct Query {
    pub hql: String,
    pub params: Parameters,
    pub header: Vec<&'static str>,
    ///whether display name columns were selected
    pub names: bool,
}

///Builds a select clause and the matching header side by side so they cannot drift apart
#[derive(Debug, Default)]
pub struct Select {
    fields: Vec<&'static str>,
    header: Vec<&'static str>,
    names: bool,
}

impl Select {
    pub fn new(names: bool) -> Self {
        Select {
            names,
            ..Default::default()
        }
    }

    ///One selected field rendered as one column
    pub fn col(self, field: &'static str, header: &'static str) -> Self {
        self.cols(&[field], header)
    }

    ///Several selected fields rendered as one column (e.g. well row and column)
    pub fn cols(mut self, fields: &[&'static str], header: &'static str) -> Self {
        self.fields.extend_from_slice(fields);
        self.header.push(header);
        self
    }

    ///A display name column, left out entirely when names are off
    pub fn name(self, field: &'static str, header: &'static str) -> Self {
        if self.names {
            self.col(field, header)
        } else {
            self
        }
    }

    ///Finish the query with everything after the select list
    pub fn from(self, rest: &str, params: Parameters) -> Query {
        Query {
            hql: format!("select {}\n{}", self.fields.join(",\n       "), rest.trim()),
            params,
            header: self.header,
            names: self.names,
        }
    }
}

///Typed cursor over one result row, read in select order
#[derive(Debug)]
pub struct Cells {
    cells: std::vec::IntoIter<Value>,
    column: usize,
    names: bool,
}

impl Cells {
    pub fn new(row: Vec<Value>, names: bool) -> Self {
        Cells {
            cells: row.into_iter(),
            column: 0,
            names,
        }
    }

    fn next(&mut self, expected: &'static str) -> Result<Value> {
        let column = self.column;
        self.column += 1;
        self.cells.next().ok_or(Error::Cell {
            column,
            expected,
            found: "end of row".to_string(),
        })
    }

    fn mismatch(&self, expected: &'static str, found: Value) -> Error {
        Error::Cell {
            column: self.column - 1,
            expected,
            found: format!("{found:?}"),
        }
    }

    pub fn opt_int(&mut self) -> Result<Option<i64>> {
        match self.next("an integer")? {
            Value::Int(i) => Ok(Some(i)),
            Value::Null => Ok(None),
            other => Err(self.mismatch("an integer", other)),
        }
    }

    pub fn int(&mut self) -> Result<i64> {
        match self.opt_int()? {
            Some(i) => Ok(i),
            None => Err(self.mismatch("an integer", Value::Null)),
        }
    }

    ///Text, including text that happens to look like a number (a plate called `2021`)
    pub fn opt_text(&mut self) -> Result<Option<String>> {
        match self.next("text")? {
            Value::Str(s) => Ok(Some(s)),
            Value::Int(i) => Ok(Some(i.to_string())),
            Value::Null => Ok(None),
            other => Err(self.mismatch("text", other)),
        }
    }

    pub fn text(&mut self) -> Result<String> {
        match self.opt_text()? {
            Some(s) => Ok(s),
            None => Err(self.mismatch("text", Value::Null)),
        }
    }

    ///A display name if names were selected, otherwise nothing is consumed
    pub fn name(&mut self) -> Result<Option<String>> {
        if self.names {
            self.opt_text()
        } else {
            Ok(None)
        }
    }

    ///Well row and column, read as a designation
    pub fn well(&mut self) -> Result<String> {
        let row = self.int()?;
        let column = self.int()?;
        well_from_row_col(row, column)
    }

    ///Fail if the row carries more cells than the record consumed
    pub fn finish(mut self) -> Result<()> {
        match self.cells.next() {
            None => Ok(()),
            Some(extra) => Err(Error::Cell {
                column: self.column,
                expected: "end of row",
                found: format!("{extra:?}"),
            }),
        }
    }
}

///A query result row with named fields
pub trait Record: Sized {
    fn from_cells(cells: &mut Cells) -> Result<Self>;

    ///Output values in header order, display names only when `names` is set
    fn values(&self, names: bool) -> Vec<Value>;
}

///Push a display name column if names are shown
pub fn push_name(values: &mut Vec<Value>, names: bool, name: &Option<String>) {
    if names {
        values.push(name.clone().into());
    }
}

///Records fetched by one query, with the header they print under
#[derive(Debug)]
pub struct Report<R> {
    pub header: Vec<&'static str>,
    pub rows: Vec<R>,
    names: bool,
}

impl<R: Record> Report<R> {
    pub fn fetch<C: Connector>(manager: &mut ConnectionManager<C>, query: &Query) -> Result<Self> {
        let rows = manager.hql_query(&query.hql, &query.params)?;
        Self::from_rows(query, rows)
    }

    pub fn from_rows(query: &Query, rows: Vec<Vec<Value>>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut cells = Cells::new(row, query.names);
                let record = R::from_cells(&mut cells)?;
                cells.finish()?;
                Ok(record)
            })
            .collect::<Result<Vec<R>>>()?;
        Ok(Report {
            header: query.header.clone(),
            rows,
            names: query.names,
        })
    }

    pub fn values(&self) -> Vec<Vec<Value>> {
        self.rows.iter().map(|r| r.values(self.names)).collect()
    }

    ///Header and rows, comma separated
    pub fn print<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.header.iter().join(", "))?;
        for row in self.values() {
            writeln!(out, "{}", row.iter().join(", "))?;
        }
        Ok(())
    }

    ///Print unless `quiet`, write a CSV file if one is given
    pub fn emit(&self, quiet: bool, file: Option<&Path>) -> Result<()> {
        if !quiet {
            let stdout = io::stdout();
            self.print(&mut stdout.lock())?;
        }
        if let Some(file) = file {
            write_csv(&self.values(), file, Some(self.header.as_slice()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wells_are_letter_and_one_based_column() {
        assert_eq!(well_from_row_col(3, 1).unwrap(), "D2");
        assert_eq!(well_from_row_col(0, 0).unwrap(), "A1");
        assert_eq!(well_from_row_col(25, 23).unwrap(), "Z24");
        for row in 0..26 {
            let well = well_from_row_col(row, 11).unwrap();
            assert_eq!(well.chars().next().unwrap() as i64, 65 + row);
            assert!(well.ends_with("12"));
        }
    }

    #[test]
    fn rows_past_z_have_no_designation() {
        assert!(matches!(well_from_row_col(26, 0), Err(Error::WellRow(26))));
        assert!(well_from_row_col(-1, 0).is_err());
    }

    #[test]
    fn select_keeps_header_in_step_with_fields() {
        let q = Select::new(false)
            .name("plate.name", "Plate Name")
            .col("plate.id", "Plate ID")
            .cols(&["well.row", "well.column"], "Well")
            .from("from Well well join well.plate plate", Parameters::new());
        assert_eq!(q.header, vec!["Plate ID", "Well"]);
        assert!(q.hql.starts_with("select plate.id,"));
        assert!(!q.hql.contains("plate.name"));
        assert!(q.hql.contains("well.column\nfrom Well well"));
    }

    #[test]
    fn cells_check_types_and_length() {
        let mut cells = Cells::new(vec![Value::Str("a".into()), Value::Int(1)], true);
        assert!(cells.int().is_err());
        let mut cells = Cells::new(vec![Value::Int(1)], true);
        assert_eq!(cells.int().unwrap(), 1);
        assert!(cells.int().is_err());
        let cells = Cells::new(vec![Value::Int(1)], true);
        assert!(cells.finish().is_err());
    }

    #[test]
    fn names_are_skipped_without_consuming() {
        let mut cells = Cells::new(vec![Value::Int(7)], false);
        assert_eq!(cells.name().unwrap(), None);
        assert_eq!(cells.int().unwrap(), 7);
        cells.finish().unwrap();
    }

    #[test]
    fn numeric_names_read_as_text() {
        let mut cells = Cells::new(vec![Value::Int(2021), Value::Null, Value::Bool(true)], true);
        assert_eq!(cells.text().unwrap(), "2021");
        assert_eq!(cells.opt_text().unwrap(), None);
        assert!(cells.opt_text().is_err());
    }
}
