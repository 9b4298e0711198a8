//! Purpose: Delimited-text export of a table's decoded values.
//! Exports: `ExportOptions`, `write_delimited`, `delimited_string`.
//! Role: Pure consumer of public row/field accessors; not format-critical.
//! Invariants: Output row order matches record order; column order matches
//! field order.
#![allow(clippy::result_large_err)]

use std::io::Write;

use crate::core::error::{Error, ErrorKind};
use crate::core::table::Table;

#[derive(Clone, Copy, Debug)]
pub struct ExportOptions {
    pub delimiter: char,
    pub headers: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            headers: true,
        }
    }
}

pub fn write_delimited(
    table: &Table,
    out: &mut impl Write,
    options: &ExportOptions,
) -> Result<(), Error> {
    if options.headers {
        let names = table
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect::<Vec<_>>();
        write_row(out, &names, options.delimiter)?;
    }
    for row in 0..table.record_count() {
        let values = table.row_values(row)?;
        write_row(out, &values, options.delimiter)?;
    }
    Ok(())
}

pub fn delimited_string(table: &Table, options: &ExportOptions) -> Result<String, Error> {
    let mut out = Vec::new();
    write_delimited(table, &mut out, options)?;
    String::from_utf8(out).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("export produced non-UTF-8 output")
            .with_source(err)
    })
}

fn write_row(out: &mut impl Write, values: &[String], delimiter: char) -> Result<(), Error> {
    let line = values
        .iter()
        .map(|value| quote_value(value, delimiter))
        .collect::<Vec<_>>()
        .join(&delimiter.to_string());
    writeln!(out, "{line}").map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write export output")
            .with_source(err)
    })
}

// CSV-style quoting: quote when the value contains the delimiter, a quote, or
// a line break; embedded quotes are doubled.
fn quote_value(value: &str, delimiter: char) -> String {
    let needs_quotes = value.contains(delimiter)
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if !needs_quotes {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
