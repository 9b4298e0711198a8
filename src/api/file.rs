//! Purpose: File-backed table load/save on top of the byte codecs.
//! Exports: `load_file`, `save_file`.
//! Role: Thin fs shim; the sink is scoped to the call and always released.
//! Invariants: Every fs failure carries the path and the underlying error.
#![allow(clippy::result_large_err)]

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::core::encoding::TableEncoding;
use crate::core::error::{Error, ErrorKind};
use crate::core::table::Table;

pub fn load_file(path: impl AsRef<Path>, encoding_label: &str) -> Result<Table, Error> {
    let path = path.as_ref();
    let encoding = TableEncoding::resolve(encoding_label)?;
    let bytes = std::fs::read(path).map_err(|err| {
        Error::new(map_io_error_kind(&err))
            .with_message("failed to read table file")
            .with_path(path)
            .with_source(err)
    })?;
    Table::from_bytes(&bytes, encoding).map_err(|err| err.with_path(path))
}

pub fn save_file(table: &Table, path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    let bytes = table.to_bytes();
    let mut file = File::create(path).map_err(|err| {
        Error::new(map_io_error_kind(&err))
            .with_message("failed to create table file")
            .with_path(path)
            .with_source(err)
    })?;
    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write table file")
                .with_path(path)
                .with_source(err)
        })
}

fn map_io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    }
}
