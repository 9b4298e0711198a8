//! Purpose: Define the stable public Rust API boundary for tabulite.
//! Exports: Table, field, and encoding types plus file load/save and export.
//! Role: Public, additive-only surface; the CLI and tests go through here.
//! Invariants: This module is the only public path bindings should rely on.

mod export;
mod file;

pub use crate::core::encoding::{language_driver_label, TableEncoding};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::field::{FieldDescriptor, FieldType};
pub use crate::core::header::LastUpdate;
pub use crate::core::table::Table;
pub use export::{delimited_string, write_delimited, ExportOptions};
pub use file::{load_file, save_file};
