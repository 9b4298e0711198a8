//! Purpose: `tabulite` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, prints table data.
//! Invariants: Table data and machine output go to stdout; diagnostics go to
//! stderr (JSON when stderr is not a terminal).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{error::ErrorKind as ClapErrorKind, CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::aot::Shell;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use tabulite::api::{
    language_driver_label, load_file, to_exit_code, write_delimited, Error, ErrorKind,
    ExportOptions, Table,
};

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let code = if err.kind() == ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                {
                    2
                } else {
                    0
                };
                return Ok(code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(err.to_string().trim_end().to_string())
                    .with_hint("Run `tabulite --help` for usage."));
            }
        },
    };
    dispatch(cli.command)
}

#[derive(Parser)]
#[command(
    name = "tabulite",
    version,
    about = "Read, inspect, and export dBASE level-5 (.dbf) tables",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    after_help = r#"EXAMPLES
  $ tabulite info people.dbf
  $ tabulite fields people.dbf --json
  $ tabulite export people.dbf --delimiter tab > people.tsv
  $ tabulite check people.dbf

LEARN MORE
  $ tabulite <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Show table header metadata",
        after_help = r#"EXAMPLES
  $ tabulite info people.dbf
  $ tabulite info people.dbf --json
  $ tabulite info legacy.dbf --encoding windows-1252"#
    )]
    Info {
        #[arg(help = "Table file path", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, default_value = "utf-8", help = "Character encoding label")]
        encoding: String,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "List field descriptors",
        after_help = r#"EXAMPLES
  $ tabulite fields people.dbf
  $ tabulite fields people.dbf --json"#
    )]
    Fields {
        #[arg(help = "Table file path", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, default_value = "utf-8", help = "Character encoding label")]
        encoding: String,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Export records as delimited text",
        long_about = r#"Export a table as delimited text.

Writes one line per record (deleted records included) with decoded, trimmed
field values. Values containing the delimiter, quotes, or line breaks are
quoted CSV-style."#,
        after_help = r#"EXAMPLES
  $ tabulite export people.dbf > people.csv
  $ tabulite export people.dbf --delimiter tab --no-headers
  $ tabulite export legacy.dbf --encoding ibm866 --output legacy.csv"#
    )]
    Export {
        #[arg(help = "Table file path", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, default_value = "utf-8", help = "Character encoding label")]
        encoding: String,
        #[arg(
            short = 'o',
            long,
            help = "Output file (default: stdout)",
            value_hint = ValueHint::FilePath
        )]
        output: Option<PathBuf>,
        #[arg(
            long,
            default_value = ",",
            help = "Field delimiter: a single character, or `tab`"
        )]
        delimiter: String,
        #[arg(long, help = "Skip the field-name header row")]
        no_headers: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Validate table structure",
        long_about = r#"Load the table and report whether its header, field block, and record
region are structurally consistent. Exits nonzero when the table is corrupt."#,
        after_help = r#"EXAMPLES
  $ tabulite check people.dbf
  $ tabulite check people.dbf --json"#
    )]
    Check {
        #[arg(help = "Table file path", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, default_value = "utf-8", help = "Character encoding label")]
        encoding: String,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(about = "Print version info as JSON")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ tabulite completion bash > ~/.local/share/bash-completion/completions/tabulite
  $ tabulite completion zsh > ~/.zfunc/_tabulite"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn dispatch(command: Command) -> Result<i32, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "tabulite", &mut io::stdout());
            Ok(0)
        }
        Command::Version => {
            println!(
                "{}",
                json!({
                    "name": "tabulite",
                    "version": env!("CARGO_PKG_VERSION"),
                })
            );
            Ok(0)
        }
        Command::Info {
            file,
            encoding,
            json,
        } => {
            let table = load_file(&file, &encoding)?;
            emit_info(&table, &file, json);
            Ok(0)
        }
        Command::Fields {
            file,
            encoding,
            json,
        } => {
            let table = load_file(&file, &encoding)?;
            emit_fields(&table, json);
            Ok(0)
        }
        Command::Export {
            file,
            encoding,
            output,
            delimiter,
            no_headers,
        } => {
            let table = load_file(&file, &encoding)?;
            let options = ExportOptions {
                delimiter: parse_delimiter(&delimiter)?,
                headers: !no_headers,
            };
            match output {
                Some(path) => {
                    let mut out = std::fs::File::create(&path).map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to create export file")
                            .with_path(&path)
                            .with_source(err)
                    })?;
                    write_delimited(&table, &mut out, &options)?;
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    write_delimited(&table, &mut out, &options)?;
                    out.flush().map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to flush export output")
                            .with_source(err)
                    })?;
                }
            }
            Ok(0)
        }
        Command::Check {
            file,
            encoding,
            json,
        } => match load_file(&file, &encoding) {
            Ok(table) => {
                if json {
                    println!(
                        "{}",
                        json!({
                            "path": file.display().to_string(),
                            "status": "ok",
                            "fields": table.fields().len(),
                            "records": table.record_count(),
                        })
                    );
                } else {
                    println!("OK: {}", file.display());
                }
                Ok(0)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::CorruptHeader | ErrorKind::InvalidFieldDefinition
                ) =>
            {
                if json {
                    println!(
                        "{}",
                        json!({
                            "path": file.display().to_string(),
                            "status": "corrupt",
                            "kind": kind_label(err.kind()),
                            "detail": err.message(),
                            "field_index": err.column(),
                        })
                    );
                } else {
                    println!(
                        "CORRUPT: {} issue={}",
                        file.display(),
                        err.message().unwrap_or("structural inconsistency")
                    );
                }
                Ok(to_exit_code(err.kind()))
            }
            Err(err) => Err(err),
        },
    }
}

fn emit_info(table: &Table, file: &std::path::Path, json: bool) {
    let update = table.last_update();
    let last_update = format!("{:04}-{:02}-{:02}", update.year, update.month, update.day);
    let suggested = language_driver_label(table.language_driver());
    if json {
        println!(
            "{}",
            json!({
                "path": file.display().to_string(),
                "version": table.version(),
                "fields": table.fields().len(),
                "records": table.record_count(),
                "record_width": table.record_width(),
                "last_update": last_update,
                "encoding": table.encoding().name(),
                "language_driver": table.language_driver(),
                "suggested_encoding": suggested,
            })
        );
        return;
    }
    println!(
        "{}: dBASE level 5 (version 0x{:02x})",
        file.display(),
        table.version()
    );
    println!("  fields:       {}", table.fields().len());
    println!(
        "  records:      {} (width {} bytes)",
        table.record_count(),
        table.record_width()
    );
    println!("  last update:  {last_update}");
    match suggested {
        Some(label) => println!(
            "  encoding:     {} (language driver 0x{:02x} suggests {label})",
            table.encoding().name(),
            table.language_driver()
        ),
        None => println!("  encoding:     {}", table.encoding().name()),
    }
}

#[derive(Serialize)]
struct FieldInfo<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    field_type: char,
    length: u8,
    decimals: u8,
}

fn emit_fields(table: &Table, json: bool) {
    if json {
        let fields = table
            .fields()
            .iter()
            .map(|field| FieldInfo {
                name: field.name(),
                field_type: field.field_type().code() as char,
                length: field.length(),
                decimals: field.decimal_count(),
            })
            .collect::<Vec<_>>();
        println!("{}", json!({ "fields": fields }));
        return;
    }
    let name_width = table
        .fields()
        .iter()
        .map(|field| field.name().len())
        .max()
        .unwrap_or(4)
        .max(4);
    println!("{:<name_width$}  TYPE  LENGTH  DECIMALS", "NAME");
    for field in table.fields() {
        println!(
            "{:<name_width$}  {}     {:>6}  {:>8}",
            field.name(),
            field.field_type().code() as char,
            field.length(),
            field.decimal_count()
        );
    }
}

fn parse_delimiter(value: &str) -> Result<char, Error> {
    if value.eq_ignore_ascii_case("tab") || value == "\\t" {
        return Ok('\t');
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("delimiter must be a single character, got {value:?}"))
            .with_hint("Use --delimiter , or --delimiter tab.")),
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => "internal",
        ErrorKind::Usage => "usage",
        ErrorKind::NotFound => "not-found",
        ErrorKind::Io => "io",
        ErrorKind::CorruptHeader => "corrupt-header",
        ErrorKind::InvalidFieldDefinition => "invalid-field-definition",
        ErrorKind::TypeConstraint => "type-constraint",
        ErrorKind::ValueTooLong => "value-too-long",
        ErrorKind::IndexOutOfRange => "index-out-of-range",
        ErrorKind::SchemaFrozen => "schema-frozen",
    }
}

fn emit_error(err: &Error) {
    let stderr = io::stderr();
    if stderr.is_terminal() {
        eprintln!("error: {err}");
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }
    eprintln!(
        "{}",
        json!({
            "error": {
                "kind": kind_label(err.kind()),
                "message": err.message(),
                "field": err.field(),
                "row": err.row(),
                "column": err.column(),
                "hint": err.hint(),
            }
        })
    );
}
