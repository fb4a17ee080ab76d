//! Purpose: Execute parsed CLI commands against the decode pipeline.
//! Exports: dispatch_command.
//! Role: Binary-side glue between clap command structs and `editree::api`.
//! Invariants: Stdout carries command output only; diagnostics go to stderr.
//! Invariants: Every failure path returns a typed `Error`, never a panic.
use super::*;

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use editree::api::{DecodeOptions, Interchange, InterchangeReader, Warning, claims_json,
    interchange_json};

pub fn dispatch_command(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match command {
        Command::Decode {
            input,
            mode,
            jsonl,
            output,
        } => {
            let interchanges = decode_input(&input, mode.into())?;
            let trees: Vec<Value> = interchanges.iter().map(interchange_json).collect();
            if jsonl || trees.len() > 1 {
                write_json_lines(&trees, output.as_deref(), color_mode)?;
            } else if let Some(tree) = trees.first() {
                write_json(tree, output.as_deref(), color_mode)?;
            }
            Ok(RunOutcome::ok())
        }
        Command::Claims {
            input,
            mode,
            output,
        } => {
            let interchanges = decode_input(&input, mode.into())?;
            let mut claims = Vec::new();
            for interchange in &interchanges {
                let mut doc = claims_json(interchange);
                if let Some(Value::Array(batch)) = doc.get_mut("claims") {
                    claims.append(batch);
                }
            }
            write_json(&json!({ "claims": claims }), output.as_deref(), color_mode)?;
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(
                &json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "editree", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

fn decode_input(input: &str, mode: Mode) -> Result<Vec<Interchange>, Error> {
    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input).map_err(|io_err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("cannot open input file: {input}"))
                .with_hint("pass an existing EDI file path, or - for stdin")
                .with_source(io_err)
        })?;
        Box::new(BufReader::new(file))
    };

    let cancel = install_cancel_flag();
    let options = DecodeOptions { mode };
    let mut source = InterchangeReader::new(reader, options).with_cancel_flag(cancel);
    let mut interchanges = Vec::new();
    while let Some(interchange) = source.next_interchange()? {
        log_warnings(&interchange);
        interchanges.push(interchange);
    }
    tracing::debug!(count = interchanges.len(), "decoded interchanges");
    Ok(interchanges)
}

// SIGINT flips the shared flag; the reader surfaces `Canceled` at the next
// segment boundary instead of dying mid-write.
fn install_cancel_flag() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancel));
    cancel
}

fn log_warnings(interchange: &Interchange) {
    for warning in &interchange.warnings {
        log_warning("interchange", warning);
    }
    for group in &interchange.groups {
        for warning in &group.warnings {
            log_warning("group", warning);
        }
        for txn in &group.transaction_sets {
            for warning in &txn.warnings {
                log_warning("transaction_set", warning);
            }
        }
    }
}

fn log_warning(scope: &str, warning: &Warning) {
    tracing::warn!(
        scope,
        code = warning.code.as_str(),
        segment_index = warning.segment_index,
        "{}",
        warning.message
    );
}

fn write_json(
    value: &Value,
    output: Option<&std::path::Path>,
    color_mode: ColorMode,
) -> Result<(), Error> {
    match output {
        Some(path) => write_output_file(path, &[value.clone()]),
        None => {
            emit_json(value, color_mode);
            Ok(())
        }
    }
}

fn write_json_lines(
    values: &[Value],
    output: Option<&std::path::Path>,
    _color_mode: ColorMode,
) -> Result<(), Error> {
    match output {
        Some(path) => write_output_file(path, values),
        None => {
            for value in values {
                emit_json_line(value);
            }
            Ok(())
        }
    }
}

// File output is always compact JSON, one document per line.
fn write_output_file(path: &std::path::Path, values: &[Value]) -> Result<(), Error> {
    let io_error = |io_err: io::Error| {
        Error::new(ErrorKind::Io)
            .with_message(format!("cannot write output file: {}", path.display()))
            .with_source(io_err)
    };
    let mut file = File::create(path).map_err(io_error)?;
    for value in values {
        let line = serde_json::to_string(value).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("json encode failed")
                .with_source(err)
        })?;
        file.write_all(line.as_bytes()).map_err(io_error)?;
        file.write_all(b"\n").map_err(io_error)?;
    }
    file.flush().map_err(io_error)?;
    Ok(())
}
