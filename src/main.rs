//! Purpose: `editree` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (human or JSON by flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

mod color_json;
mod command_dispatch;

use color_json::colorize_json;
use editree::api::{Error, ErrorKind, Mode, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage).with_message(err.to_string()),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, color_mode)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "editree",
    version,
    about = "Decode EDI claims documents into JSON trees",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Reads X12-style EDI files (delimiters self-declared in the ISA header)
and emits one deterministic JSON tree per interchange.

Mental model:
  - `decode` renders the full envelope/loop structure
  - `claims` renders the flat claims view of 837-style documents
"#,
    after_help = r#"EXAMPLES
  $ editree decode claims.edi
  $ editree decode claims.edi --mode lenient --jsonl | jq '.groups[]'
  $ cat claims.edi | editree claims -

LEARN MORE
  $ editree <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeCli {
    Strict,
    Lenient,
}

impl From<ModeCli> for Mode {
    fn from(value: ModeCli) -> Self {
        match value {
            ModeCli::Strict => Mode::Strict,
            ModeCli::Lenient => Mode::Lenient,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Decode an EDI file into its envelope/loop JSON tree",
        long_about = r#"Decode one or more concatenated interchanges into JSON trees.

Strict mode fails fast on structural or count mismatches. Lenient mode keeps
going where position stays defined and attaches warnings to the output tree."#,
        after_help = r#"EXAMPLES
  $ editree decode claims.edi
  $ editree decode claims.edi -o claims.json
  $ editree decode claims.edi --mode lenient
  $ cat claims.edi | editree decode - --jsonl

NOTES
  - Multiple interchanges in one file emit one JSON document per line
  - Warnings are also logged to stderr (silence with RUST_LOG=error)"#
    )]
    Decode {
        #[arg(help = "Input EDI file (use - for stdin)", value_hint = ValueHint::FilePath)]
        input: String,
        #[arg(
            long,
            default_value = "strict",
            value_enum,
            help = "Validation mode: strict|lenient"
        )]
        mode: ModeCli,
        #[arg(long, help = "Emit JSON Lines (one interchange per line)")]
        jsonl: bool,
        #[arg(
            short = 'o',
            long,
            help = "Write output to this file instead of stdout",
            value_hint = ValueHint::FilePath
        )]
        output: Option<PathBuf>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Extract the flat claims view from an 837-style file",
        long_about = r#"Decode the file, then project CLM/NM1/N3/N4/DMG/HI/SV1/DTP segments
into a flat `{"claims": [...]}` document."#,
        after_help = r#"EXAMPLES
  $ editree claims claims.edi
  $ editree claims claims.edi -o claims.json
  $ editree claims claims.edi | jq '.claims[].claim_number'"#
    )]
    Claims {
        #[arg(help = "Input EDI file (use - for stdin)", value_hint = ValueHint::FilePath)]
        input: String,
        #[arg(
            long,
            default_value = "strict",
            value_enum,
            help = "Validation mode: strict|lenient"
        )]
        mode: ModeCli,
        #[arg(
            short = 'o',
            long,
            help = "Write output to this file instead of stdout",
            value_hint = ValueHint::FilePath
        )]
        output: Option<PathBuf>,
    },
    #[command(
        about = "Print version info as JSON",
        after_help = r#"EXAMPLES
  $ editree version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ editree completion bash > ~/.local/share/bash-completion/completions/editree
  $ editree completion zsh > ~/.zfunc/_editree"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn emit_json(value: &Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let json = if is_tty || use_color {
        colorize_json(value, use_color)
    } else {
        serde_json::to_string(value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_json_line(value: &Value) {
    let json = serde_json::to_string(value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn error_json(err: &Error) -> Value {
    json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message(),
            "segment_index": err.segment_index(),
            "offset": err.offset(),
            "expected": err.expected(),
            "actual": err.actual(),
            "hint": err.hint(),
        }
    })
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let use_color = color_mode.use_color(is_tty);
        let label = if use_color {
            "\u{1b}[31merror:\u{1b}[0m"
        } else {
            "error:"
        };
        eprintln!("{label} {err}");
        if let Some(hint) = err.hint() {
            eprintln!("  hint: {hint}");
        }
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}
