//! Purpose: `ddmsence-site` CLI entry point.
//! Role: Binary crate root; parses args, dispatches commands, reports errors.
//! Invariants: Machine-readable output goes to stdout as JSON.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `to_exit_code`.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod command_dispatch;

use ddmsence_site::core::config::{ConfigFile, ConfigOverrides, SiteConfig};
use ddmsence_site::core::error::{Error, ErrorKind, to_exit_code};

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
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
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
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `ddmsence-site --help`."));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command, cli.config).map_err(add_hint)
}

#[derive(Parser)]
#[command(
    name = "ddmsence-site",
    version,
    about = "Serve the DDMSence documentation website",
    long_about = None,
    after_help = r#"EXAMPLES
  $ ddmsence-site serve
  $ ddmsence-site serve --bind 0.0.0.0:8080 --base-url https://ddmsence.urizone.net
  $ ddmsence-site serve --dev --templates-dir ./templates
  $ ddmsence-site serve check --json
  $ ddmsence-site routes
  $ ddmsence-site render /downloads.jsp > downloads.html"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "DDMSENCE_CONFIG",
        value_name = "PATH",
        help = "TOML config file (flags and DDMSENCE_* env vars take precedence)",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Serve the site over HTTP",
        long_about = r#"Serve the site over HTTP.

Pages come from the built-in route table; assets are read from --static-dir."#,
        after_help = r#"EXAMPLES
  $ ddmsence-site serve
  $ ddmsence-site serve --static-dir /srv/ddmsence/static
  $ ddmsence-site serve check

NOTES
  - `/` redirects to /index.jsp
  - Unknown paths and missing assets get the rendered 404 page
  - --dev re-reads templates from disk on every request
  - Logging follows RUST_LOG (default: info)"#
    )]
    Serve {
        #[command(subcommand)]
        subcommand: Option<ServeSubcommand>,
        #[command(flatten)]
        site: SiteArgs,
    },
    #[command(about = "Print the route table as JSON")]
    Routes,
    #[command(
        arg_required_else_help = true,
        about = "Render one page to stdout",
        after_help = r#"EXAMPLES
  $ ddmsence-site render /index.jsp
  $ ddmsence-site render /license.jsp --base-url https://ddmsence.urizone.net

NOTES
  - Unknown paths print the 404 page and exit with code 3"#
    )]
    Render {
        #[arg(help = "Page path, e.g. /downloads.jsp")]
        path: String,
        #[command(flatten)]
        site: SiteArgs,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ServeSubcommand {
    #[command(
        about = "Validate config, render every template, and report static mounts without serving",
        after_help = r#"NOTES
  - Exits non-zero when config or templates are invalid
  - Missing static mounts are reported but do not fail the check"#
    )]
    Check {
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
}

#[derive(Args, Clone, Debug)]
struct SiteArgs {
    #[arg(
        long,
        env = "DDMSENCE_BIND",
        value_name = "ADDR",
        help = "Bind address (default: 127.0.0.1:8080)",
        help_heading = "Connection"
    )]
    bind: Option<String>,
    #[arg(
        long,
        env = "DDMSENCE_BASE_URL",
        value_name = "URL",
        help = "Public base URL used for canonical links (default: http://<bind>)",
        help_heading = "Site"
    )]
    base_url: Option<String>,
    #[arg(
        long,
        env = "DDMSENCE_STATIC_DIR",
        value_name = "PATH",
        help = "Directory holding robots.txt, css/, docs/, files/, images/, js/ (default: ./static)",
        value_hint = ValueHint::DirPath,
        help_heading = "Site"
    )]
    static_dir: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Load templates from this directory instead of the built-in set",
        value_hint = ValueHint::DirPath,
        help_heading = "Site"
    )]
    templates_dir: Option<PathBuf>,
    #[arg(
        long,
        help = "Development mode: reload templates from disk on every render",
        help_heading = "Site"
    )]
    dev: bool,
}

impl SiteArgs {
    fn resolve(self, config_path: Option<&PathBuf>) -> Result<SiteConfig, Error> {
        let file = config_path.map(|path| ConfigFile::load(path)).transpose()?;
        let overrides = ConfigOverrides {
            bind: self.bind,
            base_url: self.base_url,
            static_dir: self.static_dir,
            templates_dir: self.templates_dir,
            dev: self.dev,
        };
        SiteConfig::resolve(overrides, file)
    }
}

fn add_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Template => {
            err.with_hint("Run `ddmsence-site serve check` to see which template fails.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path and permissions."),
        ErrorKind::Internal => err.with_hint(
            "Unexpected internal failure. Retry with RUST_LOG=debug and report it if it persists.",
        ),
        _ => err,
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Template => "template error".to_string(),
        ErrorKind::Config => "config error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut next = std::error::Error::source(err);
    while let Some(cause) = next {
        causes.push(cause.to_string());
        next = cause.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    for cause in error_causes(err) {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
