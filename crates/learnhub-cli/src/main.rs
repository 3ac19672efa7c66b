//! learnhub - a terminal client for the learnhub course platform.
//!
//! Signs in, keeps the session token in the OS keychain, and shows the
//! views the web client offers as plain text.

mod app;
mod render;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

const USAGE: &str = "\
Usage: learnhub [--ephemeral] [--log-file <path>] <command>

Commands:
  login [email]     Sign in and remember the session
  register          Create an account
  logout            Sign out and forget the stored token
  whoami            Show the signed-in user
  dashboard         Popular courses and your enrollments
  open <path>       Open a view, e.g. /courses/3 or /notifications
  watch             Follow the unread notification count until Ctrl-C

Options:
  --ephemeral       Keep the token in memory only for this run
  --log-file <path> Write logs to a daily rolling file instead of stderr

Environment:
  LEARNHUB_BASE_URL, LEARNHUB_EMAIL, LEARNHUB_PASSWORD, RUST_LOG";

/// Parsed command line.
#[derive(Debug, PartialEq)]
pub struct Args {
    pub ephemeral: bool,
    pub log_file: Option<PathBuf>,
    pub command: Command,
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Login { email: Option<String> },
    Register,
    Logout,
    Whoami,
    Dashboard,
    Open { path: String },
    Watch,
    Help,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut ephemeral = false;
    let mut log_file = None;
    let mut positional = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--ephemeral" => ephemeral = true,
            "--log-file" => match iter.next() {
                Some(path) => log_file = Some(PathBuf::from(path)),
                None => bail!("--log-file needs a path"),
            },
            "-h" | "--help" => positional.insert(0, "help".to_string()),
            flag if flag.starts_with("--") => bail!("Unknown option {}", flag),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("help") => Command::Help,
        Some("login") => Command::Login {
            email: positional.next(),
        },
        Some("register") => Command::Register,
        Some("logout") => Command::Logout,
        Some("whoami") => Command::Whoami,
        Some("dashboard") => Command::Dashboard,
        Some("open") => match positional.next() {
            Some(path) => Command::Open { path },
            None => bail!("open needs a path, e.g. learnhub open /courses"),
        },
        Some("watch") => Command::Watch,
        Some(other) => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    };

    Ok(Args {
        ephemeral,
        log_file,
        command,
    })
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr unless a log file is given. The returned guard must be
/// held until exit so buffered file output is flushed.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "learnhub.log".into());
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = parse_args(std::env::args().skip(1))?;
    if args.command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _guard = init_tracing(args.log_file.as_deref());
    info!(command = ?args.command, "learnhub starting");

    let mut app = App::new(args.ephemeral)?;
    app.run(args.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&[]).unwrap().command, Command::Help);
        assert_eq!(parse(&["whoami"]).unwrap().command, Command::Whoami);
        assert_eq!(
            parse(&["login", "user@example.com"]).unwrap().command,
            Command::Login {
                email: Some("user@example.com".to_string())
            }
        );
        assert_eq!(
            parse(&["open", "/courses/3"]).unwrap().command,
            Command::Open {
                path: "/courses/3".to_string()
            }
        );
        assert!(parse(&["open"]).is_err());
        assert!(parse(&["fly"]).is_err());
    }

    #[test]
    fn test_parse_flags() {
        let args = parse(&["--ephemeral", "watch", "--log-file", "/tmp/learnhub.log"]).unwrap();
        assert!(args.ephemeral);
        assert_eq!(args.log_file, Some(PathBuf::from("/tmp/learnhub.log")));
        assert_eq!(args.command, Command::Watch);

        assert!(parse(&["--log-file"]).is_err());
        assert!(parse(&["--verbose", "whoami"]).is_err());
        assert_eq!(parse(&["whoami", "--help"]).unwrap().command, Command::Help);
    }
}
