use std::fmt;

use quiz_core::model::{SessionKind, SessionState};
use services::{ApiConfig, Clock, QuizService, StartRequest};
use storage::repository::Storage;

mod terminal;

const DEFAULT_DB_URL: &str = "sqlite:quiz.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidCount { raw: String },
    InvalidKind { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCount { raw } => write!(f, "invalid --count value: {raw}"),
            ArgsError::InvalidKind { raw } => {
                write!(f, "invalid --kind value: {raw} (expected quiz or test)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz play    [--db <sqlite_url>] [--api <base_url>] [--kind quiz|test]");
    eprintln!("               [--subject <id>] [--topic <id>] [--count <n>]");
    eprintln!("  quiz status  [--db <sqlite_url>]");
    eprintln!("  quiz discard [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --kind quiz");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_API_BASE_URL, QUIZ_API_TOKEN, QUIZ_API_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Status,
    Discard,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "status" => Some(Self::Status),
            "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    db_url: String,
    api_base_url: Option<String>,
    start: StartRequest,
}

impl Args {
    fn parse(
        command: Command,
        args: &mut impl Iterator<Item = String>,
        env_db_url: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env_db_url.map_or_else(
            || normalize_sqlite_url(DEFAULT_DB_URL.to_owned()),
            normalize_sqlite_url,
        );
        let mut api_base_url = None;
        let mut start = StartRequest::new(SessionKind::Quiz);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--api" if command == Command::Play => {
                    api_base_url = Some(require_value(args, "--api")?);
                }
                "--kind" if command == Command::Play => {
                    let value = require_value(args, "--kind")?;
                    start.kind = parse_kind(&value)?;
                }
                "--subject" if command == Command::Play => {
                    start.subject_id = Some(require_value(args, "--subject")?);
                }
                "--topic" if command == Command::Play => {
                    start.topic_id = Some(require_value(args, "--topic")?);
                }
                "--count" if command == Command::Play => {
                    let value = require_value(args, "--count")?;
                    let count = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidCount { raw: value })?;
                    start.question_count = Some(count);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            api_base_url,
            start,
        })
    }
}

fn parse_kind(raw: &str) -> Result<SessionKind, ArgsError> {
    match raw {
        "quiz" => Ok(SessionKind::Quiz),
        "test" | "comprehensive" | "comprehensive_test" => Ok(SessionKind::ComprehensiveTest),
        _ => Err(ArgsError::InvalidKind {
            raw: raw.to_owned(),
        }),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn api_config(base_url: Option<&str>) -> Result<ApiConfig, Box<dyn std::error::Error>> {
    let lookup = |var: &str| std::env::var(var).ok();
    let config = match base_url {
        Some(url) => ApiConfig::from_lookup(|var| {
            if var == services::config::BASE_URL_VAR {
                Some(url.to_owned())
            } else {
                lookup(var)
            }
        })?,
        None => ApiConfig::from_lookup(lookup)?,
    };
    Ok(config)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(cmd, &mut argv, std::env::var("QUIZ_DB_URL").ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let clock = Clock::system();

    match cmd {
        Command::Play => {
            let config = api_config(parsed.api_base_url.as_deref())?;
            tracing::info!(base_url = %config.base_url, db = %parsed.db_url, "starting");
            let service = QuizService::http(config, clock)?.with_store(storage.sessions());
            terminal::play(&service, &parsed.start).await
        }
        Command::Status => {
            let Some(snapshot) = storage
                .sessions()
                .load(SessionKind::ComprehensiveTest)
                .await?
            else {
                println!("No comprehensive test in progress.");
                return Ok(());
            };
            let state = SessionState::restore(snapshot)?;
            print_status(&state, &clock);
            Ok(())
        }
        Command::Discard => {
            storage
                .sessions()
                .clear(SessionKind::ComprehensiveTest)
                .await?;
            println!("Discarded saved comprehensive test.");
            Ok(())
        }
    }
}

fn print_status(state: &SessionState, clock: &Clock) {
    let now = clock.now();
    let progress = state.progress();
    println!(
        "Comprehensive test {}",
        state
            .session_id()
            .map_or_else(|| "(no id)".to_owned(), ToString::to_string)
    );
    println!(
        "  question {}/{}, answered {}/{}",
        state.current_index() + 1,
        progress.total,
        progress.answered,
        progress.total
    );
    println!("  elapsed {}", terminal::format_secs(state.elapsed_secs(now)));
    if let Some(remaining) = state.remaining_secs(now) {
        println!("  remaining {}", terminal::format_secs(remaining));
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
