use std::fmt;
use std::sync::Arc;

use drill_core::Clock;
use drill_core::model::{Item, ItemBank, ItemId, SessionId};
use services::{
    HttpAggregator, Phase, ResultAggregator, ResultReporter, ScriptedCapture, SessionWorkflow,
    SpeechVerifier,
};
use storage::repository::Storage;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidSessionId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid --session-id value: {raw}"),
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
    eprintln!("  cargo run -p app -- run       [--db <sqlite_url>] [--session-id <id>] [--name <participant>]");
    eprintln!("  cargo run -p app -- reconcile [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://drill.sqlite3");
    eprintln!("  --session-id local-device");
    eprintln!("  --name Demo");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DRILL_DB_URL, DRILL_SESSION_ID, DRILL_RESULTS_URL");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Reconcile,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "reconcile" => Some(Self::Reconcile),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    session_id: SessionId,
    name: String,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("DRILL_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://drill.sqlite3".into(), normalize_sqlite_url);
        let mut session_id = std::env::var("DRILL_SESSION_ID")
            .ok()
            .and_then(|raw| SessionId::new(raw).ok())
            .unwrap_or_else(|| SessionId::new("local-device").expect("non-empty literal"));
        let mut name = "Demo".to_string();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--session-id" => {
                    let value = require_value(args, "--session-id")?;
                    session_id = SessionId::new(value.clone())
                        .map_err(|_| ArgsError::InvalidSessionId { raw: value })?;
                }
                "--name" => {
                    name = require_value(args, "--name")?;
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
            session_id,
            name,
        })
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

/// A tiny built-in bank so the binary is runnable without external content.
fn demo_bank() -> ItemBank {
    ItemBank::new(vec![
        Item::multiple_choice(
            ItemId::new(1),
            "Which animal says meow?",
            vec!["dog".into(), "cat".into(), "bird".into()],
            1,
            "Cats meow; dogs bark.",
            "animals",
        )
        .expect("valid demo item"),
        Item::spoken_repetition(
            ItemId::new(2),
            "Repeat after me: I see a cat",
            "Say the sentence aloud.",
            "sentences",
        )
        .expect("valid demo item"),
        Item::multiple_choice(
            ItemId::new(3),
            "Which animal barks?",
            vec!["dog".into(), "cat".into(), "fish".into()],
            0,
            "Dogs bark.",
            "animals",
        )
        .expect("valid demo item"),
    ])
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    let aggregator = HttpAggregator::from_env()
        .map(|a| Arc::new(a) as Arc<dyn ResultAggregator>);
    let reporter = ResultReporter::new(aggregator, Arc::clone(&storage.result_queue));

    // Flush anything stranded by earlier offline runs.
    let reconciled = reporter.reconcile().await;
    if reconciled > 0 {
        println!("reconciled {reconciled} queued result(s)");
    }
    if cmd == Command::Reconcile {
        return Ok(());
    }

    // The demo answers through a scripted capture backend; a real client
    // plugs a microphone-backed SpeechCapture in here.
    let capture = Arc::new(ScriptedCapture::new());
    capture.push_transcript("I see a cat.");
    let verifier = SpeechVerifier::new(capture);

    let mut session = SessionWorkflow::new(
        Clock::default_clock(),
        parsed.session_id.clone(),
        demo_bank(),
        Arc::clone(&storage.sessions),
        reporter,
        verifier,
    )?;

    // Pick up an interrupted run on this device, or start fresh.
    match session.resume().await {
        Ok(Phase::Finished) => {
            println!("session {} already finished", parsed.session_id);
            return Ok(());
        }
        Ok(_) => println!("resumed session {}", parsed.session_id),
        Err(services::SessionError::NothingToResume) => {
            session.begin(&parsed.name).await?;
            println!("started session {} for {}", parsed.session_id, parsed.name);
        }
        Err(e) => return Err(e.into()),
    }

    while session.phase() == Phase::InProgress {
        let Some(item) = session.current_item() else {
            break;
        };
        println!("[{}] {}", item.category(), item.prompt());

        let outcome = match item.kind() {
            drill_core::model::ItemKind::MultipleChoice => {
                // The demo always picks the first option.
                session.submit_choice(0).await?
            }
            drill_core::model::ItemKind::SpokenRepetition => session.submit_speech().await?,
        };
        println!(
            "  {} (+{} points)",
            if outcome.is_correct { "correct" } else { "incorrect" },
            outcome.points_awarded
        );
        session.advance().await?;
    }

    if let Some(state) = session.state() {
        println!(
            "finished: {} points, {}/{} correct",
            state.score(),
            state.correct_count(),
            state.items_answered()
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
