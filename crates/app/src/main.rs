mod seed;

use std::fmt;
use std::path::PathBuf;

use academy_core::model::{CourseId, Identity, LearnerId, LessonId};
use services::{AppServices, Clock, IdentityProvider, ProgressConfig, RestStoreConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingLesson,
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingLesson => write!(f, "complete requires a lesson id"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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
    eprintln!("  academy seed         [--db <sqlite_url>]");
    eprintln!("  academy status       [--db <sqlite_url>] [--cache-dir <dir>] [--learner <id>]");
    eprintln!("  academy complete <lesson_id> [--course <id>] [--learner <id>] [...]");
    eprintln!("  academy certificates [--learner <id>] [--name <display name>] [...]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:academy.sqlite3");
    eprintln!("  --cache-dir .academy-cache");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ACADEMY_DB_URL, ACADEMY_LEARNER, ACADEMY_CACHE_DIR, ACADEMY_CACHE_KEY");
    eprintln!("  ACADEMY_REST_URL, ACADEMY_REST_KEY  (remote progress store)");
    eprintln!("  ACADEMY_REST_TOKEN                  (optional session token for the store)");
    eprintln!("  RUST_LOG (default: info)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Seed,
    Status,
    Complete,
    Certificates,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "seed" => Some(Self::Seed),
            "status" => Some(Self::Status),
            "complete" => Some(Self::Complete),
            "certificates" => Some(Self::Certificates),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    progress: ProgressConfig,
    learner: Option<LearnerId>,
    display_name: Option<String>,
    lesson: Option<LessonId>,
    course: Option<CourseId>,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ACADEMY_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("academy.sqlite3".into()), normalize_sqlite_url);
        let mut progress = ProgressConfig::from_env();
        let mut learner = std::env::var("ACADEMY_LEARNER")
            .ok()
            .and_then(|raw| LearnerId::new(raw).ok());
        let mut display_name = None;
        let mut lesson = None;
        let mut course = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--cache-dir" => {
                    let value = require_value(args, "--cache-dir")?;
                    progress = progress.with_cache_dir(PathBuf::from(value));
                }
                "--learner" => {
                    let value = require_value(args, "--learner")?;
                    learner = Some(parse_id(&value, "--learner", LearnerId::new)?);
                }
                "--name" => display_name = Some(require_value(args, "--name")?),
                "--course" => {
                    let value = require_value(args, "--course")?;
                    course = Some(parse_id(&value, "--course", CourseId::new)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if cmd == Command::Complete && lesson.is_none() && !other.starts_with("--") => {
                    lesson = Some(parse_id(other, "lesson", LessonId::new)?);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if cmd == Command::Complete && lesson.is_none() {
            return Err(ArgsError::MissingLesson);
        }

        Ok(Self {
            db_url,
            progress,
            learner,
            display_name,
            lesson,
            course,
        })
    }

    fn identity(&self) -> Option<Identity> {
        let learner = self.learner.clone()?;
        let identity = Identity::new(learner);
        Some(match &self.display_name {
            Some(name) => identity.with_display_name(name.clone()),
            None => identity,
        })
    }
}

fn parse_id<T, E>(
    raw: &str,
    flag: &'static str,
    parse: impl FnOnce(String) -> Result<T, E>,
) -> Result<T, ArgsError> {
    parse(raw.to_owned()).map_err(|_| ArgsError::InvalidId {
        flag,
        raw: raw.to_owned(),
    })
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
            .unwrap_or_else(|_| PathBuf::from("."))
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

/// Sign the learner in (or stay anonymous) and wait for the first reconciliation.
async fn sync_identity(app: &AppServices, identity: Option<Identity>) {
    if let Some(identity) = identity {
        app.identity().sign_in(identity);
    }
    app.tracker()
        .reconcile(app.identity().current_identity())
        .await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Status,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Status,
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
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let rest = RestStoreConfig::from_env()?;
    let app = AppServices::new_sqlite(&parsed.db_url, &parsed.progress, rest, Clock::system()).await?;

    match cmd {
        Command::Seed => seed_catalog(&app, &parsed.db_url).await?,
        Command::Complete => complete(&app, &parsed).await?,
        Command::Status => status(&app, &parsed).await?,
        Command::Certificates => certificates(&app, &parsed).await?,
    }

    for failure in app.tracker().recent_failures() {
        tracing::warn!(kind = %failure.kind(), operation = ?failure.operation, "progress not fully synced");
    }
    Ok(())
}

async fn seed_catalog(app: &AppServices, db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = app.catalog();
    for course in seed::demo_catalog()? {
        catalog.publish(&course).await?;
    }
    println!("seeded demo catalog into {db_url}");
    Ok(())
}

async fn complete(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let Some(lesson) = args.lesson.clone() else {
        return Err(ArgsError::MissingLesson.into());
    };
    sync_identity(app, args.identity()).await;
    let tracker = app.tracker();

    if let Some(write) = tracker.complete_lesson(lesson.clone(), args.course.clone()) {
        write.await?;
    }
    println!("completed {lesson}");
    if let Some(course_id) = &args.course {
        let ids = app.catalog().lesson_ids(course_id).await?;
        let pct = tracker.get_progress(course_id, ids.len(), Some(ids.as_slice()));
        println!("{course_id}: {pct}%");
    }
    Ok(())
}

async fn status(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    sync_identity(app, args.identity()).await;
    let summary = app.dashboard().summary(app.tracker()).await?;

    println!(
        "{} of {} lessons completed ({}%)",
        summary.completed_lessons, summary.total_lessons, summary.global_percentage
    );
    for card in summary.courses {
        let resume = card
            .resume_lesson_id
            .map_or_else(|| "-".to_owned(), |id| id.to_string());
        println!(
            "  {:<40} {:>3}%  {}/{}  next: {resume}",
            card.title,
            card.progress.percentage,
            card.progress.completed_count,
            card.progress.total_count
        );
    }
    Ok(())
}

async fn certificates(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let identity = args.identity();
    sync_identity(app, identity.clone()).await;
    let overview = app
        .certificates()
        .overview(app.tracker(), identity.as_ref())
        .await?;

    if overview.earned.is_empty() {
        println!("no certificates yet");
    }
    for cert in &overview.earned {
        println!(
            "  [certificate] {} - {} ({})",
            cert.course_title,
            cert.holder_name,
            cert.issued_at.format("%Y-%m-%d")
        );
    }
    for card in &overview.in_progress {
        println!("  [in progress] {} {}%", card.title, card.progress.percentage);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(cmd: Command, args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|a| (*a).to_owned());
        Args::parse(cmd, &mut iter)
    }

    #[test]
    fn complete_takes_lesson_and_course() {
        let args = parse(
            Command::Complete,
            &["L9", "--course", "C1", "--learner", "u1", "--db", "sqlite::memory:"],
        )
        .unwrap();
        assert_eq!(args.lesson.unwrap().as_str(), "L9");
        assert_eq!(args.course.unwrap().as_str(), "C1");
        assert_eq!(args.db_url, "sqlite::memory:");
    }

    #[test]
    fn complete_without_lesson_is_rejected() {
        assert!(matches!(
            parse(Command::Complete, &["--course", "C1"]),
            Err(ArgsError::MissingLesson)
        ));
        assert!(matches!(
            parse(Command::Status, &["L9"]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn blank_name_leaves_display_name_unset() {
        let args = parse(Command::Certificates, &["--learner", "u1", "--name", "  "]).unwrap();
        assert_eq!(args.identity().unwrap().display_name, None);
    }
}
