use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use services::{Clock, LogReporter, TrackerServices};
use storage::CourseCatalog;

mod args;
mod render;

use args::{Cli, Command, Metric};

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite::memory:")
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
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
    if db_url.starts_with("sqlite::memory:") || db_url.starts_with("sqlite:file:") {
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

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The database file must exist before sqlx opens it without create_if_missing.
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;
    let services = TrackerServices::new_sqlite(
        &db_url,
        CourseCatalog::new(&cli.courses),
        Clock::default_clock(),
        Arc::new(LogReporter),
    )
    .await?;

    match cli.command {
        Command::Status { all } => {
            let courses = if all {
                services.courses().await?
            } else {
                services.active_courses().await?
            };
            if courses.is_empty() {
                if all {
                    println!("no courses in {}", services.catalog().root().display());
                } else {
                    println!("no active courses; add one with `tracker activate <COURSE>`");
                }
            }
            for summary in services.overview().course_summaries(&courses).await? {
                println!("{}", render::course_line(&summary));
            }
        }
        Command::Activate { courses, only } => {
            if only {
                services
                    .set_active_courses(&courses.into_iter().collect::<BTreeSet<_>>())
                    .await?;
            } else {
                for course in courses {
                    services.set_course_active(course, true).await?;
                }
            }
        }
        Command::Deactivate { course } => {
            services.set_course_active(course, false).await?;
        }
        Command::History { metric } => {
            let overview = services.overview().overview().await?;
            let (map, total) = match metric {
                Metric::Time => {
                    let total = render::today_total(&overview.time) / 60.0;
                    (&overview.time, format!("{total:.0} min today"))
                }
                Metric::Chapters => {
                    let total = render::today_total(&overview.chapters);
                    (&overview.chapters, format!("{total} chapters today"))
                }
            };
            print!("{}", render::heatmap(map));
            println!("{total}");
        }
        Command::Toggle {
            course,
            identifier,
            book,
            uncheck,
        } => {
            let course = services.course(course).await?;
            let mut session = services.open_session(course, book, None).await?;
            if session.model().chapter_of(&identifier).is_none() {
                log::warn!("{identifier} is not a section of textbook {book}");
            }
            session.toggle(&identifier, !uncheck).await;
            if let Some(next) = session.next_actionable_item() {
                println!("next: {next}");
            }
            let progress = session.progress();
            println!(
                "{}/{} chapters complete",
                progress.completion[book].completed_chapters,
                progress.completion[book].completable_chapters
            );
            session.close().await?;
        }
        Command::Complete { course } => {
            let course = services.course(course).await?;
            services.progress_store(course).await?.mark_course_complete().await?;
        }
        Command::Clear { course } => {
            let course = services.course(course).await?;
            services.progress_store(course).await?.clear_course_progress().await?;
        }
        Command::Study {
            course,
            book,
            minutes,
        } => {
            let course = services.course(course).await?;
            let session = services.open_session(Arc::clone(&course), book, None).await?;
            log::info!("studying {}; press Ctrl-C to stop", course.title);
            match minutes {
                Some(minutes) => {
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_secs(minutes.saturating_mul(60))) => {}
                        result = tokio::signal::ctrl_c() => result?,
                    }
                }
                None => tokio::signal::ctrl_c().await?,
            }
            let seconds = session.store().time_today();
            session.close().await?;
            println!("{} min studied today", seconds / 60);
        }
        Command::Settings(changes) => {
            let settings = if changes.is_empty() {
                services.settings().load().await?
            } else {
                services.settings().update(changes.to_draft()).await?
            };
            println!("{}", render::settings(&settings));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
