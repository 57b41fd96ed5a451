//! tutor-admin: maintenance commands for the tutor database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};

use services::{
    ContentError, ContentGenerator, PlanOverview, QuestionRequest, StatsReport, TopicStatus,
    TutorConfig, TutorServices, parse_quiz_json,
};
use storage::repository::Storage;
use tutor_core::Clock;
use tutor_core::model::{
    Learner, LearnerId, Proficiency, QuizDraft, StudyPlanDraft, TopicDraft, ValidatedQuiz,
    VocabularyEntry,
};

#[derive(Parser)]
#[command(name = "tutor-admin", version, about = "Manage learners and study plans")]
struct Cli {
    /// SQLite database URL or path (overrides TUTOR_DB_URL)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database if needed and apply migrations
    Migrate,

    /// Register a learner with a study plan
    Enroll {
        #[arg(long)]
        learner: u64,

        /// beginner, intermediate or advanced
        #[arg(long, default_value = "beginner")]
        proficiency: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        goal: Option<String>,

        /// Topic names in study order
        #[arg(long, value_delimiter = ',', required = true)]
        topics: Vec<String>,
    },

    /// Import vocabulary from a tab separated file (word, translation, optional tag)
    Vocabulary {
        #[arg(long)]
        file: PathBuf,
    },

    /// Show a learner's progress through their plan
    Overview {
        #[arg(long)]
        learner: u64,

        #[arg(long)]
        json: bool,
    },

    /// Show a learner's answer statistics
    Stats {
        #[arg(long)]
        learner: u64,

        #[arg(long)]
        json: bool,
    },

    /// Move a learner's current topic forward
    Advance {
        #[arg(long)]
        learner: u64,
    },

    /// Move a learner's current topic back
    Retreat {
        #[arg(long)]
        learner: u64,
    },

    /// Check a saved generator reply the way assignments do
    CheckQuiz {
        #[arg(long)]
        file: PathBuf,
    },
}

/// Stand-in for commands that never generate quizzes.
struct NoContent;

#[async_trait]
impl ContentGenerator for NoContent {
    async fn generate_question(&self, _request: &QuestionRequest) -> Result<QuizDraft, ContentError> {
        Err(ContentError::Generator(
            "tutor-admin has no content generator".into(),
        ))
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid database url: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}

fn parse_vocabulary(contents: &str) -> anyhow::Result<Vec<VocabularyEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(word), Some(translation)) = (fields.next(), fields.next()) else {
            bail!("line {}: expected word<TAB>translation[<TAB>tag]", idx + 1);
        };
        entries.push(VocabularyEntry::new(
            word.trim(),
            translation.trim(),
            fields.next(),
        ));
    }
    Ok(entries)
}

fn check_quiz(reply: &str) -> anyhow::Result<ValidatedQuiz> {
    let draft = parse_quiz_json(reply)?;
    Ok(draft.validate()?)
}

fn print_quiz(quiz: &ValidatedQuiz) {
    if !quiz.lesson().is_empty() {
        println!("{}\n", quiz.lesson());
    }
    println!("{}", quiz.question());
    for (idx, option) in quiz.options().iter().enumerate() {
        let marker = if idx == quiz.correct_index() { '*' } else { ' ' };
        println!("{marker} {}. {option}", idx + 1);
    }
}

fn print_overview(overview: &PlanOverview) {
    println!(
        "learner {} plan {}: {}/{} topics completed",
        overview.learner_id,
        overview.plan_id,
        overview.completed_count(),
        overview.topics.len()
    );
    for row in &overview.topics {
        let status = match row.status {
            TopicStatus::NotStarted => "not started",
            TopicStatus::InProgress => "in progress",
            TopicStatus::Completed => "completed",
        };
        let marker = if row.is_current { '>' } else { ' ' };
        println!(
            "{marker} {:>3}. {:<30} {:<11} {} (streak {})",
            row.topic.position(),
            row.topic.name(),
            status,
            row.bloom_level,
            row.correct_streak
        );
    }
}

fn print_stats(report: &StatsReport) {
    println!(
        "learner {}: {} answers, {} correct ({:.1}%), active on {} day(s)",
        report.learner_id,
        report.total_attempts,
        report.correct_attempts,
        report.accuracy,
        report.active_days
    );
    for attempt in &report.recent {
        let mark = if attempt.is_correct { "ok " } else { "bad" };
        println!(
            "  {mark} {} [{}] {}",
            attempt.answered_at.format("%Y-%m-%d %H:%M"),
            attempt.bloom_level,
            attempt.question
        );
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::CheckQuiz { file } = &cli.command {
        let reply = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let quiz = check_quiz(&reply).context("generator reply rejected")?;
        print_quiz(&quiz);
        return Ok(());
    }

    let mut config = TutorConfig::from_env().context("reading TUTOR_* configuration")?;
    if let Some(db) = cli.db {
        config.db_url = db;
    }
    config.db_url = normalize_sqlite_url(&config.db_url);
    prepare_sqlite_file(&config.db_url)?;

    let clock = Clock::default();
    if matches!(cli.command, Command::Migrate) {
        Storage::sqlite(&config.db_url)
            .await
            .context("opening database")?;
        tracing::info!(db = %config.db_url, "database migrated");
        return Ok(());
    }

    let services = TutorServices::new_sqlite(&config, clock, Arc::new(NoContent))
        .await
        .context("opening database")?;

    match cli.command {
        Command::Migrate | Command::CheckQuiz { .. } => {}
        Command::Enroll {
            learner,
            proficiency,
            name,
            goal,
            topics,
        } => {
            let proficiency = Proficiency::parse(&proficiency)?;
            let mut profile = Learner::new(LearnerId::new(learner), proficiency, clock.now());
            if let Some(name) = name {
                profile = profile.with_display_name(name);
            }
            if let Some(goal) = goal {
                profile = profile.with_goal(goal);
            }
            let draft = StudyPlanDraft {
                learner_id: profile.id(),
                topics: topics
                    .iter()
                    .map(|name| TopicDraft::new(name.trim(), ""))
                    .collect(),
            };
            let plan = services.enroll(&profile, draft).await?;
            println!("enrolled learner {} with plan {} ({} topics)", learner, plan.id(), plan.len());
        }
        Command::Vocabulary { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let entries = parse_vocabulary(&contents)?;
            let stored = services
                .storage()
                .vocabulary
                .insert_vocabulary(&entries)
                .await?;
            println!("imported {stored} vocabulary entries");
        }
        Command::Overview { learner, json } => {
            let overview = services
                .reports()
                .plan_overview(LearnerId::new(learner))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                print_overview(&overview);
            }
        }
        Command::Stats { learner, json } => {
            let report = services
                .reports()
                .learner_stats(LearnerId::new(learner))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_stats(&report);
            }
        }
        Command::Advance { learner } => {
            match services.sequencer().advance(LearnerId::new(learner)).await? {
                Some(topic) => println!("now on {}. {}", topic.position(), topic.name()),
                None => println!("already on the last topic"),
            }
        }
        Command::Retreat { learner } => {
            match services.sequencer().retreat(LearnerId::new(learner)).await? {
                Some(topic) => println!("now on {}. {}", topic.position(), topic.name()),
                None => println!("already on the first topic"),
            }
        }
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

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::PartOfSpeech;

    #[test]
    fn relative_paths_become_absolute_urls() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/t.db"),
            "sqlite:///tmp/t.db"
        );
        let url = normalize_sqlite_url("sqlite:tutor.sqlite3");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("tutor.sqlite3"));
    }

    #[test]
    fn vocabulary_file_is_tab_separated() {
        let entries = parse_vocabulary("# header\nvoda\twater\tn.\n\ni\tand\n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].word_class(), Some(PartOfSpeech::Noun));
        assert_eq!(entries[1].part_of_speech, None);

        assert!(parse_vocabulary("lonely").is_err());
    }

    #[test]
    fn quiz_replies_are_parsed_then_validated() {
        let quiz = check_quiz(
            "```json\n{\"lesson\":\"\",\"question\":\"Az?\",\"options\":[\"a\",\"b\"],\"correct_answer\":\"b\"}\n```",
        )
        .unwrap();
        assert_eq!(quiz.correct_index(), 1);

        let malformed = check_quiz("not json").unwrap_err();
        assert!(malformed.downcast_ref::<ContentError>().is_some());

        let invalid =
            check_quiz(r#"{"lesson":"","question":"Az?","options":["a","a"],"correct_answer":"a"}"#)
                .unwrap_err();
        assert!(
            invalid
                .downcast_ref::<tutor_core::model::QuizValidationError>()
                .is_some()
        );
    }

    #[test]
    fn cli_parses_topic_list() {
        let cli = Cli::parse_from([
            "tutor-admin",
            "enroll",
            "--learner",
            "3",
            "--topics",
            "Alphabet,Nouns",
        ]);
        match cli.command {
            Command::Enroll { learner, topics, .. } => {
                assert_eq!(learner, 3);
                assert_eq!(topics, ["Alphabet", "Nouns"]);
            }
            _ => panic!("expected enroll"),
        }
    }
}
