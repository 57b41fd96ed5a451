#![forbid(unsafe_code)]

pub mod app_services;
pub mod assignment;
pub mod config;
pub mod content;
pub mod error;
pub mod mastery;
pub mod progression;
pub mod quiz_sessions;
pub mod reports;
pub mod sequencer;
pub mod vocabulary;

pub use tutor_core::Clock;

pub use app_services::TutorServices;
pub use assignment::{Assignment, AssignmentService};
pub use config::TutorConfig;
pub use content::{ContentGenerator, QuestionRequest, parse_quiz_json};
pub use error::{
    AssignmentError, ConfigError, ContentError, ProgressionError, ReportError, SequencerError,
    TutorServicesError,
};
pub use mastery::MasteryService;
pub use progression::{ProgressionOrchestrator, ProgressionResult};
pub use quiz_sessions::{LearnerSessionGuard, QuizSessionManager};
pub use reports::{PlanOverview, ProgressReportService, StatsReport, TopicProgress, TopicStatus};
pub use sequencer::TopicSequencer;
pub use vocabulary::VocabularySelector;
