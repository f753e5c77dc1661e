pub mod browser;
pub mod cli;
pub mod config;
pub mod cover_letter;
pub mod delay_manager;
pub mod evaluator;
pub mod extractor;
pub mod job;
pub mod ledger;
pub mod logger;
pub mod pipeline;
pub mod review;
pub mod scraper;
pub mod storage;

// Exporting types for convenience
pub use crate::browser::{Browser, ChromeBrowser, HttpBrowser, PageSession};
pub use crate::config::AppConfig;
pub use crate::cover_letter::{CoverLetterWriter, OllamaWriter};
pub use crate::job::{Evaluation, JobRecord, ProcessedJob, ScoredJob};
pub use crate::ledger::Ledger;
pub use crate::pipeline::{Pipeline, RunOptions, RunOutcome, RunReport};
pub use crate::scraper::Scraper;
