use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use thiserror::Error;

use crate::browser::Browser;
use crate::config::{AppConfig, ConfigError};
use crate::cover_letter::CoverLetterWriter;
use crate::evaluator;
use crate::extractor;
use crate::job::{self, CoverLetter, JobRecord, ProcessedJob, ScoredJob};
use crate::ledger::{Ledger, LedgerError};
use crate::scraper::{ScrapeStop, Scraper};
use crate::storage::{self, StorageError};

/// Successful letters between two checkpoint writes.
const CHECKPOINT_EVERY: usize = 2;

const OUTPUT_PREFIX: &str = "matched_jobs";

pub const APPLIED_NOTE: &str = "Applied with generated cover letter";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("job not found in this run's results: {0}")]
    UnknownJob(String),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub scrape_new: bool,
    pub min_score: u32,
    pub max_pages: usize,
    pub limit: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            scrape_new: true,
            min_score: 40,
            max_pages: 1,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scrape,
    FilterApplied,
    Evaluate,
    GenerateLetters,
    Persist,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scrape => "scrape",
            Stage::FilterApplied => "filter applied",
            Stage::Evaluate => "evaluate",
            Stage::GenerateLetters => "generate letters",
            Stage::Persist => "persist",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// A stage produced nothing for the next one to work on.
    Stopped { stage: Stage, reason: String },
    Interrupted { stage: Stage },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub found: usize,
    pub rejected_cards: usize,
    pub new: usize,
    pub matched: usize,
    pub letters_ok: usize,
    pub letters_failed: usize,
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Last stage the run entered. `Report` for a run that went all the way through.
    pub last_stage: Stage,
    pub counts: StageCounts,
    /// Set when pagination ended on a page load failure.
    pub scrape_error: Option<String>,
    pub checkpoints: Vec<PathBuf>,
    pub output: Option<PathBuf>,
}

impl RunReport {
    fn new() -> Self {
        RunReport {
            outcome: RunOutcome::Completed,
            last_stage: Stage::Scrape,
            counts: StageCounts::default(),
            scrape_error: None,
            checkpoints: Vec::new(),
            output: None,
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.last_stage = stage;
    }

    fn stop(mut self, stage: Stage, reason: &str) -> Self {
        info!("Stopping after {} stage: {}", stage, reason);
        self.outcome = RunOutcome::Stopped {
            stage,
            reason: reason.to_string(),
        };
        self
    }

    fn interrupt(mut self, stage: Stage) -> Self {
        warn!("Run interrupted during {} stage", stage);
        self.outcome = RunOutcome::Interrupted { stage };
        self
    }

    pub fn log_summary(&self) {
        let c = &self.counts;
        info!(
            "Run summary: found {} (rejected cards {}), new {}, matched {}, letters {} ok / {} failed",
            c.found, c.rejected_cards, c.new, c.matched, c.letters_ok, c.letters_failed
        );
        if let Some(err) = &self.scrape_error {
            warn!("Scrape ended early: {}", err);
        }
        match &self.outcome {
            RunOutcome::Completed => {}
            RunOutcome::Stopped { stage, reason } => info!("Stopped at {}: {}", stage, reason),
            RunOutcome::Interrupted { stage } => warn!("Interrupted during {}", stage),
        }
        if let Some(path) = &self.output {
            info!("Results saved to {}", path.display());
        }
    }
}

/// Scrape → filter applied → evaluate → letters → persist → report, one stage after another.
pub struct Pipeline<'a, B, W> {
    config: &'a AppConfig,
    scraper: Scraper,
    browser: &'a B,
    writer: &'a W,
    ledger: Ledger,
    stop: Arc<AtomicBool>,
    results: Vec<ProcessedJob>,
}

impl<'a, B: Browser, W: CoverLetterWriter> Pipeline<'a, B, W> {
    pub fn new(
        config: &'a AppConfig,
        browser: &'a B,
        writer: &'a W,
        ledger: Ledger,
    ) -> Result<Self, PipelineError> {
        Ok(Pipeline {
            config,
            scraper: Scraper::new(config.site.clone())?,
            browser,
            writer,
            ledger,
            stop: Arc::new(AtomicBool::new(false)),
            results: Vec::new(),
        })
    }

    /// Shares `flag` as the stop request checked between stages and letters.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = flag;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Results of the latest run.
    pub fn results(&self) -> &[ProcessedJob] {
        &self.results
    }

    pub fn run(&mut self, opts: &RunOptions) -> Result<RunReport, PipelineError> {
        self.results.clear();
        let mut report = RunReport::new();

        info!("STEP 1: SCRAPING JOBS");
        report.enter(Stage::Scrape);
        let jobs = self.acquire(opts, &mut report)?;
        report.counts.found = jobs.len();
        if self.interrupted() {
            return Ok(report.interrupt(Stage::Scrape));
        }
        if jobs.is_empty() {
            return Ok(report.stop(Stage::Scrape, "no jobs found"));
        }

        info!("STEP 2: FILTERING ALREADY APPLIED JOBS");
        report.enter(Stage::FilterApplied);
        let fresh = self.ledger.filter_new(jobs);
        report.counts.new = fresh.len();
        info!(
            "Found {} new jobs ({} already applied overall)",
            fresh.len(),
            self.ledger.count()
        );
        if fresh.is_empty() {
            return Ok(report.stop(Stage::FilterApplied, "no new jobs to process"));
        }
        if self.interrupted() {
            return Ok(report.interrupt(Stage::FilterApplied));
        }

        info!("STEP 3: EVALUATING JOB FIT (minimum score {})", opts.min_score);
        report.enter(Stage::Evaluate);
        let matched = evaluator::evaluate_all(fresh, &self.config.profile, opts.min_score);
        report.counts.matched = matched.len();
        info!("Found {} matching jobs", matched.len());
        if matched.is_empty() {
            return Ok(report.stop(Stage::Evaluate, "no jobs matched the minimum score"));
        }
        if self.interrupted() {
            return Ok(report.interrupt(Stage::Evaluate));
        }

        info!("STEP 4: GENERATING COVER LETTERS");
        report.enter(Stage::GenerateLetters);
        if !self.generate_letters(matched, &mut report) {
            self.persist(&mut report)?;
            return Ok(report.interrupt(Stage::GenerateLetters));
        }

        info!("STEP 5: SAVING RESULTS");
        report.enter(Stage::Persist);
        self.persist(&mut report)?;
        if self.interrupted() {
            return Ok(report.interrupt(Stage::Persist));
        }

        info!("STEP 6: REPORT");
        report.enter(Stage::Report);
        for (idx, processed) in self.results.iter().enumerate() {
            let job = processed.job();
            let letter = match &processed.cover_letter.error {
                None => "cover letter ready".to_string(),
                Some(err) => format!("cover letter failed: {}", err),
            };
            info!(
                "{}. {} at {} [{}/100] {} - {}",
                idx + 1,
                job.title,
                job.company,
                processed.scored.evaluation.score,
                job.link,
                letter
            );
        }
        Ok(report)
    }

    /// Records that the posting at `link` from the latest run was applied to.
    pub fn mark_applied(&mut self, link: &str) -> Result<bool, PipelineError> {
        let wanted = extractor::canonical_url(link).unwrap_or_else(|_| link.trim().to_string());
        let job = self
            .results
            .iter()
            .map(ProcessedJob::job)
            .find(|j| j.link == wanted)
            .ok_or_else(|| PipelineError::UnknownJob(link.to_string()))?;
        Ok(self
            .ledger
            .mark_applied(&job.link, &job.title, &job.company, APPLIED_NOTE)?)
    }

    /// Hands the ledger back, e.g. for review after the run.
    pub fn into_parts(self) -> (Ledger, Vec<ProcessedJob>) {
        (self.ledger, self.results)
    }

    fn acquire(&self, opts: &RunOptions, report: &mut RunReport) -> Result<Vec<JobRecord>, PipelineError> {
        let cache = &self.config.paths.raw_cache;
        if !opts.scrape_new {
            return Ok(storage::load_jobs(cache)?);
        }

        info!("Scraping up to {} pages...", opts.max_pages);
        let scraped = self
            .scraper
            .scrape(self.browser, opts.max_pages, opts.limit, &self.stop);
        let (jobs, complete) = match scraped {
            Ok(summary) => {
                report.counts.rejected_cards = summary.rejected.len();
                let complete = !matches!(summary.stop, ScrapeStop::Interrupted { .. });
                (summary.jobs, complete)
            }
            Err(failure) => {
                error!("{}", failure);
                report.scrape_error = Some(failure.to_string());
                report.counts.rejected_cards = failure.rejected.len();
                (failure.partial, false)
            }
        };

        // An empty result from a cut-short scrape must not replace the previous cache.
        if !jobs.is_empty() || complete {
            storage::save_jobs(cache, &jobs)?;
        }
        Ok(jobs)
    }

    /// Returns false if interrupted before every letter was attempted.
    fn generate_letters(&mut self, matched: Vec<ScoredJob>, report: &mut RunReport) -> bool {
        let total = matched.len();
        for (idx, scored) in matched.into_iter().enumerate() {
            if self.interrupted() {
                return false;
            }
            info!("Generating cover letter {}/{}: {}", idx + 1, total, scored.job.title);

            let cover_letter = match self.writer.generate(&scored.job, &self.config.profile.resume) {
                Ok(text) => {
                    report.counts.letters_ok += 1;
                    CoverLetter::generated(&scored.job, text)
                }
                Err(e) => {
                    warn!("Cover letter generation failed for '{}': {}", scored.job.title, e);
                    report.counts.letters_failed += 1;
                    CoverLetter::failed(e.to_string())
                }
            };
            let succeeded = cover_letter.success;
            self.results.push(ProcessedJob {
                scored,
                cover_letter,
            });

            if succeeded && report.counts.letters_ok % CHECKPOINT_EVERY == 0 {
                match self.save_results() {
                    Ok(path) => {
                        info!("Auto-saved progress to {}", path.display());
                        report.checkpoints.push(path);
                    }
                    Err(e) => warn!("Checkpoint failed: {}", e),
                }
            }
        }
        info!(
            "Generated {} cover letters ({} failed)",
            report.counts.letters_ok, report.counts.letters_failed
        );
        true
    }

    fn persist(&self, report: &mut RunReport) -> Result<(), PipelineError> {
        if self.results.is_empty() {
            return Ok(());
        }
        let path = self.save_results()?;
        info!("Saved results to {}", path.display());
        report.output = Some(path);
        Ok(())
    }

    fn save_results(&self) -> Result<PathBuf, StorageError> {
        let path = storage::fresh_path(&self.config.paths.output_dir, OUTPUT_PREFIX, job::now());
        storage::write_json(&path, &self.results)?;
        Ok(path)
    }

    fn interrupted(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
