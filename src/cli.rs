use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Renderer;
use crate::pipeline::RunOptions;

/// Finds job postings, scores them, drafts cover letters and tracks applications.
#[derive(Parser, Debug)]
#[command(name = "job_agent", version, about)]
pub struct Cli {
    /// JSON config file; built-in defaults are used for anything it leaves out
    #[arg(long, global = true, env = "JOB_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scrape / filter / evaluate / cover letter pipeline
    Run(RunArgs),

    /// Record an application by link
    Mark {
        link: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Export the application ledger
    Report {
        /// Output file (defaults to the configured report path)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show how many applications are recorded
    Status,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scrape fresh listings instead of reading the cached scrape
    #[arg(long)]
    pub scrape_new: bool,

    /// Minimum score for a job to get a cover letter
    #[arg(long, default_value_t = 40)]
    pub min_score: u32,

    /// Maximum listing pages to read
    #[arg(long, default_value_t = 1)]
    pub max_pages: usize,

    /// Maximum jobs to collect across all pages
    #[arg(long)]
    pub limit: Option<usize>,

    /// Walk through the results afterwards and record applications
    #[arg(long)]
    pub review: bool,

    /// How to load listing pages (defaults to the configured renderer)
    #[arg(long, value_enum)]
    pub renderer: Option<Renderer>,
}

impl RunArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            scrape_new: self.scrape_new,
            min_score: self.min_score,
            max_pages: self.max_pages,
            limit: self.limit,
        }
    }
}
