use std::io::{self, BufRead, Write};

use crate::job::ProcessedJob;
use crate::ledger::{Ledger, LedgerError};
use crate::pipeline::APPLIED_NOTE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Skip,
}

impl Answer {
    /// Anything that is not a yes or a skip counts as no.
    pub fn parse(input: &str) -> Answer {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Answer::Yes,
            "s" | "skip" => Answer::Skip,
            _ => Answer::No,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    pub marked: usize,
    pub already: usize,
    pub declined: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Asks, job by job, whether an application was submitted and records the yeses. Stops quietly
/// at end of input.
pub fn confirm_applications<R: BufRead, W: Write>(
    jobs: &[ProcessedJob],
    ledger: &mut Ledger,
    mut input: R,
    mut output: W,
) -> Result<ReviewSummary, ReviewError> {
    let mut summary = ReviewSummary::default();
    let total = jobs.len();

    for (idx, processed) in jobs.iter().enumerate() {
        let job = processed.job();
        writeln!(output, "\n[{}/{}] {} at {}", idx + 1, total, job.title, job.company)?;
        writeln!(output, "Link: {}", job.link)?;

        if !job.is_trackable() {
            writeln!(output, "No usable link; it cannot be recorded.")?;
            summary.skipped += 1;
            continue;
        }
        if ledger.has_applied(&job.link) {
            writeln!(output, "Already recorded as applied.")?;
            summary.already += 1;
            continue;
        }

        write!(output, "Have you applied to this job? (y/n/skip): ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        match Answer::parse(&line) {
            Answer::Yes => {
                if ledger.mark_applied(&job.link, &job.title, &job.company, APPLIED_NOTE)? {
                    summary.marked += 1;
                } else {
                    summary.already += 1;
                }
            }
            Answer::Skip => summary.skipped += 1,
            Answer::No => {
                writeln!(output, "Skipping {}", job.title)?;
                summary.declined += 1;
            }
        }
    }
    Ok(summary)
}
