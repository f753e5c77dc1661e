use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Placeholder written for card fields the listing did not render.
pub const MISSING: &str = "N/A";

/// One job listing as extracted from a listing card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub link: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub scraped_at: NaiveDateTime,
}

impl JobRecord {
    /// A record can only be tracked in the ledger if it has a real link.
    pub fn is_trackable(&self) -> bool {
        is_trackable_link(&self.link)
    }
}

/// Blank links and the `N/A` placeholder cannot identify a posting.
pub fn is_trackable_link(link: &str) -> bool {
    let link = link.trim();
    !link.is_empty() && link != MISSING
}

/// Keyword evaluation attached to a record by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: u32,
    pub matches: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredJob {
    #[serde(flatten)]
    pub job: JobRecord,
    pub evaluation: Evaluation,
}

/// Outcome of one cover letter request, persisted next to the job.
///
/// Serialized as `{"success": true, "cover_letter", "job_title", "company"}` or
/// `{"success": false, "error"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverLetter {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CoverLetter {
    pub fn generated(job: &JobRecord, text: String) -> Self {
        CoverLetter {
            success: true,
            cover_letter: Some(text),
            job_title: Some(job.title.clone()),
            company: Some(job.company.clone()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CoverLetter {
            success: false,
            cover_letter: None,
            job_title: None,
            company: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedJob {
    #[serde(flatten)]
    pub scored: ScoredJob,
    pub cover_letter: CoverLetter,
}

impl ProcessedJob {
    pub fn job(&self) -> &JobRecord {
        &self.scored.job
    }
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
pub(crate) fn sample_job(link: &str, title: &str, description: &str, skills: &[&str]) -> JobRecord {
    JobRecord {
        title: title.to_string(),
        company: "TechCorp".to_string(),
        location: "Beograd".to_string(),
        description: description.to_string(),
        link: link.to_string(),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        scraped_at: chrono::NaiveDate::from_ymd_opt(2025, 1, 31)
            .and_then(|d| d.and_hms_opt(9, 15, 2))
            .unwrap(),
    }
}
