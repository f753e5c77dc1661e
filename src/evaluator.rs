//! Keyword scoring of postings against the candidate profile.
//!
//! Scores are pure functions of the record's text and the profile: no I/O, no clock, no
//! randomness. Re-scoring an unchanged record gives the same [`Evaluation`].

use log::info;

use crate::config::CandidateProfile;
use crate::job::{Evaluation, JobRecord, ScoredJob};

const MAX_SCORE: u32 = 100;

pub const NO_MISMATCH_NOTE: &str = "No experience requirement mismatch detected";

pub fn score(job: &JobRecord, profile: &CandidateProfile, threshold: u32) -> Evaluation {
    let text = search_text(job);

    let matched: Vec<&str> = profile
        .keywords
        .iter()
        .map(String::as_str)
        .filter(|k| text.contains(&k.to_lowercase()))
        .collect();

    let mut score = if profile.keywords.is_empty() {
        0
    } else {
        (MAX_SCORE * matched.len() as u32 / profile.keywords.len() as u32).min(MAX_SCORE)
    };

    let title_keyword = profile.title_keyword.to_lowercase();
    if !title_keyword.is_empty() && job.title.to_lowercase().contains(&title_keyword) {
        score = (score + profile.title_bonus).min(MAX_SCORE);
    }

    let red_flagged = profile
        .red_flags
        .iter()
        .any(|f| text.contains(&f.to_lowercase()));

    // Red flags only cost points; no gap note is written for them.
    let mut gaps = Vec::new();
    if red_flagged {
        score = score.saturating_sub(profile.red_flag_penalty);
    } else {
        gaps.push(NO_MISMATCH_NOTE.to_string());
    }

    Evaluation {
        score,
        matches: matched
            .iter()
            .take(profile.max_matches)
            .map(|k| capitalize(k))
            .collect(),
        gaps,
        recommendation: recommendation(score, threshold),
    }
}

/// Scores every job and keeps those at or above `min_score`, in input order.
pub fn evaluate_all(jobs: Vec<JobRecord>, profile: &CandidateProfile, min_score: u32) -> Vec<ScoredJob> {
    let total = jobs.len();
    let mut results = Vec::new();

    for (idx, job) in jobs.into_iter().enumerate() {
        let evaluation = score(&job, profile, min_score);
        if evaluation.score >= min_score {
            info!("[{}/{}] {}: score {} - MATCH", idx + 1, total, job.title, evaluation.score);
            results.push(ScoredJob { job, evaluation });
        } else {
            info!("[{}/{}] {}: score {} - skip", idx + 1, total, job.title, evaluation.score);
        }
    }
    results
}

fn search_text(job: &JobRecord) -> String {
    format!("{} {} {}", job.title, job.description, job.skills.join(" ")).to_lowercase()
}

fn recommendation(score: u32, threshold: u32) -> String {
    if score >= threshold {
        format!("Good fit - apply! ({}/100)", score)
    } else {
        format!("Consider applying ({}/100)", score)
    }
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(keyword: &str) -> String {
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
