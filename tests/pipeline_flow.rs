use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use job_agent_lib::browser::NavigationError;
use job_agent_lib::config::Pacing;
use job_agent_lib::cover_letter::CoverLetterError;
use job_agent_lib::storage;
use job_agent_lib::{
    AppConfig, Browser, CoverLetterWriter, JobRecord, Ledger, PageSession, Pipeline, ProcessedJob,
    RunOptions, RunOutcome,
};
use tempfile::tempdir;

struct SiteFixture {
    pages: HashMap<String, String>,
    visits: Rc<RefCell<Vec<String>>>,
}

struct FixtureSession {
    pages: HashMap<String, String>,
    visits: Rc<RefCell<Vec<String>>>,
}

impl Browser for SiteFixture {
    type Session = FixtureSession;

    fn launch(&self) -> Result<FixtureSession, NavigationError> {
        Ok(FixtureSession {
            pages: self.pages.clone(),
            visits: Rc::clone(&self.visits),
        })
    }
}

impl PageSession for FixtureSession {
    fn load(&mut self, url: &str) -> Result<String, NavigationError> {
        self.visits.borrow_mut().push(url.to_string());
        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }
}

struct RecordingWriter {
    asked: RefCell<Vec<String>>,
}

impl CoverLetterWriter for RecordingWriter {
    fn generate(&self, job: &JobRecord, resume: &str) -> Result<String, CoverLetterError> {
        assert!(!resume.is_empty());
        self.asked.borrow_mut().push(job.link.clone());
        Ok(format!("Dear Hiring Manager,\n\nI would love to join {}.", job.company))
    }
}

fn card(slug: &str, title: &str, description: &str, skills: &[&str]) -> String {
    let skills: String = skills
        .iter()
        .map(|s| format!(r#"<div class="bg-neutrals-1"><span>{s}</span></div>"#))
        .collect();
    format!(
        r#"<div class="search-job-card">
             <a href="/posao/{slug}?utm_source=listing"><h2>{title}</h2></a>
             <p><span>{slug} Company</span></p><p><span>Beograd</span></p>
             <p class="line-clamp-3">{description}</p>
             {skills}
           </div>"#
    )
}

fn listing(config: &AppConfig) -> SiteFixture {
    let page_one = format!(
        "<html><body>{}{}{}</body></html>",
        card("link-a", "Junior Java Developer", "Spring Boot and PostgreSQL", &["Java", "Git"]),
        card("link-b", "Office Assistant", "Phones and paperwork", &[]),
        card("link-c", "Junior Frontend Developer", "React and JavaScript", &["Docker", "..."]),
    );
    SiteFixture {
        pages: HashMap::from([(config.site.page_url(1), page_one)]),
        visits: Rc::new(RefCell::new(Vec::new())),
    }
}

fn links(jobs: &[ProcessedJob]) -> Vec<String> {
    jobs.iter().map(|p| p.job().link.clone()).collect()
}

#[test]
fn second_run_only_processes_unapplied_postings() {
    let dir = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.site.base_url = "https://jobs.test/oglasi?scope=srpoz".to_string();
    config.site.pacing = Pacing::none();
    config.paths.raw_cache = dir.path().join("jobs_raw.json");
    config.paths.ledger = dir.path().join("applied_jobs.json");
    config.paths.output_dir = dir.path().join("runs");

    let site = listing(&config);
    let writer = RecordingWriter {
        asked: RefCell::new(Vec::new()),
    };
    let opts = RunOptions {
        scrape_new: true,
        min_score: 40,
        max_pages: 3,
        limit: None,
    };

    let link_a = "https://jobs.test/posao/link-a".to_string();
    let link_c = "https://jobs.test/posao/link-c".to_string();

    // First run: empty ledger, linkB falls under the threshold.
    let ledger = Ledger::open(&config.paths.ledger).unwrap();
    let mut pipeline = Pipeline::new(&config, &site, &writer, ledger).unwrap();
    let report = pipeline.run(&opts).unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.counts.found, 3);
    assert_eq!(report.counts.new, 3);
    assert_eq!(report.counts.matched, 2);
    assert_eq!(report.counts.letters_ok, 2);
    assert_eq!(report.checkpoints.len(), 1);
    assert_eq!(links(pipeline.results()), vec![link_a.clone(), link_c.clone()]);
    // Page 2 had no cards, so page 3 was never requested.
    assert_eq!(site.visits.borrow().len(), 2);

    let cached = storage::load_jobs(&config.paths.raw_cache).unwrap();
    assert_eq!(cached.len(), 3);
    assert_eq!(cached[2].skills, vec!["Docker"]);

    let saved: Vec<ProcessedJob> = storage::read_json(report.output.as_ref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(links(&saved), vec![link_a.clone(), link_c.clone()]);
    assert!(saved.iter().all(|p| p.cover_letter.success));

    assert!(pipeline.mark_applied(&link_a).unwrap());
    assert!(!pipeline.mark_applied(&link_a).unwrap());
    drop(pipeline);

    // Second run over the same listing with a fresh ledger handle.
    writer.asked.borrow_mut().clear();
    let ledger = Ledger::open(&config.paths.ledger).unwrap();
    assert_eq!(ledger.count(), 1);
    let mut pipeline = Pipeline::new(&config, &site, &writer, ledger).unwrap();
    let report = pipeline.run(&opts).unwrap();

    assert_eq!(report.counts.found, 3);
    assert_eq!(report.counts.new, 2);
    assert_eq!(report.counts.matched, 1);
    assert_eq!(*writer.asked.borrow(), vec![link_c.clone()]);
    assert_eq!(links(pipeline.results()), vec![link_c]);
}

#[test]
fn cached_run_uses_previous_scrape() {
    let dir = tempdir().unwrap();
    let mut config = AppConfig::default();
    config.site.pacing = Pacing::none();
    config.paths.raw_cache = dir.path().join("jobs_raw.json");
    config.paths.ledger = dir.path().join("applied_jobs.json");
    config.paths.output_dir = dir.path().join("runs");

    let site = listing(&config);
    let writer = RecordingWriter {
        asked: RefCell::new(Vec::new()),
    };

    let ledger = Ledger::open(&config.paths.ledger).unwrap();
    let mut pipeline = Pipeline::new(&config, &site, &writer, ledger).unwrap();
    let report = pipeline
        .run(&RunOptions {
            scrape_new: false,
            ..RunOptions::default()
        })
        .unwrap();

    assert!(site.visits.borrow().is_empty());
    assert!(matches!(report.outcome, RunOutcome::Stopped { .. }));
    assert_eq!(report.counts.found, 0);
}
