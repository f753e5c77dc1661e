//! Runtime configuration: listing site selectors, candidate profile, cover letter model and file
//! locations. Everything has a default matching the poslovi.infostud.com deployment, so a config
//! file only needs the values it changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid selector for {field} '{selector}': {reason}")]
    Selector {
        field: &'static str,
        selector: String,
        reason: String,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub profile: CandidateProfile,
    pub llm: LlmConfig,
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Loads `path` (or the defaults), then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config: AppConfig =
                    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                info!("Loaded config from {}", path.display());
                config
            }
            None => AppConfig::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = std::env::var("JOB_AGENT_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("JOB_AGENT_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(renderer) = std::env::var("JOB_AGENT_RENDERER") {
            self.site.renderer = match renderer.trim().to_lowercase().as_str() {
                "chrome" => Renderer::Chrome,
                "http" => Renderer::Http,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "JOB_AGENT_RENDERER must be 'chrome' or 'http', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Ok(resume_file) = std::env::var("JOB_AGENT_RESUME_FILE") {
            let path = PathBuf::from(resume_file);
            self.profile.resume =
                fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.site.selectors()?;
        if self.profile.keywords.is_empty() {
            return Err(ConfigError::Invalid("profile.keywords is empty".to_string()));
        }
        Ok(())
    }
}

/// Where listing cards live on the target site and how to read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub page_param: String,
    pub card_selector: String,
    pub title_selector: String,
    /// Company and location share this selector; they are told apart by position.
    pub info_selector: String,
    pub description_selector: String,
    pub link_selector: String,
    pub skills_selector: String,
    pub renderer: Renderer,
    /// Page load limit for either renderer, in seconds.
    pub load_timeout_secs: u64,
    pub pacing: Pacing,
}

/// How listing pages are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    /// Headless Chrome; runs the page's JavaScript before the cards are read.
    #[default]
    Chrome,
    /// Plain HTTP GET; only for listings rendered on the server.
    Http,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            base_url: "https://poslovi.infostud.com/oglasi-za-posao-java-developer?scope=srpoz"
                .to_string(),
            page_param: "page".to_string(),
            card_selector: "div.search-job-card".to_string(),
            title_selector: "h2".to_string(),
            info_selector: "p span".to_string(),
            description_selector: "p.line-clamp-3".to_string(),
            link_selector: "a[href*='/posao/']".to_string(),
            skills_selector: "div.bg-neutrals-1 span".to_string(),
            renderer: Renderer::default(),
            load_timeout_secs: 30,
            pacing: Pacing::default(),
        }
    }
}

impl SiteConfig {
    /// Compiles every selector, failing on the first invalid one.
    pub fn selectors(&self) -> Result<SiteSelectors, ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("site.base_url is empty".to_string()));
        }
        Ok(SiteSelectors {
            card: parse_selector("card_selector", &self.card_selector)?,
            title: parse_selector("title_selector", &self.title_selector)?,
            info: parse_selector("info_selector", &self.info_selector)?,
            description: parse_selector("description_selector", &self.description_selector)?,
            link: parse_selector("link_selector", &self.link_selector)?,
            skills: parse_selector("skills_selector", &self.skills_selector)?,
        })
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// URL of listing page `page_num`, appended to any existing query string.
    pub fn page_url(&self, page_num: usize) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", self.base_url, separator, self.page_param, page_num)
    }
}

#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub card: Selector,
    pub title: Selector,
    pub info: Selector,
    pub description: Selector,
    pub link: Selector,
    pub skills: Selector,
}

fn parse_selector(field: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        field,
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Delays applied around page loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Wait after a page has loaded so client-side rendering can settle.
    pub settle_ms: u64,
    /// Random pause between consecutive page loads, in seconds. Zero disables it.
    pub page_delay_min_secs: u64,
    pub page_delay_max_secs: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            settle_ms: 2000,
            page_delay_min_secs: 1,
            page_delay_max_secs: 3,
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Pacing {
            settle_ms: 0,
            page_delay_min_secs: 0,
            page_delay_max_secs: 0,
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Candidate the postings are scored against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub resume: String,
    pub keywords: Vec<String>,
    pub title_keyword: String,
    pub title_bonus: u32,
    pub red_flags: Vec<String>,
    pub red_flag_penalty: u32,
    pub max_matches: usize,
}

impl Default for CandidateProfile {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        CandidateProfile {
            resume: DEFAULT_RESUME.trim().to_string(),
            keywords: strings(&[
                "junior",
                "java",
                "spring",
                "spring boot",
                "react",
                "javascript",
                "python",
                "sql",
                "postgresql",
                "mysql",
                "mongodb",
                "docker",
                "git",
            ]),
            title_keyword: "junior".to_string(),
            title_bonus: 20,
            red_flags: strings(&["senior", "5+ years", "10+ years", "lead", "architect"]),
            red_flag_penalty: 15,
            max_matches: 5,
        }
    }
}

const DEFAULT_RESUME: &str = r#"
NAME: Your Name
EMAIL: your.email@example.com

PROFESSIONAL SUMMARY:
Recent computer science graduate with strong fundamentals in Java and web development.

SKILLS:
Programming Languages: Java, JavaScript, C, Python, R, SQL
Frameworks & Libraries: Spring Boot, Spring, React, Laravel
Databases: PostgreSQL, MySQL, MongoDB
Tools & Platforms: Git, Maven, Docker, IntelliJ

PROJECTS:
Internship Management System | Spring Boot, React, PostgreSQL
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// No timeout unless set; local models can take minutes per letter.
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_cache: PathBuf,
    pub ledger: PathBuf,
    pub output_dir: PathBuf,
    pub report: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            raw_cache: PathBuf::from("jobs_raw.json"),
            ledger: PathBuf::from("applied_jobs.json"),
            output_dir: PathBuf::from("."),
            report: PathBuf::from("application_report.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_respects_existing_query() {
        let site = SiteConfig::default();
        assert_eq!(
            site.page_url(2),
            "https://poslovi.infostud.com/oglasi-za-posao-java-developer?scope=srpoz&page=2"
        );

        let bare = SiteConfig {
            base_url: "https://jobs.test/listing".to_string(),
            ..SiteConfig::default()
        };
        assert_eq!(bare.page_url(1), "https://jobs.test/listing?page=1");
    }

    #[test]
    fn defaults_compile() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn bad_selector_names_the_field() {
        let site = SiteConfig {
            title_selector: "h2[".to_string(),
            ..SiteConfig::default()
        };
        match site.selectors() {
            Err(ConfigError::Selector { field, .. }) => assert_eq!(field, "title_selector"),
            other => panic!("expected selector error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"site": {"base_url": "https://jobs.test/list"}, "profile": {"title_bonus": 10}}"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.site.base_url, "https://jobs.test/list");
        assert_eq!(config.site.card_selector, "div.search-job-card");
        assert_eq!(config.profile.title_bonus, 10);
        assert_eq!(config.profile.keywords.len(), 13);
        assert_eq!(config.paths.ledger, PathBuf::from("applied_jobs.json"));
    }

    #[test]
    fn empty_keywords_rejected() {
        let mut config = AppConfig::default();
        config.profile.keywords.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn renderer_defaults_to_chrome_and_reads_lowercase() {
        assert_eq!(SiteConfig::default().renderer, Renderer::Chrome);

        let site: SiteConfig = serde_json::from_str(r#"{"renderer": "http", "load_timeout_secs": 5}"#).unwrap();
        assert_eq!(site.renderer, Renderer::Http);
        assert_eq!(site.load_timeout(), Duration::from_secs(5));
        assert_eq!(site.card_selector, "div.search-job-card");

        assert!(serde_json::from_str::<SiteConfig>(r#"{"renderer": "firefox"}"#).is_err());
    }
}
