use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use scraper::Html;
use thiserror::Error;
use url::Url;

use crate::browser::{Browser, NavigationError, PageSession};
use crate::config::{ConfigError, Pacing, SiteConfig};
use crate::delay_manager;
use crate::extractor::{CardError, Extractor};
use crate::job::JobRecord;

/// A card that could not be turned into a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCard {
    pub page: usize,
    pub index: usize,
    pub error: CardError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeStop {
    /// Every requested page was read.
    MaxPages,
    /// A page rendered no cards.
    EndOfResults { page: usize },
    /// The job limit was reached.
    Limit,
    /// A stop was requested before `page` was loaded.
    Interrupted { page: usize },
}

#[derive(Debug)]
pub struct ScrapeSummary {
    pub jobs: Vec<JobRecord>,
    pub pages_loaded: usize,
    pub rejected: Vec<RejectedCard>,
    pub stop: ScrapeStop,
}

/// Pagination ended on a page that could not be loaded. Jobs and rejections from the pages read
/// before it are kept.
#[derive(Debug, Error)]
#[error("scrape stopped at page {page}: {error}")]
pub struct ScrapeFailure {
    pub page: usize,
    #[source]
    pub error: NavigationError,
    pub partial: Vec<JobRecord>,
    pub rejected: Vec<RejectedCard>,
}

/// Walks the paginated listing of one site.
pub struct Scraper {
    site: SiteConfig,
    extractor: Extractor,
}

impl Scraper {
    pub fn new(site: SiteConfig) -> Result<Self, ConfigError> {
        let extractor = Extractor::new(site.selectors()?);
        Ok(Scraper { site, extractor })
    }

    pub fn pacing(&self) -> &Pacing {
        &self.site.pacing
    }

    /// Reads up to `max_pages` listing pages, stopping early on an empty page, once `limit`
    /// jobs have been collected, or when `interrupt` is raised. The flag is checked before every
    /// page load. The browser session lives only for the duration of this call.
    pub fn scrape<B: Browser>(
        &self,
        browser: &B,
        max_pages: usize,
        limit: Option<usize>,
        interrupt: &AtomicBool,
    ) -> Result<ScrapeSummary, ScrapeFailure> {
        let mut session = browser.launch().map_err(|error| ScrapeFailure {
            page: 1,
            error,
            partial: Vec::new(),
            rejected: Vec::new(),
        })?;

        let mut jobs: Vec<JobRecord> = Vec::new();
        let mut rejected = Vec::new();
        let mut pages_loaded = 0;
        let mut stop = ScrapeStop::MaxPages;

        for page_num in 1..=max_pages {
            if limit.is_some_and(|l| jobs.len() >= l) {
                stop = ScrapeStop::Limit;
                break;
            }
            if page_num > 1 {
                delay_manager::random_page_delay(&self.site.pacing);
            }
            if interrupt.load(Ordering::SeqCst) {
                info!("Stop requested. Not loading page {}.", page_num);
                stop = ScrapeStop::Interrupted { page: page_num };
                break;
            }

            let page_url = self.site.page_url(page_num);
            info!("Scraping page {}: {}", page_num, page_url);

            let html = match session.load(&page_url) {
                Ok(html) => html,
                Err(error) => {
                    warn!("Failed to load page {}: {}", page_num, error);
                    return Err(ScrapeFailure {
                        page: page_num,
                        error,
                        partial: jobs,
                        rejected,
                    });
                }
            };
            pages_loaded += 1;
            delay_manager::settle(&self.site.pacing);

            let remaining = limit.map(|l| l - jobs.len());
            let page = self.read_page(&html, &page_url, page_num, remaining);
            rejected.extend(page.rejected);

            if page.cards_found == 0 {
                info!("No jobs found on page {}. Stopping pagination.", page_num);
                stop = ScrapeStop::EndOfResults { page: page_num };
                break;
            }
            info!("Scraped {} jobs from page {}", page.jobs.len(), page_num);
            jobs.extend(page.jobs);
        }

        if stop == ScrapeStop::MaxPages && limit.is_some_and(|l| jobs.len() >= l) {
            stop = ScrapeStop::Limit;
        }

        info!(
            "Scrape finished: {} jobs from {} pages, {} cards rejected",
            jobs.len(),
            pages_loaded,
            rejected.len()
        );
        Ok(ScrapeSummary {
            jobs,
            pages_loaded,
            rejected,
            stop,
        })
    }

    fn read_page(
        &self,
        html: &str,
        page_url: &str,
        page_num: usize,
        remaining: Option<usize>,
    ) -> PageResult {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let mut result = PageResult::default();

        for (index, card) in document.select(self.extractor.card_selector()).enumerate() {
            result.cards_found += 1;
            if remaining.is_some_and(|r| result.jobs.len() >= r) {
                break;
            }

            let outcome = match &base {
                Some(base) => self.extractor.extract_card(card, base),
                None => Err(CardError::InvalidLink {
                    href: page_url.to_string(),
                    reason: "page URL does not parse".to_string(),
                }),
            };
            match outcome {
                Ok(job) => result.jobs.push(job),
                Err(error) => {
                    warn!("Error parsing job card {} on page {}: {}", index, page_num, error);
                    result.rejected.push(RejectedCard {
                        page: page_num,
                        index,
                        error,
                    });
                }
            }
        }
        result
    }
}

#[derive(Default)]
struct PageResult {
    cards_found: usize,
    jobs: Vec<JobRecord>,
    rejected: Vec<RejectedCard>,
}
