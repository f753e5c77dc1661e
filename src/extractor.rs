use scraper::ElementRef;
use thiserror::Error;
use url::Url;

use crate::config::SiteSelectors;
use crate::job::{self, JobRecord, MISSING};

/// Skill tags render a trailing "..." chip when the list is collapsed.
const SKILL_PLACEHOLDER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("no job link in card")]
    MissingLink,

    #[error("unusable job link '{href}': {reason}")]
    InvalidLink { href: String, reason: String },
}

/// Turns one rendered listing card into a [`JobRecord`].
pub struct Extractor {
    selectors: SiteSelectors,
}

impl Extractor {
    pub fn new(selectors: SiteSelectors) -> Self {
        Extractor { selectors }
    }

    pub fn card_selector(&self) -> &scraper::Selector {
        &self.selectors.card
    }

    /// `page_url` resolves relative links.
    pub fn extract_card(&self, card: ElementRef<'_>, page_url: &Url) -> Result<JobRecord, CardError> {
        let link = self.extract_link(card, page_url)?;
        let info: Vec<String> = card.select(&self.selectors.info).map(element_text).collect();
        let (company, location) = split_company_location(&info);

        Ok(JobRecord {
            title: self.first_text(card, &self.selectors.title),
            company,
            location,
            description: self.first_text(card, &self.selectors.description),
            link,
            skills: self.extract_skills(card),
            scraped_at: job::now(),
        })
    }

    fn extract_link(&self, card: ElementRef<'_>, page_url: &Url) -> Result<String, CardError> {
        let href = card
            .select(&self.selectors.link)
            .find_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(CardError::MissingLink)?;
        canonical_link(href, page_url)
    }

    fn extract_skills(&self, card: ElementRef<'_>) -> Vec<String> {
        card.select(&self.selectors.skills)
            .map(element_text)
            .filter(|s| !s.is_empty() && s != SKILL_PLACEHOLDER)
            .collect()
    }

    fn first_text(&self, card: ElementRef<'_>, selector: &scraper::Selector) -> String {
        card.select(selector)
            .next()
            .map(element_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| MISSING.to_string())
    }
}

/// Company and location share one selector on the card; the first match is the company and the
/// second the location.
pub fn split_company_location(info: &[String]) -> (String, String) {
    let company = info.first().cloned().unwrap_or_else(|| MISSING.to_string());
    let location = info.get(1).cloned().unwrap_or_else(|| MISSING.to_string());
    (company, location)
}

/// Absolute form of `href` with query string and fragment removed. This is the posting's
/// identity in the ledger.
pub fn canonical_link(href: &str, page_url: &Url) -> Result<String, CardError> {
    let url = page_url.join(href).map_err(|e| CardError::InvalidLink {
        href: href.to_string(),
        reason: e.to_string(),
    })?;
    strip_to_identity(url, href)
}

/// Same identity as [`canonical_link`] for a link typed in by hand, which must already be
/// absolute.
pub fn canonical_url(raw: &str) -> Result<String, CardError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| CardError::InvalidLink {
        href: raw.to_string(),
        reason: e.to_string(),
    })?;
    strip_to_identity(url, raw)
}

fn strip_to_identity(mut url: Url, href: &str) -> Result<String, CardError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CardError::InvalidLink {
            href: href.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use scraper::Html;

    fn extractor() -> Extractor {
        Extractor::new(SiteConfig::default().selectors().unwrap())
    }

    fn page_url() -> Url {
        Url::parse("https://poslovi.infostud.com/oglasi-za-posao-java-developer?scope=srpoz&page=1")
            .unwrap()
    }

    fn extract_all(html: &str) -> Vec<Result<JobRecord, CardError>> {
        let extractor = extractor();
        let document = Html::parse_document(html);
        let url = page_url();
        document
            .select(extractor.card_selector())
            .map(|card| extractor.extract_card(card, &url))
            .collect()
    }

    const FULL_CARD: &str = r#"
        <div class="search-job-card">
          <a href="/posao/junior-java-developer/12345?utm_source=list&amp;pos=1">
            <h2>  Junior Java
                Developer </h2>
          </a>
          <p><i class="icon-building"></i><span>TechCorp d.o.o.</span></p>
          <p><i class="icon-pin"></i><span>Beograd</span></p>
          <p class="line-clamp-3">Spring Boot and PostgreSQL on a friendly team.</p>
          <div class="bg-neutrals-1"><span>Java</span></div>
          <div class="bg-neutrals-1"><span> </span></div>
          <div class="bg-neutrals-1"><span>Spring Boot</span></div>
          <div class="bg-neutrals-1"><span>...</span></div>
        </div>"#;

    #[test]
    fn extracts_every_field() {
        let job = extract_all(FULL_CARD).remove(0).unwrap();
        assert_eq!(job.title, "Junior Java Developer");
        assert_eq!(job.company, "TechCorp d.o.o.");
        assert_eq!(job.location, "Beograd");
        assert_eq!(job.description, "Spring Boot and PostgreSQL on a friendly team.");
        assert_eq!(
            job.link,
            "https://poslovi.infostud.com/posao/junior-java-developer/12345"
        );
        assert_eq!(job.skills, vec!["Java", "Spring Boot"]);
    }

    #[test]
    fn missing_fields_become_placeholders() {
        let html = r#"<div class="search-job-card"><a href="/posao/1">open</a></div>"#;
        let job = extract_all(html).remove(0).unwrap();
        assert_eq!(job.title, MISSING);
        assert_eq!(job.company, MISSING);
        assert_eq!(job.location, MISSING);
        assert_eq!(job.description, MISSING);
        assert!(job.skills.is_empty());
        assert!(job.is_trackable());
    }

    #[test]
    fn card_without_link_is_rejected() {
        let html = r#"
            <div class="search-job-card"><h2>Promo banner</h2></div>
            <div class="search-job-card"><a href="/oglasi/123"><h2>Wrong anchor</h2></a></div>"#;
        let results = extract_all(html);
        assert_eq!(results, vec![Err(CardError::MissingLink), Err(CardError::MissingLink)]);
    }

    #[test]
    fn non_http_link_is_rejected() {
        let html = r#"<div class="search-job-card"><a href="mailto:jobs@x.test?subject=/posao/">x</a></div>"#;
        assert!(matches!(
            extract_all(html).remove(0),
            Err(CardError::InvalidLink { .. })
        ));
    }

    #[test]
    fn company_and_location_by_position() {
        let one = vec!["Only Company".to_string()];
        assert_eq!(
            split_company_location(&one),
            ("Only Company".to_string(), MISSING.to_string())
        );
        let three = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(split_company_location(&three), ("A".to_string(), "B".to_string()));
        assert_eq!(
            split_company_location(&[]),
            (MISSING.to_string(), MISSING.to_string())
        );
    }

    #[test]
    fn canonical_link_strips_query_and_keeps_absolute_hosts() {
        let url = page_url();
        assert_eq!(
            canonical_link("https://other.test/posao/9?ref=a#apply", &url).unwrap(),
            "https://other.test/posao/9"
        );
        assert_eq!(
            canonical_link("/posao/9", &url).unwrap(),
            canonical_link("/posao/9?page=3", &url).unwrap()
        );
    }

    #[test]
    fn hand_typed_links_get_the_scraped_identity() {
        let scraped = canonical_link("/posao/9", &page_url()).unwrap();
        assert_eq!(canonical_url(" https://poslovi.infostud.com/posao/9?utm=a#top ").unwrap(), scraped);
        assert!(matches!(
            canonical_url("/posao/9"),
            Err(CardError::InvalidLink { .. })
        ));
        assert!(canonical_url("N/A").is_err());
        assert!(canonical_url("mailto:hr@jobs.test").is_err());
    }
}
