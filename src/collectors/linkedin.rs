use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER};
use scraper::{ElementRef, Html, Selector};

use crate::collectors::{JobCollector, collapse_whitespace, fetch_text};
use crate::error::ScrapeError;
use crate::models::job::{CreateJob, DEFAULT_JOB_TYPE};

const NAME: &str = "LinkedIn";
const BASE_URL: &str = "https://www.linkedin.com";
const SEARCH_URL: &str = "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";
const REFERER_URL: &str = "https://www.linkedin.com/jobs/search";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct LinkedIn {
    client: Client,
    url: String,
}

impl LinkedIn {
    pub fn new(client: Client, keywords: &str, location: &str) -> Self {
        Self::with_endpoint(client, search_url(keywords, location))
    }

    pub fn with_endpoint(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

fn search_url(keywords: &str, location: &str) -> String {
    format!(
        "{SEARCH_URL}?keywords={}&location={}&f_WT=2&start=0",
        utf8_percent_encode(keywords, NON_ALPHANUMERIC),
        utf8_percent_encode(location, NON_ALPHANUMERIC),
    )
}

#[async_trait]
impl JobCollector for LinkedIn {
    fn name(&self) -> &str {
        NAME
    }

    async fn collect(&self) -> Result<Vec<CreateJob>, ScrapeError> {
        tracing::info!("Scraping LinkedIn job listing page");
        let fetched_at = Utc::now();

        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(REFERER, REFERER_URL);
        let body = fetch_text(NAME, request).await?;

        let jobs = parse_listing(&body, fetched_at);
        tracing::info!("LinkedIn: found {} jobs", jobs.len());
        Ok(jobs)
    }
}

struct Selectors {
    card: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    link: Selector,
    tag: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("static listing CSS selector is valid");
        Selectors {
            card: parse("div.base-search-card"),
            title: parse("h3.base-search-card__title"),
            company: parse("h4.base-search-card__subtitle"),
            location: parse("span.job-search-card__location"),
            link: parse("a.base-card__full-link"),
            tag: parse(".job-posting-benefits__text, .result-benefits__text"),
        }
    })
}

/// Extract every listing card. The page carries no posting dates or body
/// text, so posted_date is the fetch time and the description is synthesized.
pub fn parse_listing(body: &str, fetched_at: DateTime<Utc>) -> Vec<CreateJob> {
    let document = Html::parse_document(body);
    let sel = selectors();

    document
        .select(&sel.card)
        .filter_map(|card| convert_card(card, sel, fetched_at))
        .collect()
}

fn convert_card(card: ElementRef<'_>, sel: &Selectors, fetched_at: DateTime<Utc>) -> Option<CreateJob> {
    let title = first_text(card, &sel.title)?;
    let company = first_text(card, &sel.company)?;
    let link = card
        .select(&sel.link)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(canonical_link)
        .filter(|href| !href.is_empty())?;

    let location = first_text(card, &sel.location).unwrap_or_else(|| "Worldwide".to_string());
    let remote_type = location
        .to_lowercase()
        .contains("remote")
        .then(|| "remote".to_string());

    let tags: Vec<String> = card
        .select(&sel.tag)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();

    let mut description = format!("{title} position at {company}");
    if !tags.is_empty() {
        description.push_str(". ");
        description.push_str(&tags.join(", "));
    }

    Some(CreateJob {
        title,
        company,
        location,
        remote_type,
        description,
        raw_description: None,
        salary_min: None,
        salary_max: None,
        job_type: DEFAULT_JOB_TYPE.to_string(),
        source_url: Some(link.clone()),
        validated_source_url: Some(link),
        source_site: NAME.to_string(),
        is_active: true,
        posted_date: fetched_at,
    })
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Listing links carry per-request tracking parameters; drop them so the same
/// posting always yields the same source url. Relative links are resolved
/// against the site root.
fn canonical_link(href: &str) -> String {
    let href = href.trim();
    let end = href.find(['?', '#']).unwrap_or(href.len());
    let path = &href[..end];

    if path.is_empty() || path.starts_with("http") {
        path.to_string()
    } else if let Some(rest) = path.strip_prefix("//") {
        format!("https://{rest}")
    } else if path.starts_with('/') {
        format!("{BASE_URL}{path}")
    } else {
        format!("{BASE_URL}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PAGE: &str = r#"
<li>
  <div class="base-card base-search-card job-search-card" data-entity-urn="urn:li:jobPosting:1">
    <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/backend-engineer-at-acme-1?refId=abc&amp;trackingId=xyz">
      <span class="sr-only">Backend Engineer</span>
    </a>
    <div class="base-search-card__info">
      <h3 class="base-search-card__title">
        Backend Engineer
      </h3>
      <h4 class="base-search-card__subtitle">
        <a href="https://www.linkedin.com/company/acme">Acme &amp; Sons</a>
      </h4>
      <div class="base-search-card__metadata">
        <span class="job-search-card__location">Berlin, Germany (Remote)</span>
        <div class="job-posting-benefits"><span class="job-posting-benefits__text">Actively Hiring</span></div>
      </div>
    </div>
  </div>
</li>
<li>
  <div class="base-card base-search-card job-search-card">
    <a class="base-card__full-link" href="/jobs/view/data-engineer-2?trk=public_jobs"></a>
    <h3 class="base-search-card__title">Data Engineer</h3>
    <h4 class="base-search-card__subtitle"><a>Globex</a></h4>
  </div>
</li>
<li>
  <div class="base-card base-search-card job-search-card">
    <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/mystery-3"></a>
    <h3 class="base-search-card__title">Mystery Role</h3>
    <h4 class="base-search-card__subtitle">   </h4>
  </div>
</li>"#;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn extracts_cards_and_skips_those_without_company() {
        let jobs = parse_listing(PAGE, fetched_at());
        assert_eq!(jobs.len(), 2);

        let first = &jobs[0];
        assert_eq!(first.title, "Backend Engineer");
        assert_eq!(first.company, "Acme & Sons");
        assert_eq!(first.location, "Berlin, Germany (Remote)");
        assert_eq!(first.remote_type.as_deref(), Some("remote"));
        assert_eq!(
            first.source_url.as_deref(),
            Some("https://www.linkedin.com/jobs/view/backend-engineer-at-acme-1")
        );
        assert_eq!(first.description, "Backend Engineer position at Acme & Sons. Actively Hiring");
        assert_eq!(first.posted_date, fetched_at());
    }

    #[test]
    fn missing_location_defaults_to_worldwide() {
        let jobs = parse_listing(PAGE, fetched_at());
        let second = &jobs[1];
        assert_eq!(second.location, "Worldwide");
        assert_eq!(second.remote_type, None);
        assert_eq!(second.job_type, "full-time");
        assert_eq!(second.description, "Data Engineer position at Globex");
    }

    #[test]
    fn relative_links_resolve_to_absolute_urls() {
        let jobs = parse_listing(PAGE, fetched_at());
        assert_eq!(
            jobs[1].source_url.as_deref(),
            Some("https://www.linkedin.com/jobs/view/data-engineer-2")
        );
        assert_eq!(jobs[1].validated_source_url, jobs[1].source_url);

        assert_eq!(
            canonical_link("//www.linkedin.com/jobs/view/x-4?refId=1"),
            "https://www.linkedin.com/jobs/view/x-4"
        );
        assert_eq!(canonical_link("jobs/view/y-5"), "https://www.linkedin.com/jobs/view/y-5");
        assert_eq!(canonical_link("?trk=only"), "");
    }

    #[test]
    fn page_without_cards_yields_nothing() {
        assert!(parse_listing("<html><body><p>No results</p></body></html>", fetched_at()).is_empty());
    }

    #[test]
    fn search_url_encodes_terms() {
        assert_eq!(
            search_url("rust developer", "Worldwide"),
            "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search?keywords=rust%20developer&location=Worldwide&f_WT=2&start=0"
        );
    }
}
