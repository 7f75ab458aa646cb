use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::collectors::{JobCollector, fetch_text, strip_markup};
use crate::error::ScrapeError;
use crate::models::job::{CreateJob, DEFAULT_JOB_TYPE};

const NAME: &str = "WeWorkRemotely";
const FEED_URL: &str = "https://weworkremotely.com/remote-jobs.rss";

pub struct WeWorkRemotely {
    client: Client,
    url: String,
}

impl WeWorkRemotely {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, FEED_URL)
    }

    pub fn with_endpoint(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl JobCollector for WeWorkRemotely {
    fn name(&self) -> &str {
        NAME
    }

    async fn collect(&self) -> Result<Vec<CreateJob>, ScrapeError> {
        tracing::info!("Scraping WeWorkRemotely via RSS");
        let fetched_at = Utc::now();

        let request = self.client.get(&self.url).header(
            ACCEPT,
            "application/rss+xml, application/xml;q=0.9, */*;q=0.8",
        );
        let body = fetch_text(NAME, request).await?;

        let jobs = parse_feed(&body, fetched_at)?;
        tracing::info!("WeWorkRemotely: found {} jobs", jobs.len());
        Ok(jobs)
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    title: String,
    link: String,
    description: String,
    #[serde(rename = "pubDate")]
    pub_date: String,
    #[serde(rename = "category")]
    categories: Vec<String>,
    region: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub fn parse_feed(body: &str, fetched_at: DateTime<Utc>) -> Result<Vec<CreateJob>, ScrapeError> {
    let feed: Rss = quick_xml::de::from_str(body).map_err(|e| ScrapeError::parse(NAME, e))?;

    Ok(feed
        .channel
        .items
        .into_iter()
        .filter_map(|item| convert_item(item, fetched_at))
        .collect())
}

fn convert_item(item: Item, fetched_at: DateTime<Utc>) -> Option<CreateJob> {
    let title_text = strip_markup(&item.title);
    let link = item.link.trim().to_string();
    if title_text.is_empty() || link.is_empty() {
        return None;
    }

    let (company, title) = split_title(&title_text);
    if company.is_empty() || title.is_empty() {
        return None;
    }

    let raw_description = item.description.trim().to_string();
    let mut description = strip_markup(&raw_description);

    let mut tokens: Vec<&str> = item.categories.iter().map(String::as_str).collect();
    tokens.extend(item.kind.as_deref());
    let job_type = job_type_from_tokens(&tokens);

    let location = location_from_categories(&item.categories)
        .or_else(|| item.region.as_deref().and_then(location_from_region))
        .or_else(|| location_from_text(&description))
        .unwrap_or_else(|| "Remote".to_string());

    if description.is_empty() {
        description = format!("{title} position at {company}");
    }

    let posted_date = DateTime::parse_from_rfc2822(item.pub_date.trim())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(fetched_at);

    Some(CreateJob {
        title: title.to_string(),
        company: company.to_string(),
        location,
        remote_type: Some("remote".to_string()),
        description,
        raw_description: Some(raw_description),
        salary_min: None,
        salary_max: None,
        job_type: job_type.to_string(),
        source_url: Some(link.clone()),
        validated_source_url: Some(link),
        source_site: NAME.to_string(),
        is_active: true,
        posted_date,
    })
}

/// Split `"Company: Role"` or `"Company - Role"`, preferring the colon. A title
/// with neither delimiter is all role and no company.
pub fn split_title(raw: &str) -> (&str, &str) {
    if let Some((company, role)) = raw.split_once(':') {
        return (company.trim(), role.trim());
    }
    if let Some((company, role)) = raw.split_once(" - ") {
        return (company.trim(), role.trim());
    }
    ("", raw.trim())
}

fn job_type_from_tokens(tokens: &[&str]) -> &'static str {
    let lowered: Vec<String> = tokens.iter().map(|t| t.trim().to_lowercase()).collect();
    if lowered.iter().any(|t| t.contains("contract")) {
        "contract"
    } else if lowered.iter().any(|t| t.contains("part-time") || t.contains("part time")) {
        "part-time"
    } else {
        DEFAULT_JOB_TYPE
    }
}

fn is_worldwide(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("worldwide") || lowered.contains("anywhere")
}

fn location_from_categories(categories: &[String]) -> Option<String> {
    categories
        .iter()
        .any(|c| is_worldwide(c))
        .then(|| "Worldwide".to_string())
}

fn location_from_region(region: &str) -> Option<String> {
    let region = region.trim();
    if region.is_empty() {
        None
    } else if is_worldwide(region) {
        Some("Worldwide".to_string())
    } else {
        Some(region.to_string())
    }
}

/// First location hint in free text: a worldwide keyword or a `Region/Region`
/// pair such as `USA/Canada`.
fn location_from_text(text: &str) -> Option<String> {
    static LOCATION: OnceLock<Regex> = OnceLock::new();
    let re = LOCATION.get_or_init(|| {
        Regex::new(r"(?i:\b(worldwide|global|anywhere)\b)|\b[A-Z][A-Za-z]+/[A-Z][A-Za-z]+\b")
            .expect("static location regex is valid")
    });

    let caps = re.captures(text)?;
    if caps.get(1).is_some() {
        Some("Worldwide".to_string())
    } else {
        caps.get(0).map(|m| m.as_str().to_string())
    }
}
