use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

use crate::collectors::{JobCollector, fetch_text, strip_markup};
use crate::error::ScrapeError;
use crate::models::job::{CreateJob, DEFAULT_JOB_TYPE};

const NAME: &str = "RemoteOK";
const BASE_URL: &str = "https://remoteok.com";
const API_URL: &str = "https://remoteok.com/api";

pub struct RemoteOk {
    client: Client,
    url: String,
}

impl RemoteOk {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, API_URL)
    }

    pub fn with_endpoint(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl JobCollector for RemoteOk {
    fn name(&self) -> &str {
        NAME
    }

    async fn collect(&self) -> Result<Vec<CreateJob>, ScrapeError> {
        tracing::info!("Scraping RemoteOK via API");
        let fetched_at = Utc::now();

        let request = self.client.get(&self.url).header(ACCEPT, "application/json");
        let body = fetch_text(NAME, request).await?;

        let jobs = parse_postings(&body, fetched_at)?;
        tracing::info!("RemoteOK: found {} jobs", jobs.len());
        Ok(jobs)
    }
}

/// A JSON field the API has been seen to send as either a number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(serde_json::Number),
    Text(String),
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct RawPosting {
    id: Option<Lenient>,
    epoch: Option<Lenient>,
    date: Option<String>,
    company: Option<String>,
    position: Option<String>,
    description: Option<String>,
    location: Option<String>,
    salary_min: Option<Lenient>,
    salary_max: Option<Lenient>,
    job_type: Option<String>,
    url: Option<String>,
    apply_url: Option<String>,
}

/// Decode an API payload. Only a payload that is not a JSON array of entries
/// fails; entries that are metadata rows or malformed are skipped.
pub fn parse_postings(body: &str, fetched_at: DateTime<Utc>) -> Result<Vec<CreateJob>, ScrapeError> {
    let entries: Vec<Value> = serde_json::from_str(body).map_err(|e| ScrapeError::parse(NAME, e))?;

    let jobs = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawPosting>(entry).ok())
        .filter_map(|raw| convert_posting(raw, fetched_at))
        .collect();
    Ok(jobs)
}

fn convert_posting(raw: RawPosting, fetched_at: DateTime<Utc>) -> Option<CreateJob> {
    // The first entry is a legal notice without id/position/company.
    let id = raw.id.as_ref().and_then(parse_id)?;
    if id == "0" {
        return None;
    }
    let title = non_blank(raw.position)?;
    let company = non_blank(raw.company)?;

    let raw_description = raw.description.unwrap_or_default().trim().to_string();
    let mut description = strip_markup(&raw_description);
    if description.is_empty() {
        description = format!("{title} position at {company}");
    }

    let job_type = non_blank(raw.job_type).unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string());
    let location = non_blank(raw.location).unwrap_or_else(|| "Remote".to_string());

    let posted_date = raw
        .date
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| raw.epoch.as_ref().and_then(parse_epoch))
        .unwrap_or(fetched_at);

    let source_url = match non_blank(raw.url) {
        Some(url) if url.starts_with("http") => url,
        Some(path) => format!("{BASE_URL}{path}"),
        None => format!("{BASE_URL}/remote-jobs/{id}"),
    };
    let validated_source_url = non_blank(raw.apply_url).unwrap_or_else(|| source_url.clone());

    Some(CreateJob {
        title,
        company,
        location,
        remote_type: Some("remote".to_string()),
        description,
        raw_description: Some(raw_description),
        salary_min: raw.salary_min.as_ref().and_then(parse_salary),
        salary_max: raw.salary_max.as_ref().and_then(parse_salary),
        job_type,
        source_url: Some(source_url),
        validated_source_url: Some(validated_source_url),
        source_site: NAME.to_string(),
        is_active: true,
        posted_date,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Identifiers arrive as `"123"` or `123`; both normalize to `"123"`.
fn parse_id(value: &Lenient) -> Option<String> {
    match value {
        Lenient::Text(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Lenient::Number(n) => n
            .as_i64()
            .map(|v| v.to_string())
            .or_else(|| n.as_u64().map(|v| v.to_string()))
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| format!("{v:.0}"))),
        Lenient::Other(_) => None,
    }
}

fn parse_epoch(value: &Lenient) -> Option<DateTime<Utc>> {
    let secs = match value {
        Lenient::Number(n) => n.as_i64()?,
        Lenient::Text(s) => s.trim().parse().ok()?,
        Lenient::Other(_) => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

/// Numbers are taken as-is; strings such as `"$120,000"` or `"90k - 110k"`
/// are reduced to their first amount. Anything else is dropped.
fn parse_salary(value: &Lenient) -> Option<f64> {
    let amount = match value {
        Lenient::Number(n) => n.as_f64()?,
        Lenient::Text(s) => parse_salary_text(s)?,
        Lenient::Other(_) => return None,
    };
    Some(amount).filter(|v| v.is_finite() && *v > 0.0)
}

/// First amount in the text, wherever it starts. A group of `,` or `.`
/// thousands separators is removed; otherwise `.` is the decimal point.
fn parse_salary_text(raw: &str) -> Option<f64> {
    static AMOUNT: OnceLock<Regex> = OnceLock::new();
    static GROUPED: OnceLock<Regex> = OnceLock::new();
    let amount = AMOUNT.get_or_init(|| {
        Regex::new(r"(\d(?:[\d.,]*\d)?)(?:\s*([kK])\b)?").expect("static salary regex is valid")
    });
    let grouped = GROUPED.get_or_init(|| {
        Regex::new(r"^\d{1,3}(?:(?:,\d{3})+|(?:\.\d{3})+)$").expect("static grouping regex is valid")
    });

    let caps = amount.captures(raw)?;
    let digits = caps.get(1)?.as_str();
    let number: String = if grouped.is_match(digits) {
        digits.chars().filter(char::is_ascii_digit).collect()
    } else {
        digits.chars().filter(|c| *c != ',').collect()
    };
    let value: f64 = number.parse().ok()?;

    if caps.get(2).is_some() {
        Some(value * 1000.0)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn skips_legal_notice_and_returns_postings() {
        let body = r#"[
            {"last_updated": 1700000000, "legal": "API terms of service"},
            {"id": "1001", "position": "Backend Engineer", "company": "Acme",
             "url": "https://remoteok.com/remote-jobs/1001", "date": "2026-02-20T08:30:00+00:00"},
            {"id": 1002, "position": "Data Engineer", "company": "Globex",
             "url": "/remote-jobs/1002", "epoch": 1771000000}
        ]"#;

        let jobs = parse_postings(body, fetched_at()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title, "Backend Engineer");
        assert_eq!(jobs[1].source_url.as_deref(), Some("https://remoteok.com/remote-jobs/1002"));
        assert_eq!(
            jobs[0].posted_date,
            Utc.with_ymd_and_hms(2026, 2, 20, 8, 30, 0).unwrap()
        );
        assert_eq!(jobs[1].posted_date, DateTime::from_timestamp(1_771_000_000, 0).unwrap());
    }

    #[test]
    fn applies_defaults_for_missing_fields() {
        let body = r#"[{"id": "7", "position": "SRE", "company": "Initech", "url": "https://remoteok.com/x/7"}]"#;
        let job = parse_postings(body, fetched_at()).unwrap().remove(0);

        assert_eq!(job.job_type, "full-time");
        assert_eq!(job.location, "Remote");
        assert_eq!(job.posted_date, fetched_at());
        assert_eq!(job.description, "SRE position at Initech");
        assert_eq!(job.validated_source_url, job.source_url);
        assert_eq!(job.remote_type.as_deref(), Some("remote"));
    }

    #[test]
    fn malformed_entry_does_not_hide_the_rest() {
        let body = r#"[
            {"id": "1", "position": "", "company": "Acme"},
            {"id": "2", "position": "Dev", "company": 42},
            {"id": null, "position": "Dev", "company": "Acme"},
            {"id": 0, "position": "Dev", "company": "Acme"},
            "not an object",
            {"id": "3", "position": "Engineer", "company": "Hooli", "url": "https://remoteok.com/3"}
        ]"#;

        let jobs = parse_postings(body, fetched_at()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "Hooli");
    }

    #[test]
    fn non_array_payload_is_a_parse_error() {
        let err = parse_postings(r#"{"error": "rate limited"}"#, fetched_at()).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse { .. }));
        assert!(parse_postings("<html>", fetched_at()).is_err());
    }

    #[test]
    fn salary_is_parsed_leniently() {
        let body = r#"[
            {"id": "1", "position": "A", "company": "B", "salary_min": 90000, "salary_max": "$120,000 USD"},
            {"id": "2", "position": "A", "company": "B", "salary_min": "competitive", "salary_max": 0},
            {"id": "3", "position": "A", "company": "B", "salary_min": "80k - 100k", "salary_max": {"amount": 1}},
            {"id": "4", "position": "A", "company": "B", "salary_min": "USD 120,000", "salary_max": "~$120k"},
            {"id": "5", "position": "A", "company": "B", "salary_min": "€80.000", "salary_max": "$ 90,000 - 110,000"},
            {"id": "6", "position": "A", "company": "B", "salary_min": "up to 1,234.50", "salary_max": "12.5K/yr"}
        ]"#;
        let jobs = parse_postings(body, fetched_at()).unwrap();

        assert_eq!(jobs[0].salary_min, Some(90000.0));
        assert_eq!(jobs[0].salary_max, Some(120000.0));
        assert_eq!(jobs[1].salary_min, None);
        assert_eq!(jobs[1].salary_max, None);
        assert_eq!(jobs[2].salary_min, Some(80000.0));
        assert_eq!(jobs[2].salary_max, None);
        assert_eq!(jobs[3].salary_min, Some(120000.0));
        assert_eq!(jobs[3].salary_max, Some(120000.0));
        assert_eq!(jobs[4].salary_min, Some(80000.0));
        assert_eq!(jobs[4].salary_max, Some(90000.0));
        assert_eq!(jobs[5].salary_min, Some(1234.5));
        assert_eq!(jobs[5].salary_max, Some(12500.0));
    }

    #[test]
    fn identifiers_normalize_to_strings() {
        assert_eq!(parse_id(&Lenient::Text(" 55 ".into())), Some("55".to_string()));
        assert_eq!(parse_id(&Lenient::Number(55.into())), Some("55".to_string()));
        assert_eq!(parse_id(&Lenient::Text("".into())), None);
        assert_eq!(parse_id(&Lenient::Other(IgnoredAny)), None);
    }

    #[test]
    fn cleans_description_and_prefers_apply_url() {
        let body = r#"[{"id": "9", "position": "Dev", "company": "Acme",
            "url": "https://remoteok.com/9", "apply_url": "https://acme.test/apply",
            "description": "<p>Rust &amp; Go</p>", "job_type": "contract", "location": "EU"}]"#;
        let job = parse_postings(body, fetched_at()).unwrap().remove(0);

        assert_eq!(job.description, "Rust & Go");
        assert_eq!(job.raw_description.as_deref(), Some("<p>Rust &amp; Go</p>"));
        assert_eq!(job.validated_source_url.as_deref(), Some("https://acme.test/apply"));
        assert_eq!(job.job_type, "contract");
        assert_eq!(job.location, "EU");
    }
}
