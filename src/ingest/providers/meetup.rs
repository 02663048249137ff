// src/ingest/providers/meetup.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::config::source::SourceConfig;
use crate::error::{SyncError, SyncResult};
use crate::ingest::types::{Record, UpstreamFetch};

#[derive(Debug, Deserialize)]
struct Payload {
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    name: String,
    local_date: String,
    local_time: String,
    #[serde(default)]
    description: Option<String>,
    group: Group,
    link: String,
}

#[derive(Debug, Deserialize)]
struct Group {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    who: Option<String>,
}

fn parse_local(date: &str, time: &str) -> SyncResult<NaiveDateTime> {
    let d = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| SyncError::Payload(format!("local_date {date:?}: {e}")))?;
    let t = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|e| SyncError::Payload(format!("local_time {time:?}: {e}")))?;
    Ok(d.and_time(t))
}

/// Map a `find/upcoming_events` payload into records, keeping upstream order.
pub fn parse_events(body: &str) -> SyncResult<Vec<Record>> {
    let payload: Payload = serde_json::from_str(body)?;

    let mut out = Vec::with_capacity(payload.events.len());
    for ev in payload.events {
        // Meetup reports venue-local wall time; stored as UTC without shifting.
        let occurs_at = parse_local(&ev.local_date, &ev.local_time)?.and_utc();
        out.push(Record {
            key: ev.name.clone(),
            occurs_at,
            summary: format!(
                "An event held by {} for {}",
                ev.group.name.as_deref().unwrap_or_default(),
                ev.group.who.as_deref().unwrap_or_default()
            ),
            title: ev.name,
            body: ev.description.unwrap_or_default(),
            origin_url: Some(ev.link).filter(|l| !l.trim().is_empty()),
        });
    }
    Ok(out)
}

pub struct MeetupProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl MeetupProvider {
    pub fn new() -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("event-sync/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| SyncError::Config(format!("http client: {e}")))?;
        Ok(Self {
            mode: Mode::Http { client },
        })
    }

    /// Serve a canned payload instead of calling the API.
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }
}

#[async_trait]
impl UpstreamFetch for MeetupProvider {
    async fn fetch(&self, cfg: &SourceConfig) -> SyncResult<Vec<Record>> {
        match &self.mode {
            Mode::Fixture(s) => parse_events(s),
            Mode::Http { client } => {
                let resp = client
                    .get(cfg.request_url())
                    .timeout(Duration::from_secs(cfg.request_timeout_secs))
                    .send()
                    .await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(SyncError::Transport(format!(
                        "meetup responded {status}"
                    )));
                }
                let body = resp.text().await?;
                parse_events(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Meetup"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_and_time_are_mapped() {
        let body = r#"{"events":[{"name":"Rust Night","local_date":"2018-11-20","local_time":"18:30",
            "group":{"name":"San Diego Rust","who":"Rustaceans"},"link":"https://meetup.test/e/1"}]}"#;
        let recs = parse_events(body).unwrap();
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.key, "Rust Night");
        assert_eq!(r.title, "Rust Night");
        assert_eq!(r.summary, "An event held by San Diego Rust for Rustaceans");
        assert_eq!(r.body, "");
        assert_eq!(r.occurs_at.to_rfc3339(), "2018-11-20T18:30:00+00:00");
        assert_eq!(r.origin_url.as_deref(), Some("https://meetup.test/e/1"));
    }

    #[test]
    fn missing_events_is_payload_error() {
        let err = parse_events(r#"{"results": []}"#).unwrap_err();
        assert!(matches!(err, SyncError::Payload(_)));
    }

    #[test]
    fn bad_time_is_payload_error() {
        let body = r#"{"events":[{"name":"x","local_date":"2018-11-20","local_time":"late",
            "group":{},"link":"l"}]}"#;
        assert!(matches!(parse_events(body), Err(SyncError::Payload(_))));
    }

    #[test]
    fn empty_event_list_is_ok() {
        assert!(parse_events(r#"{"events": []}"#).unwrap().is_empty());
    }
}
