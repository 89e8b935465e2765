//! XTM Cloud REST client
//!
//! Thin blocking transport behind the [`StatisticsSource`] and
//! [`ProjectLister`] traits. Retrying is the caller's job; this module only
//! classifies each failed attempt into an [`ApiError`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

use crate::services::period::CompletionWindow;
use crate::types::{ApiError, Project, ProjectId, Result, XtmError};

/// Response headers that carry a support correlation id, in lookup order
const TRACE_HEADERS: [&str; 3] = ["xtm-trace-id", "x-trace-id", "x-request-id"];

/// Source of raw per-project statistics payloads.
pub trait StatisticsSource {
    fn project_statistics(&self, project_id: ProjectId) -> std::result::Result<Value, ApiError>;
}

/// Source of the projects that fall in a completion window.
pub trait ProjectLister {
    fn list_projects(
        &self,
        window: &CompletionWindow,
    ) -> std::result::Result<Vec<Project>, ApiError>;
}

pub struct XtmClient {
    http: Client,
    base_url: String,
    authorization: String,
}

impl XtmClient {
    /// Build a client; `timeout` bounds every individual request.
    pub fn new(base_url: &str, auth_type: &str, auth_token: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| XtmError::Config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("{} {}", auth_type, auth_token),
        })
    }

    fn get(&self, endpoint: &str) -> std::result::Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, "GET");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .map_err(|e| classify_transport(&e))?;

        Self::decode(response)
    }

    fn decode(response: Response) -> std::result::Result<Value, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                trace_id: trace_id(response.headers()),
            });
        }

        let bytes = response.bytes().map_err(|e| classify_transport(&e))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl StatisticsSource for XtmClient {
    fn project_statistics(&self, project_id: ProjectId) -> std::result::Result<Value, ApiError> {
        self.get(&format!("projects/{}/statistics", project_id))
    }
}

impl ProjectLister for XtmClient {
    fn list_projects(
        &self,
        window: &CompletionWindow,
    ) -> std::result::Result<Vec<Project>, ApiError> {
        let body = self.get("projects")?;
        let projects: Vec<Project> = parse_projects(&body)
            .into_iter()
            .filter(|p| window.contains(p.completed_at))
            .collect();
        debug!(count = projects.len(), "projects in window");
        Ok(projects)
    }
}

fn classify_transport(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Connection(err.to_string())
    }
}

fn trace_id(headers: &HeaderMap) -> Option<String> {
    TRACE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

/// Parse the `/projects` listing. Entries without a numeric id are skipped.
pub fn parse_projects(body: &Value) -> Vec<Project> {
    let Some(entries) = body.as_array() else {
        warn!("project listing is not a list; treating as empty");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let Some(id) = entry.get("id").and_then(Value::as_u64) else {
                warn!(entry = %entry, "skipping project without id");
                return None;
            };
            Some(Project {
                id,
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                status: entry
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN")
                    .to_string(),
                target_locale: target_locale(entry),
                completed_at: ["createdDate", "modificationDate"]
                    .iter()
                    .find_map(|key| entry.get(*key).and_then(epoch_millis)),
            })
        })
        .collect()
}

fn target_locale(entry: &Value) -> Option<String> {
    if let Some(locale) = entry.get("targetLanguage").and_then(Value::as_str) {
        return Some(locale.to_string());
    }
    entry
        .get("targetLanguages")
        .and_then(Value::as_array)
        .and_then(|locales| locales.first())
        .and_then(Value::as_str)
        .map(String::from)
}

fn epoch_millis(value: &Value) -> Option<DateTime<Utc>> {
    let millis = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_projects_full_entry() {
        let body = json!([{
            "id": 42,
            "name": "Help Center",
            "status": "FINISHED",
            "targetLanguages": ["es_ES", "de_DE"],
            "createdDate": 1_709_251_200_000_i64
        }]);

        let projects = parse_projects(&body);

        assert_eq!(projects.len(), 1);
        let p = &projects[0];
        assert_eq!(p.id, 42);
        assert_eq!(p.name, "Help Center");
        assert_eq!(p.status, "FINISHED");
        assert_eq!(p.target_locale.as_deref(), Some("es_ES"));
        assert_eq!(
            p.completed_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_projects_skips_missing_id() {
        let body = json!([
            {"id": 1, "name": "ok"},
            {"id": null, "name": "invalid"},
            {"name": "no id"}
        ]);

        let projects = parse_projects(&body);

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, 1);
        assert_eq!(projects[0].status, "UNKNOWN");
        assert!(projects[0].completed_at.is_none());
    }

    #[test]
    fn test_parse_projects_falls_back_to_modification_date() {
        let body = json!([{"id": 7, "modificationDate": 1_704_067_200_000_i64}]);
        let projects = parse_projects(&body);
        assert_eq!(
            projects[0].completed_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_projects_ignores_finish_date() {
        let body = json!([{
            "id": 8,
            "finishDate": 1_717_200_000_000_i64,
            "createdDate": 1_709_251_200_000_i64
        }]);
        let projects = parse_projects(&body);
        assert_eq!(
            projects[0].completed_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_projects_non_list() {
        assert!(parse_projects(&json!({"error": "nope"})).is_empty());
        assert!(parse_projects(&Value::Null).is_empty());
    }

    #[test]
    fn test_trace_id_header_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "req-9".parse().unwrap());
        assert_eq!(trace_id(&headers).as_deref(), Some("req-9"));

        headers.insert("xtm-trace-id", "xtm-1".parse().unwrap());
        assert_eq!(trace_id(&headers).as_deref(), Some("xtm-1"));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = XtmClient::new(
            "https://example.test/api/",
            "XTM-Basic",
            "token",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://example.test/api");
        assert_eq!(client.authorization, "XTM-Basic token");
    }
}
