//! Taiga project-management API client. Covers authentication, project
//! listing, and time-entry submission/retrieval.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::TaigaConfig;
use crate::error::{Result, WrittenError};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Taiga REST API client. The auth token is acquired lazily on the first
/// `authenticate` call and cached for the process lifetime.
pub struct TaigaClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    configured_token: String,
    token: RwLock<Option<String>>,
}

/// Outcome of a time-entry submission. Submission never returns a hard
/// error; failures are reported in-band so callers can record them.
#[derive(Debug, Clone, Serialize)]
pub struct TaigaSubmission {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taiga_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "type")]
    auth_type: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    auth_token: Option<String>,
}

#[derive(Serialize)]
struct TimeEntryRequest<'a> {
    project: i64,
    description: &'a str,
    hours: f64,
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<i64>,
}

#[derive(Deserialize)]
struct TimeEntryResponse {
    id: Option<i64>,
}

impl TaigaClient {
    pub fn new(config: &TaigaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| WrittenError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(base_url = %config.base_url, "Taiga client initialized");

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            username: config.resolved_username(),
            password: config.resolved_password(),
            configured_token: config.resolved_auth_token(),
            token: RwLock::new(None),
        })
    }

    async fn bearer(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Establish a usable session. A pre-issued token is verified against
    /// the API; otherwise username/password auth is attempted. Returns false
    /// on any failure rather than erroring.
    pub async fn authenticate(&self) -> bool {
        if self.token.read().await.is_some() {
            return true;
        }

        if !self.configured_token.is_empty() {
            *self.token.write().await = Some(self.configured_token.clone());
            if self.verify_token().await {
                return true;
            }
            warn!("configured Taiga token failed verification");
            *self.token.write().await = None;
            return false;
        }

        if !self.username.is_empty() && !self.password.is_empty() {
            return self.authenticate_with_credentials().await;
        }

        error!("no Taiga authentication credentials provided");
        false
    }

    async fn authenticate_with_credentials(&self) -> bool {
        let url = format!("{}/api/v1/auth", self.base_url);
        let payload = AuthRequest {
            username: &self.username,
            password: &self.password,
            auth_type: "normal",
        };

        let resp = match self.client.post(&url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(err = %e, "Taiga authentication request failed");
                return false;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Taiga authentication failed");
            return false;
        }

        match resp.json::<AuthResponse>().await {
            Ok(AuthResponse {
                auth_token: Some(token),
            }) => {
                *self.token.write().await = Some(token);
                info!("successfully authenticated with Taiga");
                true
            }
            Ok(_) => {
                error!("Taiga auth response carried no token");
                false
            }
            Err(e) => {
                error!(err = %e, "failed to parse Taiga auth response");
                false
            }
        }
    }

    async fn verify_token(&self) -> bool {
        let url = format!("{}/api/v1/users/me", self.base_url);
        match self.get_authed(&url, &[]).await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                error!(err = %e, "token verification failed");
                false
            }
        }
    }

    async fn get_authed(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut req = self.client.get(url);
        if let Some(token) = self.bearer().await {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        if !params.is_empty() {
            req = req.query(params);
        }
        req.send().await
    }

    /// List projects visible to the authenticated user.
    pub async fn get_user_projects(&self) -> Result<Vec<Value>> {
        let url = format!("{}/api/v1/projects", self.base_url);
        let resp = self
            .get_authed(&url, &[])
            .await
            .map_err(|e| WrittenError::Taiga(format!("error fetching projects: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WrittenError::Taiga(format!(
                "failed to fetch projects: {status}"
            )));
        }

        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| WrittenError::Taiga(format!("failed to parse projects: {e}")))
    }

    /// Submit a time entry. All failure modes are folded into the returned
    /// `TaigaSubmission` so the caller can persist the outcome either way.
    pub async fn submit_activity(
        &self,
        project_id: i64,
        description: &str,
        hours: f64,
        activity_date: NaiveDate,
        user_id: Option<i64>,
    ) -> TaigaSubmission {
        let url = format!("{}/api/v1/time-entries", self.base_url);
        let payload = TimeEntryRequest {
            project: project_id,
            description,
            hours,
            date: activity_date.format("%Y-%m-%d").to_string(),
            user: user_id,
        };

        debug!(project_id, hours, date = %payload.date, "submitting activity to Taiga");

        let mut req = self.client.post(&url).json(&payload);
        if let Some(token) = self.bearer().await {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                let error_msg = format!("error submitting activity to Taiga: {e}");
                error!("{error_msg}");
                return TaigaSubmission {
                    success: false,
                    taiga_id: None,
                    error: Some(error_msg),
                    status_code: None,
                };
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let error_msg = format!("failed to submit activity: {status} - {body}");
            error!("{error_msg}");
            return TaigaSubmission {
                success: false,
                taiga_id: None,
                error: Some(error_msg),
                status_code: Some(status.as_u16()),
            };
        }

        match resp.json::<TimeEntryResponse>().await {
            Ok(entry) => {
                info!(taiga_id = ?entry.id, "successfully submitted activity to Taiga");
                TaigaSubmission {
                    success: true,
                    taiga_id: entry.id,
                    error: None,
                    status_code: Some(status.as_u16()),
                }
            }
            Err(e) => {
                let error_msg = format!("failed to parse Taiga submission response: {e}");
                error!("{error_msg}");
                TaigaSubmission {
                    success: false,
                    taiga_id: None,
                    error: Some(error_msg),
                    status_code: Some(status.as_u16()),
                }
            }
        }
    }

    /// Fetch time entries, optionally filtered by project and date range.
    pub async fn get_user_activities(
        &self,
        project_id: Option<i64>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/api/v1/time-entries", self.base_url);
        let params = time_entry_query(project_id, start_date, end_date);

        let resp = self
            .get_authed(&url, &params)
            .await
            .map_err(|e| WrittenError::Taiga(format!("error fetching activities: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WrittenError::Taiga(format!(
                "failed to fetch activities: {status}"
            )));
        }

        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| WrittenError::Taiga(format!("failed to parse activities: {e}")))
    }
}

/// Query-string pairs for the time-entries listing endpoint.
fn time_entry_query(
    project_id: Option<i64>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(id) = project_id {
        params.push(("project", id.to_string()));
    }
    if let Some(start) = start_date {
        params.push(("date__gte", start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = end_date {
        params.push(("date__lte", end.format("%Y-%m-%d").to_string()));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(token: &str, username: &str, password: &str) -> TaigaClient {
        TaigaClient::new(&TaigaConfig {
            base_url: "https://taiga.invalid".to_string(),
            username: username.to_string(),
            password: password.to_string(),
            auth_token: token.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn authenticate_without_credentials_fails() {
        // Env vars may provide credentials on some machines; skip if so.
        if std::env::var("TAIGA_AUTH_TOKEN").is_ok()
            || std::env::var("TAIGA_USERNAME").is_ok()
        {
            return;
        }
        let client = client_with("", "", "");
        assert!(!client.authenticate().await);
    }

    #[test]
    fn time_entry_serialization() {
        let payload = TimeEntryRequest {
            project: 42,
            description: "Worked on Alpha: fix bug",
            hours: 2.5,
            date: "2025-03-14".to_string(),
            user: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["project"], 42);
        assert_eq!(json["hours"], 2.5);
        assert_eq!(json["date"], "2025-03-14");
        // Absent user must not appear in the payload
        assert!(json.get("user").is_none());

        let payload = TimeEntryRequest {
            user: Some(7),
            ..payload
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["user"], 7);
    }

    #[test]
    fn time_entry_query_includes_only_present_filters() {
        assert!(time_entry_query(None, None, None).is_empty());

        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let params = time_entry_query(Some(42), Some(start), Some(end));
        assert_eq!(
            params,
            vec![
                ("project", "42".to_string()),
                ("date__gte", "2025-03-01".to_string()),
                ("date__lte", "2025-03-31".to_string()),
            ]
        );

        let params = time_entry_query(None, None, Some(end));
        assert_eq!(params, vec![("date__lte", "2025-03-31".to_string())]);
    }

    #[test]
    fn auth_request_uses_normal_type() {
        let payload = AuthRequest {
            username: "alice",
            password: "secret",
            auth_type: "normal",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "normal");
        assert_eq!(json["username"], "alice");
    }
}
