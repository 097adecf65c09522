use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{
    domain::utils::encode_path_segment,
    errors::{message_or_fallback, AppError, ExternalError},
    google_auth::{AccessTokenSource, AuthError},
};

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("calendar request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("calendar api returned status {status}")]
    Api {
        status: u16,
        message: Option<String>,
        body: Value,
    },
}

impl CalendarError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404 | 410, .. })
    }
}

impl ExternalError for CalendarError {
    fn best_effort_message(&self) -> String {
        match self {
            Self::Api { message, body, .. } => message_or_fallback(message.as_deref(), body),
            other => other.to_string(),
        }
    }
}

impl From<CalendarError> for AppError {
    fn from(error: CalendarError) -> Self {
        match error {
            CalendarError::Auth(AuthError::Configuration(config)) => AppError::Configuration(config),
            other => AppError::external("Google Calendar", &other),
        }
    }
}

/// Raw status and parsed body of a successful calendar call.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attendee {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Event fields to write; absent fields are left as they are on patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn list_upcoming_events(
        &self,
        time_min: DateTime<Utc>,
        max_results: u32,
    ) -> Result<CalendarResponse, CalendarError>;
    async fn get_event(&self, event_id: &str) -> Result<CalendarResponse, CalendarError>;
    async fn insert_event(&self, event: &EventBody) -> Result<CalendarResponse, CalendarError>;
    async fn patch_event(
        &self,
        event_id: &str,
        event: &EventBody,
    ) -> Result<CalendarResponse, CalendarError>;
    async fn delete_event(&self, event_id: &str) -> Result<CalendarResponse, CalendarError>;
}

pub struct GoogleCalendarClient {
    http: Client,
    base_url: String,
    calendar_id: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl GoogleCalendarClient {
    pub fn new(
        http: Client,
        calendar_id: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            http,
            base_url: GOOGLE_CALENDAR_API.to_string(),
            calendar_id: calendar_id.into(),
            tokens,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn http_client() -> Result<Client, reqwest::Error> {
        Client::builder().timeout(REQUEST_TIMEOUT).build()
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            encode_path_segment(&self.calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), encode_path_segment(event_id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<CalendarResponse, CalendarError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        if !(200..300).contains(&status) {
            debug!(status, "calendar request rejected");
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(CalendarError::Api {
                status,
                message,
                body,
            });
        }

        Ok(CalendarResponse { status, body })
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn list_upcoming_events(
        &self,
        time_min: DateTime<Utc>,
        max_results: u32,
    ) -> Result<CalendarResponse, CalendarError> {
        let request = self.http.get(self.events_url()).query(&[
            (
                "timeMin",
                time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("maxResults", max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);
        self.send(request).await
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarResponse, CalendarError> {
        self.send(self.http.get(self.event_url(event_id))).await
    }

    async fn insert_event(&self, event: &EventBody) -> Result<CalendarResponse, CalendarError> {
        self.send(self.http.post(self.events_url()).json(event)).await
    }

    async fn patch_event(
        &self,
        event_id: &str,
        event: &EventBody,
    ) -> Result<CalendarResponse, CalendarError> {
        self.send(self.http.patch(self.event_url(event_id)).json(event))
            .await
    }

    async fn delete_event(&self, event_id: &str) -> Result<CalendarResponse, CalendarError> {
        self.send(self.http.delete(self.event_url(event_id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedToken;

    #[async_trait]
    impl AccessTokenSource for FixedToken {
        async fn access_token(&self) -> Result<String, AuthError> {
            Ok("ya29.test".to_string())
        }
    }

    struct NoCredentials;

    #[async_trait]
    impl AccessTokenSource for NoCredentials {
        async fn access_token(&self) -> Result<String, AuthError> {
            Err(AuthError::Configuration(ConfigError::MissingCalendarCredentials {
                searched: "google_creds/credentials.json".to_string(),
            }))
        }
    }

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::new(Client::new(), "primary", Arc::new(FixedToken))
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn insert_event_posts_body_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(header("authorization", "Bearer ya29.test"))
            .and(body_json(json!({
                "summary": "Site visit",
                "start": {"dateTime": "2025-03-01T15:00:00Z", "timeZone": "America/Chicago"},
                "end": {"dateTime": "2025-03-01T16:00:00Z", "timeZone": "America/Chicago"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "evt_1",
                "htmlLink": "https://calendar.google.com/event?eid=evt_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let event = EventBody {
            summary: Some("Site visit".to_string()),
            start: Some(EventTime {
                date_time: "2025-03-01T15:00:00Z".to_string(),
                time_zone: Some("America/Chicago".to_string()),
            }),
            end: Some(EventTime {
                date_time: "2025-03-01T16:00:00Z".to_string(),
                time_zone: Some("America/Chicago".to_string()),
            }),
            ..EventBody::default()
        };

        let response = client(&server).insert_event(&event).await.expect("inserted");
        assert_eq!(response.status, 200);
        assert_eq!(response.body["id"], json!("evt_1"));
    }

    #[tokio::test]
    async fn list_requests_expanded_upcoming_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("maxResults", "10"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("timeMin", "2025-03-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let time_min = DateTime::parse_from_rfc3339("2025-03-01T00:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let response = client(&server)
            .list_upcoming_events(time_min, 10)
            .await
            .expect("listed");
        assert_eq!(response.body, json!({"items": []}));
    }

    #[tokio::test]
    async fn delete_reports_no_content_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/evt_1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let response = client(&server).delete_event("evt_1").await.expect("deleted");
        assert_eq!(response.status, 204);
        assert_eq!(response.body, Value::Null);
    }

    #[tokio::test]
    async fn missing_event_is_not_found_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "Not Found"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_event("nope").await.expect_err("missing");
        assert!(err.is_not_found());
        assert_eq!(err.best_effort_message(), "Not Found");
    }

    #[tokio::test]
    async fn missing_credentials_map_to_configuration_error() {
        let client = GoogleCalendarClient::new(Client::new(), "primary", Arc::new(NoCredentials));
        let err = client.get_event("evt_1").await.expect_err("no credentials");

        assert!(matches!(AppError::from(err), AppError::Configuration(_)));
    }

    #[test]
    fn calendar_ids_are_encoded_in_paths() {
        let client = GoogleCalendarClient::new(Client::new(), "team@example.com", Arc::new(FixedToken));
        assert_eq!(
            client.event_url("evt 1"),
            format!("{GOOGLE_CALENDAR_API}/calendars/team%40example.com/events/evt%201")
        );
    }
}
