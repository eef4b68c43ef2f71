use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, warn};
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::api::models::{
    AuthSession, BagAnalysis, Earthquake, FamilyMember, MeetingPoint, NewFamilyMember, RoomAnalysis,
    SafetyScore, User,
};
use crate::utils::normalize_url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid server address: {0}")]
    InvalidBaseUrl(String),
    #[error("You need to sign in first.")]
    Unauthenticated,
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// REST client for the preparedness backend.
///
/// Every path is resolved against `<base>/api/`. Calls that touch the
/// user's own data need a bearer token from [`ApiClient::login`] or
/// [`ApiClient::with_token`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::Transport)?;
        Ok(Self { http, base: Self::base_api(base_url)?, token: None })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn base_api(base_url: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&normalize_url(base_url))
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url} ({e})")))?;
        let path = url.path().trim_end_matches('/').to_string();
        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{path} ({e})")))
    }

    fn with_auth(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match &self.token {
            Some(t) => Ok(req.bearer_auth(t)),
            None => Err(ApiError::Unauthenticated),
        }
    }

    fn maybe_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn send(req: RequestBuilder) -> Result<Value, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("backend answered {status}");
            return Err(ApiError::Status { status: status.as_u16(), message: error_message(status, &body) });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_item<T: DeserializeOwned>(req: RequestBuilder, key: &str) -> Result<T, ApiError> {
        let json = Self::send(req).await?;
        decode(unwrap_item(json, key))
    }

    async fn send_list<T: DeserializeOwned>(req: RequestBuilder, key: &str) -> Result<Vec<T>, ApiError> {
        let json = Self::send(req).await?;
        unwrap_list(json, key).into_iter().map(decode).collect()
    }

    /// Sign in and keep the returned token for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let req = self.http.post(self.endpoint("auth/login")?).json(&body);
        let session: AuthSession = Self::send_item(req, "session").await?;
        debug!("signed in as {}", session.user.email);
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let body = serde_json::json!({ "name": name, "email": email, "password": password });
        let req = self.http.post(self.endpoint("auth/register")?).json(&body);
        let session: AuthSession = Self::send_item(req, "session").await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        let req = self.with_auth(self.http.get(self.endpoint("auth/me")?))?;
        Self::send_item(req, "user").await
    }

    pub async fn family(&self) -> Result<Vec<FamilyMember>, ApiError> {
        let req = self.with_auth(self.http.get(self.endpoint("family")?))?;
        Self::send_list(req, "members").await
    }

    pub async fn add_family_member(&self, member: &NewFamilyMember) -> Result<FamilyMember, ApiError> {
        let req = self.with_auth(self.http.post(self.endpoint("family")?).json(member))?;
        Self::send_item(req, "member").await
    }

    pub async fn update_family_member(&self, id: &str, member: &NewFamilyMember) -> Result<FamilyMember, ApiError> {
        let req = self.with_auth(self.http.put(self.endpoint(&format!("family/{id}"))?).json(member))?;
        Self::send_item(req, "member").await
    }

    pub async fn remove_family_member(&self, id: &str) -> Result<(), ApiError> {
        let req = self.with_auth(self.http.delete(self.endpoint(&format!("family/{id}"))?))?;
        Self::send(req).await.map(|_| ())
    }

    /// The shared meeting point, or `None` when the family has not set one.
    pub async fn meeting_point(&self) -> Result<Option<MeetingPoint>, ApiError> {
        let req = self.with_auth(self.http.get(self.endpoint("family/meeting-point")?))?;
        match Self::send(req).await {
            Ok(json) => match unwrap_item(json, "meetingPoint") {
                Value::Null => Ok(None),
                item => decode(item).map(Some),
            },
            Err(ApiError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn set_meeting_point(&self, point: &MeetingPoint) -> Result<MeetingPoint, ApiError> {
        let req = self.with_auth(self.http.put(self.endpoint("family/meeting-point")?).json(point))?;
        Self::send_item(req, "meetingPoint").await
    }

    pub async fn safety_score(&self) -> Result<SafetyScore, ApiError> {
        let req = self.with_auth(self.http.get(self.endpoint("safety/score")?))?;
        Self::send_item(req, "safetyScore").await
    }

    pub async fn update_safety_score(&self, score: &SafetyScore) -> Result<SafetyScore, ApiError> {
        let req = self.with_auth(self.http.put(self.endpoint("safety/score")?).json(score))?;
        Self::send_item(req, "safetyScore").await
    }

    /// SafeZone: send a room photo for server-side analysis.
    pub async fn analyze_room(&self, image: &[u8]) -> Result<RoomAnalysis, ApiError> {
        let req = self.with_auth(self.http.post(self.endpoint("safety/analyze-room")?).json(&ImagePayload::new(image)))?;
        Self::send_item(req, "analysis").await
    }

    /// PrepCheck: send an emergency bag photo for server-side analysis.
    pub async fn analyze_bag(&self, image: &[u8]) -> Result<BagAnalysis, ApiError> {
        let req = self.with_auth(self.http.post(self.endpoint("emergency/analyze-bag")?).json(&ImagePayload::new(image)))?;
        Self::send_item(req, "analysis").await
    }

    /// Latest earthquakes, newest first as the server sends them.
    pub async fn earthquakes(&self, limit: usize) -> Result<Vec<Earthquake>, ApiError> {
        let mut url = self.endpoint("earthquakes")?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let req = self.maybe_auth(self.http.get(url));
        Self::send_list(req, "earthquakes").await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload {
    image_base64: String,
}

impl ImagePayload {
    fn new(image: &[u8]) -> Self {
        Self { image_base64: BASE64.encode(image) }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

// Lists come back bare, under `data`, or under a resource-specific key.
fn unwrap_list(json: Value, key: &str) -> Vec<Value> {
    match json {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data").or_else(|| map.remove(key)) {
            Some(Value::Array(items)) => items,
            Some(inner @ Value::Object(_)) => unwrap_list(inner, key),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn unwrap_item(json: Value, key: &str) -> Value {
    match json {
        Value::Object(mut map) => {
            if let Some(inner @ Value::Object(_)) = map.get("data").cloned() {
                return unwrap_item(inner, key);
            }
            if matches!(map.get(key), Some(Value::Object(_)) | Some(Value::Null)) {
                return map.remove(key).unwrap_or(Value::Null);
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn base_api_appends_api_segment_once() {
        assert_eq!(ApiClient::base_api("example.org").unwrap().as_str(), "https://example.org/api/");
        assert_eq!(ApiClient::base_api("http://10.0.0.2:3000/").unwrap().as_str(), "http://10.0.0.2:3000/api/");
        assert_eq!(ApiClient::base_api("https://x.io/v2/api").unwrap().as_str(), "https://x.io/v2/api/");
    }

    #[test]
    fn lists_are_found_in_every_envelope() {
        assert_eq!(unwrap_list(json!([1, 2]), "members"), vec![json!(1), json!(2)]);
        assert_eq!(unwrap_list(json!({"data": [3]}), "members"), vec![json!(3)]);
        assert_eq!(unwrap_list(json!({"members": [4]}), "members"), vec![json!(4)]);
        assert_eq!(unwrap_list(json!({"data": {"members": [5]}}), "members"), vec![json!(5)]);
        assert!(unwrap_list(json!({"other": 1}), "members").is_empty());
    }

    #[test]
    fn items_unwrap_data_and_named_keys() {
        assert_eq!(unwrap_item(json!({"data": {"id": "1"}}), "member"), json!({"id": "1"}));
        assert_eq!(unwrap_item(json!({"member": {"id": "2"}}), "member"), json!({"id": "2"}));
        assert_eq!(unwrap_item(json!({"id": "3"}), "member"), json!({"id": "3"}));
        assert_eq!(unwrap_item(json!({"meetingPoint": null}), "meetingPoint"), Value::Null);
    }

    #[test]
    fn error_message_prefers_server_text() {
        assert_eq!(error_message(StatusCode::BAD_REQUEST, r#"{"message":"bad phone"}"#), "bad phone");
        assert_eq!(error_message(StatusCode::NOT_FOUND, "<html>"), "Not Found");
    }
}
