use anyhow::Result;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Failure reported by the PostgREST store, carried inside `anyhow::Error`
/// so callers can `downcast_ref` when the status matters.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// `code` is the Postgres SQLSTATE PostgREST puts in the error body.
    #[error("Conflict ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
    Conflict { code: Option<String>, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

pub const UNIQUE_VIOLATION: &str = "23505";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

impl SupabaseError {
    fn conflict_code(err: &anyhow::Error) -> Option<&str> {
        match err.downcast_ref::<SupabaseError>() {
            Some(SupabaseError::Conflict { code, .. }) => code.as_deref(),
            _ => None,
        }
    }

    /// A write hit a unique constraint.
    pub fn is_unique_violation(err: &anyhow::Error) -> bool {
        Self::conflict_code(err) == Some(UNIQUE_VIOLATION)
    }

    /// A write referenced a row that does not exist (any more).
    pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
        Self::conflict_code(err) == Some(FOREIGN_KEY_VIOLATION)
    }

    /// Raw store message of a conflict, e.g. to tell which constraint fired.
    pub fn conflict_message(err: &anyhow::Error) -> Option<&str> {
        match err.downcast_ref::<SupabaseError>() {
            Some(SupabaseError::Conflict { message, .. }) => Some(message),
            _ => None,
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    /// `Prefer: return=representation`, used by every write that needs the stored row back.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, extra_headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET with `Prefer: count=exact`; returns the rows plus the total from `Content-Range`.
    pub async fn request_with_count<T>(&self, path: &str, auth_token: Option<&str>)
                                       -> Result<(Vec<T>, i64)>
    where T: DeserializeOwned {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self.send(Method::GET, path, auth_token, None, Some(headers)).await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);

        let rows = response.json::<Vec<T>>().await?;
        let total = total.unwrap_or(rows.len() as i64);

        Ok((rows, total))
    }

    async fn send(&self, method: Method, path: &str,
                  auth_token: Option<&str>, body: Option<Value>,
                  extra_headers: Option<HeaderMap>)
                  -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => SupabaseError::Auth(error_text),
                404 => SupabaseError::NotFound(error_text),
                409 => SupabaseError::Conflict {
                    code: postgrest_error_code(&error_text),
                    message: error_text,
                },
                code => SupabaseError::Api { status: code, message: error_text },
            }.into());
        }

        Ok(response)
    }
}

/// `{"code":"23505","message":..}` -> `23505`.
fn postgrest_error_code(body: &str) -> Option<String> {
    let body: Value = serde_json::from_str(body).ok()?;
    body.get("code")?.as_str().map(str::to_string)
}

/// `Content-Range: 0-24/3573` -> 3573, `*/0` -> 0.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
