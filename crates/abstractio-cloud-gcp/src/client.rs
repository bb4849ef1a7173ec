//! Authenticated JSON transport shared by the GCP clients

use crate::error::{GcpError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bearer-token HTTP client; token minting is left to the caller
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: reqwest::Client,
    access_token: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

/// Google API error envelope: `{"error": {"code": 404, "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl ApiClient {
    pub(crate) fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        read_json(response).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        tracing::debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        tracing::debug!(url, "PUT");
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!(url, "DELETE");
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    if body.trim().is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_str(&body)?)
}

pub(crate) fn api_error(status: u16, body: &str) -> GcpError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    GcpError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_envelope() {
        let body = r#"{"error": {"code": 404, "message": "Resource 'svc' not found", "status": "NOT_FOUND"}}"#;
        let err = api_error(404, body);

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "GCP API error (404): Resource 'svc' not found");
    }

    #[test]
    fn test_api_error_from_plain_body() {
        let err = api_error(502, "  Bad Gateway\n");
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().ends_with("Bad Gateway"));
    }
}
