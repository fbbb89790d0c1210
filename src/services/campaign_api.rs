use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::campaign::{Campaign, DataEnvelope, ErrorResponse, MessageResponse, TestTemplateRequest};
use crate::models::import::{ImportReport, RowError};
use crate::models::product::Product;

/// Fallback when the server returns an error without a usable message body.
const GENERIC_FAILURE: &str = "Something went wrong";

/// Errors from the campaign API boundary. Every endpoint returns a
/// discriminated result instead of a loosely-typed JSON blob.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status; carries the server's `message` field verbatim, or a
    /// generic fallback when the body had none.
    #[error("{0}")]
    Server(String),

    /// A 2xx response whose body did not decode as the expected shape.
    #[error("Invalid JSON response")]
    InvalidJson,

    /// Rejected before any network I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Import rejected; per-row messages as reported by the server.
    #[error("import rejected: {} row(s) failed", .0.len())]
    Rejected(Vec<RowError>),
}

/// Typed HTTP client for the campaign backend.
#[derive(Clone)]
pub struct CampaignApiClient {
    client: Client,
    base_url: String,
}

impl CampaignApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET /api/email-campaigns
    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>, ApiError> {
        let url = format!("{}/api/email-campaigns", self.base_url);
        let response = self.client.get(&url).send().await?;
        let envelope: DataEnvelope<Vec<Campaign>> = decode(response).await?;
        Ok(envelope.data)
    }

    /// POST /api/email-campaigns/send-advertisement/{productId}
    ///
    /// Fire-and-forget trigger; the returned campaign is the server's
    /// initial record, not a completion acknowledgment.
    pub async fn start_send(&self, product_id: &str) -> Result<Campaign, ApiError> {
        let url = format!(
            "{}/api/email-campaigns/send-advertisement/{}",
            self.base_url, product_id
        );
        let response = self.client.post(&url).send().await?;
        let envelope: DataEnvelope<Campaign> = decode(response).await?;
        Ok(envelope.data)
    }

    /// POST /api/email-campaigns/test-template/{productId}
    ///
    /// Sends a single test email; never touches any campaign record. Only a
    /// non-empty check happens here, format validation is the server's job.
    pub async fn send_preview(&self, product_id: &str, email: &str) -> Result<String, ApiError> {
        if email.trim().is_empty() {
            return Err(ApiError::InvalidInput("Email is required".to_string()));
        }

        let url = format!(
            "{}/api/email-campaigns/test-template/{}",
            self.base_url, product_id
        );
        let response = self
            .client
            .post(&url)
            .json(&TestTemplateRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        let body: MessageResponse = decode(response).await?;
        Ok(body.message)
    }

    /// GET /api/products
    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let url = format!("{}/api/products", self.base_url);
        let response = self.client.get(&url).send().await?;
        let envelope: DataEnvelope<Vec<Product>> = decode(response).await?;
        Ok(envelope.data)
    }

    /// POST /api/products/import (multipart CSV)
    pub async fn import_products(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportReport, ApiError> {
        self.import("products", file_name, bytes).await
    }

    /// POST /api/users/import (multipart CSV)
    pub async fn import_users(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportReport, ApiError> {
        self.import("users", file_name, bytes).await
    }

    async fn import(
        &self,
        resource: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportReport, ApiError> {
        let url = format!("{}/api/{}/import", self.base_url, resource);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Rejections come back as { data: { errors: [{row, message}] } };
            // anything else falls through to the shared { message } contract.
            if let Ok(envelope) = serde_json::from_str::<DataEnvelope<ImportReport>>(&body) {
                if let Some(errors) = envelope.data.errors {
                    return Err(ApiError::Rejected(errors));
                }
            }
            return Err(ApiError::Server(extract_message(&body)));
        }

        let envelope: DataEnvelope<ImportReport> =
            serde_json::from_str(&body).map_err(|_| ApiError::InvalidJson)?;
        Ok(envelope.data)
    }
}

/// Shared response decoding: non-2xx surfaces the server message (or the
/// generic fallback), a 2xx with a non-JSON body is a hard failure.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Server(extract_message(&body)));
    }

    serde_json::from_str(&body).map_err(|_| ApiError::InvalidJson)
}

fn extract_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| GENERIC_FAILURE.to_string())
}
