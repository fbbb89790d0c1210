use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;

use campaign_backend::{
    handlers,
    services::{
        campaign_store::CampaignStore,
        catalog::{ProductCatalog, UserDirectory},
        mailer::Mailer,
    },
    AppState,
};

/// Mailer that records every delivery instead of hitting a mail API. An
/// optional per-send delay keeps a broadcast observably in-flight for tests
/// that need to catch it mid-run.
pub struct RecordingMailer {
    pub sent: Mutex<Vec<String>>,
    delay: Option<std::time::Duration>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    pub fn with_delay(delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        _subject: &str,
        _html_body: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().push(to.to_string());
        Ok(())
    }
}

pub fn test_state(mailer: Arc<RecordingMailer>) -> AppState {
    AppState {
        campaigns: CampaignStore::new(),
        products: ProductCatalog::new(),
        users: UserDirectory::new(),
        mailer,
    }
}

/// Same routes as the production router in main.rs.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/email-campaigns",
            get(handlers::campaign::list_campaigns),
        )
        .route(
            "/api/email-campaigns/send-advertisement/{product_id}",
            post(handlers::campaign::send_advertisement),
        )
        .route(
            "/api/email-campaigns/test-template/{product_id}",
            post(handlers::campaign::send_test_template),
        )
        .route("/api/products", get(handlers::product::list_products))
        .route(
            "/api/products/import",
            post(handlers::product::import_products),
        )
        .route("/api/users/import", post(handlers::user::import_users))
        .with_state(state)
}

pub const MULTIPART_BOUNDARY: &str = "X-CAMPAIGN-TEST-BOUNDARY";

/// Hand-rolled multipart body with a single `file` field.
pub fn multipart_body(file_name: &str, csv: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = MULTIPART_BOUNDARY,
    )
}
