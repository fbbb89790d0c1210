use std::env;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campaign_backend::{
    handlers,
    services::{
        campaign_store::CampaignStore,
        catalog::{ProductCatalog, UserDirectory},
        mailer::HttpMailer,
    },
    AppState,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campaign_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mail_api_url = env::var("MAIL_API_URL").expect("MAIL_API_URL must be set");
    let mail_api_key = env::var("MAIL_API_KEY").expect("MAIL_API_KEY must be set");
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

    let state = AppState {
        campaigns: CampaignStore::new(),
        products: ProductCatalog::new(),
        users: UserDirectory::new(),
        mailer: Arc::new(HttpMailer::new(mail_api_url, mail_api_key)),
    };

    // Build router
    let app = Router::new()
        .route("/", get(hello_campaigns))
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
        .route("/api/products/import", post(handlers::product::import_products))
        .route("/api/users/import", post(handlers::user::import_users))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind");

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

async fn hello_campaigns() -> &'static str {
    "Campaign backend is up"
}
