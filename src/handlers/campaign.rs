use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    jobs::broadcast::{render_advertisement, start_broadcast_job},
    models::campaign::{Campaign, DataEnvelope, ErrorResponse, MessageResponse, TestTemplateRequest},
    services::mailer::Mailer,
    AppState,
};

/// Handler for GET /api/email-campaigns
pub async fn list_campaigns(State(state): State<AppState>) -> Json<DataEnvelope<Vec<Campaign>>> {
    Json(DataEnvelope {
        data: state.campaigns.list(),
    })
}

/// Handler for POST /api/email-campaigns/send-advertisement/{product_id}
///
/// Opens (or returns the already-active) campaign for the product and spawns
/// the broadcast job. The response is the campaign's initial record; clients
/// track progress by polling the list endpoint.
pub async fn send_advertisement(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<DataEnvelope<Campaign>>, (StatusCode, Json<ErrorResponse>)> {
    let product = state.products.get(&product_id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                message: format!("Product '{}' not found", product_id),
            }),
        )
    })?;

    // Snapshot the recipient set before the record exists, so total_users is
    // fixed for the campaign's lifetime
    let recipients = state.users.list();

    let (campaign, created) = state
        .campaigns
        .open_for_send(&product_id, recipients.len() as u32);

    if created {
        start_broadcast_job(
            state.campaigns.clone(),
            state.mailer.clone(),
            product,
            recipients,
        );
    }

    Ok(Json(DataEnvelope { data: campaign }))
}

/// Handler for POST /api/email-campaigns/test-template/{product_id}
///
/// Sends one test email to the operator-supplied address. Does not create or
/// touch any campaign record.
pub async fn send_test_template(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(request): Json<TestTemplateRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let email = request.email.trim();
    if email.is_empty() {
        return Err(bad_request("Email is required"));
    }
    if !email.contains('@') {
        return Err(bad_request(&format!("Invalid email address '{}'", email)));
    }

    let product = state.products.get(&product_id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                message: format!("Product '{}' not found", product_id),
            }),
        )
    })?;

    let (subject, body) = render_advertisement(&product);

    state.mailer.send(email, &subject, &body).await.map_err(|e| {
        tracing::error!("Failed to send test email to {}: {}", email, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                message: format!("Failed to send test email: {}", e),
            }),
        )
    })?;

    Ok(Json(MessageResponse {
        message: format!("Test email sent to {}", email),
    }))
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            message: message.to_string(),
        }),
    )
}
