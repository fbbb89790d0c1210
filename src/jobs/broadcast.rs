use std::sync::Arc;

use crate::models::product::Product;
use crate::models::user::User;
use crate::services::campaign_store::CampaignStore;
use crate::services::mailer::Mailer;

/// Spawn the fan-out sender for one campaign.
///
/// The recipient set is snapshotted by the caller before the campaign record
/// is created, so `total_users` stays fixed even if users are imported while
/// the broadcast runs. Per-recipient failures are counted and logged but do
/// not abort the run; progress counts processed recipients either way, so a
/// completed campaign always reports `sent_count == total_users`.
pub fn start_broadcast_job(
    store: CampaignStore,
    mailer: Arc<dyn Mailer>,
    product: Product,
    recipients: Vec<User>,
) {
    tokio::spawn(async move {
        let product_id = product.id.clone();
        let total = recipients.len();

        tracing::info!(
            "[broadcast] Starting campaign for product {} ({} recipients)",
            product_id,
            total
        );

        store.mark_sending(&product_id);

        let (subject, body) = render_advertisement(&product);
        let mut failed = 0;

        for (idx, user) in recipients.iter().enumerate() {
            if let Err(e) = mailer.send(&user.email, &subject, &body).await {
                failed += 1;
                tracing::error!("[broadcast] Failed to send to {}: {}", user.email, e);
            }
            store.record_progress(&product_id);

            if (idx + 1) % 100 == 0 {
                tracing::info!("[broadcast] Progress: {}/{} for {}", idx + 1, total, product_id);
            }
        }

        store.mark_completed(&product_id);

        tracing::info!(
            "[broadcast] Campaign for product {} complete ({} sent, {} failed)",
            product_id,
            total - failed,
            failed
        );
    });
}

/// Advertisement email for one product.
pub fn render_advertisement(product: &Product) -> (String, String) {
    let subject = format!("New from {}: {}", product.brand, product.title);

    let body = format!(
        "<h1>{title}</h1>\
         <p>{brand} &middot; {season} &middot; {color}</p>\
         <p><s>{price:.2}</s> <strong>{final_price:.2}</strong></p>",
        title = product.title,
        brand = product.brand,
        season = product.season,
        color = product.color,
        price = product.price,
        final_price = product.final_price,
    );

    (subject, body)
}
