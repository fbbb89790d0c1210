use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::campaign::{Campaign, CampaignStatus};

/// Server-side record store for broadcast campaigns, keyed by product id.
///
/// Enforces the one-active-campaign-per-product rule: triggering a send while
/// a campaign is pending or sending hands back the existing record, and only
/// a completed campaign is superseded by a fresh one.
#[derive(Clone)]
pub struct CampaignStore {
    inner: Arc<RwLock<HashMap<String, Campaign>>>,
}

impl CampaignStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn list(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self.inner.read().values().cloned().collect();
        campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        campaigns
    }

    pub fn get(&self, product_id: &str) -> Option<Campaign> {
        self.inner.read().get(product_id).cloned()
    }

    /// Open a campaign for the given product, snapshotting the recipient-set
    /// size. Returns the campaign and whether it was newly created; an
    /// existing non-terminal campaign is returned as-is so a double trigger
    /// cannot start a second broadcast.
    pub fn open_for_send(&self, product_id: &str, total_users: u32) -> (Campaign, bool) {
        let mut map = self.inner.write();

        if let Some(existing) = map.get(product_id) {
            if !existing.status.is_terminal() {
                tracing::info!(
                    "[campaigns] Campaign {} for product {} already active ({:?})",
                    existing.id,
                    product_id,
                    existing.status
                );
                return (existing.clone(), false);
            }
        }

        let campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            status: CampaignStatus::Pending,
            sent_count: 0,
            total_users,
            created_at: Utc::now(),
        };
        map.insert(product_id.to_string(), campaign.clone());

        tracing::info!(
            "[campaigns] Opened campaign {} for product {} ({} recipients)",
            campaign.id,
            product_id,
            total_users
        );

        (campaign, true)
    }

    /// Flip the campaign to `sending`. Illegal transitions are logged and
    /// dropped rather than applied, keeping the state machine forward-only.
    pub fn mark_sending(&self, product_id: &str) {
        self.advance(product_id, CampaignStatus::Sending);
    }

    /// Flip the campaign to `completed` and pin `sent_count` to
    /// `total_users` (terminal consistency).
    pub fn mark_completed(&self, product_id: &str) {
        let mut map = self.inner.write();
        if let Some(campaign) = map.get_mut(product_id) {
            if !campaign.status.can_advance_to(CampaignStatus::Completed) {
                tracing::warn!(
                    "[campaigns] Ignoring illegal transition {:?} -> completed for product {}",
                    campaign.status,
                    product_id
                );
                return;
            }
            campaign.status = CampaignStatus::Completed;
            campaign.sent_count = campaign.total_users;
        }
    }

    /// Count one processed recipient. The counter is clamped to
    /// `total_users`, so it can never overshoot the snapshot taken at start.
    pub fn record_progress(&self, product_id: &str) -> Option<u32> {
        let mut map = self.inner.write();
        let campaign = map.get_mut(product_id)?;

        if campaign.sent_count >= campaign.total_users {
            tracing::warn!(
                "[campaigns] Progress past total_users for product {} ({}/{})",
                product_id,
                campaign.sent_count,
                campaign.total_users
            );
            return Some(campaign.sent_count);
        }

        campaign.sent_count += 1;
        Some(campaign.sent_count)
    }

    fn advance(&self, product_id: &str, next: CampaignStatus) {
        let mut map = self.inner.write();
        if let Some(campaign) = map.get_mut(product_id) {
            if campaign.status.can_advance_to(next) {
                campaign.status = next;
            } else {
                tracing::warn!(
                    "[campaigns] Ignoring illegal transition {:?} -> {:?} for product {}",
                    campaign.status,
                    next,
                    product_id
                );
            }
        }
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}
