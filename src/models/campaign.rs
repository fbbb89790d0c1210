use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a broadcast campaign. Strictly forward-moving:
/// pending -> sending -> completed, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Pending,
    Sending,
    Completed,
}

impl CampaignStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed)
    }

    /// Whether moving to `next` respects the forward-only state machine.
    pub fn can_advance_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Sending)
                | (Pending, Completed)
                | (Sending, Sending)
                | (Sending, Completed)
                | (Completed, Completed)
        )
    }
}

/// One broadcast-email job targeting all registered users for one product.
///
/// At most one active campaign exists per product; the server keys campaigns
/// by `product_id` and only supersedes a record once it has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub product_id: String,
    pub status: CampaignStatus,
    /// Emails delivered so far. Non-decreasing, never above `total_users`.
    pub sent_count: u32,
    /// Recipient-set size snapshotted at campaign start; fixed afterwards.
    pub total_users: u32,
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /api/email-campaigns/test-template/{productId}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestTemplateRequest {
    pub email: String,
}

/// Success envelope used by every list/detail endpoint: `{ "data": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Plain-message response, e.g. from the test-template endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body shared by all endpoints: `{ "message": "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_forward_only() {
        use CampaignStatus::*;

        assert!(Pending.can_advance_to(Sending));
        assert!(Sending.can_advance_to(Completed));
        assert!(Pending.can_advance_to(Completed));

        assert!(!Completed.can_advance_to(Sending));
        assert!(!Completed.can_advance_to(Pending));
        assert!(!Sending.can_advance_to(Pending));
    }

    #[test]
    fn test_status_wire_format_is_lowercase() {
        let json = serde_json::to_string(&CampaignStatus::Sending).unwrap();
        assert_eq!(json, "\"sending\"");

        let parsed: CampaignStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, CampaignStatus::Completed);
    }

    #[test]
    fn test_campaign_serializes_camel_case() {
        let campaign = Campaign {
            id: "c1".to_string(),
            product_id: "p1".to_string(),
            status: CampaignStatus::Pending,
            sent_count: 0,
            total_users: 10,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&campaign).unwrap();
        assert!(value.get("productId").is_some());
        assert!(value.get("sentCount").is_some());
        assert!(value.get("totalUsers").is_some());
    }
}
