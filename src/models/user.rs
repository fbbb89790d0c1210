use serde::{Deserialize, Serialize};

/// Registered shopper; the recipient set for broadcast campaigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}
