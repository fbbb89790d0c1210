use serde::{Deserialize, Serialize};

/// Catalog entry as served by GET /api/products and created by CSV import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub brand: String,
    pub season: String,
    pub color: String,
    pub category: String,
    /// Vendor payment handle, unique across the catalog.
    pub upi_id: String,
    pub price: f64,
    /// Discounted price shown to shoppers; never above `price`.
    pub final_price: f64,
}
