use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::{
    handlers::{read_upload, ImportRejection},
    models::campaign::DataEnvelope,
    models::import::{ImportReport, RowError},
    models::product::Product,
    services::import::{parse_csv, product_from_row},
    AppState,
};

/// Handler for GET /api/products
pub async fn list_products(State(state): State<AppState>) -> Json<DataEnvelope<Vec<Product>>> {
    Json(DataEnvelope {
        data: state.products.list(),
    })
}

/// Handler for POST /api/products/import (multipart CSV)
///
/// All-or-nothing: any rejected row fails the whole upload with the
/// per-row error report and nothing is inserted.
pub async fn import_products(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DataEnvelope<ImportReport>>, ImportRejection> {
    let bytes = read_upload(multipart).await?;
    let rows = parse_csv(&bytes)
        .map_err(|e| ImportRejection::Upload(format!("Could not parse spreadsheet: {}", e)))?;

    let mut errors: Vec<RowError> = Vec::new();
    let mut accepted: Vec<(usize, Product)> = Vec::new();

    for row in &rows {
        match product_from_row(row) {
            Ok(product) => accepted.push((row.row_number, product)),
            Err(message) => errors.push(RowError {
                row: row.row_number,
                message,
            }),
        }
    }

    // Uniqueness within the batch and against the catalog
    let existing = state.products.list();
    for (i, (row, product)) in accepted.iter().enumerate() {
        let dup_in_batch = accepted[..i].iter().any(|(_, p)| p.upi_id == product.upi_id);
        let dup_in_catalog = existing.iter().any(|p| p.upi_id == product.upi_id);
        if dup_in_batch || dup_in_catalog {
            errors.push(RowError {
                row: *row,
                message: format!("Duplicate UPI_ID '{}'", product.upi_id),
            });
        }
    }

    if !errors.is_empty() {
        tracing::info!("Product import rejected: {} bad row(s)", errors.len());
        return Err(ImportRejection::Rows(errors));
    }

    let imported = accepted.len();
    for (_, product) in accepted {
        if let Err(e) = state.products.insert(product) {
            // Pre-checked above; only reachable if a concurrent import races us
            tracing::warn!("Product skipped during insert: {}", e);
        }
    }

    tracing::info!("Imported {} products", imported);

    Ok(Json(DataEnvelope {
        data: ImportReport {
            imported: Some(imported),
            errors: None,
        },
    }))
}
