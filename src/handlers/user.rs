use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::{
    handlers::{read_upload, ImportRejection},
    models::campaign::DataEnvelope,
    models::import::{ImportReport, RowError},
    models::user::User,
    services::import::{parse_csv, user_from_row},
    AppState,
};

/// Handler for POST /api/users/import (multipart CSV)
///
/// Same all-or-nothing contract as the product import.
pub async fn import_users(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DataEnvelope<ImportReport>>, ImportRejection> {
    let bytes = read_upload(multipart).await?;
    let rows = parse_csv(&bytes)
        .map_err(|e| ImportRejection::Upload(format!("Could not parse spreadsheet: {}", e)))?;

    let mut errors: Vec<RowError> = Vec::new();
    let mut accepted: Vec<(usize, User)> = Vec::new();

    for row in &rows {
        match user_from_row(row) {
            Ok(user) => accepted.push((row.row_number, user)),
            Err(message) => errors.push(RowError {
                row: row.row_number,
                message,
            }),
        }
    }

    let existing = state.users.list();
    for (i, (row, user)) in accepted.iter().enumerate() {
        let dup_in_batch = accepted[..i]
            .iter()
            .any(|(_, u)| u.email.eq_ignore_ascii_case(&user.email));
        let dup_in_directory = existing
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email));
        if dup_in_batch || dup_in_directory {
            errors.push(RowError {
                row: *row,
                message: format!("Duplicate email '{}'", user.email),
            });
        }
    }

    if !errors.is_empty() {
        tracing::info!("User import rejected: {} bad row(s)", errors.len());
        return Err(ImportRejection::Rows(errors));
    }

    let imported = accepted.len();
    for (_, user) in accepted {
        if let Err(e) = state.users.insert(user) {
            tracing::warn!("User skipped during insert: {}", e);
        }
    }

    tracing::info!("Imported {} users", imported);

    Ok(Json(DataEnvelope {
        data: ImportReport {
            imported: Some(imported),
            errors: None,
        },
    }))
}
