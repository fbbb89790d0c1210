use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::campaign::ErrorResponse;
use crate::models::import::{ImportReport, RowError};

pub mod campaign;
pub mod product;
pub mod user;

/// Why an import was turned away. Malformed uploads use the shared
/// `{ message }` error contract; row-level rejections report
/// `{ data: { errors: [{row, message}] } }` so the operator can fix their
/// sheet.
pub enum ImportRejection {
    Upload(String),
    Rows(Vec<RowError>),
}

impl IntoResponse for ImportRejection {
    fn into_response(self) -> Response {
        match self {
            ImportRejection::Upload(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { message }),
            )
                .into_response(),
            ImportRejection::Rows(mut errors) => {
                errors.sort_by_key(|e| e.row);
                (
                    StatusCode::BAD_REQUEST,
                    Json(crate::models::campaign::DataEnvelope {
                        data: ImportReport {
                            imported: None,
                            errors: Some(errors),
                        },
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Pull the uploaded file's bytes out of a multipart body.
pub async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ImportRejection> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ImportRejection::Upload(format!("Malformed upload: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ImportRejection::Upload(format!("Malformed upload: {}", e)))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ImportRejection::Upload("No file uploaded".to_string()))
}
