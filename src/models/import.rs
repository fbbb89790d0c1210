use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One parsed spreadsheet row: header -> cell value, in sheet order.
///
/// `row_number` is the 1-based spreadsheet row (the header is row 1, so the
/// first data row is 2), matching what the operator sees in their sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadsheetRow {
    pub row_number: usize,
    pub cells: Vec<(String, String)>,
}

impl SpreadsheetRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// A row paired with the pre-validation errors computed for it. The error set
/// holds column names, so the table renderer can highlight offending cells.
#[derive(Debug, Clone)]
pub struct ValidatedRow {
    pub row: SpreadsheetRow,
    pub errors: BTreeSet<String>,
}

impl ValidatedRow {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Server-side rejection for one row, reported back to the operator verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Import outcome envelope body. A rejected upload carries `errors` as
/// `{ "data": { "errors": [{row, message}] } }`; an accepted one reports how
/// many records were created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<RowError>>,
}
