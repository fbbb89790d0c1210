use std::collections::BTreeSet;

use uuid::Uuid;

use crate::models::import::{SpreadsheetRow, ValidatedRow};
use crate::models::product::Product;
use crate::models::user::User;

/// Columns a product sheet must fill in for every row.
pub const PRODUCT_REQUIRED_COLUMNS: &[&str] = &[
    "Title",
    "Brand",
    "Season",
    "Color",
    "Category",
    "UPI_ID",
    "Price",
    "Final Price",
];

/// Columns a user sheet must fill in for every row.
pub const USER_REQUIRED_COLUMNS: &[&str] = &["Name", "Email"];

/// Parse CSV bytes into ordered rows keyed by the header line.
///
/// Row numbers are 1-based spreadsheet rows: the header is row 1, the first
/// data row is 2. Errors in import reports use the same numbering so the
/// operator can find the row in their sheet.
pub fn parse_csv(
    bytes: &[u8],
) -> Result<Vec<SpreadsheetRow>, Box<dyn std::error::Error + Send + Sync>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                (
                    header.clone(),
                    record.get(i).unwrap_or_default().to_string(),
                )
            })
            .collect();
        rows.push(SpreadsheetRow {
            row_number: index + 2,
            cells,
        });
    }

    Ok(rows)
}

/// Client-side pre-validation: flag required columns that are missing or
/// blank, plus the price sanity check (a "Final Price" above "Price" flags
/// "Final Price" even though both cells are filled in).
///
/// This only short-circuits obviously-invalid submissions; the server runs
/// its own authoritative pass and the two may disagree.
pub fn prevalidate_rows(rows: &[SpreadsheetRow], required: &[&str]) -> Vec<ValidatedRow> {
    rows.iter()
        .map(|row| ValidatedRow {
            row: row.clone(),
            errors: row_errors(row, required),
        })
        .collect()
}

fn row_errors(row: &SpreadsheetRow, required: &[&str]) -> BTreeSet<String> {
    let mut errors = BTreeSet::new();

    for &column in required {
        match row.get(column) {
            Some(value) if !value.trim().is_empty() => {}
            _ => {
                errors.insert(column.to_string());
            }
        }
    }

    let price = row.get("Price").and_then(parse_price);
    let final_price = row.get("Final Price").and_then(parse_price);

    if row.get("Price").is_some_and(|v| !v.trim().is_empty()) && price.is_none() {
        errors.insert("Price".to_string());
    }
    if row.get("Final Price").is_some_and(|v| !v.trim().is_empty()) && final_price.is_none() {
        errors.insert("Final Price".to_string());
    }

    if let (Some(price), Some(final_price)) = (price, final_price) {
        if final_price > price {
            errors.insert("Final Price".to_string());
        }
    }

    errors
}

fn parse_price(value: &str) -> Option<f64> {
    let parsed: f64 = value.trim().parse().ok()?;
    (parsed >= 0.0).then_some(parsed)
}

/// Authoritative server-side conversion of one product row. The message is
/// what lands in the `{row, message}` rejection list.
pub fn product_from_row(row: &SpreadsheetRow) -> Result<Product, String> {
    let field = |column: &str| -> Result<String, String> {
        match row.get(column) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(format!("Missing required field '{}'", column)),
        }
    };

    let price: f64 = field("Price")?
        .parse()
        .map_err(|_| "Price must be a number".to_string())?;
    let final_price: f64 = field("Final Price")?
        .parse()
        .map_err(|_| "Final Price must be a number".to_string())?;

    if price < 0.0 || final_price < 0.0 {
        return Err("Prices cannot be negative".to_string());
    }
    if final_price > price {
        return Err("Final Price cannot exceed Price".to_string());
    }

    Ok(Product {
        id: Uuid::new_v4().to_string(),
        title: field("Title")?,
        brand: field("Brand")?,
        season: field("Season")?,
        color: field("Color")?,
        category: field("Category")?,
        upi_id: field("UPI_ID")?,
        price,
        final_price,
    })
}

/// Authoritative server-side conversion of one user row.
pub fn user_from_row(row: &SpreadsheetRow) -> Result<User, String> {
    let field = |column: &str| -> Result<String, String> {
        match row.get(column) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(format!("Missing required field '{}'", column)),
        }
    };

    let email = field("Email")?;
    if !email.contains('@') {
        return Err(format!("Invalid email address '{}'", email));
    }

    Ok(User {
        id: Uuid::new_v4().to_string(),
        name: field("Name")?,
        email,
    })
}
