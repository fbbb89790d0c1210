// src/bin/import_users.rs

use std::env;
use std::fs;

use campaign_backend::services::campaign_api::{ApiError, CampaignApiClient};
use campaign_backend::services::import::{parse_csv, prevalidate_rows, USER_REQUIRED_COLUMNS};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Usage: cargo run --bin import_users -- users.csv
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <users.csv>", args[0]);
        std::process::exit(1);
    }

    let file_path = &args[1];
    let api_base_url =
        env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());

    println!("Parsing {}...", file_path);
    let bytes = fs::read(file_path)?;
    let rows = parse_csv(&bytes)?;
    println!("Found {} rows", rows.len());

    let validated = prevalidate_rows(&rows, USER_REQUIRED_COLUMNS);
    let invalid: Vec<_> = validated.iter().filter(|v| !v.is_valid()).collect();

    if !invalid.is_empty() {
        eprintln!("{} row(s) failed pre-validation:", invalid.len());
        for v in &invalid {
            let fields: Vec<&str> = v.errors.iter().map(|s| s.as_str()).collect();
            eprintln!("   Row {}: {}", v.row.row_number, fields.join(", "));
        }
        std::process::exit(1);
    }

    println!("Uploading to {}...", api_base_url);
    let client = CampaignApiClient::new(api_base_url);

    match client.import_users("users.csv", bytes).await {
        Ok(report) => {
            println!(
                "Import complete! Imported: {}",
                report.imported.unwrap_or(rows.len())
            );
        }
        Err(ApiError::Rejected(errors)) => {
            eprintln!("Server rejected {} row(s):", errors.len());
            for error in errors {
                eprintln!("   Row {}: {}", error.row, error.message);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
