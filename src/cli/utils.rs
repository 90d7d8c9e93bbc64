use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::Context;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::database::models::Company;
use crate::database::DatabaseManager;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a collection: a JSON array under `collection_name`, or an aligned text table
pub fn output_table(
    output_format: OutputFormat,
    collection_name: &str,
    items: Vec<Value>,
    headers: &[&str],
    rows: Vec<Vec<String>>,
    empty_message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: items }))?);
        }
        OutputFormat::Text if rows.is_empty() => println!("{}", empty_message),
        OutputFormat::Text => {
            let widths: Vec<usize> = headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    rows.iter()
                        .map(|r| r.get(i).map_or(0, |c| c.chars().count()))
                        .chain(std::iter::once(h.len()))
                        .max()
                        .unwrap_or(0)
                })
                .collect();

            let line = |cells: Vec<&str>| {
                cells
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| format!("{:<w$}", c, w = *w))
                    .collect::<Vec<_>>()
                    .join("  ")
            };

            println!("{}", line(headers.to_vec()));
            println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
            for row in &rows {
                println!("{}", line(row.iter().map(String::as_str).collect()));
            }
        }
    }
    Ok(())
}

/// Take a secret from the flag, else read one line from stdin
pub fn read_secret(flag: Option<String>, prompt: &str) -> anyhow::Result<String> {
    if let Some(value) = flag.filter(|v| !v.is_empty()) {
        return Ok(value);
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("{}: ", prompt);
        io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line).context("reading from stdin")?;

    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", prompt);
    }
    Ok(value)
}

/// Resolve a company by slug or id
pub async fn find_company(db: &DatabaseManager, key: &str) -> anyhow::Result<Company> {
    let found = match Uuid::parse_str(key) {
        Ok(id) => Company::find_by_id(db.pool(), id).await?,
        Err(_) => Company::find_by_slug(db.pool(), key).await?,
    };
    found.ok_or_else(|| anyhow::anyhow!("Company '{}' not found", key))
}

pub fn format_time(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
