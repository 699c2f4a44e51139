//! Result rendering
//!
//! Plain-text table used both by the CLI and as the results block inside
//! the synthesis prompt.

use super::execute::QueryResult;
use serde_json::Value;

pub const NO_RESULTS: &str = "No results found.";

/// Render rows as a pipe-delimited table with a header line. `null` cells
/// print as `NULL`; an empty result set renders as [`NO_RESULTS`].
pub fn format_query_results(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut lines = Vec::with_capacity(result.rows.len() + 4);
    lines.push("Query Results:".to_string());
    lines.push("-".repeat(50));

    let header = result.columns.join(" | ");
    let underline = "-".repeat(header.len());
    lines.push(header);
    lines.push(underline);

    for row in &result.rows {
        let cells: Vec<String> = result
            .columns
            .iter()
            .map(|column| render_cell(row.get(column)))
            .collect();
        lines.push(cells.join(" | "));
    }

    lines.join("\n")
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
