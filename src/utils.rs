use colored::Colorize;

use crate::ledger::{Candidate, NodeInfo};

/// Format an account or hash truncated for display
pub fn format_short(value: &str) -> String {
    if value.len() <= 14 {
        value.to_string()
    } else {
        format!("{}...{}", &value[..8], &value[value.len() - 6..])
    }
}

/// Format a candidate as `owner / asset` with a truncated owner
pub fn format_candidate(candidate: &Candidate) -> String {
    format!(
        "{} / asset {}",
        format_short(&candidate.owner.to_string()),
        candidate.asset_id
    )
}

pub fn print_node_info(info: &NodeInfo) {
    println!(
        "You are connected to chain {} using {} v{}\n",
        info.chain.cyan(),
        info.node_name,
        info.node_version
    );
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}
