//! calcboard-report - statistics reports from the command line
//!
//! Reads the same database as the server and prints a user's summary,
//! one operation's statistics, or a page of history.

use std::path::PathBuf;

use anyhow::{Context, Result};
use calcboard_core::analytics::{
    operation_summary, paginated_history, user_summary, HistoryPage, OperationSummary,
    UserSummary,
};
use calcboard_core::{Config, Database};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "calcboard-report")]
#[command(about = "Calculation statistics for a calcboard user")]
#[command(version)]
struct Args {
    /// Username to report on
    #[arg(long)]
    user: String,

    /// Report on a single operation (addition, subtraction, multiplication, division).
    /// With --history, filters the page to that operation.
    #[arg(long)]
    operation: Option<String>,

    /// Show this page of history instead of the summary
    #[arg(long)]
    history: Option<i64>,

    /// Records per history page
    #[arg(long, default_value = "10", requires = "history")]
    page_size: i64,

    /// Export format (md = markdown, json = JSON)
    #[arg(long)]
    export: Option<String>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,
}

enum Report {
    Summary(UserSummary),
    Operation(String, OperationSummary),
    History(HistoryPage, Option<String>),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = calcboard_core::logging::init(&config.logging).ok();

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let user = db
        .get_user_by_username(&args.user)
        .context("failed to look up user")?
        .with_context(|| format!("Unknown user: {}", args.user))?;

    tracing::info!(user_id = %user.id, "Generating report");

    let operation = args.operation.as_deref().map(|tag| tag.trim().to_ascii_lowercase());

    let report = if let Some(page) = args.history {
        let history =
            paginated_history(&db, &user.id, page, args.page_size, operation.as_deref())
                .context("failed to load history")?;
        Report::History(history, operation)
    } else if let Some(tag) = operation {
        let summary =
            operation_summary(&db, &user.id, &tag).context("failed to compute statistics")?;
        Report::Operation(tag, summary)
    } else {
        Report::Summary(user_summary(&db, &user.id).context("failed to compute statistics")?)
    };

    match args.export.as_deref() {
        Some("json") => print_json(&report)?,
        Some("md") => print_markdown(&user.username, &report),
        Some(other) => anyhow::bail!("Unknown export format: {}. Use 'md' or 'json'", other),
        None => print_terminal(&user.username, &report),
    }

    Ok(())
}

/// Whole numbers without a trailing `.0`.
fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(number).unwrap_or_else(|| "-".to_string())
}

fn inputs(values: &[f64]) -> String {
    values.iter().map(|v| number(*v)).collect::<Vec<_>>().join(", ")
}

fn print_terminal(username: &str, report: &Report) {
    let title = match report {
        Report::Summary(_) => format!("Calculations for {}", username),
        Report::Operation(tag, _) => format!("{} statistics for {}", tag, username),
        Report::History(page, None) => format!("History for {} (page {})", username, page.page),
        Report::History(page, Some(tag)) => {
            format!("{} history for {} (page {})", tag, username, page.page)
        }
    };

    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", title);
    println!("╰{}╯", "─".repeat(60));
    println!();

    match report {
        Report::Summary(summary) => {
            if summary.total_calculations == 0 {
                println!("  No calculations yet.");
                println!();
                return;
            }

            println!("SUMMARY");
            println!("   Total:          {}", summary.total_calculations);
            println!(
                "   Most used:      {}",
                summary
                    .most_used_operation
                    .map(|op| op.as_str())
                    .unwrap_or("-")
            );
            println!("   Avg inputs:     {}", optional(summary.average_inputs_count));
            println!("   Avg result:     {}", optional(summary.average_result));
            println!();

            println!("OPERATIONS");
            for (tag, count) in &summary.operations_breakdown {
                println!("   {:<16} {:>6}", tag, count);
            }
            println!();

            if !summary.calculations_by_day.is_empty() {
                println!("LAST 30 DAYS");
                let max = summary.calculations_by_day.values().copied().max().unwrap_or(1);
                for (day, count) in &summary.calculations_by_day {
                    let width = ((*count as f64 / max as f64) * 30.0).ceil() as usize;
                    println!("   {}  {:>4}  {}", day, count, "█".repeat(width));
                }
                println!();
            }

            println!("RECENT");
            for calc in &summary.recent_calculations {
                println!(
                    "   {}  {:<15} [{}] = {}",
                    calc.created_at.format("%Y-%m-%d %H:%M"),
                    calc.operation.as_str(),
                    inputs(&calc.inputs),
                    number(calc.result)
                );
            }
            println!();
        }
        Report::Operation(_, summary) => {
            if summary.count == 0 {
                println!("  No calculations of this type.");
                println!();
                return;
            }
            println!("   Count:       {}", summary.count);
            println!("   Avg inputs:  {}", optional(summary.average_inputs_count));
            println!("   Avg result:  {}", optional(summary.average_result));
            println!("   Min result:  {}", optional(summary.min_result));
            println!("   Max result:  {}", optional(summary.max_result));
            println!();
        }
        Report::History(page, _) => {
            for calc in &page.calculations {
                println!(
                    "   {}  {:<15} [{}] = {}",
                    calc.created_at.format("%Y-%m-%d %H:%M"),
                    calc.operation.as_str(),
                    inputs(&calc.inputs),
                    number(calc.result)
                );
            }
            if page.calculations.is_empty() {
                println!("  Nothing on this page.");
            }
            println!();
            println!(
                "   Page {} of {} ({} total)",
                page.page, page.total_pages, page.total
            );
            println!();
        }
    }
}

fn print_markdown(username: &str, report: &Report) {
    match report {
        Report::Summary(summary) => {
            println!("# Calculations for {}", username);
            println!();

            if summary.total_calculations == 0 {
                println!("*No calculations yet.*");
                return;
            }

            println!("## Summary");
            println!();
            println!("| Metric | Value |");
            println!("|--------|-------|");
            println!("| Total | {} |", summary.total_calculations);
            println!(
                "| Most Used | {} |",
                summary
                    .most_used_operation
                    .map(|op| op.as_str())
                    .unwrap_or("-")
            );
            println!("| Average Inputs | {} |", optional(summary.average_inputs_count));
            println!("| Average Result | {} |", optional(summary.average_result));
            println!();

            println!("## Operations");
            println!();
            println!("| Operation | Count |");
            println!("|-----------|-------|");
            for (tag, count) in &summary.operations_breakdown {
                println!("| {} | {} |", tag, count);
            }
            println!();

            println!("## Recent");
            println!();
            println!("| Created | Operation | Inputs | Result |");
            println!("|---------|-----------|--------|--------|");
            for calc in &summary.recent_calculations {
                println!(
                    "| {} | {} | {} | {} |",
                    calc.created_at.format("%Y-%m-%d %H:%M"),
                    calc.operation.as_str(),
                    inputs(&calc.inputs),
                    number(calc.result)
                );
            }
        }
        Report::Operation(tag, summary) => {
            println!("# {} statistics for {}", tag, username);
            println!();
            println!("| Metric | Value |");
            println!("|--------|-------|");
            println!("| Count | {} |", summary.count);
            println!("| Average Inputs | {} |", optional(summary.average_inputs_count));
            println!("| Average Result | {} |", optional(summary.average_result));
            println!("| Min Result | {} |", optional(summary.min_result));
            println!("| Max Result | {} |", optional(summary.max_result));
        }
        Report::History(page, operation) => {
            match operation {
                Some(tag) => println!("# {} history for {}", tag, username),
                None => println!("# History for {}", username),
            }
            println!();
            println!(
                "Page {} of {} ({} total)",
                page.page, page.total_pages, page.total
            );
            println!();
            println!("| Created | Operation | Inputs | Result |");
            println!("|---------|-----------|--------|--------|");
            for calc in &page.calculations {
                println!(
                    "| {} | {} | {} | {} |",
                    calc.created_at.format("%Y-%m-%d %H:%M"),
                    calc.operation.as_str(),
                    inputs(&calc.inputs),
                    number(calc.result)
                );
            }
        }
    }
}

fn print_json(report: &Report) -> Result<()> {
    let json = match report {
        Report::Summary(summary) => serde_json::to_string_pretty(summary)?,
        Report::Operation(tag, summary) => {
            let mut value = serde_json::to_value(summary)?;
            value["operation"] = serde_json::Value::String(tag.clone());
            serde_json::to_string_pretty(&value)?
        }
        Report::History(page, _) => serde_json::to_string_pretty(page)?,
    };
    println!("{}", json);
    Ok(())
}
