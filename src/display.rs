use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use crate::batch::{SolveReport, SolveStatus, TreeReport, TreeStatus};

fn right(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn extract_summary(reports: &[TreeReport]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Tree"),
        Cell::new("Status"),
        Cell::new("Nodes").set_alignment(CellAlignment::Right),
        Cell::new("Records").set_alignment(CellAlignment::Right),
        Cell::new("Filtered").set_alignment(CellAlignment::Right),
        Cell::new("Skipped").set_alignment(CellAlignment::Right),
        Cell::new("Time").set_alignment(CellAlignment::Right),
    ]);

    for report in reports {
        let elapsed = format!("{:.1}s", report.elapsed.as_secs_f64());
        let row = match &report.status {
            TreeStatus::Extracted(stats) => vec![
                Cell::new(file_name(&report.tree).bold().to_string()),
                Cell::new("done".green().to_string()),
                right(stats.nodes_visited),
                right(stats.records_emitted),
                right(stats.actions_filtered),
                right(stats.failed_nodes + stats.skipped_children + stats.skipped_queries),
                right(elapsed),
            ],
            TreeStatus::Skipped => vec![
                Cell::new(file_name(&report.tree)),
                Cell::new("exists".dimmed().to_string()),
                right("-"),
                right("-"),
                right("-"),
                right("-"),
                right(elapsed),
            ],
            TreeStatus::Failed(reason) => vec![
                Cell::new(file_name(&report.tree).bold().to_string()),
                Cell::new(format!("failed: {}", reason).red().to_string()),
                right("-"),
                right("-"),
                right("-"),
                right("-"),
                right(elapsed),
            ],
        };
        table.add_row(row);
    }
    table.to_string()
}

pub fn solve_summary(reports: &[SolveReport]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Flop"),
        Cell::new("Result"),
        Cell::new("Dump"),
        Cell::new("Time").set_alignment(CellAlignment::Right),
    ]);

    for report in reports {
        let result = match &report.status {
            SolveStatus::Solved { reason } => reason.green().to_string(),
            SolveStatus::Skipped => "exists".dimmed().to_string(),
            SolveStatus::Failed(reason) => format!("failed: {}", reason).red().to_string(),
        };
        table.add_row(vec![
            Cell::new(report.flop.bold().to_string()),
            Cell::new(result),
            Cell::new(file_name(&report.dump)),
            right(format!("{:.1}s", report.elapsed.as_secs_f64())),
        ]);
    }
    table.to_string()
}

pub fn print_section(title: &str, content: &str) {
    println!("\n{}", title.cyan().bold());
    println!("  {}", content);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn print_success(msg: &str) {
    println!("{}", msg.green().bold());
}
