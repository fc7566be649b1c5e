//! Human-readable run report.

use chrono::Local;
use colored::Colorize;
use oss_enrol_core::report::{Counters, Issue};
use oss_enrol_core::RunReport;

pub fn print(report: &RunReport) {
    println!(
        "{} {}",
        format!("oss-enrol {}", report.task).cyan().bold(),
        report.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
    );
    println!("{}", "─".repeat(50));

    if let Some(reason) = &report.skipped {
        println!("  {}", format!("○ skipped: {}", reason).yellow());
        return;
    }

    for line in summary_lines(&report.counters) {
        println!("  {}", line);
    }

    let warnings: Vec<&Issue> = report.warnings().collect();
    let errors: Vec<&Issue> = report.errors().collect();
    if !warnings.is_empty() {
        println!();
        println!("  {}", "Warnings:".yellow());
        for issue in &warnings {
            println!("    • {}: {}", issue.subject, issue.message);
        }
    }
    if !errors.is_empty() {
        println!();
        println!("  {}", "Errors:".red());
        for issue in &errors {
            println!("    • {}: {}", issue.subject, issue.message);
        }
    }

    println!();
    let elapsed = report
        .finished_at
        .map(|end| (end - report.started_at).num_milliseconds())
        .unwrap_or_default();
    if errors.is_empty() {
        println!(
            "{}",
            format!("✓ {} writes in {} ms", report.counters.writes(), elapsed).green().bold()
        );
    } else {
        println!("{}", format!("✗ {} error(s)", errors.len()).red().bold());
    }
}

/// One line per area that saw any change.
fn summary_lines(c: &Counters) -> Vec<String> {
    let mut lines = Vec::new();
    if c.groups_created + c.groups_renamed + c.groups_deleted + c.members_added + c.members_removed > 0 {
        lines.push(format!(
            "Groups: {} created, {} renamed, {} deleted; members +{} -{}",
            c.groups_created, c.groups_renamed, c.groups_deleted, c.members_added, c.members_removed
        ));
    }
    if c.units_created + c.units_archived + c.units_restored + c.units_adopted + c.roles_assigned > 0 {
        lines.push(format!(
            "Categories: {} created, {} archived, {} restored, {} adopted, {} roles restored",
            c.units_created, c.units_archived, c.units_restored, c.units_adopted, c.roles_assigned
        ));
    }
    if c.idnumbers_migrated + c.instances_created + c.instances_deleted > 0 {
        lines.push(format!(
            "Courses: {} idnumbers migrated, instances +{} -{}",
            c.idnumbers_migrated, c.instances_created, c.instances_deleted
        ));
    }
    if c.enrolments_added + c.enrolments_removed > 0 {
        lines.push(format!(
            "Enrolments: +{} -{}",
            c.enrolments_added, c.enrolments_removed
        ));
    }
    if lines.is_empty() {
        lines.push("No changes".to_string());
    }
    lines
}
