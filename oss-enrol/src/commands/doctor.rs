//! Diagnostics command.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use oss_enrol_core::directory::GroupQuery;
use oss_enrol_core::roles::RoleClassifier;
use oss_enrol_core::Database;

use super::Source;
use crate::config::Config;

pub fn execute(config: &Config, config_path: &Path, fixture: Option<&Path>) -> Result<()> {
    println!("{}", "oss-enrol Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    print!("  Settings: ");
    match config.sync.validate() {
        Ok(()) => println!("{}", "✓ valid".green()),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push(format!("Invalid configuration: {}", e));
        }
    }

    print!("  Engine: ");
    match config.sync.disabled_reason() {
        None => println!("{}", "✓ enabled".green()),
        Some(reason) => println!("{}", format!("○ {}", reason).yellow()),
    }

    // Check database
    print!("  Database: ");
    let db_path = &config.database.path;
    if !db_path.exists() {
        println!("{}", format!("○ {} will be created", db_path.display()).yellow());
    } else {
        match Database::open_path(db_path).and_then(|db| db.ping()) {
            Ok(()) => println!("{}", "✓ connected".green()),
            Err(e) => {
                println!("{}", format!("✗ {}", e).red());
                issues.push("Database not accessible".to_string());
            }
        }
    }

    // Check directory
    let source = if fixture.is_some() { "fixture" } else { config.sync.directory.url.as_str() };
    print!("  Directory ({}): ", source);
    match Source::connect(&config.sync.directory, fixture) {
        Ok(mut directory) => {
            println!("{}", "✓ reachable".green());
            let query = GroupQuery::new(&config.sync.directory);

            print!("  Groups: ");
            match query.list_names(&mut directory) {
                Ok(names) => println!("{}", format!("✓ {} found", names.len()).green()),
                Err(e) => {
                    println!("{}", format!("✗ {}", e).red());
                    issues.push("Group search failed".to_string());
                }
            }

            print!("  Teachers ({}): ", config.sync.teachers.group);
            match RoleClassifier::load(&mut directory, &config.sync) {
                Ok(roles) if roles.roster().is_empty() => {
                    println!("{}", "○ group empty or missing".yellow());
                }
                Ok(roles) => println!("{}", format!("✓ {} members", roles.roster().len()).green()),
                Err(e) => {
                    println!("{}", format!("✗ {}", e).red());
                    issues.push("Teacher group lookup failed".to_string());
                }
            }
        }
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Cannot reach directory".to_string());
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
