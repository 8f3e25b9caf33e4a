//! Output formatting utilities

use crate::error::CliResult;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use stashpass_core::Confirmation;
use std::time::Duration;
use tabled::{Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    pub fn is_table(self) -> bool {
        matches!(self, Self::Table)
    }
}

/// Print a vector of items in the specified format
pub fn print_output<T: Serialize + Tabled>(data: Vec<T>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&data)?),
    }
    Ok(())
}

/// Print a single item in the specified format
pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(data)?),
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message. Goes to stderr so JSON and YAML output stay parseable.
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message);
}

/// Key/value line used by receipts in table mode.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<16} {}", format!("{label}:").bold(), value);
}

/// Spinner shown while a submission is in flight; hidden for machine-readable output.
pub fn spinner(message: &str, format: OutputFormat) -> ProgressBar {
    if !format.is_table() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Report a confirmation state; returns true when still pending.
pub fn report_confirmation(what: &str, confirmation: Confirmation, format: OutputFormat) -> bool {
    match confirmation.check(what) {
        Ok(attempts) => {
            if format.is_table() {
                print_field("confirmed", format!("after {attempts} read(s)"));
            }
            false
        }
        Err(timeout) => {
            let message = format!("{timeout}; the transaction was submitted, re-check later");
            if format.is_table() {
                print_warning(&message);
            } else {
                eprintln!("{} {}", "⚠".yellow(), message);
            }
            true
        }
    }
}
