//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use figdiff_common::{DifferenceRegion, Error, Recommendation};

use crate::tools::failure;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format, the same objects the tool server returns
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for DifferenceRegion {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Cause", "Severity", "Pixels", "Bounds"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.cause.to_string(),
            self.severity.to_string(),
            self.pixel_count.to_string(),
            format!(
                "({}, {}) {}x{}",
                self.bounds.x, self.bounds.y, self.bounds.width, self.bounds.height
            ),
        ]
    }
}

impl TableDisplay for Recommendation {
    fn headers() -> Vec<&'static str> {
        vec!["Priority", "Category", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.priority.to_string(),
            self.category.to_string(),
            self.description.clone(),
        ]
    }
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print name/value pairs
pub fn print_fields(fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(vec!["Field", "Value"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                .collect();
            print_json(&map);
        }
        OutputFormat::Plain => {
            for (name, value) in fields {
                println!("{}: {}", name, value);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        if format == OutputFormat::Json {
            println!("[]");
        } else {
            println!("None.");
        }
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json => print_json(items),
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print a failed operation with its remediation steps
pub fn print_failure(err: &Error, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_json(&failure(err));
        return;
    }
    print_error(&format!("{} [{}]", err, err.error_type()));
    for (i, step) in err.solutions().iter().enumerate() {
        eprintln!("   {}. {}", i + 1, step);
    }
}

/// Print section heading
pub fn print_heading(title: &str) {
    println!();
    println!("{}", title.bold());
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{}  {}", "⚠️".yellow(), message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
