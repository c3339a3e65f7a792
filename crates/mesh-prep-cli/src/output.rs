//! Shared output helpers honoring the global format and quiet flags.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result. JSON mode always prints (scripting output
/// is the point of that mode); text mode respects --quiet.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{}: failed to serialize output: {e}", "Error".red().bold()),
        },
        OutputFormat::Text => {
            if !quiet {
                match serde_json::to_string_pretty(value) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("{}: failed to serialize output: {e}", "Error".red().bold())
                    }
                }
            }
        }
    }
}

/// Print a success line in text mode.
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if let OutputFormat::Text = format {
        if !quiet {
            println!("{} {message}", "✓".green().bold());
        }
    }
}
