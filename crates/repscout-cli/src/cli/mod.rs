//! Subcommand implementations for the `repscout` binary.

pub mod lookup_cmd;
pub mod run_cmd;

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
