//! # Command-line interface
//!
//! Argument parsing for the `zone-demo` binary, adapted from the
//! teacher's `clap` derive setup: the same styled-help convention and
//! `-v`/`-vv`/`-vvv` verbosity counting, trimmed down to the knobs a
//! zone-to-zone call demo actually needs.

use clap::builder::styling::{AnsiColor, Styles};
use clap::Parser;

/// Defines the styles for the help message to replicate clap v3's appearance.
fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// zone-demo — wires a parent/child zone pair over the in-process
/// reference transport and runs the calculator scenario (§8, S1).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Where to send detailed logs: a file path, or "stderr".
    ///
    /// Defaults to a daily-rotating file in the current directory.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Silence the user-facing summary on stdout.
    ///
    /// Diagnostic logs on stderr/file are unaffected.
    #[arg(short = 'q', long, help_heading = "Output and Logging")]
    pub quiet: bool,

    /// Increase diagnostic log verbosity.
    ///
    ///  -v: debug
    ///  -vv and above: trace
    /// By default, only INFO and above is shown.
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Output and Logging")]
    pub verbose: u8,
}
