//! # Console formatter
//!
//! Demo-binary-only formatting: a level-tagged, colorized single line
//! per event, with none of the span/target noise `tracing_subscriber`'s
//! default formatter prints. The detailed file log configured alongside
//! it in `main.rs` uses the stock formatter instead — this one exists
//! purely for a human watching stdout.

use colored::*;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Short prefix tag for a level, printed ahead of the colored line.
fn level_tag(level: Level) -> &'static str {
    match level {
        Level::ERROR => "err",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "dbg",
        Level::TRACE => "trace",
    }
}

/// Colors an entire event line by its level and prefixes it with a
/// short tag, dropping timestamps and target paths.
pub struct ZoneEventFormatter;

impl<S, N> FormatEvent<S, N> for ZoneEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let mut buffer = String::new();
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let level = *event.metadata().level();
        let line = format!("[{}] {buffer}", level_tag(level));
        let colored = match level {
            Level::INFO => line.white(),
            Level::WARN => line.yellow(),
            Level::ERROR => line.red(),
            Level::DEBUG => line.blue(),
            Level::TRACE => line.purple(),
        };

        writeln!(writer, "{colored}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_tag_covers_every_level() {
        assert_eq!(level_tag(Level::ERROR), "err");
        assert_eq!(level_tag(Level::WARN), "warn");
        assert_eq!(level_tag(Level::INFO), "info");
        assert_eq!(level_tag(Level::DEBUG), "dbg");
        assert_eq!(level_tag(Level::TRACE), "trace");
    }
}
