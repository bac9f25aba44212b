use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target used for one line per finished batch.
const RESULT_TARGET: &str = "sweep_result";

pub fn setup_logger(log_dir: &str) -> Option<WorkerGuard> {
    std::fs::create_dir_all(log_dir).ok();

    // Daily rotation; batch results are small and infrequent
    let file_appender = tracing_appender::rolling::daily(log_dir, "sweep");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File layer: DEBUG for the engine, INFO for results, WARN for others
    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(RESULT_TARGET, tracing::Level::INFO)
        .with_target("sweep_core", tracing::Level::DEBUG)
        .with_default(tracing::Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    // Console layer: INFO for results and the CLI, ERROR for others
    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(RESULT_TARGET, tracing::Level::INFO)
        .with_target("dust_sweeper", tracing::Level::INFO)
        .with_default(tracing::Level::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    // Caller must keep the guard alive or buffered lines are lost
    Some(guard)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn highlight(msg: String) -> String {
    if msg.contains("SETTLED") {
        let green_text = Style::new().fg(Color::LightGreen).bold();
        msg.replace("SETTLED", &format!("{}", green_text.paint("SETTLED")))
    } else if msg.contains("REVERTED") {
        let red_text = Style::new().fg(Color::LightRed).bold();
        msg.replace("REVERTED", &format!("{}", red_text.paint("REVERTED")))
    } else {
        msg
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);

        write!(writer, "{}", highlight(msg_visitor.message))?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let metadata = event.metadata();

        write!(writer, "{} [{}] {}: ", timestamp, metadata.level(), metadata.target())?;

        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        writeln!(writer, "{}", msg_visitor.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_marks_outcomes() {
        let settled = highlight("SETTLED 0xabc: 3 entries".to_string());
        assert!(settled.contains("\u{1b}["));
        assert!(settled.contains("SETTLED"));

        let reverted = highlight("REVERTED 0xabc: slippage".to_string());
        assert!(reverted.contains("\u{1b}["));

        let plain = highlight("Entry 0: pulled 5".to_string());
        assert_eq!(plain, "Entry 0: pulled 5");
    }
}
