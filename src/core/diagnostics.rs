//! Process-wide diagnostic sink
//!
//! Every non-fatal problem the runtime notices (failed service calls,
//! truncated requests, rejected writes, observer errors) ends up here as one
//! line of text. Applications swap the sink with
//! [`set_notification_handler`]; the default forwards to `log::warn!`.

use crate::core::sync::recover_poison;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;

/// Signature of a diagnostic sink.
pub type NotificationHandler = fn(&str);

static HANDLER: RwLock<Option<NotificationHandler>> = RwLock::new(None);

/// The sink used when none has been installed.
pub fn default_notification_handler(text: &str) {
    log::warn!("{}", text);
}

/// Install `handler` (or restore the default with `None`) and return the
/// previously installed sink.
pub fn set_notification_handler(
    handler: Option<NotificationHandler>,
) -> Option<NotificationHandler> {
    let mut slot = recover_poison(HANDLER.write(), "notification handler");
    std::mem::replace(&mut *slot, handler)
}

/// The sink currently in effect.
pub fn notification_handler() -> NotificationHandler {
    recover_poison(HANDLER.read(), "notification handler").unwrap_or(default_notification_handler)
}

/// Send one line of text to the sink.
///
/// A panicking sink is contained here and logged; it never unwinds into the
/// caller.
pub fn notify(text: &str) {
    let handler = notification_handler();
    if catch_unwind(AssertUnwindSafe(|| handler(text))).is_err() {
        log::error!("notification handler panicked while reporting: {}", text);
    }
}

/// Report a formatted diagnostic tagged with the calling module and line.
#[macro_export]
macro_rules! report_error {
    ($($arg:tt)*) => {
        $crate::core::diagnostics::notify(&format!(
            "{}:{} {}",
            module_path!(),
            line!(),
            format_args!($($arg)*)
        ))
    };
}

const EXCEPTION_FIRST_LINE: &str = "CA.Client.Exception";
const EXCEPTION_MARKER_FILL: char = '.';

/// Lines held for one report before it is flushed without a terminator.
pub const MAX_EXCEPTION_LINES: usize = 64;

/// Folds the multi-line exception reports printed by the service library
/// into a single notification.
///
/// A report opens with a `CA.Client.Exception....` banner and closes with a
/// line made only of dots. Lines received outside a report are forwarded as
/// they arrive. A report still open after [`MAX_EXCEPTION_LINES`] lines is
/// flushed as it stands.
#[derive(Debug, Default)]
pub struct ExceptionAccumulator {
    pending: Option<String>,
    pending_lines: usize,
}

impl ExceptionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns the text to notify, if any is complete.
    pub fn push_line(&mut self, raw: &str) -> Option<String> {
        let line = raw.trim_end_matches(['\r', '\n']);

        if is_exception_banner(line) {
            self.pending = Some(format!("{}\n", EXCEPTION_FIRST_LINE));
            self.pending_lines = 0;
            return None;
        }

        match self.pending.as_mut() {
            Some(text) if is_exception_terminator(line) => {
                let complete = std::mem::take(text);
                self.pending = None;
                Some(complete)
            }
            Some(text) => {
                text.push_str(line);
                text.push('\n');
                self.pending_lines += 1;
                if self.pending_lines < MAX_EXCEPTION_LINES {
                    return None;
                }
                log::debug!("Exception report unterminated after {} lines", self.pending_lines);
                self.pending_lines = 0;
                self.pending.take()
            }
            None if line.is_empty() => None,
            None => Some(line.to_string()),
        }
    }

    /// Feed one line and notify the sink when a report completes.
    pub fn accept(&mut self, raw: &str) {
        if let Some(text) = self.push_line(raw) {
            notify(&text);
        }
    }

    pub fn in_progress(&self) -> bool {
        self.pending.is_some()
    }
}

fn is_exception_banner(line: &str) -> bool {
    line.strip_prefix(EXCEPTION_FIRST_LINE)
        .is_some_and(|rest| rest.chars().all(|c| c == EXCEPTION_MARKER_FILL))
}

fn is_exception_terminator(line: &str) -> bool {
    line.len() >= 6 && line.chars().all(|c| c == EXCEPTION_MARKER_FILL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{captured, install_capture};
    use serial_test::serial;

    #[test]
    fn test_exception_block_is_folded() {
        let mut acc = ExceptionAccumulator::new();
        assert_eq!(
            acc.push_line("CA.Client.Exception...............................................\n"),
            None
        );
        assert!(acc.in_progress());
        assert_eq!(acc.push_line("    Warning: \"Virtual circuit disconnect\"\n"), None);
        assert_eq!(acc.push_line("    Context: \"ioc:5064\"\n"), None);
        let text = acc
            .push_line("..................................................................\n")
            .unwrap();
        assert_eq!(
            text,
            "CA.Client.Exception\n    Warning: \"Virtual circuit disconnect\"\n    Context: \"ioc:5064\"\n"
        );
        assert!(!acc.in_progress());
    }

    #[test]
    fn test_unterminated_block_is_flushed_at_limit() {
        let mut acc = ExceptionAccumulator::new();
        acc.push_line("CA.Client.Exception..........");
        for i in 1..MAX_EXCEPTION_LINES {
            assert_eq!(acc.push_line(&format!("line {}", i)), None);
        }
        let text = acc.push_line("last line").unwrap();
        assert!(text.starts_with("CA.Client.Exception\nline 1\n"));
        assert!(text.ends_with("last line\n"));
        assert_eq!(text.lines().count(), MAX_EXCEPTION_LINES + 1);
        assert!(!acc.in_progress());

        assert_eq!(acc.push_line("after"), Some("after".to_string()));
    }

    #[test]
    fn test_lines_outside_block_pass_through() {
        let mut acc = ExceptionAccumulator::new();
        assert_eq!(
            acc.push_line("plain message\r\n"),
            Some("plain message".to_string())
        );
        assert_eq!(acc.push_line("\n"), None);
    }

    #[test]
    #[serial]
    fn test_handler_replacement_and_restore() {
        install_capture();
        report_error!("channel {} failed", "X:Y");
        let lines: Vec<String> = captured()
            .into_iter()
            .filter(|line| line.contains("X:Y"))
            .collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("pvlink::core::diagnostics:"));
        assert!(lines[0].ends_with("channel X:Y failed"));

        set_notification_handler(None);
        assert!(recover_poison(HANDLER.read(), "test").is_none());
    }

    #[test]
    #[serial]
    fn test_panicking_handler_is_contained() {
        fn exploding(_: &str) {
            panic!("sink failure");
        }
        let previous = set_notification_handler(Some(exploding));
        notify("still fine");
        set_notification_handler(previous);
    }
}
