//! User-facing notifications.

/// Surfaces the outcome of a run to the user.
///
/// Notifications are best effort: implementations swallow their own
/// failures and fall back to the console.
pub trait NotificationSink {
    fn notify_failure(&self, message: &str);
    fn notify_success(&self, message: &str);
}

/// Plain console output. Failures are prefixed with a terminal bell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Fallback text used when a richer notifier could not reach the user.
    pub fn fallback(reason: &str, message: &str) {
        println!("\x07Error: {reason}.\nMessage: {message}");
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify_failure(&self, message: &str) {
        println!("\x07{message}");
    }

    fn notify_success(&self, message: &str) {
        println!("{message}");
    }
}
