/// Sink for failures a person has to act on (e.g. a credential that could
/// not be refreshed).
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Reports notifications as `error`-level tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::error!(title, message, "operator notification");
    }
}
