//! Notification sink port
//!
//! Receives human-readable progress strings ("Uploaded (3/10)", "Finished
//! pulling"). Delivery is fire-and-forget and never affects correctness.

/// Consumer of progress and status messages
pub trait INotificationSink: Send + Sync {
    /// Deliver a message
    fn notify(&self, message: &str);
}

/// Sink that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotificationSink;

impl INotificationSink for NullNotificationSink {
    fn notify(&self, _message: &str) {}
}
