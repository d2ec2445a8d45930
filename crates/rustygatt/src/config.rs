//! Server configuration

/// What a StopNotify request does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopNotifyPolicy {
    /// Remove the caller's subscription. Stopping a characteristic that has
    /// no subscription is a no-op.
    #[default]
    Unsubscribe,
    /// Refuse every StopNotify with `NotSupported`, leaving subscriptions in
    /// place. Matches servers that never implemented unsubscription.
    Reject,
}

/// GATT application configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Events buffered per subscriber before further events are dropped for
    /// that subscriber
    pub notification_queue_depth: usize,
    /// Behavior of StopNotify
    pub stop_notify: StopNotifyPolicy,
    /// Check capability flags on requests arriving through the transport
    /// binding
    pub enforce_capabilities: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            notification_queue_depth: 16,
            stop_notify: StopNotifyPolicy::default(),
            enforce_capabilities: true,
        }
    }
}
