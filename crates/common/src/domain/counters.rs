use std::fmt;

/// Named liveness counters kept per application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LivenessCounter {
    /// A raw payload was received from the application
    PayloadReceived,
    /// A subscription wait elapsed with no message
    Timeout,
    /// A payload was dropped because it could not be unpacked or transformed
    RejectedPayload,
    /// An observation could not be pushed to the store
    PushFail,
    /// A raw payload could not be acquired from the application
    AcquireFail,
}

impl LivenessCounter {
    pub const ALL: [LivenessCounter; 5] = [
        Self::PayloadReceived,
        Self::Timeout,
        Self::RejectedPayload,
        Self::PushFail,
        Self::AcquireFail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayloadReceived => "payload_received",
            Self::Timeout => "timeout",
            Self::RejectedPayload => "rejected_payload",
            Self::PushFail => "push_fail",
            Self::AcquireFail => "acquire_fail",
        }
    }
}

impl fmt::Display for LivenessCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget sink for liveness counters.
///
/// Implementations must never block the caller.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CountersSink: Send + Sync {
    fn increment(&self, counter: LivenessCounter, application_name: &str, n: u64);
}
