//! Stream Session States
//!
//! Phases of the connection lifecycle and the reasons a session can end.

use std::fmt;

/// Why a stream session stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The cancellation token fired.
    Cancelled,
    /// The connection failed and automatic reconnection is turned off.
    ReconnectDisabled,
    /// Consecutive reconnect failures reached the configured bound.
    RetryBudgetExhausted,
}

impl CloseReason {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::ReconnectDisabled => "reconnect_disabled",
            Self::RetryBudgetExhausted => "retry_budget_exhausted",
        }
    }

    /// True if the session ended because it was asked to.
    #[must_use]
    pub const fn is_clean(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a stream session.
///
/// ```text
/// Connecting ──ok──► Subscribing ──ok──► Streaming ◄─┐ frame (delivered or discarded)
///     │                  │                   │ └─────┘
///     └──fail──┐  ┌─fail─┘          read fail│
///              ▼  ▼                          │
///           BackingOff ◄─────────────────────┘
///              │ wait elapsed
///              └──────────► Connecting
///
/// BackingOff ──disabled / exhausted / cancelled──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// Opening the transport.
    Connecting,
    /// Sending the subscribe request.
    Subscribing,
    /// Reading frames and delivering updates.
    Streaming,
    /// Waiting before the next reconnect attempt.
    BackingOff,
    /// Terminal.
    Closed(CloseReason),
}

impl ConnectionPhase {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::BackingOff => "backing_off",
            Self::Closed(_) => "closed",
        }
    }

    /// Numeric code used for the phase gauge.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Subscribing => 1,
            Self::Streaming => 2,
            Self::BackingOff => 3,
            Self::Closed(_) => 4,
        }
    }

    /// True for [`ConnectionPhase::Closed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(reason) => write!(f, "closed ({reason})"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_is_terminal() {
        assert!(ConnectionPhase::Closed(CloseReason::Cancelled).is_terminal());
        assert!(!ConnectionPhase::Connecting.is_terminal());
        assert!(!ConnectionPhase::Subscribing.is_terminal());
        assert!(!ConnectionPhase::Streaming.is_terminal());
        assert!(!ConnectionPhase::BackingOff.is_terminal());
    }

    #[test]
    fn phase_display() {
        assert_eq!(ConnectionPhase::BackingOff.to_string(), "backing_off");
        assert_eq!(
            ConnectionPhase::Closed(CloseReason::RetryBudgetExhausted).to_string(),
            "closed (retry_budget_exhausted)"
        );
    }

    #[test]
    fn close_reason_clean() {
        assert!(CloseReason::Cancelled.is_clean());
        assert!(!CloseReason::ReconnectDisabled.is_clean());
        assert!(!CloseReason::RetryBudgetExhausted.is_clean());
    }
}
