//! Domain types for boxwatch.
//!
//! `HostStatus` is what consumers read; `ProcessState` is the per-target
//! state machine driven by the scheduler. Both are serializable so the
//! daemon can emit JSON reports.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Host status ────────────────────────────────────────────────────

/// Last resolved reachability outcome for a target.
///
/// The discriminants are stable: they are stored in a single atomic byte
/// by the status store and surface in reports.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    /// No probe has completed yet.
    Unknown = 0,
    /// The probe got a reply (exit code 0).
    Okay = 1,
    /// The probe got no reply (exit code 1).
    NoReply = 2,
    /// The hostname could not be resolved (exit code 2).
    Invalid = 3,
    /// The probe had to be signalled by the watchdog.
    Timeout = 4,
    /// The probe exited with an unexpected code or died by a signal.
    Error = 5,
}

impl HostStatus {
    /// Classify a probe's exit. `None` means the process was killed by a
    /// signal and has no exit code.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => HostStatus::Okay,
            Some(1) => HostStatus::NoReply,
            Some(2) => HostStatus::Invalid,
            _ => HostStatus::Error,
        }
    }

    /// Decode a stored discriminant. Out-of-range bytes decode as `Error`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HostStatus::Unknown,
            1 => HostStatus::Okay,
            2 => HostStatus::NoReply,
            3 => HostStatus::Invalid,
            4 => HostStatus::Timeout,
            _ => HostStatus::Error,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HostStatus::Unknown => "unknown",
            HostStatus::Okay => "okay",
            HostStatus::NoReply => "no_reply",
            HostStatus::Invalid => "invalid",
            HostStatus::Timeout => "timeout",
            HostStatus::Error => "error",
        }
    }

    /// Whether the host answered its last probe.
    pub fn is_reachable(self) -> bool {
        self == HostStatus::Okay
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Process state ──────────────────────────────────────────────────

/// Per-target probe lifecycle, advanced once per scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Counting down to the next cycle.
    Pending,
    /// Waiting for a concurrency slot.
    Ready,
    /// Admitted; the probe is launched on the next tick.
    Resourced,
    /// Probe running under the watchdog countdown.
    Active,
    /// SIGTERM sent, waiting out the grace period.
    Terminating,
    /// Grace period expired; SIGKILL and reap.
    Kill,
    /// Cycle finished; re-armed on the next tick.
    Complete,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Pending => "pending",
            ProcessState::Ready => "ready",
            ProcessState::Resourced => "resourced",
            ProcessState::Active => "active",
            ProcessState::Terminating => "terminating",
            ProcessState::Kill => "kill",
            ProcessState::Complete => "complete",
        }
    }

    /// States that own a live probe process.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ProcessState::Active | ProcessState::Terminating | ProcessState::Kill
        )
    }

    /// States that consume a concurrency slot, including the admitted
    /// `Resourced` state whose launch happens on the next tick.
    pub fn holds_slot(self) -> bool {
        self == ProcessState::Resourced || self.is_in_flight()
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Diagnostics ────────────────────────────────────────────────────

/// Point-in-time view of one target, in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub hostname: String,
    pub state: ProcessState,
    pub status: HostStatus,
    /// Ticks left in the current state.
    pub countdown: u32,
    /// Pid of the outstanding probe, if any.
    pub pid: Option<u32>,
    /// Completed probe cycles since registration.
    pub cycles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_map_to_status() {
        assert_eq!(HostStatus::from_exit_code(Some(0)), HostStatus::Okay);
        assert_eq!(HostStatus::from_exit_code(Some(1)), HostStatus::NoReply);
        assert_eq!(HostStatus::from_exit_code(Some(2)), HostStatus::Invalid);
    }

    #[test]
    fn exit_code_discriminants_are_code_plus_one() {
        for code in 0..=2 {
            assert_eq!(
                HostStatus::from_exit_code(Some(code)).as_u8(),
                code as u8 + 1
            );
        }
    }

    #[test]
    fn unexpected_exits_are_bounded() {
        assert_eq!(HostStatus::from_exit_code(Some(3)), HostStatus::Error);
        assert_eq!(HostStatus::from_exit_code(Some(255)), HostStatus::Error);
        assert_eq!(HostStatus::from_exit_code(Some(-1)), HostStatus::Error);
        // Killed by a signal.
        assert_eq!(HostStatus::from_exit_code(None), HostStatus::Error);
    }

    #[test]
    fn stored_bytes_decode() {
        for status in [
            HostStatus::Unknown,
            HostStatus::Okay,
            HostStatus::NoReply,
            HostStatus::Invalid,
            HostStatus::Timeout,
            HostStatus::Error,
        ] {
            assert_eq!(HostStatus::from_u8(status.as_u8()), status);
        }
        assert_eq!(HostStatus::from_u8(200), HostStatus::Error);
    }

    #[test]
    fn in_flight_states() {
        assert!(ProcessState::Active.is_in_flight());
        assert!(ProcessState::Terminating.is_in_flight());
        assert!(ProcessState::Kill.is_in_flight());
        assert!(!ProcessState::Resourced.is_in_flight());
        assert!(ProcessState::Resourced.holds_slot());
        assert!(!ProcessState::Ready.holds_slot());
        assert!(!ProcessState::Complete.holds_slot());
    }

    #[test]
    fn snapshot_serializes_snake_case() {
        let snap = TargetSnapshot {
            hostname: "localhost".to_string(),
            state: ProcessState::Active,
            status: HostStatus::NoReply,
            countdown: 12,
            pid: Some(4242),
            cycles: 3,
        };
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"state\":\"active\""));
        assert!(json.contains("\"status\":\"no_reply\""));
    }
}
