//! Session state machine implementation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calibration::CalibrationState;
use crate::compress::CompressionReport;

/// Phases of one observing night. A session only ever moves forward
/// through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Waiting for the night's what-list to appear
    AwaitingWhatlist,
    /// What-list present, no acquisition yet
    AwaitingAcquisition,
    /// Reducing frames as they arrive
    ActiveReduction,
    /// Forcing calibrations and compressing
    Finalizing,
    /// Session finished
    Done,
}

impl SessionState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done)
    }

    fn rank(&self) -> u8 {
        match self {
            SessionState::AwaitingWhatlist => 0,
            SessionState::AwaitingAcquisition => 1,
            SessionState::ActiveReduction => 2,
            SessionState::Finalizing => 3,
            SessionState::Done => 4,
        }
    }

    /// Whether moving to `next` keeps the session moving forward.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingWhatlist => "awaiting-whatlist",
            SessionState::AwaitingAcquisition => "awaiting-acquisition",
            SessionState::ActiveReduction => "active-reduction",
            SessionState::Finalizing => "finalizing",
            SessionState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why the night ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Sunrise during active reduction
    Sunrise,
    /// Single-pass run found nothing new
    OnePass,
    /// Sunrise before the what-list appeared
    NoWhatlist,
    /// Sunrise before any acquisition
    NoAcquisition,
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub night: String,
    pub end_reason: EndReason,
    pub transitions: Vec<SessionState>,
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub products: usize,
    pub calibrations: CalibrationState,
    pub compression: Option<CompressionReport>,
}
