//! Master-calibration gating for one night.
//!
//! Each master (bias, dome flat, twilight flat) is built at most once per
//! night: either when enough raw frames have been seen, or when the night
//! ends without reaching the threshold.

use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::reduce::Reducer;

pub const BIAS_THRESHOLD: usize = 20;
pub const DOME_THRESHOLD: usize = 40;
pub const TWILIGHT_THRESHOLD: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationCounts {
    pub bias: usize,
    pub dome: usize,
    pub focus_or_twilight: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterKind {
    Bias,
    DomeFlat,
    TwilightFlat,
}

impl MasterKind {
    pub const ALL: [MasterKind; 3] = [MasterKind::Bias, MasterKind::DomeFlat, MasterKind::TwilightFlat];
}

impl fmt::Display for MasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bias => write!(f, "master bias"),
            Self::DomeFlat => write!(f, "master dome flat"),
            Self::TwilightFlat => write!(f, "master twilight flat"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationState {
    pub bias_done: bool,
    pub domes_done: bool,
    pub twilights_done: bool,
}

impl CalibrationState {
    pub fn is_done(&self, kind: MasterKind) -> bool {
        match kind {
            MasterKind::Bias => self.bias_done,
            MasterKind::DomeFlat => self.domes_done,
            MasterKind::TwilightFlat => self.twilights_done,
        }
    }

    fn mark(&mut self, kind: MasterKind) {
        match kind {
            MasterKind::Bias => self.bias_done = true,
            MasterKind::DomeFlat => self.domes_done = true,
            MasterKind::TwilightFlat => self.twilights_done = true,
        }
    }

    pub fn all_done(&self) -> bool {
        self.bias_done && self.domes_done && self.twilights_done
    }

    /// New state after observing `counts`, and the masters whose flag just
    /// went from false to true. Flags never go back to false.
    pub fn evaluate(self, counts: CalibrationCounts) -> (Self, Vec<MasterKind>) {
        let reached = |kind: MasterKind| match kind {
            MasterKind::Bias => counts.bias >= BIAS_THRESHOLD,
            MasterKind::DomeFlat => counts.dome >= DOME_THRESHOLD,
            MasterKind::TwilightFlat => counts.focus_or_twilight >= TWILIGHT_THRESHOLD,
        };
        self.transition(reached)
    }

    /// Mark every master done, returning those that were not yet.
    pub fn force_all(self) -> (Self, Vec<MasterKind>) {
        self.transition(|_| true)
    }

    fn transition(self, should_build: impl Fn(MasterKind) -> bool) -> (Self, Vec<MasterKind>) {
        let mut next = self;
        let mut triggered = Vec::new();
        for kind in MasterKind::ALL {
            if !next.is_done(kind) && should_build(kind) {
                next.mark(kind);
                triggered.push(kind);
            }
        }
        (next, triggered)
    }
}

/// Owns the night's [`CalibrationState`] and issues the master builds.
#[derive(Debug, Default)]
pub struct CalibrationTracker {
    state: CalibrationState,
}

impl CalibrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub async fn observe(
        &mut self,
        counts: CalibrationCounts,
        directory: &Path,
        reducer: &dyn Reducer,
    ) -> Vec<MasterKind> {
        let (next, triggered) = self.state.evaluate(counts);
        self.apply(next, triggered, directory, reducer).await
    }

    pub async fn force_all(&mut self, directory: &Path, reducer: &dyn Reducer) -> Vec<MasterKind> {
        let (next, triggered) = self.state.force_all();
        if !triggered.is_empty() {
            info!("Forcing {} missing master calibration(s)", triggered.len());
        }
        self.apply(next, triggered, directory, reducer).await
    }

    async fn apply(
        &mut self,
        next: CalibrationState,
        triggered: Vec<MasterKind>,
        directory: &Path,
        reducer: &dyn Reducer,
    ) -> Vec<MasterKind> {
        // The flag is committed before the build runs; a failed build is
        // not retried tonight.
        self.state = next;
        for kind in &triggered {
            info!("Building {} in {}", kind, directory.display());
            let result = match kind {
                MasterKind::Bias => reducer.create_master_bias(directory).await,
                MasterKind::DomeFlat => reducer.create_master_flat(directory, false).await,
                MasterKind::TwilightFlat => reducer.create_master_flat(directory, true).await,
            };
            if let Err(e) = result {
                warn!("Failed to build {}: {}", kind, e);
            }
        }
        triggered
    }
}
