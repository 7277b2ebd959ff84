//! Testing utilities and fixtures
//!
//! Mocks for every collaborator of the session loop, a controllable clock,
//! and a writer for minimal FITS files.

pub mod fixtures;
pub mod mocks;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::session::Collaborators;
use mocks::{
    FlakyHeaders, ManualClock, MockCopier, MockNotifier, MockPhotometer, MockPlotter,
    MockReducer, MockStatusUpdater,
};

/// All mocks wired together, with handles kept for assertions.
#[derive(Clone)]
pub struct TestContext {
    pub reducer: MockReducer,
    pub headers: FlakyHeaders,
    pub plotter: MockPlotter,
    pub photometer: MockPhotometer,
    pub copier: MockCopier,
    pub notifier: MockNotifier,
    pub status: MockStatusUpdater,
    pub clock: ManualClock,
}

impl TestContext {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            reducer: MockReducer::new(),
            headers: FlakyHeaders::new(),
            plotter: MockPlotter::new(),
            photometer: MockPhotometer::new(),
            copier: MockCopier::new(),
            notifier: MockNotifier::new(),
            status: MockStatusUpdater::new(),
            clock,
        }
    }

    /// Collaborators reading real FITS files from disk.
    pub fn collaborators(&self) -> Collaborators {
        self.build(Arc::new(crate::fits::FitsFileReader))
    }

    /// Collaborators whose headers come from [`FlakyHeaders`].
    pub fn collaborators_with_mock_headers(&self) -> Collaborators {
        self.build(Arc::new(self.headers.clone()))
    }

    /// Same as [`Self::collaborators`] but with no notification channel.
    pub fn collaborators_without_notifier(&self) -> Collaborators {
        Collaborators {
            notifier: None,
            ..self.collaborators()
        }
    }

    fn build(&self, headers: Arc<dyn crate::fits::HeaderSource>) -> Collaborators {
        Collaborators {
            reducer: Arc::new(self.reducer.clone()),
            headers,
            plotter: Arc::new(self.plotter.clone()),
            photometer: Arc::new(self.photometer.clone()),
            copier: Arc::new(self.copier.clone()),
            notifier: Some(Arc::new(self.notifier.clone())),
            status: Arc::new(self.status.clone()),
            clock: Arc::new(self.clock.clone()),
        }
    }
}

/// Write a manifest listing `names`, one per line, with `kind` as the
/// second column.
pub fn write_manifest(dir: &Path, lines: &[(&str, &str)]) -> std::io::Result<PathBuf> {
    let content: String = lines
        .iter()
        .map(|(name, kind)| format!("{name} {kind}\n"))
        .collect();
    let path = crate::manifest::Manifest::path_in(dir);
    std::fs::write(&path, content)?;
    Ok(path)
}
