//! Mocks for the post-reduction collaborators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::marshal::StatusUpdater;
use crate::notify::{Notification, Notifier};
use crate::photometry::{Photometer, PhotometryResult};
use crate::remote::RemoteCopier;
use crate::visualize::{PlotRequest, Plotter};

/// Writes an empty file at each requested output.
#[derive(Clone, Default)]
pub struct MockPlotter {
    requests: Arc<Mutex<Vec<PlotRequest>>>,
}

impl MockPlotter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PlotRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Plotter for MockPlotter {
    async fn render(&self, request: &PlotRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        std::fs::write(&request.output, b"")?;
        Ok(())
    }
}

#[derive(Default)]
struct PhotometerState {
    calls: Vec<(PathBuf, Option<f64>)>,
    zeropoints: HashMap<PathBuf, Option<f64>>,
}

/// Returns a fixed magnitude and, per path, a configured zero-point.
#[derive(Clone, Default)]
pub struct MockPhotometer {
    state: Arc<Mutex<PhotometerState>>,
}

impl MockPhotometer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &Path, zeropoint: Option<f64>) {
        self.state
            .lock()
            .unwrap()
            .zeropoints
            .insert(path.to_path_buf(), zeropoint);
    }

    pub fn calls(&self) -> Vec<(PathBuf, Option<f64>)> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Photometer for MockPhotometer {
    async fn quick_photometry(
        &self,
        path: &Path,
        zeropoint: Option<f64>,
    ) -> Result<PhotometryResult> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((path.to_path_buf(), zeropoint));
        Ok(PhotometryResult {
            mag: Some(17.5),
            mag_err: Some(0.05),
            zeropoint: state.zeropoints.get(path).copied().flatten(),
        })
    }
}

#[derive(Default)]
struct CopierState {
    prepared: Vec<String>,
    copies: Vec<PathBuf>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct MockCopier {
    state: Arc<Mutex<CopierState>>,
}

impl MockCopier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_copies(&self) {
        self.state.lock().unwrap().fail = true;
    }

    pub fn prepared(&self) -> Vec<String> {
        self.state.lock().unwrap().prepared.clone()
    }

    /// Attempted copies, failed ones included.
    pub fn copies(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().copies.clone()
    }
}

#[async_trait]
impl RemoteCopier for MockCopier {
    async fn prepare(&self, night: &str) -> Result<()> {
        self.state.lock().unwrap().prepared.push(night.to_string());
        Ok(())
    }

    async fn copy(&self, path: &Path, _night: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.copies.push(path.to_path_buf());
        if state.fail {
            return Err(Error::Remote("mock copy failure".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct NotifierState {
    pushed: Vec<Notification>,
    malformed: bool,
}

#[derive(Clone, Default)]
pub struct MockNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every push fails as if the service answered with a non-JSON body.
    pub fn respond_malformed(&self) {
        self.state.lock().unwrap().malformed = true;
    }

    /// Attempted pushes, failed ones included.
    pub fn pushed(&self) -> Vec<Notification> {
        self.state.lock().unwrap().pushed.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn push_image(&self, notification: &Notification) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pushed.push(notification.clone());
        if state.malformed {
            return Err(Error::Decode("expected value at line 1 column 1".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct StatusState {
    updates: Vec<(String, String)>,
    unreachable: bool,
}

#[derive(Clone, Default)]
pub struct MockStatusUpdater {
    state: Arc<Mutex<StatusState>>,
}

impl MockStatusUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(&self) {
        self.state.lock().unwrap().unreachable = true;
    }

    /// `(request_id, status)` pairs, failed ones included.
    pub fn updates(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().updates.clone()
    }
}

#[async_trait]
impl StatusUpdater for MockStatusUpdater {
    async fn update_status(&self, request_id: &str, status: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .updates
            .push((request_id.to_string(), status.to_string()));
        if state.unreachable {
            return Err(Error::Http("503 Service Unavailable".into()));
        }
        Ok(())
    }
}
