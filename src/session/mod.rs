//! The nightly on-the-fly reduction session.
//!
//! A session walks one observing night through
//! [`SessionState`]: wait for the what-list, wait for the first
//! acquisition while building calibrations, reduce frames as they arrive
//! until sunrise, then finalize.

pub mod config;
pub mod driver;
pub mod focus;
pub mod state;

pub use config::SessionOptions;
pub use driver::SessionDriver;
pub use state::{EndReason, SessionState, SessionSummary};

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::fits::{FitsFileReader, HeaderSource};
use crate::marshal::{MarshalClient, StatusUpdater};
use crate::notify::{Notifier, SlackNotifier};
use crate::photometry::{CommandPhotometer, Photometer};
use crate::reduce::{CommandReducer, Reducer};
use crate::remote::{RemoteCopier, ScpCopier};
use crate::subprocess::SubprocessManager;
use crate::visualize::{CommandPlotter, Plotter};

/// Everything the session talks to outside its own state.
#[derive(Clone)]
pub struct Collaborators {
    pub reducer: Arc<dyn Reducer>,
    pub headers: Arc<dyn HeaderSource>,
    pub plotter: Arc<dyn Plotter>,
    pub photometer: Arc<dyn Photometer>,
    pub copier: Arc<dyn RemoteCopier>,
    /// Absent when no chat channel is configured.
    pub notifier: Option<Arc<dyn Notifier>>,
    pub status: Arc<dyn StatusUpdater>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Command-line tools, HTTP clients, and the wall clock.
    pub fn production(config: &Config) -> Result<Self> {
        let subprocess = SubprocessManager::production();
        let notifier = SlackNotifier::from_config(&config.slack)?
            .map(|n| Arc::new(n) as Arc<dyn Notifier>);

        Ok(Self {
            reducer: Arc::new(CommandReducer::new(
                subprocess.clone(),
                config.commands.clone(),
            )),
            headers: Arc::new(FitsFileReader),
            plotter: Arc::new(CommandPlotter::new(
                subprocess.clone(),
                config.commands.clone(),
            )),
            photometer: Arc::new(CommandPhotometer::new(
                subprocess.clone(),
                config.commands.clone(),
            )),
            copier: Arc::new(ScpCopier::new(subprocess, config.remote.clone())),
            notifier,
            status: Arc::new(MarshalClient::new(&config.marshal)?),
            clock: Arc::new(SystemClock),
        })
    }
}
