use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::focus::relay_focus_plots;
use super::{Collaborators, EndReason, SessionOptions, SessionState, SessionSummary};
use crate::calibration::CalibrationTracker;
use crate::classify::{dispatch, Action};
use crate::compress::{gzip_fits_files, record_backup, CompressionReport};
use crate::config::Config;
use crate::error::Result;
use crate::fanout::FanOut;
use crate::frame::read_frame;
use crate::manifest::{link_whatlist, Manifest};
use crate::night::ObservingNight;
use crate::visualize::visualize_raw_logged;
use crate::watcher::ArrivalWatcher;

/// Empty polls after which the idle message is logged at info level.
const QUIET_POLLS: u32 = 10;

/// Runs one observing night from what-list to sunrise.
pub struct SessionDriver {
    config: Arc<Config>,
    options: SessionOptions,
    tools: Collaborators,
    night: ObservingNight,
    state: SessionState,
    calibration: CalibrationTracker,
    watcher: ArrivalWatcher,
    visualized: HashSet<String>,
    fanout: FanOut,
    end_reason: EndReason,
    transitions: Vec<SessionState>,
    frames_processed: usize,
    frames_skipped: usize,
    products: usize,
    compression: Option<CompressionReport>,
}

impl SessionDriver {
    pub fn new(
        config: Arc<Config>,
        options: SessionOptions,
        tools: Collaborators,
        night: ObservingNight,
    ) -> Self {
        let fanout = FanOut::new(
            tools.clone(),
            options,
            night.tag(),
            config.slack.channel.clone(),
        );
        Self {
            watcher: ArrivalWatcher::new(night.directory()),
            config,
            options,
            tools,
            night,
            state: SessionState::AwaitingWhatlist,
            calibration: CalibrationTracker::new(),
            visualized: HashSet::new(),
            fanout,
            end_reason: EndReason::Sunrise,
            transitions: vec![SessionState::AwaitingWhatlist],
            frames_processed: 0,
            frames_skipped: 0,
            products: 0,
            compression: None,
        }
    }

    /// Start tonight's session: resolve the directory and sunrise from the
    /// collaborators' clock.
    pub fn start(
        config: Arc<Config>,
        options: SessionOptions,
        tools: Collaborators,
        directory: Option<PathBuf>,
    ) -> Result<Self> {
        let night = ObservingNight::start(&config, directory, tools.clock.now())?;
        Ok(Self::new(config, options, tools, night))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn night(&self) -> &ObservingNight {
        &self.night
    }

    pub async fn run(mut self) -> SessionSummary {
        info!(
            "Run until sun rise at {} for {}",
            self.night.sunrise(),
            self.night.directory().display()
        );

        while !self.state.is_terminal() {
            let next = match self.state {
                SessionState::AwaitingWhatlist => self.await_whatlist().await,
                SessionState::AwaitingAcquisition => self.await_acquisition().await,
                SessionState::ActiveReduction => self.reduce_active().await,
                SessionState::Finalizing => self.finalize().await,
                SessionState::Done => SessionState::Done,
            };
            self.transition(next);
        }

        info!(
            "Night {} done ({:?}): {} frames processed, {} skipped, {} products",
            self.night.tag(),
            self.end_reason,
            self.frames_processed,
            self.frames_skipped,
            self.products
        );
        SessionSummary {
            night: self.night.tag().to_string(),
            end_reason: self.end_reason,
            transitions: self.transitions,
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            products: self.products,
            calibrations: self.calibration.state(),
            compression: self.compression,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(self.state.can_transition_to(next));
        info!("Session {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    fn night_over(&self) -> bool {
        self.night.is_over(self.tools.clock.now())
    }

    async fn await_whatlist(&mut self) -> SessionState {
        let dir = self.night.directory().to_path_buf();
        loop {
            if Manifest::exists_in(&dir) {
                match link_whatlist(&dir) {
                    Ok(true) => info!("Linked rcwhat.txt"),
                    Ok(false) => {}
                    Err(e) => warn!("Could not link rcwhat.txt: {}", e),
                }
                return SessionState::AwaitingAcquisition;
            }
            if self.night_over() {
                warn!("Waited for sun rise and no rcwhat file appeared!");
                self.end_reason = EndReason::NoWhatlist;
                return SessionState::Done;
            }
            let interval = self.config.polling.whatlist_interval;
            info!("No rcwhat.list file yet, waiting {:?}...", interval);
            self.tools.clock.sleep(interval).await;
        }
    }

    async fn await_acquisition(&mut self) -> SessionState {
        let dir = self.night.directory().to_path_buf();
        let mut n_wait = 0u32;
        loop {
            let manifest = match Manifest::load(&dir).await {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!("Cannot read what-list: {}", e);
                    Manifest::default()
                }
            };

            self.calibration
                .observe(manifest.calibration_counts(), &dir, self.tools.reducer.as_ref())
                .await;

            if manifest.has_acquisition() {
                info!("Re-checking cals before proceeding");
                self.calibration
                    .force_all(&dir, self.tools.reducer.as_ref())
                    .await;
                info!("We have acquired now, so let's reduce some data!");
                return SessionState::ActiveReduction;
            }

            self.visualize_manifest(&manifest).await;

            if self.night_over() {
                warn!("Waited until sun rise and no ACQ appeared!");
                self.end_reason = EndReason::NoAcquisition;
                return SessionState::Finalizing;
            }

            if n_wait >= QUIET_POLLS {
                info!("No acquisition yet (bright or weather), still waiting");
                n_wait = 0;
            } else {
                n_wait += 1;
            }
            self.tools
                .clock
                .sleep(self.config.polling.acquisition_interval)
                .await;
        }
    }

    /// Raw previews for what-list entries not yet drawn this session.
    async fn visualize_manifest(&mut self, manifest: &Manifest) {
        let dir = self.night.directory().to_path_buf();
        for entry in manifest.entries() {
            let Some(name) = entry.file_name() else {
                continue;
            };
            if !self.visualized.insert(name.to_string()) {
                continue;
            }
            let path = dir.join(name);
            let Some(frame) = read_frame(
                &path,
                self.tools.headers.as_ref(),
                self.tools.clock.as_ref(),
                self.config.polling.header_retry_delay,
            )
            .await
            else {
                continue;
            };
            if dispatch(frame.category, self.options.dispatch_options()) == Action::Skip {
                continue;
            }
            let ut_id = entry.ut_id();
            visualize_raw_logged(&frame, ut_id.as_deref(), self.tools.plotter.as_ref()).await;
        }
    }

    async fn reduce_active(&mut self) -> SessionState {
        let dir = self.night.directory().to_path_buf();
        info!("Starting the on-the-fly reduction for directory {}", dir.display());

        if self.options.copy_enabled() {
            if let Err(e) = self.tools.copier.prepare(self.night.tag()).await {
                warn!("Could not create remote directory for {}: {}", self.night.tag(), e);
            }
        }

        loop {
            if self.night_over() {
                info!("End of night because sun is up!");
                self.end_reason = EndReason::Sunrise;
                return SessionState::Finalizing;
            }

            let new_files = match self.watcher.poll() {
                Ok(files) => files,
                Err(e) => {
                    warn!("Polling {} failed: {}", dir.display(), e);
                    Vec::new()
                }
            };

            if new_files.is_empty() {
                if self.options.one_pass {
                    info!("One pass requested, exiting loop");
                    self.end_reason = EndReason::OnePass;
                    return SessionState::Finalizing;
                }
                let waits = self.watcher.empty_polls();
                if waits > QUIET_POLLS {
                    info!("No new image after {} waits", waits);
                } else {
                    debug!("No new image ({} waits)", waits);
                }
            } else {
                info!("Detected {} new incoming files", new_files.len());
                for path in &new_files {
                    self.process_arrival(path).await;
                }
            }

            self.relay_focus_plots().await;

            if new_files.is_empty() {
                self.tools
                    .clock
                    .sleep(self.config.polling.active_interval)
                    .await;
            }
        }
    }

    async fn process_arrival(&mut self, path: &std::path::Path) {
        let Some(frame) = read_frame(
            path,
            self.tools.headers.as_ref(),
            self.tools.clock.as_ref(),
            self.config.polling.header_retry_delay,
        )
        .await
        else {
            self.frames_skipped += 1;
            return;
        };
        info!(frame = %frame.file_name(), category = %frame.category, "Processing frame");
        self.visualized.insert(frame.file_name());
        let report = self.fanout.process_frame(&frame).await;
        if report.action == Action::Skip {
            self.frames_skipped += 1;
        } else {
            self.frames_processed += 1;
        }
        self.products += report.products.len();
    }

    async fn relay_focus_plots(&self) {
        let notifier = self.tools.notifier.as_deref();
        if let Err(e) = relay_focus_plots(
            self.night.directory(),
            notifier,
            &self.config.slack.channel,
            self.options.local,
        )
        .await
        {
            warn!("Focus plot relay failed: {}", e);
        }
    }

    async fn finalize(&mut self) -> SessionState {
        let dir = self.night.directory().to_path_buf();
        self.calibration
            .force_all(&dir, self.tools.reducer.as_ref())
            .await;

        match gzip_fits_files(&dir) {
            Ok(report) => self.compression = Some(report),
            Err(e) => warn!("Compression of {} failed: {}", dir.display(), e),
        }
        if let Err(e) = record_backup(&self.config.backup.phot_backup_file, self.night.tag()) {
            warn!(
                "Cannot open backup file for update: {}: {}",
                self.config.backup.phot_backup_file.display(),
                e
            );
        }
        SessionState::Done
    }
}
