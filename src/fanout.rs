//! Per-frame processing: dispatch, reduction, and everything that
//! happens to the reduced products afterwards.
//!
//! Nothing in here returns an error to the session loop. Each step logs
//! its own failure and the frame simply contributes less.

use chrono::Local;
use tracing::{debug, info, warn};

use crate::classify::{dispatch, Action, Category};
use crate::frame::RawFrame;
use crate::marshal::status_string;
use crate::notify::Notification;
use crate::photometry::{measure_product, ZeroPoints};
use crate::products::ReducedProduct;
use crate::reduce::reduce_frame;
use crate::session::{Collaborators, SessionOptions};
use crate::visualize::{visualize_product, visualize_raw_logged};

/// Pointing frames only push the channel the reference pixel sits on.
pub const REFERENCE_PREVIEW_SUFFIX: &str = "_r.png";

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub action: Action,
    pub products: Vec<ReducedProduct>,
    pub copied: usize,
    pub pushed: usize,
}

impl FrameReport {
    fn new(action: Action) -> Self {
        Self {
            action,
            products: Vec::new(),
            copied: 0,
            pushed: 0,
        }
    }
}

pub struct FanOut {
    tools: Collaborators,
    options: SessionOptions,
    night: String,
    channel: String,
    zero_points: ZeroPoints,
}

impl FanOut {
    pub fn new(
        tools: Collaborators,
        options: SessionOptions,
        night: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            options,
            night: night.into(),
            channel: channel.into(),
            zero_points: ZeroPoints::new(),
        }
    }

    pub fn zero_points(&self) -> &ZeroPoints {
        &self.zero_points
    }

    pub async fn process_frame(&mut self, frame: &RawFrame) -> FrameReport {
        let action = dispatch(frame.category, self.options.dispatch_options());
        let mut report = FrameReport::new(action);
        if action == Action::Skip {
            debug!("Skipping {} frame {}", frame.category, frame.path.display());
            return report;
        }

        let ut_id = frame.ut_id();
        visualize_raw_logged(frame, Some(&ut_id), self.tools.plotter.as_ref()).await;

        match action {
            Action::VisualizeOnly | Action::Skip => {}
            Action::ReduceAndReport => {
                report.products = reduce_frame(frame, self.tools.reducer.as_ref()).await;
                self.visualize_products(frame, &report.products).await;
                if self.options.do_phot {
                    for product in &report.products {
                        measure_product(
                            product,
                            self.tools.headers.as_ref(),
                            self.tools.photometer.as_ref(),
                            &mut self.zero_points,
                        )
                        .await;
                    }
                }
                let paired: Vec<&ReducedProduct> = report
                    .products
                    .iter()
                    .filter(|p| p.has_paired_filter())
                    .collect();
                report.copied = self.copy_products(&paired).await;
                report.pushed = self.push_products(frame, &paired).await;
                if frame.category == Category::Science {
                    self.report_completion(frame).await;
                }
            }
            Action::ReduceOnly { push_reference } => {
                report.products = reduce_frame(frame, self.tools.reducer.as_ref()).await;
                self.visualize_products(frame, &report.products).await;
                if push_reference {
                    let reference: Vec<&ReducedProduct> = report
                        .products
                        .iter()
                        .filter(|p| {
                            p.preview_path()
                                .to_string_lossy()
                                .contains(REFERENCE_PREVIEW_SUFFIX)
                        })
                        .collect();
                    report.pushed = self.push_products(frame, &reference).await;
                }
            }
        }
        report
    }

    async fn visualize_products(&self, frame: &RawFrame, products: &[ReducedProduct]) {
        for product in products {
            let title = product_title(product, frame);
            if let Err(e) = visualize_product(product, &title, self.tools.plotter.as_ref()).await {
                warn!("Could not plot {}: {}", product.path.display(), e);
            }
        }
    }

    async fn copy_products(&self, products: &[&ReducedProduct]) -> usize {
        if !self.options.copy_enabled() {
            info!("Skipping copies to remote archive");
            return 0;
        }
        let mut copied = 0;
        for product in products {
            match self.tools.copier.copy(&product.path, &self.night).await {
                Ok(()) => copied += 1,
                Err(e) => warn!("Copy of {} failed: {}", product.path.display(), e),
            }
        }
        copied
    }

    async fn push_products(&self, frame: &RawFrame, products: &[&ReducedProduct]) -> usize {
        let mut pushed = 0;
        for product in products {
            let image = product.preview_path();
            let Some(notifier) = self.tools.notifier.as_ref().filter(|_| !self.options.local)
            else {
                debug!("Cannot push: {}", image.display());
                continue;
            };
            let notification = Notification {
                image,
                caption: String::new(),
                title: product_title(product, frame),
                channel: self.channel.clone(),
            };
            match notifier.push_image(&notification).await {
                Ok(()) => pushed += 1,
                Err(e) => warn!("Cannot push {}: {}", notification.image.display(), e),
            }
        }
        pushed
    }

    async fn report_completion(&self, frame: &RawFrame) {
        if self.options.local {
            info!("Local mode: not updating marshal");
            return;
        }
        let Some(request_id) = frame.header.request_id.as_deref() else {
            warn!("No REQ_ID in {}, cannot update status", frame.path.display());
            return;
        };
        let now = self.tools.clock.now().with_timezone(&Local).naive_local();
        let status = status_string(now);
        if let Err(e) = self.tools.status.update_status(request_id, &status).await {
            warn!("Status update for request {} failed: {}", request_id, e);
        }
    }
}

/// `RC image: <stem> | <IMGTYPE>`
pub fn product_title(product: &ReducedProduct, frame: &RawFrame) -> String {
    format!(
        "RC image: {} | {}",
        product.stem(),
        frame.header.imgtype.as_deref().unwrap_or("None")
    )
}
