//! Frame categories and what the loop does with each.

pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::FrameHeader;

pub use rules::{select_rule, ClassificationRule, RULES, SCHEMA_CUTOVER};

/// Exposures longer than this get cosmic-ray rejection.
pub const COSMIC_EXPTIME_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Bias,
    DomeFlat,
    TwilightFlat,
    Focus,
    Acquisition,
    Science,
    Standard,
    Pointing,
    NotApplicable,
    Unknown,
}

impl Category {
    /// Directory name under `pngraw/` for raw previews.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bias => "bias",
            Self::DomeFlat => "dome",
            Self::TwilightFlat => "twilight",
            Self::Focus => "focus",
            Self::Acquisition => "acquisition",
            Self::Science => "science",
            Self::Standard => "standard",
            Self::Pointing => "pointing",
            Self::NotApplicable => "na",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a frame with the rule in effect on its acquisition date.
pub fn classify(header: &FrameHeader) -> Category {
    (select_rule(header.ut_date).classify)(header)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Raw preview only.
    VisualizeOnly,
    /// Reduce, then run the full post-reduction fan-out.
    ReduceAndReport,
    /// Reduce; optionally push the reference-channel preview.
    ReduceOnly { push_reference: bool },
    /// Nothing at all.
    Skip,
}

impl Action {
    pub fn reduces(&self) -> bool {
        matches!(self, Self::ReduceAndReport | Self::ReduceOnly { .. })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Reduce not-applicable frames instead of skipping them.
    pub process_na: bool,
}

pub fn dispatch(category: Category, options: DispatchOptions) -> Action {
    match category {
        Category::Science | Category::Acquisition | Category::Standard => Action::ReduceAndReport,
        Category::Pointing => Action::ReduceOnly {
            push_reference: true,
        },
        Category::NotApplicable if options.process_na => Action::ReduceOnly {
            push_reference: false,
        },
        Category::NotApplicable => Action::Skip,
        Category::Bias
        | Category::DomeFlat
        | Category::TwilightFlat
        | Category::Focus
        | Category::Unknown => Action::VisualizeOnly,
    }
}

pub fn cosmic_ray_rejection(exptime: f64) -> bool {
    exptime > COSMIC_EXPTIME_THRESHOLD
}
