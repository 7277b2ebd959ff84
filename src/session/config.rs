//! Session runtime options

use serde::{Deserialize, Serialize};

use crate::classify::DispatchOptions;

/// Per-run switches, set from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Do not copy products to the remote archive.
    pub nocopy: bool,
    /// Reduce frames whose type is not applicable.
    pub proc_na: bool,
    /// Run quick photometry on on-target products.
    pub do_phot: bool,
    /// Process locally: no chat pushes, no marshal updates.
    pub local: bool,
    /// Stop after the first poll that finds nothing new.
    pub one_pass: bool,
}

impl SessionOptions {
    pub fn copy_enabled(&self) -> bool {
        !self.nocopy
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            process_na: self.proc_na,
        }
    }
}
