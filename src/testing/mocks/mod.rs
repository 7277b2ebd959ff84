//! Mock implementations for testing
//!
//! Every mock is cheap to clone and shares its recorded state between
//! clones, so a test keeps one handle and gives another to the code under
//! test.

pub mod clock;
pub mod headers;
pub mod outputs;
pub mod reducer;

pub use clock::ManualClock;
pub use headers::FlakyHeaders;
pub use outputs::{MockCopier, MockNotifier, MockPhotometer, MockPlotter, MockStatusUpdater};
pub use reducer::MockReducer;
