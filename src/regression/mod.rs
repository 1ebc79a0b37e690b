//! Regression Detector: diff two metric snapshots against a relative
//! threshold.
mod compare;
mod report;


pub use compare::{
    DEFAULT_THRESHOLD, RegressionEntry, compare, load_snapshot, relative_difference,
    validate_threshold,
};
pub use report::render_report;
