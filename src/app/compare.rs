use tracing::info;

use crate::args::CompareArgs;
use crate::error::AppResult;
use crate::regression::{compare, load_snapshot, render_report, validate_threshold};

/// Prints the regression table. Returns `false` when any metric regressed.
///
/// # Errors
///
/// Returns an error when either snapshot is missing or malformed.
pub(crate) async fn run_compare(args: &CompareArgs) -> AppResult<bool> {
    let threshold = validate_threshold(args.threshold)?;
    let baseline = load_snapshot(&args.baseline).await?;
    let current = load_snapshot(&args.current).await?;

    let entries = compare(&baseline, &current, threshold);
    info!(
        "Compared {} against {}: {} regression(s)",
        args.current.display(),
        args.baseline.display(),
        entries.len()
    );
    print!("{}", render_report(&entries, threshold));
    Ok(entries.is_empty())
}
