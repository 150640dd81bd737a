pub mod process;
pub mod system;
pub mod traffic;

use sysprom_common::error::SyspromError;
use tracing::{debug, warn};

use crate::metrics::types::MetricDescriptor;

/// Logs a family left out of the current scrape.
pub(crate) fn skipped(descriptor: &MetricDescriptor, err: &SyspromError) {
    if err.is_recoverable() {
        debug!(metric = %descriptor.name, error = %err, "omitting metric for this scrape");
    } else {
        warn!(metric = %descriptor.name, error = %err, "omitting metric for this scrape");
    }
}
