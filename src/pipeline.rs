use crate::client::{Clock, RateLimitedClient, Transport};
use crate::config::CollectorConfig;
use crate::discovery::discover;
use crate::enrich::enrich;
use crate::snapshot::{self, PublishOutcome, SnapshotError};
use crate::types::{SizeRange, Snapshot};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub enriched: usize,
    pub retained: usize,
    pub outcome: PublishOutcome,
    pub output: PathBuf,
}

/// One full collection: discovery, enrichment, quality filter, snapshot.
///
/// Network trouble only shrinks the result; the only error returned is a failure to
/// write the snapshot.
pub fn collect<T: Transport, C: Clock>(
    client: &RateLimitedClient<T, C>,
    config: &CollectorConfig,
    output: &Path,
) -> Result<RunReport, SnapshotError> {
    let range = SizeRange::new(config.size_min, config.size_max);
    let found = discover(client, config, range).ids;

    if found.is_empty() {
        let outcome = snapshot::publish_empty(output, client.clock().now())?;
        return Ok(RunReport {
            discovered: 0,
            enriched: 0,
            retained: 0,
            outcome,
            output: output.to_path_buf(),
        });
    }

    let ids = found.into_ids();
    let records = enrich(client, config, &ids);
    let enriched = records.len();

    let now = client.clock().now();
    let kept = snapshot::retain_notable(records, now, config.fresh_window());
    let snapshot = Snapshot::new(now, kept);
    snapshot::write_snapshot(output, &snapshot)?;

    info!(
        repos = snapshot.count,
        path = %output.display(),
        "snapshot saved"
    );

    Ok(RunReport {
        discovered: ids.len(),
        enriched,
        retained: snapshot.count,
        outcome: PublishOutcome::Written,
        output: output.to_path_buf(),
    })
}
