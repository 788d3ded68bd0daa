use crate::client::{Clock, HttpRequest, RateLimitedClient, Transport};
use crate::config::CollectorConfig;
use crate::segment::{fetch_segment, search_url, CodeSearchPage};
use crate::types::{IdentifierSet, SizeRange};
use tracing::{debug, error, info, warn};

/// What to do with a range once its total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePlan {
    /// Nothing matches.
    Skip,
    /// Fits under the cap: paginate it exhaustively.
    Fetch,
    /// Over the cap: probe both halves.
    Split(SizeRange, SizeRange),
    /// Over the cap at a single size. Only the first `cap` results are reachable.
    Saturated,
}

pub fn plan(range: SizeRange, total: u64, cap: u64) -> RangePlan {
    if total == 0 {
        return RangePlan::Skip;
    }
    if total <= cap {
        return RangePlan::Fetch;
    }
    match range.split() {
        Some((lo, hi)) => RangePlan::Split(lo, hi),
        None => RangePlan::Saturated,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeVisit {
    pub range: SizeRange,
    pub total: u64,
    pub plan: RangePlan,
}

#[derive(Debug)]
pub struct Discovery {
    pub ids: IdentifierSet,
    /// One entry per successfully probed range, in processing order.
    pub visits: Vec<RangeVisit>,
    /// Ranges whose probe failed; their subtree was not explored.
    pub failed: Vec<SizeRange>,
}

impl Discovery {
    pub fn leaves(&self) -> impl Iterator<Item = &RangeVisit> {
        self.visits
            .iter()
            .filter(|v| matches!(v.plan, RangePlan::Fetch | RangePlan::Saturated))
    }
}

fn range_predicate(config: &CollectorConfig, range: SizeRange) -> String {
    let mut predicate = config.qualifiers.trim().to_string();
    if !predicate.is_empty() {
        predicate.push(' ');
    }
    predicate.push_str(&range.qualifier());
    predicate
}

/// Count-only request for `range`. Throttling is waited out by the client and the same
/// probe is re-sent; any other failure is returned as `None`.
fn probe<T: Transport, C: Clock>(
    client: &RateLimitedClient<T, C>,
    config: &CollectorConfig,
    range: SizeRange,
) -> Option<u64> {
    let request = HttpRequest::get(search_url(config, &range_predicate(config, range), 1, None));
    let resp = match client.call(&request) {
        Ok(resp) => resp,
        Err(e) => {
            error!(range = %range, error = %e, "network error during probe");
            return None;
        }
    };
    if !resp.is_success() {
        error!(range = %range, status = resp.status, "probe failed");
        return None;
    }
    match serde_json::from_str::<CodeSearchPage>(&resp.body) {
        Ok(page) => Some(page.total_count),
        Err(e) => {
            error!(range = %range, error = %e, "unreadable probe response");
            None
        }
    }
}

/// Sorted by index order so pagination stays stable across pages.
fn fetch_leaf<T: Transport, C: Clock>(
    client: &RateLimitedClient<T, C>,
    config: &CollectorConfig,
    range: SizeRange,
    ids: &mut IdentifierSet,
) {
    let predicate = format!("{} sort:indexed", range_predicate(config, range));
    let summary = fetch_segment(client, config, &predicate, ids);
    debug!(
        range = %range,
        pages = summary.pages,
        items = summary.items,
        new_ids = summary.new_ids,
        end = ?summary.end,
        "segment finished"
    );
}

/// Enumerates every repository whose target file size falls inside `outer`.
///
/// Ranges are kept on an explicit stack; the low half of a split is always processed
/// before the high half. A failed probe drops only that range's subtree.
pub fn discover<T: Transport, C: Clock>(
    client: &RateLimitedClient<T, C>,
    config: &CollectorConfig,
    outer: SizeRange,
) -> Discovery {
    info!(
        filename = %config.filename,
        range = %outer,
        "starting adaptive range search"
    );

    let mut discovery = Discovery {
        ids: IdentifierSet::new(),
        visits: Vec::new(),
        failed: Vec::new(),
    };
    let mut pending = vec![outer];

    while let Some(range) = pending.pop() {
        let total = match probe(client, config, range) {
            Some(total) => total,
            None => {
                warn!(range = %range, "skipping range after failed probe");
                discovery.failed.push(range);
                continue;
            }
        };
        info!(range = %range, total, "probe");

        let next = plan(range, total, config.result_cap);
        discovery.visits.push(RangeVisit {
            range,
            total,
            plan: next,
        });

        match next {
            RangePlan::Skip => {}
            RangePlan::Fetch => {
                info!(range = %range, total, "fetching all items in range");
                fetch_leaf(client, config, range, &mut discovery.ids);
            }
            RangePlan::Split(lo, hi) => {
                info!(
                    total,
                    cap = config.result_cap,
                    low = %lo,
                    high = %hi,
                    "bisecting range"
                );
                pending.push(hi);
                pending.push(lo);
            }
            RangePlan::Saturated => {
                warn!(
                    size = range.min,
                    total,
                    "more than {} items at a single size, fetching the first {}",
                    config.result_cap,
                    config.result_cap
                );
                fetch_leaf(client, config, range, &mut discovery.ids);
            }
        }
    }

    info!(
        unique_repos = discovery.ids.len(),
        probes = discovery.visits.len(),
        leaves = discovery.leaves().count(),
        largest_leaf = discovery.leaves().map(|v| v.total).max().unwrap_or(0),
        failed_ranges = discovery.failed.len(),
        "discovery complete"
    );
    discovery
}
