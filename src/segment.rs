use crate::client::{Clock, HttpRequest, RateLimitedClient, Transport};
use crate::config::CollectorConfig;
use crate::types::{IdentifierSet, RepoId};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Deserialize, Debug, Default)]
pub struct CodeSearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<CodeSearchItem>,
}

#[derive(Deserialize, Debug)]
pub struct CodeSearchItem {
    pub repository: Option<ItemRepository>,
}

#[derive(Deserialize, Debug)]
pub struct ItemRepository {
    pub node_id: Option<String>,
}

/// Builds a code-search URL for `filename:<target> <predicate>`.
pub fn search_url(config: &CollectorConfig, predicate: &str, per_page: u32, page: Option<u32>) -> String {
    let q = format!("filename:{} {}", config.filename, predicate);
    let mut url = format!(
        "{}/search/code?q={}&per_page={}",
        config.api_base.trim_end_matches('/'),
        urlencoding::encode(q.trim()),
        per_page
    );
    if let Some(page) = page {
        url.push_str(&format!("&page={}", page));
    }
    url
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentEnd {
    /// A page came back empty.
    Exhausted,
    /// `max_pages` pages were read.
    PageCeiling,
    /// 422 from the search endpoint: no deeper pages are served for this query.
    DepthLimit,
    HttpError(u16),
    Transport,
    MalformedBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSummary {
    pub pages: u32,
    pub items: usize,
    pub new_ids: usize,
    pub end: SegmentEnd,
}

/// Paginates one bounded query, merging every repository id into `ids`.
///
/// Throttled pages are retried in place by the client. Any other failure ends this
/// segment only; ids merged so far are kept.
pub fn fetch_segment<T: Transport, C: Clock>(
    client: &RateLimitedClient<T, C>,
    config: &CollectorConfig,
    predicate: &str,
    ids: &mut IdentifierSet,
) -> SegmentSummary {
    info!(segment = predicate, "running segment");

    let mut summary = SegmentSummary {
        pages: 0,
        items: 0,
        new_ids: 0,
        end: SegmentEnd::Exhausted,
    };
    let mut page = 1;

    loop {
        let request = HttpRequest::get(search_url(config, predicate, config.page_size, Some(page)));
        let resp = match client.call(&request) {
            Ok(resp) => resp,
            Err(e) => {
                error!(segment = predicate, page, error = %e, "network error, abandoning segment");
                summary.end = SegmentEnd::Transport;
                break;
            }
        };

        if resp.status == 422 {
            info!(segment = predicate, page, "search depth limit reached for this segment");
            summary.end = SegmentEnd::DepthLimit;
            break;
        }
        if !resp.is_success() {
            error!(segment = predicate, page, status = resp.status, "search request failed");
            summary.end = SegmentEnd::HttpError(resp.status);
            break;
        }

        let parsed: CodeSearchPage = match serde_json::from_str(&resp.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(segment = predicate, page, error = %e, "unreadable search response");
                summary.end = SegmentEnd::MalformedBody;
                break;
            }
        };
        summary.pages += 1;

        let mut stop = None;
        if parsed.items.is_empty() {
            stop = Some(SegmentEnd::Exhausted);
        } else {
            let mut fresh = 0;
            for node_id in parsed
                .items
                .iter()
                .filter_map(|item| item.repository.as_ref()?.node_id.clone())
            {
                if ids.insert(RepoId(node_id)) {
                    fresh += 1;
                }
            }
            summary.items += parsed.items.len();
            summary.new_ids += fresh;
            info!(
                page,
                items = parsed.items.len(),
                new_unique = fresh,
                "page fetched"
            );

            page += 1;
            if page > config.max_pages {
                info!(segment = predicate, "segment page ceiling reached");
                stop = Some(SegmentEnd::PageCeiling);
            }
        }

        // Secondary quota: every successful page is followed by the politeness delay.
        client.pause(config.page_delay());

        if let Some(end) = stop {
            summary.end = end;
            break;
        }
    }

    if summary.end == SegmentEnd::Transport || summary.end == SegmentEnd::MalformedBody {
        warn!(
            segment = predicate,
            kept = summary.new_ids,
            "segment ended early, keeping identifiers found so far"
        );
    }
    summary
}
