use crate::client::{Attempt, Clock, HttpRequest, RateLimitedClient, Transport};
use crate::config::CollectorConfig;
use crate::types::{RepoId, RepositoryRecord};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const NODES_QUERY: &str = r#"
  query GetRepositoryDetails($ids: [ID!]!) {
    nodes(ids: $ids) {
      ... on Repository {
        nameWithOwner
        url
        description
        stargazerCount
        forkCount
        watchers { totalCount }
        issues { totalCount }
        pullRequests { totalCount }
        primaryLanguage { name, color }
        repositoryTopics(first: 10) {
          nodes { topic { name } }
        }
        createdAt
        updatedAt
        isArchived
        isFork
        licenseInfo { name, spdxId }
      }
    }
  }
"#;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("still rate limited after {0} attempts")]
    Throttled(u32),
    #[error("GraphQL request failed with status {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] crate::client::TransportError),
    #[error("unreadable GraphQL response: {0}")]
    Body(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct NodesResponse {
    data: Option<NodesData>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Deserialize)]
struct NodesData {
    #[serde(default)]
    nodes: Vec<Value>,
}

fn graphql_url(config: &CollectorConfig) -> String {
    format!("{}/graphql", config.api_base.trim_end_matches('/'))
}

/// Turns one `nodes` entry into a record. Null entries and entries without
/// `nameWithOwner` (deleted or private repositories) yield `None`.
fn hydrate(node: Value) -> Option<RepositoryRecord> {
    let name = node.get("nameWithOwner")?.as_str()?.to_string();
    match serde_json::from_value(node) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(repo = %name, error = %e, "dropping repository with unexpected shape");
            None
        }
    }
}

/// What one successful HTTP exchange amounted to. GitHub reports GraphQL rate
/// limiting inside a 200 response, which is handled like a 403/429.
enum BatchReply {
    Nodes(Vec<RepositoryRecord>),
    RateLimited,
}

fn is_rate_limited(error: &Value) -> bool {
    error.get("type").and_then(Value::as_str) == Some("RATE_LIMITED")
}

fn parse_batch(body: &str) -> Result<BatchReply, BatchError> {
    let resp: NodesResponse = serde_json::from_str(body)?;
    if resp.errors.iter().any(is_rate_limited) {
        return Ok(BatchReply::RateLimited);
    }
    if !resp.errors.is_empty() {
        debug!(errors = resp.errors.len(), "GraphQL reported partial errors");
    }
    let nodes = resp.data.map(|d| d.nodes).unwrap_or_default();
    Ok(BatchReply::Nodes(nodes.into_iter().filter_map(hydrate).collect()))
}

/// Looks up one batch, re-sending the same batch after a fixed cooldown while throttled.
fn fetch_batch<T: Transport, C: Clock>(
    client: &RateLimitedClient<T, C>,
    config: &CollectorConfig,
    batch: &[RepoId],
) -> Result<Vec<RepositoryRecord>, BatchError> {
    let request = HttpRequest::post_json(
        graphql_url(config),
        json!({ "query": NODES_QUERY, "variables": { "ids": batch } }),
    );
    let attempts = config.max_batch_attempts.max(1);

    for attempt in 1..=attempts {
        match client.attempt(&request)? {
            Attempt::Response(resp) if resp.is_success() => {
                if let BatchReply::Nodes(records) = parse_batch(&resp.body)? {
                    return Ok(records);
                }
            }
            Attempt::Response(resp) => return Err(BatchError::Status(resp.status)),
            Attempt::Throttled(_) => {}
        }
        warn!(
            attempt,
            cooldown_secs = config.batch_cooldown_secs,
            "rate limit hit during GraphQL fetch"
        );
        client.pause(config.batch_cooldown());
    }
    Err(BatchError::Throttled(attempts))
}

/// Resolves identifiers into records in batches of `batch_size`.
///
/// A batch that fails is logged and skipped; its repositories are absent from the
/// output. The politeness delay follows every batch.
pub fn enrich<T: Transport, C: Clock>(
    client: &RateLimitedClient<T, C>,
    config: &CollectorConfig,
    ids: &[RepoId],
) -> Vec<RepositoryRecord> {
    if ids.is_empty() {
        return Vec::new();
    }
    info!(total = ids.len(), "fetching repository details");

    let mut records = Vec::with_capacity(ids.len());
    for (index, batch) in ids.chunks(config.batch_size.max(1)).enumerate() {
        let done = index * config.batch_size.max(1);
        if done % 200 == 0 {
            info!("progress: {}/{} repos", done, ids.len());
        }

        match fetch_batch(client, config, batch) {
            Ok(found) => {
                if found.len() < batch.len() {
                    debug!(
                        requested = batch.len(),
                        resolved = found.len(),
                        "some repositories no longer resolve"
                    );
                }
                records.extend(found);
            }
            Err(e) => error!(batch = index, size = batch.len(), error = %e, "batch fetch failed"),
        }

        client.pause(config.batch_delay());
    }

    info!(resolved = records.len(), "enrichment complete");
    records
}
