use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Opaque repository key issued by GitHub (`node_id`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RepoId(pub String);

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiers collected during discovery. Grows monotonically; re-inserting is a no-op.
#[derive(Debug, Default)]
pub struct IdentifierSet {
    seen: HashSet<RepoId>,
    order: Vec<RepoId>,
}

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the identifier was not present before.
    pub fn insert(&mut self, id: RepoId) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        self.seen.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Hands the identifiers off in the order they were first discovered.
    pub fn into_ids(self) -> Vec<RepoId> {
        self.order
    }
}

/// Inclusive file-size interval used to keep each search under the result cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    pub min: u64,
    pub max: u64,
}

impl SizeRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Halves the range at `floor((min + max) / 2)`. A single point cannot be split.
    pub fn split(&self) -> Option<(SizeRange, SizeRange)> {
        if self.min >= self.max {
            return None;
        }
        let mid = self.min + (self.max - self.min) / 2;
        Some((SizeRange::new(self.min, mid), SizeRange::new(mid + 1, self.max)))
    }

    pub fn qualifier(&self) -> String {
        format!("size:{}..{}", self.min, self.max)
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.min, self.max)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Language {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spdx_id: Option<String>,
}

/// A repository hydrated from the GraphQL `nodes` lookup.
///
/// The serialized form matches the GraphQL response shape, which is also what the
/// dashboard reads from the snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    pub name_with_owner: String,
    pub url: String,
    pub description: Option<String>,
    pub stargazer_count: u64,
    pub fork_count: u64,
    #[serde(with = "total_count")]
    pub watchers: u64,
    #[serde(with = "total_count")]
    pub issues: u64,
    #[serde(with = "total_count")]
    pub pull_requests: u64,
    pub primary_language: Option<Language>,
    #[serde(rename = "repositoryTopics", with = "topic_nodes", default)]
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_archived: bool,
    pub is_fork: bool,
    pub license_info: Option<License>,
}

/// Snapshot file consumed by the dashboard. Always replaced wholesale.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub repos: Vec<RepositoryRecord>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, repos: Vec<RepositoryRecord>) -> Self {
        Self {
            timestamp,
            count: repos.len(),
            repos,
        }
    }
}

// `{ "totalCount": n }` <-> n
mod total_count {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Connection {
        total_count: u64,
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        Connection { total_count: *value }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        Connection::deserialize(deserializer).map(|c| c.total_count)
    }
}

// `{ "nodes": [{ "topic": { "name": .. } }] }` <-> ["..", ..]
mod topic_nodes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Topic {
        name: String,
    }

    #[derive(Serialize, Deserialize)]
    struct TopicNode {
        topic: Topic,
    }

    #[derive(Serialize, Deserialize)]
    struct Connection {
        #[serde(default)]
        nodes: Vec<TopicNode>,
    }

    pub fn serialize<S: Serializer>(value: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        let nodes = value
            .iter()
            .map(|name| TopicNode {
                topic: Topic { name: name.clone() },
            })
            .collect();
        Connection { nodes }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let connection = Connection::deserialize(deserializer)?;
        let mut names: Vec<String> = Vec::with_capacity(connection.nodes.len());
        for node in connection.nodes {
            if !names.contains(&node.topic.name) {
                names.push(node.topic.name);
            }
        }
        Ok(names)
    }
}
