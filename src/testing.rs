//! In-memory stand-ins for GitHub and the wall clock, shared by the unit tests.

use crate::client::{Clock, HttpRequest, HttpResponse, Method, Transport, TransportError};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Fixed clock that records every sleep and advances by it.
pub struct FakeClock {
    now: Cell<DateTime<Utc>>,
    sleeps: RefCell<Vec<Duration>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        FakeClock::at(Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap())
    }
}

impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        FakeClock {
            now: Cell::new(now),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        let step = chrono::Duration::from_std(duration).unwrap();
        self.now.set(self.now.get() + step);
    }
}

/// Replays a fixed list of replies in order.
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<HttpResponse, TransportError>>) -> Self {
        ScriptedTransport {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(transport_error(&request.url)))
    }
}

pub fn ok(body: Value) -> Result<HttpResponse, TransportError> {
    Ok(status(200, body))
}

pub fn status(code: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status: code,
        rate_limit_reset: None,
        body: body.to_string(),
    }
}

pub fn transport_error(url: &str) -> TransportError {
    TransportError {
        url: url.to_string(),
        message: "connection reset by peer".to_string(),
    }
}

/// A tiny code-search index plus node store that answers the same way GitHub does:
/// `total_count` is exact, pagination past the cap returns 422.
pub struct FakeGitHub {
    files: Vec<(String, u64)>,
    nodes: HashMap<String, Value>,
    cap: usize,
    interrupts: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl Default for FakeGitHub {
    fn default() -> Self {
        FakeGitHub {
            files: Vec::new(),
            nodes: HashMap::new(),
            cap: 1000,
            interrupts: RefCell::new(VecDeque::new()),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl FakeGitHub {
    /// An AGENTS.md file of `size` bytes living in repository `id`.
    pub fn with_file(mut self, id: &str, size: u64) -> Self {
        self.files.push((id.to_string(), size));
        self
    }

    pub fn with_node(mut self, id: &str, node: Value) -> Self {
        self.nodes.insert(id.to_string(), node);
        self
    }

    /// Served before the next request is answered normally.
    pub fn interrupt_with(self, reply: Result<HttpResponse, TransportError>) -> Self {
        self.interrupts.borrow_mut().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    /// Decoded `q` values of every search request, in order.
    pub fn search_queries(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == Method::Get)
            .filter_map(|r| query_params(&r.url).remove("q"))
            .collect()
    }

    fn search(&self, url: &str) -> HttpResponse {
        let params = query_params(url);
        let q = params.get("q").cloned().unwrap_or_default();
        let per_page: usize = param(&params, "per_page").unwrap_or(30);
        let page: usize = param(&params, "page").unwrap_or(1);

        let range = q
            .split_whitespace()
            .find_map(|term| term.strip_prefix("size:"))
            .and_then(|r| r.split_once(".."))
            .and_then(|(lo, hi)| Some((lo.parse::<u64>().ok()?, hi.parse::<u64>().ok()?)));
        let matches: Vec<&String> = self
            .files
            .iter()
            .filter(|(_, size)| range.map_or(true, |(lo, hi)| *size >= lo && *size <= hi))
            .map(|(id, _)| id)
            .collect();

        let start = (page - 1) * per_page;
        if start >= self.cap {
            return status(
                422,
                json!({ "message": "Cannot access beyond the first 1000 results" }),
            );
        }
        let end = (start + per_page).min(matches.len()).min(self.cap);
        let items: Vec<Value> = matches
            .get(start..end)
            .unwrap_or(&[])
            .iter()
            .map(|id| json!({ "name": "AGENTS.md", "repository": { "node_id": id } }))
            .collect();

        status(
            200,
            json!({ "total_count": matches.len(), "incomplete_results": false, "items": items }),
        )
    }

    fn lookup(&self, body: &Value) -> HttpResponse {
        let ids: Vec<String> = body["variables"]["ids"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let nodes: Vec<Value> = ids
            .iter()
            .map(|id| self.nodes.get(id).cloned().unwrap_or(Value::Null))
            .collect();
        status(200, json!({ "data": { "nodes": nodes } }))
    }
}

impl Transport for FakeGitHub {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(reply) = self.interrupts.borrow_mut().pop_front() {
            return reply;
        }
        match (&request.method, &request.body) {
            (Method::Post, Some(body)) => Ok(self.lookup(body)),
            _ => Ok(self.search(&request.url)),
        }
    }
}

pub fn query_params(url: &str) -> HashMap<String, String> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            let v = urlencoding::decode(v)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| v.to_string());
            (k.to_string(), v)
        })
        .collect()
}

fn param(params: &HashMap<String, String>, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.parse().ok())
}

/// A GraphQL repository node as returned by the `nodes` query.
pub fn repo_node(name: &str, stars: u64, forks: u64, created_at: DateTime<Utc>) -> Value {
    json!({
        "nameWithOwner": name,
        "url": format!("https://github.com/{}", name),
        "description": "agent instructions",
        "stargazerCount": stars,
        "forkCount": forks,
        "watchers": { "totalCount": 1 },
        "issues": { "totalCount": 0 },
        "pullRequests": { "totalCount": 0 },
        "primaryLanguage": { "name": "Rust", "color": "#dea584" },
        "repositoryTopics": { "nodes": [] },
        "createdAt": created_at.to_rfc3339(),
        "updatedAt": created_at.to_rfc3339(),
        "isArchived": false,
        "isFork": false,
        "licenseInfo": null
    })
}
