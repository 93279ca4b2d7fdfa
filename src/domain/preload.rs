//! Preload tasks and the bounded FIFO cache of warmed applications.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use url::Url;

/// Preload priority; higher sorts first at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Task lifecycle; `Loaded` and `Failed` are terminal and leave the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Loading,
    Loaded,
    Failed,
}

/// One speculative warm-up of an application's assets.
#[derive(Debug, Clone)]
pub struct PreloadTask {
    pub app_name: String,
    pub priority: Priority,
    pub status: TaskStatus,
    /// Enqueue order, the FIFO tie-breaker within a priority.
    pub seq: u64,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub error: Option<String>,
}

impl PreloadTask {
    pub fn new(app_name: impl Into<String>, priority: Priority, seq: u64) -> Self {
        Self {
            app_name: app_name.into(),
            priority,
            status: TaskStatus::Pending,
            seq,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Still occupying the queue (pending or in flight).
    pub fn is_active(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Loading)
    }
}

/// Bounded FIFO set of preloaded application names.
///
/// Insertion past the cap evicts the oldest entries. Deliberately FIFO rather
/// than LRU: eviction order is enqueue order, untouched by lookups.
#[derive(Debug, Clone)]
pub struct PreloadCache {
    order: VecDeque<String>,
    cap: usize,
}

impl PreloadCache {
    pub fn new(cap: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    /// Insert a name, returning any evicted entries (oldest first).
    pub fn insert(&mut self, name: impl Into<String>) -> Vec<String> {
        let name = name.into();
        if self.contains(&name) {
            return Vec::new();
        }
        self.order.push_back(name);
        let mut evicted = Vec::new();
        while self.order.len() > self.cap {
            if let Some(old) = self.order.pop_front() {
                evicted.push(old);
            }
        }
        evicted
    }

    pub fn remove(&mut self, name: &str) -> bool {
        if let Some(pos) = self.order.iter().position(|n| n == name) {
            self.order.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}

/// Pull the stylesheet and script URLs out of an entry document, resolved
/// against its base URL. Inline `data:` payloads are skipped.
pub fn extract_resource_urls(html: &str, base: &Url) -> Vec<Url> {
    let mut urls = Vec::new();
    for tag in tags(html, "link") {
        if attr(&tag, "rel").as_deref() == Some("stylesheet") {
            if let Some(href) = attr(&tag, "href") {
                push_resolved(&mut urls, base, &href);
            }
        }
    }
    for tag in tags(html, "script") {
        if let Some(src) = attr(&tag, "src") {
            push_resolved(&mut urls, base, &src);
        }
    }
    urls
}

fn push_resolved(urls: &mut Vec<Url>, base: &Url, raw: &str) {
    if raw.starts_with("data:") {
        return;
    }
    if let Ok(url) = base.join(raw) {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
}

/// Yield the attribute text of every `<name ...>` opening tag.
fn tags<'a>(html: &'a str, name: &'a str) -> impl Iterator<Item = String> + 'a {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{name}");
    let mut pos = 0;
    std::iter::from_fn(move || {
        while let Some(start) = lower[pos..].find(&open) {
            let start = pos + start;
            let after = start + open.len();
            // Require a delimiter so <script> does not match <scripting>.
            match lower.as_bytes().get(after) {
                Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'>') => {}
                _ => {
                    pos = after;
                    continue;
                }
            }
            let end = lower[after..].find('>').map(|i| after + i)?;
            pos = end + 1;
            return Some(html[after..end].to_string());
        }
        None
    })
}

fn attr(tag: &str, name: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let needle = format!("{name}=");
    let mut pos = 0;
    while let Some(found) = lower[pos..].find(&needle) {
        let found = pos + found;
        // Attribute names start at a word boundary.
        let boundary = found == 0
            || !lower.as_bytes()[found - 1].is_ascii_alphanumeric()
                && lower.as_bytes()[found - 1] != b'-';
        let value_start = found + needle.len();
        if !boundary {
            pos = value_start;
            continue;
        }
        let rest = &tag[value_start..];
        let value = match rest.as_bytes().first() {
            Some(&quote @ (b'"' | b'\'')) => {
                let rest = &rest[1..];
                rest.find(quote as char).map(|end| rest[..end].to_string())
            }
            Some(_) => Some(
                rest.split(|c: char| c.is_ascii_whitespace())
                    .next()
                    .unwrap_or("")
                    .to_string(),
            ),
            None => None,
        };
        return value;
    }
    None
}
