//! In-flight request bookkeeping.
//!
//! The registry holds at most one [`PendingRequest`] per [`LogicalType`].
//! Every backend call is registered here before it is issued and retired
//! when it settles, so deduplication, cancellation and stall detection all
//! live in one place.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Category of a request, used as the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Scrape,
    Ask,
    LoadUrls,
    RemoveUrl(String),
}

impl LogicalType {
    pub fn remove_url(url: impl Into<String>) -> Self {
        LogicalType::RemoveUrl(url.into())
    }

    /// Background listings do not make the session busy.
    pub fn is_user_initiated(&self) -> bool {
        !matches!(self, LogicalType::LoadUrls)
    }

    /// Short human-readable label for notices.
    pub fn describe(&self) -> String {
        match self {
            LogicalType::Scrape => "scraping".to_string(),
            LogicalType::Ask => "the answer".to_string(),
            LogicalType::LoadUrls => "the URL list".to_string(),
            LogicalType::RemoveUrl(url) => format!("removal of {url}"),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Scrape => write!(f, "scrape"),
            LogicalType::Ask => write!(f, "ask"),
            LogicalType::LoadUrls => write!(f, "loadUrls"),
            LogicalType::RemoveUrl(url) => write!(f, "removeUrl:{url}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Caller-side view of a registered request.
///
/// Two handles are equal when they name the same registration; the
/// cancellation token is not compared.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: RequestId,
    logical_type: LogicalType,
    cancel: CancellationToken,
}

impl RequestHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Token the transport watches to abort the call.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl PartialEq for RequestHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.logical_type == other.logical_type
    }
}

impl Eq for RequestHandle {}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub id: RequestId,
    pub logical_type: LogicalType,
    pub started_at: Instant,
    cancel: CancellationToken,
}

impl PendingRequest {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a {logical_type} request is already in flight")]
pub struct Rejected {
    pub logical_type: LogicalType,
}

#[derive(Debug, Clone, Default)]
pub struct RequestRegistry {
    entries: HashMap<LogicalType, PendingRequest>,
    next_id: u64,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&mut self, logical_type: LogicalType) -> Result<RequestHandle, Rejected> {
        self.try_begin_at(logical_type, Instant::now())
    }

    /// Registers a request that started at `now`.
    pub fn try_begin_at(
        &mut self,
        logical_type: LogicalType,
        now: Instant,
    ) -> Result<RequestHandle, Rejected> {
        match self.entries.entry(logical_type) {
            Entry::Occupied(slot) => Err(Rejected {
                logical_type: slot.key().clone(),
            }),
            Entry::Vacant(slot) => {
                self.next_id += 1;
                let id = RequestId(self.next_id);
                let cancel = CancellationToken::new();
                let handle = RequestHandle {
                    id,
                    logical_type: slot.key().clone(),
                    cancel: cancel.clone(),
                };
                slot.insert(PendingRequest {
                    id,
                    logical_type: handle.logical_type.clone(),
                    started_at: now,
                    cancel,
                });
                Ok(handle)
            }
        }
    }

    /// Retires the registration behind `handle`.
    ///
    /// Returns `false` when the handle is no longer current (already ended,
    /// cancelled, or superseded by a newer request of the same type).
    pub fn end(&mut self, handle: &RequestHandle) -> bool {
        if !self.is_current(handle) {
            return false;
        }
        self.entries.remove(&handle.logical_type);
        true
    }

    pub fn is_pending(&self, logical_type: &LogicalType) -> bool {
        self.entries.contains_key(logical_type)
    }

    pub fn is_current(&self, handle: &RequestHandle) -> bool {
        self.entries
            .get(&handle.logical_type)
            .is_some_and(|pending| pending.id == handle.id)
    }

    pub fn list_stalled(&self, threshold: Duration) -> Vec<PendingRequest> {
        self.list_stalled_at(threshold, Instant::now())
    }

    /// Requests older than `threshold` at `now`, oldest registration first.
    pub fn list_stalled_at(&self, threshold: Duration, now: Instant) -> Vec<PendingRequest> {
        let mut stalled: Vec<PendingRequest> = self
            .entries
            .values()
            .filter(|pending| pending.age(now) > threshold)
            .cloned()
            .collect();
        stalled.sort_by_key(|pending| pending.id);
        stalled
    }

    /// Aborts the request of `logical_type`, if any.
    pub fn cancel(&mut self, logical_type: &LogicalType) -> bool {
        match self.entries.remove(logical_type) {
            Some(pending) => {
                pending.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Aborts every request and empties the registry. Returns how many were aborted.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        for (_, pending) in self.entries.drain() {
            pending.cancel.cancel();
        }
        count
    }

    pub fn has_user_initiated(&self) -> bool {
        self.entries.keys().any(LogicalType::is_user_initiated)
    }

    /// Pending logical types in registration order.
    pub fn pending_types(&self) -> Vec<LogicalType> {
        let mut pending: Vec<&PendingRequest> = self.entries.values().collect();
        pending.sort_by_key(|p| p.id);
        pending.into_iter().map(|p| p.logical_type.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
