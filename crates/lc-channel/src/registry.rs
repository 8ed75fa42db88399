//! Session registry and per-session delivery queues.
//!
//! Each registered session owns a FIFO of segments waiting to be fetched.
//! Broadcasting appends one segment to every queue and records it as the
//! latest; registering seeds the new queue with the latest so a client can
//! start playback immediately.
//!
//! Registration and broadcast are ordered through the `latest` lock:
//! register holds it for reading while it seeds and inserts, broadcast holds
//! it for writing while it fans out. A session registered concurrently with a
//! broadcast therefore sees that segment exactly once, either as its seed or
//! as a fan-out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use lc_core::{Error, Result, Segment, SessionId};

/// FIFO of segments waiting for one client.
#[derive(Debug, Default)]
pub struct SessionQueue {
    segments: Mutex<VecDeque<Arc<Segment>>>,
}

impl SessionQueue {
    fn seeded(latest: Option<Arc<Segment>>) -> Self {
        Self {
            segments: Mutex::new(latest.into_iter().collect()),
        }
    }

    fn push(&self, segment: Arc<Segment>) {
        self.segments.lock().push_back(segment);
    }

    /// Put a popped segment back at the head of the queue.
    pub fn restore(&self, segment: Arc<Segment>) {
        self.segments.lock().push_front(segment);
    }

    /// Remove and return the oldest pending segment.
    pub fn pop(&self) -> Option<Arc<Segment>> {
        self.segments.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.segments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.lock().is_empty()
    }
}

/// All known sessions plus the most recently broadcast segment.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    sessions: DashMap<SessionId, Arc<SessionQueue>>,
    latest: RwLock<Option<Arc<Segment>>>,
    broadcasts: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session whose queue starts with the latest segment, if any.
    pub fn register(&self) -> SessionId {
        let latest = self.latest.read();
        let id = SessionId::new();
        self.sessions
            .insert(id, Arc::new(SessionQueue::seeded(latest.clone())));
        tracing::debug!(session_id = %id, seeded = latest.is_some(), "Registered session");
        id
    }

    pub fn lookup(&self, id: &SessionId) -> Result<Arc<SessionQueue>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::not_found("session", id))
    }

    /// Append `segment` to every queue and make it the latest.
    ///
    /// Returns the number of sessions it was delivered to.
    pub fn broadcast(&self, segment: Arc<Segment>) -> usize {
        let mut latest = self.latest.write();
        let mut delivered = 0;
        for entry in self.sessions.iter() {
            entry.value().push(Arc::clone(&segment));
            delivered += 1;
        }
        *latest = Some(segment);
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        delivered
    }

    pub fn latest(&self) -> Option<Arc<Segment>> {
        self.latest.read().clone()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Segments broadcast since startup.
    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}
