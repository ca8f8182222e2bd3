use crate::common::Frame;
use crate::config::BufferSettings;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// What `add_frame` does when the buffer is already at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming frame and leave the buffer untouched.
    #[default]
    DropNewest,
    /// Evict the head to make room, bounding end-to-end latency for live video.
    DropOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub accepted: u64,
    pub dropped: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Bounded FIFO shared between ingest producers and engine/playback consumers.
///
/// Never blocks its callers beyond the short critical section: a full buffer
/// drops according to its [`OverflowPolicy`] and an empty one returns `None`.
pub struct FrameBuffer {
    name: String,
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
    policy: OverflowPolicy,
    pipeline_available: AtomicBool,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl FrameBuffer {
    pub fn new(name: impl Into<String>, capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            pipeline_available: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: &BufferSettings) -> Self {
        Self::new(name, settings.capacity, settings.overflow_policy)
    }

    /// Returns `false` when the frame was rejected because the buffer is full.
    pub fn add_frame(&self, frame: Frame) -> bool {
        let mut frames = self.lock();
        if frames.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropNewest => {
                    drop(frames);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("FrameBuffer '{}' is full. Dropping frame.", self.name);
                    return false;
                }
                OverflowPolicy::DropOldest => {
                    frames.pop_front();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("FrameBuffer '{}' is full. Evicted oldest frame.", self.name);
                }
            }
        }
        frames.push_back(frame);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn get_frame(&self) -> Option<Frame> {
        self.lock().pop_front()
    }

    pub fn pipeline_available(&self) -> bool {
        self.pipeline_available.load(Ordering::Acquire)
    }

    pub fn set_pipeline_available(&self, available: bool) {
        self.pipeline_available.store(available, Ordering::Release);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }

    // A panic while holding the lock cannot leave the deque half-modified, so
    // a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}
