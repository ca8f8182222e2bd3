use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One opaque media frame. The payload is never interpreted by the buffers or
/// the engine; only steps look inside it.
#[derive(Clone)]
pub struct Frame {
    frame_id: Uuid,
    payload: Arc<[u8]>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            frame_id: Uuid::new_v4(),
            payload: Arc::from(payload.into()),
            captured_at: Utc::now(),
        }
    }

    /// Derive the next frame in a pipeline: new payload, same identity and
    /// capture time so latency can be measured end to end.
    pub fn with_payload(&self, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            frame_id: self.frame_id,
            payload: Arc::from(payload.into()),
            captured_at: self.captured_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.frame_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.payload.to_vec()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(payload: Vec<u8>) -> Self {
        Frame::new(payload)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("frame_id", &self.frame_id)
            .field("len", &self.payload.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}
