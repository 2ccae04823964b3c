//! Log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One immutable fragment of job output, as submitted by a runner
///
/// Chunks are never mutated or deleted; concatenating a job's chunks in
/// creation order reconstructs its full output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogChunk {
    pub id: Uuid,
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl LogChunk {
    pub fn new(job_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            created_at: Utc::now(),
            content: content.into(),
        }
    }
}

/// Concatenate chunks in the order given
pub fn concat_chunks(chunks: &[LogChunk]) -> String {
    chunks.iter().map(|chunk| chunk.content.as_str()).collect()
}
