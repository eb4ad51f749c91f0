//! Chunked change batch reassembly
//!
//! A watcher splits one logical batch of file changes into `chunk_total`
//! chunks sharing a timestamp. Each project tracks how many chunks of each
//! in-flight timestamp are still expected.

use std::collections::HashMap;
use tracing::debug;

/// Chunks still expected for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub timestamp: u64,
    pub chunk_remaining: u32,
}

/// Where the project stands after recording one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStatus {
    /// The chunk completed its own batch
    pub is_last_chunk: bool,
    /// Batches with other timestamps are still incomplete
    pub still_waiting_other_timestamps: bool,
}

impl ChunkStatus {
    /// Every batch of the project has fully arrived
    pub fn batch_complete(&self) -> bool {
        self.is_last_chunk && !self.still_waiting_other_timestamps
    }
}

#[derive(Debug, Default)]
pub struct ChunkReassembler {
    in_flight: HashMap<String, Vec<ChunkProgress>>,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one chunk of the batch `timestamp` against its total
    ///
    /// Counting is by arrival only: a retransmitted chunk counts again. The
    /// first sighting of a timestamp seeds the countdown with `chunk_total`.
    pub fn record_chunk(&mut self, project_id: &str, timestamp: u64, chunk: u32, chunk_total: u32) -> ChunkStatus {
        debug!(project_id, timestamp, "Chunk {} of {}", chunk, chunk_total);

        if chunk_total <= 1 {
            return ChunkStatus {
                is_last_chunk: true,
                still_waiting_other_timestamps: self.has_other(project_id, timestamp),
            };
        }

        let entries = self.in_flight.entry(project_id.to_string()).or_default();
        let remaining = match entries.iter().position(|e| e.timestamp == timestamp) {
            Some(pos) => {
                let remaining = entries[pos].chunk_remaining.saturating_sub(1);
                if remaining == 0 {
                    entries.remove(pos);
                } else {
                    entries[pos].chunk_remaining = remaining;
                }
                remaining
            }
            None => {
                let remaining = chunk_total - 1;
                entries.push(ChunkProgress {
                    timestamp,
                    chunk_remaining: remaining,
                });
                remaining
            }
        };
        if entries.is_empty() {
            self.in_flight.remove(project_id);
        }

        ChunkStatus {
            is_last_chunk: remaining == 0,
            still_waiting_other_timestamps: self.has_other(project_id, timestamp),
        }
    }

    fn has_other(&self, project_id: &str, timestamp: u64) -> bool {
        self.in_flight
            .get(project_id)
            .map_or(false, |entries| entries.iter().any(|e| e.timestamp != timestamp))
    }

    /// Forget every in-flight batch of a project
    pub fn clear(&mut self, project_id: &str) {
        self.in_flight.remove(project_id);
    }

    /// Number of incomplete batches of a project
    pub fn outstanding(&self, project_id: &str) -> usize {
        self.in_flight.get(project_id).map_or(0, Vec::len)
    }

    pub fn progress(&self, project_id: &str) -> &[ChunkProgress] {
        self.in_flight.get(project_id).map_or(&[], Vec::as_slice)
    }
}
