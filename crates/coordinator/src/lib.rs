//! Project update coordination
//!
//! `UpdateCoordinator` receives explicit update requests and chunked file
//! change notifications and decides when each project is built. The pieces
//! it is made of are usable on their own:
//! - `KeyedLock`: named async locks acquired as ordered groups
//! - `ChunkReassembler`: countdown of chunks per batch timestamp
//! - `DebounceScheduler`: cancellable per-project quiet-period timers
//! - `BuildTracker`: in-progress builds and queued follow-ups

pub mod chunks;
pub mod coordinator;
pub mod debounce;
pub mod keyed_lock;
pub mod tracker;

pub use chunks::{ChunkProgress, ChunkReassembler, ChunkStatus};
pub use coordinator::{
    status_code, ChangeNotification, CoordinatorBuilder, CoordinatorOptions, UpdateCoordinator, UpdateError,
    UpdateResult, ACCEPTED,
};
pub use debounce::DebounceScheduler;
pub use keyed_lock::{KeyedGuard, KeyedLock};
pub use tracker::{BuildSlot, BuildTracker, FollowUp, LogReporter, StatusReporter};
