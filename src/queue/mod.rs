//! Job scheduling: priority queue atop the store, sync-wait registry, and
//! per-job cancellation. Replaces the donor's `queue::broker`/`queue::store`
//! channel-distribution model (see SPEC_FULL.md §4.2/§4.3).

pub mod error;
pub mod job_queue;
pub mod waiters;

pub use error::{QueueError, Result};
pub use job_queue::JobQueue;
pub use waiters::WaiterRegistry;
