//! Job execution: the `Fetcher` capability (spec §4.4) and the
//! `WorkerPool` slot dispatcher (spec §4.3) that drives executors.

pub mod fetcher;
pub mod pool;
