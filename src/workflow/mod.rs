pub mod batch_ctx;
pub mod batch_flow;
pub mod lifecycle_tracker;

pub use batch_ctx::BatchCtx;
pub use batch_flow::{BatchFlow, BatchOutcome};
pub use lifecycle_tracker::{Bucket, BucketCounts, CaseBuckets, LifecycleTracker};
