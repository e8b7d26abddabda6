pub mod definition_builder;
pub mod maintenance;
pub mod quota_governor;
pub mod recovery;
pub mod result_reconciler;
pub mod result_store;

pub use definition_builder::DefinitionBuilder;
pub use maintenance::{check_running, stop_all_running};
pub use quota_governor::QuotaGovernor;
pub use recovery::{recover_tracker, recovered_bucket};
pub use result_reconciler::{ResultReconciler, SweepSummary};
pub use result_store::{ResultStore, SnapshotState, StoredResponse};
