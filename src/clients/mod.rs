pub mod atlas_client;

pub use atlas_client::{parse_submission_ids, AtlasApi, AtlasClient};
