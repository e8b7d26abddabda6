pub mod set_loader;

pub use set_loader::{load_measurement_sets, load_participant_set, parse_participant_set};
