pub mod case;
pub mod loaders;
pub mod measurement;
pub mod measurement_sets;
pub mod participant;
pub mod status;

pub use case::{Case, CaseShape};
pub use loaders::{load_measurement_sets, load_participant_set, parse_participant_set};
pub use measurement::{
    MeasurementBatch, MeasurementDefinition, MeasurementId, ProbeSelector, SelectorKind,
    SelectorValue, COST_PER_TRACEROUTE,
};
pub use measurement_sets::{MeasurementSets, SetCosts};
pub use participant::{AsGroup, Asn, IpVersion, Participant, ParticipantSet, TargetAddress};
pub use status::MeasurementStatus;
