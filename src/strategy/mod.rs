// Threshold trading decisions
pub mod decision_engine;
pub mod emergency;

pub use decision_engine::{Decision, DecisionAction, DecisionEngine};
pub use emergency::EmergencyDetector;
