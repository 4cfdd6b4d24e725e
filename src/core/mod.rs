// Core algorithm exports
pub mod alert;
pub mod area;
pub mod movement;
pub mod projection;

pub use alert::{AlertEvaluator, AlertPolicy, EvaluationError};
pub use area::{area_codes_intersect, candidate_codes, primary_code};
pub use movement::{annotate_deltas, MovementDetector, SampleDelta};
pub use projection::distance;
