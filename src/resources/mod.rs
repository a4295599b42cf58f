//! Build resource recommendations from historical telemetry

mod recommend;
pub mod render;
pub mod stats;

pub use recommend::{
    compute, recommend, validate_branch, Basis, Confidence, ResourceRecommendation,
};
