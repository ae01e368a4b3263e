//! Query analysis and plan assembly over a closed template set with typed
//! step commands.

pub mod analysis;
pub mod plan;
pub mod planner;
pub mod templates;
