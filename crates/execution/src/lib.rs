//! Plan execution engine: dependency-gated step loop with bounded retries
//! and a single awaitable navigation-readiness wait.

pub mod actions;
pub mod engine;
pub mod readiness;
