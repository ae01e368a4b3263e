//! Browsing-agent orchestration: perceive a query, retrieve remembered
//! pages, plan, execute, and record the outcome back into memory.

pub mod agent;
pub mod perception;
