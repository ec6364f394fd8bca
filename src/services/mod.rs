//! Core services: tuning, backend invocation, planning, replay, staging

pub mod exit_code;
pub mod invoker;
pub mod planner;
pub mod profiles;
pub mod progress;
pub mod replay;
pub mod sizing;
pub mod stages;
pub mod state_tool;
pub mod tuning;
