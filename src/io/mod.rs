//! Persistence: replay plans, capture manifests, transfer logs, telemetry

pub mod logs;
pub mod manifest;
pub mod plan;
