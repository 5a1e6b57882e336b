//! Runtime bootstrap for hosts that embed the memo engine.

pub mod error;
pub mod telemetry;
