// device-policy-broker/src/sink/mod.rs
// ============================================================================
// Module: Device Policy Notification Sinks
// Description: Reference notifier implementations beyond the channel router.
// Purpose: Deliver policy update notifications to callbacks, logs, and fan-out.
// Dependencies: device-policy-core, serde_json, std
// ============================================================================

//! ## Overview
//! Each sink implements [`device_policy_core::PolicyUpdateNotifier`]. The
//! engine treats every sink as best effort and records failures as
//! `notification_dropped` audit events.

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod callback;
pub mod fanout;
pub mod log;

pub use callback::CallbackSink;
pub use fanout::FanoutNotifier;
pub use log::LogSink;
