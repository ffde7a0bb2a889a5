// device-policy-broker/src/lib.rs
// ============================================================================
// Module: Device Policy Broker Library
// Description: Notification delivery for the device policy engine.
// Purpose: Route policy update outcomes to admins and other consumers.
// Dependencies: device-policy-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Device Policy Broker provides ready-made
//! [`device_policy_core::PolicyUpdateNotifier`] implementations: the
//! per-admin [`ChannelRouter`] with async [`PolicyUpdateReceiver`] waits, plus
//! [`CallbackSink`], [`LogSink`], and [`FanoutNotifier`].
//! Invariants:
//! - Delivery never blocks the engine; full or missing queues drop.
//! - Per-package ordering follows send order.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod router;
pub mod sink;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use router::ChannelRouter;
pub use router::DEFAULT_CHANNEL_CAPACITY;
pub use router::DEFAULT_DELIVERY_TIMEOUT;
pub use router::PolicyUpdateReceiver;
pub use router::ReceiveError;
pub use sink::CallbackSink;
pub use sink::FanoutNotifier;
pub use sink::LogSink;
