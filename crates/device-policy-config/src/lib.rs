// device-policy-config/src/lib.rs
// ============================================================================
// Module: Device Policy Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for device-policy.toml semantics.
// Dependencies: device-policy-core, device-policy-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `device-policy-config` defines the configuration model for the device
//! policy engine: the snapshot store backend, notification delivery limits,
//! the audit log, and engine limits. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
