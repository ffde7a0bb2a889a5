// device-policy-core/src/runtime/mod.rs
// ============================================================================
// Module: Device Policy Runtime
// Description: Policy engine, admin facade, stores, authorizers, and audit.
// Purpose: Execute policy mutations with persistence and notification.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime holds the [`PolicyEngine`], the per-admin
//! [`DevicePolicyClient`] facade, the in-memory store, built-in authorizers,
//! and the audit sinks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod authorizer;
pub mod client;
pub mod engine;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::PolicyAuditEvent;
pub use audit::PolicyAuditSink;
pub use audit::WriterAuditSink;
pub use authorizer::PermitAllAuthorizer;
pub use authorizer::StaticAuthorizer;
pub use client::DevicePolicyClient;
pub use client::WriteOutcome;
pub use engine::ClearResult;
pub use engine::PolicyEngine;
pub use engine::PolicyEngineConfig;
pub use engine::PolicyEngineError;
pub use engine::SetResult;
pub use engine::SweepResult;
pub use store::InMemoryPolicyStore;
pub use store::SharedPolicyStore;
