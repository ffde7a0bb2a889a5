// device-policy-core/src/lib.rs
// ============================================================================
// Module: Device Policy Core Library
// Description: Public API surface for the device policy engine.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Device policy core lets several independent authorities set values for the
//! same policy and resolves them into one enforced value per key and user. It
//! is storage- and transport-agnostic and integrates through the traits in
//! [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::AdminAuthorizer;
pub use interfaces::AuthorizationDecision;
pub use interfaces::AuthorizationError;
pub use interfaces::NoopNotifier;
pub use interfaces::NotifyError;
pub use interfaces::PolicyAccess;
pub use interfaces::PolicyStateStore;
pub use interfaces::PolicyUpdateNotifier;
pub use interfaces::StoreError;
pub use runtime::ClearResult;
pub use runtime::DevicePolicyClient;
pub use runtime::FileAuditSink;
pub use runtime::InMemoryPolicyStore;
pub use runtime::NoopAuditSink;
pub use runtime::PermitAllAuthorizer;
pub use runtime::PolicyAuditEvent;
pub use runtime::PolicyAuditSink;
pub use runtime::PolicyEngine;
pub use runtime::PolicyEngineConfig;
pub use runtime::PolicyEngineError;
pub use runtime::SetResult;
pub use runtime::SharedPolicyStore;
pub use runtime::StaticAuthorizer;
pub use runtime::SweepResult;
pub use runtime::WriteOutcome;
pub use runtime::WriterAuditSink;
