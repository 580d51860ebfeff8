//! # sqlproj-base
//!
//! Core library for SQL database project files: loading, editing, and
//! round-trip migration of `.sqlproj` descriptors.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! roundtrip → SSDT-to-NetCore migration of build-target imports
//!   ↓
//! project   → Project model: entries, SQLCMD variables, mutations
//!   ↓
//! platform  → Target platform resolution (DSP strings, system dacpacs)
//!   ↓
//! xml       → Document adapter: owned XML tree over quick-xml events
//!   ↓
//! error     → ProjectError taxonomy
//! ```

// ============================================================================
// MODULES (dependency order: error → xml → platform → project → roundtrip)
// ============================================================================

/// Error taxonomy for load, mutation, and migration failures
pub mod error;

/// Document adapter: parse, query, mutate, and serialize the backing XML tree
pub mod xml;

/// Target platform resolution: DSP strings and system dacpac paths
pub mod platform;

/// Project model: the aggregate root over one `.sqlproj` document
pub mod project;

/// Round-trip migration: SSDT import rewrite and NetCore package reference
pub mod roundtrip;

// Re-export commonly needed items
pub use error::ProjectError;
pub use platform::TargetPlatform;
pub use project::{Project, ProjectEntry, ReferenceLocation};
