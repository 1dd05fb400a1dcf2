//! Error Types
//!
//! This module defines the error types used throughout the hair pipeline.
//!
//! # Overview
//!
//! The main error type [`HairError`] covers two broad families:
//! - Construction-time failures (malformed strand assets, bad capsule
//!   bindings, unknown joints). A hair group that fails here is simply not
//!   added to the active set.
//! - Per-frame resource failures (GPU allocation, exhaustion). These are
//!   fatal for the frame and are propagated to the orchestrator's caller.
//!
//! Numeric edge cases (zero-length edges, out-of-range parameters) never
//! surface as errors: they are clamped or skipped where they occur.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_hair::errors::{HairError, Result};
//!
//! fn build() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the hair pipeline.
#[derive(Error, Debug)]
pub enum HairError {
    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// `vertex_count != guide_strand_count * vertices_per_strand * (1 + follow_hairs_per_guide)`.
    #[error(
        "Strand topology mismatch: vertex count {vertex_count}, expected {expected} from strand layout"
    )]
    TopologyMismatch {
        /// Vertex count declared by the asset
        vertex_count: usize,
        /// Vertex count implied by the strand layout
        expected: usize,
    },

    /// The strand asset is structurally invalid.
    #[error("Invalid strand asset: {0}")]
    InvalidAsset(String),

    // ========================================================================
    // Collision Errors
    // ========================================================================
    /// More capsules were bound to a hair group than the fixed capacity allows.
    #[error("Too many capsules: {requested} requested, at most {max} supported")]
    TooManyCapsules {
        /// Number of capsules requested
        requested: usize,
        /// Compile-time capacity
        max: usize,
    },

    /// A capsule index does not refer to a defined capsule.
    #[error("Capsule index {index} out of range ({available} capsules defined)")]
    CapsuleOutOfRange {
        /// The invalid index
        index: usize,
        /// Number of capsules available
        available: usize,
    },

    // ========================================================================
    // Skeleton Errors
    // ========================================================================
    /// The skeletal rig has no such joint.
    #[error("Joint {joint} not found in rig {rig}")]
    JointNotFound {
        /// Rig index
        rig: usize,
        /// Joint index
        joint: usize,
    },

    // ========================================================================
    // Hair Group Errors
    // ========================================================================
    /// The hair group key is stale or was never issued.
    #[error("Hair group not found")]
    GroupNotFound,

    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// A GPU resource could not be created.
    #[error("GPU allocation failed: {0}")]
    GpuAllocation(String),

    /// The backend ran out of memory while recording frame work.
    #[error("Out of GPU memory while submitting hair work")]
    OutOfMemory,

    /// Render target dimensions are unusable.
    #[error("Invalid render target size {width}x{height}")]
    InvalidTargetSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

impl HairError {
    /// Returns `true` for failures that abort the whole frame rather than
    /// a single hair group's construction.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, HairError::GpuAllocation(_) | HairError::OutOfMemory)
    }
}

/// Alias for `Result<T, HairError>`.
pub type Result<T> = std::result::Result<T, HairError>;
