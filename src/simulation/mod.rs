//! Strand Simulation
//!
//! CPU reference of the per-frame compute sequence that advances a hair group:
//!
//! - [`SimulationParameters`] / [`GlobalForces`]: validated per-group and
//!   per-frame constants
//! - [`SimulationState`]: triple-buffered positions and tangents
//! - [`ConstraintSolver`]: the fixed pass sequence, one call per frame
//!
//! Individual passes live in [`integrate`], [`constraints`] and [`follow`] and
//! can be driven directly.

pub mod constraints;
pub mod follow;
pub mod integrate;
pub mod params;
pub mod solver;
pub mod state;

pub use params::{
    GlobalForces, GpuSimulationParams, MAX_CONSTRAINT_ITERATIONS, MAX_DAMPING,
    SimulationParameters,
};
pub use solver::{ConstraintSolver, SolveStats, SolverFrame};
pub use state::SimulationState;
