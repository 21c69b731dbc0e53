//! Range-limited FABRIK inverse kinematics.
//!
//! Provides a per-link rotation constraint model, IK chain gathering from a
//! host pose, the constrained FABRIK solver and a generic skeletal control
//! node that drives a chain tip toward an effector target.
//!
//! # Architecture
//!
//! ```text
//! PoseAccess ──► IkChain ──► FabrikSolver ──► Vec<BoneTransform>
//!                  ▲
//!      IkChainDef ─┘ (bone names + BoneConstraint per link)
//! ```
//!
//! The [`IkChainDef`] is resolved against the bone hierarchy when it
//! changes. Each evaluation gathers an [`IkChain`] from the current pose,
//! solves it, and hands the solved component-space transforms back to the
//! host.

pub mod chain;
pub mod constraint;
pub mod geometry;
pub mod node;
pub mod solver;

pub use chain::{ChainLink, IkBoneDef, IkChain, IkChainDef, MIN_CHAIN_LINKS};
pub use constraint::{BoneConstraint, PlanarRotation};
pub use node::RangeLimitedFabrik;
pub use solver::{FabrikConfig, FabrikResult, FabrikSolver};
