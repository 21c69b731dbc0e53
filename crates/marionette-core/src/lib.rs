//! marionette-core: types, errors, configuration and host interfaces for
//! the Marionette IK crates.
//!
//! The core never owns bone-hierarchy storage. Hosts expose their skeleton
//! through [`pose::BoneHierarchy`] and [`pose::PoseAccess`], and receive
//! per-evaluation write-back sets of [`types::BoneTransform`].

pub mod config;
pub mod debug;
pub mod error;
pub mod node;
pub mod pose;
pub mod types;

pub use error::{ConfigError, EvalError, MarionetteError};
pub use node::{EvalContext, SkeletalControl};
pub use pose::{BoneHierarchy, BoneReference, PoseAccess};
pub use types::{BoneIndex, BoneTransform, SkeletonAxis};
