//! The skeletal control node contract.
//!
//! A node is resolved against the bone hierarchy once per hierarchy change
//! ([`SkeletalControl::initialize_bone_references`]), checked for validity,
//! then evaluated once per animation update.

use crate::debug::DebugSink;
use crate::error::EvalError;
use crate::pose::{BoneHierarchy, PoseAccess};
use crate::types::BoneTransform;

/// Per-evaluation inputs supplied by the host.
pub struct EvalContext<'a> {
    /// Current pose (component space).
    pub pose: &'a dyn PoseAccess,
    /// Seconds since the previous update.
    pub delta_time: f32,
    /// Debug-draw sink; pass [`NoopSink`](crate::debug::NoopSink) when unused.
    pub debug: &'a mut dyn DebugSink,
}

impl<'a> EvalContext<'a> {
    pub fn new(pose: &'a dyn PoseAccess, delta_time: f32, debug: &'a mut dyn DebugSink) -> Self {
        Self {
            pose,
            delta_time,
            debug,
        }
    }
}

/// A per-frame pose adjustment.
pub trait SkeletalControl {
    /// Name used in diagnostics.
    fn debug_label(&self) -> &str;

    /// Resolve configured bone names. Called when the hierarchy changes.
    fn initialize_bone_references(&mut self, hierarchy: &dyn BoneHierarchy);

    /// Check that every input is present and resolved.
    fn check_valid(&self, hierarchy: &dyn BoneHierarchy) -> Result<(), EvalError>;

    /// The validity predicate the host checks before [`evaluate`](Self::evaluate).
    fn is_valid_to_evaluate(&self, hierarchy: &dyn BoneHierarchy) -> bool {
        self.check_valid(hierarchy).is_ok()
    }

    /// Evaluate the node, reporting why nothing was produced.
    fn try_evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<Vec<BoneTransform>, EvalError>;

    /// Evaluate the node. Errors are logged and yield an empty write-back set,
    /// leaving the input pose untouched.
    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Vec<BoneTransform> {
        match self.try_evaluate(ctx) {
            Ok(transforms) => transforms,
            Err(err) => {
                tracing::warn!(node = self.debug_label(), %err, "could not evaluate skeletal control");
                Vec::new()
            }
        }
    }
}
