//! Host capabilities: bone hierarchy lookup and pose access.
//!
//! The host animation system owns the skeleton and the pose. Nodes read
//! through these traits and hand back [`BoneTransform`](crate::BoneTransform)
//! sets; they never mutate host storage directly.

use nalgebra::{Isometry3, Point3, Vector3};

use crate::error::EvalError;
use crate::types::BoneIndex;

/// Read access to the bone hierarchy.
pub trait BoneHierarchy {
    /// Number of bones in the skeleton.
    fn bone_count(&self) -> usize;

    /// Resolve a bone by name.
    fn find_bone(&self, name: &str) -> Option<BoneIndex>;

    /// Parent of `bone`, or `None` for the root (or an unknown bone).
    fn parent(&self, bone: BoneIndex) -> Option<BoneIndex>;

    /// Whether `ancestor` is `bone` or one of its ancestors.
    fn is_ancestor_of(&self, ancestor: BoneIndex, bone: BoneIndex) -> bool {
        let mut current = Some(bone);
        while let Some(b) = current {
            if b == ancestor {
                return true;
            }
            current = self.parent(b);
        }
        false
    }
}

/// Read access to the current pose, in the host's component space.
pub trait PoseAccess: BoneHierarchy {
    /// Component-space transform of `bone`.
    fn component_transform(&self, bone: BoneIndex) -> Option<Isometry3<f32>>;

    /// Parent-relative (local) transform of `bone`.
    fn local_transform(&self, bone: BoneIndex) -> Option<Isometry3<f32>>;

    /// Transform from component space to world space.
    fn component_to_world(&self) -> Isometry3<f32>;

    /// World-space location of a named socket, `None` when it does not resolve.
    fn socket_location(&self, name: &str) -> Option<Vector3<f32>>;

    /// Component-space location of `bone`.
    fn component_location(&self, bone: BoneIndex) -> Option<Vector3<f32>> {
        self.component_transform(bone).map(|t| t.translation.vector)
    }

    /// Convert a world-space point into component space.
    fn world_to_component(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.component_to_world()
            .inverse_transform_point(&Point3::from(*point))
            .coords
    }

    /// Convert a component-space point into world space.
    fn component_to_world_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.component_to_world()
            .transform_point(&Point3::from(*point))
            .coords
    }
}

// ---------------------------------------------------------------------------
// BoneReference
// ---------------------------------------------------------------------------

/// A bone named in configuration, resolved against a hierarchy once per
/// hierarchy change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoneReference {
    pub name: String,
    index: Option<BoneIndex>,
}

impl BoneReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    /// A reference that is already resolved (e.g. the skeleton root).
    pub fn resolved_to(name: impl Into<String>, index: BoneIndex) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }

    /// Resolve the name. Returns `true` on success; on failure the reference
    /// is left unresolved.
    pub fn initialize<H: BoneHierarchy + ?Sized>(&mut self, hierarchy: &H) -> bool {
        self.index = hierarchy.find_bone(&self.name);
        self.index.is_some()
    }

    /// Resolve only if not already valid for `hierarchy`.
    pub fn init_if_invalid<H: BoneHierarchy + ?Sized>(&mut self, hierarchy: &H) -> bool {
        self.is_valid(hierarchy) || self.initialize(hierarchy)
    }

    /// Whether the reference is resolved to a bone that exists in `hierarchy`.
    pub fn is_valid<H: BoneHierarchy + ?Sized>(&self, hierarchy: &H) -> bool {
        self.index
            .is_some_and(|index| index.index() < hierarchy.bone_count())
    }

    pub const fn index(&self) -> Option<BoneIndex> {
        self.index
    }

    /// The resolved index, or [`EvalError::BoneNotFound`].
    pub fn require(&self) -> Result<BoneIndex, EvalError> {
        self.index
            .ok_or_else(|| EvalError::BoneNotFound(self.name.clone()))
    }
}

/// Component-space transform of `bone`, or [`EvalError::MissingBone`].
pub fn require_component_transform<P: PoseAccess + ?Sized>(
    pose: &P,
    bone: BoneIndex,
) -> Result<Isometry3<f32>, EvalError> {
    pose.component_transform(bone)
        .ok_or(EvalError::MissingBone(bone))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
