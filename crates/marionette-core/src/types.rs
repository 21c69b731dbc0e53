use std::fmt;

use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BoneIndex
// ---------------------------------------------------------------------------

/// Index of a bone in the host skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoneIndex(pub usize);

impl BoneIndex {
    /// The skeleton root. Hosts store the root first.
    pub const ROOT: Self = Self(0);

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BoneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BoneTransform
// ---------------------------------------------------------------------------

/// A component-space transform to be written back into the host pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub bone: BoneIndex,
    pub transform: Isometry3<f32>,
}

impl BoneTransform {
    pub const fn new(bone: BoneIndex, transform: Isometry3<f32>) -> Self {
        Self { bone, transform }
    }
}

// ---------------------------------------------------------------------------
// SkeletonAxis
// ---------------------------------------------------------------------------

/// A signed principal axis of the skeletal mesh component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkeletonAxis {
    X,
    Y,
    Z,
    NegX,
    NegY,
    NegZ,
}

impl SkeletonAxis {
    /// Unit vector for this axis in component space.
    pub fn vector(self) -> Vector3<f32> {
        match self {
            Self::X => Vector3::x(),
            Self::Y => Vector3::y(),
            Self::Z => Vector3::z(),
            Self::NegX => -Vector3::x(),
            Self::NegY => -Vector3::y(),
            Self::NegZ => -Vector3::z(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
