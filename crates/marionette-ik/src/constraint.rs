//! Per-link rotation limits.
//!
//! Constraint slot `i` of a chain governs the direction of the segment from
//! link `i` to link `i + 1`. The solver calls [`BoneConstraint::setup`] and
//! then [`BoneConstraint::enforce`] every time it re-places that segment.

use nalgebra::{Isometry3, Vector3};

use marionette_core::config::{ConstraintConfig, PlanarSetup};

use crate::geometry::{clamp_degrees, reject, DEGENERATE_LENGTH};

// ---------------------------------------------------------------------------
// PlanarRotation
// ---------------------------------------------------------------------------

/// Hinge-style limit: the segment lies in the plane normal to `axis`, at an
/// angle in `[min_degrees, max_degrees]` from `forward`, measured about
/// `axis` (right-handed).
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarRotation {
    pub enabled: bool,
    pub axis: Vector3<f32>,
    /// Zero-angle reference direction.
    pub forward: Vector3<f32>,
    /// Substituted when the constrained direction has no in-plane component.
    pub failsafe: Vector3<f32>,
    pub min_degrees: f32,
    pub max_degrees: f32,
    pub setup: PlanarSetup,
}

impl PlanarRotation {
    /// Enabled constraint with `failsafe = forward` and a fixed axis.
    pub const fn new(
        axis: Vector3<f32>,
        forward: Vector3<f32>,
        min_degrees: f32,
        max_degrees: f32,
    ) -> Self {
        Self {
            enabled: true,
            axis,
            forward,
            failsafe: forward,
            min_degrees,
            max_degrees,
            setup: PlanarSetup::Fixed,
        }
    }

    #[must_use]
    pub const fn with_failsafe(mut self, failsafe: Vector3<f32>) -> Self {
        self.failsafe = failsafe;
        self
    }

    #[must_use]
    pub const fn with_setup(mut self, setup: PlanarSetup) -> Self {
        self.setup = setup;
        self
    }

    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Orthonormal frame `(axis, forward, side)` with `side = axis × forward`.
    /// `None` when the axis is zero or parallel to `forward`.
    fn basis(&self) -> Option<(Vector3<f32>, Vector3<f32>, Vector3<f32>)> {
        let axis = self.axis.try_normalize(DEGENERATE_LENGTH)?;
        let forward = reject(&self.forward, &axis).try_normalize(DEGENERATE_LENGTH)?;
        let side = axis.cross(&forward);
        Some((axis, forward, side))
    }

    /// Signed angle of `direction` about the axis, in degrees from `forward`.
    /// `None` when the direction (or the constraint frame) is degenerate.
    pub fn angle_of(&self, direction: &Vector3<f32>) -> Option<f32> {
        let (_, forward, side) = self.basis()?;
        let x = direction.dot(&forward);
        let y = direction.dot(&side);
        if x.hypot(y) <= DEGENERATE_LENGTH {
            return None;
        }
        Some(y.atan2(x).to_degrees())
    }

    /// Project `direction` into the constraint plane and clamp its angle.
    ///
    /// Returns a unit vector. A disabled constraint, or one whose frame is
    /// degenerate, returns `direction` unchanged.
    pub fn constrain_direction(&self, direction: &Vector3<f32>) -> Vector3<f32> {
        if !self.enabled {
            return *direction;
        }
        let Some((_, forward, side)) = self.basis() else {
            return *direction;
        };

        let in_plane = |v: &Vector3<f32>| (v.dot(&forward), v.dot(&side));
        let (mut x, mut y) = in_plane(direction);
        if x.hypot(y) <= DEGENERATE_LENGTH {
            (x, y) = in_plane(&self.failsafe);
            if x.hypot(y) <= DEGENERATE_LENGTH {
                (x, y) = (1.0, 0.0);
            }
        }

        let angle = clamp_degrees(y.atan2(x).to_degrees(), self.min_degrees, self.max_degrees)
            .to_radians();
        let (sin, cos) = angle.sin_cos();
        forward * cos + side * sin
    }

    /// Refresh the axis from the working chain, according to [`Self::setup`].
    pub fn setup(&mut self, index: usize, working: &[Vector3<f32>]) {
        match self.setup {
            PlanarSetup::Fixed => {}
            PlanarSetup::AxisFromParentSegment => {
                if index == 0 || index >= working.len() {
                    return;
                }
                let parent_segment = working[index] - working[index - 1];
                if let Some(direction) = parent_segment.try_normalize(DEGENERATE_LENGTH) {
                    self.axis = -direction;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BoneConstraint
// ---------------------------------------------------------------------------

/// Rotation limit attached to one chain link.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BoneConstraint {
    #[default]
    Unconstrained,
    Planar(PlanarRotation),
}

impl BoneConstraint {
    /// Pre-pass hook. Mutates only the constraint's own parameters.
    ///
    /// `reference` holds the pre-solve transforms; `working` the current
    /// link positions of the pass in progress.
    pub fn setup(&mut self, index: usize, _reference: &[Isometry3<f32>], working: &[Vector3<f32>]) {
        match self {
            Self::Unconstrained => {}
            Self::Planar(planar) => planar.setup(index, working),
        }
    }

    /// Bend a proposed segment direction into the allowed range.
    ///
    /// Unconstrained links pass the direction through untouched.
    pub fn enforce(&self, direction: &Vector3<f32>) -> Vector3<f32> {
        match self {
            Self::Unconstrained => *direction,
            Self::Planar(planar) => planar.constrain_direction(direction),
        }
    }

    /// Fallback direction for degenerate segments, if the constraint has one.
    pub fn failsafe(&self) -> Option<Vector3<f32>> {
        match self {
            Self::Planar(planar) if planar.enabled => planar
                .failsafe
                .try_normalize(DEGENERATE_LENGTH),
            _ => None,
        }
    }

    pub const fn is_active(&self) -> bool {
        match self {
            Self::Unconstrained => false,
            Self::Planar(planar) => planar.enabled,
        }
    }
}

impl From<PlanarRotation> for BoneConstraint {
    fn from(planar: PlanarRotation) -> Self {
        Self::Planar(planar)
    }
}

impl From<&ConstraintConfig> for BoneConstraint {
    fn from(config: &ConstraintConfig) -> Self {
        match config {
            ConstraintConfig::Unconstrained => Self::Unconstrained,
            ConstraintConfig::Planar {
                axis,
                forward,
                failsafe,
                min_degrees,
                max_degrees,
                setup,
                enabled,
            } => {
                let forward = Vector3::from(*forward);
                Self::Planar(PlanarRotation {
                    enabled: *enabled,
                    axis: Vector3::from(*axis),
                    forward,
                    failsafe: failsafe.map_or(forward, Vector3::from),
                    min_degrees: *min_degrees,
                    max_degrees: *max_degrees,
                    setup: *setup,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
