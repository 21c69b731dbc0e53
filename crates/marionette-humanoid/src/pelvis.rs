//! Pelvis height adjustment for uneven ground.
//!
//! Keeps the feet-to-root relationship of the source animation when the
//! floor under each foot is at a different height. The pelvis drops to suit
//! whichever foot needs it most, and moves toward its target at a bounded
//! speed. No IK is involved.

use nalgebra::Vector3;

use marionette_core::config::PelvisConfig;
use marionette_core::debug::{Color, DebugSink};
use marionette_core::pose::require_component_transform;
use marionette_core::{
    BoneHierarchy, BoneIndex, BoneReference, BoneTransform, EvalContext, EvalError, PoseAccess,
    SkeletalControl, SkeletonAxis,
};

const DEBUG_SPHERE_RADIUS: f32 = 20.0;

/// Result of a downward floor trace under one foot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FootTrace {
    /// World-space impact point, `None` when no floor was hit.
    pub hit: Option<Vector3<f32>>,
}

impl FootTrace {
    /// The trace hit the floor at world-space `point`.
    pub const fn hit(point: Vector3<f32>) -> Self {
        Self { hit: Some(point) }
    }

    /// The trace found no floor.
    pub const fn miss() -> Self {
        Self { hit: None }
    }
}

/// Which rule chose this frame's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PelvisState {
    /// Both feet found the floor and the adjustment is within bounds.
    TrackingFloor,
    /// Target offset is zero: a trace missed or the adjustment was too large.
    #[default]
    ReturningToCenter,
}

/// Heights of one foot and the floor beneath it, along the up axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootHeights {
    pub foot: f32,
    pub floor: f32,
}

/// Target pelvis delta along the up axis.
///
/// Each foot's target height is `floor + (foot - root)`. The foot with the
/// lower target governs. Adjustments larger than `max_adjust` in magnitude
/// are discarded in favor of returning to center.
pub fn target_pelvis_delta(
    root: f32,
    left: FootHeights,
    right: FootHeights,
    max_adjust: f32,
) -> (f32, PelvisState) {
    let left_target = left.floor + (left.foot - root);
    let right_target = right.floor + (right.foot - root);
    let delta = if left_target < right_target {
        left_target - left.foot
    } else {
        right_target - right.foot
    };

    if delta.abs() > max_adjust {
        (0.0, PelvisState::ReturningToCenter)
    } else {
        (delta, PelvisState::TrackingFloor)
    }
}

/// Move `previous` toward `target` by at most `max_step`.
pub fn smooth_offset(previous: &Vector3<f32>, target: &Vector3<f32>, max_step: f32) -> Vector3<f32> {
    let step = target - previous;
    let len = step.norm();
    if len <= max_step {
        *target
    } else {
        previous + step * (max_step / len)
    }
}

// ---------------------------------------------------------------------------
// HumanoidPelvisHeightAdjustment
// ---------------------------------------------------------------------------

/// Rate-limited vertical pelvis offset driven by foot floor traces.
#[derive(Debug, Clone)]
pub struct HumanoidPelvisHeightAdjustment {
    label: String,
    pelvis: BoneReference,
    left_foot: BoneReference,
    right_foot: BoneReference,
    /// `None` means the skeleton root.
    root: Option<BoneReference>,
    up_axis: SkeletonAxis,
    max_adjust_size: f32,
    adjust_velocity: f32,
    debug_draw: bool,
    left_trace: FootTrace,
    right_trace: FootTrace,
    last_offset: Vector3<f32>,
    state: PelvisState,
}

impl HumanoidPelvisHeightAdjustment {
    /// Create a node with the default limits and the skeleton root as the
    /// floor reference.
    pub fn new(label: impl Into<String>, pelvis: &str, left_foot: &str, right_foot: &str) -> Self {
        Self {
            label: label.into(),
            pelvis: BoneReference::new(pelvis),
            left_foot: BoneReference::new(left_foot),
            right_foot: BoneReference::new(right_foot),
            root: None,
            up_axis: SkeletonAxis::Z,
            max_adjust_size: 50.0,
            adjust_velocity: 150.0,
            debug_draw: false,
            left_trace: FootTrace::miss(),
            right_trace: FootTrace::miss(),
            last_offset: Vector3::zeros(),
            state: PelvisState::default(),
        }
    }

    /// Build a node from its TOML configuration.
    pub fn from_config(label: impl Into<String>, config: &PelvisConfig) -> Self {
        let mut node = Self::new(
            label,
            &config.pelvis_bone,
            &config.left_foot_bone,
            &config.right_foot_bone,
        )
        .with_up_axis(config.up_axis)
        .with_limits(config.max_pelvis_adjust_size, config.pelvis_adjust_velocity)
        .with_debug_draw(config.debug_draw);
        node.root = config.root_bone.as_deref().map(BoneReference::new);
        node
    }

    #[must_use]
    pub const fn with_up_axis(mut self, up: SkeletonAxis) -> Self {
        self.up_axis = up;
        self
    }

    /// `max_adjust_size` in world units, `adjust_velocity` in units/second.
    #[must_use]
    pub const fn with_limits(mut self, max_adjust_size: f32, adjust_velocity: f32) -> Self {
        self.max_adjust_size = max_adjust_size;
        self.adjust_velocity = adjust_velocity;
        self
    }

    #[must_use]
    pub fn with_root_bone(mut self, name: &str) -> Self {
        self.root = Some(BoneReference::new(name));
        self
    }

    #[must_use]
    pub const fn with_debug_draw(mut self, enabled: bool) -> Self {
        self.debug_draw = enabled;
        self
    }

    /// Latest floor traces, set by the host before each evaluation.
    pub fn set_foot_traces(&mut self, left: FootTrace, right: FootTrace) {
        self.left_trace = left;
        self.right_trace = right;
    }

    /// Offset applied to the pelvis by the last evaluation.
    pub const fn last_offset(&self) -> &Vector3<f32> {
        &self.last_offset
    }

    /// Which rule chose the last evaluation's target.
    pub const fn state(&self) -> PelvisState {
        self.state
    }

    /// Drop the smoothing state, e.g. after a teleport.
    pub fn reset(&mut self) {
        self.last_offset = Vector3::zeros();
        self.state = PelvisState::default();
    }

    fn validate<H: BoneHierarchy + ?Sized>(&self, hierarchy: &H) -> Result<(), EvalError> {
        for bone in [&self.pelvis, &self.left_foot, &self.right_foot]
            .into_iter()
            .chain(self.root.as_ref())
        {
            if !bone.is_valid(hierarchy) {
                return Err(EvalError::BoneNotFound(bone.name.clone()));
            }
        }
        if self.root.is_none() && hierarchy.bone_count() == 0 {
            return Err(EvalError::MissingBone(BoneIndex::ROOT));
        }
        Ok(())
    }

    fn root_index(&self) -> Result<BoneIndex, EvalError> {
        self.root.as_ref().map_or(Ok(BoneIndex::ROOT), BoneReference::require)
    }

    /// Target delta and state for the current traces and pose.
    fn target<P: PoseAccess + ?Sized>(
        &self,
        pose: &P,
        up: &Vector3<f32>,
    ) -> Result<(f32, PelvisState), EvalError> {
        let (Some(left_hit), Some(right_hit)) = (self.left_trace.hit, self.right_trace.hit) else {
            return Ok((0.0, PelvisState::ReturningToCenter));
        };
        let height = |bone: BoneIndex| -> Result<f32, EvalError> {
            Ok(require_component_transform(pose, bone)?.translation.vector.dot(up))
        };
        let root = height(self.root_index()?)?;
        let left = FootHeights {
            foot: height(self.left_foot.require()?)?,
            floor: pose.world_to_component(&left_hit).dot(up),
        };
        let right = FootHeights {
            foot: height(self.right_foot.require()?)?,
            floor: pose.world_to_component(&right_hit).dot(up),
        };
        Ok(target_pelvis_delta(root, left, right, self.max_adjust_size))
    }

    fn draw<P: PoseAccess + ?Sized>(
        &self,
        pose: &P,
        debug: &mut dyn DebugSink,
        pelvis: &Vector3<f32>,
        target_offset: &Vector3<f32>,
    ) {
        let pelvis_world = pose.component_to_world_point(pelvis);
        let target_world = pose.component_to_world_point(&(pelvis + target_offset));
        debug.draw_sphere(pelvis_world, DEBUG_SPHERE_RADIUS, Color::CYAN);
        let target_color = match self.state {
            PelvisState::TrackingFloor => Color::BLUE,
            PelvisState::ReturningToCenter => Color::YELLOW,
        };
        debug.draw_sphere(target_world, DEBUG_SPHERE_RADIUS, target_color);
        if let Some(hit) = self.left_trace.hit {
            debug.draw_sphere(hit, DEBUG_SPHERE_RADIUS, Color::GREEN);
        }
        if let Some(hit) = self.right_trace.hit {
            debug.draw_sphere(hit, DEBUG_SPHERE_RADIUS, Color::RED);
        }
    }
}

impl SkeletalControl for HumanoidPelvisHeightAdjustment {
    fn debug_label(&self) -> &str {
        &self.label
    }

    fn initialize_bone_references(&mut self, hierarchy: &dyn BoneHierarchy) {
        for bone in [&mut self.pelvis, &mut self.left_foot, &mut self.right_foot]
            .into_iter()
            .chain(self.root.as_mut())
        {
            if !bone.initialize(hierarchy) {
                tracing::warn!(node = %self.label, bone = %bone.name, "could not initialize pelvis adjustment bone");
            }
        }
    }

    fn check_valid(&self, hierarchy: &dyn BoneHierarchy) -> Result<(), EvalError> {
        self.validate(hierarchy)
    }

    fn try_evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<Vec<BoneTransform>, EvalError> {
        let pose = ctx.pose;
        self.validate(pose)?;
        if ctx.delta_time < 0.0 || !ctx.delta_time.is_finite() {
            return Err(EvalError::InvalidDeltaTime(ctx.delta_time));
        }

        let up = self.up_axis.vector();
        let (delta, state) = self.target(pose, &up)?;
        let target_offset = up * delta;
        let offset = smooth_offset(&self.last_offset, &target_offset, self.adjust_velocity * ctx.delta_time);
        self.last_offset = offset;
        self.state = state;
        tracing::trace!(node = %self.label, delta, ?state, offset = offset.dot(&up), "pelvis height adjusted");

        let pelvis_bone = self.pelvis.require()?;
        let mut pelvis = require_component_transform(pose, pelvis_bone)?;
        if self.debug_draw {
            self.draw(pose, ctx.debug, &pelvis.translation.vector, &target_offset);
        }
        pelvis.translation.vector += offset;
        Ok(vec![BoneTransform::new(pelvis_bone, pelvis)])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
