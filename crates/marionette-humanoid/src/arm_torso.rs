//! Arm reach assisted by bending and twisting the torso.
//!
//! The arm chain is prefixed with two virtual links: a pivot (from a socket
//! on the spine) and a neck (directly above the pivot, at shoulder height).
//! The pivot→neck segment carries a pitch limit about the skeleton's lateral
//! axis; the neck→shoulder segment carries a twist limit about the current
//! spine direction. One FABRIK solve then moves spine and arm together.

use nalgebra::{Isometry3, Vector3};

use marionette_core::config::{ArmTorsoConfig, PlanarSetup};
use marionette_core::debug::{draw_chain, Color};
use marionette_core::pose::require_component_transform;
use marionette_core::{
    BoneHierarchy, BoneReference, BoneTransform, EvalContext, EvalError, PoseAccess,
    SkeletalControl, SkeletonAxis,
};
use marionette_ik::geometry::DEGENERATE_LENGTH;
use marionette_ik::{ChainLink, FabrikConfig, FabrikSolver, IkChain, IkChainDef, PlanarRotation};

/// Tolerance on `|forward × up| = 1`.
const AXIS_TOLERANCE: f32 = 1e-3;

// ---------------------------------------------------------------------------
// Skeleton axes
// ---------------------------------------------------------------------------

/// Component-space reference axes of the skeleton.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonAxes {
    pub forward: Vector3<f32>,
    pub up: Vector3<f32>,
    /// `forward × up`.
    pub left: Vector3<f32>,
}

impl SkeletonAxes {
    /// Fails with [`EvalError::DegenerateAxes`] unless `forward` and `up` are
    /// orthogonal unit vectors.
    pub fn new(forward: Vector3<f32>, up: Vector3<f32>) -> Result<Self, EvalError> {
        let left = forward.cross(&up);
        if (left.norm() - 1.0).abs() > AXIS_TOLERANCE {
            return Err(EvalError::DegenerateAxes);
        }
        Ok(Self { forward, up, left })
    }

    pub fn from_config(forward: SkeletonAxis, up: SkeletonAxis) -> Result<Self, EvalError> {
        Self::new(forward.vector(), up.vector())
    }
}

// ---------------------------------------------------------------------------
// Torso limits
// ---------------------------------------------------------------------------

/// Configured torso range of motion, in degrees. Bend limits are measured
/// at the waist bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoLimits {
    pub max_forward_bend_degrees: f32,
    pub max_backward_bend_degrees: f32,
    pub max_forward_twist_degrees: f32,
    pub max_backward_twist_degrees: f32,
}

impl Default for TorsoLimits {
    fn default() -> Self {
        Self {
            max_forward_bend_degrees: 30.0,
            max_backward_bend_degrees: 10.0,
            max_forward_twist_degrees: 30.0,
            max_backward_twist_degrees: 30.0,
        }
    }
}

impl From<&ArmTorsoConfig> for TorsoLimits {
    fn from(config: &ArmTorsoConfig) -> Self {
        Self {
            max_forward_bend_degrees: config.max_forward_bend_degrees,
            max_backward_bend_degrees: config.max_backward_bend_degrees,
            max_forward_twist_degrees: config.max_forward_twist_degrees,
            max_backward_twist_degrees: config.max_backward_twist_degrees,
        }
    }
}

/// Re-express a bend angle measured at the waist as the angle at the pivot
/// that moves the neck by the same amount:
/// `atan(tan(degrees) * neck_to_waist / neck_to_pivot)`.
pub fn bend_at_pivot(degrees: f32, neck_to_waist: f32, neck_to_pivot: f32) -> f32 {
    (degrees.to_radians().tan() * neck_to_waist / neck_to_pivot)
        .atan()
        .to_degrees()
}

/// Forward/backward bend limit for the pivot→neck segment.
pub fn torso_pitch_constraint(
    axes: &SkeletonAxes,
    limits: &TorsoLimits,
    pivot: &Vector3<f32>,
    neck: &Vector3<f32>,
    waist: &Vector3<f32>,
) -> Result<PlanarRotation, EvalError> {
    let neck_to_pivot = (neck - pivot).norm();
    if neck_to_pivot <= DEGENERATE_LENGTH {
        return Err(EvalError::DegenerateSpine);
    }
    let neck_to_waist = (neck - waist).norm();

    let forward = bend_at_pivot(limits.max_forward_bend_degrees, neck_to_waist, neck_to_pivot);
    let backward = bend_at_pivot(limits.max_backward_bend_degrees, neck_to_waist, neck_to_pivot);
    Ok(PlanarRotation::new(-axes.left, axes.up, -backward, forward))
}

/// Twist limit for the neck→shoulder segment. The axis follows the
/// pivot→neck segment on every pass.
pub fn torso_twist_constraint(axes: &SkeletonAxes, limits: &TorsoLimits) -> PlanarRotation {
    PlanarRotation::new(
        -axes.up,
        -axes.left,
        -limits.max_backward_twist_degrees,
        limits.max_forward_twist_degrees,
    )
    .with_setup(PlanarSetup::AxisFromParentSegment)
}

// ---------------------------------------------------------------------------
// HumanoidArmTorsoAdjust
// ---------------------------------------------------------------------------

/// Bends and twists the torso so an arm can reach a world-space target.
#[derive(Debug, Clone)]
pub struct HumanoidArmTorsoAdjust {
    label: String,
    arm: IkChainDef,
    waist: BoneReference,
    torso_pivot_socket: String,
    forward_axis: SkeletonAxis,
    up_axis: SkeletonAxis,
    limits: TorsoLimits,
    solver: FabrikSolver,
    debug_draw: bool,
    effector_world_target: Vector3<f32>,
}

impl HumanoidArmTorsoAdjust {
    /// Create a node for `arm` (shoulder to hand), bending at the socket
    /// `torso_pivot_socket` with bend limits measured at `waist_bone`.
    pub fn new(
        label: impl Into<String>,
        arm: IkChainDef,
        waist_bone: &str,
        torso_pivot_socket: &str,
    ) -> Self {
        Self {
            label: label.into(),
            arm,
            waist: BoneReference::new(waist_bone),
            torso_pivot_socket: torso_pivot_socket.to_owned(),
            forward_axis: SkeletonAxis::Y,
            up_axis: SkeletonAxis::Z,
            limits: TorsoLimits::default(),
            solver: FabrikSolver::default(),
            debug_draw: false,
            effector_world_target: Vector3::zeros(),
        }
    }

    /// Build a node from its TOML configuration.
    pub fn from_config(label: impl Into<String>, config: &ArmTorsoConfig) -> Self {
        Self::new(
            label,
            IkChainDef::from_config(&config.arm),
            &config.waist_bone,
            &config.torso_pivot_socket,
        )
        .with_axes(config.forward_axis, config.up_axis)
        .with_limits(TorsoLimits::from(config))
        .with_solver(FabrikConfig::from(config.solver))
        .with_debug_draw(config.debug_draw)
    }

    #[must_use]
    pub const fn with_axes(mut self, forward: SkeletonAxis, up: SkeletonAxis) -> Self {
        self.forward_axis = forward;
        self.up_axis = up;
        self
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: TorsoLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn with_solver(mut self, config: FabrikConfig) -> Self {
        self.solver = FabrikSolver::new(config);
        self
    }

    #[must_use]
    pub const fn with_debug_draw(mut self, enabled: bool) -> Self {
        self.debug_draw = enabled;
        self
    }

    /// World-space location the arm's effector should reach.
    pub fn set_effector_world_target(&mut self, target: Vector3<f32>) {
        self.effector_world_target = target;
    }

    /// Configured torso range of motion.
    pub const fn limits(&self) -> &TorsoLimits {
        &self.limits
    }

    fn validate<H: BoneHierarchy + ?Sized>(&self, hierarchy: &H) -> Result<(), EvalError> {
        if self.arm.is_empty() {
            return Err(EvalError::ChainTooShort { len: 0, min: 1 });
        }
        let precision = self.solver.config().precision;
        if precision <= 0.0 || !precision.is_finite() {
            return Err(EvalError::InvalidPrecision(precision));
        }
        self.arm.check_valid(hierarchy)?;
        if !self.waist.is_valid(hierarchy) {
            return Err(EvalError::BoneNotFound(self.waist.name.clone()));
        }
        Ok(())
    }

    /// Pivot and neck links followed by the arm, all in component space.
    fn build_chain<P: PoseAccess + ?Sized>(
        &self,
        pose: &P,
        axes: &SkeletonAxes,
    ) -> Result<IkChain, EvalError> {
        let pivot_world = pose
            .socket_location(&self.torso_pivot_socket)
            .ok_or_else(|| EvalError::SocketNotFound(self.torso_pivot_socket.clone()))?;
        let pivot = pose.world_to_component(&pivot_world);

        let shoulder_bone = self
            .arm
            .bones()
            .first()
            .ok_or(EvalError::ChainTooShort { len: 0, min: 1 })?
            .reference
            .require()?;
        let shoulder = require_component_transform(pose, shoulder_bone)?.translation.vector;
        let neck = pivot + axes.up * (shoulder - pivot).dot(&axes.up);

        let waist = require_component_transform(pose, self.waist.require()?)?.translation.vector;
        let pitch = torso_pitch_constraint(axes, &self.limits, &pivot, &neck, &waist)?;
        let twist = torso_twist_constraint(axes, &self.limits);

        let mut chain = IkChain::with_capacity(self.arm.len() + 2);
        chain.push(ChainLink::virtual_link(Isometry3::translation(pivot.x, pivot.y, pivot.z), pitch.into()));
        chain.push(ChainLink::virtual_link(Isometry3::translation(neck.x, neck.y, neck.z), twist.into()));
        chain.extend_from_pose(pose, &self.arm)?;
        Ok(chain)
    }

    fn draw_axes(&self, ctx: &mut EvalContext<'_>, axes: &SkeletonAxes) {
        let to_world = ctx.pose.component_to_world();
        let base = to_world.translation.vector;
        ctx.debug
            .draw_vector(base, to_world.rotation * axes.forward, Color::RED);
        ctx.debug
            .draw_vector(base, to_world.rotation * axes.left, Color::GREEN);
        ctx.debug
            .draw_vector(base, to_world.rotation * axes.up, Color::BLUE);
    }
}

impl SkeletalControl for HumanoidArmTorsoAdjust {
    fn debug_label(&self) -> &str {
        &self.label
    }

    fn initialize_bone_references(&mut self, hierarchy: &dyn BoneHierarchy) {
        if !self.arm.init_bone_references(hierarchy) {
            tracing::warn!(node = %self.label, "could not initialize arm chain");
            return;
        }
        if !self.waist.initialize(hierarchy) {
            tracing::warn!(node = %self.label, bone = %self.waist.name, "could not initialize waist bone");
        }
    }

    fn check_valid(&self, hierarchy: &dyn BoneHierarchy) -> Result<(), EvalError> {
        self.validate(hierarchy)
    }

    fn try_evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<Vec<BoneTransform>, EvalError> {
        let pose = ctx.pose;
        self.validate(pose)?;
        let axes = SkeletonAxes::from_config(self.forward_axis, self.up_axis)?;

        let mut chain = self.build_chain(pose, &axes)?;
        let before = chain.positions();
        let target = pose.world_to_component(&self.effector_world_target);
        let result = chain.solve(&self.solver, &target, ctx.debug);

        if self.debug_draw {
            let to_world = pose.component_to_world();
            draw_chain(ctx.debug, &to_world, &before, Color::YELLOW);
            draw_chain(ctx.debug, &to_world, &chain.positions(), Color::CYAN);
            self.draw_axes(ctx, &axes);
        }

        if !result.changed {
            return Ok(Vec::new());
        }
        Ok(chain.bone_transforms())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axes() -> SkeletonAxes {
        SkeletonAxes::from_config(SkeletonAxis::Y, SkeletonAxis::Z).unwrap()
    }

    #[test]
    fn left_axis_is_forward_cross_up() {
        assert_relative_eq!(axes().left, Vector3::x());
    }

    #[test]
    fn parallel_axes_are_degenerate() {
        assert_eq!(
            SkeletonAxes::from_config(SkeletonAxis::Z, SkeletonAxis::NegZ),
            Err(EvalError::DegenerateAxes)
        );
        assert_eq!(
            SkeletonAxes::new(Vector3::new(0.0, 2.0, 0.0), Vector3::z()),
            Err(EvalError::DegenerateAxes)
        );
    }

    #[test]
    fn bend_at_pivot_scales_by_spine_ratio() {
        // Equal distances leave the angle unchanged.
        assert_relative_eq!(bend_at_pivot(30.0, 40.0, 40.0), 30.0, epsilon = 1e-4);
        // Waist further from the neck than the pivot: larger angle at the pivot.
        let expected = (30f32.to_radians().tan() * 1.25).atan().to_degrees();
        assert_relative_eq!(bend_at_pivot(30.0, 50.0, 40.0), expected, epsilon = 1e-4);
        assert!(bend_at_pivot(30.0, 50.0, 40.0) > 30.0);
        assert_relative_eq!(bend_at_pivot(0.0, 50.0, 40.0), 0.0);
    }

    #[test]
    fn pitch_constraint_uses_lateral_axis_and_up() {
        let pivot = Vector3::new(0.0, 0.0, 110.0);
        let neck = Vector3::new(0.0, 0.0, 150.0);
        let waist = Vector3::new(0.0, 0.0, 100.0);
        let c = torso_pitch_constraint(&axes(), &TorsoLimits::default(), &pivot, &neck, &waist).unwrap();

        assert_relative_eq!(c.axis, -Vector3::x());
        assert_relative_eq!(c.forward, Vector3::z());
        assert_relative_eq!(c.failsafe, Vector3::z());
        assert_relative_eq!(c.max_degrees, bend_at_pivot(30.0, 50.0, 40.0), epsilon = 1e-4);
        assert_relative_eq!(c.min_degrees, -bend_at_pivot(10.0, 50.0, 40.0), epsilon = 1e-4);
        // Positive pitch leans toward the skeleton's forward axis.
        assert!(c.angle_of(&Vector3::new(0.0, 1.0, 1.0)).unwrap() > 0.0);
    }

    #[test]
    fn pitch_constraint_rejects_collapsed_spine() {
        let p = Vector3::new(0.0, 0.0, 100.0);
        let err = torso_pitch_constraint(&axes(), &TorsoLimits::default(), &p, &p, &Vector3::zeros());
        assert_eq!(err, Err(EvalError::DegenerateSpine));
    }

    #[test]
    fn twist_constraint_follows_spine() {
        let limits = TorsoLimits {
            max_forward_twist_degrees: 20.0,
            max_backward_twist_degrees: 45.0,
            ..TorsoLimits::default()
        };
        let c = torso_twist_constraint(&axes(), &limits);
        assert_eq!(c.setup, PlanarSetup::AxisFromParentSegment);
        assert_relative_eq!(c.forward, -Vector3::x());
        assert_relative_eq!(c.failsafe, -Vector3::x());
        assert_relative_eq!(c.min_degrees, -45.0);
        assert_relative_eq!(c.max_degrees, 20.0);
    }

    #[test]
    fn limits_from_config() {
        let config = ArmTorsoConfig {
            max_forward_bend_degrees: 40.0,
            max_backward_twist_degrees: 15.0,
            ..ArmTorsoConfig::default()
        };
        let limits = TorsoLimits::from(&config);
        assert_relative_eq!(limits.max_forward_bend_degrees, 40.0);
        assert_relative_eq!(limits.max_backward_bend_degrees, 10.0);
        assert_relative_eq!(limits.max_backward_twist_degrees, 15.0);
    }
}
