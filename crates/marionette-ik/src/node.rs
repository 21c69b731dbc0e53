//! Generic range-limited FABRIK skeletal control.

use nalgebra::{Isometry3, Vector3};

use marionette_core::config::{FabrikNodeConfig, TipRotationPolicy, TransformSpace};
use marionette_core::debug::{draw_chain, Color};
use marionette_core::pose::require_component_transform;
use marionette_core::{
    BoneHierarchy, BoneReference, BoneTransform, EvalContext, EvalError, PoseAccess,
    SkeletalControl,
};

use crate::chain::{IkChain, IkChainDef, MIN_CHAIN_LINKS};
use crate::solver::{FabrikConfig, FabrikSolver};

/// Drives the tip of a bone chain toward an effector target.
///
/// The effector is a transform in a selectable frame; it is converted to
/// component space every evaluation. The tip bone's orientation after the
/// solve follows [`TipRotationPolicy`].
#[derive(Debug, Clone)]
pub struct RangeLimitedFabrik {
    label: String,
    chain: IkChainDef,
    effector_transform: Isometry3<f32>,
    effector_space: TransformSpace,
    /// Bone the bone-relative spaces are measured from.
    effector_bone: BoneReference,
    tip_rotation: TipRotationPolicy,
    solver: FabrikSolver,
    debug_draw: bool,
    cached_effector: Isometry3<f32>,
}

impl RangeLimitedFabrik {
    /// Create a node for `chain` with a component-space identity effector.
    pub fn new(label: impl Into<String>, chain: IkChainDef) -> Self {
        let effector_bone = chain.tip().cloned().unwrap_or_default();
        Self {
            label: label.into(),
            chain,
            effector_transform: Isometry3::identity(),
            effector_space: TransformSpace::default(),
            effector_bone,
            tip_rotation: TipRotationPolicy::default(),
            solver: FabrikSolver::default(),
            debug_draw: false,
            cached_effector: Isometry3::identity(),
        }
    }

    /// Build a node from its TOML configuration.
    pub fn from_config(label: impl Into<String>, config: &FabrikNodeConfig) -> Self {
        let mut node = Self::new(label, IkChainDef::from_config(&config.chain))
            .with_effector(config.effector.transform(), config.effector.space)
            .with_tip_rotation(config.tip_rotation)
            .with_solver(FabrikConfig::from(config.solver))
            .with_debug_draw(config.debug_draw);
        if let Some(bone) = &config.effector.bone {
            node.effector_bone = BoneReference::new(bone.as_str());
        }
        node
    }

    #[must_use]
    pub const fn with_effector(mut self, transform: Isometry3<f32>, space: TransformSpace) -> Self {
        self.effector_transform = transform;
        self.effector_space = space;
        self
    }

    #[must_use]
    pub const fn with_tip_rotation(mut self, policy: TipRotationPolicy) -> Self {
        self.tip_rotation = policy;
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

    /// Bone the `BoneSpace`/`ParentBoneSpace` frames refer to.
    #[must_use]
    pub fn with_effector_bone(mut self, name: &str) -> Self {
        self.effector_bone = BoneReference::new(name);
        self
    }

    /// Update the effector target, typically once per frame.
    pub fn set_effector_transform(&mut self, transform: Isometry3<f32>) {
        self.effector_transform = transform;
    }

    pub fn set_effector_location(&mut self, location: Vector3<f32>) {
        self.effector_transform.translation.vector = location;
    }

    /// The configured chain.
    pub const fn chain(&self) -> &IkChainDef {
        &self.chain
    }

    /// Component-space effector transform used by the last evaluation.
    pub const fn cached_effector_transform(&self) -> &Isometry3<f32> {
        &self.cached_effector
    }

    fn validate<H: BoneHierarchy + ?Sized>(&self, hierarchy: &H) -> Result<(), EvalError> {
        if self.chain.len() < MIN_CHAIN_LINKS {
            return Err(EvalError::ChainTooShort {
                len: self.chain.len(),
                min: MIN_CHAIN_LINKS,
            });
        }
        let precision = self.solver.config().precision;
        if precision <= 0.0 || !precision.is_finite() {
            return Err(EvalError::InvalidPrecision(precision));
        }
        self.chain.check_valid(hierarchy)?;
        if self.uses_effector_bone() && !self.effector_bone.is_valid(hierarchy) {
            return Err(EvalError::BoneNotFound(self.effector_bone.name.clone()));
        }
        Ok(())
    }

    const fn uses_effector_bone(&self) -> bool {
        matches!(
            self.effector_space,
            TransformSpace::BoneSpace | TransformSpace::ParentBoneSpace
        )
    }

    /// The effector target in component space.
    fn effector_in_component_space<P: PoseAccess + ?Sized>(
        &self,
        pose: &P,
    ) -> Result<Isometry3<f32>, EvalError> {
        let target = self.effector_transform;
        Ok(match self.effector_space {
            TransformSpace::Component => target,
            TransformSpace::World => pose.component_to_world().inverse() * target,
            TransformSpace::BoneSpace => {
                let bone = self.effector_bone.require()?;
                require_component_transform(pose, bone)? * target
            }
            TransformSpace::ParentBoneSpace => {
                let bone = self.effector_bone.require()?;
                match pose.parent(bone) {
                    Some(parent) => require_component_transform(pose, parent)? * target,
                    None => target,
                }
            }
        })
    }

    /// Apply the tip rotation policy to the solved chain.
    fn orient_tip<P: PoseAccess + ?Sized>(
        &self,
        pose: &P,
        transforms: &mut [BoneTransform],
    ) -> Result<(), EvalError> {
        let [.., parent, tip] = transforms else {
            return Ok(());
        };
        match self.tip_rotation {
            TipRotationPolicy::KeepLocalSpaceRotation => {
                let local = pose
                    .local_transform(tip.bone)
                    .ok_or(EvalError::MissingBone(tip.bone))?;
                tip.transform = parent.transform * local;
            }
            TipRotationPolicy::CopyFromTarget => {
                tip.transform.rotation = self.cached_effector.rotation;
            }
            TipRotationPolicy::KeepComponentSpaceRotation => {}
        }
        Ok(())
    }
}

impl SkeletalControl for RangeLimitedFabrik {
    fn debug_label(&self) -> &str {
        &self.label
    }

    fn initialize_bone_references(&mut self, hierarchy: &dyn BoneHierarchy) {
        self.chain.init_bone_references(hierarchy);
        if !self.effector_bone.name.is_empty() && !self.effector_bone.initialize(hierarchy) {
            tracing::warn!(
                node = %self.label,
                bone = %self.effector_bone.name,
                "could not resolve effector bone"
            );
        }
    }

    fn check_valid(&self, hierarchy: &dyn BoneHierarchy) -> Result<(), EvalError> {
        self.validate(hierarchy)
    }

    fn try_evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<Vec<BoneTransform>, EvalError> {
        let pose = ctx.pose;
        self.validate(pose)?;

        self.cached_effector = self.effector_in_component_space(pose)?;
        let mut chain = IkChain::from_pose(pose, &self.chain)?;
        let before = chain.positions();

        let target = self.cached_effector.translation.vector;
        let result = chain.solve(&self.solver, &target, ctx.debug);
        if !result.changed {
            return Ok(Vec::new());
        }

        if self.debug_draw {
            let to_world = pose.component_to_world();
            draw_chain(ctx.debug, &to_world, &before, Color::YELLOW);
            draw_chain(ctx.debug, &to_world, &chain.positions(), Color::CYAN);
            ctx.debug
                .draw_sphere(pose.component_to_world_point(&target), 3.0, Color::RED);
        }

        let mut transforms = chain.bone_transforms();
        self.orient_tip(pose, &mut transforms)?;
        Ok(transforms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marionette_core::config::{ChainBoneConfig, EffectorConfig, SolverConfig};
    use marionette_core::debug::NoopSink;
    use marionette_core::BoneIndex;
    use marionette_test_utils::{MockSkeleton, RecordingSink};
    use nalgebra::{Translation3, UnitQuaternion};

    fn at(x: f32, y: f32, z: f32) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
    }

    /// root at origin; three 10-unit arm segments bent in the XY plane.
    fn skeleton() -> MockSkeleton {
        let mut s = MockSkeleton::new();
        let root = s.add_root("root", at(0.0, 0.0, 0.0));
        let upper = s.add_bone("upperarm", root, at(0.0, 0.0, 0.0));
        let lower = s.add_bone("lowerarm", upper, at(10.0, 0.0, 0.0));
        let hand = s.add_bone("hand", lower, at(0.0, 10.0, 0.0));
        s.add_bone("finger", hand, at(10.0, 0.0, 0.0));
        s
    }

    fn node() -> RangeLimitedFabrik {
        let config = FabrikNodeConfig {
            chain: ["upperarm", "lowerarm", "hand", "finger"]
                .into_iter()
                .map(ChainBoneConfig::new)
                .collect(),
            solver: SolverConfig {
                precision: 0.01,
                max_iterations: 50,
            },
            ..FabrikNodeConfig::default()
        };
        RangeLimitedFabrik::from_config("arm_ik", &config)
    }

    fn evaluate(
        node: &mut RangeLimitedFabrik,
        skeleton: &MockSkeleton,
    ) -> Result<Vec<BoneTransform>, EvalError> {
        let mut sink = NoopSink;
        let mut ctx = EvalContext::new(skeleton, 0.016, &mut sink);
        node.try_evaluate(&mut ctx)
    }

    #[test]
    fn unresolved_node_is_invalid() {
        let skeleton = skeleton();
        let n = node();
        assert!(!n.is_valid_to_evaluate(&skeleton));
    }

    #[test]
    fn short_chain_is_invalid() {
        let skeleton = skeleton();
        let mut def = IkChainDef::default();
        def.push("hand", Default::default());
        let mut n = RangeLimitedFabrik::new("short", def);
        n.initialize_bone_references(&skeleton);
        assert_eq!(
            n.check_valid(&skeleton),
            Err(EvalError::ChainTooShort { len: 1, min: 2 })
        );
    }

    #[test]
    fn evaluate_reaches_component_target() {
        let skeleton = skeleton();
        let mut n = node();
        n.initialize_bone_references(&skeleton);
        n.set_effector_location(Vector3::new(25.0, 0.0, 0.0));

        let out = evaluate(&mut n, &skeleton).unwrap();
        assert_eq!(out.len(), 4);
        let tip = out[3].transform.translation.vector;
        assert!((tip - Vector3::new(25.0, 0.0, 0.0)).norm() <= 0.01);
        assert_relative_eq!(out[0].transform.translation.vector, Vector3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn satisfied_target_writes_nothing() {
        let skeleton = skeleton();
        let mut n = node();
        n.initialize_bone_references(&skeleton);
        n.set_effector_location(Vector3::new(20.0, 10.0, 0.0));
        assert!(evaluate(&mut n, &skeleton).unwrap().is_empty());
    }

    #[test]
    fn world_space_effector_is_converted() {
        let mut skeleton = skeleton();
        skeleton.set_component_to_world(at(100.0, 0.0, 0.0));
        let mut n = node().with_effector(at(125.0, 0.0, 0.0), TransformSpace::World);
        n.initialize_bone_references(&skeleton);

        evaluate(&mut n, &skeleton).unwrap();
        assert_relative_eq!(
            n.cached_effector_transform().translation.vector,
            Vector3::new(25.0, 0.0, 0.0),
            epsilon = 1e-4
        );
    }

    #[test]
    fn bone_space_effector_is_relative_to_bone() {
        let skeleton = skeleton();
        let mut n = node()
            .with_effector(at(0.0, -5.0, 0.0), TransformSpace::BoneSpace)
            .with_effector_bone("hand");
        n.initialize_bone_references(&skeleton);

        evaluate(&mut n, &skeleton).unwrap();
        assert_relative_eq!(
            n.cached_effector_transform().translation.vector,
            Vector3::new(10.0, 5.0, 0.0),
            epsilon = 1e-4
        );
    }

    #[test]
    fn parent_bone_space_defaults_to_tip_parent() {
        let skeleton = skeleton();
        let mut n = node().with_effector(at(0.0, 0.0, 5.0), TransformSpace::ParentBoneSpace);
        n.initialize_bone_references(&skeleton);

        evaluate(&mut n, &skeleton).unwrap();
        // Tip is "finger"; its parent "hand" sits at (10, 10, 0).
        assert_relative_eq!(
            n.cached_effector_transform().translation.vector,
            Vector3::new(10.0, 10.0, 5.0),
            epsilon = 1e-4
        );
    }

    #[test]
    fn copy_from_target_sets_tip_rotation() {
        let skeleton = skeleton();
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.7);
        let target = Isometry3::from_parts(Translation3::new(25.0, 0.0, 0.0), rotation);
        let mut n = node()
            .with_effector(target, TransformSpace::Component)
            .with_tip_rotation(TipRotationPolicy::CopyFromTarget);
        n.initialize_bone_references(&skeleton);

        let out = evaluate(&mut n, &skeleton).unwrap();
        assert_relative_eq!(out[3].transform.rotation.angle_to(&rotation), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn keep_local_rotation_follows_parent() {
        let skeleton = skeleton();
        let mut n = node();
        n.initialize_bone_references(&skeleton);
        n.set_effector_location(Vector3::new(25.0, 0.0, 0.0));

        let out = evaluate(&mut n, &skeleton).unwrap();
        let local = skeleton.local_transform(BoneIndex(4)).unwrap();
        let expected = out[2].transform * local;
        assert_relative_eq!(out[3].transform.rotation.angle_to(&expected.rotation), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn keep_component_rotation_leaves_tip_orientation() {
        let skeleton = skeleton();
        let mut n = node().with_tip_rotation(TipRotationPolicy::KeepComponentSpaceRotation);
        n.initialize_bone_references(&skeleton);
        n.set_effector_location(Vector3::new(25.0, 0.0, 0.0));

        let out = evaluate(&mut n, &skeleton).unwrap();
        assert_relative_eq!(out[3].transform.rotation.angle(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn debug_draw_records_before_and_after() {
        let skeleton = skeleton();
        let mut n = node().with_debug_draw(true);
        n.initialize_bone_references(&skeleton);
        n.set_effector_location(Vector3::new(25.0, 0.0, 0.0));

        let mut sink = RecordingSink::default();
        let mut ctx = EvalContext::new(&skeleton, 0.016, &mut sink);
        n.try_evaluate(&mut ctx).unwrap();

        assert_eq!(sink.lines_with(Color::YELLOW), 3);
        assert_eq!(sink.lines_with(Color::CYAN), 3);
        assert_eq!(sink.snapshot_labels(), ["fabrik_before", "fabrik_after"]);
    }

    #[test]
    fn evaluate_logs_and_passes_through_on_error() {
        let skeleton = skeleton();
        let mut n = node();
        let mut sink = NoopSink;
        let mut ctx = EvalContext::new(&skeleton, 0.016, &mut sink);
        assert!(n.evaluate(&mut ctx).is_empty());
    }

    #[test]
    fn effector_config_bone_overrides_tip() {
        let config = FabrikNodeConfig {
            chain: vec![ChainBoneConfig::new("upperarm"), ChainBoneConfig::new("hand")],
            effector: EffectorConfig {
                space: TransformSpace::BoneSpace,
                bone: Some("root".into()),
                ..EffectorConfig::default()
            },
            ..FabrikNodeConfig::default()
        };
        let skeleton = skeleton();
        let mut n = RangeLimitedFabrik::from_config("cfg", &config);
        n.initialize_bone_references(&skeleton);
        assert!(n.is_valid_to_evaluate(&skeleton));
    }
}
