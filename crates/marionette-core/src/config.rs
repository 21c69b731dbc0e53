use std::path::Path;

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::SkeletonAxis;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_precision() -> f32 {
    1.0
}
const fn default_max_iterations() -> u32 {
    10
}
const fn default_orientation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}
const fn default_true() -> bool {
    true
}
const fn default_forward_axis() -> SkeletonAxis {
    SkeletonAxis::Y
}
const fn default_up_axis() -> SkeletonAxis {
    SkeletonAxis::Z
}
const fn default_forward_bend_degrees() -> f32 {
    30.0
}
const fn default_backward_bend_degrees() -> f32 {
    10.0
}
const fn default_twist_degrees() -> f32 {
    30.0
}
const fn default_max_pelvis_adjust_size() -> f32 {
    50.0
}
const fn default_pelvis_adjust_velocity() -> f32 {
    150.0
}

/// Bend angles are converted through `tan`, so they must stay below 90°.
const MAX_BEND_DEGREES: f32 = 90.0;

// ---------------------------------------------------------------------------
// SolverConfig
// ---------------------------------------------------------------------------

/// FABRIK iteration control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Effector-to-target distance at which the solve is accepted (world units).
    #[serde(default = "default_precision")]
    pub precision: f32,

    /// Upper bound on forward/backward iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.precision <= 0.0 || !self.precision.is_finite() {
            return Err(ConfigError::InvalidPrecision(self.precision));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConstraintConfig
// ---------------------------------------------------------------------------

/// How a planar constraint refreshes its rotation axis before each use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanarSetup {
    /// The configured axis is used as-is.
    #[default]
    Fixed,
    /// The axis is the negated direction of the parent segment (link `i - 1`
    /// to link `i`), recomputed from the working chain on every pass.
    AxisFromParentSegment,
}

/// Rotation limit attached to one chain bone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintConfig {
    #[default]
    Unconstrained,
    Planar {
        axis: [f32; 3],
        forward: [f32; 3],
        /// Used when the constrained direction degenerates. Defaults to `forward`.
        #[serde(default)]
        failsafe: Option<[f32; 3]>,
        min_degrees: f32,
        max_degrees: f32,
        #[serde(default)]
        setup: PlanarSetup,
        #[serde(default = "default_true")]
        enabled: bool,
    },
}

impl ConstraintConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Unconstrained => Ok(()),
            Self::Planar {
                axis,
                forward,
                min_degrees,
                max_degrees,
                ..
            } => {
                if min_degrees > max_degrees {
                    return Err(ConfigError::InvertedInterval {
                        min: *min_degrees,
                        max: *max_degrees,
                    });
                }
                if Vector3::from(*axis).norm() <= f32::EPSILON {
                    return Err(invalid("axis", "must be non-zero"));
                }
                if Vector3::from(*forward).norm() <= f32::EPSILON {
                    return Err(invalid("forward", "must be non-zero"));
                }
                Ok(())
            }
        }
    }
}

/// One bone of an IK chain, root to effector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainBoneConfig {
    pub name: String,
    #[serde(default)]
    pub constraint: ConstraintConfig,
}

impl ChainBoneConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: ConstraintConfig::Unconstrained,
        }
    }

    pub fn with_constraint(mut self, constraint: ConstraintConfig) -> Self {
        self.constraint = constraint;
        self
    }
}

// ---------------------------------------------------------------------------
// Effector target
// ---------------------------------------------------------------------------

/// Frame in which an effector transform is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformSpace {
    World,
    #[default]
    Component,
    /// Relative to the parent of the effector bone.
    ParentBoneSpace,
    /// Relative to the effector bone itself.
    BoneSpace,
}

/// What happens to the tip bone's orientation after a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipRotationPolicy {
    /// Keep the tip's parent-relative rotation.
    #[default]
    KeepLocalSpaceRotation,
    /// Take the orientation of the effector target.
    CopyFromTarget,
    /// Leave the tip's component-space rotation unchanged.
    KeepComponentSpaceRotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectorConfig {
    #[serde(default)]
    pub translation: [f32; 3],
    /// Quaternion as `[x, y, z, w]`.
    #[serde(default = "default_orientation")]
    pub rotation: [f32; 4],
    #[serde(default)]
    pub space: TransformSpace,
    /// Bone the bone-relative spaces refer to. Defaults to the chain tip.
    #[serde(default)]
    pub bone: Option<String>,
}

impl Default for EffectorConfig {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: default_orientation(),
            space: TransformSpace::default(),
            bone: None,
        }
    }
}

impl EffectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [x, y, z, w] = self.rotation;
        if Quaternion::new(w, x, y, z).norm() <= f32::EPSILON {
            return Err(invalid("effector.rotation", "quaternion must be non-zero"));
        }
        Ok(())
    }

    /// The configured transform, expressed in [`Self::space`].
    pub fn transform(&self) -> Isometry3<f32> {
        let [x, y, z, w] = self.rotation;
        Isometry3::from_parts(
            Translation3::from(Vector3::from(self.translation)),
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        )
    }
}

// ---------------------------------------------------------------------------
// Node configs
// ---------------------------------------------------------------------------

/// Range-limited FABRIK node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FabrikNodeConfig {
    /// Chain bones, root to effector.
    pub chain: Vec<ChainBoneConfig>,
    #[serde(default)]
    pub effector: EffectorConfig,
    #[serde(default)]
    pub tip_rotation: TipRotationPolicy,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub debug_draw: bool,
}

impl FabrikNodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.len() < 2 {
            return Err(invalid("chain", "needs at least 2 bones"));
        }
        for bone in &self.chain {
            bone.constraint.validate()?;
        }
        self.effector.validate()?;
        self.solver.validate()
    }
}

/// Humanoid arm/torso adjustment node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmTorsoConfig {
    /// Arm bones, shoulder to hand.
    pub arm: Vec<ChainBoneConfig>,
    pub waist_bone: String,
    pub torso_pivot_socket: String,
    #[serde(default = "default_forward_axis")]
    pub forward_axis: SkeletonAxis,
    #[serde(default = "default_up_axis")]
    pub up_axis: SkeletonAxis,
    /// Measured at the waist bone.
    #[serde(default = "default_forward_bend_degrees")]
    pub max_forward_bend_degrees: f32,
    /// Measured at the waist bone.
    #[serde(default = "default_backward_bend_degrees")]
    pub max_backward_bend_degrees: f32,
    #[serde(default = "default_twist_degrees")]
    pub max_forward_twist_degrees: f32,
    #[serde(default = "default_twist_degrees")]
    pub max_backward_twist_degrees: f32,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub debug_draw: bool,
}

impl Default for ArmTorsoConfig {
    fn default() -> Self {
        Self {
            arm: Vec::new(),
            waist_bone: String::new(),
            torso_pivot_socket: String::new(),
            forward_axis: default_forward_axis(),
            up_axis: default_up_axis(),
            max_forward_bend_degrees: default_forward_bend_degrees(),
            max_backward_bend_degrees: default_backward_bend_degrees(),
            max_forward_twist_degrees: default_twist_degrees(),
            max_backward_twist_degrees: default_twist_degrees(),
            solver: SolverConfig::default(),
            debug_draw: false,
        }
    }
}

impl ArmTorsoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arm.is_empty() {
            return Err(invalid("arm", "needs at least 1 bone"));
        }
        if self.waist_bone.is_empty() {
            return Err(ConfigError::MissingField("waist_bone".into()));
        }
        if self.torso_pivot_socket.is_empty() {
            return Err(ConfigError::MissingField("torso_pivot_socket".into()));
        }
        for bone in &self.arm {
            bone.constraint.validate()?;
        }
        for (field, value) in [
            ("max_forward_bend_degrees", self.max_forward_bend_degrees),
            ("max_backward_bend_degrees", self.max_backward_bend_degrees),
        ] {
            if !(0.0..MAX_BEND_DEGREES).contains(&value) {
                return Err(invalid(field, "must be in [0, 90)"));
            }
        }
        for (field, value) in [
            ("max_forward_twist_degrees", self.max_forward_twist_degrees),
            ("max_backward_twist_degrees", self.max_backward_twist_degrees),
        ] {
            if !(0.0..=180.0).contains(&value) {
                return Err(invalid(field, "must be in [0, 180]"));
            }
        }
        if self
            .forward_axis
            .vector()
            .cross(&self.up_axis.vector())
            .norm()
            < 0.5
        {
            return Err(invalid("up_axis", "must be orthogonal to forward_axis"));
        }
        self.solver.validate()
    }
}

/// Humanoid pelvis height adjustment node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PelvisConfig {
    pub pelvis_bone: String,
    pub left_foot_bone: String,
    pub right_foot_bone: String,
    /// Bone assumed to rest on the floor. Defaults to the skeleton root.
    #[serde(default)]
    pub root_bone: Option<String>,
    #[serde(default = "default_up_axis")]
    pub up_axis: SkeletonAxis,
    #[serde(default = "default_max_pelvis_adjust_size")]
    pub max_pelvis_adjust_size: f32,
    /// World units per second.
    #[serde(default = "default_pelvis_adjust_velocity")]
    pub pelvis_adjust_velocity: f32,
    #[serde(default)]
    pub debug_draw: bool,
}

impl Default for PelvisConfig {
    fn default() -> Self {
        Self {
            pelvis_bone: String::new(),
            left_foot_bone: String::new(),
            right_foot_bone: String::new(),
            root_bone: None,
            up_axis: default_up_axis(),
            max_pelvis_adjust_size: default_max_pelvis_adjust_size(),
            pelvis_adjust_velocity: default_pelvis_adjust_velocity(),
            debug_draw: false,
        }
    }
}

impl PelvisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("pelvis_bone", &self.pelvis_bone),
            ("left_foot_bone", &self.left_foot_bone),
            ("right_foot_bone", &self.right_foot_bone),
        ] {
            if value.is_empty() {
                return Err(ConfigError::MissingField(field.into()));
            }
        }
        if self.max_pelvis_adjust_size < 0.0 {
            return Err(invalid("max_pelvis_adjust_size", "must be >= 0"));
        }
        if self.pelvis_adjust_velocity < 0.0 {
            return Err(invalid("pelvis_adjust_velocity", "must be >= 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RigConfig
// ---------------------------------------------------------------------------

/// All IK nodes of one character, loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    #[serde(default)]
    pub fabrik: Vec<FabrikNodeConfig>,
    #[serde(default)]
    pub arm_torso: Option<ArmTorsoConfig>,
    #[serde(default)]
    pub pelvis: Option<PelvisConfig>,
}

impl RigConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for node in &self.fabrik {
            node.validate()?;
        }
        if let Some(arm_torso) = &self.arm_torso {
            arm_torso.validate()?;
        }
        if let Some(pelvis) = &self.pelvis {
            pelvis.validate()?;
        }
        Ok(())
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ---- SolverConfig ----

    #[test]
    fn solver_config_default_values() {
        let cfg = SolverConfig::default();
        assert!((cfg.precision - 1.0).abs() < f32::EPSILON);
        assert_eq!(cfg.max_iterations, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn solver_config_rejects_zero_precision() {
        let cfg = SolverConfig {
            precision: 0.0,
            ..SolverConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidPrecision(_)
        ));
    }

    #[test]
    fn solver_config_rejects_zero_iterations() {
        let cfg = SolverConfig {
            max_iterations: 0,
            ..SolverConfig::default()
        };
        assert!(matches!(cfg.validate().unwrap_err(), ConfigError::ZeroIterations));
    }

    // ---- ConstraintConfig ----

    #[test]
    fn planar_constraint_rejects_inverted_interval() {
        let cfg = ConstraintConfig::Planar {
            axis: [0.0, 0.0, 1.0],
            forward: [1.0, 0.0, 0.0],
            failsafe: None,
            min_degrees: 20.0,
            max_degrees: -20.0,
            setup: PlanarSetup::Fixed,
            enabled: true,
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvertedInterval { .. }
        ));
    }

    #[test]
    fn planar_constraint_parses_with_defaults() {
        let toml_str = r#"
            name = "lowerarm_r"
            [constraint]
            type = "planar"
            axis = [0.0, 0.0, 1.0]
            forward = [1.0, 0.0, 0.0]
            min_degrees = 0.0
            max_degrees = 140.0
        "#;
        let bone: ChainBoneConfig = toml::from_str(toml_str).unwrap();
        match bone.constraint {
            ConstraintConfig::Planar {
                failsafe,
                setup,
                enabled,
                ..
            } => {
                assert!(failsafe.is_none());
                assert_eq!(setup, PlanarSetup::Fixed);
                assert!(enabled);
            }
            ConstraintConfig::Unconstrained => panic!("expected planar constraint"),
        }
    }

    // ---- EffectorConfig ----

    #[test]
    fn effector_transform_from_parts() {
        let cfg = EffectorConfig {
            translation: [1.0, 2.0, 3.0],
            ..EffectorConfig::default()
        };
        let t = cfg.transform();
        assert_relative_eq!(t.translation.vector, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(t.rotation.angle(), 0.0);
    }

    #[test]
    fn effector_rejects_zero_quaternion() {
        let cfg = EffectorConfig {
            rotation: [0.0; 4],
            ..EffectorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    // ---- Node configs ----

    #[test]
    fn fabrik_node_needs_two_bones() {
        let cfg = FabrikNodeConfig {
            chain: vec![ChainBoneConfig::new("hand_r")],
            ..FabrikNodeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn arm_torso_rejects_right_angle_bend() {
        let cfg = ArmTorsoConfig {
            arm: vec![ChainBoneConfig::new("upperarm_r")],
            waist_bone: "spine_01".into(),
            torso_pivot_socket: "torso_pivot".into(),
            max_forward_bend_degrees: 90.0,
            ..ArmTorsoConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn arm_torso_rejects_parallel_axes() {
        let cfg = ArmTorsoConfig {
            arm: vec![ChainBoneConfig::new("upperarm_r")],
            waist_bone: "spine_01".into(),
            torso_pivot_socket: "torso_pivot".into(),
            forward_axis: SkeletonAxis::Z,
            up_axis: SkeletonAxis::NegZ,
            ..ArmTorsoConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pelvis_requires_bone_names() {
        let err = PelvisConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "pelvis_bone"));
    }

    // ---- RigConfig ----

    #[test]
    fn rig_config_from_toml() {
        let toml_str = r#"
            [[fabrik]]
            tip_rotation = "copy_from_target"
            debug_draw = true
            [[fabrik.chain]]
            name = "upperarm_r"
            [[fabrik.chain]]
            name = "lowerarm_r"
            [[fabrik.chain]]
            name = "hand_r"
            [fabrik.effector]
            translation = [30.0, 0.0, 120.0]
            space = "world"
            [fabrik.solver]
            precision = 0.5
            max_iterations = 25

            [arm_torso]
            waist_bone = "spine_01"
            torso_pivot_socket = "torso_pivot"
            max_forward_bend_degrees = 45.0
            [[arm_torso.arm]]
            name = "upperarm_r"
            [[arm_torso.arm]]
            name = "hand_r"

            [pelvis]
            pelvis_bone = "pelvis"
            left_foot_bone = "foot_l"
            right_foot_bone = "foot_r"
            pelvis_adjust_velocity = 80.0
        "#;
        let cfg = RigConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(cfg.fabrik.len(), 1);
        let fabrik = &cfg.fabrik[0];
        assert_eq!(fabrik.chain.len(), 3);
        assert_eq!(fabrik.tip_rotation, TipRotationPolicy::CopyFromTarget);
        assert_eq!(fabrik.effector.space, TransformSpace::World);
        assert_eq!(fabrik.solver.max_iterations, 25);
        assert!(fabrik.debug_draw);

        let arm_torso = cfg.arm_torso.as_ref().unwrap();
        assert!((arm_torso.max_forward_bend_degrees - 45.0).abs() < f32::EPSILON);
        assert!((arm_torso.max_backward_bend_degrees - 10.0).abs() < f32::EPSILON);
        assert_eq!(arm_torso.up_axis, SkeletonAxis::Z);

        let pelvis = cfg.pelvis.as_ref().unwrap();
        assert!((pelvis.pelvis_adjust_velocity - 80.0).abs() < f32::EPSILON);
        assert!((pelvis.max_pelvis_adjust_size - 50.0).abs() < f32::EPSILON);
        assert!(pelvis.root_bone.is_none());
    }

    #[test]
    fn rig_config_rejects_invalid_node() {
        let toml_str = r#"
            [[fabrik]]
            [[fabrik.chain]]
            name = "hand_r"
        "#;
        assert!(RigConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn rig_config_from_missing_file() {
        let err = RigConfig::from_file("/nonexistent/rig.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn rig_config_roundtrips_through_toml() {
        let cfg = RigConfig {
            pelvis: Some(PelvisConfig {
                pelvis_bone: "pelvis".into(),
                left_foot_bone: "foot_l".into(),
                right_foot_bone: "foot_r".into(),
                ..PelvisConfig::default()
            }),
            ..RigConfig::default()
        };
        let text = toml::to_string(&cfg).unwrap();
        let parsed = RigConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }
}
