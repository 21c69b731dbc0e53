//! Humanoid skeletal controls built on the Marionette IK crates.
//!
//! - [`HumanoidArmTorsoAdjust`] extends an arm chain with a virtual spine so
//!   the torso bends and twists to help the hand reach its target.
//! - [`HumanoidPelvisHeightAdjustment`] lowers the pelvis over uneven floor
//!   contact under the two feet, rate-limited over time.

pub mod arm_torso;
pub mod pelvis;

pub use arm_torso::{
    bend_at_pivot, torso_pitch_constraint, torso_twist_constraint, HumanoidArmTorsoAdjust,
    SkeletonAxes, TorsoLimits,
};
pub use pelvis::{
    smooth_offset, target_pelvis_delta, FootHeights, FootTrace, HumanoidPelvisHeightAdjustment,
    PelvisState,
};
