//! IK chains: configured bone lists and the per-frame link sequence built
//! from the host pose.
//!
//! An [`IkChainDef`] is resolved against the bone hierarchy once per
//! hierarchy change. Each frame an [`IkChain`] is gathered from the current
//! pose, solved, and discarded.

use nalgebra::{Isometry3, Vector3};

use marionette_core::config::ChainBoneConfig;
use marionette_core::debug::DebugSink;
use marionette_core::pose::require_component_transform;
use marionette_core::{BoneHierarchy, BoneIndex, BoneReference, BoneTransform, EvalError, PoseAccess};

use crate::constraint::BoneConstraint;
use crate::solver::{FabrikResult, FabrikSolver};

/// Fewest links a chain needs to be solvable.
pub const MIN_CHAIN_LINKS: usize = 2;

// ---------------------------------------------------------------------------
// IkChainDef
// ---------------------------------------------------------------------------

/// A configured chain bone.
#[derive(Debug, Clone, PartialEq)]
pub struct IkBoneDef {
    pub reference: BoneReference,
    pub constraint: BoneConstraint,
}

/// Ordered chain bones, root to effector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IkChainDef {
    bones: Vec<IkBoneDef>,
}

impl IkChainDef {
    /// Build an unresolved definition from configured bones.
    pub fn from_config(bones: &[ChainBoneConfig]) -> Self {
        Self {
            bones: bones
                .iter()
                .map(|bone| IkBoneDef {
                    reference: BoneReference::new(bone.name.as_str()),
                    constraint: BoneConstraint::from(&bone.constraint),
                })
                .collect(),
        }
    }

    /// Append a bone past the current tip.
    pub fn push(&mut self, name: &str, constraint: BoneConstraint) {
        self.bones.push(IkBoneDef {
            reference: BoneReference::new(name),
            constraint,
        });
    }

    /// Number of configured bones.
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// Whether no bones are configured.
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Configured bones, root to effector.
    pub fn bones(&self) -> &[IkBoneDef] {
        &self.bones
    }

    /// The effector bone.
    pub fn tip(&self) -> Option<&BoneReference> {
        self.bones.last().map(|b| &b.reference)
    }

    /// Resolve every bone name. Returns `true` if all resolved.
    pub fn init_bone_references<H: BoneHierarchy + ?Sized>(&mut self, hierarchy: &H) -> bool {
        let mut all = true;
        for bone in &mut self.bones {
            if !bone.reference.initialize(hierarchy) {
                tracing::warn!(bone = %bone.reference.name, "could not resolve IK chain bone");
                all = false;
            }
        }
        all
    }

    /// Resolve only the bones that are not currently valid.
    pub fn init_if_invalid<H: BoneHierarchy + ?Sized>(&mut self, hierarchy: &H) -> bool {
        let mut all = true;
        for bone in &mut self.bones {
            all &= bone.reference.init_if_invalid(hierarchy);
        }
        all
    }

    /// Every bone resolved, and each bone descends from the one before it.
    pub fn check_valid<H: BoneHierarchy + ?Sized>(&self, hierarchy: &H) -> Result<(), EvalError> {
        let mut previous: Option<(&BoneReference, BoneIndex)> = None;
        for bone in &self.bones {
            if !bone.reference.is_valid(hierarchy) {
                return Err(EvalError::BoneNotFound(bone.reference.name.clone()));
            }
            let index = bone.reference.require()?;
            if let Some((parent_ref, parent)) = previous {
                if parent == index || !hierarchy.is_ancestor_of(parent, index) {
                    return Err(EvalError::BrokenChain {
                        parent: parent_ref.name.clone(),
                        child: bone.reference.name.clone(),
                    });
                }
            }
            previous = Some((&bone.reference, index));
        }
        Ok(())
    }

    pub fn is_valid<H: BoneHierarchy + ?Sized>(&self, hierarchy: &H) -> bool {
        self.check_valid(hierarchy).is_ok()
    }
}

// ---------------------------------------------------------------------------
// IkChain
// ---------------------------------------------------------------------------

/// One element of a chain being solved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    /// Backing skeletal bone; `None` for virtual links.
    pub bone: Option<BoneIndex>,
    /// Component-space transform.
    pub transform: Isometry3<f32>,
    pub constraint: BoneConstraint,
}

impl ChainLink {
    /// A link backed by skeletal bone `bone`.
    pub const fn new(bone: BoneIndex, transform: Isometry3<f32>, constraint: BoneConstraint) -> Self {
        Self {
            bone: Some(bone),
            transform,
            constraint,
        }
    }

    /// A link with no skeletal bone behind it.
    pub const fn virtual_link(transform: Isometry3<f32>, constraint: BoneConstraint) -> Self {
        Self {
            bone: None,
            transform,
            constraint,
        }
    }

    /// Component-space location.
    pub fn position(&self) -> Vector3<f32> {
        self.transform.translation.vector
    }
}

/// Ordered links, root to effector, in component space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IkChain {
    links: Vec<ChainLink>,
}

impl IkChain {
    /// Create a chain from links ordered root to effector.
    pub const fn new(links: Vec<ChainLink>) -> Self {
        Self { links }
    }

    /// Create an empty chain with room for `capacity` links.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            links: Vec::with_capacity(capacity),
        }
    }

    /// Gather the current component-space transforms of `def`'s bones.
    pub fn from_pose<P: PoseAccess + ?Sized>(pose: &P, def: &IkChainDef) -> Result<Self, EvalError> {
        let mut chain = Self::with_capacity(def.len());
        chain.extend_from_pose(pose, def)?;
        Ok(chain)
    }

    /// Append `def`'s bones, as gathered from `pose`.
    pub fn extend_from_pose<P: PoseAccess + ?Sized>(
        &mut self,
        pose: &P,
        def: &IkChainDef,
    ) -> Result<(), EvalError> {
        for bone in def.bones() {
            let index = bone.reference.require()?;
            let transform = require_component_transform(pose, index)?;
            self.links
                .push(ChainLink::new(index, transform, bone.constraint.clone()));
        }
        Ok(())
    }

    /// Append a link past the current effector.
    pub fn push(&mut self, link: ChainLink) {
        self.links.push(link);
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links, root to effector.
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Link positions, root to effector.
    pub fn positions(&self) -> Vec<Vector3<f32>> {
        self.links.iter().map(ChainLink::position).collect()
    }

    /// Mutable access to the link constraints, for per-frame retuning.
    pub fn constraints_mut(&mut self) -> impl Iterator<Item = &mut BoneConstraint> {
        self.links.iter_mut().map(|l| &mut l.constraint)
    }

    /// Link transforms, root to effector.
    pub fn transforms(&self) -> Vec<Isometry3<f32>> {
        self.links.iter().map(|l| l.transform).collect()
    }

    /// Distances between consecutive links.
    pub fn segment_lengths(&self) -> Vec<f32> {
        self.links
            .windows(2)
            .map(|pair| (pair[1].position() - pair[0].position()).norm())
            .collect()
    }

    /// Maximum distance the effector can be from the root.
    pub fn total_reach(&self) -> f32 {
        self.segment_lengths().iter().sum()
    }

    /// Solve toward `target` and store the solved transforms and refreshed
    /// constraint state back into the links.
    pub fn solve(
        &mut self,
        solver: &FabrikSolver,
        target: &Vector3<f32>,
        debug: &mut dyn DebugSink,
    ) -> FabrikResult {
        let transforms = self.transforms();
        let mut constraints: Vec<BoneConstraint> =
            self.links.iter().map(|l| l.constraint.clone()).collect();

        let result = solver.solve(&transforms, &mut constraints, target, debug);

        for ((link, transform), constraint) in self
            .links
            .iter_mut()
            .zip(&result.transforms)
            .zip(constraints)
        {
            link.transform = *transform;
            link.constraint = constraint;
        }
        result
    }

    /// Write-back set for every link backed by a bone.
    pub fn bone_transforms(&self) -> Vec<BoneTransform> {
        self.links
            .iter()
            .filter_map(|l| l.bone.map(|bone| BoneTransform::new(bone, l.transform)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
