//! In-memory skeleton implementing the host capability traits.

use std::collections::HashMap;

use nalgebra::{Isometry3, Point3, Vector3};

use marionette_core::{BoneHierarchy, BoneIndex, PoseAccess};

#[derive(Debug, Clone)]
struct MockBone {
    name: String,
    parent: Option<BoneIndex>,
    local: Isometry3<f32>,
}

#[derive(Debug, Clone)]
struct MockSocket {
    bone: BoneIndex,
    offset: Vector3<f32>,
}

/// A skeleton plus its current pose.
///
/// Bones are stored parent-first; component transforms are composed from
/// the local transforms on every query, so editing one bone moves its
/// descendants.
#[derive(Debug, Clone)]
pub struct MockSkeleton {
    bones: Vec<MockBone>,
    sockets: HashMap<String, MockSocket>,
    component_to_world: Isometry3<f32>,
}

impl Default for MockSkeleton {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSkeleton {
    pub fn new() -> Self {
        Self {
            bones: Vec::new(),
            sockets: HashMap::new(),
            component_to_world: Isometry3::identity(),
        }
    }

    /// Add a parentless bone. `local` is its component-space transform.
    pub fn add_root(&mut self, name: &str, local: Isometry3<f32>) -> BoneIndex {
        self.push(name, None, local)
    }

    /// Add a bone under `parent` with a parent-relative transform.
    ///
    /// # Panics
    ///
    /// Panics if `parent` has not been added yet.
    pub fn add_bone(&mut self, name: &str, parent: BoneIndex, local: Isometry3<f32>) -> BoneIndex {
        assert!(parent.index() < self.bones.len(), "unknown parent bone {parent}");
        self.push(name, Some(parent), local)
    }

    fn push(&mut self, name: &str, parent: Option<BoneIndex>, local: Isometry3<f32>) -> BoneIndex {
        let index = BoneIndex(self.bones.len());
        self.bones.push(MockBone {
            name: name.to_owned(),
            parent,
            local,
        });
        index
    }

    /// Attach a named socket to `bone` at a bone-relative offset.
    pub fn add_socket(&mut self, name: &str, bone: BoneIndex, offset: Vector3<f32>) {
        self.sockets.insert(name.to_owned(), MockSocket { bone, offset });
    }

    pub fn set_component_to_world(&mut self, transform: Isometry3<f32>) {
        self.component_to_world = transform;
    }

    pub fn set_local_transform(&mut self, bone: BoneIndex, local: Isometry3<f32>) {
        if let Some(b) = self.bones.get_mut(bone.index()) {
            b.local = local;
        }
    }

    /// Move `bone` to a component-space location, keeping its rotation.
    pub fn set_component_location(&mut self, bone: BoneIndex, location: Vector3<f32>) {
        let parent = self.parent(bone).and_then(|p| self.component_transform(p));
        let local_point = parent.map_or(location, |p| {
            p.inverse_transform_point(&Point3::from(location)).coords
        });
        if let Some(b) = self.bones.get_mut(bone.index()) {
            b.local.translation.vector = local_point;
        }
    }
}

impl BoneHierarchy for MockSkeleton {
    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn find_bone(&self, name: &str) -> Option<BoneIndex> {
        self.bones.iter().position(|b| b.name == name).map(BoneIndex)
    }

    fn parent(&self, bone: BoneIndex) -> Option<BoneIndex> {
        self.bones.get(bone.index()).and_then(|b| b.parent)
    }
}

impl PoseAccess for MockSkeleton {
    fn component_transform(&self, bone: BoneIndex) -> Option<Isometry3<f32>> {
        let b = self.bones.get(bone.index())?;
        match b.parent {
            Some(parent) => Some(self.component_transform(parent)? * b.local),
            None => Some(b.local),
        }
    }

    fn local_transform(&self, bone: BoneIndex) -> Option<Isometry3<f32>> {
        self.bones.get(bone.index()).map(|b| b.local)
    }

    fn component_to_world(&self) -> Isometry3<f32> {
        self.component_to_world
    }

    fn socket_location(&self, name: &str) -> Option<Vector3<f32>> {
        let socket = self.sockets.get(name)?;
        let bone = self.component_transform(socket.bone)?;
        let component = bone.transform_point(&Point3::from(socket.offset)).coords;
        Some(self.component_to_world_point(&component))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn at(x: f32, y: f32, z: f32) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
    }

    #[test]
    fn component_transforms_compose_locals() {
        let mut s = MockSkeleton::new();
        let root = s.add_root("root", at(0.0, 0.0, 1.0));
        let spine = s.add_bone("spine", root, at(0.0, 0.0, 2.0));
        assert_relative_eq!(s.component_location(spine).unwrap(), Vector3::new(0.0, 0.0, 3.0));
        assert_eq!(s.find_bone("spine"), Some(spine));
        assert_eq!(s.parent(spine), Some(root));
        assert_eq!(s.parent(root), None);
    }

    #[test]
    fn rotated_parent_rotates_children() {
        let mut s = MockSkeleton::new();
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2);
        let root = s.add_root("root", Isometry3::from_parts(Translation3::identity(), rot));
        let arm = s.add_bone("arm", root, at(1.0, 0.0, 0.0));
        assert_relative_eq!(s.component_location(arm).unwrap(), Vector3::y(), epsilon = 1e-6);
    }

    #[test]
    fn set_component_location_keeps_children_relative() {
        let mut s = MockSkeleton::new();
        let root = s.add_root("root", at(0.0, 0.0, 0.0));
        let pelvis = s.add_bone("pelvis", root, at(0.0, 0.0, 90.0));
        let foot = s.add_bone("foot", pelvis, at(0.0, 0.0, -90.0));
        s.set_component_location(pelvis, Vector3::new(0.0, 0.0, 80.0));
        assert_relative_eq!(s.component_location(foot).unwrap(), Vector3::new(0.0, 0.0, -10.0));
    }

    #[test]
    fn sockets_resolve_in_world_space() {
        let mut s = MockSkeleton::new();
        let root = s.add_root("root", at(0.0, 0.0, 0.0));
        let spine = s.add_bone("spine", root, at(0.0, 0.0, 50.0));
        s.add_socket("pivot", spine, Vector3::new(0.0, 0.0, 10.0));
        s.set_component_to_world(at(100.0, 0.0, 0.0));
        assert_relative_eq!(s.socket_location("pivot").unwrap(), Vector3::new(100.0, 0.0, 60.0));
        assert!(s.socket_location("missing").is_none());
    }

    #[test]
    fn unknown_bone_has_no_transform() {
        let s = MockSkeleton::new();
        assert!(s.component_transform(BoneIndex(3)).is_none());
        assert!(s.local_transform(BoneIndex(3)).is_none());
    }
}
