//! Debug-draw sink.
//!
//! Nodes and the solver report geometry through [`DebugSink`]. Production
//! hosts pass [`NoopSink`]; editors forward the calls to their line
//! renderer. All positions are world space unless noted otherwise.

use nalgebra::{Isometry3, Point3, Vector3};

/// Length of gizmo vectors drawn by [`DebugSink::draw_vector`].
pub const DEFAULT_VECTOR_LENGTH: f32 = 50.0;

/// Radius of the joint markers drawn by [`draw_chain`].
pub const CHAIN_JOINT_RADIUS: f32 = 3.0;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    pub const CYAN: Self = Self::rgb(0, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Receiver for debug geometry.
pub trait DebugSink {
    fn draw_line(&mut self, from: Vector3<f32>, to: Vector3<f32>, color: Color);

    fn draw_sphere(&mut self, center: Vector3<f32>, radius: f32, color: Color);

    fn draw_vector(&mut self, origin: Vector3<f32>, direction: Vector3<f32>, color: Color) {
        self.draw_line(origin, origin + direction * DEFAULT_VECTOR_LENGTH, color);
    }

    /// Component-space positions of a chain at a named stage of a solve.
    fn chain_snapshot(&mut self, _label: &str, _positions: &[Vector3<f32>]) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn draw_line(&mut self, _from: Vector3<f32>, _to: Vector3<f32>, _color: Color) {}

    fn draw_sphere(&mut self, _center: Vector3<f32>, _radius: f32, _color: Color) {}
}

/// Draw a component-space chain as connected segments with joint markers.
pub fn draw_chain(
    sink: &mut dyn DebugSink,
    to_world: &Isometry3<f32>,
    positions: &[Vector3<f32>],
    color: Color,
) {
    for pair in positions.windows(2) {
        let parent = to_world.transform_point(&Point3::from(pair[0])).coords;
        let child = to_world.transform_point(&Point3::from(pair[1])).coords;
        sink.draw_line(parent, child, color);
        sink.draw_sphere(child, CHAIN_JOINT_RADIUS, color);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        lines: usize,
        spheres: usize,
    }

    impl DebugSink for Counter {
        fn draw_line(&mut self, _from: Vector3<f32>, _to: Vector3<f32>, _color: Color) {
            self.lines += 1;
        }

        fn draw_sphere(&mut self, _center: Vector3<f32>, _radius: f32, _color: Color) {
            self.spheres += 1;
        }
    }

    #[test]
    fn draw_chain_emits_one_line_and_sphere_per_segment() {
        let mut sink = Counter::default();
        let positions = [Vector3::zeros(), Vector3::x(), Vector3::new(2.0, 0.0, 0.0)];
        draw_chain(&mut sink, &Isometry3::identity(), &positions, Color::CYAN);
        assert_eq!(sink.lines, 2);
        assert_eq!(sink.spheres, 2);
    }

    #[test]
    fn draw_vector_defaults_to_a_line() {
        let mut sink = Counter::default();
        sink.draw_vector(Vector3::zeros(), Vector3::z(), Color::BLUE);
        assert_eq!(sink.lines, 1);
    }
}
