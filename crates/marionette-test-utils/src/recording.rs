//! Debug sink that records everything it is given.

use nalgebra::Vector3;

use marionette_core::debug::{Color, DebugSink};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedLine {
    pub from: Vector3<f32>,
    pub to: Vector3<f32>,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedSphere {
    pub center: Vector3<f32>,
    pub radius: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub lines: Vec<RecordedLine>,
    pub spheres: Vec<RecordedSphere>,
    pub snapshots: Vec<(String, Vec<Vector3<f32>>)>,
}

impl RecordingSink {
    pub fn lines_with(&self, color: Color) -> usize {
        self.lines.iter().filter(|l| l.color == color).count()
    }

    pub fn spheres_with(&self, color: Color) -> usize {
        self.spheres.iter().filter(|s| s.color == color).count()
    }

    pub fn snapshot_labels(&self) -> Vec<String> {
        self.snapshots.iter().map(|(label, _)| label.clone()).collect()
    }

    /// Positions of the last snapshot recorded under `label`.
    pub fn snapshot(&self, label: &str) -> Option<&[Vector3<f32>]> {
        self.snapshots
            .iter()
            .rev()
            .find(|(l, _)| l == label)
            .map(|(_, positions)| positions.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.spheres.is_empty() && self.snapshots.is_empty()
    }
}

impl DebugSink for RecordingSink {
    fn draw_line(&mut self, from: Vector3<f32>, to: Vector3<f32>, color: Color) {
        self.lines.push(RecordedLine { from, to, color });
    }

    fn draw_sphere(&mut self, center: Vector3<f32>, radius: f32, color: Color) {
        self.spheres.push(RecordedSphere {
            center,
            radius,
            color,
        });
    }

    fn chain_snapshot(&mut self, label: &str, positions: &[Vector3<f32>]) {
        self.snapshots.push((label.to_owned(), positions.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_filters_by_color() {
        let mut sink = RecordingSink::default();
        assert!(sink.is_empty());
        sink.draw_line(Vector3::zeros(), Vector3::x(), Color::RED);
        sink.draw_vector(Vector3::zeros(), Vector3::y(), Color::GREEN);
        sink.draw_sphere(Vector3::zeros(), 3.0, Color::RED);
        assert_eq!(sink.lines_with(Color::RED), 1);
        assert_eq!(sink.lines_with(Color::GREEN), 1);
        assert_eq!(sink.spheres_with(Color::RED), 1);
    }

    #[test]
    fn latest_snapshot_wins() {
        let mut sink = RecordingSink::default();
        sink.chain_snapshot("a", &[Vector3::x()]);
        sink.chain_snapshot("a", &[Vector3::y()]);
        assert_eq!(sink.snapshot("a"), Some(&[Vector3::y()][..]));
        assert!(sink.snapshot("b").is_none());
        assert_eq!(sink.snapshot_labels(), ["a", "a"]);
    }
}
