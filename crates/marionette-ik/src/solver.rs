//! Range-limited FABRIK (Forward And Backward Reaching Inverse Kinematics).
//!
//! Positions are solved by alternating a backward pass (effector pinned to
//! the target, walking toward the root) and a forward pass (root pinned to
//! its original position, walking toward the effector). Every time a
//! segment is re-placed, its constraint is set up and enforced on the
//! segment direction, and the segment is rebuilt at its original length.
//!
//! Orientations are not solved directly: once positions settle, each link
//! (except the effector) is rotated by the minimal rotation between its
//! original and solved segment directions.

use nalgebra::{Isometry3, Translation3, Vector3};

use marionette_core::config::SolverConfig;
use marionette_core::debug::DebugSink;

use crate::constraint::BoneConstraint;
use crate::geometry::{rotation_between, DEGENERATE_LENGTH};

/// Iteration control for [`FabrikSolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FabrikConfig {
    /// Effector-to-target distance at which the solve is accepted.
    pub precision: f32,
    /// Maximum backward/forward iterations.
    pub max_iterations: u32,
}

impl Default for FabrikConfig {
    fn default() -> Self {
        Self {
            precision: 1.0,
            max_iterations: 10,
        }
    }
}

impl From<SolverConfig> for FabrikConfig {
    fn from(config: SolverConfig) -> Self {
        Self {
            precision: config.precision,
            max_iterations: config.max_iterations,
        }
    }
}

/// Result of a FABRIK solve.
#[derive(Debug, Clone)]
pub struct FabrikResult {
    /// Solved component-space transforms, root to effector.
    pub transforms: Vec<Isometry3<f32>>,
    /// `false` when the input was already within precision (or unsolvable);
    /// `transforms` is then an exact copy of the input and callers should
    /// skip committing the pose.
    pub changed: bool,
    /// Whether the effector ended within precision of the target.
    pub converged: bool,
    /// Whether the target was within the chain's reach. Always `false` for
    /// chains too short to move unless the target is already satisfied.
    pub reachable: bool,
    /// Backward/forward iterations performed.
    pub iterations: u32,
    /// Final effector-to-target distance.
    pub effector_error: f32,
}

/// Range-limited FABRIK solver.
#[derive(Debug, Clone, Default)]
pub struct FabrikSolver {
    config: FabrikConfig,
}

/// Per-solve data shared by the passes.
struct Segments<'a> {
    reference: &'a [Isometry3<f32>],
    lengths: Vec<f32>,
    /// Original unit directions, used when a segment degenerates.
    directions: Vec<Vector3<f32>>,
}

impl FabrikSolver {
    /// Create a new solver with the given configuration.
    pub const fn new(config: FabrikConfig) -> Self {
        Self { config }
    }

    /// The solver's iteration control.
    pub const fn config(&self) -> &FabrikConfig {
        &self.config
    }

    /// Solve for `target`, reporting chain snapshots to `debug`.
    ///
    /// `constraints[i]` limits the segment from link `i` to link `i + 1`;
    /// missing slots are unconstrained. Setup may rewrite constraint
    /// parameters, so callers own the constraint storage. Constraint setup
    /// sees only chain geometry; no host or owning-entity handle is passed.
    pub fn solve(
        &self,
        transforms: &[Isometry3<f32>],
        constraints: &mut [BoneConstraint],
        target: &Vector3<f32>,
        debug: &mut dyn DebugSink,
    ) -> FabrikResult {
        let n = transforms.len();
        let reference: Vec<Vector3<f32>> =
            transforms.iter().map(|t| t.translation.vector).collect();

        let Some(effector) = reference.last() else {
            return unchanged(transforms, f32::INFINITY, false);
        };
        let initial_error = (effector - target).norm();
        if n < 2 {
            tracing::debug!(links = n, "chain too short to solve");
            return unchanged(transforms, initial_error, initial_error <= self.config.precision);
        }
        if initial_error <= self.config.precision {
            return unchanged(transforms, initial_error, true);
        }

        let segments = Segments::new(transforms, &reference);
        let total_reach: f32 = segments.lengths.iter().sum();
        let root = reference[0];
        debug.chain_snapshot("fabrik_before", &reference);

        let mut positions = reference.clone();
        let reachable = (target - root).norm() < total_reach;
        let mut iterations = 0;
        let mut error = initial_error;

        if reachable {
            while iterations < self.config.max_iterations && error > self.config.precision {
                segments.backward_pass(&mut positions, constraints, target);
                segments.forward_pass(&mut positions, constraints, &root);
                iterations += 1;
                error = (positions[n - 1] - target).norm();
                tracing::trace!(iteration = iterations, error, "fabrik iteration");
            }
        } else {
            // Out of reach: lay the chain out straight toward the target, then
            // let the constraints bend it from the root.
            let direction = (target - root)
                .try_normalize(DEGENERATE_LENGTH)
                .unwrap_or(segments.directions[0]);
            for i in 0..n - 1 {
                positions[i + 1] = positions[i] + direction * segments.lengths[i];
            }
            segments.forward_pass(&mut positions, constraints, &root);
            error = (positions[n - 1] - target).norm();
        }

        let converged = error <= self.config.precision;
        tracing::debug!(iterations, error, reachable, converged, "range-limited FABRIK solve finished");
        debug.chain_snapshot("fabrik_after", &positions);

        FabrikResult {
            transforms: segments.orient(&positions),
            changed: true,
            converged,
            reachable,
            iterations,
            effector_error: error,
        }
    }
}

impl<'a> Segments<'a> {
    fn new(reference: &'a [Isometry3<f32>], positions: &[Vector3<f32>]) -> Self {
        let deltas: Vec<Vector3<f32>> = positions.windows(2).map(|w| w[1] - w[0]).collect();
        Self {
            reference,
            lengths: deltas.iter().map(Vector3::norm).collect(),
            directions: deltas
                .iter()
                .map(|d| d.try_normalize(DEGENERATE_LENGTH).unwrap_or_else(Vector3::x))
                .collect(),
        }
    }

    /// Effector pinned to the target, walking toward the root.
    fn backward_pass(
        &self,
        positions: &mut [Vector3<f32>],
        constraints: &mut [BoneConstraint],
        target: &Vector3<f32>,
    ) {
        let n = positions.len();
        positions[n - 1] = *target;
        for i in (0..n - 1).rev() {
            let direction = self.constrained_direction(i, positions, constraints);
            positions[i] = positions[i + 1] - direction * self.lengths[i];
        }
    }

    /// Root pinned to its original position, walking toward the effector.
    fn forward_pass(
        &self,
        positions: &mut [Vector3<f32>],
        constraints: &mut [BoneConstraint],
        root: &Vector3<f32>,
    ) {
        positions[0] = *root;
        for i in 0..positions.len() - 1 {
            let direction = self.constrained_direction(i, positions, constraints);
            positions[i + 1] = positions[i] + direction * self.lengths[i];
        }
    }

    /// Unit direction of segment `i` after constraint setup and enforcement.
    fn constrained_direction(
        &self,
        i: usize,
        positions: &[Vector3<f32>],
        constraints: &mut [BoneConstraint],
    ) -> Vector3<f32> {
        let raw = positions[i + 1] - positions[i];
        let Some(constraint) = constraints.get_mut(i) else {
            return raw
                .try_normalize(DEGENERATE_LENGTH)
                .unwrap_or(self.directions[i]);
        };

        constraint.setup(i, self.reference, positions);
        let fallback = constraint.failsafe().unwrap_or(self.directions[i]);
        let raw = raw.try_normalize(DEGENERATE_LENGTH).unwrap_or(fallback);
        constraint
            .enforce(&raw)
            .try_normalize(DEGENERATE_LENGTH)
            .unwrap_or(fallback)
    }

    /// Place every link at its solved position and rotate all but the
    /// effector by the change in its segment direction.
    fn orient(&self, positions: &[Vector3<f32>]) -> Vec<Isometry3<f32>> {
        let n = positions.len();
        self.reference
            .iter()
            .zip(positions)
            .enumerate()
            .map(|(i, (original, position))| {
                let rotation = if i + 1 < n {
                    let solved = positions[i + 1] - position;
                    rotation_between(&self.directions[i], &solved) * original.rotation
                } else {
                    original.rotation
                };
                Isometry3::from_parts(Translation3::from(*position), rotation)
            })
            .collect()
    }
}

/// Result for a chain returned as-is. Nothing moved, so the target counts
/// as reachable exactly when it is already satisfied.
fn unchanged(transforms: &[Isometry3<f32>], error: f32, converged: bool) -> FabrikResult {
    FabrikResult {
        transforms: transforms.to_vec(),
        changed: false,
        converged,
        reachable: converged,
        iterations: 0,
        effector_error: error,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
