//! [`CalibrationGraph`] – rigid transforms between reference frames.
//!
//! An undirected graph whose nodes are [`ReferenceFrame`]s and whose edges
//! are directly measured transforms.  Each edge is stored once, in the
//! direction it was measured; traversing it backwards uses the inverse.
//!
//! [`CalibrationGraph::static_transform`] resolves any pair of connected
//! frames by breadth-first search (fewest hops; ties go to the edge that was
//! inserted first) and composes the edge transforms along the path.
//!
//! # Example
//!
//! ```rust
//! use rigport_calib::calibration_graph::CalibrationGraph;
//! use rigport_calib::transform::{Quaternion, Transform3D, Vec3};
//! use rigport_types::{FrameCategory, ReferenceFrame, SourceError};
//!
//! let cam0 = ReferenceFrame::new(FrameCategory::Camera, 0);
//! let cam1 = ReferenceFrame::new(FrameCategory::Camera, 1);
//! let imu = ReferenceFrame::new(FrameCategory::Imu, 0);
//!
//! let mut graph = CalibrationGraph::new();
//! graph.add_frame(imu);
//! graph
//!     .add_direct_transform(
//!         cam0,
//!         cam1,
//!         Transform3D::new(Vec3::new(0.05, 0.0, 0.0), Quaternion::identity()),
//!     )
//!     .unwrap();
//!
//! let t = graph.static_transform(cam1, cam0).unwrap();
//! assert!((t.transform.translation.x + 0.05).abs() < 1e-12);
//!
//! assert!(matches!(
//!     graph.static_transform(imu, cam1),
//!     Err(SourceError::NoCalibrationPath { .. })
//! ));
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use rigport_types::{ReferenceFrame, SourceError};
use tracing::trace;

use crate::transform::{StaticTransform, Transform3D};

/// A directly measured transform `T_to_from`.
#[derive(Debug, Clone, Copy)]
struct CalibrationEdge {
    to: ReferenceFrame,
    from: ReferenceFrame,
    transform: Transform3D,
}

/// Undirected graph of reference frames joined by measured transforms.
#[derive(Debug, Default, Clone)]
pub struct CalibrationGraph {
    /// Frames in first-insertion order.
    frames: Vec<ReferenceFrame>,
    /// `adjacency[frame]` = indices into `edges`, in insertion order.
    adjacency: HashMap<ReferenceFrame, Vec<usize>>,
    edges: Vec<CalibrationEdge>,
}

impl CalibrationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `frame` as a node.  Frames with no measured edges stay in the
    /// graph as isolated nodes.
    pub fn add_frame(&mut self, frame: ReferenceFrame) {
        if !self.adjacency.contains_key(&frame) {
            self.frames.push(frame);
            self.adjacency.insert(frame, Vec::new());
        }
    }

    /// Insert the measured transform mapping points in `from` into `to`.
    /// Both frames are added as nodes if needed.
    ///
    /// # Errors
    ///
    /// [`SourceError::InvalidCalibration`] for a self-loop, a non-finite
    /// translation, or a rotation that cannot be normalised.
    pub fn add_direct_transform(
        &mut self,
        to: ReferenceFrame,
        from: ReferenceFrame,
        transform: Transform3D,
    ) -> Result<(), SourceError> {
        if to == from {
            return Err(SourceError::InvalidCalibration(format!(
                "transform from {from} onto itself"
            )));
        }
        if !transform.translation.is_finite() {
            return Err(SourceError::InvalidCalibration(format!(
                "non-finite translation for {from} -> {to}"
            )));
        }
        let rotation = transform.rotation.try_normalized().ok_or_else(|| {
            SourceError::InvalidCalibration(format!("degenerate rotation for {from} -> {to}"))
        })?;

        self.add_frame(to);
        self.add_frame(from);

        let index = self.edges.len();
        self.edges.push(CalibrationEdge {
            to,
            from,
            transform: Transform3D::new(transform.translation, rotation),
        });
        if let Some(list) = self.adjacency.get_mut(&to) {
            list.push(index);
        }
        if let Some(list) = self.adjacency.get_mut(&from) {
            list.push(index);
        }
        Ok(())
    }

    pub fn contains_frame(&self, frame: ReferenceFrame) -> bool {
        self.adjacency.contains_key(&frame)
    }

    /// All frames, in first-insertion order.
    pub fn frames(&self) -> &[ReferenceFrame] {
        &self.frames
    }

    /// Number of directly measured transforms.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Resolve the transform mapping points in `from` into `to`.
    ///
    /// # Errors
    ///
    /// - [`SourceError::FrameNotFound`] – either frame is not a node.
    /// - [`SourceError::NoCalibrationPath`] – the frames are disconnected.
    pub fn static_transform(
        &self,
        to: ReferenceFrame,
        from: ReferenceFrame,
    ) -> Result<StaticTransform, SourceError> {
        for frame in [to, from] {
            if !self.contains_frame(frame) {
                return Err(SourceError::FrameNotFound(frame));
            }
        }
        if to == from {
            return Ok(StaticTransform::identity(to));
        }

        // BFS outward from `to`; each queue item carries T_to_current.
        let mut queue: VecDeque<(ReferenceFrame, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<ReferenceFrame> = HashSet::new();
        queue.push_back((to, Transform3D::identity()));
        visited.insert(to);

        while let Some((current, accumulated)) = queue.pop_front() {
            for &index in self.neighbours(current) {
                let (next, step) = self.traverse(index, current);
                if !visited.insert(next) {
                    continue;
                }
                let composed = accumulated.compose(step);
                if next == from {
                    return Ok(StaticTransform::new(to, from, composed));
                }
                queue.push_back((next, composed));
            }
        }

        Err(SourceError::NoCalibrationPath { to, from })
    }

    /// Check that every cycle in the graph composes to the identity.
    ///
    /// A spanning forest is grown by BFS from each frame in insertion order;
    /// every edge outside the forest closes exactly one cycle and is compared
    /// against the transform predicted by the forest.
    ///
    /// # Errors
    ///
    /// [`SourceError::InconsistentCalibration`] for the first edge whose
    /// rotation residual exceeds `rotation_tol` (rad) or whose translation
    /// residual exceeds `translation_tol`.
    pub fn validate(&self, rotation_tol: f64, translation_tol: f64) -> Result<(), SourceError> {
        // T_root_frame for every frame reached so far.
        let mut pose: HashMap<ReferenceFrame, Transform3D> = HashMap::new();
        let mut tree_edges: HashSet<usize> = HashSet::new();

        for &root in &self.frames {
            if pose.contains_key(&root) {
                continue;
            }
            pose.insert(root, Transform3D::identity());
            let mut queue = VecDeque::from([root]);
            while let Some(current) = queue.pop_front() {
                let base = pose[&current];
                for &index in self.neighbours(current) {
                    let (next, step) = self.traverse(index, current);
                    if pose.contains_key(&next) {
                        continue;
                    }
                    pose.insert(next, base.compose(step));
                    tree_edges.insert(index);
                    queue.push_back(next);
                }
            }
        }

        for (index, edge) in self.edges.iter().enumerate() {
            if tree_edges.contains(&index) {
                continue;
            }
            let predicted = pose[&edge.to].inverse().compose(pose[&edge.from]);
            let (rot, trans) = predicted.residual(&edge.transform);
            trace!(to = %edge.to, from = %edge.from, rot, trans, "cycle residual");
            if rot > rotation_tol || trans > translation_tol {
                return Err(SourceError::InconsistentCalibration {
                    to: edge.to,
                    from: edge.from,
                    details: format!(
                        "rotation residual {rot:.3e} rad, translation residual {trans:.3e}"
                    ),
                });
            }
        }
        Ok(())
    }

    fn neighbours(&self, frame: ReferenceFrame) -> &[usize] {
        self.adjacency.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    // Cross edge `index` starting at `current`; returns the frame on the other
    // side and T_current_next.
    fn traverse(&self, index: usize, current: ReferenceFrame) -> (ReferenceFrame, Transform3D) {
        let edge = &self.edges[index];
        if edge.to == current {
            (edge.from, edge.transform)
        } else {
            (edge.to, edge.transform.inverse())
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Quaternion, Vec3};
    use rigport_types::FrameCategory;

    const ROT_TOL: f64 = 1e-6;
    const TRANS_TOL: f64 = 1e-4;

    fn cam(i: u32) -> ReferenceFrame {
        ReferenceFrame::new(FrameCategory::Camera, i)
    }

    fn imu(i: u32) -> ReferenceFrame {
        ReferenceFrame::new(FrameCategory::Imu, i)
    }

    fn tf(x: f64, y: f64, z: f64, yaw: f64) -> Transform3D {
        Transform3D::new(
            Vec3::new(x, y, z),
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), yaw),
        )
    }

    #[test]
    fn same_frame_is_identity() {
        let mut g = CalibrationGraph::new();
        g.add_frame(imu(0));
        let t = g.static_transform(imu(0), imu(0)).unwrap();
        assert_eq!(t, StaticTransform::identity(imu(0)));
    }

    #[test]
    fn unknown_frame_is_frame_not_found() {
        let mut g = CalibrationGraph::new();
        g.add_frame(imu(0));
        assert_eq!(
            g.static_transform(imu(0), cam(3)),
            Err(SourceError::FrameNotFound(cam(3)))
        );
        assert_eq!(
            g.static_transform(cam(3), cam(3)),
            Err(SourceError::FrameNotFound(cam(3)))
        );
    }

    #[test]
    fn isolated_frame_is_no_path_not_frame_not_found() {
        let mut g = CalibrationGraph::new();
        g.add_frame(imu(0));
        g.add_direct_transform(cam(0), cam(1), tf(0.05, 0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(
            g.static_transform(imu(0), cam(1)),
            Err(SourceError::NoCalibrationPath {
                to: imu(0),
                from: cam(1)
            })
        );
    }

    #[test]
    fn direct_edge_both_directions() {
        let mut g = CalibrationGraph::new();
        let t = tf(0.1, 0.2, 0.3, 0.4);
        g.add_direct_transform(cam(0), imu(0), t).unwrap();

        let forward = g.static_transform(cam(0), imu(0)).unwrap();
        assert!(forward.transform.approx_eq(&t, 1e-12, 1e-12));

        let backward = g.static_transform(imu(0), cam(0)).unwrap();
        assert!(backward.transform.approx_eq(&t.inverse(), 1e-12, 1e-12));
    }

    #[test]
    fn two_hop_chain_composes_in_order() {
        let mut g = CalibrationGraph::new();
        let t_c0_c1 = tf(0.05, 0.0, 0.0, 0.0);
        let t_c1_i = tf(0.0, 0.02, 0.0, 0.3);
        g.add_direct_transform(cam(0), cam(1), t_c0_c1).unwrap();
        g.add_direct_transform(cam(1), imu(0), t_c1_i).unwrap();

        let got = g.static_transform(cam(0), imu(0)).unwrap();
        let expected = t_c0_c1.compose(t_c1_i);
        assert!(got.transform.approx_eq(&expected, 1e-12, 1e-12));
        assert_eq!(got.to, cam(0));
        assert_eq!(got.from, imu(0));
    }

    #[test]
    fn edge_stored_in_reverse_direction_is_inverted_when_traversed() {
        let mut g = CalibrationGraph::new();
        let t_c0_c1 = tf(0.05, 0.0, 0.0, 0.1);
        // Stored as T_imu_c1 rather than T_c1_imu.
        let t_i_c1 = tf(0.0, -0.02, 0.01, -0.2);
        g.add_direct_transform(cam(0), cam(1), t_c0_c1).unwrap();
        g.add_direct_transform(imu(0), cam(1), t_i_c1).unwrap();

        let got = g.static_transform(cam(0), imu(0)).unwrap();
        let expected = t_c0_c1.compose(t_i_c1.inverse());
        assert!(got.transform.approx_eq(&expected, 1e-12, 1e-12));
    }

    #[test]
    fn forward_and_reverse_queries_are_inverse() {
        let mut g = CalibrationGraph::new();
        g.add_direct_transform(cam(0), cam(1), tf(0.05, 0.0, 0.0, 0.2))
            .unwrap();
        g.add_direct_transform(cam(1), imu(0), tf(0.0, 0.02, 0.1, -0.4))
            .unwrap();

        let ab = g.static_transform(cam(0), imu(0)).unwrap();
        let ba = g.static_transform(imu(0), cam(0)).unwrap();
        let round = ab.then(&ba).unwrap();
        assert!(round.transform.approx_eq(&Transform3D::identity(), ROT_TOL, TRANS_TOL));
    }

    #[test]
    fn consistent_triangle_is_path_independent() {
        let mut g = CalibrationGraph::new();
        let t_c0_c1 = tf(0.05, 0.0, 0.0, 0.1);
        let t_c1_i = tf(0.0, 0.02, 0.0, 0.3);
        let t_c0_i = t_c0_c1.compose(t_c1_i);
        g.add_direct_transform(cam(0), cam(1), t_c0_c1).unwrap();
        g.add_direct_transform(cam(1), imu(0), t_c1_i).unwrap();
        g.add_direct_transform(cam(0), imu(0), t_c0_i).unwrap();

        assert!(g.validate(ROT_TOL, TRANS_TOL).is_ok());

        // Direct edge and the two-hop path agree.
        let direct = g.static_transform(cam(0), imu(0)).unwrap();
        assert!(direct.transform.approx_eq(&t_c0_c1.compose(t_c1_i), ROT_TOL, TRANS_TOL));
    }

    #[test]
    fn inconsistent_triangle_fails_validation() {
        let mut g = CalibrationGraph::new();
        g.add_direct_transform(cam(0), cam(1), tf(0.05, 0.0, 0.0, 0.0))
            .unwrap();
        g.add_direct_transform(cam(1), imu(0), tf(0.0, 0.02, 0.0, 0.0))
            .unwrap();
        // Off by 1 cm from the composed chain.
        g.add_direct_transform(cam(0), imu(0), tf(0.06, 0.02, 0.0, 0.0))
            .unwrap();

        let err = g.validate(ROT_TOL, TRANS_TOL).unwrap_err();
        assert_eq!(err.kind(), "InconsistentCalibration");
    }

    #[test]
    fn parallel_edges_must_agree() {
        let mut g = CalibrationGraph::new();
        g.add_direct_transform(cam(0), cam(1), tf(0.05, 0.0, 0.0, 0.0))
            .unwrap();
        g.add_direct_transform(cam(1), cam(0), tf(-0.05, 0.0, 0.0, 0.0))
            .unwrap();
        assert!(g.validate(ROT_TOL, TRANS_TOL).is_ok());

        g.add_direct_transform(cam(0), cam(1), tf(0.05, 0.0, 0.0, 0.01))
            .unwrap();
        assert!(g.validate(ROT_TOL, TRANS_TOL).is_err());
    }

    #[test]
    fn equal_length_paths_agree() {
        // c2 reaches c0 in two hops through c1 or through i0.
        let mut g = CalibrationGraph::new();
        let a = tf(0.05, 0.0, 0.0, 0.1);
        let b = tf(0.05, 0.0, 0.0, 0.1);
        let c = tf(0.0, 0.1, 0.0, -0.2);
        g.add_direct_transform(cam(0), cam(1), a).unwrap();
        g.add_direct_transform(cam(1), cam(2), b).unwrap();
        g.add_direct_transform(cam(2), imu(0), c).unwrap();
        g.add_direct_transform(cam(0), imu(0), a.compose(b).compose(c))
            .unwrap();
        assert!(g.validate(ROT_TOL, TRANS_TOL).is_ok());

        let got = g.static_transform(cam(2), cam(0)).unwrap();
        let expected = a.compose(b).inverse();
        assert!(got.transform.approx_eq(&expected, ROT_TOL, TRANS_TOL));
    }

    #[test]
    fn disagreement_off_the_direct_path_fails_validation() {
        // Every edge is identity except cam1 <- cam2, which sits on no
        // shortest path between cam3 and imu0 but on a longer cycle with them.
        let (r, a, b, c, d) = (cam(0), cam(1), cam(2), cam(3), imu(0));
        let id = Transform3D::identity();
        let mut g = CalibrationGraph::new();
        g.add_direct_transform(r, a, id).unwrap();
        g.add_direct_transform(r, b, id).unwrap();
        g.add_direct_transform(r, d, id).unwrap();
        g.add_direct_transform(a, b, tf(0.01, 0.0, 0.0, 0.0)).unwrap();
        g.add_direct_transform(a, c, id).unwrap();
        g.add_direct_transform(b, c, id).unwrap();
        g.add_direct_transform(c, d, id).unwrap();

        let err = g.validate(ROT_TOL, TRANS_TOL).unwrap_err();
        assert_eq!(err.kind(), "InconsistentCalibration");
    }

    #[test]
    fn rejects_self_loop_and_degenerate_rotation() {
        let mut g = CalibrationGraph::new();
        assert!(matches!(
            g.add_direct_transform(cam(0), cam(0), Transform3D::identity()),
            Err(SourceError::InvalidCalibration(_))
        ));
        assert!(matches!(
            g.add_direct_transform(
                cam(0),
                cam(1),
                Transform3D::new(Vec3::zero(), Quaternion::new(0.0, 0.0, 0.0, 0.0))
            ),
            Err(SourceError::InvalidCalibration(_))
        ));
        assert!(matches!(
            g.add_direct_transform(
                cam(0),
                cam(1),
                Transform3D::new(Vec3::new(f64::INFINITY, 0.0, 0.0), Quaternion::identity())
            ),
            Err(SourceError::InvalidCalibration(_))
        ));
        assert_eq!(g.edge_count(), 0);
        assert!(g.frames().is_empty());
    }

    #[test]
    fn non_unit_rotation_is_normalised_on_insert() {
        let mut g = CalibrationGraph::new();
        g.add_direct_transform(
            cam(0),
            cam(1),
            Transform3D::new(Vec3::zero(), Quaternion::new(2.0, 0.0, 0.0, 0.0)),
        )
        .unwrap();
        let t = g.static_transform(cam(0), cam(1)).unwrap();
        assert!((t.transform.rotation.norm() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn add_frame_is_idempotent() {
        let mut g = CalibrationGraph::new();
        g.add_frame(imu(0));
        g.add_frame(imu(0));
        g.add_direct_transform(imu(0), cam(0), Transform3D::identity())
            .unwrap();
        assert_eq!(g.frames(), &[imu(0), cam(0)]);
    }
}
