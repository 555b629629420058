//! [`TimeSyncGraph`] – nanosecond offsets between sensor clocks.
//!
//! Nodes are sensors (clocks belong to sensors, not frames).  Each measured
//! offset `t_destination = t_source + offset_ns` is stored together with its
//! implied reverse edge, so any connected pair resolves in either direction
//! by summing offsets along the shortest path.
//!
//! Call [`TimeSyncGraph::finalize`] once all offsets are inserted.  It checks
//! every cycle against a tolerance and marks each biconnected block holding a
//! cycle that does not sum to zero; queries whose path uses an offset of a
//! marked block fail with [`SourceError::TimeOffsetInconsistent`] instead of
//! returning whichever path BFS happened to find.
//!
//! # Example
//!
//! ```rust
//! use rigport_calib::time_sync::TimeSyncGraph;
//! use rigport_types::{SensorId, SensorType};
//!
//! let accel = SensorId::new(SensorType::Accelerometer, 0);
//! let left = SensorId::new(SensorType::Infrared, 0);
//! let right = SensorId::new(SensorType::Infrared, 1);
//!
//! let mut sync = TimeSyncGraph::new();
//! sync.add_direct_offset(accel, left, 1500).unwrap();
//! sync.add_direct_offset(left, right, 200).unwrap();
//! sync.finalize(1);
//!
//! assert_eq!(sync.time_offset(accel, right), Ok(1700));
//! assert_eq!(sync.time_offset(right, accel), Ok(-1700));
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use rigport_types::{Nanoseconds, SensorId, SourceError};

/// A directed offset edge.  Edges come in pairs: the measured one at an even
/// index, its implied reverse right after it.
#[derive(Debug, Clone, Copy)]
struct OffsetEdge {
    source: SensorId,
    destination: SensorId,
    offset_ns: Nanoseconds,
}

/// A cycle whose offsets do not sum to zero within tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockCycleResidual {
    /// Sensors on the cycle.
    pub sensors: Vec<SensorId>,
    /// Signed sum of the offsets around the cycle.
    pub residual_ns: i128,
}

/// Directed graph of sensor clocks joined by measured offsets.
#[derive(Debug, Default, Clone)]
pub struct TimeSyncGraph {
    sensors: Vec<SensorId>,
    /// `adjacency[sensor]` = outgoing edge indices, in insertion order.
    adjacency: HashMap<SensorId, Vec<usize>>,
    edges: Vec<OffsetEdge>,
    /// Measured-pair indices inside a block with an inconsistent cycle.
    inconsistent: HashSet<usize>,
}

impl TimeSyncGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sensor` as a clock node.  Sensors with no offsets stay in the
    /// graph as isolated nodes.
    pub fn add_sensor(&mut self, sensor: SensorId) {
        if !self.adjacency.contains_key(&sensor) {
            self.sensors.push(sensor);
            self.adjacency.insert(sensor, Vec::new());
        }
    }

    /// Insert the measured offset `t_destination = t_source + offset_ns` and
    /// its implied reverse.
    ///
    /// # Errors
    ///
    /// [`SourceError::InvalidCalibration`] for a self-loop or an offset whose
    /// negation does not fit in an `i64`.
    pub fn add_direct_offset(
        &mut self,
        source: SensorId,
        destination: SensorId,
        offset_ns: Nanoseconds,
    ) -> Result<(), SourceError> {
        if source == destination {
            return Err(SourceError::InvalidCalibration(format!(
                "time offset from {source} onto itself"
            )));
        }
        let reverse_ns = offset_ns.checked_neg().ok_or_else(|| {
            SourceError::InvalidCalibration(format!(
                "time offset {offset_ns} ns from {source} to {destination} is out of range"
            ))
        })?;

        self.add_sensor(source);
        self.add_sensor(destination);

        let forward = self.edges.len();
        self.edges.push(OffsetEdge {
            source,
            destination,
            offset_ns,
        });
        self.edges.push(OffsetEdge {
            source: destination,
            destination: source,
            offset_ns: reverse_ns,
        });
        if let Some(list) = self.adjacency.get_mut(&source) {
            list.push(forward);
        }
        if let Some(list) = self.adjacency.get_mut(&destination) {
            list.push(forward + 1);
        }
        Ok(())
    }

    pub fn contains_sensor(&self, sensor: SensorId) -> bool {
        self.adjacency.contains_key(&sensor)
    }

    /// All clock nodes, in first-insertion order.
    pub fn sensors(&self) -> &[SensorId] {
        &self.sensors
    }

    /// Number of measured offsets (implied reverse edges not counted).
    pub fn measured_count(&self) -> usize {
        self.edges.len() / 2
    }

    /// `true` when `sensor` has a measured offset inside a block that holds an
    /// inconsistent cycle.
    pub fn is_inconsistent(&self, sensor: SensorId) -> bool {
        self.adjacency
            .get(&sensor)
            .is_some_and(|list| list.iter().any(|&i| self.inconsistent.contains(&(i / 2))))
    }

    /// Check every cycle against `tolerance_ns` and record where offsets are
    /// no longer path independent.
    ///
    /// Grows a BFS spanning forest (roots in insertion order) that assigns
    /// each clock a potential relative to its root; every measured edge
    /// outside the forest closes one cycle whose residual is
    /// `potential(source) + offset - potential(destination)`.
    ///
    /// A bad cycle taints the whole biconnected block it lies in: any two
    /// paths between clocks of that block differ by a cycle of the block, so
    /// every measured offset of the block is marked.  Bridges and other
    /// blocks stay usable.
    ///
    /// Returns the offending cycles; calling it again recomputes from scratch.
    pub fn finalize(&mut self, tolerance_ns: u64) -> Vec<ClockCycleResidual> {
        let mut potential: HashMap<SensorId, i128> = HashMap::new();
        let mut parent: HashMap<SensorId, SensorId> = HashMap::new();
        let mut depth: HashMap<SensorId, usize> = HashMap::new();
        // Measured-pair indices (edge index / 2) used by the forest.
        let mut tree_pairs: HashSet<usize> = HashSet::new();

        for &root in &self.sensors {
            if potential.contains_key(&root) {
                continue;
            }
            potential.insert(root, 0);
            depth.insert(root, 0);
            let mut queue = VecDeque::from([root]);
            while let Some(current) = queue.pop_front() {
                let base = potential[&current];
                let level = depth[&current];
                for &index in self.neighbours(current) {
                    let edge = self.edges[index];
                    if potential.contains_key(&edge.destination) {
                        continue;
                    }
                    potential.insert(edge.destination, base + i128::from(edge.offset_ns));
                    parent.insert(edge.destination, current);
                    depth.insert(edge.destination, level + 1);
                    tree_pairs.insert(index / 2);
                    queue.push_back(edge.destination);
                }
            }
        }

        let block_of = self.blocks();
        let mut residuals = Vec::new();
        let mut bad_blocks = HashSet::new();
        for pair in 0..self.measured_count() {
            if tree_pairs.contains(&pair) {
                continue;
            }
            let edge = self.edges[pair * 2];
            let residual = potential[&edge.source] + i128::from(edge.offset_ns)
                - potential[&edge.destination];
            if residual.unsigned_abs() <= u128::from(tolerance_ns) {
                continue;
            }
            bad_blocks.insert(block_of[pair]);
            residuals.push(ClockCycleResidual {
                sensors: cycle_through(edge.source, edge.destination, &parent, &depth),
                residual_ns: residual,
            });
        }

        self.inconsistent = (0..self.measured_count())
            .filter(|&pair| bad_blocks.contains(&block_of[pair]))
            .collect();
        residuals
    }

    /// Resolve the offset such that `t_destination = t_source + offset`.
    ///
    /// # Errors
    ///
    /// - [`SourceError::SensorNotFound`] – either sensor is not a node.
    /// - [`SourceError::TimeOffsetUnknown`] – no path, or the summed offset
    ///   does not fit in an `i64`.
    /// - [`SourceError::TimeOffsetInconsistent`] – the resolved path uses an
    ///   offset from a block holding an inconsistent cycle.
    pub fn time_offset(
        &self,
        source: SensorId,
        destination: SensorId,
    ) -> Result<Nanoseconds, SourceError> {
        for sensor in [source, destination] {
            if !self.contains_sensor(sensor) {
                return Err(SourceError::SensorNotFound(sensor));
            }
        }
        if source == destination {
            return Ok(0);
        }
        let unknown = SourceError::TimeOffsetUnknown {
            source_sensor: source,
            destination_sensor: destination,
        };

        // BFS from `source`; each queue item carries the summed offset and
        // whether the path so far used a marked offset.
        let mut queue: VecDeque<(SensorId, i128, bool)> = VecDeque::new();
        let mut visited: HashSet<SensorId> = HashSet::new();
        queue.push_back((source, 0, false));
        visited.insert(source);

        while let Some((current, accumulated, tainted)) = queue.pop_front() {
            for &index in self.neighbours(current) {
                let edge = self.edges[index];
                if !visited.insert(edge.destination) {
                    continue;
                }
                let total = accumulated + i128::from(edge.offset_ns);
                let tainted = tainted || self.inconsistent.contains(&(index / 2));
                if edge.destination == destination {
                    if tainted {
                        return Err(SourceError::TimeOffsetInconsistent {
                            source_sensor: source,
                            destination_sensor: destination,
                        });
                    }
                    return Nanoseconds::try_from(total).map_err(|_| unknown);
                }
                queue.push_back((edge.destination, total, tainted));
            }
        }

        Err(unknown)
    }

    fn neighbours(&self, sensor: SensorId) -> &[usize] {
        self.adjacency.get(&sensor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Biconnected block id of every measured pair (Hopcroft–Tarjan with an
    /// edge stack, iterative).  Parallel offsets share a block.
    fn blocks(&self) -> Vec<usize> {
        let mut block_of = vec![usize::MAX; self.measured_count()];
        let mut discovered: HashMap<SensorId, usize> = HashMap::new();
        let mut low: HashMap<SensorId, usize> = HashMap::new();
        let mut pair_stack: Vec<usize> = Vec::new();
        let mut next_block = 0;

        for &root in &self.sensors {
            if discovered.contains_key(&root) {
                continue;
            }
            let order = discovered.len();
            discovered.insert(root, order);
            low.insert(root, order);
            // (sensor, pair it was reached through, next adjacency slot)
            let mut frames: Vec<(SensorId, Option<usize>, usize)> = vec![(root, None, 0)];

            while let Some(frame) = frames.last_mut() {
                let (current, via, slot) = *frame;
                if let Some(&index) = self.neighbours(current).get(slot) {
                    frame.2 += 1;
                    let pair = index / 2;
                    if via == Some(pair) {
                        continue;
                    }
                    let next = self.edges[index].destination;
                    match discovered.get(&next).copied() {
                        None => {
                            let order = discovered.len();
                            discovered.insert(next, order);
                            low.insert(next, order);
                            pair_stack.push(pair);
                            frames.push((next, Some(pair), 0));
                        }
                        Some(order) if order < discovered[&current] => {
                            pair_stack.push(pair);
                            if order < low[&current] {
                                low.insert(current, order);
                            }
                        }
                        // Back edge already pushed from the descendant's side.
                        Some(_) => {}
                    }
                    continue;
                }

                frames.pop();
                let (Some(&(up, _, _)), Some(tree_pair)) = (frames.last(), via) else {
                    continue;
                };
                let reach = low[&current];
                if reach < low[&up] {
                    low.insert(up, reach);
                }
                if reach >= discovered[&up] {
                    while let Some(pair) = pair_stack.pop() {
                        block_of[pair] = next_block;
                        if pair == tree_pair {
                            break;
                        }
                    }
                    next_block += 1;
                }
            }
        }
        block_of
    }
}

// Sensors on the fundamental cycle closed by a non-forest edge `a -> b`:
// the forest paths from `a` and `b` up to their lowest common ancestor.
fn cycle_through(
    a: SensorId,
    b: SensorId,
    parent: &HashMap<SensorId, SensorId>,
    depth: &HashMap<SensorId, usize>,
) -> Vec<SensorId> {
    let mut left = vec![a];
    let mut right = vec![b];
    let (mut x, mut y) = (a, b);
    while depth[&x] > depth[&y] {
        x = parent[&x];
        left.push(x);
    }
    while depth[&y] > depth[&x] {
        y = parent[&y];
        right.push(y);
    }
    while x != y {
        x = parent[&x];
        y = parent[&y];
        left.push(x);
        right.push(y);
    }
    // Both halves end at the common ancestor; keep it once.
    right.pop();
    left.extend(right.into_iter().rev());
    left
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rigport_types::SensorType;

    fn ir(i: u32) -> SensorId {
        SensorId::new(SensorType::Infrared, i)
    }

    fn accel(i: u32) -> SensorId {
        SensorId::new(SensorType::Accelerometer, i)
    }

    fn gyro(i: u32) -> SensorId {
        SensorId::new(SensorType::Gyroscope, i)
    }

    fn scenario() -> TimeSyncGraph {
        let mut g = TimeSyncGraph::new();
        for s in [ir(0), ir(1), accel(0), gyro(0)] {
            g.add_sensor(s);
        }
        g.add_direct_offset(accel(0), ir(0), 1500).unwrap();
        g.add_direct_offset(ir(0), ir(1), 200).unwrap();
        assert!(g.finalize(1).is_empty());
        g
    }

    #[test]
    fn same_sensor_is_zero() {
        let g = scenario();
        assert_eq!(g.time_offset(gyro(0), gyro(0)), Ok(0));
    }

    #[test]
    fn two_hop_offset_sums() {
        let g = scenario();
        assert_eq!(g.time_offset(accel(0), ir(1)), Ok(1700));
    }

    #[test]
    fn offsets_are_antisymmetric() {
        let g = scenario();
        for &a in g.sensors() {
            for &b in g.sensors() {
                if let Ok(ab) = g.time_offset(a, b) {
                    assert_eq!(g.time_offset(b, a), Ok(-ab), "{a} -> {b}");
                }
            }
        }
    }

    #[test]
    fn isolated_sensor_is_unknown_not_missing() {
        let g = scenario();
        assert_eq!(
            g.time_offset(gyro(0), ir(0)),
            Err(SourceError::TimeOffsetUnknown {
                source_sensor: gyro(0),
                destination_sensor: ir(0),
            })
        );
        assert_eq!(
            g.time_offset(ir(7), ir(0)),
            Err(SourceError::SensorNotFound(ir(7)))
        );
        assert_eq!(
            g.time_offset(ir(0), ir(7)),
            Err(SourceError::SensorNotFound(ir(7)))
        );
    }

    #[test]
    fn consistent_cycle_within_tolerance_is_accepted() {
        let mut g = scenario();
        // Off by 1 ns from the two-hop sum: inside a 1 ns tolerance.
        g.add_direct_offset(accel(0), ir(1), 1701).unwrap();
        assert!(g.finalize(1).is_empty());
        assert_eq!(g.time_offset(accel(0), ir(1)), Ok(1701));
        assert!(g.time_offset(accel(0), ir(0)).is_ok());
    }

    #[test]
    fn inconsistent_cycle_poisons_queries_touching_it() {
        let mut g = scenario();
        g.add_direct_offset(accel(0), gyro(0), 10).unwrap();
        g.add_direct_offset(accel(0), ir(1), 2000).unwrap();

        let residuals = g.finalize(1);
        assert_eq!(residuals.len(), 1);
        assert_eq!(residuals[0].residual_ns.abs(), 300);
        let mut on_cycle = residuals[0].sensors.clone();
        on_cycle.sort();
        let mut expected = vec![accel(0), ir(0), ir(1)];
        expected.sort();
        assert_eq!(on_cycle, expected);

        assert_eq!(
            g.time_offset(accel(0), ir(1)),
            Err(SourceError::TimeOffsetInconsistent {
                source_sensor: accel(0),
                destination_sensor: ir(1),
            })
        );
        assert!(matches!(
            g.time_offset(gyro(0), ir(0)),
            Err(SourceError::TimeOffsetInconsistent { .. })
        ));
        assert!(g.is_inconsistent(ir(0)));
        assert!(!g.is_inconsistent(gyro(0)));
    }

    #[test]
    fn branch_off_the_cycle_stays_answerable() {
        let mut g = TimeSyncGraph::new();
        // Inconsistent triangle ir0-ir1-ir2, separate consistent pair accel-gyro.
        g.add_direct_offset(ir(0), ir(1), 100).unwrap();
        g.add_direct_offset(ir(1), ir(2), 100).unwrap();
        g.add_direct_offset(ir(0), ir(2), 500).unwrap();
        g.add_direct_offset(accel(0), gyro(0), 42).unwrap();
        assert_eq!(g.finalize(5).len(), 1);

        assert_eq!(g.time_offset(accel(0), gyro(0)), Ok(42));
        assert_eq!(g.time_offset(ir(0), ir(0)), Ok(0));
        assert!(g.time_offset(ir(0), ir(2)).is_err());
    }

    #[test]
    fn bad_cycle_taints_its_whole_block() {
        let (r, a, b, c, d) = (ir(0), ir(1), ir(2), ir(3), ir(4));
        let mut g = TimeSyncGraph::new();
        g.add_direct_offset(r, a, 0).unwrap();
        g.add_direct_offset(r, b, 0).unwrap();
        g.add_direct_offset(r, d, 0).unwrap();
        g.add_direct_offset(a, b, 100).unwrap();
        g.add_direct_offset(a, c, 0).unwrap();
        g.add_direct_offset(b, c, 0).unwrap();
        g.add_direct_offset(c, d, 0).unwrap();
        // A pendant clock hanging off the block by a single offset.
        g.add_direct_offset(d, accel(0), 7).unwrap();

        assert!(!g.finalize(1).is_empty());

        // c -> d is one hop, yet c -> b -> a -> r -> d sums to -100.
        assert_eq!(
            g.time_offset(c, d),
            Err(SourceError::TimeOffsetInconsistent {
                source_sensor: c,
                destination_sensor: d,
            })
        );
        for s in [r, a, b, c, d] {
            assert!(g.is_inconsistent(s), "{s}");
            assert_eq!(g.time_offset(s, s), Ok(0));
        }
        assert!(!g.is_inconsistent(accel(0)));
        assert_eq!(g.time_offset(d, accel(0)), Ok(7));
        assert!(g.time_offset(c, accel(0)).is_err());
    }

    #[test]
    fn separate_blocks_sharing_a_clock() {
        // Bad triangle ir0-ir1-ir2 and good triangle ir2-accel-gyro meet at ir2.
        let mut g = TimeSyncGraph::new();
        g.add_direct_offset(ir(0), ir(1), 100).unwrap();
        g.add_direct_offset(ir(1), ir(2), 100).unwrap();
        g.add_direct_offset(ir(0), ir(2), 500).unwrap();
        g.add_direct_offset(ir(2), accel(0), 10).unwrap();
        g.add_direct_offset(accel(0), gyro(0), 20).unwrap();
        g.add_direct_offset(ir(2), gyro(0), 30).unwrap();
        assert_eq!(g.finalize(1).len(), 1);

        assert!(g.is_inconsistent(ir(2)));
        assert!(!g.is_inconsistent(gyro(0)));
        assert_eq!(g.time_offset(ir(2), gyro(0)), Ok(30));
        assert_eq!(g.time_offset(gyro(0), accel(0)), Ok(-20));
        assert!(g.time_offset(ir(1), gyro(0)).is_err());
    }

    #[test]
    fn equal_length_paths_agree() {
        // ir1 reaches accel in two hops through ir0 or through gyro.
        let mut g = TimeSyncGraph::new();
        g.add_direct_offset(ir(0), ir(1), 200).unwrap();
        g.add_direct_offset(ir(0), accel(0), -1500).unwrap();
        g.add_direct_offset(ir(1), gyro(0), 40).unwrap();
        g.add_direct_offset(gyro(0), accel(0), -1740).unwrap();
        assert!(g.finalize(0).is_empty());

        assert_eq!(g.time_offset(ir(1), accel(0)), Ok(-1700));
        assert_eq!(g.time_offset(accel(0), ir(1)), Ok(1700));
        assert_eq!(g.time_offset(ir(0), gyro(0)), Ok(240));
    }

    #[test]
    fn parallel_measurements_must_agree() {
        let mut g = TimeSyncGraph::new();
        g.add_direct_offset(ir(0), ir(1), 200).unwrap();
        g.add_direct_offset(ir(1), ir(0), -200).unwrap();
        assert!(g.finalize(0).is_empty());

        g.add_direct_offset(ir(0), ir(1), 250).unwrap();
        let residuals = g.finalize(10);
        assert_eq!(residuals.len(), 1);
        assert!(g.time_offset(ir(0), ir(1)).is_err());
    }

    #[test]
    fn finalize_recomputes_from_scratch() {
        let mut g = TimeSyncGraph::new();
        g.add_direct_offset(ir(0), ir(1), 100).unwrap();
        g.add_direct_offset(ir(0), ir(1), 130).unwrap();
        assert_eq!(g.finalize(10).len(), 1);
        assert_eq!(g.finalize(50).len(), 0);
        assert_eq!(g.time_offset(ir(0), ir(1)), Ok(100));
    }

    #[test]
    fn rejects_self_loop_and_unrepresentable_offset() {
        let mut g = TimeSyncGraph::new();
        assert!(matches!(
            g.add_direct_offset(ir(0), ir(0), 5),
            Err(SourceError::InvalidCalibration(_))
        ));
        assert!(matches!(
            g.add_direct_offset(ir(0), ir(1), i64::MIN),
            Err(SourceError::InvalidCalibration(_))
        ));
        assert_eq!(g.measured_count(), 0);
        assert!(g.sensors().is_empty());
    }

    #[test]
    fn overflowing_sum_is_unknown() {
        let mut g = TimeSyncGraph::new();
        g.add_direct_offset(ir(0), ir(1), i64::MAX).unwrap();
        g.add_direct_offset(ir(1), ir(2), i64::MAX).unwrap();
        g.finalize(0);
        assert!(matches!(
            g.time_offset(ir(0), ir(2)),
            Err(SourceError::TimeOffsetUnknown { .. })
        ));
    }
}
