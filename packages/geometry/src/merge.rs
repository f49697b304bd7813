//! Merging fragmented centrelines.
//!
//! Sources deliver one named street as dozens of short segments split at
//! every intersection. [`merge_lines`] stitches segments whose endpoints
//! meet (within a snap tolerance) at nodes of degree two, leaving one line
//! per unbranched component. [`chain_fragments`] is the fallback when the
//! fragments don't touch at all.

use std::collections::BTreeMap;

use geo::{Coord, LineString};
use rstar::{RTree, primitives::GeomWithData};

use crate::{distance, line::LineExt};

type NodePoint = GeomWithData<[f64; 2], usize>;

/// Axis along which [`chain_fragments`] orders fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAxis {
    /// Order by x (west to east).
    X,
    /// Order by y (south to north).
    Y,
}

impl ChainAxis {
    const fn pick(self, c: Coord<f64>) -> f64 {
        match self {
            Self::X => c.x,
            Self::Y => c.y,
        }
    }

    /// The axis of the longer side of the fragments' combined extent.
    #[must_use]
    pub fn dominant(lines: &[LineString<f64>]) -> Self {
        let mut min = Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        };
        let mut max = Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        };
        for c in lines.iter().flat_map(|l| l.0.iter()) {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        if max.y - min.y > max.x - min.x {
            Self::Y
        } else {
            Self::X
        }
    }
}

/// Assigns every line endpoint to a node, snapping endpoints closer than
/// `tolerance` to the same node.
struct NodeIndex {
    tree: RTree<NodePoint>,
    next: usize,
    tolerance2: f64,
}

impl NodeIndex {
    fn new(tolerance: f64) -> Self {
        Self {
            tree: RTree::new(),
            next: 0,
            tolerance2: tolerance * tolerance,
        }
    }

    fn node_for(&mut self, c: Coord<f64>) -> usize {
        let key = [c.x, c.y];
        if let Some(found) = self.tree.locate_within_distance(key, self.tolerance2).next() {
            return found.data;
        }
        let id = self.next;
        self.next += 1;
        self.tree.insert(GeomWithData::new(key, id));
        id
    }
}

/// Merges lines that share endpoints into maximal unbranched lines.
///
/// Endpoints within `tolerance` of each other are treated as the same
/// node. Lines are joined only through nodes touched by exactly two lines,
/// so branches stay separate. Lines with fewer than two coordinates are
/// dropped.
#[must_use]
pub fn merge_lines(lines: &[LineString<f64>], tolerance: f64) -> Vec<LineString<f64>> {
    let lines: Vec<&LineString<f64>> = lines.iter().filter(|l| l.0.len() >= 2).collect();
    let mut index = NodeIndex::new(tolerance);
    let mut ends = Vec::with_capacity(lines.len());
    let mut incident: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for (idx, line) in lines.iter().enumerate() {
        let (first, last) = (line.0[0], line.0[line.0.len() - 1]);
        let a = index.node_for(first);
        let b = index.node_for(last);
        ends.push((a, b));
        incident.entry(a).or_default().push(idx);
        incident.entry(b).or_default().push(idx);
    }

    let degree = |node: usize| incident.get(&node).map_or(0, Vec::len);

    // Start walks at branch points and dead ends so that open chains come
    // out whole; whatever is left afterwards is a closed loop.
    let mut order: Vec<usize> = (0..lines.len()).collect();
    order.sort_by_key(|&idx| {
        let (a, b) = ends[idx];
        usize::from(degree(a) == 2 && degree(b) == 2)
    });

    let mut used = vec![false; lines.len()];
    let mut merged = Vec::new();

    for start in order {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut coords = lines[start].0.clone();
        let (head, tail) = ends[start];

        extend(&mut coords, tail, &lines, &ends, &incident, &mut used);
        coords.reverse();
        extend(&mut coords, head, &lines, &ends, &incident, &mut used);
        coords.reverse();

        merged.push(LineString::new(coords));
    }

    log::trace!("merged {} lines into {}", lines.len(), merged.len());
    merged
}

fn extend(
    coords: &mut Vec<Coord<f64>>,
    mut node: usize,
    lines: &[&LineString<f64>],
    ends: &[(usize, usize)],
    incident: &BTreeMap<usize, Vec<usize>>,
    used: &mut [bool],
) {
    loop {
        let Some(touching) = incident.get(&node) else {
            return;
        };
        if touching.len() != 2 {
            return;
        }
        let Some(&next) = touching.iter().find(|&&idx| !used[idx]) else {
            return;
        };
        used[next] = true;

        let (a, b) = ends[next];
        let mut piece = lines[next].0.clone();
        if a == node {
            node = b;
        } else {
            piece.reverse();
            node = a;
        }
        coords.extend(piece.into_iter().skip(1));
    }
}

/// Chains disjoint fragments into one line.
///
/// Fragments are ordered by their centre along `axis`; each is then
/// appended in whichever orientation leaves the smaller gap to the end of
/// the chain so far.
#[must_use]
pub fn chain_fragments(fragments: &[LineString<f64>], axis: ChainAxis) -> Option<LineString<f64>> {
    let mut ordered: Vec<(f64, &LineString<f64>)> = fragments
        .iter()
        .filter(|l| l.0.len() >= 2)
        .filter_map(|l| l.center().map(|c| (axis.pick(c), l)))
        .collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut iter = ordered.into_iter().map(|(_, l)| l);
    let first = iter.next()?;
    let mut coords = first.0.clone();
    if axis.pick(coords[0]) > axis.pick(coords[coords.len() - 1]) {
        coords.reverse();
    }

    for fragment in iter {
        let tail = coords[coords.len() - 1];
        let mut piece = fragment.0.clone();
        if distance(tail, piece[piece.len() - 1]) < distance(tail, piece[0]) {
            piece.reverse();
        }
        let skip = usize::from(distance(tail, piece[0]) <= 1e-9);
        coords.extend(piece.into_iter().skip(skip));
    }

    Some(LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_touching_segments() {
        let lines = vec![
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(20.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(20.0, 0.0), (30.0, 5.0)]),
        ];
        let merged = merge_lines(&lines, 0.5);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].length_m() - (20.0 + 125.0_f64.sqrt())).abs() < 1e-9);
        assert_eq!(merged[0].0.len(), 4);
    }

    #[test]
    fn snaps_nearly_touching_endpoints() {
        let lines = vec![
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(10.3, 0.0), (20.0, 0.0)]),
        ];
        assert_eq!(merge_lines(&lines, 0.5).len(), 1);
        assert_eq!(merge_lines(&lines, 0.1).len(), 2);
    }

    #[test]
    fn branches_stay_separate() {
        let lines = vec![
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(10.0, 0.0), (20.0, 0.0)]),
            LineString::from(vec![(10.0, 0.0), (10.0, 10.0)]),
        ];
        assert_eq!(merge_lines(&lines, 0.5).len(), 3);
    }

    #[test]
    fn closed_loop_merges_once() {
        let lines = vec![
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(10.0, 0.0), (10.0, 10.0)]),
            LineString::from(vec![(10.0, 10.0), (0.0, 0.0)]),
        ];
        let merged = merge_lines(&lines, 0.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].0.len(), 4);
    }

    #[test]
    fn chains_disjoint_fragments_in_axis_order() {
        let fragments = vec![
            LineString::from(vec![(50.0, 0.0), (40.0, 1.0)]),
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(20.0, 0.0), (30.0, 0.0)]),
        ];
        let chained = chain_fragments(&fragments, ChainAxis::X).unwrap();
        let xs: Vec<f64> = chained.0.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn dominant_axis_follows_extent() {
        let lines = vec![LineString::from(vec![(0.0, 0.0), (5.0, 100.0)])];
        assert_eq!(ChainAxis::dominant(&lines), ChainAxis::Y);
    }
}
