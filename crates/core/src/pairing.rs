//! Group Pairing Engine: decides which groups represent the same
//! repeated structure offset from each other (e.g. two parallel
//! columns of a table).
//!
//! Matching relies on the mutual consistency of connecting-line angles
//! and perpendicular distances rather than absolute geometry, so it
//! tolerates the imprecision of detected bounding boxes. Pair ids are
//! merged through a disjoint-set instead of relabeling cascades.

use itertools::Itertools;
use tracing::debug;

use crate::disjoint::DisjointSet;
use crate::error::{LayoutError, Result};
use crate::params::LayoutParams;
use crate::pipeline::IdAllocator;
use crate::table::{ElementClass, ElementId, ElementTable, GroupId, PairId};
use crate::utils::{
    Alignment, Anchor, axis_gap, center_distance, connection_angle, perpendicular_gap,
};

/// Undirected match edges between elements, used by the list-item
/// engine to chain rows spanning more than two groups.
pub type PairEdges = Vec<(ElementId, ElementId)>;

#[derive(Debug, Clone)]
struct GroupUnit {
    id: GroupId,
    alignment: Alignment,
    /// Members sorted by center along the alignment axis, ties by id.
    members: Vec<ElementId>,
}

/// Pairs structurally analogous groups and repeated containers.
/// Returns the match edges; `group_pair` and `pair_to` tags are
/// written onto the table.
pub fn pair_groups(
    table: &mut ElementTable,
    params: &LayoutParams,
    alloc: &mut IdAllocator,
) -> Result<PairEdges> {
    let groups = group_snapshot(table);
    let containers = repeated_containers(table);
    let n = groups.len();
    let mut dsu = DisjointSet::new(n + containers.len());
    let mut edges: PairEdges = Vec::new();

    for i in 0..n {
        for j in i + 1..n {
            if groups[i].alignment != groups[j].alignment {
                continue;
            }
            if let Some(matched) = match_two_groups(table, params, &groups[i], &groups[j])? {
                debug!(g1 = groups[i].id.0, g2 = groups[j].id.0, "groups paired");
                dsu.union(i, j);
                for (a, b) in matched {
                    link(table, a, b);
                    edges.push((a, b));
                }
            }
        }
    }

    // Repeated containers are compared by the relative connection
    // graph of their children, not absolute geometry.
    let connections: Vec<Vec<f64>> = containers
        .iter()
        .map(|&id| child_connections(table, id))
        .collect();
    for i in 0..containers.len() {
        for j in i + 1..containers.len() {
            if match_connections(&connections[i], &connections[j], params.connection_ratio) {
                debug!(c1 = containers[i], c2 = containers[j], "containers paired");
                dsu.union(n + i, n + j);
                link(table, containers[i], containers[j]);
                edges.push((containers[i], containers[j]));
            }
        }
    }

    assign_pair_ids(table, &groups, &containers, &mut dsu, alloc);
    prune_interleaved_groups(table, params);
    Ok(edges)
}

fn group_snapshot(table: &ElementTable) -> Vec<GroupUnit> {
    table
        .groups()
        .into_iter()
        .filter_map(|(id, members)| {
            let alignment = table.get(members[0]).alignment?;
            let mut members = members;
            members.sort_by(|&a, &b| {
                alignment
                    .center(&table.get(a).bbox)
                    .total_cmp(&alignment.center(&table.get(b).bbox))
                    .then(a.cmp(&b))
            });
            Some(GroupUnit {
                id,
                alignment,
                members,
            })
        })
        .collect()
}

fn repeated_containers(table: &ElementTable) -> Vec<ElementId> {
    table
        .top_level_of_class(&[ElementClass::Block])
        .into_iter()
        .filter(|&id| table.get(id).children.len() >= 2)
        .collect()
}

/// Matches two groups of equal alignment. Returns the matched element
/// pairs on success.
fn match_two_groups(
    table: &ElementTable,
    params: &LayoutParams,
    g1: &GroupUnit,
    g2: &GroupUnit,
) -> Result<Option<Vec<(ElementId, ElementId)>>> {
    if g1.alignment != g2.alignment {
        return Err(LayoutError::InvariantViolation(format!(
            "pairing groups {} and {} with different alignment axes",
            g1.id.0, g2.id.0
        )));
    }
    let alignment = g1.alignment;

    // Connections further apart than twice the largest member extent
    // across the axis are never credible row/column links.
    let max_cross = g1
        .members
        .iter()
        .chain(&g2.members)
        .map(|&id| alignment.cross_extent(&table.get(id).bbox))
        .fold(0.0_f64, f64::max);
    let distance_limit = 2.0 * max_cross;

    let (shorter, longer, swapped) = if g1.members.len() <= g2.members.len() {
        (g1, g2, false)
    } else {
        (g2, g1, true)
    };

    let matched: Vec<(ElementId, ElementId)> = if shorter.members.len() == longer.members.len() {
        shorter
            .members
            .iter()
            .copied()
            .zip(longer.members.iter().copied())
            .collect()
    } else {
        if longer.members.len() > params.max_cardinality_ratio * shorter.members.len() {
            return Ok(None);
        }
        // Greedy nearest-by-distance matching of the shorter group
        // into the longer, measured along the alignment axis so the
        // member sharing a row (or column) band wins. Not globally
        // optimal; a known heuristic limitation.
        let mut taken = vec![false; longer.members.len()];
        let mut pairs = Vec::with_capacity(shorter.members.len());
        for &a in &shorter.members {
            let ba = &table.get(a).bbox;
            let best = longer
                .members
                .iter()
                .enumerate()
                .filter(|(k, _)| !taken[*k])
                .min_by(|&(_, &x), &(_, &y)| {
                    axis_gap(ba, &table.get(x).bbox, alignment)
                        .total_cmp(&axis_gap(ba, &table.get(y).bbox, alignment))
                        .then(x.cmp(&y))
                });
            if let Some((k, &b)) = best {
                taken[k] = true;
                pairs.push((a, b));
            }
        }
        pairs
    };

    let distances: Vec<f64> = matched
        .iter()
        .map(|&(a, b)| perpendicular_gap(&table.get(a).bbox, &table.get(b).bbox, alignment))
        .collect();
    if !fraction_consistent(
        &distances,
        params.match_threshold,
        |&di, &dj| {
            di <= distance_limit
                && dj <= distance_limit
                && ((di - dj).abs() < params.distance_tolerance
                    || di.max(dj) < params.distance_ratio * di.min(dj))
        },
    ) {
        return Ok(None);
    }

    let corner_ok = angles_consistent(table, &matched, Anchor::TopLeft, params);
    if !corner_ok && !angles_consistent(table, &matched, Anchor::Center, params) {
        return Ok(None);
    }

    let oriented = if swapped {
        matched.into_iter().map(|(a, b)| (b, a)).collect()
    } else {
        matched
    };
    Ok(Some(oriented))
}

fn angles_consistent(
    table: &ElementTable,
    matched: &[(ElementId, ElementId)],
    anchor: Anchor,
    params: &LayoutParams,
) -> bool {
    let angles: Vec<f64> = matched
        .iter()
        .map(|&(a, b)| connection_angle(&table.get(a).bbox, &table.get(b).bbox, anchor))
        .collect();
    fraction_consistent(&angles, params.match_threshold, |&ai, &aj| {
        (ai - aj).abs() < params.angle_tolerance
    })
}

/// True when at least `threshold` of the values mutually agree with
/// some other value under `agree`.
fn fraction_consistent<T>(values: &[T], threshold: f64, agree: impl Fn(&T, &T) -> bool) -> bool {
    if values.len() < 2 {
        return !values.is_empty();
    }
    let matched = values
        .iter()
        .enumerate()
        .filter(|(i, vi)| {
            values
                .iter()
                .enumerate()
                .any(|(j, vj)| *i != j && agree(vi, vj))
        })
        .count();
    matched as f64 >= values.len() as f64 * threshold
}

/// Pairwise center-to-center distances of a container's children.
fn child_connections(table: &ElementTable, container: ElementId) -> Vec<f64> {
    table
        .get(container)
        .children
        .iter()
        .tuple_combinations()
        .map(|(&a, &b)| center_distance(&table.get(a).bbox, &table.get(b).bbox))
        .collect()
}

/// Two containers hold "the same kind of group" when their children's
/// pairwise-distance multisets are mutually consistent within the
/// ratio tolerance for every connection of the smaller set.
fn match_connections(cons1: &[f64], cons2: &[f64], ratio: f64) -> bool {
    if cons1.len().abs_diff(cons2.len()) > 1 {
        return false;
    }
    let mut taken = vec![false; cons2.len()];
    let mut matched = 0usize;
    for &c1 in cons1 {
        for (k, &c2) in cons2.iter().enumerate() {
            if !taken[k] && c1.max(c2) < ratio * c1.min(c2) {
                taken[k] = true;
                matched += 1;
                break;
            }
        }
    }
    matched == cons1.len().min(cons2.len())
}

/// Sets `pair_to` mutually, first partner wins: an element already
/// holding a partner keeps it, so the relation stays symmetric.
fn link(table: &mut ElementTable, a: ElementId, b: ElementId) {
    if table.get(a).pair_to.is_none() && table.get(b).pair_to.is_none() {
        table.get_mut(a).pair_to = Some(b);
        table.get_mut(b).pair_to = Some(a);
    }
}

/// Mints one pair id per disjoint-set component of >= 2 nodes, in
/// ascending node order, and writes it onto every element involved.
fn assign_pair_ids(
    table: &mut ElementTable,
    groups: &[GroupUnit],
    containers: &[ElementId],
    dsu: &mut DisjointSet,
    alloc: &mut IdAllocator,
) {
    let total = groups.len() + containers.len();
    let mut size = vec![0usize; total];
    for idx in 0..total {
        size[dsu.find(idx)] += 1;
    }
    let mut pair_of_root: rustc_hash::FxHashMap<usize, PairId> = Default::default();
    for idx in 0..total {
        let root = dsu.find(idx);
        if size[root] < 2 {
            continue;
        }
        let pid = *pair_of_root.entry(root).or_insert_with(|| alloc.next_pair());
        if idx < groups.len() {
            for &id in &groups[idx].members {
                table.get_mut(id).group_pair = Some(pid);
            }
        } else {
            table.get_mut(containers[idx - groups.len()]).group_pair = Some(pid);
        }
    }
}

/// An unpaired 2-member group interleaved with foreign elements is
/// likely a false positive: dissolve it when an ungrouped element
/// overlaps most of its own area with the group's union box.
fn prune_interleaved_groups(table: &mut ElementTable, params: &LayoutParams) {
    for (gid, members) in table.groups() {
        if members.len() != 2 || members.iter().any(|&id| table.get(id).group_pair.is_some()) {
            continue;
        }
        let union = match table.bound_of(&members) {
            Some(u) => u,
            None => continue,
        };
        let interloper = table.iter().any(|e| {
            e.group.is_none()
                && e.parent.is_none()
                && e.area() > 0.0
                && e.bbox.intersection_area(&union) / e.area() >= params.interleave_overlap
        });
        if interloper {
            debug!(group = gid.0, "2-member group interleaved, dissolved");
            table.dissolve_group(gid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_multisets_match_within_ratio() {
        let a = [100.0, 140.0, 60.0];
        let b = [118.0, 150.0, 70.0];
        assert!(match_connections(&a, &b, 1.5));
        let c = [400.0, 30.0, 60.0];
        assert!(!match_connections(&a, &c, 1.5));
        // Cardinality differing by more than one never matches.
        assert!(!match_connections(&a[..1], &b, 1.5));
    }

    #[test]
    fn consistency_fraction() {
        let vals: [f64; 4] = [10.0, 11.0, 12.0, 90.0];
        // 3 of 4 mutually agree within 5.
        assert!(fraction_consistent(&vals, 0.7, |a, b| (a - b).abs() < 5.0));
        assert!(!fraction_consistent(&vals, 0.9, |a, b| (a - b).abs() < 5.0));
    }
}
