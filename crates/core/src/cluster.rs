//! 1-D density clustering over derived element attributes.
//!
//! Points within `eps` of each other, transitively, form one cluster;
//! isolated points form singleton clusters. Singletons mean "no
//! repetition" and are collapsed downstream. Clusters are run
//! independently per attribute and cross-referenced later; the raw
//! labels here are candidates, not final groups.

use rustc_hash::FxHashMap;

use crate::table::{ElementId, ElementTable};

/// Cluster label per element. Label values are cluster indexes in
/// ascending order of the clustered attribute.
pub type ClusterLabels = FxHashMap<ElementId, usize>;

/// Clusters `(id, value)` points along one axis. Points are chained
/// while consecutive sorted values stay within `eps`; ties broken by
/// id so the partition is deterministic.
pub fn cluster_1d(points: &[(ElementId, f64)], eps: f64) -> Vec<Vec<ElementId>> {
    if points.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<(ElementId, f64)> = points.to_vec();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut clusters: Vec<Vec<ElementId>> = Vec::new();
    let mut current: Vec<ElementId> = vec![sorted[0].0];
    let mut last = sorted[0].1;
    for &(id, value) in &sorted[1..] {
        if value - last <= eps {
            current.push(id);
        } else {
            clusters.push(std::mem::take(&mut current));
            current.push(id);
        }
        last = value;
    }
    clusters.push(current);
    clusters
}

/// Clusters the given elements by an attribute and returns the label
/// of every element.
pub fn cluster_by_attr(
    table: &ElementTable,
    ids: &[ElementId],
    attr: impl Fn(&crate::table::Element) -> f64,
    eps: f64,
) -> ClusterLabels {
    let points: Vec<(ElementId, f64)> = ids.iter().map(|&id| (id, attr(table.get(id)))).collect();
    let mut labels = ClusterLabels::default();
    for (label, cluster) in cluster_1d(&points, eps).into_iter().enumerate() {
        for id in cluster {
            labels.insert(id, label);
        }
    }
    labels
}

/// Arbitrates a grouping conflict: `element` sits in `current` (its
/// assigned group) but a new candidate cluster also claims it. Returns
/// true when the element should move to the candidate.
///
/// Decided by which side's mean area (excluding the element itself) is
/// closer to the element's own area. A current group that would be
/// starved down to a single member keeps the element regardless.
pub fn prefers_candidate(
    table: &ElementTable,
    element: ElementId,
    candidate: &[ElementId],
    current: &[ElementId],
) -> bool {
    let others = |ids: &[ElementId]| -> Vec<f64> {
        ids.iter()
            .filter(|&&id| id != element)
            .map(|&id| table.get(id).area())
            .collect()
    };
    let cand_areas = others(candidate);
    let cur_areas = others(current);
    if cur_areas.len() <= 1 {
        return false;
    }
    if cand_areas.is_empty() {
        return false;
    }

    let mean = |areas: &[f64]| areas.iter().sum::<f64>() / areas.len() as f64;
    let area = table.get(element).area();
    (area - mean(&cand_areas)).abs() < (area - mean(&cur_areas)).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ElementClass;
    use crate::utils::Rect;

    #[test]
    fn chains_within_eps() {
        let points = vec![(0, 0.0), (1, 5.0), (2, 9.0), (3, 40.0), (4, 44.0)];
        let clusters = cluster_1d(&points, 10.0);
        assert_eq!(clusters, vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn isolated_points_are_singletons() {
        let points = vec![(7, 100.0), (3, 0.0), (5, 50.0)];
        let clusters = cluster_1d(&points, 5.0);
        assert_eq!(clusters, vec![vec![3], vec![5], vec![7]]);
    }

    #[test]
    fn equal_values_tie_break_by_id() {
        let points = vec![(9, 1.0), (2, 1.0), (4, 1.0)];
        let clusters = cluster_1d(&points, 0.5);
        assert_eq!(clusters, vec![vec![2, 4, 9]]);
    }

    #[test]
    fn starving_group_keeps_element() {
        let mut table = ElementTable::new(400, 800);
        // Element 0 conflicts; its current group has exactly one other
        // member, so it stays even though the candidate's mean area is
        // a closer match.
        let e = table.push(ElementClass::Compo, Rect::new(0.0, 0.0, 10.0, 10.0));
        let cur = table.push(ElementClass::Compo, Rect::new(0.0, 50.0, 30.0, 80.0));
        let c1 = table.push(ElementClass::Compo, Rect::new(50.0, 0.0, 60.0, 10.0));
        let c2 = table.push(ElementClass::Compo, Rect::new(50.0, 20.0, 60.0, 30.0));
        assert!(!prefers_candidate(&table, e, &[e, c1, c2], &[e, cur]));
        // With a second member in the current group, area proximity wins.
        let cur2 = table.push(ElementClass::Compo, Rect::new(0.0, 90.0, 30.0, 120.0));
        assert!(prefers_candidate(&table, e, &[e, c1, c2], &[e, cur, cur2]));
    }
}
