//! Group Builder: converts cluster labels into validated alignment
//! groups.
//!
//! Non-text elements group on position plus area (icons and buttons
//! repeat with near-identical size); text elements group on edge
//! position only. Candidate groups are then validated by gap
//! consistency and, for 2-member groups, by area symmetry.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use tracing::debug;

use crate::cluster::{ClusterLabels, cluster_1d, cluster_by_attr, prefers_candidate};
use crate::params::LayoutParams;
use crate::pipeline::IdAllocator;
use crate::table::{Element, ElementClass, ElementId, ElementTable, GroupId};
use crate::utils::Alignment;

/// Recognizes repeated non-text elements: vertical runs keyed on
/// (area, center_column) clusters, then horizontal runs keyed on
/// (area, center_row) clusters with conflict arbitration.
pub fn recog_repetition_nontext(
    table: &mut ElementTable,
    params: &LayoutParams,
    alloc: &mut IdAllocator,
) {
    let ids = table.top_level_of_class(&[ElementClass::Compo]);
    if ids.len() < 2 {
        return;
    }
    let col = cluster_by_attr(table, &ids, |e| e.bbox.center_column(), params.nontext_position_eps);
    let row = cluster_by_attr(table, &ids, |e| e.bbox.center_row(), params.nontext_position_eps);
    let area = cluster_by_attr(table, &ids, Element::area, params.nontext_area_eps);

    assign_groups(table, &composite_clusters(&ids, &area, &col), Alignment::Vertical, alloc);
    validate_groups(table, params, alloc);
    assign_groups_with_conflict(
        table,
        &composite_clusters(&ids, &area, &row),
        Alignment::Horizontal,
        alloc,
    );
    validate_groups(table, params, alloc);
    collapse_singleton_groups(table);
    debug!(groups = table.groups().len(), "non-text repetition recognized");
}

/// Recognizes repeated text elements: horizontal runs keyed on row_min
/// clusters, vertical runs keyed on column_min clusters, plus a final
/// regrouping of leftovers sharing a column cluster.
pub fn recog_repetition_text(
    table: &mut ElementTable,
    params: &LayoutParams,
    alloc: &mut IdAllocator,
) {
    let ids = table.top_level_of_class(&[ElementClass::Text]);
    if ids.len() < 2 {
        return;
    }
    let row = cluster_by_attr(table, &ids, |e| e.bbox.row_min, params.text_position_eps);
    let col = cluster_by_attr(table, &ids, |e| e.bbox.column_min, params.text_position_eps);

    assign_groups(table, &simple_clusters(&ids, &row), Alignment::Horizontal, alloc);
    validate_groups(table, params, alloc);
    assign_groups_with_conflict(table, &simple_clusters(&ids, &col), Alignment::Vertical, alloc);
    validate_groups(table, params, alloc);
    regroup_leftovers(table, &simple_clusters(&ids, &col), Alignment::Vertical, alloc);
    validate_groups(table, params, alloc);
    collapse_singleton_groups(table);
    debug!(groups = table.groups().len(), "text repetition recognized");
}

/// Elements sharing the same pair of cluster labels, ordered by label.
fn composite_clusters(
    ids: &[ElementId],
    a: &ClusterLabels,
    b: &ClusterLabels,
) -> Vec<Vec<ElementId>> {
    let mut map: BTreeMap<(usize, usize), Vec<ElementId>> = BTreeMap::new();
    for &id in ids {
        map.entry((a[&id], b[&id])).or_default().push(id);
    }
    map.into_values().collect()
}

fn simple_clusters(ids: &[ElementId], labels: &ClusterLabels) -> Vec<Vec<ElementId>> {
    let mut map: BTreeMap<usize, Vec<ElementId>> = BTreeMap::new();
    for &id in ids {
        map.entry(labels[&id]).or_default().push(id);
    }
    map.into_values().collect()
}

/// Every cluster of size >= 2 becomes a fresh candidate group.
fn assign_groups(
    table: &mut ElementTable,
    clusters: &[Vec<ElementId>],
    alignment: Alignment,
    alloc: &mut IdAllocator,
) {
    for cluster in clusters {
        if cluster.len() < 2 {
            continue;
        }
        let gid = alloc.next_group();
        for &id in cluster {
            let e = table.get_mut(id);
            e.group = Some(gid);
            e.alignment = Some(alignment);
        }
    }
}

/// Like [`assign_groups`], but members may already belong to a group
/// from an earlier scan axis. The conflict is arbitrated by mean-area
/// proximity; a current group that would be starved to a single
/// member keeps its element.
fn assign_groups_with_conflict(
    table: &mut ElementTable,
    clusters: &[Vec<ElementId>],
    alignment: Alignment,
    alloc: &mut IdAllocator,
) {
    for cluster in clusters {
        if cluster.len() < 2 {
            continue;
        }
        let gid = alloc.next_group();
        let mut member_num = cluster.len();
        for &id in cluster {
            match table.get(id).group {
                None => {
                    let e = table.get_mut(id);
                    e.group = Some(gid);
                    e.alignment = Some(alignment);
                }
                Some(current) if current != gid => {
                    if member_num <= 1 {
                        continue;
                    }
                    let current_members = table.group_members(current);
                    if prefers_candidate(table, id, cluster, &current_members) {
                        let e = table.get_mut(id);
                        e.group = Some(gid);
                        e.alignment = Some(alignment);
                    } else {
                        member_num -= 1;
                    }
                }
                Some(_) => {}
            }
        }
    }
    collapse_singleton_groups(table);
}

/// Groups leftover (still ungrouped) elements that share a cluster.
fn regroup_leftovers(
    table: &mut ElementTable,
    clusters: &[Vec<ElementId>],
    alignment: Alignment,
    alloc: &mut IdAllocator,
) {
    for cluster in clusters {
        let leftover: Vec<ElementId> = cluster
            .iter()
            .copied()
            .filter(|&id| table.get(id).group.is_none())
            .collect();
        if leftover.len() < 2 {
            continue;
        }
        let gid = alloc.next_group();
        for &id in &leftover {
            let e = table.get_mut(id);
            e.group = Some(gid);
            e.alignment = Some(alignment);
        }
    }
}

/// Runs the area-symmetry and gap-consistency checks over every group.
pub fn validate_groups(table: &mut ElementTable, params: &LayoutParams, alloc: &mut IdAllocator) {
    for (gid, members) in table.groups() {
        let is_text = table.get(members[0]).class == ElementClass::Text;
        check_two_member_area(table, gid, params);
        validate_group_gaps(table, gid, params.gap_eps(is_text), alloc);
    }
}

/// A 2-member group is too weak a signal to trust without area
/// corroboration: dissolve it when the areas diverge materially.
pub fn check_two_member_area(table: &mut ElementTable, group: GroupId, params: &LayoutParams) {
    let members = table.group_members(group);
    if members.len() != 2 {
        return;
    }
    let a = table.get(members[0]).area();
    let b = table.get(members[1]).area();
    let (small, big) = if a < b { (a, b) } else { (b, a) };
    if big > params.two_member_area_ratio * small && big - small > params.two_member_area_diff {
        table.dissolve_group(group);
    }
}

/// Gap-consistency validation: evicts members whose spacing along the
/// alignment axis does not recur, then splits the survivors at
/// gap-run boundaries.
///
/// The eviction loop is a monotonically shrinking fixed point; it
/// terminates after at most |group| iterations.
pub fn validate_group_gaps(
    table: &mut ElementTable,
    group: GroupId,
    eps: f64,
    alloc: &mut IdAllocator,
) {
    let alignment = match table
        .group_members(group)
        .first()
        .and_then(|&id| table.get(id).alignment)
    {
        Some(a) => a,
        None => return,
    };

    let gap_labels = loop {
        let members = sorted_members(table, group, alignment);
        if members.len() <= 1 {
            table.dissolve_group(group);
            return;
        }
        if members.len() == 2 {
            // A single gap carries no consistency signal.
            return;
        }

        let positions: Vec<f64> = members
            .iter()
            .map(|&id| alignment.leading(&table.get(id).bbox))
            .collect();
        let gaps: Vec<(usize, f64)> = positions
            .windows(2)
            .enumerate()
            .map(|(i, w)| (i, w[1] - w[0]))
            .collect();

        let clusters = cluster_1d(&gaps, eps);
        let mut evicted: SmallVec<[ElementId; 4]> = SmallVec::new();
        for cluster in &clusters {
            if let [gap_index] = cluster.as_slice() {
                // The endpoint member that introduced the outlier gap:
                // a straggler leading the sequence owns the first gap,
                // every other outlier gap is owned by its successor.
                if *gap_index == 0 {
                    evicted.push(members[0]);
                } else {
                    evicted.push(members[gap_index + 1]);
                }
            }
        }
        if evicted.is_empty() {
            let mut labels = vec![0usize; gaps.len()];
            for (li, cluster) in clusters.iter().enumerate() {
                for &gi in cluster {
                    labels[gi] = li;
                }
            }
            break labels;
        }
        for id in evicted {
            table.get_mut(id).clear_group();
        }
    };

    split_on_gap_runs(table, group, alignment, &gap_labels, alloc);
}

/// Splits a group whose gaps form several contiguous runs of distinct
/// spacing (interleaved heterogeneous spacing within one coarse
/// cluster). The first run keeps the group id; later runs of >= 2
/// members get fresh ids, stragglers dissolve.
fn split_on_gap_runs(
    table: &mut ElementTable,
    group: GroupId,
    alignment: Alignment,
    gap_labels: &[usize],
    alloc: &mut IdAllocator,
) {
    let mut cuts: Vec<usize> = Vec::new();
    for i in 1..gap_labels.len() {
        if gap_labels[i] != gap_labels[i - 1] {
            cuts.push(i);
        }
    }
    if cuts.is_empty() {
        return;
    }

    let members = sorted_members(table, group, alignment);
    let mut start = 0usize;
    let mut first = true;
    for cut in cuts.into_iter().chain([gap_labels.len()]) {
        // Gap run [start..cut] spans members [start..=cut].
        let segment = &members[start..=cut];
        if first {
            if segment.len() < 2 {
                for &id in segment {
                    table.get_mut(id).clear_group();
                }
            }
            first = false;
        } else if segment.len() >= 2 {
            let gid = alloc.next_group();
            for &id in segment {
                table.get_mut(id).group = Some(gid);
            }
        } else {
            for &id in segment {
                table.get_mut(id).clear_group();
            }
        }
        start = cut + 1;
    }
}

/// Collapses groups that shrank below 2 members back to "no pattern".
pub fn collapse_singleton_groups(table: &mut ElementTable) {
    for (gid, members) in table.groups() {
        if members.len() < 2 {
            table.dissolve_group(gid);
        }
    }
}

fn sorted_members(
    table: &ElementTable,
    group: GroupId,
    alignment: Alignment,
) -> Vec<ElementId> {
    let mut members = table.group_members(group);
    members.sort_by(|&a, &b| {
        alignment
            .leading(&table.get(a).bbox)
            .total_cmp(&alignment.leading(&table.get(b).bbox))
            .then(a.cmp(&b))
    });
    members
}
