//! List-item partitioning and repair.
//!
//! Within each pair, match edges chain elements that sit on the same
//! visual row (or column) into a list item. Items that come up short
//! of the dominant cardinality are then repaired by projecting the
//! missing element's expected region from a complete item and
//! absorbing any stray detection that fills it.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{LayoutError, Result};
use crate::pairing::PairEdges;
use crate::params::LayoutParams;
use crate::pipeline::IdAllocator;
use crate::table::{ElementId, ElementTable, GroupId, ItemId};
use crate::utils::Rect;

/// Assigns a list-item id to every paired element. Items are the
/// connected components of the match edges restricted to one pair;
/// an element no edge reaches becomes a singleton item.
pub fn partition_list_items(
    table: &mut ElementTable,
    edges: &PairEdges,
    alloc: &mut IdAllocator,
) -> Result<()> {
    let mut adjacency: FxHashMap<ElementId, Vec<ElementId>> = FxHashMap::default();
    for &(a, b) in edges {
        if table.get(a).group_pair != table.get(b).group_pair {
            return Err(LayoutError::InvariantViolation(format!(
                "match edge {a}-{b} crosses pair boundaries"
            )));
        }
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    for (pid, members) in table.pairs() {
        let in_pair: FxHashSet<ElementId> = members.iter().copied().collect();
        let mut visited: FxHashSet<ElementId> = FxHashSet::default();
        // Ascending member order makes item ids deterministic.
        for &seed in &members {
            if visited.contains(&seed) {
                continue;
            }
            // A paired container is one whole item by itself; its
            // match edge records the partner, not a shared row.
            if table.get(seed).group.is_none() {
                visited.insert(seed);
                table.get_mut(seed).list_item = Some(alloc.next_item());
                continue;
            }
            let item = alloc.next_item();
            let mut stack = vec![seed];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                table.get_mut(id).list_item = Some(item);
                if let Some(next) = adjacency.get(&id) {
                    stack.extend(next.iter().filter(|n| in_pair.contains(*n)));
                }
            }
        }
        debug!(pair = pid.0, members = members.len(), "pair partitioned");
    }
    Ok(())
}

/// Repairs items missing a member relative to the pair's dominant
/// item size, by absorbing ungrouped elements of the right class that
/// cover the projected region.
pub fn repair_missing_items(
    table: &mut ElementTable,
    params: &LayoutParams,
    edges: &mut PairEdges,
) {
    for (pid, members) in table.pairs() {
        // Container pairs carry no groups and repair by child identity
        // makes no sense for them.
        if members.iter().any(|&id| table.get(id).group.is_none()) {
            continue;
        }
        let items = items_of(table, &members);
        let Some(mode) = dominant_size(&items) else {
            continue;
        };
        let Some(complete) = items.values().find(|m| m.len() == mode) else {
            continue;
        };
        let template: Vec<(GroupId, ElementId)> = complete
            .iter()
            .filter_map(|&id| table.get(id).group.map(|g| (g, id)))
            .collect();
        let complete_anchor = top_left(table, complete);

        for (item, item_members) in &items {
            if item_members.len() >= mode {
                continue;
            }
            let present: FxHashSet<GroupId> = item_members
                .iter()
                .filter_map(|&id| table.get(id).group)
                .collect();
            let anchor = top_left(table, item_members);
            for &(gid, reference) in &template {
                if present.contains(&gid) {
                    continue;
                }
                let offset_col = table.get(reference).bbox.column_min - complete_anchor.0;
                let offset_row = table.get(reference).bbox.row_min - complete_anchor.1;
                let region = table
                    .get(reference)
                    .bbox
                    .anchored_at(anchor.0 + offset_col, anchor.1 + offset_row);
                if let Some(found) =
                    absorb_candidate(table, params, gid, reference, &region)
                {
                    let partner = item_members[0];
                    table.get_mut(found).group_pair = Some(pid);
                    table.get_mut(found).list_item = Some(*item);
                    edges.push((found, partner));
                    if table.get(found).pair_to.is_none()
                        && table.get(partner).pair_to.is_none()
                    {
                        table.get_mut(found).pair_to = Some(partner);
                        table.get_mut(partner).pair_to = Some(found);
                    }
                    debug!(
                        pair = pid.0,
                        element = found,
                        "missed element absorbed into deficient item"
                    );
                }
            }
        }
    }
}

fn items_of(table: &ElementTable, members: &[ElementId]) -> BTreeMap<ItemId, Vec<ElementId>> {
    let mut map: BTreeMap<ItemId, Vec<ElementId>> = BTreeMap::new();
    for &id in members {
        if let Some(item) = table.get(id).list_item {
            map.entry(item).or_default().push(id);
        }
    }
    map
}

/// The most frequent item cardinality, favoring the larger size on a
/// frequency tie. Returns None when every item already agrees.
fn dominant_size(items: &BTreeMap<ItemId, Vec<ElementId>>) -> Option<usize> {
    let mut freq: BTreeMap<usize, usize> = BTreeMap::new();
    for members in items.values() {
        *freq.entry(members.len()).or_insert(0) += 1;
    }
    if freq.len() < 2 {
        return None;
    }
    freq.into_iter()
        .max_by(|(sa, fa), (sb, fb)| fa.cmp(fb).then(sa.cmp(sb)))
        .map(|(size, _)| size)
}

fn top_left(table: &ElementTable, members: &[ElementId]) -> (f64, f64) {
    let col = members
        .iter()
        .map(|&id| table.get(id).bbox.column_min)
        .fold(f64::INFINITY, f64::min);
    let row = members
        .iter()
        .map(|&id| table.get(id).bbox.row_min)
        .fold(f64::INFINITY, f64::min);
    (col, row)
}

/// First ungrouped, unpaired element of the reference's class whose
/// own area falls mostly inside the projected region.
fn absorb_candidate(
    table: &mut ElementTable,
    params: &LayoutParams,
    gid: GroupId,
    reference: ElementId,
    region: &Rect,
) -> Option<ElementId> {
    let class = table.get(reference).class;
    let alignment = table.get(reference).alignment;
    let found = table.iter().find(|e| {
        e.group_pair.is_none()
            && e.group.is_none()
            && e.parent.is_none()
            && e.class == class
            && e.area() > 0.0
            && e.bbox.intersection_area(region) / e.area() >= params.repair_overlap
    })?;
    let id = found.id;
    let e = table.get_mut(id);
    e.group = Some(gid);
    e.alignment = alignment;
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_size_prefers_frequency_then_larger() {
        let mut items: BTreeMap<ItemId, Vec<ElementId>> = BTreeMap::new();
        items.insert(ItemId(0), vec![1, 2]);
        items.insert(ItemId(1), vec![3, 4]);
        items.insert(ItemId(2), vec![5]);
        assert_eq!(dominant_size(&items), Some(2));

        let mut tied: BTreeMap<ItemId, Vec<ElementId>> = BTreeMap::new();
        tied.insert(ItemId(0), vec![1, 2]);
        tied.insert(ItemId(1), vec![3]);
        assert_eq!(dominant_size(&tied), Some(2));
    }

    #[test]
    fn uniform_items_need_no_repair() {
        let mut items: BTreeMap<ItemId, Vec<ElementId>> = BTreeMap::new();
        items.insert(ItemId(0), vec![1, 2]);
        items.insert(ItemId(1), vec![3, 4]);
        assert_eq!(dominant_size(&items), None);
    }
}
