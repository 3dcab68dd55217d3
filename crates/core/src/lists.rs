//! Materializes list entities out of the grouping and pairing tags.
//!
//! A multi list is one pair: its items (rows or columns of matched
//! elements) ordered along the shared axis. A single list is a group
//! that never found a partner; each member is a one-element item.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::pipeline::IdAllocator;
use crate::table::{ElementId, ElementTable, ItemId};
use crate::utils::{Alignment, Rect, bound_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListClass {
    Single,
    Multi,
}

/// A finished list: the unit the block slicer treats as one entity.
#[derive(Debug, Clone)]
pub struct ListEntity {
    pub id: usize,
    pub class: ListClass,
    pub alignment: Alignment,
    pub bbox: Rect,
    /// Items in layout order along the alignment axis; each item in
    /// ascending element-id order.
    pub items: Vec<Vec<ElementId>>,
}

/// Builds the list entities and reports which elements they consumed.
pub fn materialize_lists(
    table: &ElementTable,
    alloc: &mut IdAllocator,
) -> (Vec<ListEntity>, FxHashSet<ElementId>) {
    let mut lists = Vec::new();
    let mut consumed: FxHashSet<ElementId> = FxHashSet::default();

    for (pid, members) in table.pairs() {
        if members.len() < 2 {
            continue;
        }
        let mut by_item: BTreeMap<ItemId, Vec<ElementId>> = BTreeMap::new();
        for &id in &members {
            if let Some(item) = table.get(id).list_item {
                by_item.entry(item).or_default().push(id);
            }
        }
        let mut items: Vec<Vec<ElementId>> = by_item.into_values().collect();
        let alignment = pair_alignment(table, &members, &items);
        items.sort_by(|a, b| {
            item_lead(table, a, alignment)
                .total_cmp(&item_lead(table, b, alignment))
                .then(a[0].cmp(&b[0]))
        });
        let Some(bbox) = table.bound_of(&members) else {
            continue;
        };
        consumed.extend(&members);
        let id = alloc.next_list();
        debug!(list = id, pair = pid.0, items = items.len(), "multi list built");
        lists.push(ListEntity {
            id,
            class: ListClass::Multi,
            alignment,
            bbox,
            items,
        });
    }

    for (gid, members) in table.groups() {
        if members.len() < 2 || members.iter().any(|&id| consumed.contains(&id)) {
            continue;
        }
        let Some(alignment) = table.get(members[0]).alignment else {
            continue;
        };
        let mut items: Vec<Vec<ElementId>> = members.iter().map(|&id| vec![id]).collect();
        items.sort_by(|a, b| {
            alignment
                .leading(&table.get(a[0]).bbox)
                .total_cmp(&alignment.leading(&table.get(b[0]).bbox))
                .then(a[0].cmp(&b[0]))
        });
        let Some(bbox) = table.bound_of(&members) else {
            continue;
        };
        consumed.extend(&members);
        let id = alloc.next_list();
        debug!(list = id, group = gid.0, items = items.len(), "single list built");
        lists.push(ListEntity {
            id,
            class: ListClass::Single,
            alignment,
            bbox,
            items,
        });
    }

    (lists, consumed)
}

/// The list axis. Grouped members carry it directly; container pairs
/// do not, so it is inferred from how the items spread out.
fn pair_alignment(
    table: &ElementTable,
    members: &[ElementId],
    items: &[Vec<ElementId>],
) -> Alignment {
    if let Some(alignment) = members.iter().find_map(|&id| table.get(id).alignment) {
        return alignment;
    }
    let centers: Vec<(f64, f64)> = items
        .iter()
        .filter_map(|item| bound_of(item.iter().map(|&id| table.get(id).bbox)))
        .map(|b| (b.center_column(), b.center_row()))
        .collect();
    let spread = |vals: Vec<f64>| {
        let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
        max - min
    };
    let col_spread = spread(centers.iter().map(|c| c.0).collect());
    let row_spread = spread(centers.iter().map(|c| c.1).collect());
    if row_spread >= col_spread {
        Alignment::Vertical
    } else {
        Alignment::Horizontal
    }
}

fn item_lead(table: &ElementTable, item: &[ElementId], alignment: Alignment) -> f64 {
    item.iter()
        .map(|&id| alignment.leading(&table.get(id).bbox))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ElementClass;

    fn table_with_column() -> (ElementTable, Vec<ElementId>) {
        let mut table = ElementTable::new(400, 400);
        let ids: Vec<ElementId> = (0..3)
            .map(|k| {
                table.push(
                    ElementClass::Compo,
                    Rect::new(20.0, 20.0 + 60.0 * k as f64, 60.0, 50.0 + 60.0 * k as f64),
                )
            })
            .collect();
        (table, ids)
    }

    #[test]
    fn unpaired_group_becomes_single_list() {
        let (mut table, ids) = table_with_column();
        let mut alloc = IdAllocator::default();
        let gid = alloc.next_group();
        for &id in &ids {
            let e = table.get_mut(id);
            e.group = Some(gid);
            e.alignment = Some(Alignment::Vertical);
        }
        let (lists, consumed) = materialize_lists(&table, &mut alloc);
        assert_eq!(lists.len(), 1);
        let list = &lists[0];
        assert_eq!(list.class, ListClass::Single);
        assert_eq!(list.items.len(), 3);
        // Items run top to bottom.
        assert_eq!(list.items[0], vec![ids[0]]);
        assert_eq!(list.items[2], vec![ids[2]]);
        assert_eq!(consumed.len(), 3);
        assert_eq!(list.bbox, Rect::new(20.0, 20.0, 60.0, 170.0));
    }

    #[test]
    fn paired_groups_become_one_multi_list() {
        let (mut table, left) = table_with_column();
        let right: Vec<ElementId> = (0..3)
            .map(|k| {
                table.push(
                    ElementClass::Text,
                    Rect::new(80.0, 25.0 + 60.0 * k as f64, 200.0, 45.0 + 60.0 * k as f64),
                )
            })
            .collect();
        let mut alloc = IdAllocator::default();
        let g1 = alloc.next_group();
        let g2 = alloc.next_group();
        let pid = alloc.next_pair();
        for (&id, g) in left.iter().map(|i| (i, g1)).chain(right.iter().map(|i| (i, g2))) {
            let e = table.get_mut(id);
            e.group = Some(g);
            e.alignment = Some(Alignment::Vertical);
            e.group_pair = Some(pid);
        }
        for k in 0..3 {
            let item = alloc.next_item();
            table.get_mut(left[k]).list_item = Some(item);
            table.get_mut(right[k]).list_item = Some(item);
        }
        let (lists, consumed) = materialize_lists(&table, &mut alloc);
        assert_eq!(lists.len(), 1);
        let list = &lists[0];
        assert_eq!(list.class, ListClass::Multi);
        assert_eq!(list.alignment, Alignment::Vertical);
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.items[0], vec![left[0], right[0]]);
        assert_eq!(consumed.len(), 6);
    }
}
