//! End-to-end layout reconstruction: grouping, pairing, list items,
//! repair, list materialization and block slicing, in that order.

use tracing::debug;

use crate::error::Result;
use crate::table::{ElementId, ElementTable, GroupId, ItemId, PairId};
use crate::params::LayoutParams;
use crate::{blocks, grouping, items, lists, pairing};
use crate::blocks::{Entity, Node};

/// Serial id source for the artifacts of one run. Every id family
/// counts from zero so two runs over the same input produce identical
/// output.
#[derive(Debug, Default)]
pub struct IdAllocator {
    group: usize,
    pair: usize,
    item: usize,
    list: usize,
    block: usize,
}

impl IdAllocator {
    pub fn next_group(&mut self) -> GroupId {
        let id = self.group;
        self.group += 1;
        GroupId(id)
    }

    pub fn next_pair(&mut self) -> PairId {
        let id = self.pair;
        self.pair += 1;
        PairId(id)
    }

    pub fn next_item(&mut self) -> ItemId {
        let id = self.item;
        self.item += 1;
        ItemId(id)
    }

    pub fn next_list(&mut self) -> usize {
        let id = self.list;
        self.list += 1;
        id
    }

    pub fn next_block(&mut self) -> usize {
        let id = self.block;
        self.block += 1;
        id
    }
}

/// Runs the full reconstruction over a populated table and returns
/// the layout tree of the screen, ordered top to bottom.
pub fn recognize_layout(table: &mut ElementTable, params: &LayoutParams) -> Result<Vec<Node>> {
    let mut alloc = IdAllocator::default();

    grouping::recog_repetition_nontext(table, params, &mut alloc);
    grouping::recog_repetition_text(table, params, &mut alloc);
    debug!(groups = table.groups().len(), "repetition recognized");

    let mut edges = pairing::pair_groups(table, params, &mut alloc)?;
    debug!(pairs = table.pairs().len(), edges = edges.len(), "groups paired");

    items::partition_list_items(table, &edges, &mut alloc)?;
    items::repair_missing_items(table, params, &mut edges);

    let (lists, consumed) = lists::materialize_lists(table, &mut alloc);
    debug!(lists = lists.len(), "lists materialized");

    let mut entities: Vec<Entity> = lists.into_iter().map(Entity::List).collect();
    entities.extend(
        loose_elements(table, &consumed)
            .into_iter()
            .map(Entity::Element),
    );
    Ok(blocks::build_layout_tree(table, entities, &mut alloc))
}

/// Top-level elements no list consumed. Children of a container ride
/// along inside their parent and never slice on their own.
fn loose_elements(
    table: &ElementTable,
    consumed: &rustc_hash::FxHashSet<ElementId>,
) -> Vec<ElementId> {
    table
        .iter()
        .filter(|e| e.parent.is_none() && !consumed.contains(&e.id))
        .map(|e| e.id)
        .collect()
}
