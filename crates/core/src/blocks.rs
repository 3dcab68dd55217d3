//! Block slicing: carves the top-level entities into a nested tree by
//! sweeping a divider edge along one axis, then re-slicing each block
//! along the perpendicular axis.
//!
//! An entity here is either a loose element or a whole list; lists
//! move through the slicer as one unit so a block never cuts a list
//! in half.

use serde::Serialize;
use tracing::debug;

use crate::lists::{ListClass, ListEntity};
use crate::pipeline::IdAllocator;
use crate::table::{ElementClass, ElementId, ElementTable};
use crate::utils::{Alignment, Rect};

/// One unit the slicer moves around.
#[derive(Debug, Clone)]
pub enum Entity {
    Element(ElementId),
    List(ListEntity),
}

impl Entity {
    fn bbox(&self, table: &ElementTable) -> Rect {
        match self {
            Entity::Element(id) => table.get(*id).bbox,
            Entity::List(list) => list.bbox,
        }
    }

    /// Stable tie-break key for entities sharing a leading edge.
    fn tie_key(&self) -> (u8, usize) {
        match self {
            Entity::Element(id) => (0, *id),
            Entity::List(list) => (1, list.id),
        }
    }
}

/// A node of the reconstructed layout tree.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "class")]
pub enum Node {
    Block {
        id: String,
        position: Rect,
        children: Vec<Node>,
    },
    List {
        id: String,
        position: Rect,
        list_class: ListClass,
        list_alignment: Alignment,
        list_items: Vec<Vec<Node>>,
    },
    Text {
        id: String,
        position: Rect,
        #[serde(skip_serializing_if = "Option::is_none")]
        text_content: Option<String>,
    },
    Compo {
        id: String,
        position: Rect,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Node>,
    },
}

impl Node {
    pub fn position(&self) -> &Rect {
        match self {
            Node::Block { position, .. }
            | Node::List { position, .. }
            | Node::Text { position, .. }
            | Node::Compo { position, .. } => position,
        }
    }
}

/// Slices the top-level entities into the final node tree. The first
/// sweep runs top to bottom; each block re-slices its run left to
/// right, and so on, alternating.
pub fn build_layout_tree(
    table: &ElementTable,
    entities: Vec<Entity>,
    alloc: &mut IdAllocator,
) -> Vec<Node> {
    let axis = Alignment::Vertical;
    let (blocks, loose) = slice(table, entities, axis, alloc);
    debug!(blocks = blocks.len(), loose = loose.len(), "top-level sweep done");
    ordered_nodes(table, blocks, loose, axis)
}

/// One sweep along `axis`. Entities whose leading edge lies past the
/// running divider close the current run; a closed run of two or more
/// becomes a block. Runs only become blocks once at least one divider
/// has actually cut the sequence, so an undivided sweep wraps nothing.
fn slice(
    table: &ElementTable,
    mut entities: Vec<Entity>,
    axis: Alignment,
    alloc: &mut IdAllocator,
) -> (Vec<(usize, Rect, Node)>, Vec<Entity>) {
    entities.sort_by(|a, b| {
        axis.leading(&a.bbox(table))
            .total_cmp(&axis.leading(&b.bbox(table)))
            .then(a.tie_key().cmp(&b.tie_key()))
    });

    let mut blocks = Vec::new();
    let mut loose = Vec::new();
    let mut run: Vec<Entity> = Vec::new();
    let mut divided = false;
    let mut divider = f64::NEG_INFINITY;

    for entity in entities {
        let bbox = entity.bbox(table);
        if divider < axis.leading(&bbox) {
            match run.len() {
                0 => {}
                1 => {
                    divided = true;
                    loose.extend(run.drain(..));
                }
                _ => {
                    divided = true;
                    blocks.push(make_block(table, std::mem::take(&mut run), axis, alloc));
                }
            }
            divider = axis.trailing(&bbox);
        } else if axis.trailing(&bbox) > divider {
            divider = axis.trailing(&bbox);
        }
        run.push(entity);
    }
    if divided && run.len() > 1 {
        blocks.push(make_block(table, run, axis, alloc));
    } else {
        loose.extend(run);
    }
    (blocks, loose)
}

fn make_block(
    table: &ElementTable,
    members: Vec<Entity>,
    parent_axis: Alignment,
    alloc: &mut IdAllocator,
) -> (usize, Rect, Node) {
    let serial = alloc.next_block();
    let axis = parent_axis.perpendicular();
    let (blocks, loose) = slice(table, members, axis, alloc);
    let children = ordered_nodes(table, blocks, loose, axis);
    let position = children
        .iter()
        .map(|n| *n.position())
        .reduce(|a, b| a.union(&b))
        .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
    let node = Node::Block {
        id: format!("b-{serial}"),
        position,
        children,
    };
    (serial, position, node)
}

/// Merges sub-blocks and loose entities into one child list ordered
/// along `axis`.
fn ordered_nodes(
    table: &ElementTable,
    blocks: Vec<(usize, Rect, Node)>,
    loose: Vec<Entity>,
    axis: Alignment,
) -> Vec<Node> {
    let mut keyed: Vec<(f64, (u8, usize), Node)> = Vec::new();
    for (serial, position, node) in blocks {
        keyed.push((axis.leading(&position), (2, serial), node));
    }
    for entity in loose {
        let lead = axis.leading(&entity.bbox(table));
        let key = entity.tie_key();
        keyed.push((lead, key, entity_node(table, entity)));
    }
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, _, node)| node).collect()
}

fn entity_node(table: &ElementTable, entity: Entity) -> Node {
    match entity {
        Entity::Element(id) => element_node(table, id),
        Entity::List(list) => {
            let list_items = list
                .items
                .iter()
                .map(|item| item.iter().map(|&id| element_node(table, id)).collect())
                .collect();
            Node::List {
                id: format!("l-{}", list.id),
                position: list.bbox,
                list_class: list.class,
                list_alignment: list.alignment,
                list_items,
            }
        }
    }
}

fn element_node(table: &ElementTable, id: ElementId) -> Node {
    let e = table.get(id);
    match e.class {
        ElementClass::Text => Node::Text {
            id: format!("c-{id}"),
            position: e.bbox,
            text_content: e.text_content.clone(),
        },
        ElementClass::Compo | ElementClass::Block => Node::Compo {
            id: format!("c-{id}"),
            position: e.bbox,
            children: e
                .children
                .iter()
                .map(|&c| element_node(table, c))
                .collect(),
        },
    }
}
