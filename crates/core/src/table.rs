//! The canonical in-memory element table.
//!
//! One row per detected element, keyed by a stable id assigned at
//! ingestion. Pipeline stages enrich rows with grouping tags instead of
//! replacing them, so later stages can always re-query earlier results.

use serde::Deserialize;

use crate::error::{LayoutError, Result};
use crate::utils::{Alignment, Rect, bound_of};

/// Stable element id: the row index assigned once at ingestion.
pub type ElementId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub usize);

/// Class of a detected element. `Block` marks a detection-side
/// container carrying its own children, distinct from the blocks the
/// slicer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementClass {
    Text,
    Compo,
    Block,
}

impl ElementClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementClass::Text => "Text",
            ElementClass::Compo => "Compo",
            ElementClass::Block => "Block",
        }
    }
}

/// One detected atomic unit plus its mutable grouping tags.
///
/// The geometry never changes after ingestion; the tags start empty
/// (the "no pattern" state) and are filled in by the pipeline stages.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub class: ElementClass,
    pub bbox: Rect,
    pub text_content: Option<String>,
    /// Children ids for detection-side containers, empty otherwise.
    pub children: Vec<ElementId>,
    pub parent: Option<ElementId>,

    pub group: Option<GroupId>,
    pub alignment: Option<Alignment>,
    pub group_pair: Option<PairId>,
    pub pair_to: Option<ElementId>,
    pub list_item: Option<ItemId>,
}

impl Element {
    pub fn width(&self) -> f64 {
        self.bbox.width()
    }

    pub fn height(&self) -> f64 {
        self.bbox.height()
    }

    pub fn area(&self) -> f64 {
        self.bbox.area()
    }

    /// Clears every grouping tag back to the "no pattern" state.
    pub fn clear_group(&mut self) {
        self.group = None;
        self.alignment = None;
    }
}

/// Raw element geometry as emitted by the detection/merge step. Both
/// the nested `position` object and flat fields are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    pub class: String,
    #[serde(default)]
    pub position: Option<RawPosition>,
    #[serde(default)]
    pub column_min: Option<f64>,
    #[serde(default)]
    pub column_max: Option<f64>,
    #[serde(default)]
    pub row_min: Option<f64>,
    #[serde(default)]
    pub row_max: Option<f64>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<usize>>,
    #[serde(default)]
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    pub column_min: f64,
    pub column_max: f64,
    pub row_min: f64,
    pub row_max: f64,
}

/// Top-level structure of a detection result file.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionInput {
    pub compos: Vec<RawElement>,
    /// `[rows, columns]` or `[rows, columns, channels]` of the source image.
    pub img_shape: Vec<u32>,
}

/// The shared tabular state every pipeline stage reads and enriches.
#[derive(Debug, Clone)]
pub struct ElementTable {
    elements: Vec<Element>,
    pub img_width: u32,
    pub img_height: u32,
}

impl ElementTable {
    pub fn new(img_width: u32, img_height: u32) -> Self {
        Self {
            elements: Vec::new(),
            img_width,
            img_height,
        }
    }

    /// Validates a detection result and admits it as a table. Fails
    /// fast on the first malformed element; no partial table is ever
    /// admitted.
    pub fn from_detection(input: DetectionInput) -> Result<Self> {
        let (img_height, img_width) = match input.img_shape.as_slice() {
            [h, w] | [h, w, _] => (*h, *w),
            other => {
                return Err(LayoutError::Data {
                    id: 0,
                    msg: format!("img_shape must have 2 or 3 entries, got {}", other.len()),
                });
            }
        };

        let mut table = Self::new(img_width, img_height);
        for (id, raw) in input.compos.into_iter().enumerate() {
            let class = match raw.class.as_str() {
                "Text" => ElementClass::Text,
                // The region-proposal engine labels full-width
                // containers "Background"; geometrically they behave
                // like plain components.
                "Compo" | "Background" => ElementClass::Compo,
                "Block" => ElementClass::Block,
                other => {
                    return Err(LayoutError::Data {
                        id,
                        msg: format!("unknown class {other:?}"),
                    });
                }
            };

            let bbox = match (&raw.position, raw.column_min, raw.column_max, raw.row_min, raw.row_max) {
                (Some(p), ..) => Rect::new(p.column_min, p.row_min, p.column_max, p.row_max),
                (None, Some(c0), Some(c1), Some(r0), Some(r1)) => Rect::new(c0, r0, c1, r1),
                _ => {
                    return Err(LayoutError::Data {
                        id,
                        msg: "missing geometry fields".into(),
                    });
                }
            };
            validate_bbox(id, &bbox)?;

            table.elements.push(Element {
                id,
                class,
                bbox,
                text_content: raw.text_content,
                children: raw.children.unwrap_or_default(),
                parent: raw.parent,
                group: None,
                alignment: None,
                group_pair: None,
                pair_to: None,
                list_item: None,
            });
        }

        // Parent/child references must stay inside the table and
        // describe a forest; the output tree is built by recursing
        // through `children`, so a cycle must be refused here.
        let len = table.elements.len();
        for elem in &table.elements {
            for &child in &elem.children {
                if child >= len {
                    return Err(LayoutError::Data {
                        id: elem.id,
                        msg: format!("child id {child} out of range"),
                    });
                }
                if child == elem.id {
                    return Err(LayoutError::Data {
                        id: elem.id,
                        msg: "element lists itself as a child".into(),
                    });
                }
                if table.elements[child].parent != Some(elem.id) {
                    return Err(LayoutError::Data {
                        id: elem.id,
                        msg: format!("child id {child} does not name this element as its parent"),
                    });
                }
            }
            if let Some(parent) = elem.parent
                && parent >= len
            {
                return Err(LayoutError::Data {
                    id: elem.id,
                    msg: format!("parent id {parent} out of range"),
                });
            }
        }
        for elem in &table.elements {
            let mut cursor = elem.parent;
            let mut hops = 0usize;
            while let Some(p) = cursor {
                hops += 1;
                if hops > len {
                    return Err(LayoutError::Data {
                        id: elem.id,
                        msg: "containment cycle".into(),
                    });
                }
                cursor = table.elements[p].parent;
            }
        }
        Ok(table)
    }

    /// Appends an element, assigning the next id. Meant for building
    /// tables programmatically; ids are never reused.
    pub fn push(&mut self, class: ElementClass, bbox: Rect) -> ElementId {
        let id = self.elements.len();
        self.elements.push(Element {
            id,
            class,
            bbox,
            text_content: None,
            children: Vec::new(),
            parent: None,
            group: None,
            alignment: None,
            group_pair: None,
            pair_to: None,
            list_item: None,
        });
        id
    }

    pub fn push_text(&mut self, bbox: Rect, text: &str) -> ElementId {
        let id = self.push(ElementClass::Text, bbox);
        self.elements[id].text_content = Some(text.to_string());
        id
    }

    /// Marks `parent` as the container of `children`.
    pub fn set_container(&mut self, parent: ElementId, children: &[ElementId]) {
        self.elements[parent].children = children.to_vec();
        for &c in children {
            self.elements[c].parent = Some(parent);
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    pub fn get_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.elements.iter_mut()
    }

    /// Ids of top-level (non-contained) elements of the given classes,
    /// in id order.
    pub fn top_level_of_class(&self, classes: &[ElementClass]) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|e| e.parent.is_none() && classes.contains(&e.class))
            .map(|e| e.id)
            .collect()
    }

    /// Members of one group, in id order.
    pub fn group_members(&self, group: GroupId) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|e| e.group == Some(group))
            .map(|e| e.id)
            .collect()
    }

    /// All groups with their members, sorted by group id.
    pub fn groups(&self) -> Vec<(GroupId, Vec<ElementId>)> {
        let mut map: std::collections::BTreeMap<GroupId, Vec<ElementId>> = Default::default();
        for e in &self.elements {
            if let Some(g) = e.group {
                map.entry(g).or_default().push(e.id);
            }
        }
        map.into_iter().collect()
    }

    /// Members of one group-pair, in id order.
    pub fn pair_members(&self, pair: PairId) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|e| e.group_pair == Some(pair))
            .map(|e| e.id)
            .collect()
    }

    /// All group-pairs with their members, sorted by pair id.
    pub fn pairs(&self) -> Vec<(PairId, Vec<ElementId>)> {
        let mut map: std::collections::BTreeMap<PairId, Vec<ElementId>> = Default::default();
        for e in &self.elements {
            if let Some(p) = e.group_pair {
                map.entry(p).or_default().push(e.id);
            }
        }
        map.into_iter().collect()
    }

    /// Union bounding box of the given elements.
    pub fn bound_of(&self, ids: &[ElementId]) -> Option<Rect> {
        bound_of(ids.iter().map(|&id| self.elements[id].bbox))
    }

    /// Dissolves a group: resets every member's group tags.
    pub fn dissolve_group(&mut self, group: GroupId) {
        for e in &mut self.elements {
            if e.group == Some(group) {
                e.clear_group();
            }
        }
    }
}

fn validate_bbox(id: usize, bbox: &Rect) -> Result<()> {
    let fields = [
        bbox.column_min,
        bbox.row_min,
        bbox.column_max,
        bbox.row_max,
    ];
    if fields.iter().any(|v| !v.is_finite()) {
        return Err(LayoutError::Data {
            id,
            msg: "non-finite geometry".into(),
        });
    }
    if bbox.column_max < bbox.column_min || bbox.row_max < bbox.row_min {
        return Err(LayoutError::Data {
            id,
            msg: format!(
                "degenerate bbox: columns [{}, {}], rows [{}, {}]",
                bbox.column_min, bbox.column_max, bbox.row_min, bbox.row_max
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_bbox() {
        let input = DetectionInput {
            compos: vec![RawElement {
                class: "Compo".into(),
                position: None,
                column_min: Some(10.0),
                column_max: Some(5.0),
                row_min: Some(0.0),
                row_max: Some(5.0),
                text_content: None,
                children: None,
                parent: None,
            }],
            img_shape: vec![800, 400, 3],
        };
        assert!(matches!(
            ElementTable::from_detection(input),
            Err(LayoutError::Data { id: 0, .. })
        ));
    }

    #[test]
    fn accepts_nested_position() {
        let input = DetectionInput {
            compos: vec![RawElement {
                class: "Background".into(),
                position: Some(RawPosition {
                    column_min: 0.0,
                    column_max: 100.0,
                    row_min: 0.0,
                    row_max: 50.0,
                }),
                column_min: None,
                column_max: None,
                row_min: None,
                row_max: None,
                text_content: None,
                children: None,
                parent: None,
            }],
            img_shape: vec![800, 400],
        };
        let table = ElementTable::from_detection(input).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).class, ElementClass::Compo);
        assert_eq!(table.get(0).area(), 5000.0);
        assert_eq!(table.img_height, 800);
    }

    fn raw_block(children: Option<Vec<usize>>, parent: Option<usize>) -> RawElement {
        RawElement {
            class: "Block".into(),
            position: None,
            column_min: Some(0.0),
            column_max: Some(100.0),
            row_min: Some(0.0),
            row_max: Some(50.0),
            text_content: None,
            children,
            parent,
        }
    }

    #[test]
    fn rejects_self_referential_child() {
        let input = DetectionInput {
            compos: vec![raw_block(Some(vec![0]), None)],
            img_shape: vec![800, 400, 3],
        };
        assert!(matches!(
            ElementTable::from_detection(input),
            Err(LayoutError::Data { id: 0, .. })
        ));
    }

    #[test]
    fn rejects_containment_cycle() {
        // 0 and 1 claim each other as parent and child.
        let input = DetectionInput {
            compos: vec![raw_block(Some(vec![1]), Some(1)), raw_block(Some(vec![0]), Some(0))],
            img_shape: vec![800, 400, 3],
        };
        assert!(ElementTable::from_detection(input).is_err());
    }

    #[test]
    fn rejects_child_with_disagreeing_parent() {
        let input = DetectionInput {
            compos: vec![raw_block(Some(vec![1]), None), raw_block(None, None)],
            img_shape: vec![800, 400, 3],
        };
        assert!(matches!(
            ElementTable::from_detection(input),
            Err(LayoutError::Data { id: 0, .. })
        ));
    }
}
