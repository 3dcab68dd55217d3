//! mirador - GUI layout reconstruction from flat element detections.
//!
//! Takes the bounding boxes a detector produced for one screenshot
//! and rebuilds structure: repeated-pattern groups, paired groups,
//! list items with missed-element repair, and a nested block tree.

pub mod blocks;
pub mod cluster;
pub mod disjoint;
pub mod error;
pub mod grouping;
pub mod items;
pub mod lists;
pub mod pairing;
pub mod params;
pub mod pipeline;
pub mod table;
pub mod utils;

pub use blocks::Node;
pub use error::{LayoutError, Result};
pub use lists::{ListClass, ListEntity};
pub use params::LayoutParams;
pub use pipeline::recognize_layout;
pub use table::{DetectionInput, Element, ElementClass, ElementId, ElementTable};
pub use utils::{Alignment, Rect};
