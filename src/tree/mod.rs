//! Labeled Tree Documents
//!
//! Place files are XML trees of `<Item>` elements. Each item is named by its
//! `Name` property, may carry a `referent`, and may point at other items through
//! `<Ref>` properties.

pub mod codec;
pub mod document;
pub mod index;
pub mod remap;

pub use codec::{load_document, parse_document, save_document, write_document, write_subtree};
pub use document::{Content, Document, Element, NodeId};
pub use index::PathIndex;
pub use remap::{mint_referent, remap_referents, Remapping};
