//! Module: model
//! Responsibility: the slice of the document model the value index consumes.
//! Does not own: document storage or node materialization.

mod document;
mod node_set;
mod tree;

pub use document::{CollectionId, Document, DocumentId, DocumentSet};
pub use node_set::{NodeProxy, NodeSet};
pub use tree::{NodeId, TreeNumbering};
