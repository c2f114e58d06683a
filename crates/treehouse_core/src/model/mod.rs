//! Graph node data model.
//!
//! # Responsibility
//! - Define the serializable node record and the typed component payloads.
//! - Keep the persisted field naming in one place.
//!
//! # Invariants
//! - Every node is identified by a stable `NodeId`.
//! - Relations are ordered ID lists; order is the sibling order.

pub mod component;
pub mod raw_node;
