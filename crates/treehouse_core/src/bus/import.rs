//! Snapshot import and export.
//!
//! # Invariants
//! - Imported nodes must be anchored: their parent chain ends at a system
//!   root or at a record already in the store.
//! - Temp nodes and parentless non-system nodes are never imported.
//! - Import does not notify change observers; attach hooks run instead.
//! - A node is listed by exactly one parent: replacing a record with a new
//!   parent unlinks it from the old one.

use super::{Bus, Node, NodeRecord};
use crate::model::raw_node::{is_system_id, NodeId, RawNode};
use indexmap::IndexMap;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

impl Bus {
    /// Merges a batch of records into the store.
    ///
    /// Records whose ID already exists replace the stored record. Dropped
    /// records (temp, parentless, orphaned) are discarded silently.
    pub fn import(&self, nodes: Vec<RawNode>) {
        let started_at = Instant::now();
        let total = nodes.len();

        let mut batch: IndexMap<NodeId, RawNode> = IndexMap::new();
        for raw in nodes {
            if raw.is_temp() || (raw.parent.is_none() && !is_system_id(&raw.id)) {
                continue;
            }
            batch.insert(raw.id.clone(), raw);
        }

        let mut anchored = HashMap::new();
        let ids = batch.keys().cloned().collect::<Vec<_>>();
        for id in &ids {
            self.resolve_anchor(id, &batch, &mut anchored);
        }
        batch.retain(|id, _| anchored.get(id).copied().unwrap_or(false));
        let kept = batch.keys().cloned().collect::<Vec<_>>();

        {
            let mut store = self.inner.store.borrow_mut();
            let mut touched = kept.iter().cloned().collect::<HashSet<_>>();
            for raw in batch.into_values() {
                let record = NodeRecord::from_raw(raw);
                let previous = store.get(&record.id).and_then(parent_link);
                if previous.is_some() && previous != parent_link(&record) {
                    if let Some((old_parent, old_rel)) = previous {
                        if let Some(parent) = store.get_mut(&old_parent) {
                            if let Some(ids) = parent.linked.get_mut(&old_rel) {
                                ids.retain(|linked| linked != &record.id);
                            }
                            touched.insert(old_parent);
                        }
                    }
                }
                store.insert(record.id.clone(), record);
            }

            // A kept relation list may only name records that point back at it.
            let owners = store
                .values()
                .map(|record| (record.id.clone(), parent_link(record)))
                .collect::<HashMap<_, _>>();
            for id in &kept {
                if let Some(record) = store.get_mut(id) {
                    for (rel, list) in record.linked.iter_mut() {
                        list.retain(|linked| {
                            matches!(
                                owners.get(linked),
                                Some(Some((parent, owner_rel))) if parent == id && owner_rel == rel
                            )
                        });
                    }
                }
            }

            for id in &kept {
                let Some((parent_id, rel)) = store.get(id).and_then(|record| {
                    record
                        .parent
                        .clone()
                        .map(|parent| (parent, record.rel_name().to_string()))
                }) else {
                    continue;
                };
                if let Some(parent) = store.get_mut(&parent_id) {
                    let list = parent.linked.entry(rel).or_default();
                    if !list.contains(id) {
                        list.push(id.clone());
                        touched.insert(parent_id);
                    }
                }
            }

            for id in &touched {
                if let Some(record) = store.get_mut(id) {
                    record.hash = record.content_hash();
                }
            }
        }

        let hooks = self
            .inner
            .attach_hooks
            .borrow()
            .iter()
            .map(Rc::clone)
            .collect::<Vec<_>>();
        if !hooks.is_empty() {
            for id in &kept {
                let node = Node::new(self.clone(), id.clone());
                for hook in &hooks {
                    hook(&node);
                }
            }
        }

        debug!(
            "event=bus_import module=bus status=ok total={} kept={} dropped={} duration_ms={}",
            total,
            kept.len(),
            total - kept.len(),
            started_at.elapsed().as_millis()
        );
    }

    /// Returns every record in store order.
    pub fn export(&self) -> Vec<RawNode> {
        self.inner
            .store
            .borrow()
            .values()
            .map(NodeRecord::to_raw)
            .collect()
    }

    fn resolve_anchor(
        &self,
        id: &str,
        batch: &IndexMap<NodeId, RawNode>,
        anchored: &mut HashMap<NodeId, bool>,
    ) -> bool {
        let mut chain: Vec<NodeId> = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = id.to_string();

        let result = loop {
            if let Some(known) = anchored.get(&cursor) {
                break *known;
            }
            if !seen.insert(cursor.clone()) {
                break false;
            }
            let Some(raw) = batch.get(&cursor) else {
                break self.contains(&cursor);
            };
            chain.push(cursor.clone());
            match &raw.parent {
                Some(parent) => cursor = parent.clone(),
                None => break true,
            }
        };

        for link in chain {
            anchored.insert(link, result);
        }
        result
    }
}

fn parent_link(record: &NodeRecord) -> Option<(NodeId, String)> {
    record
        .parent
        .clone()
        .map(|parent| (parent, record.rel_name().to_string()))
}
