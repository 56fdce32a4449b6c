//! The identifier to record map backing a project.
//!
//! The registry is deliberately dumb: it never synthesizes records, never
//! validates that references point somewhere, and never cascades deletes.
//! Referential integrity is left to the callers that mutate the graph.

use indexmap::IndexMap;

use super::identifier::{Identifier, IdentifierGenerator};
use super::value::Record;
use crate::types::Result;

/// Flat map from identifier to raw record, in file order.
#[derive(Debug, Default)]
pub struct Registry {
    objects: IndexMap<Identifier, Record>,
    generator: IdentifierGenerator,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry whose identifiers come from `generator`.
    pub fn with_generator(generator: IdentifierGenerator) -> Self {
        Self {
            objects: IndexMap::new(),
            generator,
        }
    }

    /// Returns the record stored under `id`, if any.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.objects.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Stores `record` under a freshly generated identifier.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::XcError::GenerationExhausted`] if no free
    /// identifier could be drawn.
    pub fn put(&mut self, record: Record) -> Result<Identifier> {
        let objects = &self.objects;
        let id = self.generator.generate(|candidate| objects.contains_key(candidate))?;
        tracing::debug!(%id, isa = ?record.get("isa"), "registered object");
        self.objects.insert(id.clone(), record);
        Ok(id)
    }

    /// Stores `record` under a known identifier, replacing any previous record.
    pub fn insert(&mut self, id: Identifier, record: Record) {
        self.objects.insert(id, record);
    }

    /// Overwrites the record stored under `id` in place.
    ///
    /// Keeps the record's position in file order when it already exists.
    pub fn replace(&mut self, id: &Identifier, record: Record) {
        match self.objects.get_mut(id.as_str()) {
            Some(slot) => *slot = record,
            None => {
                self.objects.insert(id.clone(), record);
            }
        }
    }

    /// Removes the record stored under `id`.
    ///
    /// Other records that reference `id` are left untouched and will resolve
    /// to broken references afterwards.
    pub fn delete(&mut self, id: &str) -> Option<Record> {
        self.objects.shift_remove(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &Identifier> {
        self.objects.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &Record)> {
        self.objects.iter()
    }

    /// Identifiers of every record whose `isa` equals `isa`.
    pub fn ids_with_isa(&self, isa: &str) -> Vec<Identifier> {
        self.objects
            .iter()
            .filter(|(_, record)| record.get("isa").and_then(|v| v.as_str()) == Some(isa))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::identifier::is_identifier;
    use crate::project::value::{Value, record};
    use std::collections::HashSet;

    #[test]
    fn put_returns_distinct_identifiers() {
        let mut registry = Registry::with_generator(IdentifierGenerator::from_seed(11));
        let mut seen = HashSet::new();
        for i in 0..200 {
            let id = registry
                .put(record([("isa", Value::from("PBXGroup")), ("name", Value::from(format!("g{i}")))]))
                .unwrap();
            assert!(is_identifier(id.as_str()));
            assert!(seen.insert(id));
        }
        assert_eq!(registry.len(), 200);
    }

    #[test]
    fn get_never_synthesizes() {
        let registry = Registry::new();
        assert!(registry.get("000000000000000000000000").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn replace_keeps_position() {
        let mut registry = Registry::with_generator(IdentifierGenerator::from_seed(1));
        let first = registry.put(record([("name", Value::from("a"))])).unwrap();
        let second = registry.put(record([("name", Value::from("b"))])).unwrap();
        registry.replace(&first, record([("name", Value::from("c"))]));

        let order: Vec<_> = registry.ids().cloned().collect();
        assert_eq!(order, vec![first.clone(), second]);
        assert_eq!(registry.get(first.as_str()).unwrap()["name"], Value::from("c"));
    }

    #[test]
    fn delete_does_not_touch_referrers() {
        let mut registry = Registry::with_generator(IdentifierGenerator::from_seed(2));
        let child = registry.put(record([("isa", Value::from("PBXFileReference"))])).unwrap();
        let parent = registry
            .put(record([
                ("isa", Value::from("PBXGroup")),
                ("children", Value::Array(vec![Value::from(&child)])),
            ]))
            .unwrap();

        assert!(registry.delete(child.as_str()).is_some());
        let children = registry.get(parent.as_str()).unwrap()["children"].as_array().unwrap();
        assert_eq!(children, &[Value::from(&child)]);
    }
}
