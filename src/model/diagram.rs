//! This module defines the geometry overlay of a model.
//!
//! Geometry is scoped per diagram: every scope is keyed by the id of the element
//! its plane decorates (a collaboration, a process, or a sub-process with its own
//! canvas), so the same element id may appear in two scopes without colliding.

use std::collections::HashMap;

use super::extension::{AttributeMap, ExtensionElement};

/// Position and size of a shape, label, or a single waypoint
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GraphicInfo {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    /// Only meaningful for collapsible sub-processes
    pub expanded: Option<bool>,
    /// Only meaningful for pools and lanes
    pub horizontal: Option<bool>,
}

impl GraphicInfo {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        GraphicInfo {
            x,
            y,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn point(x: f64, y: f64) -> Self {
        GraphicInfo {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = Some(expanded);
        self
    }
}

/// What a shape or edge carried besides its geometry.
///
/// Only kept when it differs from what the writer emits by default.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiDetails {
    /// Id of the shape or edge itself; `None` writes `BPMNShape_<id>` or `BPMNEdge_<id>`
    pub di_id: Option<String>,
    pub extension_attributes: AttributeMap,
    pub foreign_children: Vec<ExtensionElement>,
}

impl DiDetails {
    pub fn is_empty(&self) -> bool {
        self.di_id.is_none() && self.extension_attributes.is_empty() && self.foreign_children.is_empty()
    }
}

/// An insertion-ordered map keyed by element id.
///
/// Equality is set equality over `(id, value)` pairs; the insertion order only
/// drives the order of emission.
#[derive(Debug, Clone)]
pub struct IdMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize, ahash::RandomState>,
}

impl<V> Default for IdMap<V> {
    fn default() -> Self {
        IdMap {
            entries: Vec::new(),
            index: HashMap::default(),
        }
    }
}

impl<V> IdMap<V> {
    /// Insert or replace the value for `id`; a replaced id keeps its original position
    pub fn insert(&mut self, id: impl Into<String>, value: V) {
        let id = id.into();
        match self.index.get(&id) {
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, value));
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&V> {
        self.index.get(id).map(|&position| &self.entries[position].1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<V> {
        let position = self.index.remove(id)?;
        let (_, value) = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(id, value)| (id.as_str(), value))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: PartialEq> PartialEq for IdMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(id, value)| other.get(id).is_some_and(|o| o == value))
    }
}

/// Geometry of one diagram plane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagramScope {
    /// Id of the element the plane decorates
    pub scope_id: String,
    pub diagram_id: Option<String>,
    pub plane_id: Option<String>,
    pub shapes: IdMap<GraphicInfo>,
    pub edges: IdMap<Vec<GraphicInfo>>,
    pub labels: IdMap<GraphicInfo>,
    pub shape_details: IdMap<DiDetails>,
    pub edge_details: IdMap<DiDetails>,
    /// Unconsumed attributes of the diagram element
    pub diagram_attributes: AttributeMap,
    /// Unconsumed attributes of the plane element
    pub plane_attributes: AttributeMap,
    /// Plane children other than shapes and edges
    pub foreign_children: Vec<ExtensionElement>,
}

impl DiagramScope {
    pub fn new(scope_id: impl Into<String>) -> Self {
        DiagramScope {
            scope_id: scope_id.into(),
            ..Default::default()
        }
    }

    pub fn add_shape(&mut self, id: impl Into<String>, info: GraphicInfo) {
        self.shapes.insert(id, info);
    }

    pub fn add_edge(&mut self, id: impl Into<String>, waypoints: Vec<GraphicInfo>) {
        self.edges.insert(id, waypoints);
    }

    pub fn add_label(&mut self, id: impl Into<String>, info: GraphicInfo) {
        self.labels.insert(id, info);
    }

    /// Every element id that has geometry in this scope
    pub fn element_ids(&self) -> impl Iterator<Item = &str> {
        self.shapes.ids().chain(self.edges.ids())
    }
}

/// All diagram scopes of a model, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagramInterchange {
    scopes: Vec<DiagramScope>,
}

impl DiagramInterchange {
    pub fn scopes(&self) -> &[DiagramScope] {
        &self.scopes
    }

    pub fn scope(&self, scope_id: &str) -> Option<&DiagramScope> {
        self.scopes.iter().find(|s| s.scope_id == scope_id)
    }

    /// The scope for `scope_id`, created at the end of the declaration order if absent
    pub fn scope_mut(&mut self, scope_id: &str) -> &mut DiagramScope {
        let position = match self.scopes.iter().position(|s| s.scope_id == scope_id) {
            Some(position) => position,
            None => {
                self.scopes.push(DiagramScope::new(scope_id));
                self.scopes.len() - 1
            }
        };
        &mut self.scopes[position]
    }

    pub fn push_scope(&mut self, scope: DiagramScope) {
        match self.scopes.iter_mut().find(|s| s.scope_id == scope.scope_id) {
            Some(existing) => {
                for (id, info) in scope.shapes.iter() {
                    existing.shapes.insert(id, *info);
                }
                for (id, waypoints) in scope.edges.iter() {
                    existing.edges.insert(id, waypoints.clone());
                }
                for (id, info) in scope.labels.iter() {
                    existing.labels.insert(id, *info);
                }
                for (id, details) in scope.shape_details.iter() {
                    existing.shape_details.insert(id, details.clone());
                }
                for (id, details) in scope.edge_details.iter() {
                    existing.edge_details.insert(id, details.clone());
                }
                existing.foreign_children.extend(scope.foreign_children);
            }
            None => self.scopes.push(scope),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Shape geometry for `id`, searching scopes in declaration order
    pub fn graphic_info(&self, id: &str) -> Option<&GraphicInfo> {
        self.scopes.iter().find_map(|s| s.shapes.get(id))
    }

    /// Waypoints of the edge `id`, searching scopes in declaration order
    pub fn waypoints(&self, id: &str) -> Option<&[GraphicInfo]> {
        self.scopes
            .iter()
            .find_map(|s| s.edges.get(id))
            .map(Vec::as_slice)
    }

    pub fn label_graphic_info(&self, id: &str) -> Option<&GraphicInfo> {
        self.scopes.iter().find_map(|s| s.labels.get(id))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_map_equality_ignores_order() {
        let mut a = IdMap::default();
        a.insert("one", 1);
        a.insert("two", 2);
        let mut b = IdMap::default();
        b.insert("two", 2);
        b.insert("one", 1);
        assert_eq!(a, b);
        b.insert("one", 3);
        assert_ne!(a, b);
    }

    #[test]
    fn id_map_remove_keeps_index_consistent() {
        let mut map = IdMap::default();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        assert_eq!(map.remove("a"), Some(1));
        assert_eq!(map.get("c"), Some(&3));
        assert_eq!(map.ids().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn same_id_in_two_scopes_does_not_collide() {
        let mut di = DiagramInterchange::default();
        di.scope_mut("process").add_shape("task", GraphicInfo::new(0.0, 0.0, 10.0, 10.0));
        di.scope_mut("subProcess").add_shape("task", GraphicInfo::new(50.0, 50.0, 20.0, 20.0));

        assert_eq!(di.scopes().len(), 2);
        assert_eq!(di.scope("process").and_then(|s| s.shapes.get("task")).map(|g| g.x), Some(0.0));
        assert_eq!(di.scope("subProcess").and_then(|s| s.shapes.get("task")).map(|g| g.x), Some(50.0));
    }
}
