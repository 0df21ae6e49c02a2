//! JSON debug view of a built registry.
use indexmap::IndexMap;
use serde::Serialize;

use crate::element::{Seq, ShapeId};
use crate::registry::Registry;
use crate::resolve::tag_names;

#[derive(Debug, Clone, Serialize)]
pub struct RegistryView {
    /// Rule name → its top-level sequence.
    pub rules: IndexMap<String, String>,
    pub shapes: Vec<ShapeView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeView {
    pub id: ShapeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub elements: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn registry_view(registry: &Registry) -> RegistryView {
    let rules = registry
        .rules()
        .map(|rule| (rule.name.clone(), Seq(&rule.elements).to_string()))
        .collect();
    let shapes = registry
        .shapes()
        .map(|shape| {
            let (tags, error) = match tag_names(registry, shape) {
                Ok(tags) => (tags, None),
                Err(err) => (Vec::new(), Some(err.to_string())),
            };
            ShapeView {
                id: shape.id,
                name: shape.name.clone(),
                elements: Seq(&shape.elements).to_string(),
                tags,
                error,
            }
        })
        .collect();
    RegistryView { rules, shapes }
}
