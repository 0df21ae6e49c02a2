//! Capture registry: every capture scope by id, every rule body by name.
//!
//! Populated completely by the builder (phase 1) before any cross-rule query
//! runs; nonterminal names are resolved against the finished map (phase 2).
use indexmap::IndexMap;

use crate::element::{Element, ShapeId};
use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedShape {
    pub id: ShapeId,
    /// Set only when the capture is exactly a rule's whole body.
    pub name: Option<String>,
    pub elements: Vec<Element>,
}

/// Top-level sequence of one rule, i.e. what a nonterminal reference expands to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBody {
    pub name: String,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    shapes: Vec<CapturedShape>,
    rules: IndexMap<String, RuleBody>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closed capture scope under the next dense id.
    pub fn register(&mut self, elements: Vec<Element>, name: Option<String>) -> ShapeId {
        let id = self.shapes.len();
        self.shapes.push(CapturedShape { id, name, elements });
        id
    }

    pub(crate) fn next_id(&self) -> ShapeId {
        self.shapes.len()
    }

    /// Records a rule body. When the body is exactly one capture, that shape
    /// takes the rule's name.
    pub fn register_rule(&mut self, name: impl Into<String>, elements: Vec<Element>) {
        let name = name.into();
        if let [Element::Captured(id)] = elements.as_slice() {
            if let Some(shape) = self.shapes.get_mut(*id) {
                shape.name.get_or_insert_with(|| name.clone());
            }
        }
        if self.rules.contains_key(&name) {
            log::warn!("rule `{name}` defined more than once; keeping the last definition");
        }
        self.rules.insert(name.clone(), RuleBody { name, elements });
    }

    pub fn shape(&self, id: ShapeId) -> Option<&CapturedShape> {
        self.shapes.get(id)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &CapturedShape> {
        self.shapes.iter()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn rule(&self, name: &str) -> Result<&RuleBody, AnalysisError> {
        self.rules
            .get(name)
            .ok_or_else(|| AnalysisError::UndefinedRule { name: name.to_owned() })
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleBody> {
        self.rules.values()
    }

    /// Shape named after `rule`, if that rule's body is a single capture.
    pub fn shape_of_rule(&self, rule: &str) -> Option<&CapturedShape> {
        match self.rules.get(rule)?.elements.as_slice() {
            [Element::Captured(id)] => self.shapes.get(*id),
            _ => None,
        }
    }

    /// First undefined nonterminal reachable from `elements` without leaving
    /// the sequence (nested captures are checked on their own).
    pub fn first_undefined(&self, elements: &[Element]) -> Option<AnalysisError> {
        elements.iter().find_map(|el| match el {
            Element::NonTerminal { name, .. } => self.rule(name).err(),
            Element::Captured(_) | Element::Byte(_) | Element::Tag(_) => None,
            Element::Linked(l) => self.first_undefined(&l.inner),
            Element::Choice(branches) => branches.iter().find_map(|b| self.first_undefined(b)),
            Element::ZeroOrMore(inner) | Element::OneOrMore(inner) | Element::Optional(inner) => {
                self.first_undefined(inner)
            }
        })
    }

    /// Phase 2 check: every shape whose own sequence references a missing rule.
    pub fn undefined_references(&self) -> Vec<(ShapeId, AnalysisError)> {
        self.shapes
            .iter()
            .filter_map(|s| self.first_undefined(&s.elements).map(|e| (s.id, e)))
            .collect()
    }
}
