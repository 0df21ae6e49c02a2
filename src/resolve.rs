//! Tag discovery.
//!
//! A shape's tags are found depth first through its sequence, every choice
//! branch, option and repetition bodies, and through nonterminals into the
//! referenced rule's top-level sequence. Nested captures and link bodies
//! belong to other nodes and are not searched.
//!
//! Each hit comes with the shape's sequence specialized for that tag: the
//! choices on the tag's path are fixed to the branch holding it, so link
//! resolution and rendering only ever see the branch the tag selects.
use std::collections::HashSet;
use std::iter::FusedIterator;

use crate::element::Element;
use crate::error::AnalysisError;
use crate::registry::{CapturedShape, Registry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAlternative {
    pub tag: String,
    pub elements: Vec<Element>,
}

/// Lazy, finite sequence of a shape's tag alternatives. Once it has returned
/// `None` (or an error) it stays exhausted.
pub struct TagCursor<'a> {
    registry: &'a Registry,
    elements: &'a [Element],
    next: usize,
    exhausted: bool,
}

pub fn tag_alternatives<'a>(registry: &'a Registry, shape: &'a CapturedShape) -> TagCursor<'a> {
    TagCursor::new(registry, &shape.elements)
}

/// Names of every tag alternative of `shape`, in discovery order.
pub fn tag_names(registry: &Registry, shape: &CapturedShape) -> Result<Vec<String>, AnalysisError> {
    tag_alternatives(registry, shape)
        .map(|alt| alt.map(|a| a.tag))
        .collect()
}

impl<'a> TagCursor<'a> {
    pub fn new(registry: &'a Registry, elements: &'a [Element]) -> Self {
        Self { registry, elements, next: 0, exhausted: false }
    }

    /// Next tag name, or `None` once every tag has been handed out.
    pub fn discover_tag(&mut self) -> Result<Option<String>, AnalysisError> {
        self.next().transpose().map(|alt| alt.map(|a| a.tag))
    }
}

impl Iterator for TagCursor<'_> {
    type Item = Result<TagAlternative, AnalysisError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let mut search = Search {
            registry: self.registry,
            skip: self.next,
            visited: HashSet::new(),
        };
        match search.seq(self.elements) {
            Ok(Some((tag, elements))) => {
                self.next += 1;
                Some(Ok(TagAlternative { tag, elements }))
            }
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for TagCursor<'_> {}

// ------------------------------- Search ----------------------------------- //

/// Finds the `skip`-th tag. Each rule body is entered at most once per
/// search, so every tag element is counted once and recursion ends.
struct Search<'a> {
    registry: &'a Registry,
    skip: usize,
    visited: HashSet<String>,
}

type Hit = (String, Vec<Element>);

impl Search<'_> {
    fn seq(&mut self, elements: &[Element]) -> Result<Option<Hit>, AnalysisError> {
        for (i, el) in elements.iter().enumerate() {
            if let Some((tag, replacement)) = self.element(el)? {
                let mut out = Vec::with_capacity(elements.len() + replacement.len());
                out.extend_from_slice(&elements[..i]);
                out.extend(replacement);
                out.extend_from_slice(&elements[i + 1..]);
                return Ok(Some((tag, out)));
            }
        }
        Ok(None)
    }

    /// On a hit, the tag and whatever replaces `el` in the specialized sequence.
    fn element(&mut self, el: &Element) -> Result<Option<Hit>, AnalysisError> {
        match el {
            Element::Tag(name) => {
                if self.skip == 0 {
                    return Ok(Some((name.clone(), vec![el.clone()])));
                }
                self.skip -= 1;
                Ok(None)
            }
            Element::Choice(branches) => {
                for branch in branches {
                    if let Some(hit) = self.seq(branch)? {
                        return Ok(Some(hit));
                    }
                }
                Ok(None)
            }
            // the tag is there, so the option was taken
            Element::Optional(inner) => self.seq(inner),
            Element::ZeroOrMore(inner) | Element::OneOrMore(inner) => Ok(self
                .seq(inner)?
                .map(|(tag, fixed)| (tag, vec![Element::OneOrMore(fixed)]))),
            Element::NonTerminal { name, .. } => {
                if !self.visited.insert(name.clone()) {
                    return Ok(None);
                }
                let registry = self.registry;
                let body = registry.rule(name)?;
                self.seq(&body.elements)
            }
            Element::Captured(_) | Element::Byte(_) | Element::Linked(_) => Ok(None),
        }
    }
}
