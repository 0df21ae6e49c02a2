//! Lowering: (specialized) element sequence → layout IR.
//!
//! Nonterminals are expanded inline. Each reference site is expanded at most
//! once per query: a site met again (recursion, or a second path through a
//! shared rule) contributes nothing. The work per query is therefore bounded by
//! the number of sites in the grammar.
use std::collections::HashSet;

use crate::element::{Element, RefSite};
use crate::error::AnalysisError;
use crate::ir::{Link, LinkedInner, Node};
use crate::registry::Registry;

pub fn lower(registry: &Registry, elements: &[Element]) -> Result<Vec<Node>, AnalysisError> {
    Lowering { registry, expanded: HashSet::new() }.seq(elements)
}

/// Every link reachable from `elements`, each with its resolved inner captures.
pub fn reachable_links(
    registry: &Registry,
    elements: &[Element],
) -> Result<Vec<Link>, AnalysisError> {
    let nodes = lower(registry, elements)?;
    Ok(crate::ir::links(&nodes).into_iter().cloned().collect())
}

struct Lowering<'a> {
    registry: &'a Registry,
    expanded: HashSet<RefSite>,
}

impl Lowering<'_> {
    fn seq(&mut self, elements: &[Element]) -> Result<Vec<Node>, AnalysisError> {
        let mut out = Vec::with_capacity(elements.len());
        for el in elements {
            self.element(el, &mut out)?;
        }
        Ok(out)
    }

    fn element(&mut self, el: &Element, out: &mut Vec<Node>) -> Result<(), AnalysisError> {
        match el {
            Element::Byte(b) => out.push(Node::Text(*b)),
            // a tag only names the node; an unlinked capture is not part of it
            Element::Tag(_) | Element::Captured(_) => {}
            Element::NonTerminal { name, site } => {
                let registry = self.registry;
                if !self.expanded.insert(*site) {
                    log::trace!("cycle guard: `{name}` already expanded at this site");
                    return Ok(());
                }
                let body = registry.rule(name)?;
                out.extend(self.seq(&body.elements)?);
            }
            Element::Linked(l) => out.push(Node::Link(Link {
                label: l.label.clone(),
                inners: linked_inners(self.registry, &l.inner)?,
            })),
            Element::Choice(branches) => {
                let branches = branches
                    .iter()
                    .map(|b| self.seq(b))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(Node::Choice(branches));
            }
            Element::Optional(inner) => out.push(Node::Optional(self.seq(inner)?)),
            Element::ZeroOrMore(inner) => out.push(Node::ZeroOrMore(self.seq(inner)?)),
            Element::OneOrMore(inner) => out.push(Node::OneOrMore(self.seq(inner)?)),
        }
        Ok(())
    }
}

// ----------------------------- Linked inners ------------------------------ //

/// Captures reachable from a link body, each with the literal text around it.
/// Sequences join their parts pairwise; choices union their branches.
/// Entries without a capture are dropped, duplicates keep the first position.
pub fn linked_inners(
    registry: &Registry,
    inner: &[Element],
) -> Result<Vec<LinkedInner>, AnalysisError> {
    let mut expanded = HashSet::new();
    let found = inners_seq(registry, inner, &mut expanded)?.unwrap_or_default();

    let mut seen = HashSet::new();
    Ok(found
        .into_iter()
        .filter(|li| li.capture.is_some_and(|id| seen.insert(id)))
        .collect())
}

fn inners_seq(
    registry: &Registry,
    elements: &[Element],
    expanded: &mut HashSet<RefSite>,
) -> Result<Option<Vec<LinkedInner>>, AnalysisError> {
    let mut acc: Option<Vec<LinkedInner>> = None;
    for el in elements {
        let Some(next) = inners_element(registry, el, expanded)? else {
            continue;
        };
        acc = Some(match acc {
            None => next,
            Some(prev) => prev
                .iter()
                .flat_map(|a| next.iter().map(move |b| a.join(b)))
                .collect(),
        });
    }
    Ok(acc)
}

fn inners_element(
    registry: &Registry,
    el: &Element,
    expanded: &mut HashSet<RefSite>,
) -> Result<Option<Vec<LinkedInner>>, AnalysisError> {
    match el {
        Element::Captured(id) => Ok(Some(vec![LinkedInner::capture(*id)])),
        Element::Byte(b) => Ok(Some(vec![LinkedInner::text(*b)])),
        Element::NonTerminal { name, site } => {
            if !expanded.insert(*site) {
                log::trace!("cycle guard: `{name}` already expanded inside this link");
                return Ok(None);
            }
            let body = registry.rule(name)?;
            inners_seq(registry, &body.elements, expanded)
        }
        Element::Choice(branches) => {
            let mut all: Option<Vec<LinkedInner>> = None;
            for branch in branches {
                if let Some(found) = inners_seq(registry, branch, expanded)? {
                    all.get_or_insert_with(Vec::new).extend(found);
                }
            }
            Ok(all)
        }
        Element::Tag(_)
        | Element::Linked(_)
        | Element::Optional(_)
        | Element::ZeroOrMore(_)
        | Element::OneOrMore(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build;
    use crate::grammar::{Expr, Grammar, Rule};

    fn registry(rules: Vec<Rule>) -> Registry {
        build(&Grammar::new(rules)).unwrap()
    }

    fn shape_elements<'a>(reg: &'a Registry, rule: &str) -> &'a [Element] {
        &reg.shape_of_rule(rule).unwrap().elements
    }

    #[test]
    fn link_to_named_capture_binds_its_id() {
        let reg = registry(vec![
            Rule::new("R", Expr::capture([
                Expr::text("("),
                Expr::tag("Tag"),
                Expr::link(Some("link"), Expr::nt("R2")),
                Expr::text(")"),
            ])),
            Rule::new("R2", Expr::capture([Expr::tag("Leaf")])),
        ]);
        let leaf = reg.shape_of_rule("R2").unwrap().id;
        let nodes = lower(&reg, shape_elements(&reg, "R")).unwrap();
        assert_eq!(nodes, vec![
            Node::Text(b'('),
            Node::Link(Link {
                label: Some("link".into()),
                inners: vec![LinkedInner::capture(leaf)],
            }),
            Node::Text(b')'),
        ]);
    }

    #[test]
    fn text_inside_link_body_surrounds_the_capture() {
        let reg = registry(vec![
            Rule::new("S", Expr::capture([Expr::link(
                Some("s"),
                Expr::seq([Expr::text("\""), Expr::nt("Chars"), Expr::text("\"")]),
            )])),
            Rule::new("Chars", Expr::capture([Expr::tag("Chars")])),
        ]);
        let links = reachable_links(&reg, shape_elements(&reg, "S")).unwrap();
        assert_eq!(links.len(), 1);
        let inner = &links[0].inners[0];
        assert_eq!((inner.before.as_str(), inner.after.as_str()), ("\"", "\""));
    }

    #[test]
    fn choice_in_link_body_unions_and_dedups() {
        let reg = registry(vec![
            Rule::new("V", Expr::choice([Expr::nt("A"), Expr::nt("B"), Expr::nt("A")])),
            Rule::new("A", Expr::capture([Expr::tag("A")])),
            Rule::new("B", Expr::capture([Expr::tag("B")])),
            Rule::new("Top", Expr::capture([Expr::link(Some("v"), Expr::nt("V"))])),
        ]);
        let links = reachable_links(&reg, shape_elements(&reg, "Top")).unwrap();
        let ids: Vec<_> = links[0].inners.iter().map(|li| li.capture).collect();
        let a = reg.shape_of_rule("A").unwrap().id;
        let b = reg.shape_of_rule("B").unwrap().id;
        assert_eq!(ids, vec![Some(a), Some(b)]);
    }

    #[test]
    fn recursive_rule_terminates() {
        // E = E '+' E / #Num
        let reg = registry(vec![
            Rule::new("E", Expr::choice([
                Expr::seq([Expr::nt("E"), Expr::text("+"), Expr::nt("E")]),
                Expr::tag("Num"),
            ])),
            Rule::new("S", Expr::capture([Expr::link(None, Expr::nt("E")), Expr::nt("E")])),
        ]);
        let nodes = lower(&reg, shape_elements(&reg, "S")).unwrap();
        match &nodes[0] {
            Node::Link(l) => assert!(l.inners.is_empty()),
            other => panic!("expected a link, got {other:?}"),
        }
        assert!(matches!(nodes[1], Node::Choice(_)));
    }

    #[test]
    fn undefined_rule_surfaces_as_error() {
        let reg = registry(vec![Rule::new(
            "R",
            Expr::capture([Expr::link(None, Expr::nt("Nope"))]),
        )]);
        let err = lower(&reg, shape_elements(&reg, "R")).unwrap_err();
        assert_eq!(err, AnalysisError::UndefinedRule { name: "Nope".into() });
    }

    fn text_nodes(nodes: &[Node]) -> usize {
        nodes
            .iter()
            .map(|node| match node {
                Node::Text(_) => 1,
                Node::Link(_) => 0,
                Node::Choice(branches) => branches.iter().map(|b| text_nodes(b)).sum(),
                Node::Optional(inner) | Node::ZeroOrMore(inner) | Node::OneOrMore(inner) => {
                    text_nodes(inner)
                }
            })
            .sum()
    }

    /// `B = '(' B* ')' / '[' B* ']' / ...` with one branch per bracket pair.
    fn nested_brackets(pairs: usize) -> Vec<Rule> {
        let branches = (0..pairs).map(|i| {
            let open = (b'a' + i as u8) as char;
            let close = open.to_ascii_uppercase();
            Expr::seq([
                Expr::text(&open.to_string()),
                Expr::many(Expr::nt("B")),
                Expr::text(&close.to_string()),
            ])
        });
        vec![
            Rule::new("B", Expr::choice(branches)),
            Rule::new("Top", Expr::capture([Expr::tag("Top"), Expr::nt("B")])),
        ]
    }

    #[test]
    fn many_self_references_lower_in_linear_work() {
        let reg = registry(nested_brackets(12));
        let started = std::time::Instant::now();
        let nodes = lower(&reg, shape_elements(&reg, "Top")).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        // the Top site plus each of the 12 sites inside `B` expand once
        assert_eq!(text_nodes(&nodes), 13 * 12 * 2);
    }

    #[test]
    fn a_site_expands_once_per_query() {
        // Twice = Once Once ; Once = Leaf ; Leaf = 'z'
        let reg = registry(vec![
            Rule::new("Twice", Expr::seq([Expr::nt("Once"), Expr::nt("Once")])),
            Rule::new("Once", Expr::nt("Leaf")),
            Rule::new("Leaf", Expr::text("z")),
            Rule::new("S", Expr::capture([Expr::tag("S"), Expr::nt("Twice")])),
        ]);
        let nodes = lower(&reg, shape_elements(&reg, "S")).unwrap();
        assert_eq!(nodes, vec![Node::Text(b'z')]);

        // a new query starts with nothing expanded
        let again = lower(&reg, shape_elements(&reg, "S")).unwrap();
        assert_eq!(again, nodes);
    }
}
