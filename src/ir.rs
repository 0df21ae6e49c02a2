// Layout IR: one shape, one tag, nonterminals expanded. No Element here.

use crate::element::ShapeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(u8),                 // literal byte
    Link(Link),
    Choice(Vec<Vec<Node>>),   // not fixed by the tag
    Optional(Vec<Node>),
    ZeroOrMore(Vec<Node>),
    OneOrMore(Vec<Node>),
}

/// A labeled link and every capture it can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub label: Option<String>,
    pub inners: Vec<LinkedInner>, // distinct captures, first-seen order
}

/// One way of reaching a capture through a link body, with the literal text
/// read before and after it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkedInner {
    pub capture: Option<ShapeId>,
    pub before: String,
    pub after: String,
}

impl LinkedInner {
    pub fn capture(id: ShapeId) -> Self {
        Self { capture: Some(id), ..Self::default() }
    }

    pub fn text(b: u8) -> Self {
        Self { before: char::from(b).to_string(), ..Self::default() }
    }

    /// `self` read first, then `next`. Text lands before the capture until
    /// one of the two carries it, after the capture from then on.
    pub fn join(&self, next: &LinkedInner) -> LinkedInner {
        match (self.capture, next.capture) {
            (None, Some(id)) => LinkedInner {
                capture: Some(id),
                before: format!("{}{}", self.before, next.before),
                after: next.after.clone(),
            },
            (Some(id), None) => LinkedInner {
                capture: Some(id),
                before: self.before.clone(),
                after: format!("{}{}{}", self.after, next.before, next.after),
            },
            (None, None) => LinkedInner {
                capture: None,
                before: format!("{}{}", self.before, next.before),
                after: next.after.clone(),
            },
            // two captures in one link body: the later one is what gets linked
            (Some(_), Some(id)) => LinkedInner {
                capture: Some(id),
                before: format!("{}{}{}", self.before, self.after, next.before),
                after: next.after.clone(),
            },
        }
    }
}

impl Node {
    pub fn has_links(&self) -> bool {
        match self {
            Node::Text(_) => false,
            Node::Link(_) => true,
            Node::Choice(branches) => branches.iter().any(|b| has_links(b)),
            Node::Optional(inner) | Node::ZeroOrMore(inner) | Node::OneOrMore(inner) => {
                has_links(inner)
            }
        }
    }
}

pub fn has_links(nodes: &[Node]) -> bool {
    nodes.iter().any(Node::has_links)
}

/// Every link reachable in `nodes`, depth first.
pub fn links(nodes: &[Node]) -> Vec<&Link> {
    let mut out = Vec::new();
    collect_links(nodes, &mut out);
    out
}

fn collect_links<'a>(nodes: &'a [Node], out: &mut Vec<&'a Link>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Link(l) => out.push(l),
            Node::Choice(branches) => branches.iter().for_each(|b| collect_links(b, out)),
            Node::Optional(inner) | Node::ZeroOrMore(inner) | Node::OneOrMore(inner) => {
                collect_links(inner, out)
            }
        }
    }
}
