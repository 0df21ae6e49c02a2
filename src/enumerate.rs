//! Binding enumeration.
//!
//! Every layout has a rate: how many distinct bindings it can produce. A
//! binding is picked by one index read as a mixed-radix number. Each node
//! takes `index % rate` as its digit and passes `index / rate` on, the digit
//! choosing the branch, the presence or the linked capture.
use crate::ir::{self, Link, LinkedInner, Node};

/// Label written for a link that has no label of its own.
pub const UNLABELED: &str = "unlabeled";

/// One resolved piece of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Text(u8),
    Placeholder {
        label: Option<String>,
        before: String,
        after: String,
    },
    Loop(Vec<Slot>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub index: u64,
    /// One `label: #T1 / #T2` entry per bound link, in reading order.
    pub labels: Vec<String>,
    pub layout: Vec<Slot>,
}

impl Binding {
    pub fn label_list(&self) -> String {
        self.labels.join(", ")
    }
}

// ------------------------------- Rates ------------------------------------ //

pub fn rate(node: &Node) -> u64 {
    match node {
        Node::Text(_) => 1,
        Node::Link(link) => (link.inners.len() as u64).max(1),
        Node::Choice(branches) => {
            let mut total = 0u64;
            let mut unlinked = false;
            for branch in branches {
                if ir::has_links(branch) {
                    total = total.saturating_add(rate_seq(branch));
                } else {
                    unlinked = true;
                }
            }
            total.saturating_add(u64::from(unlinked)).max(1)
        }
        Node::Optional(inner) | Node::ZeroOrMore(inner) => {
            if ir::has_links(inner) {
                rate_seq(inner).saturating_add(1)
            } else {
                1
            }
        }
        Node::OneOrMore(inner) => rate_seq(inner),
    }
}

pub fn rate_seq(nodes: &[Node]) -> u64 {
    nodes.iter().fold(1, |acc, node| acc.saturating_mul(rate(node)))
}

// ------------------------------ Resolution -------------------------------- //

/// Binding number `index` of `nodes`, or `None` past the last one.
///
/// `tags[id]` lists the tags of capture `id`; they fill the label entries.
pub fn resolve(nodes: &[Node], index: u64, tags: &[Vec<String>]) -> Option<Binding> {
    if index >= rate_seq(nodes) {
        return None;
    }
    let mut walk = Walk {
        index,
        tags,
        labels: Vec::new(),
        repeated: false,
    };
    let mut layout = Vec::new();
    walk.seq(nodes, &mut layout);
    Some(Binding { index, labels: walk.labels, layout })
}

struct Walk<'a> {
    index: u64,
    tags: &'a [Vec<String>],
    labels: Vec<String>,
    repeated: bool,
}

impl Walk<'_> {
    fn digit(&mut self, rate: u64) -> u64 {
        let digit = self.index % rate;
        self.index /= rate;
        digit
    }

    fn seq(&mut self, nodes: &[Node], out: &mut Vec<Slot>) {
        for node in nodes {
            self.node(node, out);
        }
    }

    /// Walks `nodes` reading `index` as their own digits, then resumes.
    fn nested(&mut self, nodes: &[Node], index: u64, out: &mut Vec<Slot>) {
        let rest = std::mem::replace(&mut self.index, index);
        self.seq(nodes, out);
        self.index = rest;
    }

    fn repetition(&mut self, nodes: &[Node], index: u64) -> Slot {
        let outer = std::mem::replace(&mut self.repeated, true);
        let mut body = Vec::new();
        self.nested(nodes, index, &mut body);
        self.repeated = outer;
        Slot::Loop(body)
    }

    fn node(&mut self, node: &Node, out: &mut Vec<Slot>) {
        match node {
            Node::Text(b) => out.push(Slot::Text(*b)),
            Node::Link(link) => out.push(self.link(link)),
            Node::Choice(branches) => {
                let mut digit = self.digit(rate(node));
                for branch in branches.iter().filter(|b| ir::has_links(b)) {
                    let r = rate_seq(branch);
                    if digit < r {
                        self.nested(branch, digit, out);
                        return;
                    }
                    digit -= r;
                }
                // the link-free alternative writes nothing
            }
            Node::Optional(inner) => {
                let r = rate(node);
                let digit = self.digit(r);
                if digit + 1 < r {
                    self.nested(inner, digit, out);
                }
            }
            Node::ZeroOrMore(inner) => {
                let r = rate(node);
                let digit = self.digit(r);
                if digit + 1 < r {
                    out.push(self.repetition(inner, digit));
                }
            }
            Node::OneOrMore(inner) => {
                let digit = self.digit(rate(node));
                out.push(self.repetition(inner, digit));
            }
        }
    }

    fn link(&mut self, link: &Link) -> Slot {
        let label = link.label.clone();
        if link.inners.is_empty() {
            return Slot::Placeholder { label, before: String::new(), after: String::new() };
        }
        let digit = self.digit(link.inners.len() as u64) as usize;
        let inner = &link.inners[digit];
        let entry = self.label_entry(link.label.as_deref(), inner);
        self.labels.push(entry);
        Slot::Placeholder {
            label,
            before: inner.before.clone(),
            after: inner.after.clone(),
        }
    }

    fn label_entry(&self, label: Option<&str>, inner: &LinkedInner) -> String {
        let mut entry = label.unwrap_or(UNLABELED).to_owned();
        if self.repeated {
            entry.push_str("[]");
        }
        let tags = inner
            .capture
            .and_then(|id| self.tags.get(id))
            .map(Vec::as_slice)
            .unwrap_or_default();
        if tags.is_empty() {
            return entry;
        }
        let tags: Vec<String> = tags.iter().map(|t| format!("#{t}")).collect();
        format!("{entry}: {}", tags.join(" / "))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use proptest::prelude::*;

    fn link(label: Option<&str>, ids: &[usize]) -> Node {
        Node::Link(Link {
            label: label.map(str::to_owned),
            inners: ids.iter().map(|&id| LinkedInner::capture(id)).collect(),
        })
    }

    fn tags() -> Vec<Vec<String>> {
        vec![
            vec!["A".into(), "B".into()],
            vec!["Leaf".into()],
            vec![],
        ]
    }

    #[test]
    fn rates_follow_the_structure() {
        assert_eq!(rate(&Node::Text(b'x')), 1);
        assert_eq!(rate(&link(None, &[0, 1, 2])), 3);
        assert_eq!(rate(&link(None, &[])), 1);
        assert_eq!(rate(&Node::Optional(vec![link(None, &[0, 1])])), 3);
        assert_eq!(rate(&Node::ZeroOrMore(vec![link(None, &[0, 1])])), 3);
        assert_eq!(rate(&Node::OneOrMore(vec![link(None, &[0, 1])])), 2);
        assert_eq!(rate(&Node::Optional(vec![Node::Text(b'x')])), 1);
        assert_eq!(
            rate(&Node::Choice(vec![vec![link(None, &[0, 1])], vec![Node::Text(b'x')]])),
            3
        );
        assert_eq!(rate_seq(&[link(None, &[0, 1]), link(None, &[0, 1, 2])]), 6);
    }

    #[test]
    fn absent_optional_is_the_last_digit() {
        let nodes = [Node::Optional(vec![link(Some("x"), &[0, 1])])];
        let present = resolve(&nodes, 1, &tags()).unwrap();
        assert_eq!(present.labels, vec!["x: #Leaf".to_string()]);
        let absent = resolve(&nodes, 2, &tags()).unwrap();
        assert!(absent.layout.is_empty());
        assert!(absent.labels.is_empty());
        assert!(resolve(&nodes, 3, &tags()).is_none());
    }

    #[test]
    fn labels_name_the_bound_capture_tags() {
        let nodes = [link(None, &[0]), Node::ZeroOrMore(vec![link(Some("arg"), &[1])])];
        let binding = resolve(&nodes, 0, &tags()).unwrap();
        assert_eq!(binding.label_list(), "unlabeled: #A / #B, arg[]: #Leaf");
        assert!(matches!(binding.layout[1], Slot::Loop(_)));
    }

    #[test]
    fn capture_without_tags_leaves_the_bare_label() {
        let binding = resolve(&[link(Some("body"), &[2])], 0, &tags()).unwrap();
        assert_eq!(binding.labels, vec!["body".to_string()]);
    }

    #[test]
    fn first_node_is_the_lowest_digit() {
        let nodes = [link(Some("a"), &[0, 1]), link(Some("b"), &[1, 2])];
        let labels: Vec<String> = (0..4)
            .map(|i| resolve(&nodes, i, &tags()).unwrap().label_list())
            .collect();
        assert_eq!(labels, vec![
            "a: #A / #B, b: #Leaf",
            "a: #Leaf, b: #Leaf",
            "a: #A / #B, b",
            "a: #Leaf, b",
        ]);
    }

    #[test]
    fn link_free_constructs_write_nothing_but_one_or_more() {
        let nodes = [
            Node::Choice(vec![vec![Node::Text(b'a')], vec![Node::Text(b'b')]]),
            Node::Optional(vec![Node::Text(b'c')]),
            Node::ZeroOrMore(vec![Node::Text(b'd')]),
            Node::OneOrMore(vec![Node::Text(b'e')]),
        ];
        let binding = resolve(&nodes, 0, &tags()).unwrap();
        assert_eq!(binding.layout, vec![Slot::Loop(vec![Slot::Text(b'e')])]);
        assert!(resolve(&nodes, 1, &tags()).is_none());
    }

    fn node_strategy() -> impl Strategy<Value = Node> {
        let leaf = prop_oneof![
            (b'a'..=b'z').prop_map(Node::Text),
            prop::collection::vec(0usize..3, 0..3).prop_map(|ids| link(Some("l"), &ids)),
        ];
        leaf.prop_recursive(3, 24, 3, |inner| {
            prop_oneof![
                prop::collection::vec(prop::collection::vec(inner.clone(), 0..3), 0..3)
                    .prop_map(Node::Choice),
                prop::collection::vec(inner.clone(), 0..3).prop_map(Node::Optional),
                prop::collection::vec(inner.clone(), 0..3).prop_map(Node::ZeroOrMore),
                prop::collection::vec(inner, 0..3).prop_map(Node::OneOrMore),
            ]
        })
    }

    /// Links with their own label and distinct captures, each kept bare or
    /// wrapped in an option or a repetition.
    fn wrapped_links_strategy() -> impl Strategy<Value = Vec<Node>> {
        let part = (0..4u8, prop::sample::subsequence(vec![0usize, 1, 2], 1..=3));
        prop::collection::vec(part, 0..4).prop_map(|parts| {
            parts
                .into_iter()
                .enumerate()
                .map(|(i, (wrap, ids))| {
                    let label = format!("l{i}");
                    let node = link(Some(label.as_str()), &ids);
                    match wrap {
                        0 => node,
                        1 => Node::Optional(vec![node]),
                        2 => Node::ZeroOrMore(vec![node]),
                        _ => Node::OneOrMore(vec![node]),
                    }
                })
                .collect()
        })
    }

    fn distinct_bindings(nodes: &[Node]) -> HashSet<(Vec<String>, Vec<Slot>)> {
        (0..rate_seq(nodes))
            .filter_map(|i| resolve(nodes, i, &tags()))
            .map(|b| (b.labels, b.layout))
            .collect()
    }

    proptest! {
        #[test]
        fn each_index_of_wrapped_links_is_a_distinct_binding(nodes in wrapped_links_strategy()) {
            let distinct = distinct_bindings(&nodes);
            prop_assert_eq!(distinct.len() as u64, rate_seq(&nodes));
        }

        #[test]
        fn bindings_never_outnumber_the_rate(
            nodes in prop::collection::vec(node_strategy(), 0..4),
        ) {
            let total = rate_seq(&nodes);
            prop_assume!(total <= 512);
            let distinct = distinct_bindings(&nodes).len() as u64;
            prop_assert!((1..=total).contains(&distinct), "{} of {}", distinct, total);
        }

        #[test]
        fn linked_option_has_exactly_one_absent_index(
            ids in prop::collection::vec(0usize..3, 1..4),
        ) {
            let nodes = [Node::Optional(vec![link(Some("x"), &ids)])];
            prop_assert_eq!(rate_seq(&nodes), ids.len() as u64 + 1);
            let absent = (0..rate_seq(&nodes))
                .filter_map(|i| resolve(&nodes, i, &tags()))
                .filter(|b| b.layout.is_empty())
                .count();
            prop_assert_eq!(absent, 1);
        }
    }
}
