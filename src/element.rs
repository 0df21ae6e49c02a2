//! Shape-preserving view of a rule body.
//!
//! Only what influences the output shape survives: literal bytes, tags,
//! links, captures and the choice/option/repetition structure around them.
use std::fmt;

/// Dense capture id, assigned by the builder in `EndCapture` order.
pub type ShapeId = usize;

/// Identity of one nonterminal reference occurrence in the grammar.
/// Cycle guards key on this rather than on the rule name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefSite(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    NonTerminal { name: String, site: RefSite },
    Captured(ShapeId),
    Byte(u8),
    Tag(String),
    Linked(Linked),
    Choice(Vec<Vec<Element>>),
    ZeroOrMore(Vec<Element>),
    OneOrMore(Vec<Element>),
    Optional(Vec<Element>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linked {
    pub label: Option<String>,
    pub inner: Vec<Element>,
}

impl Element {
    pub fn linked(label: Option<String>, inner: Vec<Element>) -> Self {
        Element::Linked(Linked { label, inner })
    }
}

/// Text of a byte as it appears in debug output; control characters are
/// spelled as escapes.
pub(crate) fn byte_repr(b: u8) -> String {
    match b {
        0x08 => "\\b".into(),
        b'\t' => "\\t".into(),
        b'\n' => "\\n".into(),
        0x0c => "\\f".into(),
        b'\r' => "\\r".into(),
        _ => char::from(b).to_string(),
    }
}

// ------------------------------- Display ---------------------------------- //

pub struct Seq<'a>(pub &'a [Element]);

impl fmt::Display for Seq<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(" ");
        }
        for (i, el) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{el}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::NonTerminal { name, .. } => write!(f, "[{name}]"),
            Element::Captured(id) => write!(f, "[{id}]"),
            Element::Byte(b) => f.write_str(&byte_repr(*b)),
            Element::Tag(name) => write!(f, "#{name}"),
            Element::Linked(l) => {
                let label = l.label.as_deref().unwrap_or("");
                write!(f, "${label}({})", Seq(&l.inner))
            }
            Element::Choice(branches) => {
                f.write_str("( ")?;
                for (i, b) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" / ")?;
                    }
                    write!(f, "{}", Seq(b))?;
                }
                f.write_str(" )")
            }
            Element::ZeroOrMore(inner) => write!(f, "({})*", Seq(inner)),
            Element::OneOrMore(inner) => write!(f, "({})+", Seq(inner)),
            Element::Optional(inner) => write!(f, "({})?", Seq(inner)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_grammar_notation() {
        let seq = vec![
            Element::Byte(b'('),
            Element::Tag("Add".into()),
            Element::linked(Some("left".into()), vec![Element::Captured(3)]),
            Element::Choice(vec![
                vec![Element::NonTerminal { name: "A".into(), site: RefSite(0) }],
                vec![Element::Byte(b'\n')],
            ]),
            Element::ZeroOrMore(vec![Element::Byte(b'x')]),
        ];
        assert_eq!(Seq(&seq).to_string(), "( #Add $left([3]) ( [A] / \\n ) (x)*");
    }
}
