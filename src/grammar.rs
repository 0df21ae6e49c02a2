//! Grammar model consumed by the analysis.
//!
//! Rules are kept in declaration order; the expression algebra mirrors a
//! tree-building PEG. Nothing here is mutated once loaded.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Grammar {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Empty,
    Byte(u8),
    NonTerminal(String),
    Sequence(Vec<Expr>),             // visited left to right, same scope
    Choice(Vec<Expr>),               // ordered
    Optional(Box<Expr>),
    ZeroOrMore(Box<Expr>),
    OneOrMore(Box<Expr>),
    BeginCapture,                    // scope delimiter, not a wrapper
    EndCapture,
    Tag(String),
    Fold {
        #[serde(default)]
        label: Option<String>,
    },
    Link {
        #[serde(default)]
        label: Option<String>,
        inner: Box<Expr>,
    },

    // pure-parsing operators: no output shape
    Any,
    ByteSet(Vec<u8>),
    And(Box<Expr>),
    Not(Box<Expr>),
}

impl Grammar {
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self { rules: rules.into_iter().collect() }
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

impl Rule {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self { name: name.into(), expr }
    }
}

// ------------------------------ Constructors ------------------------------ //

impl Expr {
    pub fn seq(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Sequence(items.into_iter().collect())
    }

    pub fn choice(branches: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Choice(branches.into_iter().collect())
    }

    /// One `Byte` per byte of `s`.
    pub fn text(s: &str) -> Self {
        match s.as_bytes() {
            [b] => Expr::Byte(*b),
            bytes => Expr::Sequence(bytes.iter().copied().map(Expr::Byte).collect()),
        }
    }

    pub fn nt(name: impl Into<String>) -> Self {
        Expr::NonTerminal(name.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Expr::Tag(name.into())
    }

    pub fn opt(inner: Expr) -> Self {
        Expr::Optional(Box::new(inner))
    }

    pub fn many(inner: Expr) -> Self {
        Expr::ZeroOrMore(Box::new(inner))
    }

    pub fn many1(inner: Expr) -> Self {
        Expr::OneOrMore(Box::new(inner))
    }

    pub fn link(label: Option<&str>, inner: Expr) -> Self {
        Expr::Link { label: label.map(str::to_owned), inner: Box::new(inner) }
    }

    /// `{ items }`
    pub fn capture(items: impl IntoIterator<Item = Expr>) -> Self {
        let mut seq = vec![Expr::BeginCapture];
        seq.extend(items);
        seq.push(Expr::EndCapture);
        Expr::Sequence(seq)
    }

    /// `{$label items }`
    pub fn fold(label: Option<&str>, items: impl IntoIterator<Item = Expr>) -> Self {
        let mut seq = vec![Expr::Fold { label: label.map(str::to_owned) }];
        seq.extend(items);
        seq.push(Expr::EndCapture);
        Expr::Sequence(seq)
    }
}
