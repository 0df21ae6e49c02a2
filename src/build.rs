//! Structural builder: rule expression → element sequence.
//!
//! One depth-first walk per rule. Choice branches, option and repetition
//! bodies and link bodies are visited in isolated scopes that are popped by the
//! same call that pushed them; only capture delimiters push and pop across
//! calls, and those are checked for balance.
use crate::element::{Element, RefSite, ShapeId};
use crate::error::AnalysisError;
use crate::grammar::{Expr, Grammar, Rule};
use crate::registry::Registry;

// ------------------------------ Scopes ------------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Root,
    Branch,      // choice branch or link body
    Optional,
    Repeated,    // zero-or-more / one-or-more body
    Capture,
    FoldCapture, // opened by a fold, closed by the next EndCapture
}

#[derive(Debug)]
struct Scope {
    kind: Kind,
    elements: Vec<Element>,
    /// Set when a left fold happened directly in this scope; holds the
    /// element the fold took as its left operand.
    fold: Option<FoldMark>,
}

#[derive(Debug)]
struct FoldMark {
    head: Option<Element>,
}

impl Scope {
    fn new(kind: Kind) -> Self {
        Self { kind, elements: Vec::new(), fold: None }
    }
}

// ------------------------------ Builder ----------------------------------- //

pub struct Builder {
    registry: Registry,
    scopes: Vec<Scope>,
    rule: String,
    next_site: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds every rule of `grammar` into a fresh registry.
pub fn build(grammar: &Grammar) -> Result<Registry, AnalysisError> {
    let mut builder = Builder::new();
    for rule in &grammar.rules {
        builder.add_rule(rule)?;
    }
    Ok(builder.finish())
}

impl Builder {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            scopes: Vec::new(),
            rule: String::new(),
            next_site: 0,
        }
    }

    /// Walks one rule and returns its top-level element sequence. Captures met
    /// on the way are registered as they close.
    pub fn build_rule(&mut self, rule: &Rule) -> Result<Vec<Element>, AnalysisError> {
        self.rule = rule.name.clone();
        self.scopes.clear();
        self.scopes.push(Scope::new(Kind::Root));
        self.visit(&rule.expr)?;
        match self.scopes.len() {
            1 => {}
            n => {
                return Err(AnalysisError::UnclosedCapture {
                    rule: rule.name.clone(),
                    open: n - 1,
                });
            }
        }
        let root = self.scopes.pop().map(|s| s.elements).unwrap_or_default();
        log::debug!("rule `{}`: {}", rule.name, crate::element::Seq(&root));
        Ok(root)
    }

    pub fn add_rule(&mut self, rule: &Rule) -> Result<(), AnalysisError> {
        let elements = self.build_rule(rule)?;
        self.registry.register_rule(&rule.name, elements);
        Ok(())
    }

    pub fn finish(self) -> Registry {
        self.registry
    }

    fn visit(&mut self, e: &Expr) -> Result<(), AnalysisError> {
        match e {
            Expr::Byte(b) => self.push(Element::Byte(*b))?,
            Expr::Tag(name) => self.push(Element::Tag(name.clone()))?,
            Expr::NonTerminal(name) => {
                let site = RefSite(self.next_site);
                self.next_site += 1;
                self.push(Element::NonTerminal { name: name.clone(), site })?;
            }
            Expr::Sequence(items) => {
                for item in items {
                    self.visit(item)?;
                }
            }
            Expr::Choice(branches) => {
                let mut out = Vec::with_capacity(branches.len());
                for branch in branches {
                    out.push(self.isolated(Kind::Branch, branch)?.elements);
                }
                self.push(Element::Choice(out))?;
            }
            Expr::Optional(inner) => {
                let body = self.isolated(Kind::Optional, inner)?;
                let el = match body.fold {
                    Some(mark) => fold_or_fresh(body.elements, mark),
                    None => Element::Optional(body.elements),
                };
                self.push(el)?;
            }
            Expr::ZeroOrMore(inner) => {
                let body = self.isolated(Kind::Repeated, inner)?;
                let el = match body.fold {
                    Some(mark) => fold_or_fresh(body.elements, mark),
                    None => Element::ZeroOrMore(body.elements),
                };
                self.push(el)?;
            }
            Expr::OneOrMore(inner) => {
                let body = self.isolated(Kind::Repeated, inner)?;
                match body.fold {
                    // at least one iteration: the fold always happened
                    Some(_) => self.top()?.elements.extend(body.elements),
                    None => self.push(Element::OneOrMore(body.elements))?,
                }
            }
            Expr::Link { label, inner } => {
                let body = self.isolated(Kind::Branch, inner)?;
                self.push(Element::linked(label.clone(), body.elements))?;
            }
            Expr::BeginCapture => self.scopes.push(Scope::new(Kind::Capture)),
            Expr::EndCapture => self.close_capture()?,
            Expr::Fold { label } => self.open_fold(label.clone())?,
            Expr::Empty | Expr::Any | Expr::ByteSet(_) | Expr::And(_) | Expr::Not(_) => {}
        }
        Ok(())
    }

    /// Visits `e` in a scope of its own and hands that scope back.
    fn isolated(&mut self, kind: Kind, e: &Expr) -> Result<Scope, AnalysisError> {
        let depth = self.scopes.len();
        self.scopes.push(Scope::new(kind));
        self.visit(e)?;
        if self.scopes.len() != depth + 1 {
            return Err(self.across_scope());
        }
        self.scopes.pop().ok_or_else(|| self.across_scope())
    }

    fn close_capture(&mut self) -> Result<(), AnalysisError> {
        match self.top()?.kind {
            Kind::Capture | Kind::FoldCapture => {}
            Kind::Root => {
                return Err(AnalysisError::UnbalancedCapture { rule: self.rule.clone() });
            }
            _ => return Err(self.across_scope()),
        }
        let Some(mut scope) = self.scopes.pop() else {
            return Err(AnalysisError::UnbalancedCapture { rule: self.rule.clone() });
        };
        let id = self.registry.next_id();
        let enclosing = self.top()?;
        let repeated_fold = enclosing.kind == Kind::Repeated && enclosing.fold.is_some();
        if scope.kind == Kind::FoldCapture && repeated_fold {
            // the left operand of iteration n+1 is the node built by iteration n
            if let Some(Element::Linked(head)) = scope.elements.first_mut() {
                let previous = std::mem::take(&mut head.inner);
                head.inner = vec![Element::Choice(vec![vec![Element::Captured(id)], previous])];
            }
        }
        let registered: ShapeId = self.registry.register(scope.elements, None);
        debug_assert_eq!(id, registered);
        self.push(Element::Captured(registered))
    }

    fn open_fold(&mut self, label: Option<String>) -> Result<(), AnalysisError> {
        let head = self.pull_head();
        self.top()?.fold = Some(FoldMark { head: head.clone() });
        let mut scope = Scope::new(Kind::FoldCapture);
        scope.elements.push(Element::linked(label, head.into_iter().collect()));
        self.scopes.push(scope);
        Ok(())
    }

    /// Removes the most recently appended element of the nearest non-empty
    /// scope, searching from the current scope outward.
    fn pull_head(&mut self) -> Option<Element> {
        self.scopes.iter_mut().rev().find_map(|s| s.elements.pop())
    }

    fn push(&mut self, el: Element) -> Result<(), AnalysisError> {
        self.top()?.elements.push(el);
        Ok(())
    }

    /// The innermost open scope. Every rule starts with a root scope that
    /// only `build_rule` pops, so an empty stack is a broken balance.
    fn top(&mut self) -> Result<&mut Scope, AnalysisError> {
        match self.scopes.last_mut() {
            Some(scope) => Ok(scope),
            None => Err(AnalysisError::UnbalancedCapture { rule: self.rule.clone() }),
        }
    }

    fn across_scope(&self) -> AnalysisError {
        AnalysisError::CaptureAcrossScope { rule: self.rule.clone() }
    }
}

/// A folded option/repetition either produced the folded node or left the
/// pulled head untouched.
fn fold_or_fresh(folded: Vec<Element>, mark: FoldMark) -> Element {
    Element::Choice(vec![folded, mark.head.into_iter().collect()])
}

// ------------------------------- Tests ------------------------------------ //
