//! Template rendering for one resolved binding.
use crate::enumerate::{Binding, Slot};

/// Body emitted when a binding renders nothing.
pub const DEFAULT_BODY: &str = "${this.toText()}";

/// Placeholder for a link without a label.
const POSITIONAL: &str = "${this.get(i)}";

pub fn escape_char(c: char, out: &mut String) {
    match c {
        '\\' => out.push_str("\\\\"),
        '"' => out.push_str("\\\""),
        '\'' => out.push_str("\\'"),
        '\u{8}' => out.push_str("\\b"),
        '\t' => out.push_str("\\t"),
        '\n' => out.push_str("\\n"),
        '\u{c}' => out.push_str("\\f"),
        '\r' => out.push_str("\\r"),
        c => out.push(c),
    }
}

pub fn escape_byte(b: u8) -> String {
    let mut out = String::new();
    escape_char(char::from(b), &mut out);
    out
}

fn escape_str(s: &str, out: &mut String) {
    s.chars().for_each(|c| escape_char(c, out));
}

/// Template text of `binding`.
///
/// `None` when nothing renders, or when an unnamed shape renders without a
/// single placeholder. Callers substitute [`DEFAULT_BODY`].
pub fn render(binding: &Binding, named: bool) -> Option<String> {
    let mut renderer = Renderer::default();
    renderer.slots(&binding.layout);
    if renderer.out.is_empty() || (!named && renderer.placeholders == 0) {
        return None;
    }
    Some(renderer.out)
}

#[derive(Default)]
struct Renderer {
    out: String,
    placeholders: usize,
}

impl Renderer {
    fn slots(&mut self, slots: &[Slot]) {
        for slot in slots {
            match slot {
                Slot::Text(b) => escape_char(char::from(*b), &mut self.out),
                Slot::Placeholder { label, before, after } => {
                    escape_str(before, &mut self.out);
                    match label {
                        Some(label) => {
                            self.out.push_str("${");
                            self.out.push_str(label);
                            self.out.push('}');
                        }
                        None => self.out.push_str(POSITIONAL),
                    }
                    escape_str(after, &mut self.out);
                    self.placeholders += 1;
                }
                Slot::Loop(body) => {
                    let outer = std::mem::take(&mut self.out);
                    self.slots(body);
                    let inner = std::mem::replace(&mut self.out, outer);
                    if !inner.is_empty() {
                        self.out.push_str("\nwhile(true){\n");
                        self.out.push_str(&inner);
                        self.out.push_str("\n}\n");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn binding(layout: Vec<Slot>) -> Binding {
        Binding { index: 0, labels: vec![], layout }
    }

    fn placeholder(label: Option<&str>, before: &str, after: &str) -> Slot {
        Slot::Placeholder {
            label: label.map(str::to_owned),
            before: before.into(),
            after: after.into(),
        }
    }

    #[rstest]
    #[case(b'a', "a")]
    #[case(b'\\', "\\\\")]
    #[case(b'"', "\\\"")]
    #[case(b'\'', "\\'")]
    #[case(0x08, "\\b")]
    #[case(b'\t', "\\t")]
    #[case(b'\n', "\\n")]
    #[case(0x0c, "\\f")]
    #[case(b'\r', "\\r")]
    fn bytes_are_escaped(#[case] byte: u8, #[case] expected: &str) {
        assert_eq!(escape_byte(byte), expected);
    }

    #[test]
    fn fragments_join_without_separators() {
        let b = binding(vec![
            Slot::Text(b'('),
            placeholder(Some("link"), "", ""),
            Slot::Text(b')'),
        ]);
        assert_eq!(render(&b, false).as_deref(), Some("(${link})"));
    }

    #[test]
    fn unlabeled_link_is_positional_and_keeps_escaped_context() {
        let b = binding(vec![placeholder(None, "\"", "\n")]);
        assert_eq!(render(&b, false).as_deref(), Some("\\\"${this.get(i)}\\n"));
    }

    #[test]
    fn placeholder_free_text_needs_a_name() {
        let b = binding(vec![Slot::Text(b'n'), Slot::Text(b'u')]);
        assert_eq!(render(&b, false), None);
        assert_eq!(render(&b, true).as_deref(), Some("nu"));
        assert_eq!(render(&binding(vec![]), true), None);
    }

    #[test]
    fn literal_dollar_brace_is_not_a_placeholder() {
        let b = binding(vec![Slot::Text(b'$'), Slot::Text(b'{')]);
        assert_eq!(render(&b, false), None);
    }

    #[test]
    fn loops_wrap_non_empty_bodies_only() {
        let b = binding(vec![
            Slot::Loop(vec![placeholder(Some("x"), ",", "")]),
            Slot::Loop(vec![]),
        ]);
        assert_eq!(render(&b, false).as_deref(), Some("\nwhile(true){\n,${x}\n}\n"));
    }
}
