//! Grammar documents in JSON.
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::grammar::Grammar;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Deserialization failure with the JSON path of the offending node.
    #[error("{origin}: at JSON path {path} → {source}")]
    Json {
        origin: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_grammar(path: &Path) -> Result<Grammar, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    from_slice_with_path(&bytes, &path.display().to_string())
}

pub fn grammar_from_str(src: &str) -> Result<Grammar, LoadError> {
    from_slice_with_path(src.as_bytes(), "<input>")
}

/// Deserialize with JSON-path context in error messages.
fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8], origin: &str) -> Result<T, LoadError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| LoadError::Json {
        origin: origin.to_owned(),
        path: err.path().to_string(),
        source: err.into_inner(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Expr;

    #[test]
    fn reads_a_grammar_document() {
        let g = grammar_from_str(r#"{"rules":[{"name":"Leaf","expr":{"sequence":[
            "begin_capture", {"tag":"Leaf"}, "end_capture"
        ]}}]}"#)
        .unwrap();
        assert_eq!(g.rules.len(), 1);
        assert_eq!(g.rules[0].expr, Expr::capture([Expr::tag("Leaf")]));
    }

    #[test]
    fn bad_node_reports_its_json_path() {
        let err = grammar_from_str(r#"{"rules":[{"name":"R","expr":{"byte":"x"}}]}"#).unwrap_err();
        match err {
            LoadError::Json { origin, path, .. } => {
                assert_eq!(origin, "<input>");
                assert!(path.starts_with("rules"), "unexpected path {path}");
            }
            other => panic!("expected a JSON error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_grammar(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }
}
