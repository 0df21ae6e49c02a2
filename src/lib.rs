//! Format-template synthesis for tree-building PEGs.
//!
//! Pipeline: grammar → [`build`] (element sequences, capture registry) →
//! [`resolve`] (tags) → [`lower`] (links, layout IR) → [`enumerate`]
//! (bindings) → [`render`] → [`emit`].
pub mod build;
pub mod dump;
pub mod element;
pub mod emit;
pub mod enumerate;
pub mod error;
pub mod grammar;
pub mod ir;
pub mod load;
pub mod lower;
pub mod registry;
pub mod render;
pub mod resolve;

pub use emit::{generate, generate_to_string, generate_with, GenerateOptions, Report};
pub use error::{AnalysisError, Error, Result};
pub use grammar::{Expr, Grammar, Rule};
