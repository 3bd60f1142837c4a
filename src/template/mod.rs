//! Passes over the decompiled template text.
//!
//! The decompiler produces human-oriented text rather than a document this
//! crate controls, so every pass here works on lines with the structural
//! [`scanner`] instead of a syntax tree:
//!
//! 1. [`sanitizer`]: break inline/standalone cycles, clean dependency lists
//! 2. [`injector`]: emit and bind configuration settings blocks
//! 3. [`pruner`]: drop parameters nothing references
//!
//! Each pass takes text and returns new text plus what it did.

pub mod injector;
pub mod pruner;
pub mod sanitizer;
pub mod scanner;

pub use injector::{InjectOutcome, inject, settings_variable};
pub use pruner::{PruneOutcome, prune};
pub use sanitizer::{INLINE_CHILDREN, InlineChild, RemovedDeclaration, SanitizeOutcome, sanitize};
pub use scanner::{Declaration, DeclarationKind};

/// A parameter declared in template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParameter {
    /// Parameter name
    pub name: String,
    /// Declared type (`string`, `int`, `object`, ...)
    pub declared_type: String,
}

/// Every parameter declared in the text, in declaration order.
#[must_use]
pub fn parameters(text: &str) -> Vec<TemplateParameter> {
    let lines = scanner::split_lines(text);
    scanner::scan(&lines)
        .into_iter()
        .filter(|d| d.kind == DeclarationKind::Param)
        .map(|d| TemplateParameter {
            name: d.identifier,
            declared_type: d.declared_type.unwrap_or_else(|| "string".to_string()),
        })
        .collect()
}
