use crate::error::{Result, SplitError};
use crate::models::{Language, UnitKind};
use tree_sitter::{Language as Grammar, Node, Parser};

pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

/// Objects whose method calls register routes or plugins
pub const ROUTE_ROOTS: &[&str] = &[
    "app", "router", "server", "fastify", "api", "route", "routes", "instance",
];

/// Registration methods on a route root
pub const ROUTE_METHODS: &[&str] = &[
    "get", "post", "put", "patch", "delete", "head", "options", "all", "route", "register",
    "addHook", "use",
];

/// A syntax node recognized as a semantic unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMatch {
    pub kind: UnitKind,
    pub name: String,
    pub important: bool,
}

impl UnitMatch {
    pub fn new(kind: UnitKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            important: kind.is_important(),
        }
    }

    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }
}

pub trait LanguageSupport: Send + Sync {
    fn language(&self) -> Language;

    /// Grammar for this source; a language may pick a dialect from content
    fn grammar(&self, source: &str) -> Grammar;

    /// Unit for `node`, or `None` when the node only contains units
    fn detect_unit(&self, node: Node<'_>, source: &str) -> Option<UnitMatch>;

    /// Child of a unit node that belongs to the unit itself rather than
    /// nesting inside it (the declaration under an export or decorator)
    fn absorbed_child<'t>(&self, _node: Node<'t>) -> Option<Node<'t>> {
        None
    }

    fn create_parser(&self, source: &str) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar(source))
            .map_err(|e| SplitError::Internal(format!("{} grammar: {}", self.language(), e)))?;
        Ok(parser)
    }
}

pub fn get_language_support(lang: Language) -> Option<Box<dyn LanguageSupport>> {
    match lang {
        Language::JavaScript => Some(Box::new(javascript::JavaScriptSupport)),
        Language::TypeScript => Some(Box::new(typescript::TypeScriptSupport::default())),
        Language::Python => Some(Box::new(python::PythonSupport)),
        Language::Rust => Some(Box::new(rust::RustSupport)),
        Language::Go => Some(Box::new(go::GoSupport)),
        Language::Java => Some(Box::new(java::JavaSupport)),
        _ => None,
    }
}

pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

/// Text of the named field, e.g. a declaration's `name`
pub(crate) fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Whether any ancestor (before hitting one of `stop`) has a kind in `kinds`
pub(crate) fn has_ancestor(node: Node<'_>, kinds: &[&str], stop: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return true;
        }
        if stop.contains(&parent.kind()) {
            return false;
        }
        current = parent.parent();
    }
    false
}

pub(crate) fn is_route_call(root: &str, method: &str) -> bool {
    ROUTE_ROOTS.contains(&root) && ROUTE_METHODS.contains(&method)
}

/// `GET /users` when the first argument is a string literal, else `app.get`
pub(crate) fn route_name(root: &str, method: &str, first_arg: Option<&str>) -> String {
    match first_arg.map(unquote) {
        Some(path) if !path.is_empty() && is_http_method(method) => {
            format!("{} {}", method.to_uppercase(), path)
        }
        Some(path) if !path.is_empty() => format!("{}.{} {}", root, method, path),
        _ => format!("{}.{}", root, method),
    }
}

fn is_http_method(method: &str) -> bool {
    matches!(
        method,
        "get" | "post" | "put" | "patch" | "delete" | "head" | "options" | "all"
    )
}

/// Strip matching string quotes; non-literals yield an empty string
pub(crate) fn unquote(text: &str) -> &str {
    let text = text.trim();
    for q in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            return &text[1..text.len() - 1];
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_names() {
        assert_eq!(route_name("app", "get", Some("'/users'")), "GET /users");
        assert_eq!(route_name("fastify", "register", Some("\"/v1\"")), "fastify.register /v1");
        assert_eq!(route_name("fastify", "register", Some("plugin")), "fastify.register");
        assert!(is_route_call("router", "addHook"));
        assert!(!is_route_call("express", "get"));
    }

    #[test]
    fn test_supported_languages() {
        for lang in [
            Language::JavaScript,
            Language::TypeScript,
            Language::Python,
            Language::Rust,
            Language::Go,
            Language::Java,
        ] {
            let support = get_language_support(lang).expect("bundled grammar");
            assert_eq!(support.language(), lang);
            assert!(support.create_parser("").is_ok());
        }
        assert!(get_language_support(Language::Ruby).is_none());
    }
}
