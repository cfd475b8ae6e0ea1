use super::javascript::{ecmascript_absorbed, ecmascript_unit};
use super::{LanguageSupport, UnitMatch};
use crate::models::Language;
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Language as Grammar, Node};

static JSX_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(</[A-Za-z][\w.]*\s*>)|(return\s*\(?\s*<[A-Za-z])|(/>\s*$)").expect("valid regex")
});

/// TypeScript, switching to the TSX dialect only when JSX is present
#[derive(Debug, Default)]
pub struct TypeScriptSupport {
    always_tsx: bool,
}

impl TypeScriptSupport {
    /// For `.tsx` files
    pub fn tsx() -> Self {
        Self { always_tsx: true }
    }

    pub fn uses_tsx(&self, source: &str) -> bool {
        self.always_tsx || JSX_SYNTAX.is_match(source)
    }
}

impl LanguageSupport for TypeScriptSupport {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn grammar(&self, source: &str) -> Grammar {
        if self.uses_tsx(source) {
            tree_sitter_typescript::LANGUAGE_TSX.into()
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        }
    }

    fn detect_unit(&self, node: Node<'_>, source: &str) -> Option<UnitMatch> {
        ecmascript_unit(node, source)
    }

    fn absorbed_child<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        ecmascript_absorbed(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsx_detection() {
        let plain = TypeScriptSupport::default();
        assert!(!plain.uses_tsx("const x: Array<number> = [];\nfunction f<T>(a: T) { return a; }"));
        assert!(plain.uses_tsx("export const App = () => {\n  return (<div>hi</div>);\n};"));
        assert!(TypeScriptSupport::tsx().uses_tsx("const a = 1;"));
    }
}
