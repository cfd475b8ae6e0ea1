use super::{field_text, has_ancestor, LanguageSupport, UnitMatch};
use crate::models::{Language, UnitKind};
use tree_sitter::{Language as Grammar, Node};

pub struct RustSupport;

impl LanguageSupport for RustSupport {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn grammar(&self, _source: &str) -> Grammar {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn detect_unit(&self, node: Node<'_>, source: &str) -> Option<UnitMatch> {
        let named = |kind: UnitKind| field_text(node, "name", source).map(|n| UnitMatch::new(kind, n));
        match node.kind() {
            "function_item" => {
                let name = field_text(node, "name", source)?;
                if has_ancestor(node, &["impl_item", "trait_item"], &["function_item"]) {
                    Some(UnitMatch::new(UnitKind::Method, name))
                } else if name == "main" {
                    Some(UnitMatch::new(UnitKind::FunctionDeclaration, name).important())
                } else {
                    Some(UnitMatch::new(UnitKind::FunctionDeclaration, name))
                }
            }
            "struct_item" | "union_item" => named(UnitKind::Struct),
            "enum_item" => named(UnitKind::Enum),
            "trait_item" => named(UnitKind::Trait),
            "type_item" => named(UnitKind::TypeAlias),
            "mod_item" if node.child_by_field_name("body").is_some() => named(UnitKind::Module),
            "impl_item" => {
                let ty = field_text(node, "type", source)?;
                let name = match field_text(node, "trait", source) {
                    Some(tr) => format!("{} for {}", tr, ty),
                    None => ty,
                };
                Some(UnitMatch::new(UnitKind::Impl, name))
            }
            _ => None,
        }
    }
}
