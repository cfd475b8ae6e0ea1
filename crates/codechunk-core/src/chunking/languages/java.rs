use super::{field_text, LanguageSupport, UnitMatch};
use crate::models::{Language, UnitKind};
use tree_sitter::{Language as Grammar, Node};

pub struct JavaSupport;

impl LanguageSupport for JavaSupport {
    fn language(&self) -> Language {
        Language::Java
    }

    fn grammar(&self, _source: &str) -> Grammar {
        tree_sitter_java::LANGUAGE.into()
    }

    fn detect_unit(&self, node: Node<'_>, source: &str) -> Option<UnitMatch> {
        let kind = match node.kind() {
            "class_declaration" | "record_declaration" => UnitKind::ClassDeclaration,
            "interface_declaration" | "annotation_type_declaration" => UnitKind::Interface,
            "enum_declaration" => UnitKind::Enum,
            "method_declaration" | "constructor_declaration" => UnitKind::Method,
            _ => return None,
        };
        let name = field_text(node, "name", source)?;
        let unit = UnitMatch::new(kind, name.clone());
        Some(if kind == UnitKind::Method && name == "main" {
            unit.important()
        } else {
            unit
        })
    }
}
