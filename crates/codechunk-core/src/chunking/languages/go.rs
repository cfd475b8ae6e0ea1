use super::{field_text, node_text, LanguageSupport, UnitMatch};
use crate::models::{Language, UnitKind};
use tree_sitter::{Language as Grammar, Node};

pub struct GoSupport;

impl LanguageSupport for GoSupport {
    fn language(&self) -> Language {
        Language::Go
    }

    fn grammar(&self, _source: &str) -> Grammar {
        tree_sitter_go::LANGUAGE.into()
    }

    fn detect_unit(&self, node: Node<'_>, source: &str) -> Option<UnitMatch> {
        match node.kind() {
            "function_declaration" => {
                let name = field_text(node, "name", source)?;
                let unit = UnitMatch::new(UnitKind::FunctionDeclaration, name.clone());
                Some(if name == "main" { unit.important() } else { unit })
            }
            "method_declaration" => {
                let name = field_text(node, "name", source)?;
                let name = match node.child_by_field_name("receiver") {
                    Some(recv) => format!("{}.{}", receiver_type(node_text(recv, source)), name),
                    None => name,
                };
                Some(UnitMatch::new(UnitKind::Method, name))
            }
            "type_declaration" => {
                let mut cursor = node.walk();
                let spec = node
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "type_spec" | "type_alias"))?;
                let name = field_text(spec, "name", source)?;
                let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
                    Some("struct_type") => UnitKind::Struct,
                    Some("interface_type") => UnitKind::Interface,
                    _ => UnitKind::TypeAlias,
                };
                Some(UnitMatch::new(kind, name))
            }
            _ => None,
        }
    }
}

/// `(s *Server)` -> `Server`
fn receiver_type(receiver: &str) -> &str {
    receiver
        .trim_matches(|c| c == '(' || c == ')')
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .trim_start_matches('*')
        .split('[')
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_type() {
        assert_eq!(receiver_type("(s *Server)"), "Server");
        assert_eq!(receiver_type("(Point)"), "Point");
        assert_eq!(receiver_type("(l *List[T])"), "List");
    }
}
