use super::{field_text, has_ancestor, is_route_call, node_text, route_name, LanguageSupport, UnitMatch};
use crate::models::{Language, UnitKind};
use tree_sitter::{Language as Grammar, Node};

pub struct PythonSupport;

impl LanguageSupport for PythonSupport {
    fn language(&self) -> Language {
        Language::Python
    }

    fn grammar(&self, _source: &str) -> Grammar {
        tree_sitter_python::LANGUAGE.into()
    }

    fn detect_unit(&self, node: Node<'_>, source: &str) -> Option<UnitMatch> {
        match node.kind() {
            "function_definition" => {
                let name = field_text(node, "name", source)?;
                if has_ancestor(node, &["class_definition"], &["function_definition"]) {
                    Some(UnitMatch::new(UnitKind::Method, name))
                } else if name == "main" {
                    Some(UnitMatch::new(UnitKind::FunctionDeclaration, name).important())
                } else {
                    Some(UnitMatch::new(UnitKind::FunctionDeclaration, name))
                }
            }
            "class_definition" => Some(UnitMatch::new(
                UnitKind::ClassDeclaration,
                field_text(node, "name", source)?,
            )),
            "decorated_definition" => {
                let definition = node.child_by_field_name("definition")?;
                let mut cursor = node.walk();
                let route = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .find_map(|d| decorator_route(d, source));
                route.or_else(|| self.detect_unit(definition, source))
            }
            "if_statement" if is_main_guard(node, source) => {
                Some(UnitMatch::new(UnitKind::EntryPoint, "__main__"))
            }
            _ => None,
        }
    }

    fn absorbed_child<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "decorated_definition" => node.child_by_field_name("definition"),
            _ => None,
        }
    }
}

/// `@app.get("/items")` style decorators
fn decorator_route(decorator: Node<'_>, source: &str) -> Option<UnitMatch> {
    let call = decorator.named_child(0).filter(|n| n.kind() == "call")?;
    let callee = call.child_by_field_name("function").filter(|n| n.kind() == "attribute")?;
    let root = node_text(callee.child_by_field_name("object")?, source);
    let method = node_text(callee.child_by_field_name("attribute")?, source);
    if !is_route_call(root, method) {
        return None;
    }
    let first_arg = call
        .child_by_field_name("arguments")
        .and_then(|args| args.named_child(0))
        .filter(|a| a.kind() == "string")
        .map(|a| node_text(a, source));
    Some(UnitMatch::new(UnitKind::Route, route_name(root, method, first_arg)))
}

fn is_main_guard(node: Node<'_>, source: &str) -> bool {
    node.child_by_field_name("condition")
        .map(|c| {
            let cond: String = node_text(c, source)
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .map(|ch| if ch == '\'' { '"' } else { ch })
                .collect();
            cond == r#"__name__=="__main__""# || cond == r#""__main__"==__name__"#
        })
        .unwrap_or(false)
}
