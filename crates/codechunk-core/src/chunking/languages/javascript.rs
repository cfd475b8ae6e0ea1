use super::{field_text, has_ancestor, is_route_call, node_text, route_name, LanguageSupport, UnitMatch};
use crate::models::{Language, UnitKind};
use tree_sitter::{Language as Grammar, Node};

pub struct JavaScriptSupport;

impl LanguageSupport for JavaScriptSupport {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn grammar(&self, _source: &str) -> Grammar {
        tree_sitter_javascript::LANGUAGE.into()
    }

    fn detect_unit(&self, node: Node<'_>, source: &str) -> Option<UnitMatch> {
        ecmascript_unit(node, source)
    }

    fn absorbed_child<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        ecmascript_absorbed(node)
    }
}

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "arrow_function",
    "method_definition",
];

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Unit detection shared by the JavaScript and TypeScript grammars
pub(super) fn ecmascript_unit(node: Node<'_>, source: &str) -> Option<UnitMatch> {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            let name = field_text(node, "name", source)?;
            let unit = UnitMatch::new(UnitKind::FunctionDeclaration, name.clone());
            Some(if name == "main" { unit.important() } else { unit })
        }
        "class_declaration" | "abstract_class_declaration" => Some(UnitMatch::new(
            UnitKind::ClassDeclaration,
            field_text(node, "name", source).unwrap_or_else(|| "class".to_string()),
        )),
        "method_definition" => {
            let name = field_text(node, "name", source)?;
            let name = match enclosing_class(node, source) {
                Some(class) => format!("{}.{}", class, name),
                None => name,
            };
            Some(UnitMatch::new(UnitKind::Method, name))
        }
        "lexical_declaration" | "variable_declaration" => {
            if has_ancestor(node, FUNCTION_KINDS, &[]) {
                return None;
            }
            function_binding(node, source).map(|name| UnitMatch::new(UnitKind::ArrowFunction, name))
        }
        "export_statement" => Some(export_unit(node, source)),
        "expression_statement" => statement_unit(node, source),
        "interface_declaration" => Some(UnitMatch::new(
            UnitKind::Interface,
            field_text(node, "name", source)?,
        )),
        "type_alias_declaration" => Some(UnitMatch::new(
            UnitKind::TypeAlias,
            field_text(node, "name", source)?,
        )),
        "enum_declaration" => Some(UnitMatch::new(UnitKind::Enum, field_text(node, "name", source)?)),
        "internal_module" | "module" => Some(UnitMatch::new(
            UnitKind::Module,
            field_text(node, "name", source).unwrap_or_else(|| "namespace".to_string()),
        )),
        _ => None,
    }
}

pub(super) fn ecmascript_absorbed<'t>(node: Node<'t>) -> Option<Node<'t>> {
    match node.kind() {
        "export_statement" => node.child_by_field_name("declaration"),
        _ => None,
    }
}

/// Name of the first declarator bound to a function value
fn function_binding(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "variable_declarator")
        .find(|d| {
            d.child_by_field_name("value")
                .map(|v| FUNCTION_VALUES.contains(&v.kind()))
                .unwrap_or(false)
        });
    found.and_then(|d| field_text(d, "name", source))
}

fn export_unit(node: Node<'_>, source: &str) -> UnitMatch {
    let mut cursor = node.walk();
    let is_default = node.children(&mut cursor).any(|c| c.kind() == "default");
    let kind = if is_default {
        UnitKind::DefaultExport
    } else {
        UnitKind::NamedExport
    };

    let name = node
        .child_by_field_name("declaration")
        .and_then(|d| declaration_name(d, source))
        .or_else(|| {
            node.child_by_field_name("value")
                .filter(|v| v.kind() == "identifier")
                .map(|v| node_text(v, source).to_string())
        })
        .or_else(|| {
            let mut cursor = node.walk();
            let clause = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "export_clause");
            clause.map(|c| {
                node_text(c, source)
                    .trim_matches(|ch| ch == '{' || ch == '}')
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| kind.as_str().to_string());

    UnitMatch::new(kind, name)
}

fn declaration_name(decl: Node<'_>, source: &str) -> Option<String> {
    field_text(decl, "name", source).or_else(|| function_binding(decl, source)).or_else(|| {
        let mut cursor = decl.walk();
        let declarator = decl
            .named_children(&mut cursor)
            .find(|c| c.kind() == "variable_declarator");
        declarator.and_then(|d| field_text(d, "name", source))
    })
}

/// `module.exports = ...`, `exports.x = ...` and route registrations
fn statement_unit(node: Node<'_>, source: &str) -> Option<UnitMatch> {
    let mut expr = node.named_child(0)?;
    if expr.kind() == "await_expression" {
        expr = expr.named_child(0)?;
    }

    match expr.kind() {
        "assignment_expression" => {
            let left = expr.child_by_field_name("left")?;
            let target = node_text(left, source).replace(char::is_whitespace, "");
            if target == "module.exports" {
                let name = expr
                    .child_by_field_name("right")
                    .filter(|r| r.kind() == "identifier")
                    .map(|r| node_text(r, source).to_string())
                    .unwrap_or_else(|| "module.exports".to_string());
                Some(UnitMatch::new(UnitKind::DefaultExport, name))
            } else if let Some(prop) = target
                .strip_prefix("module.exports.")
                .or_else(|| target.strip_prefix("exports."))
            {
                Some(UnitMatch::new(UnitKind::NamedExport, prop))
            } else {
                None
            }
        }
        "call_expression" => route_unit(expr, source),
        _ => None,
    }
}

fn route_unit(call: Node<'_>, source: &str) -> Option<UnitMatch> {
    let callee = call.child_by_field_name("function")?;
    if callee.kind() != "member_expression" {
        return None;
    }
    let root = callee.child_by_field_name("object")?;
    if root.kind() != "identifier" {
        return None;
    }
    let root = node_text(root, source);
    let method = node_text(callee.child_by_field_name("property")?, source);
    if !is_route_call(root, method) {
        return None;
    }

    let first_arg = call
        .child_by_field_name("arguments")
        .and_then(|args| args.named_child(0))
        .filter(|a| matches!(a.kind(), "string" | "template_string"))
        .map(|a| node_text(a, source));
    Some(UnitMatch::new(UnitKind::Route, route_name(root, method, first_arg)))
}

fn enclosing_class(node: Node<'_>, source: &str) -> Option<String> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(
            parent.kind(),
            "class_declaration" | "class" | "abstract_class_declaration"
        ) {
            return field_text(parent, "name", source);
        }
        current = parent.parent();
    }
    None
}
