use super::{rendered_chunks, Splitter, TokenBudget};
use crate::error::{Result, SplitError};
use crate::models::{Chunk, Document, SplittingMethod};
use serde_yaml::{Mapping, Value};

const METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Top-level keys kept in the overview chunk
const OVERVIEW_KEYS: &[&str] = &[
    "openapi",
    "swagger",
    "info",
    "servers",
    "host",
    "basePath",
    "schemes",
    "tags",
    "externalDocs",
    "security",
];

/// OpenAPI 3 and Swagger 2 documents (YAML or JSON): an overview, one chunk
/// per operation and one per schema
pub struct OpenApiSplitter {
    budget: TokenBudget,
}

impl OpenApiSplitter {
    pub fn new(budget: TokenBudget) -> Self {
        Self { budget }
    }

    fn emit(&self, text: String, section: &str, out: &mut Vec<Chunk>) -> Result<()> {
        out.extend(rendered_chunks(
            text.trim_end(),
            section,
            self.budget,
            SplittingMethod::OpenApi,
        )?);
        Ok(())
    }
}

impl Splitter for OpenApiSplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::OpenApi
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let value: Value =
            serde_yaml::from_str(&doc.content).map_err(|e| SplitError::structured("openapi", e))?;
        let root = value
            .as_mapping()
            .ok_or_else(|| SplitError::structured("openapi", "top level is not a mapping"))?;

        let mut chunks = Vec::new();

        let mut overview = Mapping::new();
        for key in OVERVIEW_KEYS {
            if let Some(v) = root.get(*key) {
                overview.insert(Value::from(*key), v.clone());
            }
        }
        if !overview.is_empty() {
            self.emit(render(&overview)?, "overview", &mut chunks)?;
        }

        if let Some(paths) = root.get("paths").and_then(Value::as_mapping) {
            for (path, item) in paths {
                let (Some(path), Some(item)) = (path.as_str(), item.as_mapping()) else {
                    continue;
                };
                let shared = item.get("parameters").and_then(Value::as_sequence);
                for (method, operation) in item {
                    let Some(method) = method.as_str().filter(|m| METHODS.contains(m)) else {
                        continue;
                    };
                    let Some(operation) = operation.as_mapping() else {
                        continue;
                    };
                    let section = format!("{} {}", method.to_uppercase(), path);
                    let rendered = render(&with_shared_parameters(operation, shared))?;
                    self.emit(format!("{section}\n{rendered}"), &section, &mut chunks)?;
                }
            }
        }

        let schemas = root
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(Value::as_mapping)
            .map(|m| ("components.schemas", m))
            .into_iter()
            .chain(
                root.get("definitions")
                    .and_then(Value::as_mapping)
                    .map(|m| ("definitions", m)),
            );
        for (prefix, entries) in schemas {
            for (name, schema) in entries {
                let Some(name) = name.as_str() else { continue };
                let section = format!("{prefix}.{name}");
                let mut single = Mapping::new();
                single.insert(Value::from(name), schema.clone());
                self.emit(render(&single)?, &section, &mut chunks)?;
            }
        }

        Ok(chunks)
    }
}

/// The operation with path-level parameters prepended unless it overrides them
/// (same `name` and `in`)
fn with_shared_parameters(operation: &Mapping, shared: Option<&Vec<Value>>) -> Mapping {
    let Some(shared) = shared.filter(|s| !s.is_empty()) else {
        return operation.clone();
    };
    let own: Vec<Value> = operation
        .get("parameters")
        .and_then(Value::as_sequence)
        .cloned()
        .unwrap_or_default();

    let identity = |p: &Value| (p.get("name").cloned(), p.get("in").cloned());
    let mut merged: Vec<Value> = shared
        .iter()
        .filter(|p| !own.iter().any(|o| identity(o) == identity(*p)))
        .cloned()
        .collect();
    merged.extend(own);

    let mut operation = operation.clone();
    operation.insert(Value::from("parameters"), Value::Sequence(merged));
    operation
}

fn render(mapping: &Mapping) -> Result<String> {
    serde_yaml::to_string(mapping).map_err(|e| SplitError::structured("openapi", e))
}
