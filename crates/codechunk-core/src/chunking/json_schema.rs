use super::{rendered_chunks, Splitter, TokenBudget};
use crate::error::{Result, SplitError};
use crate::models::{Chunk, Document, SplittingMethod};
use serde_json::{Map, Value};

/// Members split out of the root chunk, in emission order
const SPLIT_MEMBERS: &[&str] = &["properties", "definitions", "$defs"];

/// JSON Schema documents: the root keywords, then one chunk per property
/// and per definition, each addressed by its JSON pointer
pub struct JsonSchemaSplitter {
    budget: TokenBudget,
}

impl JsonSchemaSplitter {
    pub fn new(budget: TokenBudget) -> Self {
        Self { budget }
    }
}

impl Splitter for JsonSchemaSplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::JsonSchema
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let value = parse(doc)?;
        let root = value
            .as_object()
            .ok_or_else(|| SplitError::structured("json_schema", "top level is not an object"))?;

        let mut chunks = Vec::new();
        let rest: Map<String, Value> = root
            .iter()
            .filter(|(k, _)| !SPLIT_MEMBERS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !rest.is_empty() {
            chunks.extend(rendered_chunks(
                &pretty(&Value::Object(rest))?,
                "#",
                self.budget,
                SplittingMethod::JsonSchema,
            )?);
        }

        for member in SPLIT_MEMBERS {
            let Some(entries) = root.get(*member).and_then(Value::as_object) else {
                continue;
            };
            for (name, schema) in entries {
                let pointer = format!("/{}/{}", escape(member), escape(name));
                let text = format!("{}: {}", Value::String(name.clone()), pretty(schema)?);
                chunks.extend(rendered_chunks(
                    &text,
                    &pointer,
                    self.budget,
                    SplittingMethod::JsonSchema,
                )?);
            }
        }
        Ok(chunks)
    }
}

/// JSON, or YAML for `.yml`/`.yaml` schemas
fn parse(doc: &Document) -> Result<Value> {
    match doc.extension().as_str() {
        "yml" | "yaml" => serde_yaml::from_str(&doc.content)
            .map_err(|e| SplitError::structured("json_schema", e)),
        _ => serde_json::from_str(&doc.content).map_err(|e| SplitError::structured("json_schema", e)),
    }
}

fn pretty(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| SplitError::structured("json_schema", e))
}

/// RFC 6901 reference token escaping
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
