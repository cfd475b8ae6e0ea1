//! YAML and JSON configuration files, grouped by top-level key

use super::{line_range_of, Splitter, TokenBudget};
use crate::error::{Result, SplitError};
use crate::models::{Chunk, Document, SplittingMethod};
use text_splitter::TextSplitter;

/// One top-level key, its rendered text and its source lines
#[derive(Debug, Clone)]
struct Entry {
    key: String,
    text: String,
    start_line: usize,
    end_line: usize,
    /// Whether `text` is a verbatim slice of the source starting at `start_line`
    verbatim: bool,
}

pub struct YamlConfigSplitter {
    budget: TokenBudget,
}

impl YamlConfigSplitter {
    pub fn new(budget: TokenBudget) -> Self {
        Self { budget }
    }
}

impl Splitter for YamlConfigSplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::YamlConfig
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let content = doc.content.as_str();
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| SplitError::structured("yaml", e))?;

        let Some(mapping) = value.as_mapping().filter(|m| !m.is_empty()) else {
            return whole_text(content, self.budget, SplittingMethod::YamlConfig);
        };
        let blocks = yaml_blocks(content);
        if blocks.len() != mapping.len() {
            // flow mappings or anchors spread over one line
            return whole_text(content, self.budget, SplittingMethod::YamlConfig);
        }

        group(blocks, self.budget, SplittingMethod::YamlConfig, |entries| {
            entries
                .iter()
                .map(|e| e.text.as_str())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
    }
}

/// Source blocks of the top-level keys; lines before the first key stay with it
fn yaml_blocks(content: &str) -> Vec<Entry> {
    let mut starts: Vec<(usize, usize, String)> = Vec::new();
    let mut offset = 0;
    for (i, line) in content.split_inclusive('\n').enumerate() {
        if let Some(key) = yaml_top_level_key(line) {
            starts.push((offset, i + 1, key));
        }
        offset += line.len();
    }

    let mut entries = Vec::with_capacity(starts.len());
    for (n, (start, _, key)) in starts.iter().enumerate() {
        let from = if n == 0 { 0 } else { *start };
        let to = starts.get(n + 1).map_or(content.len(), |next| next.0);
        let (start_line, end_line) = line_range_of(content, from, to);
        entries.push(Entry {
            key: key.clone(),
            text: content[from..to].to_string(),
            start_line,
            end_line,
            verbatim: true,
        });
    }
    entries
}

fn yaml_top_level_key(line: &str) -> Option<String> {
    let first = line.chars().next()?;
    if first.is_whitespace() || matches!(first, '#' | '-' | '.' | '%') {
        return None;
    }
    let (key, _) = line.split_once(':')?;
    Some(key.trim().trim_matches(['"', '\'']).to_string())
}

pub struct JsonConfigSplitter {
    budget: TokenBudget,
}

impl JsonConfigSplitter {
    pub fn new(budget: TokenBudget) -> Self {
        Self { budget }
    }
}

impl Splitter for JsonConfigSplitter {
    fn method(&self) -> SplittingMethod {
        SplittingMethod::JsonConfig
    }

    fn split(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let content = doc.content.as_str();
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| SplitError::structured("json", e))?;

        let Some(object) = value.as_object().filter(|o| !o.is_empty()) else {
            return whole_text(content, self.budget, SplittingMethod::JsonConfig);
        };

        let total_lines = content.trim_end().lines().count().max(1);
        let mut key_lines = json_key_lines(content);
        if key_lines.len() != object.len() {
            key_lines = vec![1; object.len()];
        }

        let mut entries = Vec::with_capacity(object.len());
        for (n, (key, val)) in object.iter().enumerate() {
            let rendered =
                serde_json::to_string_pretty(val).map_err(|e| SplitError::structured("json", e))?;
            let start_line = key_lines[n];
            let end_line = key_lines
                .get(n + 1)
                .map_or(total_lines, |&next| next.saturating_sub(1))
                .max(start_line);
            entries.push(Entry {
                key: key.clone(),
                text: format!("  {}: {}", quote(key), rendered.replace('\n', "\n  ")),
                start_line,
                end_line,
                verbatim: false,
            });
        }

        group(entries, self.budget, SplittingMethod::JsonConfig, |entries| {
            let body: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
            format!("{{\n{}\n}}", body.join(",\n"))
        })
    }
}

fn quote(key: &str) -> String {
    serde_json::Value::String(key.to_string()).to_string()
}

/// Line of every top-level key of a JSON object, in source order
fn json_key_lines(content: &str) -> Vec<usize> {
    let mut lines = Vec::new();
    let mut depth = 0usize;
    let mut line = 1;
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;

    for c in content.chars() {
        if c == '\n' {
            line += 1;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                if depth == 1 && expect_key {
                    lines.push(line);
                    expect_key = false;
                }
            }
            '{' | '[' => {
                depth += 1;
                if depth == 1 {
                    expect_key = c == '{';
                }
            }
            '}' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 1 => expect_key = true,
            _ => {}
        }
    }
    lines
}

/// Greedily pack entries while `join` of the group fits; oversize entries are text-split
fn group(
    entries: Vec<Entry>,
    budget: TokenBudget,
    method: SplittingMethod,
    join: impl Fn(&[Entry]) -> String,
) -> Result<Vec<Chunk>> {
    let fits = |text: &str| text.chars().count() <= budget.max_chars;
    let mut chunks = Vec::new();
    let mut current: Vec<Entry> = Vec::new();

    for entry in entries {
        if !fits(&join(std::slice::from_ref(&entry))) {
            flush(&mut current, method, &join, &mut chunks);
            chunks.extend(split_entry(&entry, budget, method)?);
            continue;
        }
        current.push(entry);
        if current.len() > 1 && !fits(&join(&current)) {
            let last = current.pop();
            flush(&mut current, method, &join, &mut chunks);
            current.extend(last);
        }
    }
    flush(&mut current, method, &join, &mut chunks);
    Ok(chunks)
}

fn flush(
    current: &mut Vec<Entry>,
    method: SplittingMethod,
    join: &impl Fn(&[Entry]) -> String,
    chunks: &mut Vec<Chunk>,
) {
    let (Some(first), Some(last)) = (current.first(), current.last()) else {
        return;
    };
    let keys: Vec<&str> = current.iter().map(|e| e.key.as_str()).collect();
    chunks.push(
        Chunk::new(join(current), first.start_line, last.end_line, method)
            .with_section(keys.join(", ")),
    );
    current.clear();
}

fn split_entry(entry: &Entry, budget: TokenBudget, method: SplittingMethod) -> Result<Vec<Chunk>> {
    let splitter = TextSplitter::new(budget.text_config(false)?);
    Ok(splitter
        .chunk_indices(&entry.text)
        .map(|(offset, text)| {
            let (start, end) = if entry.verbatim {
                let (s, e) = line_range_of(&entry.text, offset, offset + text.len());
                (entry.start_line + s - 1, entry.start_line + e - 1)
            } else {
                (entry.start_line, entry.end_line)
            };
            Chunk::new(text, start, end, method).with_section(entry.key.clone())
        })
        .collect())
}

/// Documents that are not a non-empty top-level mapping
fn whole_text(content: &str, budget: TokenBudget, method: SplittingMethod) -> Result<Vec<Chunk>> {
    let splitter = TextSplitter::new(budget.text_config(false)?);
    Ok(splitter
        .chunk_indices(content)
        .map(|(offset, text)| {
            let (start, end) = line_range_of(content, offset, offset + text.len());
            Chunk::new(text, start, end, method)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(max_chars: usize) -> TokenBudget {
        TokenBudget {
            min_chars: 8,
            max_chars,
            overlap_chars: 0,
        }
    }

    #[test]
    fn test_yaml_groups_top_level_keys() {
        let content = "# service\nname: api\nport: 8080\ndatabase:\n  host: localhost\n  pool: 5\n";
        let doc = Document::new("config.yml", content);
        let chunks = YamlConfigSplitter::new(budget(40)).split(&doc).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("name, port"));
        assert_eq!(chunks[0].metadata.start_line, 1);
        assert_eq!(chunks[0].metadata.end_line, 3);
        assert_eq!(chunks[1].metadata.section.as_deref(), Some("database"));
        assert_eq!(chunks[1].metadata.start_line, 4);
        assert!(chunks[1].content.contains("pool: 5"));
    }

    #[test]
    fn test_yaml_single_chunk_when_small() {
        let doc = Document::new("ci.yaml", "on: push\njobs: {}\n");
        let chunks = YamlConfigSplitter::new(budget(500)).split(&doc).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("on, jobs"));
    }

    #[test]
    fn test_invalid_yaml_is_structured_error() {
        let doc = Document::new("bad.yml", "key: [unclosed\n");
        let err = YamlConfigSplitter::new(budget(500)).split(&doc).unwrap_err();
        assert_eq!(err.reason(), "structured_parse_error");
    }

    #[test]
    fn test_json_package_manifest() {
        let content = "{\n  \"name\": \"x\",\n  \"version\": \"1.0.0\",\n  \"scripts\": {\n    \"test\": \"jest\"\n  }\n}\n";
        let doc = Document::new("package.json", content);
        let chunks = JsonConfigSplitter::new(budget(500)).split(&doc).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("name, version, scripts"));
        let reparsed: serde_json::Value = serde_json::from_str(&chunks[0].content).unwrap();
        assert_eq!(reparsed["scripts"]["test"], "jest");
        assert_eq!(chunks[0].metadata.start_line, 2);
        assert_eq!(chunks[0].metadata.end_line, 7);
    }

    #[test]
    fn test_json_key_lines() {
        let content = "{\n  \"a\": \"x,\\\"y\",\n  \"b\": {\"c\": 1},\n  \"d\": [1, 2]\n}";
        assert_eq!(json_key_lines(content), vec![2, 3, 4]);
    }

    #[test]
    fn test_oversize_key_is_text_split() {
        let long: Vec<String> = (0..40).map(|i| format!("item number {i}")).collect();
        let value = serde_json::json!({ "small": 1, "list": long });
        let doc = Document::new("data.json", serde_json::to_string_pretty(&value).unwrap());
        let chunks = JsonConfigSplitter::new(budget(120)).split(&doc).unwrap();

        assert!(chunks.len() > 2);
        assert_eq!(chunks[0].metadata.section.as_deref(), Some("small"));
        assert!(chunks[1..]
            .iter()
            .all(|c| c.metadata.section.as_deref() == Some("list")));
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 120));
    }
}
