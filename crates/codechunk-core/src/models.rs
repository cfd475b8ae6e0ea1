use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Rust,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Kotlin,
    Swift,
    Scala,
    Shell,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "py" | "pyi" => Language::Python,
            "rs" => Language::Rust,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            "scala" | "sc" => Language::Scala,
            "sh" | "bash" | "zsh" => Language::Shell,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &str) -> Self {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Whether a tree-sitter grammar is bundled for this language
    pub fn has_ast_support(&self) -> bool {
        matches!(
            self,
            Language::JavaScript
                | Language::TypeScript
                | Language::Python
                | Language::Rust
                | Language::Go
                | Language::Java
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Scala => "scala",
            Language::Shell => "shell",
            Language::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content kinds assigned by the classifier
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Code,
    Markdown,
    #[serde(rename = "openapi")]
    OpenApi,
    JsonSchema,
    YamlConfig,
    JsonConfig,
    Documentation,
    #[default]
    Generic,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Code => "code",
            ContentKind::Markdown => "markdown",
            ContentKind::OpenApi => "openapi",
            ContentKind::JsonSchema => "json_schema",
            ContentKind::YamlConfig => "yaml_config",
            ContentKind::JsonConfig => "json_config",
            ContentKind::Documentation => "documentation",
            ContentKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which splitter produced a chunk
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SplittingMethod {
    Ast,
    LineWindow,
    Markdown,
    #[serde(rename = "openapi")]
    OpenApi,
    JsonSchema,
    YamlConfig,
    JsonConfig,
    Documentation,
    #[default]
    Generic,
    EmergencyFixedSize,
    NoSplittingApplied,
}

impl SplittingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplittingMethod::Ast => "ast",
            SplittingMethod::LineWindow => "line_window",
            SplittingMethod::Markdown => "markdown",
            SplittingMethod::OpenApi => "openapi",
            SplittingMethod::JsonSchema => "json_schema",
            SplittingMethod::YamlConfig => "yaml_config",
            SplittingMethod::JsonConfig => "json_config",
            SplittingMethod::Documentation => "documentation",
            SplittingMethod::Generic => "generic",
            SplittingMethod::EmergencyFixedSize => "emergency_fixed_size",
            SplittingMethod::NoSplittingApplied => "no_splitting_applied",
        }
    }
}

impl fmt::Display for SplittingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable input to the splitter router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(source_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata {
                source_path: source_path.into(),
                ..Default::default()
            },
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn path(&self) -> &str {
        &self.metadata.source_path
    }

    /// Lower-cased file name without directories
    pub fn file_name(&self) -> String {
        Path::new(&self.metadata.source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.metadata.source_path)
            .to_lowercase()
    }

    /// Lower-cased extension, empty when the path has none
    pub fn extension(&self) -> String {
        Path::new(&self.metadata.source_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Caller-provided fields carried through to every chunk
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A bounded piece of document content, the unit of embedding and storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// A chunk covering `start_line..=end_line` (1-based) produced by `method`
    pub fn new(
        content: impl Into<String>,
        start_line: usize,
        end_line: usize,
        method: SplittingMethod,
    ) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata {
                start_line,
                end_line,
                splitting_method: method,
                ..Default::default()
            },
        }
    }

    pub fn with_unit(mut self, unit: SemanticUnit) -> Self {
        self.metadata.unit = Some(unit);
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.metadata.section = Some(section.into());
        self
    }

    pub fn with_fallback_reason(mut self, reason: impl Into<String>) -> Self {
        self.metadata.fallback_reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub content_kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub chunk_index: usize,
    /// Approximate: characters divided by a fixed characters-per-token ratio
    pub token_count: usize,
    /// 1-based inclusive; 0 when unknown
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<SemanticUnit>,
    pub splitting_method: SplittingMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Heading path, config key path or `METHOD /path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<HashInfo>,
    /// Content hash of an earlier, structurally similar chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub near_duplicate_of: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HashInfo {
    pub content_hash: String,
    pub hash_algorithm: String,
    pub hash_time_ms: f64,
    pub content_length: usize,
    /// 64-bit SimHash as 16 hex digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simhash: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    FunctionDeclaration,
    Method,
    ArrowFunction,
    ClassDeclaration,
    NamedExport,
    DefaultExport,
    Route,
    EntryPoint,
    Struct,
    Enum,
    Trait,
    Impl,
    Interface,
    TypeAlias,
    Module,
    Merged,
    Residual,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::FunctionDeclaration => "function_declaration",
            UnitKind::Method => "method",
            UnitKind::ArrowFunction => "arrow_function",
            UnitKind::ClassDeclaration => "class_declaration",
            UnitKind::NamedExport => "named_export",
            UnitKind::DefaultExport => "default_export",
            UnitKind::Route => "route",
            UnitKind::EntryPoint => "entry_point",
            UnitKind::Struct => "struct",
            UnitKind::Enum => "enum",
            UnitKind::Trait => "trait",
            UnitKind::Impl => "impl",
            UnitKind::Interface => "interface",
            UnitKind::TypeAlias => "type_alias",
            UnitKind::Module => "module",
            UnitKind::Merged => "merged",
            UnitKind::Residual => "residual",
        }
    }

    /// Exports, routes and entry points are kept even when small
    pub fn is_important(&self) -> bool {
        matches!(
            self,
            UnitKind::NamedExport | UnitKind::DefaultExport | UnitKind::Route | UnitKind::EntryPoint
        )
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A syntactic construct that underlies a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticUnit {
    pub kind: UnitKind,
    /// `kind`, or `<kind>_part` for a fragment of an oversize unit
    #[serde(rename = "type")]
    pub unit_type: String,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub important: bool,
    /// Name of the unit this one was split from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<PartInfo>,
    /// Names of the units folded into a merged chunk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

impl SemanticUnit {
    pub fn new(kind: UnitKind, name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            kind,
            unit_type: kind.as_str().to_string(),
            name: name.into(),
            start_line,
            end_line,
            important: kind.is_important(),
            parent: None,
            part: None,
            members: Vec::new(),
        }
    }

    /// Fragment `index` of `total` covering the given lines
    pub fn part_of(&self, index: usize, total: usize, start_line: usize, end_line: usize) -> Self {
        Self {
            kind: self.kind,
            unit_type: format!("{}_part", self.kind.as_str()),
            name: format!("{} (part {}/{})", self.name, index + 1, total),
            start_line,
            end_line,
            important: self.important,
            parent: Some(self.name.clone()),
            part: Some(PartInfo { index, total }),
            members: Vec::new(),
        }
    }

    pub fn is_part(&self) -> bool {
        self.part.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartInfo {
    pub index: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_support() {
        assert_eq!(Language::from_path("src/app.tsx"), Language::TypeScript);
        assert_eq!(Language::from_path("Makefile"), Language::Unknown);
        assert!(Language::Go.has_ast_support());
        assert!(!Language::Ruby.has_ast_support());
    }

    #[test]
    fn test_part_tagging() {
        let unit = SemanticUnit::new(UnitKind::FunctionDeclaration, "big", 1, 100);
        let part = unit.part_of(1, 2, 51, 100);
        assert_eq!(part.unit_type, "function_declaration_part");
        assert_eq!(part.parent.as_deref(), Some("big"));
        assert_eq!(part.part, Some(PartInfo { index: 1, total: 2 }));
    }

    #[test]
    fn test_tags_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&SplittingMethod::NoSplittingApplied).unwrap(),
            "\"no_splitting_applied\""
        );
        assert_eq!(serde_json::to_string(&ContentKind::OpenApi).unwrap(), "\"openapi\"");
        assert_eq!(
            serde_json::to_string(&UnitKind::DefaultExport).unwrap(),
            "\"default_export\""
        );
    }
}
