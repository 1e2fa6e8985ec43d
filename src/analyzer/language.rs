//! Language Detection
//!
//! Single table mapping extensions and special filenames to languages, with
//! the pattern family the structural tier uses for each.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which extraction patterns apply to a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFamily {
    Rust,
    /// TypeScript and JavaScript in all their flavours
    Script,
    Python,
    Go,
    /// Java, Kotlin, Scala
    Jvm,
    Markdown,
    /// Data or markup without declarations
    Plain,
}

struct LanguageMeta {
    display_name: &'static str,
    id: &'static str,
    extensions: &'static [&'static str],
    family: SourceFamily,
}

macro_rules! lang_meta {
    ($display:literal, $id:literal, [$($ext:literal),*], $family:ident) => {
        LanguageMeta {
            display_name: $display,
            id: $id,
            extensions: &[$($ext),*],
            family: SourceFamily::$family,
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    Rust,
    Go,
    C,
    Cpp,
    Java,
    Kotlin,
    Scala,
    TypeScript,
    JavaScript,
    Tsx,
    Jsx,
    Vue,
    Svelte,
    Html,
    Css,
    Scss,
    Python,
    Ruby,
    Php,
    Bash,
    Swift,
    CSharp,
    Sql,
    Yaml,
    Json,
    Toml,
    Xml,
    Markdown,
    Ini,
    Makefile,
    Dockerfile,
    Proto,
    GraphQL,
    #[default]
    Unknown,
}

impl Language {
    fn meta(&self) -> LanguageMeta {
        match self {
            Language::Rust => lang_meta!("Rust", "rust", ["rs"], Rust),
            Language::Go => lang_meta!("Go", "go", ["go"], Go),
            Language::C => lang_meta!("C", "c", ["c", "h"], Plain),
            Language::Cpp => lang_meta!("C++", "cpp", ["cpp", "cc", "cxx", "hpp", "hh"], Plain),
            Language::Java => lang_meta!("Java", "java", ["java"], Jvm),
            Language::Kotlin => lang_meta!("Kotlin", "kotlin", ["kt", "kts"], Jvm),
            Language::Scala => lang_meta!("Scala", "scala", ["scala", "sc"], Jvm),
            Language::TypeScript => lang_meta!("TypeScript", "typescript", ["ts", "mts", "cts"], Script),
            Language::JavaScript => lang_meta!("JavaScript", "javascript", ["js", "mjs", "cjs"], Script),
            Language::Tsx => lang_meta!("TSX", "tsx", ["tsx"], Script),
            Language::Jsx => lang_meta!("JSX", "jsx", ["jsx"], Script),
            Language::Vue => lang_meta!("Vue", "vue", ["vue"], Script),
            Language::Svelte => lang_meta!("Svelte", "svelte", ["svelte"], Script),
            Language::Html => lang_meta!("HTML", "html", ["html", "htm"], Plain),
            Language::Css => lang_meta!("CSS", "css", ["css"], Plain),
            Language::Scss => lang_meta!("SCSS", "scss", ["scss", "sass", "less"], Plain),
            Language::Python => lang_meta!("Python", "python", ["py", "pyi"], Python),
            Language::Ruby => lang_meta!("Ruby", "ruby", ["rb", "rake"], Plain),
            Language::Php => lang_meta!("PHP", "php", ["php"], Plain),
            Language::Bash => lang_meta!("Bash", "bash", ["sh", "bash", "zsh"], Plain),
            Language::Swift => lang_meta!("Swift", "swift", ["swift"], Plain),
            Language::CSharp => lang_meta!("C#", "csharp", ["cs"], Plain),
            Language::Sql => lang_meta!("SQL", "sql", ["sql"], Plain),
            Language::Yaml => lang_meta!("YAML", "yaml", ["yaml", "yml"], Plain),
            Language::Json => lang_meta!("JSON", "json", ["json", "jsonc"], Plain),
            Language::Toml => lang_meta!("TOML", "toml", ["toml"], Plain),
            Language::Xml => lang_meta!("XML", "xml", ["xml", "xsd"], Plain),
            Language::Markdown => lang_meta!("Markdown", "markdown", ["md", "markdown", "mdx"], Markdown),
            Language::Ini => lang_meta!("INI", "ini", ["ini", "cfg", "env"], Plain),
            Language::Makefile => lang_meta!("Makefile", "makefile", [], Plain),
            Language::Dockerfile => lang_meta!("Dockerfile", "dockerfile", [], Plain),
            Language::Proto => lang_meta!("Protocol Buffers", "protobuf", ["proto"], Plain),
            Language::GraphQL => lang_meta!("GraphQL", "graphql", ["graphql", "gql"], Plain),
            Language::Unknown => lang_meta!("Unknown", "text", [], Plain),
        }
    }

    fn all_variants() -> &'static [Language] {
        &[
            Language::Rust, Language::Go, Language::C, Language::Cpp, Language::Java,
            Language::Kotlin, Language::Scala, Language::TypeScript, Language::JavaScript,
            Language::Tsx, Language::Jsx, Language::Vue, Language::Svelte, Language::Html,
            Language::Css, Language::Scss, Language::Python, Language::Ruby, Language::Php,
            Language::Bash, Language::Swift, Language::CSharp, Language::Sql, Language::Yaml,
            Language::Json, Language::Toml, Language::Xml, Language::Markdown, Language::Ini,
            Language::Makefile, Language::Dockerfile, Language::Proto, Language::GraphQL,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        self.meta().display_name
    }

    /// Lowercase identifier stored in `AnalysisResult::language`
    pub fn id(&self) -> &'static str {
        self.meta().id
    }

    pub fn family(&self) -> SourceFamily {
        self.meta().family
    }

    pub fn from_extension(ext: &str) -> Self {
        let ext_lower = ext.to_lowercase();
        Self::all_variants()
            .iter()
            .copied()
            .find(|lang| lang.meta().extensions.contains(&ext_lower.as_str()))
            .unwrap_or(Language::Unknown)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
            let lower = filename.to_lowercase();
            if lower == "makefile" || lower == "gnumakefile" {
                return Language::Makefile;
            }
            if lower == "dockerfile" || lower.starts_with("dockerfile.") {
                return Language::Dockerfile;
            }
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Language identifier for `path`, `None` when unknown
pub fn detect_language<P: AsRef<Path>>(path: P) -> Option<&'static str> {
    let lang = Language::from_path(path);
    lang.is_known().then(|| lang.id())
}
