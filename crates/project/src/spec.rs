use serde::Deserialize;

/// A `sources` entry (spec §6): either a bare path (default tool) or a
/// `{path, tool}` mapping selecting a specific tool (only `preproc` exists
/// today).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceEntry {
    Plain(String),
    WithTool { path: String, tool: String },
}

impl SourceEntry {
    pub fn path(&self) -> &str {
        match self {
            SourceEntry::Plain(path) => path,
            SourceEntry::WithTool { path, .. } => path,
        }
    }

    pub fn wants_preprocess_only(&self) -> bool {
        matches!(self, SourceEntry::WithTool { tool, .. } if tool == "preproc")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExeSpec {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub libraries: Vec<String>,
    /// Names of test targets this target is considered covered by; purely
    /// informational (surfaced by `query`), not a build edge.
    #[serde(default)]
    pub tests: Vec<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExeTestSpec {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(rename = "expected output")]
    pub expected_output: Option<String>,
    #[serde(rename = "output transform", default)]
    pub output_transform: Vec<String>,
    pub script: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolTestSpec {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(rename = "expected output")]
    pub expected_output: Option<String>,
    #[serde(rename = "output transform", default)]
    pub output_transform: Vec<String>,
}

/// Tagged target vocabulary (spec §6). Local YAML tags like
/// `!complemake/target/exe` are represented as an internally-tagged `kind`
/// field instead of true `serde_yaml` tags, the same simplification
/// `complemake-sig`'s metadata format uses: `serde_yaml` 0.9 has no
/// first-class support for arbitrary local tags.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum TargetSpec {
    #[serde(rename = "complemake/target/exe")]
    Exe(ExeSpec),
    #[serde(rename = "complemake/target/dynlib")]
    DynLib(ExeSpec),
    #[serde(rename = "complemake/target/exetest")]
    ExeTest(ExeTestSpec),
    #[serde(rename = "complemake/target/tooltest")]
    ToolTest(ToolTestSpec),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDocument {
    pub kind: String,
    pub targets: Vec<TargetSpec>,
}
