use complemake_job::Transform;

use crate::arena::TargetId;

/// Shared payload for the two source-processing target variants (spec §3:
/// `CxxPreprocessedTarget`, `CxxObjectTarget`). Both own a source path and a
/// weak reference to the target their output ultimately feeds (used to
/// decide which target's `CFLAG_DEFINE` macro applies, e.g. the
/// `dynlib`-only `COMPLEMAKE_BUILD_*` macro).
#[derive(Debug, Clone)]
pub struct CxxSourcePayload {
    pub source: std::path::PathBuf,
    pub final_output: Option<TargetId>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutablePayload {}

#[derive(Debug, Clone)]
pub struct DynLibPayload {
    /// `COMPLEMAKE_BUILD_<NAME>`, defined only for this dynlib's own sources.
    pub build_macro: String,
}

impl DynLibPayload {
    pub fn for_name(name: &str) -> DynLibPayload {
        let normalized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        DynLibPayload {
            build_macro: format!("COMPLEMAKE_BUILD_{}", normalized),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolTestPayload {
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutableTestPayload {
    pub transforms: Vec<Transform>,
    /// Whether this test links `abaclade-testing`, selecting the
    /// sentinel-parsing job variant (spec §4.4, §4.5).
    pub uses_abaclade_testing: bool,
}

/// The tagged-variant replacement for the original's `Target` inheritance
/// chain (spec §9 design note): one shared header in [`crate::Target`], one
/// payload enum here per concrete kind.
#[derive(Debug, Clone)]
pub enum TargetKind {
    CxxPreprocessed(CxxSourcePayload),
    CxxObject(CxxSourcePayload),
    Executable(ExecutablePayload),
    DynLib(DynLibPayload),
    ToolTest(ToolTestPayload),
    ExecutableTest(ExecutableTestPayload),
}

impl TargetKind {
    pub fn tag(&self) -> &'static str {
        match self {
            TargetKind::CxxPreprocessed(_) => "cxx-preprocessed",
            TargetKind::CxxObject(_) => "cxx-object",
            TargetKind::Executable(_) => "exe",
            TargetKind::DynLib(_) => "dynlib",
            TargetKind::ToolTest(_) => "tooltest",
            TargetKind::ExecutableTest(_) => "exetest",
        }
    }

    /// Whether building this target means compiling with position-independent
    /// code (spec scenario S3: dynlib objects get `CFLAG_DYNLIB`).
    pub fn needs_position_independent_code(&self, final_output: &TargetKind) -> bool {
        matches!(self, TargetKind::CxxObject(_) | TargetKind::CxxPreprocessed(_))
            && matches!(final_output, TargetKind::DynLib(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_macro_uppercases_and_replaces_non_alnum() {
        let payload = DynLibPayload::for_name("my-greet");
        assert_eq!(payload.build_macro, "COMPLEMAKE_BUILD_MY_GREET");
    }
}
