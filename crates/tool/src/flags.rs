use std::path::PathBuf;

/// An opaque, back-end-agnostic tool directive. Booleans only; parameterized
/// directives (`CFLAG_DEFINE`, `CFLAG_ADD_INCLUDE_DIR`, `LDFLAG_ADD_LIB_DIR`,
/// `LDFLAG_ADD_LIB`, `FLAG_OUTPUT_PATH`) are carried as dedicated `Tool`
/// fields instead, since each occurs a variable, ordered number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbstractFlag {
    /// CFLAG_PREPROCESS_ONLY — produce preprocessed source.
    PreprocessOnly,
    /// CFLAG_DYNLIB / LDFLAG_DYNLIB — emit code/link suitable for a shared library.
    Dynlib,
}

/// CFLAG_DEFINE — `{name}` with an optional `{expansion}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub expansion: Option<String>,
}

/// LDFLAG_ADD_LIB — either a bare library name (`ForeignLib`) or the path to
/// a library this project built itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkInput {
    Name(String),
    Path(PathBuf),
}
