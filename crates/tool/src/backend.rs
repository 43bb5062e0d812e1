use std::path::Path;

use crate::flags::{AbstractFlag, Define, LinkInput};

/// Back-end-specific rendering of abstract compiler flags into concrete
/// argv fragments, plus the inverse used by the flag-translation round-trip
/// property (spec §8 property 8).
pub trait CompilerBackend: std::fmt::Debug {
    /// Quiet-command tag, e.g. `"CXX"`.
    fn tag(&self) -> &'static str;
    fn boilerplate_args(&self) -> Vec<String>;
    fn render_flag(&self, flag: AbstractFlag) -> Vec<String>;
    fn render_define(&self, define: &Define) -> Vec<String>;
    fn render_include_dir(&self, dir: &Path) -> Vec<String>;
    fn render_output_path(&self, path: &Path) -> Vec<String>;
    /// Parses one rendered flag fragment back into the abstract flag that
    /// produced it, if any. Used only by tests.
    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag>;
}

/// Mirror of `CompilerBackend` for linker back-ends.
pub trait LinkerBackend: std::fmt::Debug {
    /// Quiet-command tag, e.g. `"LINK"`.
    fn tag(&self) -> &'static str;
    fn boilerplate_args(&self) -> Vec<String>;
    fn render_flag(&self, flag: AbstractFlag) -> Vec<String>;
    fn render_lib_dir(&self, dir: &Path) -> Vec<String>;
    fn render_lib(&self, lib: &LinkInput) -> Vec<String>;
    fn render_output_path(&self, path: &Path) -> Vec<String>;
    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag>;
}
