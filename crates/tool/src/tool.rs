use std::path::{Path, PathBuf};

use complemake_platform::Platform;

use crate::{
    backend::{CompilerBackend, LinkerBackend},
    flags::{AbstractFlag, Define, LinkInput},
};

/// One invocation of an external program, configured for exactly one
/// input/output operation (spec §4.2). A `Tool` is data only — it says
/// nothing about *how* to render itself; that's the attached `CompilerBackend`
/// or `LinkerBackend`.
#[derive(Debug, Clone)]
pub struct Tool {
    pub exe_path: PathBuf,
    pub version: String,
    pub factory_args: Vec<String>,
    pub flags: Vec<AbstractFlag>,
    pub inputs: Vec<PathBuf>,
    pub output_path: PathBuf,
    /// Compiler only.
    pub include_dirs: Vec<PathBuf>,
    /// Compiler only.
    pub defines: Vec<Define>,
    /// Linker only.
    pub lib_dirs: Vec<PathBuf>,
    /// Linker only.
    pub libs: Vec<LinkInput>,
}

impl Tool {
    pub fn new(exe_path: PathBuf, version: String, output_path: PathBuf) -> Tool {
        Tool {
            exe_path,
            version,
            factory_args: Vec::new(),
            flags: Vec::new(),
            inputs: Vec::new(),
            output_path,
            include_dirs: Vec::new(),
            defines: Vec::new(),
            lib_dirs: Vec::new(),
            libs: Vec::new(),
        }
    }

    pub fn has_flag(&self, flag: AbstractFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Injects platform-mandatory link inputs into a linker `Tool` (spec §4.3
/// `Platform.configure_tool`). Lives here, not in `complemake-platform`,
/// because `Platform` must stay tool-agnostic to avoid a dependency cycle
/// (`complemake-tool` already depends on `complemake-platform`, not the
/// reverse).
pub fn configure_tool(platform: Platform, tool: &mut Tool) {
    for lib in platform.mandatory_link_libs() {
        tool.libs.push(LinkInput::Name((*lib).to_string()));
    }
}

fn env_split_words(var: &str) -> Vec<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| shlex::split(&s))
        .unwrap_or_default()
}

/// Command-line construction order is fixed (spec §4.2):
/// `[exe] + boilerplate + factory args + abstract flags + macros + include
/// dirs + $CXXFLAGS + output path + inputs`.
pub fn compile_command_line(backend: &dyn CompilerBackend, tool: &Tool) -> Vec<String> {
    let mut argv = vec![tool.exe_path.to_string_lossy().into_owned()];
    argv.extend(backend.boilerplate_args());
    argv.extend(tool.factory_args.iter().cloned());
    for flag in &tool.flags {
        argv.extend(backend.render_flag(*flag));
    }
    for define in &tool.defines {
        argv.extend(backend.render_define(define));
    }
    for dir in &tool.include_dirs {
        argv.extend(backend.render_include_dir(dir));
    }
    argv.extend(env_split_words("CXXFLAGS"));
    argv.extend(backend.render_output_path(&tool.output_path));
    argv.extend(path_args(&tool.inputs));
    argv
}

/// Same fixed prefix as compilation, followed by lib dirs then libs (link
/// order affects symbol resolution, so both stay in declaration order).
pub fn link_command_line(backend: &dyn LinkerBackend, tool: &Tool) -> Vec<String> {
    let mut argv = vec![tool.exe_path.to_string_lossy().into_owned()];
    argv.extend(backend.boilerplate_args());
    argv.extend(tool.factory_args.iter().cloned());
    for flag in &tool.flags {
        argv.extend(backend.render_flag(*flag));
    }
    argv.extend(env_split_words("LDFLAGS"));
    argv.extend(backend.render_output_path(&tool.output_path));
    argv.extend(path_args(&tool.inputs));
    for dir in &tool.lib_dirs {
        argv.extend(backend.render_lib_dir(dir));
    }
    for lib in &tool.libs {
        argv.extend(backend.render_lib(lib));
    }
    argv
}

fn path_args(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.to_string_lossy().into_owned()).collect()
}

/// `"<tool-tag> <primary-file>"`, the short command summary printed when
/// `--verbose` is off (spec glossary: "Quiet command").
pub fn quiet_command(tag: &str, primary_file: &Path) -> String {
    format!("{} {}", tag, primary_file.display())
}
