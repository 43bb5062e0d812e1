use std::{
    path::{Path, PathBuf},
    process::Command,
};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use complemake_platform::SystemType;

use crate::{
    backend::{CompilerBackend, LinkerBackend},
    compilers::{ClangxxCompiler, GxxCompiler, MscCompiler},
    linkers::{ClangGnuLdLinker, ClangMachOLdLinker, GxxGnuLdLinker, MsLinker},
    tool::Tool,
};

/// Probes always run under a fixed locale so version-string parsing doesn't
/// have to special-case translations (spec §4.2).
const PROBE_LOCALE: &str = "en_US.UTF-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Cxx,
    Ld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerBackendKind {
    Clang,
    Gxx,
    Msc,
}

impl CompilerBackendKind {
    pub fn backend(self) -> &'static dyn CompilerBackend {
        static CLANG: ClangxxCompiler = ClangxxCompiler;
        static GXX: GxxCompiler = GxxCompiler;
        static MSC: MscCompiler = MscCompiler;
        match self {
            CompilerBackendKind::Clang => &CLANG,
            CompilerBackendKind::Gxx => &GXX,
            CompilerBackendKind::Msc => &MSC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkerBackendKind {
    ClangGnuLd,
    ClangMachOLd,
    GxxGnuLd,
    Ms,
}

impl LinkerBackendKind {
    pub fn backend(self) -> &'static dyn LinkerBackend {
        static CLANG_GNU: ClangGnuLdLinker = ClangGnuLdLinker;
        static CLANG_MACHO: ClangMachOLdLinker = ClangMachOLdLinker;
        static GXX_GNU: GxxGnuLdLinker = GxxGnuLdLinker;
        static MS: MsLinker = MsLinker;
        match self {
            LinkerBackendKind::ClangGnuLd => &CLANG_GNU,
            LinkerBackendKind::ClangMachOLd => &CLANG_MACHO,
            LinkerBackendKind::GxxGnuLd => &GXX_GNU,
            LinkerBackendKind::Ms => &MS,
        }
    }
}

#[derive(Error, Debug)]
pub enum ToolDetectError {
    #[error("no {0:?} tool could be detected{1}")]
    NotFound(ToolKind, String),
    #[error("spawning '{0}' failed: {1}")]
    SpawnFailed(String, #[source] std::io::Error),
}

/// A bound recipe for producing a configured compiler invocation (spec §4.2).
#[derive(Debug, Clone)]
pub struct CxxToolFactory {
    pub backend_kind: CompilerBackendKind,
    pub exe_path: PathBuf,
    pub supported_system: Option<SystemType>,
    pub version: String,
    pub extra_args: Vec<String>,
}

impl CxxToolFactory {
    pub fn backend(&self) -> &'static dyn CompilerBackend {
        self.backend_kind.backend()
    }

    pub fn make_tool(&self, output_path: PathBuf) -> Tool {
        let mut tool = Tool::new(self.exe_path.clone(), self.version.clone(), output_path);
        tool.factory_args = self.extra_args.clone();
        tool
    }
}

/// A bound recipe for producing a configured linker invocation.
#[derive(Debug, Clone)]
pub struct LdToolFactory {
    pub backend_kind: LinkerBackendKind,
    pub exe_path: PathBuf,
    pub supported_system: Option<SystemType>,
    pub version: String,
    pub extra_args: Vec<String>,
}

impl LdToolFactory {
    pub fn backend(&self) -> &'static dyn LinkerBackend {
        self.backend_kind.backend()
    }

    pub fn make_tool(&self, output_path: PathBuf) -> Tool {
        let mut tool = Tool::new(self.exe_path.clone(), self.version.clone(), output_path);
        tool.factory_args = self.extra_args.clone();
        tool
    }
}

struct CxxCandidate {
    exe: &'static str,
    subclasses: &'static [CompilerBackendKind],
}

static CXX_CANDIDATES: Lazy<Vec<CxxCandidate>> = Lazy::new(|| {
    vec![
        CxxCandidate {
            exe: "clang++",
            subclasses: &[CompilerBackendKind::Clang],
        },
        CxxCandidate {
            exe: "c++",
            subclasses: &[CompilerBackendKind::Clang, CompilerBackendKind::Gxx],
        },
        CxxCandidate {
            exe: "g++",
            subclasses: &[CompilerBackendKind::Gxx],
        },
        CxxCandidate {
            exe: "cl.exe",
            subclasses: &[CompilerBackendKind::Msc],
        },
    ]
});

struct LdCandidate {
    exe: &'static str,
    subclasses: &'static [LinkerBackendKind],
}

static LD_CANDIDATES: Lazy<Vec<LdCandidate>> = Lazy::new(|| {
    vec![
        LdCandidate {
            exe: "clang++",
            subclasses: &[LinkerBackendKind::ClangMachOLd, LinkerBackendKind::ClangGnuLd],
        },
        LdCandidate {
            exe: "g++",
            subclasses: &[LinkerBackendKind::GxxGnuLd],
        },
        LdCandidate {
            exe: "link.exe",
            subclasses: &[LinkerBackendKind::Ms],
        },
    ]
});

static CLANG_VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"clang version (\S+)").unwrap());
static CLANG_TARGET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Target:\s*(\S+)").unwrap());
static GCC_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(GCC\)\s*(\S+)|g\+\+.*?(\d+\.\d+\.\d+)").unwrap());
static MSC_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Compiler Version (\S+) for (x86|x64|ARM)").unwrap());
static MACHO_ARCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"configured to support archs?:\s*(.+)").unwrap());

fn run_probe(exe: &Path, args: &[&str]) -> Result<String, ToolDetectError> {
    let output = Command::new(exe)
        .args(args)
        .env("LC_ALL", PROBE_LOCALE)
        .output()
        .map_err(|e| ToolDetectError::SpawnFailed(exe.to_string_lossy().into_owned(), e))?;
    // MSC writes diagnostics to stdout and merges stderr into it; other back-ends
    // print version banners to either stream depending on platform quirks, so
    // the core always looks at the concatenation of both.
    let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
    merged.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(merged)
}

fn probe_compiler(
    exe: &Path,
    kind: CompilerBackendKind,
    target: Option<&SystemType>,
) -> Option<CxxToolFactory> {
    let mut extra_args = Vec::new();
    let probe_args: Vec<&str> = match kind {
        CompilerBackendKind::Clang => {
            if let Some(target) = target {
                extra_args = vec!["-target".to_string(), target.to_string()];
            }
            vec!["-v"]
        }
        CompilerBackendKind::Gxx => vec!["--version"],
        CompilerBackendKind::Msc => vec!["/?"],
    };
    let mut args: Vec<&str> = extra_args.iter().map(String::as_str).collect();
    args.extend(probe_args);
    let output = run_probe(exe, &args).ok()?;

    let (version, supported) = match kind {
        CompilerBackendKind::Clang => {
            let version = CLANG_VERSION_RE.captures(&output)?.get(1)?.as_str().to_string();
            let triplet = CLANG_TARGET_RE
                .captures(&output)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<SystemType>().ok());
            (version, triplet.or_else(|| target.cloned()))
        }
        CompilerBackendKind::Gxx => {
            let caps = GCC_VERSION_RE.captures(&output)?;
            let version = caps
                .get(1)
                .or_else(|| caps.get(2))?
                .as_str()
                .to_string();
            let dumpmachine = run_probe(exe, &["-dumpmachine"]).ok()?;
            let triplet = dumpmachine.trim().parse::<SystemType>().ok();
            (version, triplet)
        }
        CompilerBackendKind::Msc => {
            let caps = MSC_VERSION_RE.captures(&output)?;
            let version = caps.get(1)?.as_str().to_string();
            (version, None)
        }
    };

    Some(CxxToolFactory {
        backend_kind: kind,
        exe_path: exe.to_path_buf(),
        supported_system: supported,
        version,
        extra_args,
    })
}

fn probe_linker(
    exe: &Path,
    kind: LinkerBackendKind,
    target: Option<&SystemType>,
) -> Option<LdToolFactory> {
    match kind {
        LinkerBackendKind::ClangMachOLd => {
            // Two-step: resolve the ld Clang would invoke, then probe it directly.
            let ld_path_out = run_probe(exe, &["-print-prog-name=ld"]).ok()?;
            let ld_path = PathBuf::from(ld_path_out.trim());
            let probe = run_probe(&ld_path, &["-v"]).ok()?;
            let archs = MACHO_ARCH_RE.captures(&probe)?.get(1)?.as_str().to_string();
            let machine = target.map(|t| t.machine.as_str()).unwrap_or("x86_64");
            if !archs.contains(machine) {
                return None;
            }
            Some(LdToolFactory {
                backend_kind: kind,
                exe_path: exe.to_path_buf(),
                supported_system: target.cloned(),
                version: String::new(),
                extra_args: Vec::new(),
            })
        }
        LinkerBackendKind::ClangGnuLd => {
            let mut extra_args = Vec::new();
            if let Some(target) = target {
                extra_args = vec!["-target".to_string(), target.to_string()];
            }
            let mut args: Vec<&str> = extra_args.iter().map(String::as_str).collect();
            args.push("-Wl,--version");
            let output = run_probe(exe, &args).ok()?;
            if !output.to_lowercase().contains("gnu") {
                return None;
            }
            Some(LdToolFactory {
                backend_kind: kind,
                exe_path: exe.to_path_buf(),
                supported_system: target.cloned(),
                version: String::new(),
                extra_args,
            })
        }
        LinkerBackendKind::GxxGnuLd => {
            let output = run_probe(exe, &["-Wl,--version"]).ok()?;
            if !output.to_lowercase().contains("gnu") {
                return None;
            }
            Some(LdToolFactory {
                backend_kind: kind,
                exe_path: exe.to_path_buf(),
                supported_system: target.cloned(),
                version: String::new(),
                extra_args: Vec::new(),
            })
        }
        LinkerBackendKind::Ms => {
            let output = run_probe(exe, &["/?"]).ok()?;
            if output.contains("LNK4012") {
                return None;
            }
            Some(LdToolFactory {
                backend_kind: kind,
                exe_path: exe.to_path_buf(),
                supported_system: target.cloned(),
                version: String::new(),
                extra_args: Vec::new(),
            })
        }
    }
}

/// Detects a C++ compiler: iterates `(executable, subclasses)` candidates in
/// order, running a version probe for each subclass until one matches. A
/// user override (`--tool-c++`) skips the candidate list and only tries
/// subclasses against that one path.
pub fn detect_cxx_compiler(
    target: Option<&SystemType>,
    user_override: Option<&Path>,
) -> Result<CxxToolFactory, ToolDetectError> {
    if let Some(path) = user_override {
        for kind in [
            CompilerBackendKind::Clang,
            CompilerBackendKind::Gxx,
            CompilerBackendKind::Msc,
        ] {
            if let Some(f) = probe_compiler(path, kind, target) {
                return Ok(f);
            }
        }
        return Err(ToolDetectError::NotFound(
            ToolKind::Cxx,
            format!(" at override path '{}'", path.display()),
        ));
    }
    for candidate in CXX_CANDIDATES.iter() {
        for kind in candidate.subclasses {
            if let Some(f) = probe_compiler(Path::new(candidate.exe), *kind, target) {
                return Ok(f);
            }
        }
    }
    Err(ToolDetectError::NotFound(ToolKind::Cxx, String::new()))
}

/// Detects a linker, following the same protocol as `detect_cxx_compiler`.
pub fn detect_linker(
    target: Option<&SystemType>,
    user_override: Option<&Path>,
) -> Result<LdToolFactory, ToolDetectError> {
    if let Some(path) = user_override {
        for kind in [
            LinkerBackendKind::ClangMachOLd,
            LinkerBackendKind::ClangGnuLd,
            LinkerBackendKind::GxxGnuLd,
            LinkerBackendKind::Ms,
        ] {
            if let Some(f) = probe_linker(path, kind, target) {
                return Ok(f);
            }
        }
        return Err(ToolDetectError::NotFound(
            ToolKind::Ld,
            format!(" at override path '{}'", path.display()),
        ));
    }
    for candidate in LD_CANDIDATES.iter() {
        for kind in candidate.subclasses {
            if let Some(f) = probe_linker(Path::new(candidate.exe), *kind, target) {
                return Ok(f);
            }
        }
    }
    Err(ToolDetectError::NotFound(ToolKind::Ld, String::new()))
}

/// Memoizes detected tool factories so at most one probe runs per kind per
/// process (spec §4.3 `get_tool`/`set_tool`). Lives alongside the detection
/// protocol it caches rather than in `complemake-platform`, for the same
/// dependency-direction reason as `configure_tool` in `tool.rs`.
#[derive(Debug, Default)]
pub struct ToolCache {
    cxx: Option<CxxToolFactory>,
    ld: Option<LdToolFactory>,
}

impl ToolCache {
    pub fn new() -> ToolCache {
        ToolCache::default()
    }

    pub fn get_cxx_tool(
        &mut self,
        target: Option<&SystemType>,
        user_override: Option<&Path>,
    ) -> Result<&CxxToolFactory, ToolDetectError> {
        if self.cxx.is_none() {
            self.cxx = Some(detect_cxx_compiler(target, user_override)?);
        }
        Ok(self.cxx.as_ref().expect("just populated"))
    }

    pub fn set_cxx_tool(&mut self, factory: CxxToolFactory) {
        self.cxx = Some(factory);
    }

    pub fn get_ld_tool(
        &mut self,
        target: Option<&SystemType>,
        user_override: Option<&Path>,
    ) -> Result<&LdToolFactory, ToolDetectError> {
        if self.ld.is_none() {
            self.ld = Some(detect_linker(target, user_override)?);
        }
        Ok(self.ld.as_ref().expect("just populated"))
    }

    pub fn set_ld_tool(&mut self, factory: LdToolFactory) {
        self.ld = Some(factory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clang_version_regex_extracts_version_and_target() {
        let sample = "clang version 14.0.0\nTarget: x86_64-pc-linux-gnu\nThread model: posix\n";
        let version = CLANG_VERSION_RE.captures(sample).unwrap().get(1).unwrap().as_str();
        assert_eq!(version, "14.0.0");
        let target = CLANG_TARGET_RE.captures(sample).unwrap().get(1).unwrap().as_str();
        assert_eq!(target, "x86_64-pc-linux-gnu");
    }

    #[test]
    fn msc_version_regex_extracts_version_and_machine() {
        let sample = "Microsoft (R) C/C++ Optimizing Compiler Version 19.29.30133 for x64";
        let caps = MSC_VERSION_RE.captures(sample).unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "19.29.30133");
        assert_eq!(caps.get(2).unwrap().as_str(), "x64");
    }

    #[test]
    fn macho_arch_regex_extracts_arch_list() {
        let sample = "@(#)PROGRAM:ld  PROJECT:ld64\nconfigured to support archs: x86_64 arm64\n";
        let caps = MACHO_ARCH_RE.captures(sample).unwrap();
        assert!(caps.get(1).unwrap().as_str().contains("x86_64"));
    }
}
