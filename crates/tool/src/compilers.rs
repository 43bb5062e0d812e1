use std::path::Path;

use crate::{
    backend::CompilerBackend,
    flags::{AbstractFlag, Define},
};

#[derive(Debug, Default)]
pub struct ClangxxCompiler;

#[derive(Debug, Default)]
pub struct GxxCompiler;

#[derive(Debug, Default)]
pub struct MscCompiler;

/// GCC and Clang accept the same `-E`/`-fPIC`/`-D`/`-I`/`-o` syntax; only the
/// executable and version-probe regex differ, so both back-ends share this
/// rendering.
fn gnu_style_render_flag(flag: AbstractFlag) -> Vec<String> {
    match flag {
        AbstractFlag::PreprocessOnly => vec!["-E".to_string()],
        AbstractFlag::Dynlib => vec!["-fPIC".to_string()],
    }
}

fn gnu_style_parse_flag(rendered: &str) -> Option<AbstractFlag> {
    match rendered {
        "-E" => Some(AbstractFlag::PreprocessOnly),
        "-fPIC" => Some(AbstractFlag::Dynlib),
        _ => None,
    }
}

fn gnu_style_render_define(define: &Define) -> Vec<String> {
    match &define.expansion {
        Some(expansion) => vec![format!("-D{}={}", define.name, expansion)],
        None => vec![format!("-D{}", define.name)],
    }
}

fn gnu_style_render_include_dir(dir: &Path) -> Vec<String> {
    vec![format!("-I{}", dir.display())]
}

fn gnu_style_render_output_path(path: &Path) -> Vec<String> {
    vec!["-o".to_string(), path.to_string_lossy().into_owned()]
}

impl CompilerBackend for ClangxxCompiler {
    fn tag(&self) -> &'static str {
        "CXX"
    }

    fn boilerplate_args(&self) -> Vec<String> {
        vec!["-c".to_string()]
    }

    fn render_flag(&self, flag: AbstractFlag) -> Vec<String> {
        gnu_style_render_flag(flag)
    }

    fn render_define(&self, define: &Define) -> Vec<String> {
        gnu_style_render_define(define)
    }

    fn render_include_dir(&self, dir: &Path) -> Vec<String> {
        gnu_style_render_include_dir(dir)
    }

    fn render_output_path(&self, path: &Path) -> Vec<String> {
        gnu_style_render_output_path(path)
    }

    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag> {
        gnu_style_parse_flag(rendered)
    }
}

impl CompilerBackend for GxxCompiler {
    fn tag(&self) -> &'static str {
        "CXX"
    }

    fn boilerplate_args(&self) -> Vec<String> {
        vec!["-c".to_string()]
    }

    fn render_flag(&self, flag: AbstractFlag) -> Vec<String> {
        gnu_style_render_flag(flag)
    }

    fn render_define(&self, define: &Define) -> Vec<String> {
        gnu_style_render_define(define)
    }

    fn render_include_dir(&self, dir: &Path) -> Vec<String> {
        gnu_style_render_include_dir(dir)
    }

    fn render_output_path(&self, path: &Path) -> Vec<String> {
        gnu_style_render_output_path(path)
    }

    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag> {
        gnu_style_parse_flag(rendered)
    }
}

impl CompilerBackend for MscCompiler {
    fn tag(&self) -> &'static str {
        "CXX"
    }

    fn boilerplate_args(&self) -> Vec<String> {
        vec!["/nologo".to_string(), "/c".to_string()]
    }

    fn render_flag(&self, flag: AbstractFlag) -> Vec<String> {
        match flag {
            AbstractFlag::PreprocessOnly => vec!["/P".to_string()],
            // MSVC-generated code for a DLL needs no extra PIC-equivalent flag.
            AbstractFlag::Dynlib => vec![],
        }
    }

    fn render_define(&self, define: &Define) -> Vec<String> {
        match &define.expansion {
            Some(expansion) => vec![format!("/D{}={}", define.name, expansion)],
            None => vec![format!("/D{}", define.name)],
        }
    }

    fn render_include_dir(&self, dir: &Path) -> Vec<String> {
        vec![format!("/I{}", dir.display())]
    }

    fn render_output_path(&self, path: &Path) -> Vec<String> {
        vec![format!("/Fo{}", path.display())]
    }

    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag> {
        match rendered {
            "/P" => Some(AbstractFlag::PreprocessOnly),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trips(backend: &dyn CompilerBackend, flag: AbstractFlag) {
        let rendered = backend.render_flag(flag);
        assert!(
            !rendered.is_empty(),
            "backend must render a token for flags exercised by this test"
        );
        for token in rendered {
            if let Some(parsed) = backend.parse_flag(&token) {
                assert_eq!(parsed, flag);
                return;
            }
        }
        panic!("no rendered token parsed back to {:?}", flag);
    }

    #[test]
    fn clang_flags_round_trip() {
        round_trips(&ClangxxCompiler, AbstractFlag::PreprocessOnly);
        round_trips(&ClangxxCompiler, AbstractFlag::Dynlib);
    }

    #[test]
    fn gxx_flags_round_trip() {
        round_trips(&GxxCompiler, AbstractFlag::PreprocessOnly);
        round_trips(&GxxCompiler, AbstractFlag::Dynlib);
    }

    #[test]
    fn msc_preprocess_flag_round_trips() {
        round_trips(&MscCompiler, AbstractFlag::PreprocessOnly);
    }

    #[test]
    fn define_without_expansion_omits_equals() {
        let d = Define {
            name: "FOO".to_string(),
            expansion: None,
        };
        assert_eq!(GxxCompiler.render_define(&d), vec!["-DFOO".to_string()]);
    }

    #[test]
    fn define_with_expansion_includes_it() {
        let d = Define {
            name: "FOO".to_string(),
            expansion: Some("1".to_string()),
        };
        assert_eq!(
            MscCompiler.render_define(&d),
            vec!["/DFOO=1".to_string()]
        );
    }
}
