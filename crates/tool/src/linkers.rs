use std::path::Path;

use crate::{
    backend::LinkerBackend,
    flags::{AbstractFlag, LinkInput},
};

#[derive(Debug, Default)]
pub struct ClangGnuLdLinker;

#[derive(Debug, Default)]
pub struct ClangMachOLdLinker;

#[derive(Debug, Default)]
pub struct GxxGnuLdLinker;

#[derive(Debug, Default)]
pub struct MsLinker;

fn render_lib_gnu_style(lib: &LinkInput) -> Vec<String> {
    match lib {
        LinkInput::Name(name) => vec![format!("-l{}", name)],
        LinkInput::Path(path) => vec![path.to_string_lossy().into_owned()],
    }
}

impl LinkerBackend for ClangGnuLdLinker {
    fn tag(&self) -> &'static str {
        "LINK"
    }

    fn boilerplate_args(&self) -> Vec<String> {
        vec![]
    }

    fn render_flag(&self, flag: AbstractFlag) -> Vec<String> {
        match flag {
            AbstractFlag::Dynlib => vec!["-shared".to_string()],
            AbstractFlag::PreprocessOnly => vec![],
        }
    }

    fn render_lib_dir(&self, dir: &Path) -> Vec<String> {
        vec![format!("-L{}", dir.display())]
    }

    fn render_lib(&self, lib: &LinkInput) -> Vec<String> {
        render_lib_gnu_style(lib)
    }

    fn render_output_path(&self, path: &Path) -> Vec<String> {
        vec!["-o".to_string(), path.to_string_lossy().into_owned()]
    }

    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag> {
        match rendered {
            "-shared" => Some(AbstractFlag::Dynlib),
            _ => None,
        }
    }
}

impl LinkerBackend for GxxGnuLdLinker {
    fn tag(&self) -> &'static str {
        "LINK"
    }

    fn boilerplate_args(&self) -> Vec<String> {
        vec![]
    }

    fn render_flag(&self, flag: AbstractFlag) -> Vec<String> {
        match flag {
            AbstractFlag::Dynlib => vec!["-shared".to_string()],
            AbstractFlag::PreprocessOnly => vec![],
        }
    }

    fn render_lib_dir(&self, dir: &Path) -> Vec<String> {
        vec![format!("-L{}", dir.display())]
    }

    fn render_lib(&self, lib: &LinkInput) -> Vec<String> {
        render_lib_gnu_style(lib)
    }

    fn render_output_path(&self, path: &Path) -> Vec<String> {
        vec!["-o".to_string(), path.to_string_lossy().into_owned()]
    }

    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag> {
        match rendered {
            "-shared" => Some(AbstractFlag::Dynlib),
            _ => None,
        }
    }
}

/// Clang, when targeting Darwin, drives `ld64` instead of GNU `ld`; the flag
/// spelling Clang passes through to it is `-dynamiclib` rather than `-shared`
/// (detected via Clang's `-print-prog-name=ld` + a Mach-O-specific probe,
/// spec §4.2).
impl LinkerBackend for ClangMachOLdLinker {
    fn tag(&self) -> &'static str {
        "LINK"
    }

    fn boilerplate_args(&self) -> Vec<String> {
        vec![]
    }

    fn render_flag(&self, flag: AbstractFlag) -> Vec<String> {
        match flag {
            AbstractFlag::Dynlib => vec!["-dynamiclib".to_string()],
            AbstractFlag::PreprocessOnly => vec![],
        }
    }

    fn render_lib_dir(&self, dir: &Path) -> Vec<String> {
        vec![format!("-L{}", dir.display())]
    }

    fn render_lib(&self, lib: &LinkInput) -> Vec<String> {
        render_lib_gnu_style(lib)
    }

    fn render_output_path(&self, path: &Path) -> Vec<String> {
        vec!["-o".to_string(), path.to_string_lossy().into_owned()]
    }

    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag> {
        match rendered {
            "-dynamiclib" => Some(AbstractFlag::Dynlib),
            _ => None,
        }
    }
}

impl LinkerBackend for MsLinker {
    fn tag(&self) -> &'static str {
        "LINK"
    }

    fn boilerplate_args(&self) -> Vec<String> {
        vec!["/NOLOGO".to_string()]
    }

    fn render_flag(&self, flag: AbstractFlag) -> Vec<String> {
        match flag {
            AbstractFlag::Dynlib => vec!["/DLL".to_string()],
            AbstractFlag::PreprocessOnly => vec![],
        }
    }

    fn render_lib_dir(&self, dir: &Path) -> Vec<String> {
        vec![format!("/LIBPATH:{}", dir.display())]
    }

    fn render_lib(&self, lib: &LinkInput) -> Vec<String> {
        match lib {
            LinkInput::Name(name) => vec![format!("{}.lib", name)],
            LinkInput::Path(path) => vec![path.to_string_lossy().into_owned()],
        }
    }

    fn render_output_path(&self, path: &Path) -> Vec<String> {
        vec![format!("/OUT:{}", path.display())]
    }

    fn parse_flag(&self, rendered: &str) -> Option<AbstractFlag> {
        match rendered {
            "/DLL" => Some(AbstractFlag::Dynlib),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trips(backend: &dyn LinkerBackend, flag: AbstractFlag) {
        for token in backend.render_flag(flag) {
            if let Some(parsed) = backend.parse_flag(&token) {
                assert_eq!(parsed, flag);
                return;
            }
        }
        panic!("no rendered token parsed back to {:?}", flag);
    }

    #[test]
    fn all_linker_dynlib_flags_round_trip() {
        round_trips(&ClangGnuLdLinker, AbstractFlag::Dynlib);
        round_trips(&GxxGnuLdLinker, AbstractFlag::Dynlib);
        round_trips(&ClangMachOLdLinker, AbstractFlag::Dynlib);
        round_trips(&MsLinker, AbstractFlag::Dynlib);
    }

    #[test]
    fn link_order_preserved_for_libs() {
        let libs = vec![
            LinkInput::Name("greet".to_string()),
            LinkInput::Name("pthread".to_string()),
        ];
        let rendered: Vec<String> = libs.iter().flat_map(|l| GxxGnuLdLinker.render_lib(l)).collect();
        assert_eq!(rendered, vec!["-lgreet".to_string(), "-lpthread".to_string()]);
    }

    #[test]
    fn ms_linker_names_bare_libs_with_dot_lib_suffix() {
        assert_eq!(
            MsLinker.render_lib(&LinkInput::Name("greet".to_string())),
            vec!["greet.lib".to_string()]
        );
    }
}
