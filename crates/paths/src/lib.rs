//! Computes the on-disk locations the core writes targets to.
//!
//! The project file only ever names *source* and *reference* paths; every
//! generated file's location is derived from the output directory plus one of
//! these conventions. Keeping the convention in one place means target kinds
//! never have to agree among themselves on layout.

use std::path::{Path, PathBuf};

/// `<out>/int/<source-path><suffix>` — preprocessed output or object file.
pub fn intermediate_path(out_dir: &Path, source_path: &Path, suffix: &str) -> PathBuf {
    let mut p = out_dir.join("int");
    p.push(strip_leading_parent_refs(source_path));
    append_suffix(&mut p, suffix);
    p
}

/// `<out>/bin/<file_name>` — an executable or dynamic library's sibling.
pub fn bin_path(out_dir: &Path, file_name: &str) -> PathBuf {
    out_dir.join("bin").join(file_name)
}

/// `<out>/bin/test/<file_name>` — an executable test binary.
pub fn test_bin_path(out_dir: &Path, file_name: &str) -> PathBuf {
    out_dir.join("bin").join("test").join(file_name)
}

/// `<out>/lib/<file_name>` — a dynamic library.
pub fn lib_path(out_dir: &Path, file_name: &str) -> PathBuf {
    out_dir.join("lib").join(file_name)
}

/// `<out>/log/<file-path>.log` — a target's captured stderr.
pub fn log_path(out_dir: &Path, file_path: &Path) -> PathBuf {
    let mut p = out_dir.join("log");
    p.push(strip_leading_parent_refs(file_path));
    let mut s = p.into_os_string();
    s.push(".log");
    PathBuf::from(s)
}

/// `int/`, `bin/`, `bin/test/`, `lib/`, `log/` under the output directory, in the
/// order they should be created before any job may write into them.
pub fn layout_dirs(out_dir: &Path) -> [PathBuf; 5] {
    [
        out_dir.join("int"),
        out_dir.join("bin"),
        out_dir.join("bin").join("test"),
        out_dir.join("lib"),
        out_dir.join("log"),
    ]
}

fn append_suffix(p: &mut PathBuf, suffix: &str) {
    let mut s = p.clone().into_os_string();
    s.push(suffix);
    *p = PathBuf::from(s);
}

/// A source path of `../foo.cpp` must not be allowed to place its intermediate
/// output outside of `<out>/int/`; `..` and root components are dropped so
/// every generated path stays rooted under the output directory.
fn strip_leading_parent_refs(p: &Path) -> PathBuf {
    use std::path::Component;
    p.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intermediate_path_appends_suffix() {
        let out = Path::new("out");
        assert_eq!(
            intermediate_path(out, Path::new("src/a.cpp"), ".o"),
            PathBuf::from("out/int/src/a.cpp.o")
        );
    }

    #[test]
    fn intermediate_path_strips_parent_refs() {
        let out = Path::new("out");
        assert_eq!(
            intermediate_path(out, Path::new("../shared/a.cpp"), ".o"),
            PathBuf::from("out/int/shared/a.cpp.o")
        );
    }

    #[test]
    fn bin_and_lib_paths() {
        let out = Path::new("out");
        assert_eq!(bin_path(out, "app"), PathBuf::from("out/bin/app"));
        assert_eq!(test_bin_path(out, "t1"), PathBuf::from("out/bin/test/t1"));
        assert_eq!(
            lib_path(out, "libgreet.so"),
            PathBuf::from("out/lib/libgreet.so")
        );
    }

    #[test]
    fn log_path_appends_dot_log() {
        let out = Path::new("out");
        assert_eq!(
            log_path(out, Path::new("bin/app")),
            PathBuf::from("out/log/bin/app.log")
        );
    }
}
