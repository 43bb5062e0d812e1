use std::{collections::HashMap, ffi::OsString};

use crate::system_type::SystemType;

/// Host/target platform family. Picked from a `SystemType` by matching
/// `kernel`/`os`, mirroring `comk.platform`'s `GnuPlatform`/`FreeBsdPlatform`/
/// `DarwinPlatform`/`Win32Platform`/`Win64Platform` split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Gnu,
    FreeBsd,
    Darwin,
    Win32,
    Win64,
}

impl Platform {
    /// Maps a system type to the platform family that knows how to build for
    /// it. Returns `None` for anything unrecognized; callers treat that as
    /// "unsupported target" (tool detection will simply find no match).
    pub fn from_system_type(system: &SystemType) -> Option<Platform> {
        let os = system.os.to_lowercase();
        let kernel = system.kernel.as_deref().map(str::to_lowercase);

        if os.contains("darwin") || os.contains("macos") {
            return Some(Platform::Darwin);
        }
        if os.contains("freebsd") || kernel.as_deref() == Some("freebsd") {
            return Some(Platform::FreeBsd);
        }
        if os == "gnu" || kernel.as_deref() == Some("linux") || os.contains("linux") {
            return Some(Platform::Gnu);
        }
        if os.contains("windows") || os.contains("mingw") || os.contains("msvc") || os == "win32" {
            return Some(if is_64_bit_machine(&system.machine) {
                Platform::Win64
            } else {
                Platform::Win32
            });
        }
        None
    }

    /// The host platform, as a default build target when `--system-type` is
    /// not given.
    pub fn host() -> Platform {
        if cfg!(target_os = "macos") {
            Platform::Darwin
        } else if cfg!(target_os = "freebsd") {
            Platform::FreeBsd
        } else if cfg!(target_os = "windows") {
            if cfg!(target_pointer_width = "64") {
                Platform::Win64
            } else {
                Platform::Win32
            }
        } else {
            Platform::Gnu
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Platform::Win32 | Platform::Win64)
    }

    /// `name` -> the file name of the dynamic library built from it.
    pub fn dynlib_file_name(self, name: &str) -> String {
        match self {
            Platform::Darwin => format!("lib{}.dylib", name),
            Platform::Win32 | Platform::Win64 => format!("{}.dll", name),
            Platform::Gnu | Platform::FreeBsd => format!("lib{}.so", name),
        }
    }

    /// The suffix `CxxObjectTarget` outputs use (spec §3).
    pub fn object_suffix(self) -> &'static str {
        if self.is_windows() {
            ".obj"
        } else {
            ".o"
        }
    }

    /// `name` -> the file name of the executable built from it.
    pub fn exe_file_name(self, name: &str) -> String {
        if self.is_windows() {
            format!("{}.exe", name)
        } else {
            name.to_string()
        }
    }

    /// Whether linking against a dynamic library on this platform requires a
    /// separate import library (`.lib`) alongside the `.dll`.
    pub fn dynlibs_need_implibs(self) -> bool {
        self.is_windows()
    }

    /// Prepends `dir` to whichever environment variable this platform
    /// searches for dynamic libraries at load time.
    pub fn add_dir_to_dynlib_env_path(self, env: &mut HashMap<String, OsString>, dir: &std::path::Path) {
        let (var, sep) = match self {
            Platform::Gnu | Platform::FreeBsd => ("LD_LIBRARY_PATH", ':'),
            Platform::Darwin => ("DYLD_LIBRARY_PATH", ':'),
            Platform::Win32 | Platform::Win64 => ("PATH", ';'),
        };
        let mut new_value = dir.as_os_str().to_owned();
        if let Some(existing) = env.get(var).filter(|v| !v.is_empty()) {
            new_value.push(sep.to_string());
            new_value.push(existing);
        } else if let Some(existing) = std::env::var_os(var).filter(|v| !v.is_empty()) {
            new_value.push(sep.to_string());
            new_value.push(existing);
        }
        env.insert(var.to_string(), new_value);
    }

    /// On Windows, a script without a `.exe`/`.com` extension can't be
    /// `CreateProcess`'d directly and must be handed to a shell; elsewhere the
    /// executable bit (and `#!`) is enough.
    pub fn adjust_popen_args_for_script(self, argv: &mut Vec<OsString>) {
        if !self.is_windows() {
            return;
        }
        let is_native_exe = argv
            .first()
            .map(|exe| {
                let s = exe.to_string_lossy().to_lowercase();
                s.ends_with(".exe") || s.ends_with(".com")
            })
            .unwrap_or(true);
        if !is_native_exe {
            let mut wrapped = vec![OsString::from("cmd"), OsString::from("/C")];
            wrapped.append(argv);
            *argv = wrapped;
        }
    }

    /// Libraries every linked binary on this platform needs regardless of
    /// what the project file asked for.
    pub fn mandatory_link_libs(self) -> &'static [&'static str] {
        match self {
            Platform::Gnu => &["dl", "pthread"],
            Platform::FreeBsd => &["pthread"],
            Platform::Darwin => &[],
            Platform::Win32 | Platform::Win64 => {
                &["kernel32", "ws2_32", "user32", "advapi32", "mswsock"]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sys(s: &str) -> SystemType {
        s.parse().unwrap()
    }

    #[test]
    fn recognizes_gnu_linux() {
        assert_eq!(
            Platform::from_system_type(&sys("x86_64-pc-linux-gnu")),
            Some(Platform::Gnu)
        );
    }

    #[test]
    fn recognizes_darwin() {
        assert_eq!(
            Platform::from_system_type(&sys("x86_64-apple-darwin")),
            Some(Platform::Darwin)
        );
    }

    #[test]
    fn recognizes_windows_bitness_from_machine() {
        assert_eq!(
            Platform::from_system_type(&sys("x86_64-pc-windows-msvc")),
            Some(Platform::Win64)
        );
        assert_eq!(
            Platform::from_system_type(&sys("i686-pc-windows-msvc")),
            Some(Platform::Win32)
        );
    }

    #[test]
    fn dynlib_and_exe_names_per_platform() {
        assert_eq!(Platform::Gnu.dynlib_file_name("greet"), "libgreet.so");
        assert_eq!(Platform::Darwin.dynlib_file_name("greet"), "libgreet.dylib");
        assert_eq!(Platform::Win64.dynlib_file_name("greet"), "greet.dll");
        assert_eq!(Platform::Gnu.exe_file_name("app"), "app");
        assert_eq!(Platform::Win64.exe_file_name("app"), "app.exe");
    }

    #[test]
    fn dynlib_env_var_prepends_with_platform_separator() {
        let mut env = HashMap::new();
        env.insert("LD_LIBRARY_PATH".to_string(), OsString::from("/usr/lib"));
        Platform::Gnu.add_dir_to_dynlib_env_path(&mut env, std::path::Path::new("/out/lib"));
        assert_eq!(
            env.get("LD_LIBRARY_PATH").unwrap(),
            &OsString::from("/out/lib:/usr/lib")
        );
    }

    #[test]
    fn object_suffix_is_platform_specific() {
        assert_eq!(Platform::Gnu.object_suffix(), ".o");
        assert_eq!(Platform::Win64.object_suffix(), ".obj");
    }

    #[test]
    fn mandatory_link_libs_match_platform() {
        assert_eq!(Platform::Gnu.mandatory_link_libs(), &["dl", "pthread"]);
        assert_eq!(Platform::Darwin.mandatory_link_libs(), &[] as &[&str]);
    }
}

fn is_64_bit_machine(machine: &str) -> bool {
    matches!(machine, "x86_64" | "amd64" | "aarch64" | "arm64")
}
