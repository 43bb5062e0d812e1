use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SystemTypeError {
    #[error("'{0}' is not a valid system type (expected 1 to 4 '-'-separated components)")]
    BadTuple(String),
}

/// A `machine-vendor-kernel-os` tuple, as printed by `gcc -dumpmachine` or
/// accepted by `clang -target`. Some components are optional; `vendor` and
/// `kernel` are the ones usually missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SystemType {
    pub machine: String,
    pub vendor: Option<String>,
    pub kernel: Option<String>,
    pub os: String,
}

impl SystemType {
    pub fn new(machine: impl Into<String>, vendor: Option<String>, kernel: Option<String>, os: impl Into<String>) -> Self {
        SystemType {
            machine: machine.into(),
            vendor: normalize_vendor(vendor),
            kernel,
            os: os.into(),
        }
    }
}

fn normalize_vendor(vendor: Option<String>) -> Option<String> {
    match vendor.as_deref() {
        None | Some("none") | Some("unknown") => None,
        Some(_) => vendor,
    }
}

impl FromStr for SystemType {
    type Err = SystemTypeError;

    /// Disambiguates the 3-component case (`machine-vendor-os` vs.
    /// `machine-kernel-os`) by reserving the `gnu` OS name for the kernel
    /// form, the same way the source this was distilled from does: a bare
    /// `x86_64-linux-gnu` is `machine=x86_64, kernel=linux, os=gnu`, while
    /// `x86_64-apple-darwin` is `machine=x86_64, vendor=apple, os=darwin`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let system = match parts.as_slice() {
            [machine] => SystemType::new(*machine, None, None, ""),
            [machine, os] => SystemType::new(*machine, None, None, *os),
            [machine, middle, os] => {
                if *os == "gnu" {
                    SystemType::new(*machine, None, Some((*middle).to_string()), *os)
                } else {
                    SystemType::new(*machine, Some((*middle).to_string()), None, *os)
                }
            }
            [machine, vendor, kernel, os] => SystemType::new(
                *machine,
                Some((*vendor).to_string()),
                Some((*kernel).to_string()),
                *os,
            ),
            _ => return Err(SystemTypeError::BadTuple(s.to_string())),
        };
        Ok(system)
    }
}

impl fmt::Display for SystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.machine)?;
        if let Some(vendor) = &self.vendor {
            write!(f, "-{}", vendor)?;
        }
        if let Some(kernel) = &self.kernel {
            write!(f, "-{}", kernel)?;
        }
        if !self.os.is_empty() {
            write!(f, "-{}", self.os)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_part_is_unambiguous() {
        let t: SystemType = "x86_64-pc-linux-gnu".parse().unwrap();
        assert_eq!(t.machine, "x86_64");
        assert_eq!(t.vendor.as_deref(), Some("pc"));
        assert_eq!(t.kernel.as_deref(), Some("linux"));
        assert_eq!(t.os, "gnu");
    }

    #[test]
    fn three_part_gnu_os_implies_kernel_form() {
        let t: SystemType = "x86_64-linux-gnu".parse().unwrap();
        assert_eq!(t.machine, "x86_64");
        assert_eq!(t.vendor, None);
        assert_eq!(t.kernel.as_deref(), Some("linux"));
        assert_eq!(t.os, "gnu");
    }

    #[test]
    fn three_part_non_gnu_os_implies_vendor_form() {
        let t: SystemType = "x86_64-apple-darwin".parse().unwrap();
        assert_eq!(t.machine, "x86_64");
        assert_eq!(t.vendor.as_deref(), Some("apple"));
        assert_eq!(t.kernel, None);
        assert_eq!(t.os, "darwin");
    }

    #[test]
    fn two_part_has_no_vendor_or_kernel() {
        let t: SystemType = "arm-eabi".parse().unwrap();
        assert_eq!(t.machine, "arm");
        assert_eq!(t.vendor, None);
        assert_eq!(t.kernel, None);
        assert_eq!(t.os, "eabi");
    }

    #[test]
    fn none_and_unknown_vendor_are_normalized_to_absent() {
        let t: SystemType = "x86_64-unknown-freebsd-12".parse().unwrap();
        assert_eq!(t.vendor, None);
        let t: SystemType = "x86_64-none-elf".parse().unwrap();
        assert_eq!(t.vendor, None);
    }
}
