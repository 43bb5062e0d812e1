use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

use crate::signature::Signature;

/// Identifies a target across process runs. Target arena indices don't survive
/// a restart, so the metadata file keys snapshots the same way the project
/// file keys targets: by name if the target has one, otherwise by its output
/// path (spec §6: "each keyed by `name` *or* `path`").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetKey {
    #[serde(rename = "name")]
    Name(String),
    #[serde(rename = "path")]
    Path(PathBuf),
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKey::Name(n) => write!(f, "{}", n),
            TargetKey::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Every input and output file signature observed for one target at one point
/// in time. `BTreeMap` keeps serialization order stable so the metadata file
/// diffs cleanly between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub inputs: BTreeMap<PathBuf, Signature>,
    pub outputs: BTreeMap<PathBuf, Signature>,
}

impl TargetSnapshot {
    pub fn new() -> TargetSnapshot {
        TargetSnapshot::default()
    }

    pub fn add_input(&mut self, sig: Signature) {
        self.inputs.insert(sig.path.clone(), sig);
    }

    pub fn add_output(&mut self, sig: Signature) {
        self.outputs.insert(sig.path.clone(), sig);
    }

    /// True if `self` (the freshly-computed snapshot) differs from `stored`
    /// (the snapshot persisted at the end of a previous run) in any way that
    /// should trigger a rebuild: a changed mtime, a missing file, or a
    /// declared input/output set that no longer matches.
    pub fn differs_from(&self, stored: &TargetSnapshot) -> bool {
        if self.inputs.len() != stored.inputs.len() || self.outputs.len() != stored.outputs.len()
        {
            return true;
        }
        for (path, sig) in &self.inputs {
            match stored.inputs.get(path) {
                Some(stored_sig) if sig.matches(stored_sig) => {}
                _ => return true,
            }
        }
        for (path, sig) in &self.outputs {
            match stored.outputs.get(path) {
                Some(stored_sig) if sig.matches(stored_sig) => {}
                _ => return true,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::MTime;

    fn sig(path: &str, secs: i64) -> Signature {
        Signature::new(PathBuf::from(path), MTime::Real(secs))
    }

    #[test]
    fn identical_snapshots_do_not_differ() {
        let mut a = TargetSnapshot::new();
        a.add_input(sig("a.cpp", 1));
        a.add_output(sig("a.o", 2));
        let b = a.clone();
        assert!(!a.differs_from(&b));
    }

    #[test]
    fn changed_mtime_differs() {
        let mut a = TargetSnapshot::new();
        a.add_input(sig("a.cpp", 1));
        let mut b = TargetSnapshot::new();
        b.add_input(sig("a.cpp", 2));
        assert!(a.differs_from(&b));
    }

    #[test]
    fn different_input_set_differs() {
        let mut a = TargetSnapshot::new();
        a.add_input(sig("a.cpp", 1));
        a.add_input(sig("b.cpp", 1));
        let mut b = TargetSnapshot::new();
        b.add_input(sig("a.cpp", 1));
        assert!(a.differs_from(&b));
    }
}
