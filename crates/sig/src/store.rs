use std::{
    cell::RefCell,
    collections::HashMap,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    disk::DiskInterface,
    signature::Signature,
    snapshot::{TargetKey, TargetSnapshot},
};

#[derive(Error, Debug)]
pub enum MetadataWriteError {
    #[error("writing metadata to {0}: {1}")]
    Io(PathBuf, #[source] io::Error),
    #[error("serializing metadata: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// On-disk shape of `.comk-metadata`. Real Complemake tags this mapping
/// `!complemake/metadata/store`; serde_yaml has no first-class support for
/// attaching an arbitrary local tag to a struct, so the tag is represented as
/// an explicit `kind` discriminant instead (see DESIGN.md).
#[derive(Debug, Serialize, Deserialize)]
struct StoredMetadata {
    kind: String,
    #[serde(rename = "target-snapshots")]
    target_snapshots: Vec<StoredTargetSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTargetSnapshot {
    #[serde(flatten)]
    key: TargetKey,
    inputs: Vec<Signature>,
    outputs: Vec<Signature>,
}

const METADATA_KIND: &str = "complemake/metadata/store";

/// Persists and loads per-target snapshots; answers "has this target's inputs
/// or outputs changed since the last successful build?".
#[derive(Debug)]
pub struct MetadataStore<Disk: DiskInterface> {
    disk: Disk,
    stored_snapshots: HashMap<TargetKey, TargetSnapshot>,
    current_snapshots: RefCell<HashMap<TargetKey, TargetSnapshot>>,
    signature_cache: RefCell<HashMap<PathBuf, Signature>>,
    dirty: bool,
}

impl<Disk: DiskInterface> MetadataStore<Disk> {
    pub fn new(disk: Disk) -> Self {
        MetadataStore {
            disk,
            stored_snapshots: HashMap::new(),
            current_snapshots: RefCell::new(HashMap::new()),
            signature_cache: RefCell::new(HashMap::new()),
            dirty: false,
        }
    }

    /// Loads snapshots from `path`. A missing or corrupt file is treated as an
    /// empty store — there is simply nothing known to be up to date yet.
    pub fn load(disk: Disk, path: &Path) -> Self {
        let mut store = MetadataStore::new(disk);
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(_) => return store,
        };
        let parsed: Result<StoredMetadata, _> = serde_yaml::from_str(&text);
        if let Ok(parsed) = parsed {
            for entry in parsed.target_snapshots {
                store.stored_snapshots.insert(
                    entry.key,
                    TargetSnapshot {
                        inputs: entry
                            .inputs
                            .into_iter()
                            .map(|s| (s.path.clone(), s))
                            .collect(),
                        outputs: entry
                            .outputs
                            .into_iter()
                            .map(|s| (s.path.clone(), s))
                            .collect(),
                    },
                );
            }
        }
        store
    }

    fn signature_of(&self, path: &Path) -> Signature {
        if let Some(sig) = self.signature_cache.borrow().get(path) {
            return sig.clone();
        }
        let sig = match self.disk.modified(path) {
            Ok(mtime) => Signature::of_file(path, mtime),
            Err(_) => Signature::missing(path.to_path_buf()),
        };
        self.signature_cache
            .borrow_mut()
            .insert(path.to_path_buf(), sig.clone());
        sig
    }

    fn compute_snapshot(&self, inputs: &[PathBuf], outputs: &[PathBuf]) -> TargetSnapshot {
        let mut snapshot = TargetSnapshot::new();
        for input in inputs {
            snapshot.add_input(self.signature_of(input));
        }
        for output in outputs {
            snapshot.add_output(self.signature_of(output));
        }
        snapshot
    }

    /// Computes and caches the current snapshot for `key`, and reports whether
    /// it differs from what was stored at the end of the previous run.
    pub fn has_target_snapshot_changed(
        &self,
        key: &TargetKey,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
    ) -> bool {
        let current = self.compute_snapshot(inputs, outputs);
        let changed = match self.stored_snapshots.get(key) {
            None => true,
            Some(stored) => current.differs_from(stored),
        };
        self.current_snapshots
            .borrow_mut()
            .insert(key.clone(), current);
        changed
    }

    /// Replaces the stored snapshot for `key` with the one computed by the
    /// most recent `has_target_snapshot_changed` call. If `dry_run`, every
    /// output signature is replaced with the fake-new sentinel so a later
    /// real run always sees those outputs as changed.
    pub fn update_target_snapshot(&mut self, key: &TargetKey, dry_run: bool) {
        let mut current = self
            .current_snapshots
            .borrow_mut()
            .remove(key)
            .unwrap_or_default();
        if dry_run {
            for (path, sig) in current.outputs.iter_mut() {
                *sig = Signature::fake_new(path.clone());
            }
        }
        self.stored_snapshots.insert(key.clone(), current);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Atomically writes the store to `path`, if anything changed this run.
    pub fn write(&mut self, path: &Path) -> Result<(), MetadataWriteError> {
        if !self.dirty {
            return Ok(());
        }
        let stored = StoredMetadata {
            kind: METADATA_KIND.to_string(),
            target_snapshots: self
                .stored_snapshots
                .iter()
                .map(|(key, snapshot)| StoredTargetSnapshot {
                    key: key.clone(),
                    inputs: snapshot.inputs.values().cloned().collect(),
                    outputs: snapshot.outputs.values().cloned().collect(),
                })
                .collect(),
        };
        let text = serde_yaml::to_string(&stored)?;
        let tmp_path = path.with_extension("tmp");
        {
            let mut f =
                File::create(&tmp_path).map_err(|e| MetadataWriteError::Io(tmp_path.clone(), e))?;
            f.write_all(text.as_bytes())
                .map_err(|e| MetadataWriteError::Io(tmp_path.clone(), e))?;
        }
        std::fs::rename(&tmp_path, path).map_err(|e| MetadataWriteError::Io(path.to_path_buf(), e))?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell as StdRefCell, collections::HashMap as StdHashMap, time::SystemTime};

    struct MockDisk {
        mtimes: StdRefCell<StdHashMap<PathBuf, SystemTime>>,
    }

    impl DiskInterface for MockDisk {
        fn modified(&self, path: &Path) -> io::Result<SystemTime> {
            self.mtimes
                .borrow()
                .get(path)
                .copied()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "mock missing"))
        }
    }

    fn mock(files: &[(&str, u64)]) -> MockDisk {
        let mut m = StdHashMap::new();
        for (p, secs) in files {
            m.insert(
                PathBuf::from(p),
                SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(*secs),
            );
        }
        MockDisk {
            mtimes: StdRefCell::new(m),
        }
    }

    #[test]
    fn no_stored_snapshot_means_changed() {
        let store = MetadataStore::new(mock(&[("a.o", 1)]));
        let key = TargetKey::Path(PathBuf::from("a.o"));
        assert!(store.has_target_snapshot_changed(&key, &[], &[PathBuf::from("a.o")]));
    }

    #[test]
    fn unchanged_inputs_and_outputs_do_not_trigger_rebuild() {
        let mut store = MetadataStore::new(mock(&[("a.cpp", 1), ("a.o", 2)]));
        let key = TargetKey::Path(PathBuf::from("a.o"));
        let inputs = vec![PathBuf::from("a.cpp")];
        let outputs = vec![PathBuf::from("a.o")];
        store.has_target_snapshot_changed(&key, &inputs, &outputs);
        store.update_target_snapshot(&key, false);

        assert!(!store.has_target_snapshot_changed(&key, &inputs, &outputs));
    }

    #[test]
    fn touching_an_input_triggers_rebuild_on_next_run() {
        let disk = mock(&[("a.cpp", 1), ("a.o", 2)]);
        let mut store = MetadataStore::new(disk);
        let key = TargetKey::Path(PathBuf::from("a.o"));
        let inputs = vec![PathBuf::from("a.cpp")];
        let outputs = vec![PathBuf::from("a.o")];
        store.has_target_snapshot_changed(&key, &inputs, &outputs);
        store.update_target_snapshot(&key, false);

        let disk2 = mock(&[("a.cpp", 5), ("a.o", 2)]);
        let store2 = MetadataStore {
            disk: disk2,
            stored_snapshots: store.stored_snapshots,
            current_snapshots: RefCell::new(HashMap::new()),
            signature_cache: RefCell::new(HashMap::new()),
            dirty: false,
        };
        assert!(store2.has_target_snapshot_changed(&key, &inputs, &outputs));
    }

    #[test]
    fn dry_run_stamps_fake_new_outputs() {
        let mut store = MetadataStore::new(mock(&[("a.o", 2)]));
        let key = TargetKey::Path(PathBuf::from("a.o"));
        let outputs = vec![PathBuf::from("a.o")];
        store.has_target_snapshot_changed(&key, &[], &outputs);
        store.update_target_snapshot(&key, true);

        // A subsequent real run, even seeing the exact same mtime, must consider
        // this target's snapshot changed because the stored one is fake-new.
        assert!(store.has_target_snapshot_changed(&key, &[], &outputs));
    }

    #[test]
    fn write_round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".comk-metadata");
        let mut store = MetadataStore::new(mock(&[("a.o", 2)]));
        let key = TargetKey::Name("app".to_string());
        store.has_target_snapshot_changed(&key, &[], &[PathBuf::from("a.o")]);
        store.update_target_snapshot(&key, false);
        store.write(&path).unwrap();

        let reloaded = MetadataStore::load(mock(&[("a.o", 2)]), &path);
        assert!(!reloaded.has_target_snapshot_changed(&key, &[], &[PathBuf::from("a.o")]));
    }

    #[test]
    fn load_of_corrupt_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".comk-metadata");
        std::fs::write(&path, b"not: [valid, yaml: at all :::").unwrap();
        let store = MetadataStore::load(mock(&[]), &path);
        let key = TargetKey::Name("app".to_string());
        assert!(store.has_target_snapshot_changed(&key, &[], &[]));
    }
}
