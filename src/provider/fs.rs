//! File-backed store.
//!
//! Persists remote configuration and refs as TOML under a root directory,
//! and downloaded packs as numbered files. Object presence is an index the
//! surrounding storage engine maintains; embedders seed it through
//! [`FileStore::insert_object`].
//!
//! Layout:
//! ```text
//! <root>/remotes/<name>.toml   one RemoteConfig per named remote
//! <root>/refs.toml             ref name -> object id
//! <root>/objects               known object ids, one hex id per line
//! <root>/packs/pack-NNNNNN.pack
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::oid::ObjectId;
use crate::provider::{Store, StoreError};
use crate::remote::config::RemoteConfig;

pub struct FileStore {
    root: PathBuf,
    refs: BTreeMap<String, ObjectId>,
    objects: BTreeSet<ObjectId>,
    packs_written: usize,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory layout and
    /// loading the ref and object indexes.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("remotes"))?;
        fs::create_dir_all(root.join("packs"))?;

        let refs = match fs::read_to_string(root.join("refs.toml")) {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| StoreError::Parse(format!("refs.toml: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        let mut objects = BTreeSet::new();
        match fs::read_to_string(root.join("objects")) {
            Ok(contents) => {
                for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                    let oid = ObjectId::from_hex(line.trim())
                        .map_err(|e| StoreError::Parse(format!("objects index: {e}")))?;
                    objects.insert(oid);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let packs_written = fs::read_dir(root.join("packs"))?.count();

        Ok(Self {
            root,
            refs,
            objects,
            packs_written,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record an object as present. The object database proper is outside
    /// this crate; whoever indexes packs calls this.
    pub fn insert_object(&mut self, oid: ObjectId) -> Result<(), StoreError> {
        if self.objects.insert(oid) {
            self.persist_objects()?;
        }
        Ok(())
    }

    fn remote_path(&self, remote: &str) -> Result<PathBuf, StoreError> {
        if remote.is_empty() || remote.contains(['/', '\\']) {
            return Err(StoreError::Other(format!(
                "invalid remote name {remote:?}"
            )));
        }
        Ok(self.root.join("remotes").join(format!("{remote}.toml")))
    }

    fn persist_refs(&self) -> Result<(), StoreError> {
        let contents = toml::to_string_pretty(&self.refs)
            .map_err(|e| StoreError::Other(format!("failed to render refs: {e}")))?;
        atomic_write(&self.root.join("refs.toml"), contents.as_bytes())
    }

    fn persist_objects(&self) -> Result<(), StoreError> {
        let mut contents = String::new();
        for oid in &self.objects {
            contents.push_str(&oid.to_hex());
            contents.push('\n');
        }
        atomic_write(&self.root.join("objects"), contents.as_bytes())
    }
}

impl Store for FileStore {
    fn has_object(&self, oid: ObjectId) -> bool {
        self.objects.contains(&oid)
    }

    fn write_pack(&mut self, pack: Bytes) -> Result<(), StoreError> {
        let path = self
            .root
            .join("packs")
            .join(format!("pack-{:06}.pack", self.packs_written));
        atomic_write(&path, &pack)?;
        self.packs_written += 1;
        Ok(())
    }

    fn ref_target(&self, name: &str) -> Option<ObjectId> {
        self.refs.get(name).copied()
    }

    fn set_ref(&mut self, name: &str, oid: ObjectId) -> Result<(), StoreError> {
        self.refs.insert(name.to_string(), oid);
        self.persist_refs()
    }

    fn read_config(&self, remote: &str) -> Result<Option<RemoteConfig>, StoreError> {
        let path = self.remote_path(remote)?;
        match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents)
                .map(Some)
                .map_err(|e| StoreError::Parse(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_config(&mut self, remote: &str, config: &RemoteConfig) -> Result<(), StoreError> {
        let path = self.remote_path(remote)?;
        let contents = toml::to_string_pretty(config)
            .map_err(|e| StoreError::Other(format!("failed to render config: {e}")))?;
        atomic_write(&path, contents.as_bytes())
    }

    fn remove_config(&mut self, remote: &str) -> Result<(), StoreError> {
        let path = self.remote_path(remote)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Other("path missing parent directory".to_string()))?;
    let temp = tempfile::NamedTempFile::new_in(dir)?;
    fs::write(temp.path(), data)?;
    temp.persist(path)
        .map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 20])
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileStore::open(dir.path()).unwrap();
        let cfg = RemoteConfig {
            url: "https://example.com/a.git".to_string(),
            push_url: None,
            fetch: vec!["+refs/heads/*:refs/remotes/origin/*".to_string()],
            push: vec![],
        };
        store.write_config("origin", &cfg).unwrap();
        assert_eq!(store.read_config("origin").unwrap(), Some(cfg));
        assert_eq!(store.read_config("upstream").unwrap(), None);

        store.remove_config("origin").unwrap();
        assert_eq!(store.read_config("origin").unwrap(), None);
        // Removing an absent remote is not an error.
        store.remove_config("origin").unwrap();
    }

    #[test]
    fn refs_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.set_ref("refs/remotes/origin/main", oid(3)).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.ref_target("refs/remotes/origin/main"), Some(oid(3)));
        assert_eq!(store.ref_target("refs/heads/main"), None);
    }

    #[test]
    fn object_index_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.insert_object(oid(7)).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.has_object(oid(7)));
        assert!(!store.has_object(oid(8)));
    }

    #[test]
    fn packs_get_distinct_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileStore::open(dir.path()).unwrap();
        store.write_pack(Bytes::from_static(b"PACKone")).unwrap();
        store.write_pack(Bytes::from_static(b"PACKtwo")).unwrap();
        assert!(dir.path().join("packs/pack-000000.pack").exists());
        assert!(dir.path().join("packs/pack-000001.pack").exists());
    }

    #[test]
    fn rejects_path_like_remote_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.read_config("../escape").is_err());
        assert!(store.read_config("").is_err());
    }
}
