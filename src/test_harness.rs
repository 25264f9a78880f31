//! In-memory collaborators for tests.
//!
//! `MemoryStore` is a complete [`Store`]; `ScriptedTransport` plays back a
//! canned advertisement, pack stream, and push report while logging what
//! the session asked of it. Nothing here touches disk or network.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use bytes::Bytes;

use crate::oid::ObjectId;
use crate::provider::{
    AdvertisedRef, Connection, PackChunk, PackSource, PushTransaction, RefStatus, Store,
    StoreError, Transport, TransportError,
};
use crate::refspec::{Direction, Refspec};
use crate::remote::RemoteConfig;

/// Make an id with a recognizable repeating byte.
pub fn oid(byte: u8) -> ObjectId {
    ObjectId::from_bytes([byte; 20])
}

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    objects: BTreeSet<ObjectId>,
    refs: BTreeMap<String, ObjectId>,
    configs: BTreeMap<String, RemoteConfig>,
    packs: Vec<Bytes>,
    /// When set, every mutating call fails.
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&mut self, oid: ObjectId) {
        self.objects.insert(oid);
    }

    pub fn put_ref(&mut self, name: &str, oid: ObjectId) {
        self.refs.insert(name.to_string(), oid);
    }

    pub fn put_config(&mut self, remote: &str, config: RemoteConfig) {
        self.configs.insert(remote.to_string(), config);
    }

    pub fn config_of(&self, remote: &str) -> Option<RemoteConfig> {
        self.configs.get(remote).cloned()
    }

    pub fn packs(&self) -> &[Bytes] {
        &self.packs
    }
}

impl Store for MemoryStore {
    fn has_object(&self, oid: ObjectId) -> bool {
        self.objects.contains(&oid)
    }

    fn write_pack(&mut self, pack: Bytes) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Other("write_pack failed".to_string()));
        }
        self.packs.push(pack);
        Ok(())
    }

    fn ref_target(&self, name: &str) -> Option<ObjectId> {
        self.refs.get(name).copied()
    }

    fn set_ref(&mut self, name: &str, oid: ObjectId) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Other("set_ref failed".to_string()));
        }
        self.refs.insert(name.to_string(), oid);
        Ok(())
    }

    fn read_config(&self, remote: &str) -> Result<Option<RemoteConfig>, StoreError> {
        Ok(self.configs.get(remote).cloned())
    }

    fn write_config(&mut self, remote: &str, config: &RemoteConfig) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Other("write_config failed".to_string()));
        }
        self.configs.insert(remote.to_string(), config.clone());
        Ok(())
    }

    fn remove_config(&mut self, remote: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Other("remove_config failed".to_string()));
        }
        self.configs.remove(remote);
        Ok(())
    }
}

// =============================================================================
// ScriptedTransport
// =============================================================================

/// What the scripted transport observed, shared with the test.
#[derive(Default)]
pub struct TransportLog {
    pub connects: Vec<(String, Direction)>,
    pub wants: Vec<ObjectId>,
    pub haves: Vec<ObjectId>,
    pub refspecs_added: Vec<String>,
    pub transactions_opened: usize,
    pub transactions_dropped: usize,
    pub tips_updated: bool,
}

/// Plays back a canned remote. Configure the public fields, then hand it to
/// `Session::fetch`/`push` and inspect [`ScriptedTransport::log`].
pub struct ScriptedTransport {
    pub advertised: Vec<AdvertisedRef>,
    pub chunks: Vec<PackChunk>,
    pub unpack_ok: bool,
    pub statuses: Vec<RefStatus>,
    pub fail_connect: bool,
    pub fail_negotiate: bool,
    pub fail_update_tips: bool,
    log: Rc<RefCell<TransportLog>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            advertised: Vec::new(),
            chunks: Vec::new(),
            unpack_ok: true,
            statuses: Vec::new(),
            fail_connect: false,
            fail_negotiate: false,
            fail_update_tips: false,
            log: Rc::default(),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advertise(mut self, name: &str, oid: ObjectId) -> Self {
        self.advertised.push(AdvertisedRef {
            name: name.to_string(),
            oid,
        });
        self
    }

    pub fn chunk(mut self, data: &'static [u8], objects: u32) -> Self {
        self.chunks.push(PackChunk {
            data: Bytes::from_static(data),
            objects,
            sideband: None,
        });
        self
    }

    pub fn sideband_chunk(mut self, data: &'static [u8], objects: u32, text: &str) -> Self {
        self.chunks.push(PackChunk {
            data: Bytes::from_static(data),
            objects,
            sideband: Some(text.to_string()),
        });
        self
    }

    pub fn status(mut self, entry: RefStatus) -> Self {
        self.statuses.push(entry);
        self
    }

    pub fn log(&self) -> std::cell::Ref<'_, TransportLog> {
        self.log.borrow()
    }
}

impl Transport for ScriptedTransport {
    fn connect(
        &mut self,
        url: &str,
        direction: Direction,
    ) -> Result<Box<dyn Connection>, TransportError> {
        if self.fail_connect {
            return Err(TransportError::new(-1, format!("cannot reach {url}")));
        }
        self.log
            .borrow_mut()
            .connects
            .push((url.to_string(), direction));
        Ok(Box::new(ScriptedConnection {
            advertised: self.advertised.clone(),
            chunks: self.chunks.clone(),
            unpack_ok: self.unpack_ok,
            statuses: self.statuses.clone(),
            fail_negotiate: self.fail_negotiate,
            fail_update_tips: self.fail_update_tips,
            log: Rc::clone(&self.log),
        }))
    }
}

struct ScriptedConnection {
    advertised: Vec<AdvertisedRef>,
    chunks: Vec<PackChunk>,
    unpack_ok: bool,
    statuses: Vec<RefStatus>,
    fail_negotiate: bool,
    fail_update_tips: bool,
    log: Rc<RefCell<TransportLog>>,
}

impl Connection for ScriptedConnection {
    fn advertised_refs(&mut self) -> Result<Vec<AdvertisedRef>, TransportError> {
        Ok(self.advertised.clone())
    }

    fn negotiate(
        &mut self,
        wants: &[ObjectId],
        haves: &[ObjectId],
    ) -> Result<Box<dyn PackSource>, TransportError> {
        if self.fail_negotiate {
            return Err(TransportError::new(-8, "negotiation failed"));
        }
        {
            let mut log = self.log.borrow_mut();
            log.wants = wants.to_vec();
            log.haves = haves.to_vec();
        }
        let mut chunks = self.chunks.clone();
        chunks.reverse();
        Ok(Box::new(ScriptedPack { chunks }))
    }

    fn begin_push(&mut self) -> Result<Box<dyn PushTransaction>, TransportError> {
        self.log.borrow_mut().transactions_opened += 1;
        Ok(Box::new(ScriptedPush {
            unpack_ok: self.unpack_ok,
            statuses: self.statuses.clone(),
            fail_update_tips: self.fail_update_tips,
            log: Rc::clone(&self.log),
        }))
    }
}

struct ScriptedPack {
    // Reversed so pop() yields chunks in order.
    chunks: Vec<PackChunk>,
}

impl PackSource for ScriptedPack {
    fn next_chunk(&mut self) -> Result<Option<PackChunk>, TransportError> {
        Ok(self.chunks.pop())
    }
}

struct ScriptedPush {
    unpack_ok: bool,
    statuses: Vec<RefStatus>,
    fail_update_tips: bool,
    log: Rc<RefCell<TransportLog>>,
}

impl PushTransaction for ScriptedPush {
    fn add_refspec(&mut self, spec: &Refspec) -> Result<(), TransportError> {
        self.log.borrow_mut().refspecs_added.push(spec.to_string());
        Ok(())
    }

    fn finish(&mut self) -> Result<bool, TransportError> {
        Ok(self.unpack_ok)
    }

    fn status(&mut self) -> Result<Vec<RefStatus>, TransportError> {
        Ok(self.statuses.clone())
    }

    fn update_tips(&mut self) -> Result<(), TransportError> {
        if self.fail_update_tips {
            return Err(TransportError::new(-16, "cannot update tips"));
        }
        self.log.borrow_mut().tips_updated = true;
        Ok(())
    }
}

impl Drop for ScriptedPush {
    fn drop(&mut self) {
        self.log.borrow_mut().transactions_dropped += 1;
    }
}
