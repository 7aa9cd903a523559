use derivative::Derivative;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{
    interface::{Host, StorageId},
    markup::Node,
    utils::{hexdump, numeral},
};

/// Fill value for freshly allocated regions.
pub const SENTINEL: u8 = 0xFF;

/// Byte-level read/write entry points. Implemented by memory regions and,
/// per port, by the coprocessors.
pub trait Access {
    fn read(&self, address: u32) -> u8;
    fn write(&mut self, address: u32, data: u8);
}

#[derive(Derivative, Clone, Default)]
#[derivative(Debug, PartialEq)]
pub struct MemoryRegion {
    pub id: Option<StorageId>,
    pub name: String,
    writable: bool,
    #[derivative(Debug = "ignore")]
    data: Vec<u8>,
}

impl MemoryRegion {
    pub fn new(size: usize) -> Self {
        Self::filled(size, SENTINEL)
    }

    pub fn filled(size: usize, value: u8) -> Self {
        MemoryRegion {
            id: None,
            name: String::new(),
            writable: true,
            data: vec![value; size],
        }
    }

    /// A region sized by a host-delivered image rather than a descriptor.
    pub fn from_image(image: Vec<u8>) -> Self {
        MemoryRegion {
            id: None,
            name: String::new(),
            writable: true,
            data: image,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copies host content over the start of the buffer. The region keeps
    /// its size: longer images are truncated, shorter ones leave the fill.
    pub fn load(&mut self, content: &[u8]) {
        let len = content.len().min(self.data.len());
        self.data[..len].copy_from_slice(&content[..len]);
    }

    pub fn dump(&self, start: usize, end: usize) -> String {
        hexdump(&self.data, start, end)
    }
}

impl Access for MemoryRegion {
    fn read(&self, address: u32) -> u8 {
        match self.data.get(address as usize) {
            Some(value) => *value,
            None => {
                trace!(
                    "Read from out of bounds region address {:#08X}, returning {:#04X}",
                    address,
                    SENTINEL
                );
                SENTINEL
            }
        }
    }

    fn write(&mut self, address: u32, data: u8) {
        if !self.writable {
            trace!("Attempt to write to read-only region address {:#08X}", address);
            return;
        }
        if let Some(cell) = self.data.get_mut(address as usize) {
            *cell = data;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persisted {
    pub id: StorageId,
    pub name: String,
}

/// Regions the host must write back to storage when the cartridge unloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PersistedMemory {
    entries: Vec<Persisted>,
}

impl PersistedMemory {
    /// Records a writable slot; unnamed slots have nowhere to be saved and
    /// are ignored.
    pub fn append(&mut self, id: StorageId, name: &str) {
        if name.is_empty() {
            return;
        }
        self.entries.push(Persisted {
            id,
            name: name.to_string(),
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: StorageId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Persisted> {
        self.entries.iter()
    }
}

/// Allocates regions named by the descriptor and routes their content
/// requests to the host.
pub struct Allocator<'a> {
    pub host: &'a mut dyn Host,
    pub persisted: &'a mut PersistedMemory,
}

impl<'a> Allocator<'a> {
    pub fn new(host: &'a mut dyn Host, persisted: &'a mut PersistedMemory) -> Self {
        Self { host, persisted }
    }

    /// Allocates a region from a `rom`/`ram` style node (`name`, `size`).
    /// ROMs (`writable == false`) are write-protected and never persisted.
    pub fn allocate(&mut self, node: &Node, id: StorageId, writable: bool) -> MemoryRegion {
        let size = numeral(node["size"].text()) as usize;
        let mut region = MemoryRegion::new(size);
        if !writable {
            region = region.read_only();
        }
        self.fill(&mut region, id, node["name"].text(), writable);
        region
    }

    /// Loads named content into an already sized region, such as a chip's
    /// internal program store, and registers it for saving when `persist`.
    pub fn fill(&mut self, region: &mut MemoryRegion, id: StorageId, name: &str, persist: bool) {
        region.id = Some(id);
        region.name = name.to_string();
        if name.is_empty() {
            return;
        }

        if let Some(content) = self.request(id, name, None) {
            region.load(&content);
        }
        if persist {
            self.persisted.append(id, name);
        }
    }

    /// Issues one load request. Host failures are logged and treated as
    /// "no content".
    pub fn request(&mut self, id: StorageId, name: &str, tag: Option<&str>) -> Option<Vec<u8>> {
        debug!("Load request {:?} name={:?} tag={:?}", id, name, tag);
        match self.host.load_request(id, name, tag) {
            Ok(content) => content,
            Err(err) => {
                warn!("Load request {:?} ({}) failed: {:#}", id, name, err);
                None
            }
        }
    }
}
