use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{interface::StorageId, memory::MemoryRegion};

/// Cartridge slot on a dual-slot link board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    /// `"B"` selects the second slot; anything else falls back to the first.
    pub fn from_id(id: &str) -> Self {
        match id {
            "B" => SlotId::B,
            _ => SlotId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }

    pub fn storage(self, memory: SlotMemory) -> StorageId {
        match (self, memory) {
            (SlotId::A, SlotMemory::Rom) => StorageId::SufamiTurboSlotARom,
            (SlotId::A, SlotMemory::Ram) => StorageId::SufamiTurboSlotARam,
            (SlotId::B, SlotMemory::Rom) => StorageId::SufamiTurboSlotBRom,
            (SlotId::B, SlotMemory::Ram) => StorageId::SufamiTurboSlotBRam,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::A => write!(f, "A"),
            SlotId::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotMemory {
    Rom,
    Ram,
}

impl SlotMemory {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "rom" => Some(SlotMemory::Rom),
            "ram" => Some(SlotMemory::Ram),
            _ => None,
        }
    }
}

/// Memory of a cartridge plugged into a link-board slot. An empty slot has
/// zero-sized regions and receives no bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkSlot {
    pub rom: MemoryRegion,
    pub ram: MemoryRegion,
}

impl LinkSlot {
    pub fn memory(&self, memory: SlotMemory) -> &MemoryRegion {
        match memory {
            SlotMemory::Rom => &self.rom,
            SlotMemory::Ram => &self.ram,
        }
    }

    pub fn memory_mut(&mut self, memory: SlotMemory) -> &mut MemoryRegion {
        match memory {
            SlotMemory::Rom => &mut self.rom,
            SlotMemory::Ram => &mut self.ram,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rom.is_empty() && self.ram.is_empty()
    }
}
