// Collaborators the board loader talks to: host storage and the CPU bus.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::markup::Node;

/// Persisted-storage slot identifiers, shared with the host so it knows
/// which file or image a load request is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageId {
    Rom,
    Ram,

    SuperGameBoy,
    SuperGameBoyBootRom,

    Satellaview,
    BsxRom,
    BsxRam,
    BsxPsram,

    SufamiTurboSlotA,
    SufamiTurboSlotARom,
    SufamiTurboSlotARam,
    SufamiTurboSlotBRom,
    SufamiTurboSlotBRam,

    EventRom0,
    EventRom1,
    EventRom2,
    EventRom3,
    EventRam,

    Sa1Rom,
    Sa1BwRam,
    Sa1IRam,

    SuperFxRom,
    SuperFxRam,

    ArmDspProgramRom,
    ArmDspDataRom,
    ArmDspRam,

    HitachiDspRom,
    HitachiDspDataRom,
    HitachiDspRam,

    Nec7725DspProgramRom,
    Nec7725DspDataRom,
    Nec7725DspRam,
    Nec96050DspProgramRom,
    Nec96050DspDataRom,
    Nec96050DspRam,

    EpsonRtc,
    SharpRtc,

    Spc7110ProgramRom,
    Spc7110DataRom,
    Spc7110Ram,

    Sdd1Rom,
    Sdd1Ram,

    Obc1Ram,
}

impl StorageId {
    pub fn event_rom(bank: usize) -> Option<StorageId> {
        match bank {
            0 => Some(StorageId::EventRom0),
            1 => Some(StorageId::EventRom1),
            2 => Some(StorageId::EventRom2),
            3 => Some(StorageId::EventRom3),
            _ => None,
        }
    }
}

/// Host side of the loader: storage and user configuration.
pub trait Host {
    /// Asks the host for the content of a named storage slot. `Ok(None)`
    /// means the host has nothing for it; the target keeps its fill value.
    fn load_request(
        &mut self,
        id: StorageId,
        name: &str,
        tag: Option<&str>,
    ) -> anyhow::Result<Option<Vec<u8>>>;

    /// DIP switch configuration for an arcade board subtree.
    fn dip_settings(&mut self, _node: &Node) -> u32 {
        0
    }
}

/// A host with no storage at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Host for NullHost {
    fn load_request(
        &mut self,
        _id: StorageId,
        _name: &str,
        _tag: Option<&str>,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Live view of the CPU's bus state, handed to the board at configuration
/// time so open-bus reads don't reach into a global processor.
pub trait CpuBus {
    /// Last value driven on the data bus (memory data register).
    fn mdr(&self) -> u8;
}

/// Bus context that always reports the same floating value.
#[derive(Debug, Clone, Copy)]
pub struct FloatingBus(pub u8);

impl Default for FloatingBus {
    fn default() -> Self {
        FloatingBus(0xFF)
    }
}

impl CpuBus for FloatingBus {
    fn mdr(&self) -> u8 {
        self.0
    }
}

/// Bus context whose value the driver updates as the CPU runs.
#[derive(Debug, Default)]
pub struct LatchedBus(Cell<u8>);

impl LatchedBus {
    pub fn new(value: u8) -> Self {
        LatchedBus(Cell::new(value))
    }

    pub fn set(&self, value: u8) {
        self.0.set(value);
    }
}

impl CpuBus for LatchedBus {
    fn mdr(&self) -> u8 {
        self.0.get()
    }
}
