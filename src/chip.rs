//! Cartridge coprocessors and the static table that drives their binding.
//!
//! Every chip variant is described by a [`ChipSpec`]: the descriptor tag it
//! answers to, the capability flags it raises, the regions it allocates and
//! the `map` ids it understands. Variants with behaviour beyond that table
//! (event board, NEC/Hitachi DSPs, game adapter, arcade DIP bank, link
//! slots) get their own types and hooks in the board configurator.

use std::{any::Any, collections::HashMap, fmt};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{
    bus::{Reader, RegionRef, Writer},
    interface::StorageId,
    markup::Node,
    memory::{Access, Allocator, MemoryRegion, SENTINEL},
    utils::numeral,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ChipKind {
    Icd2,
    Bsx,
    BsxSlot,
    SufamiTurbo,
    Nss,
    Event,
    Sa1,
    SuperFx,
    ArmDsp,
    HitachiDsp,
    NecDsp,
    EpsonRtc,
    SharpRtc,
    Spc7110,
    Sdd1,
    Obc1,
    Msu1,
}

impl ChipKind {
    pub fn from_tag(tag: &str) -> Option<ChipKind> {
        BY_TAG.get(tag).map(|spec| spec.kind)
    }

    pub fn spec(self) -> &'static ChipSpec {
        // CHIPS lists every kind exactly once, in declaration order
        &CHIPS[self as usize]
    }

    pub fn tag(self) -> &'static str {
        self.spec().tag
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Entry point of a chip a binding can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Port {
    /// Memory-mapped register window.
    Io,
    /// Chip-mediated view of one of the chip's regions.
    Memory(usize),
    /// Shared ROM/PSRAM window of the satellite cartridge controller.
    Mcu,
    /// Bank-switched ROM window of the event board.
    Rom,
    Data,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capability {
    GameBoySlot,
    SatelliteCartridge,
    SatelliteSlot,
    LinkSlots,
    DipSwitches,
    EventBoard,
    Sa1,
    SuperFx,
    ArmDsp,
    HitachiDsp,
    NecDsp,
    EpsonRtc,
    SharpRtc,
    Spc7110,
    Sdd1,
    Obc1,
    Msu1,
}

/// Optional hardware present on the loaded board. The scheduler reads these
/// to decide which units to step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub game_boy_slot: bool,
    pub satellite_cartridge: bool,
    pub satellite_slot: bool,
    pub link_slots: bool,
    pub dip_switches: bool,
    pub event_board: bool,
    pub sa1: bool,
    pub superfx: bool,
    pub armdsp: bool,
    pub hitachidsp: bool,
    pub necdsp: bool,
    pub epsonrtc: bool,
    pub sharprtc: bool,
    pub spc7110: bool,
    pub sdd1: bool,
    pub obc1: bool,
    pub msu1: bool,
}

impl Capabilities {
    fn flag_mut(&mut self, capability: Capability) -> &mut bool {
        match capability {
            Capability::GameBoySlot => &mut self.game_boy_slot,
            Capability::SatelliteCartridge => &mut self.satellite_cartridge,
            Capability::SatelliteSlot => &mut self.satellite_slot,
            Capability::LinkSlots => &mut self.link_slots,
            Capability::DipSwitches => &mut self.dip_switches,
            Capability::EventBoard => &mut self.event_board,
            Capability::Sa1 => &mut self.sa1,
            Capability::SuperFx => &mut self.superfx,
            Capability::ArmDsp => &mut self.armdsp,
            Capability::HitachiDsp => &mut self.hitachidsp,
            Capability::NecDsp => &mut self.necdsp,
            Capability::EpsonRtc => &mut self.epsonrtc,
            Capability::SharpRtc => &mut self.sharprtc,
            Capability::Spc7110 => &mut self.spc7110,
            Capability::Sdd1 => &mut self.sdd1,
            Capability::Obc1 => &mut self.obc1,
            Capability::Msu1 => &mut self.msu1,
        }
    }

    pub fn set(&mut self, capability: Capability) {
        *self.flag_mut(capability) = true;
    }

    pub fn has(&self, capability: Capability) -> bool {
        let mut copy = *self;
        *copy.flag_mut(capability)
    }

    pub fn clear(&mut self) {
        *self = Capabilities::default();
    }
}

/// Read/write entry points shared by every coprocessor. Ports that a chip
/// does not implement read back [`SENTINEL`] and ignore writes.
pub trait Coprocessor: fmt::Debug {
    fn kind(&self) -> ChipKind;

    fn as_any(&self) -> &dyn Any;

    fn regions(&self) -> &[MemoryRegion];

    fn regions_mut(&mut self) -> &mut [MemoryRegion];

    fn read(&self, port: Port, address: u32) -> u8 {
        match port {
            Port::Memory(index) => self
                .regions()
                .get(index)
                .map_or(SENTINEL, |region| read_mirrored(region, address)),
            _ => SENTINEL,
        }
    }

    fn write(&mut self, port: Port, address: u32, data: u8) {
        if let Port::Memory(index) = port {
            if let Some(region) = self.regions_mut().get_mut(index) {
                write_mirrored(region, address, data);
            }
        }
    }
}

/// Chips see their own memories mirrored across whatever window they are
/// given.
pub fn read_mirrored(region: &MemoryRegion, address: u32) -> u8 {
    match region.size() {
        0 => SENTINEL,
        size => region.read(address % size as u32),
    }
}

pub fn write_mirrored(region: &mut MemoryRegion, address: u32, data: u8) {
    if let size @ 1.. = region.size() {
        region.write(address % size as u32, data);
    }
}

/// How a region listed in a [`ChipSpec`] gets its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Sized by the descriptor's `size`, filled with the sentinel.
    Sized,
    /// Fixed-size chip-internal store, reset to `fill` on every bind.
    Internal { size: usize, fill: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSpec {
    pub selector: &'static str,
    pub id: StorageId,
    pub writable: bool,
    /// Register named content with the host for saving.
    pub persist: bool,
    pub layout: Layout,
}

impl RegionSpec {
    const fn sized(selector: &'static str, id: StorageId, writable: bool) -> Self {
        RegionSpec {
            selector,
            id,
            writable,
            persist: writable,
            layout: Layout::Sized,
        }
    }

    const fn internal(selector: &'static str, id: StorageId, writable: bool, size: usize, fill: u8) -> Self {
        RegionSpec {
            selector,
            id,
            writable,
            persist: writable,
            layout: Layout::Internal { size, fill },
        }
    }

    /// Writable, loaded from the host, but never handed back for saving.
    const fn unsaved(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn allocate(&self, root: &Node, allocator: &mut Allocator<'_>) -> MemoryRegion {
        let node = &root[self.selector];
        let mut region = match self.layout {
            Layout::Sized => MemoryRegion::new(numeral(node["size"].text()) as usize),
            Layout::Internal { size, fill } => MemoryRegion::filled(size, fill),
        };
        if !self.writable {
            region = region.read_only();
        }
        allocator.fill(&mut region, self.id, node["name"].text(), self.persist);
        region
    }
}

/// Target of one side of a binding, relative to the chip being bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Chip(Port),
    /// Raw accessor of the chip's own region.
    Region(usize),
    /// Raw accessor of a board-owned region.
    Board(RegionRef),
    OpenBus,
    Sink,
}

impl Route {
    pub fn reader(self, kind: ChipKind) -> Reader {
        match self {
            Route::Chip(port) => Reader::Chip(kind, port),
            Route::Region(index) => Reader::Region(RegionRef::Chip(kind, index)),
            Route::Board(region) => Reader::Region(region),
            Route::OpenBus | Route::Sink => Reader::OpenBus,
        }
    }

    pub fn writer(self, kind: ChipKind) -> Writer {
        match self {
            Route::Chip(port) => Writer::Chip(kind, port),
            Route::Region(index) => Writer::Region(RegionRef::Chip(kind, index)),
            Route::Board(region) => Writer::Region(region),
            Route::OpenBus | Route::Sink => Writer::Sink,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub id: &'static str,
    pub read: Route,
    pub write: Route,
    /// Substitute the target region's size when the map omits `size`.
    pub fallback: bool,
    /// Drop the binding entirely when the target region is empty.
    pub skip_empty: bool,
}

impl PortSpec {
    const fn both(id: &'static str, route: Route) -> Self {
        PortSpec {
            id,
            read: route,
            write: route,
            fallback: false,
            skip_empty: false,
        }
    }

    const fn split(id: &'static str, read: Route, write: Route) -> Self {
        PortSpec {
            id,
            read,
            write,
            fallback: false,
            skip_empty: false,
        }
    }

    const fn sized(mut self) -> Self {
        self.fallback = true;
        self
    }

    const fn optional(mut self) -> Self {
        self.skip_empty = true;
        self
    }
}

#[derive(Debug)]
pub struct ChipSpec {
    pub kind: ChipKind,
    pub tag: &'static str,
    pub capabilities: &'static [Capability],
    pub regions: &'static [RegionSpec],
    pub ports: &'static [PortSpec],
}

impl ChipSpec {
    pub fn by_tag(tag: &str) -> Option<&'static ChipSpec> {
        BY_TAG.get(tag).copied()
    }

    pub fn port(&self, id: &str) -> Option<&'static PortSpec> {
        self.ports.iter().find(|port| port.id == id)
    }
}

const IO: PortSpec = PortSpec::both("io", Route::Chip(Port::Io));

const KIB: usize = 1024;

/// Every chip variant, in the order the board configurator binds them.
pub static CHIPS: [ChipSpec; 17] = [
    ChipSpec {
        kind: ChipKind::Icd2,
        tag: "icd2",
        capabilities: &[Capability::GameBoySlot],
        regions: &[],
        ports: &[IO],
    },
    ChipSpec {
        kind: ChipKind::Bsx,
        tag: "bsx",
        capabilities: &[Capability::SatelliteCartridge, Capability::SatelliteSlot],
        regions: &[
            RegionSpec::sized("rom", StorageId::BsxRom, false),
            RegionSpec::sized("ram", StorageId::BsxRam, true),
            RegionSpec::sized("psram", StorageId::BsxPsram, true),
        ],
        ports: &[
            PortSpec::both("rom", Route::Chip(Port::Mcu)),
            PortSpec::both("ram", Route::Chip(Port::Mcu)),
            IO,
        ],
    },
    ChipSpec {
        kind: ChipKind::BsxSlot,
        tag: "bsxslot",
        capabilities: &[Capability::SatelliteSlot],
        regions: &[],
        ports: &[PortSpec::both("rom", Route::Board(RegionRef::SatelliteFlash)).optional()],
    },
    ChipSpec {
        kind: ChipKind::SufamiTurbo,
        tag: "sufamiturbo",
        capabilities: &[Capability::LinkSlots],
        regions: &[],
        // slot maps are nested per slot and bound by the configurator
        ports: &[],
    },
    ChipSpec {
        kind: ChipKind::Nss,
        tag: "nss",
        capabilities: &[Capability::DipSwitches],
        regions: &[],
        ports: &[IO],
    },
    ChipSpec {
        kind: ChipKind::Event,
        tag: "event",
        capabilities: &[Capability::EventBoard],
        // banks are numbered by the descriptor; allocated by the event board
        regions: &[],
        ports: &[
            PortSpec::split("rom", Route::Chip(Port::Rom), Route::Sink),
            PortSpec::both("ram", Route::Chip(Port::Memory(crate::event::RAM))),
            PortSpec::split("dr", Route::OpenBus, Route::Chip(Port::Data)),
            PortSpec::split("sr", Route::Chip(Port::Status), Route::Sink),
        ],
    },
    ChipSpec {
        kind: ChipKind::Sa1,
        tag: "sa1",
        capabilities: &[Capability::Sa1],
        regions: &[
            RegionSpec::sized("rom", StorageId::Sa1Rom, false),
            RegionSpec::sized("ram(id=bitmap)", StorageId::Sa1BwRam, true),
            RegionSpec::sized("ram(id=internal)", StorageId::Sa1IRam, true),
        ],
        ports: &[
            IO,
            PortSpec::both("rom", Route::Chip(Port::Memory(0))),
            PortSpec::both("bwram", Route::Chip(Port::Memory(1))),
            PortSpec::both("iram", Route::Region(2)).sized(),
        ],
    },
    ChipSpec {
        kind: ChipKind::SuperFx,
        tag: "superfx",
        capabilities: &[Capability::SuperFx],
        regions: &[
            RegionSpec::sized("rom", StorageId::SuperFxRom, false),
            RegionSpec::sized("ram", StorageId::SuperFxRam, true),
        ],
        ports: &[
            IO,
            PortSpec::both("rom", Route::Region(0)).sized(),
            PortSpec::both("ram", Route::Region(1)).sized(),
        ],
    },
    ChipSpec {
        kind: ChipKind::ArmDsp,
        tag: "armdsp",
        capabilities: &[Capability::ArmDsp],
        regions: &[
            RegionSpec::internal("rom(id=program)", StorageId::ArmDspProgramRom, false, 128 * KIB, SENTINEL),
            RegionSpec::internal("rom(id=data)", StorageId::ArmDspDataRom, false, 32 * KIB, SENTINEL),
            RegionSpec::internal("ram", StorageId::ArmDspRam, true, 16 * KIB, SENTINEL),
        ],
        ports: &[IO],
    },
    ChipSpec {
        kind: ChipKind::HitachiDsp,
        tag: "hitachidsp",
        capabilities: &[Capability::HitachiDsp],
        regions: &[
            RegionSpec::internal("rom(id=data)", StorageId::HitachiDspDataRom, false, 3 * KIB, 0x00),
            RegionSpec::internal("ram", StorageId::HitachiDspRam, true, 3 * KIB, 0x00).unsaved(),
            RegionSpec::sized("rom(id!=data)", StorageId::HitachiDspRom, false),
        ],
        ports: &[
            IO,
            PortSpec::both("rom", Route::Chip(Port::Memory(crate::hitachidsp::ROM))).sized(),
        ],
    },
    ChipSpec {
        kind: ChipKind::NecDsp,
        tag: "necdsp",
        capabilities: &[Capability::NecDsp],
        // storage ids depend on the model; allocated by the DSP itself
        regions: &[],
        ports: &[
            PortSpec::both("dr", Route::Chip(Port::Data)),
            PortSpec::both("sr", Route::Chip(Port::Status)),
            PortSpec::both("ram", Route::Chip(Port::Memory(crate::necdsp::DATA_RAM))),
        ],
    },
    ChipSpec {
        kind: ChipKind::EpsonRtc,
        tag: "epsonrtc",
        capabilities: &[Capability::EpsonRtc],
        regions: &[RegionSpec::sized("ram", StorageId::EpsonRtc, true)],
        ports: &[IO],
    },
    ChipSpec {
        kind: ChipKind::SharpRtc,
        tag: "sharprtc",
        capabilities: &[Capability::SharpRtc],
        regions: &[RegionSpec::sized("ram", StorageId::SharpRtc, true)],
        ports: &[IO],
    },
    ChipSpec {
        kind: ChipKind::Spc7110,
        tag: "spc7110",
        capabilities: &[Capability::Spc7110],
        regions: &[
            RegionSpec::sized("rom(id=program)", StorageId::Spc7110ProgramRom, false),
            RegionSpec::sized("rom(id=data)", StorageId::Spc7110DataRom, false),
            RegionSpec::sized("ram", StorageId::Spc7110Ram, true),
        ],
        ports: &[
            IO,
            PortSpec::both("rom", Route::Chip(Port::Memory(0))),
            PortSpec::both("ram", Route::Chip(Port::Memory(2))),
        ],
    },
    ChipSpec {
        kind: ChipKind::Sdd1,
        tag: "sdd1",
        capabilities: &[Capability::Sdd1],
        regions: &[
            RegionSpec::sized("rom", StorageId::Sdd1Rom, false),
            RegionSpec::sized("ram", StorageId::Sdd1Ram, true),
        ],
        ports: &[
            IO,
            PortSpec::both("rom", Route::Chip(Port::Memory(0))),
            PortSpec::both("ram", Route::Chip(Port::Memory(1))),
        ],
    },
    ChipSpec {
        kind: ChipKind::Obc1,
        tag: "obc1",
        capabilities: &[Capability::Obc1],
        regions: &[RegionSpec::sized("ram", StorageId::Obc1Ram, true)],
        ports: &[IO],
    },
    ChipSpec {
        kind: ChipKind::Msu1,
        tag: "msu1",
        capabilities: &[Capability::Msu1],
        regions: &[],
        ports: &[IO],
    },
];

static BY_TAG: Lazy<HashMap<&'static str, &'static ChipSpec>> =
    Lazy::new(|| CHIPS.iter().map(|spec| (spec.tag, spec)).collect());

const REGISTERS: usize = 0x100;

/// Coprocessor whose only configuration is its regions. The register window
/// latches written values so hosts and tests can observe bus traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct Chip {
    kind: ChipKind,
    regions: Vec<MemoryRegion>,
    registers: Vec<u8>,
}

impl Chip {
    pub fn new(kind: ChipKind, regions: Vec<MemoryRegion>) -> Self {
        Chip {
            kind,
            regions,
            registers: vec![0; REGISTERS],
        }
    }

    /// ROM first, then PSRAM, as one contiguous window.
    fn mcu_target(&self, address: u32) -> Option<(usize, u32)> {
        let rom = self.regions.first()?.size() as u32;
        if address < rom {
            return Some((0, address));
        }
        let psram = self.regions.get(2)?.size() as u32;
        (psram > 0).then(|| (2, (address - rom) % psram))
    }
}

impl Coprocessor for Chip {
    fn kind(&self) -> ChipKind {
        self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn regions_mut(&mut self) -> &mut [MemoryRegion] {
        &mut self.regions
    }

    fn read(&self, port: Port, address: u32) -> u8 {
        match port {
            Port::Io => self.registers[address as usize % REGISTERS],
            Port::Mcu => self
                .mcu_target(address)
                .map_or(SENTINEL, |(index, offset)| self.regions[index].read(offset)),
            Port::Memory(index) => self
                .regions
                .get(index)
                .map_or(SENTINEL, |region| read_mirrored(region, address)),
            _ => SENTINEL,
        }
    }

    fn write(&mut self, port: Port, address: u32, data: u8) {
        match port {
            Port::Io => self.registers[address as usize % REGISTERS] = data,
            Port::Mcu => {
                if let Some((index, offset)) = self.mcu_target(address) {
                    self.regions[index].write(offset, data);
                }
            }
            Port::Memory(index) => {
                if let Some(region) = self.regions.get_mut(index) {
                    write_mirrored(region, address, data);
                }
            }
            _ => {}
        }
    }
}
