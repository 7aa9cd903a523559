use std::{any::Any, collections::BTreeMap, rc::Rc};

use derivative::Derivative;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::{
    bus::{Binding, MappingTable, Reader, RegionRef, Writer},
    chip::{Capabilities, Chip, ChipKind, ChipSpec, Coprocessor, Port, Route, CHIPS},
    error::{BoardError, Result},
    event::Event,
    hitachidsp::HitachiDsp,
    icd2::Icd2,
    interface::{CpuBus, Host, StorageId},
    markup::Node,
    memory::{Access, Allocator, MemoryRegion, PersistedMemory, SENTINEL},
    necdsp::NecDsp,
    nss::Nss,
    slot::{LinkSlot, SlotId, SlotMemory},
};

/// Broadcast standard the cartridge was built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

impl Region {
    pub fn from_name(name: &str) -> Self {
        match name {
            "PAL" => Region::Pal,
            _ => Region::Ntsc,
        }
    }
}

/// A configured cartridge: every region and chip the descriptor names, and
/// the mapping table that routes CPU bus accesses to them.
///
/// The board is the only owner of its regions and chips; bindings refer to
/// them by [`RegionRef`] and [`ChipKind`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Board {
    pub region: Region,
    rom: MemoryRegion,
    ram: MemoryRegion,
    satellite_flash: MemoryRegion,
    slots: [LinkSlot; 2],
    chips: BTreeMap<ChipKind, Box<dyn Coprocessor>>,
    mapping: MappingTable,
    capabilities: Capabilities,
    persisted: PersistedMemory,
    #[derivative(Debug = "ignore")]
    cpu: Rc<dyn CpuBus>,
}

impl Board {
    pub fn new(cpu: Rc<dyn CpuBus>) -> Self {
        Board {
            region: Region::default(),
            rom: MemoryRegion::default(),
            ram: MemoryRegion::default(),
            satellite_flash: MemoryRegion::default(),
            slots: Default::default(),
            chips: BTreeMap::new(),
            mapping: MappingTable::new(),
            capabilities: Capabilities::default(),
            persisted: PersistedMemory::default(),
            cpu,
        }
    }

    /// Builds a board from a whole descriptor document (`cartridge/region`,
    /// `cartridge/board`).
    pub fn load(document: &Node, host: &mut dyn Host, cpu: Rc<dyn CpuBus>) -> Self {
        let mut board = Board::new(cpu.clone());
        board.region = Region::from_name(document["cartridge/region"].text());
        board.configure(&document["cartridge/board"], host, cpu);
        board
    }

    /// Rebuilds everything from a `board` node. Each pass starts from an
    /// empty table, so configuring twice gives the same result as once. An
    /// absent node leaves the board empty.
    pub fn configure(&mut self, root: &Node, host: &mut dyn Host, cpu: Rc<dyn CpuBus>) {
        self.reset();
        self.cpu = cpu;

        if !root.exists() {
            warn!("Descriptor has no board, nothing will be mapped");
            return;
        }
        info!("Configuring {:?} board", self.region);

        let mut allocator = Allocator::new(host, &mut self.persisted);
        self.rom = allocator.allocate(&root["rom"], StorageId::Rom, false);
        self.ram = allocator.allocate(&root["ram"], StorageId::Ram, true);

        for node in root.children_named("map") {
            let target = match node["id"].text() {
                "rom" => RegionRef::Rom,
                "ram" => RegionRef::Ram,
                _ => continue,
            };
            let size = self.region_size(target);
            let binding = Binding::parse(node, Reader::Region(target), Writer::Region(target));
            self.append(binding.with_fallback_size(size));
        }

        for spec in CHIPS.iter() {
            self.bind_chip(spec, &root[spec.tag], host);
        }

        info!(
            "Board configured: {} bindings, {} chips, {} persisted regions",
            self.mapping.len(),
            self.chips.len(),
            self.persisted.len()
        );
    }

    fn reset(&mut self) {
        self.rom = MemoryRegion::default();
        self.ram = MemoryRegion::default();
        self.satellite_flash = MemoryRegion::default();
        self.slots = Default::default();
        self.chips.clear();
        self.mapping.clear();
        self.capabilities.clear();
        self.persisted.clear();
    }

    fn bind_chip(&mut self, spec: &ChipSpec, root: &Node, host: &mut dyn Host) {
        if !root.exists() {
            return;
        }
        info!("Binding {} chip", spec.tag);
        for capability in spec.capabilities {
            self.capabilities.set(*capability);
        }

        let mut allocator = Allocator::new(host, &mut self.persisted);
        if spec.kind == ChipKind::Bsx {
            self.satellite_flash = satellite_flash(&mut allocator);
        }
        let regions = spec
            .regions
            .iter()
            .map(|region| region.allocate(root, &mut allocator))
            .collect::<Vec<_>>();

        let chip = match spec.kind {
            ChipKind::Icd2 => boxed(Icd2::configure(root, &mut allocator)),
            ChipKind::BsxSlot => {
                self.satellite_flash = satellite_flash(&mut allocator);
                None
            }
            ChipKind::SufamiTurbo => {
                self.slots = link_slots(root, &mut allocator);
                None
            }
            ChipKind::Nss => boxed(Nss::configure(root, &mut *allocator.host)),
            ChipKind::Event => boxed(Event::configure(root, &mut allocator)),
            ChipKind::HitachiDsp => boxed(HitachiDsp::new(root, regions)),
            ChipKind::NecDsp => boxed(NecDsp::configure(root, &mut allocator)),
            kind => boxed(Chip::new(kind, regions)),
        };
        if let Some(chip) = chip {
            self.chips.insert(spec.kind, chip);
        }

        match spec.kind {
            ChipKind::SufamiTurbo => self.bind_link_slots(root),
            _ => self.bind_ports(spec, root),
        }
    }

    fn bind_ports(&mut self, spec: &ChipSpec, root: &Node) {
        for node in root.children_named("map") {
            let id = node["id"].text();
            let Some(port) = spec.port(id) else {
                trace!("{} has no map id {:?}", spec.tag, id);
                continue;
            };

            let size = self.route_size(spec.kind, port.read);
            if port.skip_empty && size == 0 {
                debug!("Skipping {} {} map, target is empty", spec.tag, id);
                continue;
            }

            let mut binding = Binding::parse(
                node,
                port.read.reader(spec.kind),
                port.write.writer(spec.kind),
            );
            if port.fallback {
                binding = binding.with_fallback_size(size);
            }
            self.append(binding);
        }
    }

    fn bind_link_slots(&mut self, root: &Node) {
        for slot in root.children_named("slot") {
            let id = SlotId::from_id(slot["id"].text());
            for node in slot.children_named("map") {
                let Some(memory) = SlotMemory::from_id(node["id"].text()) else {
                    continue;
                };
                let size = self.slots[id.index()].memory(memory).size();
                if size == 0 {
                    debug!("Skipping slot {} {:?} map, nothing inserted", id, memory);
                    continue;
                }
                let target = RegionRef::Slot(id, memory);
                let binding = Binding::parse(node, Reader::Region(target), Writer::Region(target));
                self.append(binding.with_fallback_size(size));
            }
        }
    }

    fn append(&mut self, binding: Binding) {
        debug!("Map {}", binding);
        self.mapping.append(binding);
    }

    fn route_size(&self, kind: ChipKind, route: Route) -> usize {
        match route {
            Route::Region(index) | Route::Chip(Port::Memory(index)) => {
                self.region_size(RegionRef::Chip(kind, index))
            }
            Route::Board(region) => self.region_size(region),
            _ => 0,
        }
    }

    fn region_size(&self, region: RegionRef) -> usize {
        self.region(region).map_or(0, MemoryRegion::size)
    }

    pub fn region(&self, region: RegionRef) -> Option<&MemoryRegion> {
        match region {
            RegionRef::Rom => Some(&self.rom),
            RegionRef::Ram => Some(&self.ram),
            RegionRef::SatelliteFlash => Some(&self.satellite_flash),
            RegionRef::Slot(id, memory) => Some(self.slots[id.index()].memory(memory)),
            RegionRef::Chip(kind, index) => self.chips.get(&kind)?.regions().get(index),
        }
    }

    pub fn region_mut(&mut self, region: RegionRef) -> Option<&mut MemoryRegion> {
        match region {
            RegionRef::Rom => Some(&mut self.rom),
            RegionRef::Ram => Some(&mut self.ram),
            RegionRef::SatelliteFlash => Some(&mut self.satellite_flash),
            RegionRef::Slot(id, memory) => Some(self.slots[id.index()].memory_mut(memory)),
            RegionRef::Chip(kind, index) => self.chips.get_mut(&kind)?.regions_mut().get_mut(index),
        }
    }

    /// Fails when nothing reads the base ROM, i.e. the board cannot boot.
    pub fn validate(&self) -> Result<()> {
        let rom = Reader::Region(RegionRef::Rom);
        if self.mapping.iter().any(|binding| binding.reader == rom) {
            Ok(())
        } else {
            Err(BoardError::NoRomMapping)
        }
    }

    /// Reads through the first binding claiming `address`. Unclaimed
    /// addresses float at the CPU's last bus value.
    pub fn read(&self, address: u32) -> u8 {
        match self.mapping.resolve(address) {
            Some((binding, offset)) => self.read_from(binding.reader, offset),
            None => {
                trace!("Unmapped read at {:#08X}", address);
                self.cpu.mdr()
            }
        }
    }

    fn read_from(&self, reader: Reader, offset: u32) -> u8 {
        match reader {
            Reader::Region(region) => self.region(region).map_or(SENTINEL, |region| region.read(offset)),
            Reader::Chip(kind, port) => self
                .chips
                .get(&kind)
                .map_or(SENTINEL, |chip| chip.read(port, offset)),
            Reader::OpenBus => self.cpu.mdr(),
        }
    }

    pub fn write(&mut self, address: u32, data: u8) {
        let Some((binding, offset)) = self.mapping.resolve(address) else {
            trace!("Unmapped write at {:#08X} = {:#04X}", address, data);
            return;
        };
        let writer = binding.writer;
        match writer {
            Writer::Region(region) => {
                if let Some(region) = self.region_mut(region) {
                    region.write(offset, data);
                }
            }
            Writer::Chip(kind, port) => {
                if let Some(chip) = self.chips.get_mut(&kind) {
                    chip.write(port, offset, data);
                }
            }
            Writer::Sink => {}
        }
    }

    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn persisted(&self) -> &PersistedMemory {
        &self.persisted
    }

    pub fn rom(&self) -> &MemoryRegion {
        &self.rom
    }

    pub fn ram(&self) -> &MemoryRegion {
        &self.ram
    }

    pub fn satellite_flash(&self) -> &MemoryRegion {
        &self.satellite_flash
    }

    pub fn slot(&self, id: SlotId) -> &LinkSlot {
        &self.slots[id.index()]
    }

    pub fn chip(&self, kind: ChipKind) -> Option<&dyn Coprocessor> {
        self.chips.get(&kind).map(|chip| chip.as_ref())
    }

    /// Typed access to a bound chip, e.g. `board.chip_as::<Event>(ChipKind::Event)`.
    pub fn chip_as<T: Any>(&self, kind: ChipKind) -> Option<&T> {
        self.chips.get(&kind)?.as_any().downcast_ref::<T>()
    }

    pub fn chip_kinds(&self) -> impl Iterator<Item = ChipKind> + '_ {
        self.chips.keys().copied()
    }

    pub fn dump(&self, region: RegionRef, start: usize, end: usize) -> String {
        self.region(region)
            .map(|region| region.dump(start, end))
            .unwrap_or_default()
    }
}

fn boxed(chip: impl Coprocessor + 'static) -> Option<Box<dyn Coprocessor>> {
    Some(Box::new(chip))
}

/// Satellite data-pack flash; sized by the host's image, empty without one.
fn satellite_flash(allocator: &mut Allocator<'_>) -> MemoryRegion {
    let mut flash = allocator
        .request(StorageId::Satellaview, "BS-X Satellaview", Some("bs"))
        .map(MemoryRegion::from_image)
        .unwrap_or_default();
    flash.id = Some(StorageId::Satellaview);
    flash
}

/// Allocates the link-board slots. Slot A must always be asked for; the
/// image the host hands back is the slot A cartridge when the descriptor
/// does not size it.
fn link_slots(root: &Node, allocator: &mut Allocator<'_>) -> [LinkSlot; 2] {
    let mut slots: [LinkSlot; 2] = Default::default();
    let image = allocator.request(StorageId::SufamiTurboSlotA, "Sufami Turbo - Slot A", Some("st"));

    for node in root.children_named("slot") {
        let id = SlotId::from_id(node["id"].text());
        let slot = &mut slots[id.index()];
        slot.rom = allocator.allocate(&node["rom"], id.storage(SlotMemory::Rom), false);
        slot.ram = allocator.allocate(&node["ram"], id.storage(SlotMemory::Ram), true);
    }

    let first = &mut slots[SlotId::A.index()];
    if let (Some(image), true) = (image, first.rom.is_empty()) {
        let mut rom = MemoryRegion::from_image(image).read_only();
        rom.id = Some(StorageId::SufamiTurboSlotARom);
        first.rom = rom;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chip::Capability,
        interface::{FloatingBus, NullHost},
    };

    fn cpu() -> Rc<dyn CpuBus> {
        Rc::new(FloatingBus(0x5A))
    }

    fn lorom() -> Node {
        Node::new("board")
            .child(Node::new("rom").attr("name", "program.rom").attr("size", "0x8000"))
            .child(Node::new("ram").attr("name", "save.ram").attr("size", "0x800"))
            .child(
                Node::new("map")
                    .attr("id", "rom")
                    .attr("address", "00-7d,80-ff:8000-ffff")
                    .attr("mask", "0x7fff"),
            )
            .child(
                Node::new("map")
                    .attr("id", "ram")
                    .attr("address", "70-7d,f0-ff:0000-7fff")
                    .attr("mask", "0x7ff"),
            )
    }

    fn configure(root: &Node) -> Board {
        let mut board = Board::new(cpu());
        board.configure(root, &mut NullHost, cpu());
        board
    }

    #[test]
    fn test_base_regions_and_fallback() {
        let board = configure(&lorom());
        assert_eq!(board.rom().size(), 0x8000);
        assert_eq!(board.ram().size(), 0x800);
        assert_eq!(board.mapping().len(), 2);
        assert_eq!(board.mapping().get(0).unwrap().size, 0x8000);
        assert_eq!(board.mapping().get(1).unwrap().size, 0x800);
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_absent_board_is_empty() {
        let board = configure(&Node::new("cartridge")["board"]);
        assert!(board.mapping().is_empty());
        assert_eq!(*board.capabilities(), Capabilities::default());
        assert!(matches!(board.validate(), Err(BoardError::NoRomMapping)));
    }

    #[test]
    fn test_unmapped_read_floats() {
        let board = configure(&lorom());
        assert_eq!(board.read(0x002100), 0x5A);
    }

    #[test]
    fn test_ram_round_trip_through_mirror() {
        let mut board = configure(&lorom());
        board.write(0x700010, 0x42);
        assert_eq!(board.read(0xF00010), 0x42);
        assert_eq!(board.ram().data()[0x10], 0x42);
        // ROM stays write-protected
        board.write(0x008000, 0x00);
        assert_eq!(board.read(0x008000), 0xFF);
    }

    #[test]
    fn test_region_from_document() {
        let document = Node::new("root").child(
            Node::new("cartridge")
                .attr("region", "PAL")
                .child(lorom()),
        );
        let board = Board::load(&document, &mut NullHost, cpu());
        assert_eq!(board.region, Region::Pal);
        assert_eq!(board.mapping().len(), 2);
        assert_eq!(Region::from_name("pal"), Region::Ntsc);
    }

    #[test]
    fn test_chip_sets_capability() {
        let root = lorom().child(
            Node::new("obc1")
                .child(Node::new("ram").attr("name", "save.ram").attr("size", "0x2000"))
                .child(Node::new("map").attr("id", "io").attr("address", "00-3f,80-bf:6000-7fff")),
        );
        let board = configure(&root);
        assert!(board.capabilities().has(Capability::Obc1));
        assert!(!board.capabilities().has(Capability::Sa1));
        assert!(board.chip(ChipKind::Obc1).is_some());
        assert_eq!(board.mapping().len(), 3);
        assert_eq!(
            board.mapping().get(2).unwrap().reader,
            Reader::Chip(ChipKind::Obc1, Port::Io)
        );
    }

    #[test]
    fn test_dump_region() {
        let board = configure(&lorom());
        assert!(board.dump(RegionRef::Rom, 0, 16).starts_with("000000: ff ff"));
        assert_eq!(board.dump(RegionRef::Chip(ChipKind::Sa1, 0), 0, 16), "");
    }
}
