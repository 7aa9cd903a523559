use std::any::Any;

use tracing::info;

use crate::{
    chip::{Chip, ChipKind, Coprocessor, Port},
    interface::StorageId,
    markup::Node,
    memory::{Allocator, MemoryRegion},
    utils::numeral,
};

pub const BOOT_ROM: usize = 0;
pub const CARTRIDGE: usize = 1;

/// Game-adapter bridge. Both the boot ROM and the inserted handheld
/// cartridge are sized by whatever image the host delivers.
#[derive(Debug, Clone, PartialEq)]
pub struct Icd2 {
    pub revision: u32,
    chip: Chip,
}

impl Icd2 {
    pub fn configure(root: &Node, allocator: &mut Allocator<'_>) -> Self {
        let revision = numeral(root["revision"].text()).max(1);

        let mut cartridge = image(allocator.request(StorageId::SuperGameBoy, "Game Boy", Some("gb")));
        cartridge.id = Some(StorageId::SuperGameBoy);
        if !cartridge.is_empty() {
            info!("Game Boy cartridge inserted ({} bytes)", cartridge.size());
        }

        let name = root["rom/name"].text();
        let mut boot_rom = match name {
            "" => MemoryRegion::default(),
            name => image(allocator.request(StorageId::SuperGameBoyBootRom, name, None)),
        }
        .read_only();
        boot_rom.id = Some(StorageId::SuperGameBoyBootRom);
        boot_rom.name = name.to_string();

        Icd2 {
            revision,
            chip: Chip::new(ChipKind::Icd2, vec![boot_rom, cartridge]),
        }
    }
}

fn image(content: Option<Vec<u8>>) -> MemoryRegion {
    content.map(MemoryRegion::from_image).unwrap_or_default()
}

impl Coprocessor for Icd2 {
    fn kind(&self) -> ChipKind {
        ChipKind::Icd2
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn regions(&self) -> &[MemoryRegion] {
        self.chip.regions()
    }

    fn regions_mut(&mut self) -> &mut [MemoryRegion] {
        self.chip.regions_mut()
    }

    fn read(&self, port: Port, address: u32) -> u8 {
        self.chip.read(port, address)
    }

    fn write(&mut self, port: Port, address: u32, data: u8) {
        self.chip.write(port, address, data)
    }
}
