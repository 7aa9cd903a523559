use std::any::Any;

use crate::{
    chip::{Chip, ChipKind, Coprocessor, Port},
    markup::Node,
    memory::MemoryRegion,
    utils::numeral,
};

/// Data ROM and data RAM are fixed 3 KiB tables cleared to 0x00.
pub const DATA_ROM: usize = 0;
pub const DATA_RAM: usize = 1;
/// Program ROM the host CPU can also reach through the chip.
pub const ROM: usize = 2;

pub const DEFAULT_FREQUENCY: u32 = 20_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct HitachiDsp {
    pub frequency: u32,
    chip: Chip,
}

impl HitachiDsp {
    pub fn new(root: &Node, regions: Vec<MemoryRegion>) -> Self {
        let frequency = match numeral(root["frequency"].text()) {
            0 => DEFAULT_FREQUENCY,
            frequency => frequency,
        };
        HitachiDsp {
            frequency,
            chip: Chip::new(ChipKind::HitachiDsp, regions),
        }
    }
}

impl Coprocessor for HitachiDsp {
    fn kind(&self) -> ChipKind {
        ChipKind::HitachiDsp
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
