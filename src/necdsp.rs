use std::any::Any;

use serde::Serialize;
use tracing::debug;

use crate::{
    chip::{read_mirrored, write_mirrored, ChipKind, Coprocessor, Port},
    interface::StorageId,
    markup::Node,
    memory::{Allocator, MemoryRegion, SENTINEL},
    utils::numeral,
};

pub const PROGRAM_ROM: usize = 0;
pub const DATA_ROM: usize = 1;
pub const DATA_RAM: usize = 2;

// The three tables power up cleared to 0x00, not the 0xFF region fill.

/// 24-bit program words.
const PROGRAM_ROM_SIZE: usize = 16384 * 3;
/// 16-bit data words.
const DATA_ROM_SIZE: usize = 2048 * 2;
const DATA_RAM_SIZE: usize = 2048 * 2;

pub const DEFAULT_FREQUENCY: u32 = 8_000_000;

/// Request-for-master flag: the DSP is ready for the next transfer.
const STATUS_RQM: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NecModel {
    Upd7725,
    Upd96050,
}

impl NecModel {
    /// Only the exact `uPD96050` name selects the larger part.
    pub fn from_name(name: &str) -> Self {
        match name {
            "uPD96050" => NecModel::Upd96050,
            _ => NecModel::Upd7725,
        }
    }

    /// Storage ids for program ROM, data ROM and data RAM, in region order.
    pub fn storage(self) -> [StorageId; 3] {
        match self {
            NecModel::Upd7725 => [
                StorageId::Nec7725DspProgramRom,
                StorageId::Nec7725DspDataRom,
                StorageId::Nec7725DspRam,
            ],
            NecModel::Upd96050 => [
                StorageId::Nec96050DspProgramRom,
                StorageId::Nec96050DspDataRom,
                StorageId::Nec96050DspRam,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NecDsp {
    pub model: NecModel,
    pub frequency: u32,
    regions: Vec<MemoryRegion>,
    data: u8,
    status: u8,
}

impl NecDsp {
    pub fn configure(root: &Node, allocator: &mut Allocator<'_>) -> Self {
        let model = NecModel::from_name(root["model"].text());
        let frequency = match numeral(root["frequency"].text()) {
            0 => DEFAULT_FREQUENCY,
            frequency => frequency,
        };
        debug!("NEC DSP model {:?} at {} Hz", model, frequency);

        let [program_id, data_id, ram_id] = model.storage();

        let mut program = MemoryRegion::filled(PROGRAM_ROM_SIZE, 0x00).read_only();
        allocator.fill(&mut program, program_id, root["rom(id=program)/name"].text(), false);

        let mut data = MemoryRegion::filled(DATA_ROM_SIZE, 0x00).read_only();
        allocator.fill(&mut data, data_id, root["rom(id=data)/name"].text(), false);

        let mut ram = MemoryRegion::filled(DATA_RAM_SIZE, 0x00);
        allocator.fill(&mut ram, ram_id, root["ram/name"].text(), true);

        NecDsp {
            model,
            frequency,
            regions: vec![program, data, ram],
            data: 0,
            status: STATUS_RQM,
        }
    }
}

impl Coprocessor for NecDsp {
    fn kind(&self) -> ChipKind {
        ChipKind::NecDsp
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
            Port::Data => self.data,
            Port::Status => self.status,
            Port::Memory(DATA_RAM) => read_mirrored(&self.regions[DATA_RAM], address),
            _ => SENTINEL,
        }
    }

    fn write(&mut self, port: Port, address: u32, data: u8) {
        match port {
            Port::Data => self.data = data,
            Port::Memory(DATA_RAM) => write_mirrored(&mut self.regions[DATA_RAM], address, data),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{interface::NullHost, memory::PersistedMemory};

    fn descriptor(model: Option<&str>) -> Node {
        let mut node = Node::new("necdsp")
            .child(Node::new("rom").attr("id", "program").attr("name", "dsp1.program.rom"))
            .child(Node::new("rom").attr("id", "data").attr("name", "dsp1.data.rom"))
            .child(Node::new("ram").attr("name", "dsp1.data.ram"));
        if let Some(model) = model {
            node = node.attr("model", model);
        }
        node
    }

    fn configure(root: &Node) -> (NecDsp, PersistedMemory) {
        let mut host = NullHost;
        let mut persisted = PersistedMemory::default();
        let dsp = NecDsp::configure(root, &mut Allocator::new(&mut host, &mut persisted));
        (dsp, persisted)
    }

    #[test]
    fn test_model_selection() {
        assert_eq!(NecModel::from_name("uPD96050"), NecModel::Upd96050);
        assert_eq!(NecModel::from_name("uPD7725"), NecModel::Upd7725);
        assert_eq!(NecModel::from_name(""), NecModel::Upd7725);
        assert_eq!(NecModel::from_name("upd96050"), NecModel::Upd7725);
    }

    #[test]
    fn test_96050_ids_only() {
        let (dsp, persisted) = configure(&descriptor(Some("uPD96050")));
        let ids: Vec<_> = dsp.regions().iter().filter_map(|region| region.id).collect();
        assert_eq!(ids, NecModel::Upd96050.storage());
        assert!(persisted.contains(StorageId::Nec96050DspRam));
        assert!(!persisted.contains(StorageId::Nec7725DspRam));
    }

    #[test]
    fn test_7725_by_default() {
        let (dsp, persisted) = configure(&descriptor(None));
        assert_eq!(dsp.model, NecModel::Upd7725);
        let ids: Vec<_> = dsp.regions().iter().filter_map(|region| region.id).collect();
        assert_eq!(ids, NecModel::Upd7725.storage());
        assert_eq!(persisted.len(), 1);
    }

    #[test]
    fn test_frequency_default() {
        let (dsp, _) = configure(&descriptor(None));
        assert_eq!(dsp.frequency, 8_000_000);
        let (dsp, _) = configure(&descriptor(None).attr("frequency", "7600000"));
        assert_eq!(dsp.frequency, 7_600_000);
    }

    #[test]
    fn test_tables_zero_filled() {
        let (dsp, _) = configure(&descriptor(None));
        assert_eq!(dsp.regions()[PROGRAM_ROM].size(), 49152);
        assert!(dsp.regions().iter().all(|region| region.data().iter().all(|&b| b == 0)));
    }

    #[test]
    fn test_ports() {
        let (mut dsp, _) = configure(&descriptor(None));
        assert_eq!(dsp.read(Port::Status, 0), 0x80);
        dsp.write(Port::Data, 0, 0x1F);
        assert_eq!(dsp.read(Port::Data, 0), 0x1F);
        dsp.write(Port::Memory(DATA_RAM), 0x1001, 0xAB);
        assert_eq!(dsp.read(Port::Memory(DATA_RAM), 1), 0xAB);
    }
}
