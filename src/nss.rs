use std::any::Any;

use crate::{
    chip::{ChipKind, Coprocessor, Port},
    interface::Host,
    markup::Node,
    memory::{MemoryRegion, SENTINEL},
};

/// Arcade DIP switch bank. The setting comes from the host, which may ask
/// the user; the CPU reads it back through the io window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nss {
    pub dip: u32,
}

impl Nss {
    pub fn configure(root: &Node, host: &mut dyn Host) -> Self {
        Nss {
            dip: host.dip_settings(root),
        }
    }
}

impl Coprocessor for Nss {
    fn kind(&self) -> ChipKind {
        ChipKind::Nss
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn regions(&self) -> &[MemoryRegion] {
        &[]
    }

    fn regions_mut(&mut self) -> &mut [MemoryRegion] {
        &mut []
    }

    fn read(&self, port: Port, _address: u32) -> u8 {
        match port {
            Port::Io => self.dip as u8,
            _ => SENTINEL,
        }
    }

    fn write(&mut self, _port: Port, _address: u32, _data: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::StorageId;

    struct Switches(u32);

    impl Host for Switches {
        fn load_request(
            &mut self,
            _id: StorageId,
            _name: &str,
            _tag: Option<&str>,
        ) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        fn dip_settings(&mut self, node: &Node) -> u32 {
            assert_eq!(node.name, "nss");
            self.0
        }
    }

    #[test]
    fn test_dip_from_host() {
        let mut nss = Nss::configure(&Node::new("nss"), &mut Switches(0x1A5));
        assert_eq!(nss.dip, 0x1A5);
        assert_eq!(nss.read(Port::Io, 0x4100), 0xA5);
        nss.write(Port::Io, 0x4100, 0);
        assert_eq!(nss.read(Port::Io, 0x4100), 0xA5);
    }
}
