#![allow(dead_code)]

use std::{collections::HashMap, rc::Rc};

use cartboard::{Board, CpuBus, FloatingBus, Host, Node, StorageId};

/// Host that serves canned images and remembers every request.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub images: HashMap<StorageId, Vec<u8>>,
    pub requests: Vec<(StorageId, String, Option<String>)>,
    pub dip: u32,
}

impl RecordingHost {
    pub fn with_image(mut self, id: StorageId, image: Vec<u8>) -> Self {
        self.images.insert(id, image);
        self
    }

    pub fn requested(&self, id: StorageId) -> bool {
        self.requests.iter().any(|(request, _, _)| *request == id)
    }
}

impl Host for RecordingHost {
    fn load_request(
        &mut self,
        id: StorageId,
        name: &str,
        tag: Option<&str>,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        self.requests
            .push((id, name.to_string(), tag.map(str::to_string)));
        Ok(self.images.get(&id).cloned())
    }

    fn dip_settings(&mut self, _node: &Node) -> u32 {
        self.dip
    }
}

pub fn cpu() -> Rc<dyn CpuBus> {
    Rc::new(FloatingBus::default())
}

pub fn map(id: &str, address: &str) -> Node {
    Node::new("map").attr("id", id).attr("address", address)
}

pub fn memory(kind: &str, name: &str, size: &str) -> Node {
    Node::new(kind).attr("name", name).attr("size", size)
}

/// A plain board with a 32 KiB ROM and 2 KiB of battery RAM.
pub fn lorom() -> Node {
    Node::new("board")
        .child(memory("rom", "program.rom", "0x8000"))
        .child(memory("ram", "save.ram", "0x800"))
        .child(map("rom", "00-7d,80-ff:8000-ffff").attr("mask", "0x7fff"))
        .child(map("ram", "70-7d,f0-ff:0000-7fff").attr("mask", "0x7ff"))
}

pub fn configure(root: &Node, host: &mut RecordingHost) -> Board {
    let mut board = Board::new(cpu());
    board.configure(root, host, cpu());
    board
}
