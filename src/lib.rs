pub mod board;
pub mod bus;
pub mod chip;
pub mod error;
pub mod event;
pub mod hitachidsp;
pub mod icd2;
pub mod interface;
pub mod markup;
pub mod memory;
pub mod necdsp;
pub mod nss;
pub mod slot;
pub mod utils;

use std::rc::Rc;

use anyhow::anyhow;
use once_cell::sync::OnceCell;
use wasm_bindgen::prelude::*;

pub use board::{Board, Region};
pub use bus::{Binding, MappingTable, Reader, RegionRef, Writer};
pub use chip::{Capabilities, Capability, ChipKind, Coprocessor, Port};
pub use error::{BoardError, Result};
pub use interface::{CpuBus, FloatingBus, Host, LatchedBus, NullHost, StorageId};
pub use markup::Node;
pub use memory::{Access, MemoryRegion, PersistedMemory};
pub use utils::{hexdump, numeral};

static LOGGING: OnceCell<()> = OnceCell::new();

fn init_logging() {
    LOGGING.get_or_init(|| {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    });
}

/// Host backed by an optional JavaScript callback
/// `(id: string, name: string, tag?: string) => Uint8Array | undefined`.
struct JsHost {
    loader: Option<js_sys::Function>,
}

impl Host for JsHost {
    fn load_request(
        &mut self,
        id: StorageId,
        name: &str,
        tag: Option<&str>,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(loader) = &self.loader else {
            return Ok(None);
        };

        let tag = tag.map_or(JsValue::UNDEFINED, JsValue::from_str);
        let content = loader
            .call3(
                &JsValue::NULL,
                &JsValue::from_str(&format!("{:?}", id)),
                &JsValue::from_str(name),
                &tag,
            )
            .map_err(|err| anyhow!("loader threw for {}: {:?}", name, err))?;

        if content.is_undefined() || content.is_null() {
            return Ok(None);
        }
        Ok(Some(js_sys::Uint8Array::new(&content).to_vec()))
    }
}

#[wasm_bindgen(js_name = Board)]
pub struct JsBoard {
    board: Board,
    bus: Rc<LatchedBus>,
}

#[wasm_bindgen(js_class = Board)]
impl JsBoard {
    /// `descriptor` is the JSON form of a descriptor document.
    #[wasm_bindgen(constructor)]
    pub fn new(descriptor: &str, loader: Option<js_sys::Function>) -> std::result::Result<JsBoard, JsError> {
        init_logging();

        let document = Node::from_json(descriptor)?;
        let bus = Rc::new(LatchedBus::new(0xFF));
        let mut host = JsHost { loader };
        let board = Board::load(&document, &mut host, bus.clone());

        Ok(Self { board, bus })
    }

    pub fn read(&self, address: u32) -> u8 {
        self.board.read(address)
    }

    pub fn write(&mut self, address: u32, data: u8) {
        self.board.write(address, data);
    }

    /// Latches the value the CPU last drove on the data bus.
    #[wasm_bindgen(js_name = setMdr)]
    pub fn set_mdr(&mut self, value: u8) {
        self.bus.set(value);
    }

    #[wasm_bindgen(getter)]
    pub fn region(&self) -> String {
        format!("{:?}", self.board.region)
    }

    pub fn validate(&self) -> std::result::Result<(), JsError> {
        Ok(self.board.validate()?)
    }

    #[wasm_bindgen(js_name = hasChip)]
    pub fn has_chip(&self, tag: &str) -> bool {
        ChipKind::from_tag(tag).map_or(false, |kind| self.board.chip(kind).is_some())
    }

    pub fn bindings(&self) -> std::result::Result<String, JsError> {
        Ok(serde_json::to_string(self.board.mapping())?)
    }

    pub fn capabilities(&self) -> std::result::Result<String, JsError> {
        Ok(serde_json::to_string(self.board.capabilities())?)
    }

    pub fn persisted(&self) -> std::result::Result<String, JsError> {
        Ok(serde_json::to_string(self.board.persisted())?)
    }

    pub fn dump(&self, start: usize, end: usize) -> String {
        self.board.dump(RegionRef::Rom, start, end)
    }
}
