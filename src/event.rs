//! Competition event boards: up to four game ROMs behind a bank latch, a
//! battery RAM, a countdown timer and optional network reporting.

use std::any::Any;

use serde::Serialize;
use time::Duration;
use tracing::debug;

use crate::{
    chip::{read_mirrored, write_mirrored, ChipKind, Coprocessor, Port},
    interface::StorageId,
    markup::Node,
    memory::{Allocator, MemoryRegion, SENTINEL},
    utils::{decimal, numeral, split_once_parts},
};

pub const ROM_BANKS: usize = 4;
/// Region index of the battery RAM, after the ROM banks.
pub const RAM: usize = ROM_BANKS;

const DEFAULT_PORT: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventBoard {
    CampusChallenge92,
    Powerfest94,
}

impl EventBoard {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Powerfest '94" => EventBoard::Powerfest94,
            _ => EventBoard::CampusChallenge92,
        }
    }
}

/// Score-reporting endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Server {
    pub host: String,
    pub port: u32,
    pub path: String,
    pub username: String,
    pub password: String,
}

impl Server {
    /// Reads a `server` node. The address is `[http://]host[:port][/path]`;
    /// a missing or zero port means 80.
    pub fn parse(node: &Node) -> Self {
        let address = node["address"].text();
        let address = address.strip_prefix("http://").unwrap_or(address);

        let location = split_once_parts(address, "/");
        let path = format!("/{}", location.get(1).copied().unwrap_or_default());

        let authority = split_once_parts(location[0], ":");
        let port = match authority.get(1).map(|port| decimal(port)) {
            Some(port) if port != 0 => port,
            _ => DEFAULT_PORT,
        };

        Server {
            host: authority[0].to_string(),
            port,
            path,
            username: node["username"].text().to_string(),
            password: node["password"].text().to_string(),
        }
    }
}

/// `"seconds"` or `"minutes:seconds"`; parts that are not numbers count as 0.
pub fn parse_timer(text: &str) -> Duration {
    let seconds = match split_once_parts(text, ":")[..] {
        [minutes, seconds] => i64::from(decimal(minutes)) * 60 + i64::from(decimal(seconds)),
        [seconds] => i64::from(decimal(seconds)),
        _ => 0,
    };
    Duration::seconds(seconds)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub board: EventBoard,
    pub revision: u8,
    pub timer: Duration,
    pub server: Server,
    regions: Vec<MemoryRegion>,
    select: u8,
}

impl Event {
    pub fn configure(root: &Node, allocator: &mut Allocator<'_>) -> Self {
        let mut regions = vec![MemoryRegion::default(); ROM_BANKS + 1];

        for node in root.children_named("rom") {
            let bank = numeral(node["id"].text()) as usize;
            let Some(id) = StorageId::event_rom(bank) else {
                debug!("Ignoring event ROM bank {}", bank);
                continue;
            };
            regions[bank] = allocator.allocate(node, id, false);
        }
        regions[RAM] = allocator.allocate(&root["ram"], StorageId::EventRam, true);

        Event {
            board: EventBoard::from_name(root["name"].text()),
            revision: if root["revision"].text() == "B" { 2 } else { 1 },
            timer: parse_timer(root["timer"].text()),
            server: Server::parse(&root["server"]),
            regions,
            select: 0,
        }
    }

    pub fn timer_seconds(&self) -> i64 {
        self.timer.whole_seconds()
    }

    /// Bank currently answering the ROM window. Unpopulated banks fall back
    /// to the menu ROM in bank 0.
    fn rom_bank(&self) -> &MemoryRegion {
        let bank = &self.regions[usize::from(self.select) % ROM_BANKS];
        if bank.is_empty() {
            &self.regions[0]
        } else {
            bank
        }
    }
}

impl Coprocessor for Event {
    fn kind(&self) -> ChipKind {
        ChipKind::Event
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
            Port::Rom => read_mirrored(self.rom_bank(), address),
            Port::Memory(RAM) => read_mirrored(&self.regions[RAM], address),
            Port::Status => self.select,
            _ => SENTINEL,
        }
    }

    fn write(&mut self, port: Port, address: u32, data: u8) {
        match port {
            Port::Memory(RAM) => write_mirrored(&mut self.regions[RAM], address, data),
            Port::Data => self.select = data,
            _ => {}
        }
    }
}
