use std::{fmt, ops::RangeInclusive};

use serde::Serialize;
use tracing::warn;

use crate::{
    chip::{ChipKind, Port},
    markup::Node,
    slot::{SlotId, SlotMemory},
    utils::numeral,
};

/// Non-owning handle to a region owned by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegionRef {
    Rom,
    Ram,
    SatelliteFlash,
    Slot(SlotId, SlotMemory),
    Chip(ChipKind, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Reader {
    Region(RegionRef),
    Chip(ChipKind, Port),
    /// Whatever the CPU last drove on the data bus.
    OpenBus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Writer {
    Region(RegionRef),
    Chip(ChipKind, Port),
    Sink,
}

/// Parsed form of an address pattern such as `00-3f,80-bf:8000-ffff`.
/// Both halves are comma-separated lists of hex values or ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPattern {
    banks: Vec<RangeInclusive<u32>>,
    offsets: Vec<RangeInclusive<u32>>,
}

impl AddressPattern {
    pub fn parse(text: &str) -> Option<Self> {
        let (banks, offsets) = match text.split_once(':') {
            Some((banks, offsets)) => (parse_list(banks, 0xFF)?, parse_list(offsets, 0xFFFF)?),
            None => (parse_list(text, 0xFF)?, vec![0x0000..=0xFFFF]),
        };
        Some(AddressPattern { banks, offsets })
    }

    pub fn contains(&self, address: u32) -> bool {
        let bank = (address >> 16) & 0xFF;
        let offset = address & 0xFFFF;
        self.offsets.iter().any(|range| range.contains(&offset))
            && self.banks.iter().any(|range| range.contains(&bank))
    }
}

fn parse_list(text: &str, limit: u32) -> Option<Vec<RangeInclusive<u32>>> {
    text.split(',')
        .map(|item| parse_range(item).filter(|range| *range.end() <= limit))
        .collect()
}

fn parse_range(text: &str) -> Option<RangeInclusive<u32>> {
    let hex = |s: &str| u32::from_str_radix(s.trim(), 16).ok();
    match text.split_once('-') {
        Some((lo, hi)) => {
            let (lo, hi) = (hex(lo)?, hex(hi)?);
            (lo <= hi).then_some(lo..=hi)
        }
        None => {
            let value = hex(text)?;
            Some(value..=value)
        }
    }
}

/// One entry of the mapping table.
#[derive(Clone, PartialEq, Serialize)]
pub struct Binding {
    pub address: String,
    pub size: u32,
    pub base: u32,
    pub mask: u32,
    pub reader: Reader,
    pub writer: Writer,
    #[serde(skip)]
    pattern: Option<AddressPattern>,
}

impl Binding {
    /// Builds a binding from a `map` node. A missing or unparseable `size`
    /// stays 0; callers substitute the target's size where that applies.
    pub fn parse(node: &Node, reader: Reader, writer: Writer) -> Self {
        let address = node["address"].text().to_string();
        let pattern = AddressPattern::parse(&address);
        if pattern.is_none() {
            warn!("Unparseable address pattern {:?}, binding claims nothing", address);
        }

        Binding {
            size: numeral(node["size"].text()),
            base: numeral(node["base"].text()),
            mask: numeral(node["mask"].text()),
            address,
            reader,
            writer,
            pattern,
        }
    }

    pub fn with_fallback_size(mut self, size: usize) -> Self {
        if self.size == 0 {
            self.size = size as u32;
        }
        self
    }

    /// Offset inside the target for `address`, or `None` when this binding
    /// does not claim it. A zero mask means unmasked, a zero size unbounded.
    pub fn translate(&self, address: u32) -> Option<u32> {
        if !self.pattern.as_ref()?.contains(address) {
            return None;
        }
        let mask = if self.mask == 0 { u32::MAX } else { self.mask };
        let offset = address.checked_sub(self.base)? & mask;
        (self.size == 0 || offset < self.size).then_some(offset)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("address", &self.address)
            .field("size", &format_args!("{:#X}", self.size))
            .field("base", &format_args!("{:#X}", self.base))
            .field("mask", &format_args!("{:#X}", self.mask))
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .finish()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} size={:#08X} base={:#08X} mask={:#08X} -> {:?} / {:?}",
            self.address, self.size, self.base, self.mask, self.reader, self.writer
        )
    }
}

/// Ordered decode table. Earlier bindings shadow later overlapping ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MappingTable {
    bindings: Vec<Binding>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }

    /// First binding claiming `address`, with the translated offset.
    pub fn resolve(&self, address: u32) -> Option<(&Binding, u32)> {
        self.bindings
            .iter()
            .find_map(|binding| binding.translate(address).map(|offset| (binding, offset)))
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(address: &str) -> Node {
        Node::new("map").attr("id", "rom").attr("address", address)
    }

    fn rom_binding(node: &Node) -> Binding {
        Binding::parse(
            node,
            Reader::Region(RegionRef::Rom),
            Writer::Region(RegionRef::Rom),
        )
    }

    #[test]
    fn test_pattern_parse() {
        let pattern = AddressPattern::parse("00-3f,80-bf:8000-ffff").unwrap();
        assert!(pattern.contains(0x008000));
        assert!(pattern.contains(0x3FFFFF));
        assert!(pattern.contains(0x80ABCD));
        assert!(!pattern.contains(0x007FFF));
        assert!(!pattern.contains(0x408000));

        let banks_only = AddressPattern::parse("70-7d").unwrap();
        assert!(banks_only.contains(0x700000));
        assert!(banks_only.contains(0x7DFFFF));

        let single = AddressPattern::parse("00:2180").unwrap();
        assert!(single.contains(0x002180));
        assert!(!single.contains(0x002181));

        let windows = AddressPattern::parse("00-3f,80-bf:6c00-6fff,7c00-7fff").unwrap();
        assert!(windows.contains(0x006C00));
        assert!(windows.contains(0xBF7FFF));
        assert!(!windows.contains(0x007000));
    }

    #[test]
    fn test_pattern_rejects_garbage() {
        assert_eq!(AddressPattern::parse(""), None);
        assert_eq!(AddressPattern::parse("zz:8000-ffff"), None);
        assert_eq!(AddressPattern::parse("3f-00:0000"), None);
        assert_eq!(AddressPattern::parse("100:0000"), None);
        assert_eq!(AddressPattern::parse("00:8000-10000"), None);
        assert_eq!(AddressPattern::parse("00:8000,"), None);
    }

    #[test]
    fn test_parse_reads_numbers() {
        let node = map("00-3f:8000-ffff")
            .attr("size", "0x8000")
            .attr("base", "0x8000")
            .attr("mask", "junk");
        let binding = rom_binding(&node);
        assert_eq!(binding.address, "00-3f:8000-ffff");
        assert_eq!(binding.size, 0x8000);
        assert_eq!(binding.base, 0x8000);
        assert_eq!(binding.mask, 0);
    }

    #[test]
    fn test_fallback_only_when_unsized() {
        let unsized_binding = rom_binding(&map("00:0000")).with_fallback_size(0x400);
        assert_eq!(unsized_binding.size, 0x400);

        let sized = rom_binding(&map("00:0000").attr("size", "0x10")).with_fallback_size(0x400);
        assert_eq!(sized.size, 0x10);
    }

    #[test]
    fn test_mirroring_translation() {
        // 0x8000 bytes at $00-3f:8000-ffff, mirrored every bank
        let node = map("00-3f:8000-ffff")
            .attr("base", "0x8000")
            .attr("mask", "0x7fff")
            .attr("size", "0x8000");
        let binding = rom_binding(&node);
        assert_eq!(binding.translate(0x008000), Some(0x0000));
        assert_eq!(binding.translate(0x00FFFF), Some(0x7FFF));
        assert_eq!(binding.translate(0x018123), Some(0x0123));
        assert_eq!(binding.translate(0x007FFF), None);
    }

    #[test]
    fn test_size_bounds_claim() {
        let node = map("40-7d").attr("base", "0x400000").attr("size", "0x100");
        let binding = rom_binding(&node);
        assert_eq!(binding.translate(0x4000FF), Some(0xFF));
        assert_eq!(binding.translate(0x400100), None);
    }

    #[test]
    fn test_first_match_wins() {
        let mut table = MappingTable::new();
        table.append(rom_binding(&map("00:8000-ffff")));
        table.append(Binding::parse(
            &map("00:0000-ffff"),
            Reader::Region(RegionRef::Ram),
            Writer::Region(RegionRef::Ram),
        ));

        let (binding, _) = table.resolve(0x009000).unwrap();
        assert_eq!(binding.reader, Reader::Region(RegionRef::Rom));
        let (binding, offset) = table.resolve(0x001000).unwrap();
        assert_eq!(binding.reader, Reader::Region(RegionRef::Ram));
        assert_eq!(offset, 0x1000);
        assert!(table.resolve(0x010000).is_none());
    }
}
