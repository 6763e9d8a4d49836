use std::collections::BTreeMap;
use std::fmt;

use crate::error::PreconditionError;

/// Core architecture of a chip, which decides how the backend programs it
/// and where program memory ends inside a HEX image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    /// 12-bit baseline core (PIC10F, PIC12F5xx)
    Baseline,

    /// 14-bit mid-range core (PIC12F6xx, PIC16F)
    Midrange,

    /// 14-bit enhanced mid-range core (PIC12F1xxx, PIC16F1xxx)
    EnhancedMidrange,

    /// 16-bit PIC18 core
    Pic18,
}

impl ProtocolVariant {
    /// Program word width in bits
    pub fn word_bits(&self) -> u8 {
        match self {
            ProtocolVariant::Baseline => 12,
            ProtocolVariant::Midrange | ProtocolVariant::EnhancedMidrange => 14,
            ProtocolVariant::Pic18 => 16,
        }
    }

    /// First byte address in a HEX image that no longer belongs to program
    /// memory (configuration words, user IDs, EEPROM data)
    pub fn config_byte_address(&self) -> u32 {
        match self {
            ProtocolVariant::Baseline => 0x1FFE,
            ProtocolVariant::Midrange => 0x4000,
            ProtocolVariant::EnhancedMidrange => 0x1_0000,
            ProtocolVariant::Pic18 => 0x20_0000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChipFamily {
    Pic10F,
    Pic12C,
    Pic12F,
    Pic16C,
    Pic16F,
    Pic18F,
    Pic24,
    DsPic,
    Other,
}

impl ChipFamily {
    /// Derive the family from a bare part number such as `16F628A`
    pub fn from_part_number(part: &str) -> ChipFamily {
        let part = part.to_ascii_uppercase();

        if part.starts_with("10F") {
            ChipFamily::Pic10F
        } else if let Some(rest) = part.strip_prefix("12") {
            if rest.contains('C') {
                ChipFamily::Pic12C
            } else {
                ChipFamily::Pic12F
            }
        } else if let Some(rest) = part.strip_prefix("16") {
            if rest.contains('C') {
                ChipFamily::Pic16C
            } else {
                ChipFamily::Pic16F
            }
        } else if part.starts_with("18") {
            ChipFamily::Pic18F
        } else if part.starts_with("30F") || part.starts_with("33F") {
            ChipFamily::DsPic
        } else if part.starts_with("24") {
            ChipFamily::Pic24
        } else {
            ChipFamily::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChipFamily::Pic10F => "PIC10F",
            ChipFamily::Pic12C => "PIC12C",
            ChipFamily::Pic12F => "PIC12F",
            ChipFamily::Pic16C => "PIC16C",
            ChipFamily::Pic16F => "PIC16F",
            ChipFamily::Pic18F => "PIC18F",
            ChipFamily::Pic24 => "PIC24",
            ChipFamily::DsPic => "dsPIC",
            ChipFamily::Other => "Other",
        }
    }

    pub fn from_name(name: &str) -> Option<ChipFamily> {
        let families = [
            ChipFamily::Pic10F,
            ChipFamily::Pic12C,
            ChipFamily::Pic12F,
            ChipFamily::Pic16C,
            ChipFamily::Pic16F,
            ChipFamily::Pic18F,
            ChipFamily::Pic24,
            ChipFamily::DsPic,
            ChipFamily::Other,
        ];
        families
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Static description of one supported microcontroller
#[derive(Debug, PartialEq, Eq)]
pub struct ChipDescriptor {
    /// Part number without the `PIC` prefix, as the backend expects it
    pub part_number: &'static str,

    /// Program memory size in words
    pub program_words: u32,

    /// Data EEPROM size in bytes
    pub eeprom_bytes: u16,

    pub protocol: ProtocolVariant,
}

impl ChipDescriptor {
    pub fn family(&self) -> ChipFamily {
        ChipFamily::from_part_number(self.part_number)
    }

    pub fn word_bits(&self) -> u8 {
        self.protocol.word_bits()
    }

    /// Display name with the `PIC` prefix
    pub fn display_name(&self) -> String {
        format!("PIC{}", self.part_number)
    }
}

const fn chip(
    part_number: &'static str,
    program_words: u32,
    eeprom_bytes: u16,
    protocol: ProtocolVariant,
) -> ChipDescriptor {
    ChipDescriptor {
        part_number,
        program_words,
        eeprom_bytes,
        protocol,
    }
}

use ProtocolVariant::{Baseline, EnhancedMidrange, Midrange, Pic18};

/// Chips known to work with K150 compatible programmers, sorted by part number
static CHIPS: &[ChipDescriptor] = &[
    chip("10F200", 256, 0, Baseline),
    chip("10F202", 512, 0, Baseline),
    chip("10F204", 256, 0, Baseline),
    chip("10F206", 512, 0, Baseline),
    chip("10F220", 256, 0, Baseline),
    chip("10F222", 512, 0, Baseline),
    chip("12C508A", 512, 0, Baseline),
    chip("12F1501", 1024, 0, EnhancedMidrange),
    chip("12F1822", 2048, 256, EnhancedMidrange),
    chip("12F1840", 4096, 256, EnhancedMidrange),
    chip("12F508", 512, 0, Baseline),
    chip("12F509", 1024, 0, Baseline),
    chip("12F629", 1024, 128, Midrange),
    chip("12F635", 1024, 128, Midrange),
    chip("12F675", 1024, 128, Midrange),
    chip("12F683", 2048, 256, Midrange),
    chip("16C84", 1024, 64, Midrange),
    chip("16F1827", 4096, 256, EnhancedMidrange),
    chip("16F1847", 8192, 256, EnhancedMidrange),
    chip("16F1936", 8192, 256, EnhancedMidrange),
    chip("16F1937", 8192, 256, EnhancedMidrange),
    chip("16F628", 2048, 128, Midrange),
    chip("16F628A", 2048, 128, Midrange),
    chip("16F648A", 4096, 256, Midrange),
    chip("16F676", 1024, 128, Midrange),
    chip("16F690", 4096, 256, Midrange),
    chip("16F716", 2048, 0, Midrange),
    chip("16F73", 4096, 0, Midrange),
    chip("16F84", 1024, 64, Midrange),
    chip("16F84A", 1024, 64, Midrange),
    chip("16F876A", 8192, 256, Midrange),
    chip("16F877A", 8192, 256, Midrange),
    chip("16F88", 4096, 256, Midrange),
    chip("16F886", 8192, 256, Midrange),
    chip("16F887", 8192, 256, Midrange),
    chip("18F2550", 16384, 256, Pic18),
    chip("18F2580", 16384, 256, Pic18),
    chip("18F25K50", 16384, 256, Pic18),
    chip("18F26K80", 32768, 1024, Pic18),
    chip("18F4550", 16384, 256, Pic18),
    chip("18F4580", 16384, 256, Pic18),
    chip("18F45K50", 16384, 256, Pic18),
    chip("18F46K80", 32768, 1024, Pic18),
];

/// Commonly used chips, listed first in pickers
const POPULAR: &[&str] = &[
    "10F200", "10F202", "10F204", "10F206", "10F220", "10F222", "12F508", "12F509", "12F629",
    "12F635", "12F675", "12F683", "12F1501", "12F1822", "12F1840", "16F84A", "16F88", "16F628A",
    "16F648A", "16F877A", "16F887", "16F1827", "16F1847", "16F1936", "16F1937", "18F2550",
    "18F4550", "18F25K50", "18F45K50", "18F2580", "18F4580", "18F26K80", "18F46K80",
];

pub fn supported_chips() -> &'static [ChipDescriptor] {
    CHIPS
}

fn normalize(name: &str) -> &str {
    let name = name.trim();
    match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("PIC") => &name[3..],
        _ => name,
    }
}

/// Find a chip by part number. Matching ignores case and an optional
/// `PIC` prefix, so `pic16f628a` and `16F628A` name the same chip.
pub fn find_chip(name: &str) -> Option<&'static ChipDescriptor> {
    let part = normalize(name);
    CHIPS
        .iter()
        .find(|chip| chip.part_number.eq_ignore_ascii_case(part))
}

pub fn chip_for_name(name: &str) -> Result<&'static ChipDescriptor, PreconditionError> {
    find_chip(name).ok_or_else(|| PreconditionError::UnknownChip(name.to_string()))
}

pub fn chips_in_family(family: ChipFamily) -> impl Iterator<Item = &'static ChipDescriptor> {
    CHIPS.iter().filter(move |chip| chip.family() == family)
}

/// Substring search over part numbers, case-insensitive
pub fn search_chips(query: &str) -> Vec<&'static ChipDescriptor> {
    let query = normalize(query).to_ascii_uppercase();
    CHIPS
        .iter()
        .filter(|chip| chip.part_number.contains(query.as_str()))
        .collect()
}

pub fn family_counts() -> BTreeMap<ChipFamily, usize> {
    let mut counts = BTreeMap::new();
    for chip in CHIPS {
        *counts.entry(chip.family()).or_insert(0) += 1;
    }
    counts
}

pub fn popular_chips() -> Vec<&'static ChipDescriptor> {
    POPULAR.iter().filter_map(|name| find_chip(name)).collect()
}
