use std::fs;
use std::path::Path;

use ihex::{Reader, Record};

use crate::chips::ChipDescriptor;
use crate::error::{PicError, PicResult};

/// Whether a HEX image fits a chip's program memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    Fits { used_words: u32, capacity_words: u32 },
    TooLarge { used_words: u32, capacity_words: u32 },
}

impl SizeCheck {
    pub fn fits(&self) -> bool {
        matches!(self, SizeCheck::Fits { .. })
    }
}

/// Highest program word touched by the image, counting only data below the
/// chip's configuration area. Program words occupy two bytes in a HEX file.
pub fn program_words_used(hex_content: &str, chip: &ChipDescriptor) -> PicResult<u32> {
    let limit = chip.protocol.config_byte_address();
    let mut base: u32 = 0;
    let mut end_byte: u32 = 0;

    for record in Reader::new(hex_content) {
        let record = record.map_err(|e| {
            PicError::FirmwareError(format!("Failed parsing record in hex file {:?}", e))
        })?;
        match record {
            Record::ExtendedLinearAddress(upper) => base = u32::from(upper) << 16,
            Record::ExtendedSegmentAddress(segment) => base = u32::from(segment) << 4,
            Record::Data { offset, value } => {
                let start = base + u32::from(offset);
                if start < limit && !value.is_empty() {
                    let end = (start + value.len() as u32).min(limit);
                    end_byte = end_byte.max(end);
                }
            }
            _ => {}
        }
    }

    Ok(end_byte.div_ceil(2))
}

pub fn check_hex_size(content: &str, chip: &ChipDescriptor) -> PicResult<SizeCheck> {
    let used_words = program_words_used(content, chip)?;
    let capacity_words = chip.program_words;
    Ok(if used_words > capacity_words {
        SizeCheck::TooLarge {
            used_words,
            capacity_words,
        }
    } else {
        SizeCheck::Fits {
            used_words,
            capacity_words,
        }
    })
}

pub fn check_hex_file(path: &Path, chip: &ChipDescriptor) -> PicResult<SizeCheck> {
    let content = fs::read_to_string(path)
        .map_err(|e| PicError::FirmwareError(format!("Failed to read file: {}", e)))?;
    check_hex_size(&content, chip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::find_chip;

    const MIDRANGE_IMAGE: &str = "\
:080000008316860183128601BC
:100FF00000000000000000000000000000000000F1
:02400E004A3F27
:024200000102B9
:00000001FF
";

    #[test]
    fn config_and_eeprom_are_not_program_memory() {
        let chip = find_chip("16F628A").unwrap();
        assert_eq!(program_words_used(MIDRANGE_IMAGE, chip).unwrap(), 2048);
        assert_eq!(
            check_hex_size(MIDRANGE_IMAGE, chip).unwrap(),
            SizeCheck::Fits {
                used_words: 2048,
                capacity_words: 2048
            }
        );
    }

    #[test]
    fn image_too_large_for_small_chip() {
        let chip = find_chip("12F675").unwrap();
        let check = check_hex_size(MIDRANGE_IMAGE, chip).unwrap();
        assert!(!check.fits());
    }

    #[test]
    fn extended_addresses_are_followed() {
        let image = "\
:020000040000FA
:107FF000FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF91
:020000040030CA
:080000008316860183128601BC
:00000001FF
";
        let enhanced = find_chip("16F1827").unwrap();
        assert_eq!(program_words_used(image, enhanced).unwrap(), 0x4000);

        // 0x300000 is PIC18 configuration space
        let pic18 = find_chip("18F4550").unwrap();
        assert!(check_hex_size(image, pic18).unwrap().fits());
    }

    #[test]
    fn malformed_record_is_firmware_error() {
        let chip = find_chip("16F84A").unwrap();
        let err = program_words_used(":0800000083168601831286\n", chip).unwrap_err();
        assert!(matches!(err, PicError::FirmwareError(_)));
    }
}
