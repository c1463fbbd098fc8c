use serde::{Deserialize, Serialize};

pub const LNX_HEADER_LEN: usize = 64;

/// Screen rotation a cartridge requests from the host.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Left,
    Right,
}

/// The 64-byte "LYNX" container header: magic, per-bank page sizes,
/// version, title, manufacturer, rotation and a spare block whose
/// second byte encodes the EEPROM type.
#[derive(Clone, Serialize, Deserialize)]
pub struct LnxHeader {
    bank0_page_size: u16,
    bank1_page_size: u16,
    version: u16,
    title: String,
    manufacturer: String,
    rotation: Rotation,
    eeprom: u8,
}

impl LnxHeader {
    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() <= LNX_HEADER_LEN || &data[0..4] != b"LYNX" {
            return None;
        }
        let word = |i: usize| u16::from(data[i]) | (u16::from(data[i + 1]) << 8);
        let text = |range: core::ops::Range<usize>| {
            let bytes: Vec<u8> = data[range]
                .iter()
                .copied()
                .take_while(|b| *b != 0)
                .collect();
            String::from_utf8_lossy(&bytes).into_owned()
        };
        Some(Self {
            bank0_page_size: word(4),
            bank1_page_size: word(6),
            version: word(8),
            title: text(10..42),
            manufacturer: text(42..58),
            rotation: match data[58] {
                1 => Rotation::Left,
                2 => Rotation::Right,
                _ => Rotation::None,
            },
            eeprom: data[60],
        })
    }

    #[must_use]
    pub fn bank0_page_size(&self) -> u16 {
        self.bank0_page_size
    }

    #[must_use]
    pub fn bank1_page_size(&self) -> u16 {
        self.bank1_page_size
    }

    #[must_use]
    pub fn version(&self) -> u16 {
        self.version
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub fn eeprom(&self) -> u8 {
        self.eeprom
    }
}

impl Default for LnxHeader {
    fn default() -> Self {
        Self {
            bank0_page_size: 0,
            bank1_page_size: 0,
            version: 0,
            title: "unknown".to_string(),
            manufacturer: "unknown".to_string(),
            rotation: Rotation::None,
            eeprom: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        let mut h = vec![0u8; LNX_HEADER_LEN + 1];
        h[0..4].copy_from_slice(b"LYNX");
        h[4] = 0x00;
        h[5] = 0x04; // bank 0: 1024-byte pages
        h[6] = 0x00;
        h[7] = 0x00;
        h[8] = 1;
        h[10..19].copy_from_slice(b"Test Cart");
        h[42..46].copy_from_slice(b"Nobo");
        h[58] = 2;
        h[60] = 0x01;
        h
    }

    #[test]
    fn parses_all_fields() {
        let h = LnxHeader::parse(&header_bytes()).unwrap();
        assert_eq!(h.bank0_page_size(), 1024);
        assert_eq!(h.bank1_page_size(), 0);
        assert_eq!(h.version(), 1);
        assert_eq!(h.title(), "Test Cart");
        assert_eq!(h.manufacturer(), "Nobo");
        assert_eq!(h.rotation(), Rotation::Right);
        assert_eq!(h.eeprom(), 0x01);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut h = header_bytes();
        h[0] = b'C';
        assert!(LnxHeader::parse(&h).is_none());
    }
}
