use crate::consts::ROM_ADDR;
use serde::{Deserialize, Serialize};

pub const ROM_LEN: usize = 0x200;

/// The 512-byte boot ROM page at FE00. The last six bytes double as the
/// power-on vectors and MAPCTL image consumed at initialization.
#[derive(Clone, Serialize, Deserialize)]
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    #[must_use]
    pub fn new() -> Self {
        let mut data = vec![0xFF; ROM_LEN];
        // With no boot image loaded: every overlay enabled, reset into the
        // kernel entry at FF80 (an RTI-shaped stub is all that lives there).
        data[0x1F9] = 0;
        data[0x1FC] = 0x80;
        data[0x1FD] = 0xFF;
        Self { data }
    }

    /// Loads a boot ROM image.
    ///
    /// # Errors
    ///
    /// Returns an error unless the image is exactly 512 bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, &'static str> {
        if data.len() != ROM_LEN {
            return Err("Boot ROM must be 512 bytes.");
        }
        Ok(Self {
            data: data.to_vec(),
        })
    }

    #[inline]
    #[must_use]
    pub fn get(&self, addr: u16) -> u8 {
        self.data[(addr - ROM_ADDR) as usize]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Rom {
    fn default() -> Self {
        Self::new()
    }
}
