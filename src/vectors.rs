use crate::consts::{INTV_ADDR, NMIV_ADDR, RESV_ADDR};
use serde::{Deserialize, Serialize};

/// The six vector bytes at FFFA-FFFF. MAPCTL decides whether the CPU sees
/// these or the RAM underneath; the machine routes accordingly.
#[derive(Clone, Serialize, Deserialize)]
pub struct Vectors {
    data: [u8; 6],
}

impl Vectors {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: [0, 0, 0x80, 0xFF, 0, 0],
        }
    }

    pub fn load(&mut self, data: &[u8]) {
        self.data.copy_from_slice(&data[..6]);
    }

    #[inline]
    #[must_use]
    pub fn get(&self, addr: u16) -> u8 {
        self.data[(addr - NMIV_ADDR) as usize]
    }

    #[inline]
    pub fn set(&mut self, addr: u16, value: u8) {
        self.data[(addr - NMIV_ADDR) as usize] = value;
    }

    #[must_use]
    fn u16(&self, addr: u16) -> u16 {
        u16::from(self.get(addr)) | (u16::from(self.get(addr + 1)) << 8)
    }

    #[must_use]
    pub fn nmi(&self) -> u16 {
        self.u16(NMIV_ADDR)
    }

    #[must_use]
    pub fn reset(&self) -> u16 {
        self.u16(RESV_ADDR)
    }

    #[must_use]
    pub fn interrupt(&self) -> u16 {
        self.u16(INTV_ADDR)
    }
}

impl Default for Vectors {
    fn default() -> Self {
        Self::new()
    }
}
