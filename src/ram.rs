use crate::consts::MMC_ADDR;
use serde::{Deserialize, Serialize};

pub const RAM_LEN: usize = 0x1_0000;

/// 64 KiB of system DRAM. Timing lives on the bus; this is just storage.
#[derive(Clone, Serialize, Deserialize)]
pub struct Ram {
    #[serde(with = "serde_bytes_vec")]
    data: Vec<u8>,
}

impl Ram {
    #[must_use]
    pub fn new() -> Self {
        let mut r = Self {
            data: vec![0xFF; RAM_LEN],
        };
        // MAPCTL powers up with every overlay enabled.
        r.data[MMC_ADDR as usize] = 0;
        r
    }

    #[inline]
    #[must_use]
    pub fn get(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    #[inline]
    pub fn set(&mut self, addr: u16, value: u8) {
        self.data[addr as usize] = value;
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    pub fn copy(&mut self, dest: u16, buf: &[u8]) {
        let d = dest as usize;
        assert!(d + buf.len() <= RAM_LEN);
        self.data[d..d + buf.len()].copy_from_slice(buf);
    }

    #[inline]
    #[must_use]
    pub fn mapctl(&self) -> u8 {
        self.data[MMC_ADDR as usize]
    }

    pub fn set_mapctl(&mut self, value: u8) {
        self.data[MMC_ADDR as usize] = value;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_bytes(data)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(de)?;
        Ok(bytes.to_vec())
    }
}
