use parking_lot::Mutex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// State shared by everyone on the cable: how many parties are pulling
/// the line low, plus the coarse back-end's latched frame.
struct WireState {
    pulls: u32,
    coarse_seq: u32,
    coarse_data: u8,
    coarse_parity: u8,
}

/// The ComLynx cable. Wired-OR: any party pulling wins and the line
/// reads low; with nobody pulling it floats high. Cloning the handle
/// connects another party to the same wire.
pub struct ComlynxWire {
    state: Arc<Mutex<WireState>>,
}

impl ComlynxWire {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(WireState {
                pulls: 0,
                coarse_seq: 0,
                coarse_data: 0,
                coarse_parity: 0,
            })),
        }
    }

    /// True while the line floats high.
    #[must_use]
    pub fn is_high(&self) -> bool {
        self.state.lock().pulls == 0
    }

    pub fn pull_down(&self) {
        self.state.lock().pulls += 1;
    }

    pub fn release(&self) {
        let mut s = self.state.lock();
        debug_assert!(s.pulls > 0, "release without a matching pull");
        s.pulls = s.pulls.saturating_sub(1);
    }

    /// Latches a whole byte-plus-parity frame for coarse receivers and
    /// bumps the sequence number they watch.
    pub fn publish_coarse(&self, data: u8, parity: u8) {
        let mut s = self.state.lock();
        s.coarse_seq = s.coarse_seq.wrapping_add(1);
        s.coarse_data = data;
        s.coarse_parity = parity;
    }

    /// (sequence, data, parity) of the last published frame.
    #[must_use]
    pub fn coarse(&self) -> (u32, u8, u8) {
        let s = self.state.lock();
        (s.coarse_seq, s.coarse_data, s.coarse_parity)
    }

    #[must_use]
    pub fn coarse_seq(&self) -> u32 {
        self.state.lock().coarse_seq
    }
}

impl Default for ComlynxWire {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ComlynxWire {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

// A wire deserializes to a fresh, unshared cable at the recorded level;
// peers reattach themselves after restore.

impl Serialize for ComlynxWire {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(!self.is_high()))
    }
}

struct WireVisitor;

impl Visitor<'_> for WireVisitor {
    type Value = ComlynxWire;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a wire level byte")
    }

    fn visit_u8<E: de::Error>(self, value: u8) -> Result<Self::Value, E> {
        let wire = ComlynxWire::new();
        if value != 0 {
            wire.pull_down();
        }
        Ok(wire)
    }
}

impl<'de> Deserialize<'de> for ComlynxWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_u8(WireVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wired_or_dominance() {
        let wire = ComlynxWire::new();
        let peer = wire.clone();
        assert!(wire.is_high());

        wire.pull_down();
        assert!(!peer.is_high());
        peer.pull_down();
        wire.release();
        // Peer still holds it low.
        assert!(!wire.is_high());
        peer.release();
        assert!(wire.is_high());
    }

    #[test]
    fn coarse_frames_are_sequenced() {
        let wire = ComlynxWire::new();
        let seq0 = wire.coarse_seq();
        wire.publish_coarse(0x5A, 1);
        let (seq, data, parity) = wire.coarse();
        assert_ne!(seq, seq0);
        assert_eq!(data, 0x5A);
        assert_eq!(parity, 1);
    }
}
