use super::wire::ComlynxWire;
use super::{
    RX_BREAK_BITS, SERCTL_R_FRAMERR, SERCTL_R_OVERRUN, SERCTL_R_PARBIT, SERCTL_R_PARERR,
    SERCTL_R_RXBRK, SERCTL_R_RXRDY, SERCTL_R_TXEMPTY, SERCTL_R_TXRDY, SERCTL_W_PAREN,
    SERCTL_W_PAREVEN, SERCTL_W_RESETERR, SERCTL_W_RXINTEN, SERCTL_W_TXBRK, SERCTL_W_TXINTEN,
};
use log::trace;
use serde::{Deserialize, Serialize};

/// Coarse transmitter: holds the line low for the byte's duration and
/// publishes the whole frame on the wire object at the stop edge. Two
/// transitions per byte instead of ten.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tx {
    data: Option<u8>,
    shifter: u8,
    counter: u8,
    pulling: bool,
    par_en: bool,
    par_bit: u8,
    tx_brk: bool,
    int_en: bool,
}

impl Tx {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: None,
            shifter: 0,
            counter: 0,
            pulling: false,
            par_en: false,
            par_bit: 0,
            tx_brk: false,
            int_en: false,
        }
    }

    pub fn set_ctrl(&mut self, ctrl: u8) {
        self.int_en = ctrl & SERCTL_W_TXINTEN != 0;
        self.par_en = ctrl & SERCTL_W_PAREN != 0;
        self.par_bit = u8::from(ctrl & SERCTL_W_PAREVEN != 0);
        self.tx_brk = ctrl & SERCTL_W_TXBRK != 0;
    }

    pub fn set_data(&mut self, data: u8) {
        self.data = Some(data);
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        let mut s = 0;
        if self.data.is_none() {
            s |= SERCTL_R_TXRDY;
        }
        if self.counter == 0 {
            s |= SERCTL_R_TXEMPTY;
        }
        s
    }

    #[must_use]
    pub fn interrupt(&self) -> bool {
        self.int_en && self.data.is_none()
    }

    fn pull(&mut self, wire: &ComlynxWire, low: bool) {
        if low != self.pulling {
            self.pulling = low;
            if low {
                wire.pull_down();
            } else {
                wire.release();
            }
        }
    }

    pub fn detach(&mut self, wire: &ComlynxWire) {
        self.pull(wire, false);
    }

    pub fn pulse(&mut self, wire: &ComlynxWire) {
        match self.counter {
            1 => {
                self.pull(wire, false);
                let parity = (self.shifter.count_ones() & 1) as u8;
                wire.publish_coarse(
                    self.shifter,
                    if self.par_en { parity } else { self.par_bit },
                );
                self.counter = 0;
                trace!("tx stop, data 0x{:02X}", self.shifter);
            }
            0 => {
                if self.tx_brk {
                    self.pull(wire, true);
                } else if let Some(data) = self.data.take() {
                    self.pull(wire, true);
                    self.shifter = data;
                    self.counter = 10;
                    trace!("tx start, data 0x{data:02X}");
                }
            }
            _ => self.counter -= 1,
        }
    }
}

/// Coarse receiver: watches the line level for the start edge and takes
/// the whole byte off the wire object when the frame sequence advances.
#[derive(Clone, Serialize, Deserialize)]
pub struct Rx {
    data: Option<u8>,
    counter: u16,
    last_seq: u32,
    errors: u8,
    par_bit: u8,
    par_en: bool,
    int_en: bool,
}

impl Rx {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: None,
            counter: 0,
            last_seq: 0,
            errors: 0,
            par_bit: 0,
            par_en: false,
            int_en: false,
        }
    }

    pub fn set_ctrl(&mut self, ctrl: u8) {
        self.int_en = ctrl & SERCTL_W_RXINTEN != 0;
        self.par_en = ctrl & SERCTL_W_PAREN != 0;
        if ctrl & SERCTL_W_RESETERR != 0 {
            self.errors = 0;
        }
    }

    pub fn attach(&mut self, wire: &ComlynxWire) {
        self.last_seq = wire.coarse_seq();
        self.counter = 0;
    }

    pub fn take_data(&mut self) -> u8 {
        self.data.take().unwrap_or(0)
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        let mut s = self.errors;
        if self.data.is_some() {
            s |= SERCTL_R_RXRDY;
        }
        if self.par_bit != 0 {
            s |= SERCTL_R_PARBIT;
        }
        s
    }

    #[must_use]
    pub fn interrupt(&self) -> bool {
        self.int_en && self.data.is_some()
    }

    pub fn pulse(&mut self, wire: &ComlynxWire) {
        if self.counter == 0 {
            if !wire.is_high() {
                self.counter = 1;
            }
            return;
        }

        let (seq, byte, parity) = wire.coarse();
        if seq != self.last_seq {
            self.last_seq = seq;
            if self.data.is_some() {
                self.errors |= SERCTL_R_OVERRUN;
            }
            if self.par_en && (byte.count_ones() & 1) as u8 != parity {
                self.errors |= SERCTL_R_PARERR;
            }
            self.par_bit = parity;
            self.data = Some(byte);
            self.counter = 0;
            trace!("rx stop, data 0x{byte:02X}");
        } else if !wire.is_high() {
            if self.counter >= RX_BREAK_BITS {
                self.errors |= SERCTL_R_RXBRK;
            }
            self.counter = self.counter.saturating_add(1);
        } else {
            // The line came back up with no frame on it.
            self.errors |= SERCTL_R_FRAMERR;
            self.counter = 0;
        }
    }
}
