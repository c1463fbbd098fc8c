use super::wire::ComlynxWire;
use super::{
    RX_BREAK_BITS, SERCTL_R_FRAMERR, SERCTL_R_OVERRUN, SERCTL_R_PARBIT, SERCTL_R_PARERR,
    SERCTL_R_RXBRK, SERCTL_R_RXRDY, SERCTL_R_TXEMPTY, SERCTL_R_TXRDY, SERCTL_W_PAREN,
    SERCTL_W_PAREVEN, SERCTL_W_RESETERR, SERCTL_W_RXINTEN, SERCTL_W_TXBRK, SERCTL_W_TXINTEN,
};
use log::trace;
use serde::{Deserialize, Serialize};

/// Per-bit transmitter: start bit, eight data bits LSB first, parity,
/// stop, each on its own pulse.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tx {
    data: Option<u8>,
    shifter: u8,
    counter: u8,
    parity: u8,
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
            parity: 0,
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
            2 => {
                let bit = if self.par_en { self.parity } else { self.par_bit };
                self.pull(wire, bit == 0);
                self.counter = 1;
            }
            1 => {
                self.pull(wire, false);
                self.counter = 0;
                trace!("tx stop");
            }
            0 => {
                if self.tx_brk {
                    self.pull(wire, true);
                } else if let Some(data) = self.data.take() {
                    self.pull(wire, true);
                    self.shifter = data;
                    self.parity = 0;
                    self.counter = 10;
                    trace!("tx start, data 0x{data:02X}");
                }
            }
            _ => {
                let bit = self.shifter & 1;
                self.pull(wire, bit == 0);
                self.parity ^= bit;
                self.shifter >>= 1;
                self.counter -= 1;
            }
        }
    }
}

/// Per-bit receiver: samples the line once per bit time.
#[derive(Clone, Serialize, Deserialize)]
pub struct Rx {
    data: Option<u8>,
    shifter: u16,
    counter: u16,
    parity: u8,
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
            shifter: 0,
            counter: 0,
            parity: 0,
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
        let level = u16::from(wire.is_high());
        match self.counter {
            3..=10 => {
                // Data bits arrive LSB first.
                self.shifter |= level << 8;
                self.shifter >>= 1;
                self.parity ^= level as u8;
                self.counter -= 1;
            }
            2 => {
                if self.par_en && self.parity != level as u8 {
                    self.errors |= SERCTL_R_PARERR;
                }
                self.par_bit = level as u8;
                self.counter = 1;
            }
            1 => {
                if level != 0 {
                    if self.data.is_some() {
                        self.errors |= SERCTL_R_OVERRUN;
                    }
                    self.data = Some(self.shifter as u8);
                    self.counter = 0;
                    trace!("rx stop, data 0x{:02X}", self.shifter as u8);
                } else {
                    self.errors |= SERCTL_R_FRAMERR;
                    // Keep counting the low time toward a break.
                    self.counter = 11;
                }
            }
            0 => {
                if level == 0 {
                    self.counter = 10;
                    self.parity = 0;
                    self.shifter = 0;
                }
            }
            _ => {
                // Counting a possible break condition.
                if level == 0 {
                    if self.counter >= RX_BREAK_BITS {
                        self.errors |= SERCTL_R_RXBRK;
                    }
                    self.counter = self.counter.saturating_add(1);
                } else {
                    self.counter = 0;
                }
            }
        }
    }
}
