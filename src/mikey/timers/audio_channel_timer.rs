use super::{
    CTRLA_ENABLE_COUNT_BIT, CTRLA_ENABLE_RELOAD_BIT, CTRLA_INTEGRATE_BIT, CTRLA_PERIOD_BIT,
    CTRLA_RESET_DONE_BIT, CTRLB_BORROW_IN_BIT, CTRLB_BORROW_OUT_BIT, CTRLB_TIMER_DONE_BIT,
    TICKS_PER_US,
};
use log::trace;
use serde::{Deserialize, Serialize};

/// An audio channel: a timer whose done tap clocks a 12-bit polynomial
/// shift register into a signed DAC sample.
#[derive(Clone, Serialize, Deserialize)]
pub struct AudioChannelTimer {
    id: u8,
    backup: u8,
    control_a: u8,
    count: u8,
    control_b: u8,
    volume: u8,
    feedback: u8,
    shift_register: u8,
    output: i8,
    period_ticks: Option<u32>,
    count_enabled: bool,
    reload_enabled: bool,
    silenced: bool,
}

impl AudioChannelTimer {
    #[must_use]
    pub fn new(id: u8) -> Self {
        Self {
            id,
            backup: 0,
            control_a: 0,
            count: 0,
            control_b: 0,
            volume: 0,
            feedback: 0,
            shift_register: 0,
            output: 0,
            period_ticks: None,
            count_enabled: false,
            reload_enabled: false,
            silenced: false,
        }
    }

    #[must_use]
    pub fn backup(&self) -> u8 {
        self.backup
    }

    #[must_use]
    pub fn control_a(&self) -> u8 {
        self.control_a
    }

    #[must_use]
    pub fn count(&self) -> u8 {
        self.count
    }

    #[must_use]
    pub fn control_b(&self) -> u8 {
        self.control_b
    }

    #[must_use]
    pub fn volume(&self) -> u8 {
        self.volume
    }

    #[must_use]
    pub fn feedback(&self) -> u8 {
        self.feedback
    }

    #[must_use]
    pub fn output(&self) -> i8 {
        self.output
    }

    #[must_use]
    pub fn shift_register(&self) -> u8 {
        self.shift_register
    }

    pub fn set_backup(&mut self, value: u8) {
        self.backup = value;
        self.update_silenced();
    }

    pub fn set_control_a(&mut self, value: u8) {
        self.control_a = value;
        self.period_ticks = match value & CTRLA_PERIOD_BIT {
            7 => None,
            sel => Some(TICKS_PER_US << sel),
        };
        if value & CTRLA_RESET_DONE_BIT != 0 {
            self.control_b &= !CTRLB_TIMER_DONE_BIT;
        }
        self.count_enabled = value & CTRLA_ENABLE_COUNT_BIT != 0;
        self.reload_enabled = value & CTRLA_ENABLE_RELOAD_BIT != 0;
        trace!("audio #{} ctla = {:02x}", self.id, value);
    }

    pub fn set_count(&mut self, value: u8) {
        self.count = value;
    }

    pub fn set_control_b(&mut self, value: u8) {
        self.control_b = value;
    }

    pub fn set_volume(&mut self, value: u8) {
        self.volume = value;
    }

    pub fn set_feedback(&mut self, value: u8) {
        self.feedback = value;
        self.update_silenced();
    }

    pub fn set_output(&mut self, value: i8) {
        self.output = value;
    }

    pub fn set_shift_register(&mut self, value: u8) {
        self.shift_register = value;
    }

    /// A zero period with tap 0 selected parks the channel; polling it
    /// every microsecond would be wasted work.
    fn update_silenced(&mut self) {
        self.silenced = self.backup == 0 && self.feedback == 1;
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.period_ticks.is_none()
    }

    #[must_use]
    pub fn edge_period(&self) -> Option<u32> {
        if self.count_enabled && !self.silenced {
            self.period_ticks
        } else {
            None
        }
    }

    fn integrate(&self) -> bool {
        self.control_a & CTRLA_INTEGRATE_BIT != 0
    }

    /// The 12-bit shifter lives in `shift_register` (low 8) plus the top
    /// nibble of control B.
    #[must_use]
    pub fn full_shift_register(&self) -> u16 {
        u16::from(self.shift_register) | ((u16::from(self.control_b) & 0xF0) << 4)
    }

    fn set_full_shift_register(&mut self, value: u16) {
        self.shift_register = value as u8;
        self.control_b = (self.control_b & 0x0F) | (((value >> 4) & 0xF0) as u8);
    }

    /// Tap mask: feedback bits 0..5 are taps 0..5, bits 6..7 are taps
    /// 10..11, control A bit 7 is tap 7.
    #[must_use]
    pub fn feedback_taps(&self) -> u16 {
        let mut taps = u16::from(self.feedback) & 0x3F;
        taps |= (u16::from(self.feedback) & 0xC0) << 4;
        taps |= u16::from(self.control_a & 0x80);
        taps
    }

    /// Done tap: advance the LFSR and produce the next DAC value.
    fn shift(&mut self) {
        let taps = self.feedback_taps();
        let shifter = self.full_shift_register();
        let fed = (taps & shifter).count_ones() as u16 & 1 ^ 1;
        self.set_full_shift_register((shifter << 1) | fed);

        let volume = self.volume as i8;
        self.output = if self.integrate() {
            // "In integrate mode [...] it instead adds the volume
            // register (or its 2's complement) to a running total."
            if fed == 0 {
                self.output.saturating_add(volume)
            } else {
                self.output.saturating_sub(volume)
            }
        } else if fed == 0 {
            volume
        } else {
            -volume
        };
    }

    /// One decrement edge; returns true on underflow.
    pub fn clock(&mut self) -> bool {
        self.control_b &= !CTRLB_BORROW_OUT_BIT;
        self.control_b |= CTRLB_BORROW_IN_BIT;
        if self.count > 0 {
            self.count -= 1;
            return false;
        }
        if self.reload_enabled {
            self.count = self.backup;
        } else {
            self.count_enabled = false;
        }
        self.control_b |= CTRLB_TIMER_DONE_BIT | CTRLB_BORROW_OUT_BIT;
        self.shift();
        true
    }

    pub fn clock_linked(&mut self) -> bool {
        if !self.is_linked() || !self.count_enabled || self.silenced {
            return false;
        }
        self.clock()
    }
}
