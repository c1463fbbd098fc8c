use super::{
    CTRLA_ENABLE_COUNT_BIT, CTRLA_ENABLE_RELOAD_BIT, CTRLA_INTERRUPT_BIT, CTRLA_PERIOD_BIT,
    CTRLA_RESET_DONE_BIT, CTRLB_BORROW_IN_BIT, CTRLB_BORROW_OUT_BIT, CTRLB_TIMER_DONE_BIT,
    TICKS_PER_US,
};
use log::trace;
use serde::{Deserialize, Serialize};

/// One of Mikey's eight general timers. A timer decrements on its
/// prescaled clock edge, or on its upstream timer's borrow-out when the
/// period selector reads 7 (linked).
#[derive(Clone, Serialize, Deserialize)]
pub struct BaseTimer {
    id: u8,
    backup: u8,
    control_a: u8,
    count: u8,
    control_b: u8,
    period_ticks: Option<u32>,
    count_enabled: bool,
    reload_enabled: bool,
}

impl BaseTimer {
    #[must_use]
    pub fn new(id: u8) -> Self {
        Self {
            id,
            backup: 0,
            control_a: 0,
            count: 0,
            control_b: 0,
            period_ticks: None,
            count_enabled: false,
            reload_enabled: false,
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

    pub fn set_backup(&mut self, value: u8) {
        self.backup = value;
    }

    pub fn set_control_a(&mut self, value: u8) {
        self.control_a = value;
        self.period_ticks = match value & CTRLA_PERIOD_BIT {
            7 => None,
            sel => Some(TICKS_PER_US << sel),
        };
        if value & CTRLA_RESET_DONE_BIT != 0 {
            self.control_b &= !CTRLB_TIMER_DONE_BIT;
            self.control_a &= !CTRLA_RESET_DONE_BIT;
        }
        self.count_enabled = value & CTRLA_ENABLE_COUNT_BIT != 0;
        self.reload_enabled = value & CTRLA_ENABLE_RELOAD_BIT != 0;
        trace!("timer #{} ctla = {:02x}", self.id, value);
    }

    pub fn set_count(&mut self, value: u8) {
        self.count = value;
    }

    pub fn set_control_b(&mut self, value: u8) {
        self.control_b = value;
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.period_ticks.is_none()
    }

    #[must_use]
    pub fn interrupt_enabled(&self) -> bool {
        self.control_a & CTRLA_INTERRUPT_BIT != 0
    }

    /// Ticks until the next clock edge, when this timer runs off its own
    /// prescaler.
    #[must_use]
    pub fn edge_period(&self) -> Option<u32> {
        if self.count_enabled {
            self.period_ticks
        } else {
            None
        }
    }

    /// One decrement edge. Returns true on underflow (borrow out).
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
        trace!("timer #{} done", self.id);
        true
    }

    /// A borrow-out arriving from the upstream timer.
    pub fn clock_linked(&mut self) -> bool {
        if !self.is_linked() || !self.count_enabled {
            return false;
        }
        self.clock()
    }
}
