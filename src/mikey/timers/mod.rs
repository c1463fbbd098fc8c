pub mod audio_channel_timer;
pub mod base_timer;

use crate::consts::{AUD0VOL, INT_UART, MIK_ADDR};
use audio_channel_timer::AudioChannelTimer;
use base_timer::BaseTimer;
use serde::{Deserialize, Serialize};

pub const TIMER_COUNT: usize = 12;

/// 1 us of crystal ticks, the base prescaler step.
pub const TICKS_PER_US: u32 = 16;

/// Fixed cascade topology: 0->2->4 feeds the display beam chain,
/// 1->3->5->7 feeds the audio block, audio channels chain into each
/// other and tap back to timer 1.
pub const TIMER_LINKS: [Option<usize>; TIMER_COUNT] = [
    Some(2),
    Some(3),
    Some(4),
    Some(5),
    None,
    Some(7),
    None,
    Some(8),
    Some(9),
    Some(10),
    Some(11),
    Some(1),
];

pub const CTRLA_INTERRUPT_BIT: u8 = 0b1000_0000;
pub const CTRLA_RESET_DONE_BIT: u8 = 0b0100_0000;
pub const CTRLA_INTEGRATE_BIT: u8 = 0b0010_0000;
pub const CTRLA_ENABLE_RELOAD_BIT: u8 = 0b0001_0000;
pub const CTRLA_ENABLE_COUNT_BIT: u8 = 0b0000_1000;
pub const CTRLA_PERIOD_BIT: u8 = 0b0000_0111;
pub const CTRLB_TIMER_DONE_BIT: u8 = 0b0000_1000;
pub const CTRLB_BORROW_IN_BIT: u8 = 0b0000_0010;
pub const CTRLB_BORROW_OUT_BIT: u8 = 0b0000_0001;

#[derive(Clone, Serialize, Deserialize)]
enum TimerKind {
    Base(BaseTimer),
    Audio(AudioChannelTimer),
}

/// What one prescaled edge on a timer produced: interrupt requests and
/// the set of timers that underflowed (including cascaded ones).
#[derive(Clone, Copy, Default, Debug)]
pub struct TimerFire {
    pub irq: u8,
    pub underflows: u16,
}

impl TimerFire {
    #[must_use]
    pub fn underflowed(&self, id: usize) -> bool {
        self.underflows & (1 << id) != 0
    }
}

/// The timer block: eight general timers and four audio channels with
/// the borrow-out cascade between them.
#[derive(Clone, Serialize, Deserialize)]
pub struct Timers {
    timers: [TimerKind; TIMER_COUNT],
}

#[derive(Clone, Copy, PartialEq)]
enum Reg {
    Backup,
    ControlA,
    Count,
    ControlB,
    Volume,
    Feedback,
    Output,
    ShiftRegister,
}

impl Timers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: [
                TimerKind::Base(BaseTimer::new(0)),
                TimerKind::Base(BaseTimer::new(1)),
                TimerKind::Base(BaseTimer::new(2)),
                TimerKind::Base(BaseTimer::new(3)),
                TimerKind::Base(BaseTimer::new(4)),
                TimerKind::Base(BaseTimer::new(5)),
                TimerKind::Base(BaseTimer::new(6)),
                TimerKind::Base(BaseTimer::new(7)),
                TimerKind::Audio(AudioChannelTimer::new(8)),
                TimerKind::Audio(AudioChannelTimer::new(9)),
                TimerKind::Audio(AudioChannelTimer::new(10)),
                TimerKind::Audio(AudioChannelTimer::new(11)),
            ],
        }
    }

    /// Maps a register address to (timer index, register).
    fn decode(addr: u16) -> (usize, Reg) {
        if addr < AUD0VOL {
            let idx = ((addr - MIK_ADDR) / 4) as usize;
            let reg = match addr % 4 {
                0 => Reg::Backup,
                1 => Reg::ControlA,
                2 => Reg::Count,
                _ => Reg::ControlB,
            };
            (idx, reg)
        } else {
            let idx = (((addr - AUD0VOL) / 8) + 8) as usize;
            let reg = match addr % 8 {
                0 => Reg::Volume,
                1 => Reg::Feedback,
                2 => Reg::Output,
                3 => Reg::ShiftRegister,
                4 => Reg::Backup,
                5 => Reg::ControlA,
                6 => Reg::Count,
                _ => Reg::ControlB,
            };
            (idx, reg)
        }
    }

    /// Timer index whose scheduling is affected by a write to `addr`.
    #[must_use]
    pub fn index_of(addr: u16) -> usize {
        Self::decode(addr).0
    }

    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        let (idx, reg) = Self::decode(addr);
        match (&self.timers[idx], reg) {
            (TimerKind::Base(t), Reg::Backup) => t.backup(),
            (TimerKind::Base(t), Reg::ControlA) => t.control_a(),
            (TimerKind::Base(t), Reg::Count) => t.count(),
            (TimerKind::Base(t), Reg::ControlB) => t.control_b(),
            (TimerKind::Base(_), _) => 0xFF,
            (TimerKind::Audio(t), Reg::Backup) => t.backup(),
            (TimerKind::Audio(t), Reg::ControlA) => t.control_a(),
            (TimerKind::Audio(t), Reg::Count) => t.count(),
            (TimerKind::Audio(t), Reg::ControlB) => t.control_b(),
            (TimerKind::Audio(t), Reg::Volume) => t.volume(),
            (TimerKind::Audio(t), Reg::Feedback) => t.feedback(),
            (TimerKind::Audio(t), Reg::Output) => t.output() as u8,
            (TimerKind::Audio(t), Reg::ShiftRegister) => t.shift_register(),
        }
    }

    pub fn poke(&mut self, addr: u16, value: u8) {
        let (idx, reg) = Self::decode(addr);
        match (&mut self.timers[idx], reg) {
            (TimerKind::Base(t), Reg::Backup) => t.set_backup(value),
            (TimerKind::Base(t), Reg::ControlA) => t.set_control_a(value),
            (TimerKind::Base(t), Reg::Count) => t.set_count(value),
            (TimerKind::Base(t), Reg::ControlB) => t.set_control_b(value),
            (TimerKind::Base(_), _) => {}
            (TimerKind::Audio(t), Reg::Backup) => t.set_backup(value),
            (TimerKind::Audio(t), Reg::ControlA) => t.set_control_a(value),
            (TimerKind::Audio(t), Reg::Count) => t.set_count(value),
            (TimerKind::Audio(t), Reg::ControlB) => t.set_control_b(value),
            (TimerKind::Audio(t), Reg::Volume) => t.set_volume(value),
            (TimerKind::Audio(t), Reg::Feedback) => t.set_feedback(value),
            (TimerKind::Audio(t), Reg::Output) => t.set_output(value as i8),
            (TimerKind::Audio(t), Reg::ShiftRegister) => t.set_shift_register(value),
        }
    }

    /// Ticks between prescaled clock edges for timer `id`, or None while
    /// it is disabled or linked.
    #[must_use]
    pub fn edge_period(&self, id: usize) -> Option<u32> {
        match &self.timers[id] {
            TimerKind::Base(t) => t.edge_period(),
            TimerKind::Audio(t) => t.edge_period(),
        }
    }

    fn clock(&mut self, id: usize) -> bool {
        match &mut self.timers[id] {
            TimerKind::Base(t) => t.clock(),
            TimerKind::Audio(t) => t.clock(),
        }
    }

    fn clock_linked(&mut self, id: usize) -> bool {
        match &mut self.timers[id] {
            TimerKind::Base(t) => t.clock_linked(),
            TimerKind::Audio(t) => t.clock_linked(),
        }
    }

    fn irq_bit(&self, id: usize) -> u8 {
        if id >= 8 {
            return 0;
        }
        let enabled = match &self.timers[id] {
            TimerKind::Base(t) => t.interrupt_enabled(),
            TimerKind::Audio(_) => false,
        };
        if !enabled {
            return 0;
        }
        let bit = 1u8 << id;
        // Bit 4 belongs to the UART; timer 4's own underflow stays quiet.
        if bit == INT_UART {
            0
        } else {
            bit
        }
    }

    /// One prescaled clock edge on timer `id`, cascading borrow-outs
    /// down the link chain. The visited mask bounds the audio loop.
    pub fn fire(&mut self, id: usize) -> TimerFire {
        let mut result = TimerFire::default();
        if self.clock(id) {
            self.record_underflow(id, &mut result);
            self.cascade(TIMER_LINKS[id], 1 << id, &mut result);
        }
        result
    }

    fn record_underflow(&mut self, id: usize, result: &mut TimerFire) {
        result.underflows |= 1 << id;
        result.irq |= self.irq_bit(id);
    }

    fn cascade(&mut self, mut next: Option<usize>, mut visited: u16, result: &mut TimerFire) {
        while let Some(id) = next {
            if visited & (1 << id) != 0 {
                break;
            }
            visited |= 1 << id;
            if !self.clock_linked(id) {
                break;
            }
            self.record_underflow(id, result);
            next = TIMER_LINKS[id];
        }
    }

    #[must_use]
    pub fn audio_output(&self, channel: usize) -> i8 {
        match &self.timers[8 + channel] {
            TimerKind::Audio(t) => t.output(),
            TimerKind::Base(_) => 0,
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{TIM0BKUP, TIM0CNT, TIM0CTLA, TIM2BKUP, TIM2CTLA};

    const ENABLED: u8 = CTRLA_ENABLE_COUNT_BIT | CTRLA_ENABLE_RELOAD_BIT;
    const LINKED: u8 = ENABLED | 7;

    #[test]
    fn decode_maps_both_banks() {
        assert_eq!(Timers::index_of(TIM0BKUP), 0);
        assert_eq!(Timers::index_of(0xFD1F), 7);
        assert_eq!(Timers::index_of(AUD0VOL), 8);
        assert_eq!(Timers::index_of(0xFD3F), 11);
    }

    #[test]
    fn timer_underflows_every_backup_plus_one_edges() {
        let mut t = Timers::new();
        t.poke(TIM0BKUP, 3);
        t.poke(TIM0CTLA, ENABLED);
        t.poke(TIM0CNT, 3);

        let mut edges = 0;
        let mut underflows = vec![];
        for _ in 0..12 {
            edges += 1;
            if t.fire(0).underflowed(0) {
                underflows.push(edges);
            }
        }
        // 3,2,1,0 -> underflow on the 4th edge, then every 4 after.
        assert_eq!(underflows, vec![4, 8, 12]);
    }

    #[test]
    fn linked_timer_counts_upstream_underflows() {
        let mut t = Timers::new();
        t.poke(TIM0BKUP, 0);
        t.poke(TIM0CTLA, ENABLED);
        t.poke(TIM2BKUP, 1);
        t.poke(TIM2CTLA, LINKED);
        t.poke(TIM2BKUP + 2, 1); // TIM2CNT

        // Timer 0 underflows every edge; timer 2 counts 1,0 -> every
        // second underflow cascades.
        let mut t2_underflows = 0;
        for _ in 0..10 {
            if t.fire(0).underflowed(2) {
                t2_underflows += 1;
            }
        }
        assert_eq!(t2_underflows, 5);
    }

    #[test]
    fn cascade_produces_exact_product_period() {
        // Timer 0: backup 103 -> underflow every 104 edges. Timer 2
        // linked with backup 104 -> done every 105 upstream underflows.
        let mut t = Timers::new();
        t.poke(TIM0BKUP, 103);
        t.poke(TIM0CTLA, ENABLED);
        t.poke(TIM0CNT, 103);
        t.poke(TIM2BKUP, 104);
        t.poke(TIM2CTLA, LINKED);
        t.poke(TIM2BKUP + 2, 104);

        let period = 104u64 * 105;
        let mut edges = 0u64;
        let mut dones = vec![];
        // A million edges with no drift.
        while edges < 1_000_000 {
            edges += 1;
            if t.fire(0).underflowed(2) {
                dones.push(edges);
            }
        }
        assert!(!dones.is_empty());
        for (n, at) in dones.iter().enumerate() {
            assert_eq!(*at, period * (n as u64 + 1));
        }
    }

    #[test]
    fn interrupt_bits_follow_enable() {
        let mut t = Timers::new();
        t.poke(TIM0BKUP, 0);
        t.poke(TIM0CTLA, ENABLED | CTRLA_INTERRUPT_BIT);
        assert_eq!(t.fire(0).irq, 0b0000_0001);

        t.poke(TIM0CTLA, ENABLED);
        assert_eq!(t.fire(0).irq, 0);
    }

    #[test]
    fn timer4_irq_belongs_to_the_uart() {
        let mut t = Timers::new();
        t.poke(0xFD10, 0); // TIM4BKUP
        t.poke(0xFD11, ENABLED | CTRLA_INTERRUPT_BIT);
        assert_eq!(t.fire(4).irq, 0);
        assert!(t.fire(4).underflowed(4));
    }

    #[test]
    fn disabled_timer_has_no_edge_period() {
        let mut t = Timers::new();
        assert_eq!(t.edge_period(0), None);
        t.poke(TIM0CTLA, ENABLED);
        assert_eq!(t.edge_period(0), Some(TICKS_PER_US));
        t.poke(TIM0CTLA, ENABLED | 2);
        assert_eq!(t.edge_period(0), Some(TICKS_PER_US << 2));
        t.poke(TIM0CTLA, ENABLED | 7);
        assert_eq!(t.edge_period(0), None);
    }

    #[test]
    fn audio_lfsr_produces_square_wave_output() {
        let mut t = Timers::new();
        // Channel 0 (timer 8): tap 0, backup 0, reload, volume 0x20.
        t.poke(0xFD20, 0x20); // AUD0VOL
        t.poke(0xFD21, 0x01); // AUD0SHFTFB: tap 0
        t.poke(0xFD24, 1); // AUD0TBACK
        t.poke(0xFD25, ENABLED); // AUD0CTL
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            t.fire(8);
            seen.insert(t.audio_output(0));
        }
        assert!(seen.contains(&0x20));
        assert!(seen.contains(&-0x20));
    }
}
