use serde::{Deserialize, Serialize};

pub const TIMER_COUNT: usize = 12;
const SLOT_VIDEO_DMA: usize = TIMER_COUNT;
const SLOT_COMLYNX: usize = TIMER_COUNT + 1;
const SLOT_SUZY: usize = TIMER_COUNT + 2;
const SLOT_CPU: usize = TIMER_COUNT + 3;
const SLOT_COUNT: usize = TIMER_COUNT + 4;

/// One schedulable piece of hardware work. At most one pending deadline
/// exists per action; scheduling again moves it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Action {
    Timer(u8),
    VideoDma,
    ComlynxPulse,
    SuzyStep,
    CpuStep,
}

impl Action {
    fn slot(self) -> usize {
        match self {
            Action::Timer(id) => id as usize,
            Action::VideoDma => SLOT_VIDEO_DMA,
            Action::ComlynxPulse => SLOT_COMLYNX,
            Action::SuzyStep => SLOT_SUZY,
            Action::CpuStep => SLOT_CPU,
        }
    }

    fn from_slot(slot: usize) -> Self {
        match slot {
            s if s < TIMER_COUNT => Action::Timer(s as u8),
            SLOT_VIDEO_DMA => Action::VideoDma,
            SLOT_COMLYNX => Action::ComlynxPulse,
            SLOT_SUZY => Action::SuzyStep,
            _ => Action::CpuStep,
        }
    }
}

/// Deadline table keyed by action kind. The slot order doubles as the
/// tie-break priority: timers first, then display DMA, ComLynx, Suzy and
/// finally the CPU, so simultaneous deadlines resolve identically on
/// every host.
#[derive(Clone, Serialize, Deserialize)]
pub struct Scheduler {
    deadlines: [Option<u64>; SLOT_COUNT],
    current: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadlines: [None; SLOT_COUNT],
            current: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Moves the clock forward by `ticks` without dispatching anything.
    pub fn advance(&mut self, ticks: u32) -> u64 {
        self.current += u64::from(ticks);
        self.current
    }

    pub fn schedule(&mut self, action: Action, deadline: u64) {
        self.deadlines[action.slot()] = Some(deadline);
    }

    pub fn schedule_in(&mut self, action: Action, ticks: u64) {
        self.schedule(action, self.current + ticks);
    }

    pub fn cancel(&mut self, action: Action) {
        self.deadlines[action.slot()] = None;
    }

    #[must_use]
    pub fn deadline(&self, action: Action) -> Option<u64> {
        self.deadlines[action.slot()]
    }

    #[must_use]
    pub fn is_scheduled(&self, action: Action) -> bool {
        self.deadlines[action.slot()].is_some()
    }

    fn earliest(&self, last_slot: usize, limit: u64) -> Option<(u64, usize)> {
        let mut best: Option<(u64, usize)> = None;
        for (slot, deadline) in self.deadlines[..=last_slot].iter().enumerate() {
            let Some(d) = *deadline else { continue };
            if d > limit {
                continue;
            }
            // Strict comparison keeps the lowest slot on equal deadlines.
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, slot));
            }
        }
        best
    }

    /// Pops the earliest action due at or before `limit`, advancing the
    /// clock to its deadline.
    pub fn pop_due(&mut self, limit: u64) -> Option<Action> {
        let (deadline, slot) = self.earliest(SLOT_COUNT - 1, limit)?;
        debug_assert!(deadline >= self.current, "scheduler clock ran past a deadline");
        self.current = self.current.max(deadline);
        self.deadlines[slot] = None;
        Some(Action::from_slot(slot))
    }

    /// Same as `pop_due` but only considers hardware actions (timers,
    /// display DMA, ComLynx) and hands back the deadline so the caller
    /// can reschedule on the exact grid. Used while a CPU or Suzy step
    /// is in flight; the clock has already been advanced past the
    /// deadline.
    pub fn pop_due_hardware(&mut self, limit: u64) -> Option<(Action, u64)> {
        let (deadline, slot) = self.earliest(SLOT_COMLYNX, limit)?;
        self.deadlines[slot] = None;
        Some((Action::from_slot(slot), deadline))
    }

    pub fn clear(&mut self) {
        self.deadlines = [None; SLOT_COUNT];
        self.current = 0;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_wins() {
        let mut s = Scheduler::new();
        s.schedule(Action::CpuStep, 10);
        s.schedule(Action::Timer(3), 4);
        s.schedule(Action::VideoDma, 7);

        assert_eq!(s.pop_due(u64::MAX), Some(Action::Timer(3)));
        assert_eq!(s.current(), 4);
        assert_eq!(s.pop_due(u64::MAX), Some(Action::VideoDma));
        assert_eq!(s.pop_due(u64::MAX), Some(Action::CpuStep));
        assert_eq!(s.pop_due(u64::MAX), None);
    }

    #[test]
    fn ties_resolve_by_kind_priority() {
        let mut s = Scheduler::new();
        s.schedule(Action::CpuStep, 5);
        s.schedule(Action::SuzyStep, 5);
        s.schedule(Action::VideoDma, 5);
        s.schedule(Action::Timer(7), 5);
        s.schedule(Action::Timer(0), 5);

        assert_eq!(s.pop_due(u64::MAX), Some(Action::Timer(0)));
        assert_eq!(s.pop_due(u64::MAX), Some(Action::Timer(7)));
        assert_eq!(s.pop_due(u64::MAX), Some(Action::VideoDma));
        assert_eq!(s.pop_due(u64::MAX), Some(Action::SuzyStep));
        assert_eq!(s.pop_due(u64::MAX), Some(Action::CpuStep));
    }

    #[test]
    fn rescheduling_replaces() {
        let mut s = Scheduler::new();
        s.schedule(Action::Timer(1), 100);
        s.schedule(Action::Timer(1), 20);
        assert_eq!(s.deadline(Action::Timer(1)), Some(20));
        assert_eq!(s.pop_due(u64::MAX), Some(Action::Timer(1)));
        assert_eq!(s.pop_due(u64::MAX), None);
    }

    #[test]
    fn limit_is_honored() {
        let mut s = Scheduler::new();
        s.schedule(Action::Timer(0), 50);
        assert_eq!(s.pop_due(49), None);
        assert_eq!(s.pop_due(50), Some(Action::Timer(0)));
    }

    #[test]
    fn hardware_pop_skips_cpu_and_suzy() {
        let mut s = Scheduler::new();
        s.schedule(Action::CpuStep, 1);
        s.schedule(Action::SuzyStep, 2);
        s.schedule(Action::ComlynxPulse, 3);
        assert_eq!(
            s.pop_due_hardware(u64::MAX),
            Some((Action::ComlynxPulse, 3))
        );
        assert_eq!(s.pop_due_hardware(u64::MAX), None);
        assert!(s.is_scheduled(Action::CpuStep));
        assert!(s.is_scheduled(Action::SuzyStep));
    }
}
