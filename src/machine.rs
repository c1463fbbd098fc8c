use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::consts::{
    COMLYNX_BIT_TICKS, INTV_ADDR_A, MAPCTL_MIK_BIT, MAPCTL_ROM_BIT, MAPCTL_SUZ_BIT,
    MAPCTL_VEC_BIT, MIK_ADDR, MIK_ADDR_B, MMC_ADDR, NMIV_ADDR, RAM_HOLE_ADDR, RCART0, RCART1,
    ROM_ADDR, ROM_ADDR_B, ROM_END, SUZ_ADDR, SUZ_ADDR_B,
};
use crate::cpu::{Cpu, Memory};
use crate::error::CoreError;
use crate::mikey::{uart::LinkBackend, Mikey, WriteEffect};
use crate::ram::Ram;
use crate::rom::Rom;
use crate::scheduler::{Action, Scheduler};
use crate::suzy::Suzy;
use crate::vectors::Vectors;
use log::trace;
use serde::{Deserialize, Serialize};

/// Everything on the far side of the CPU pins: memory, both custom
/// chips, the cartridge and the clock. The CPU borrows this through the
/// `Memory` trait; every access charges ticks and lets due hardware run
/// before the data comes back.
#[derive(Serialize, Deserialize)]
pub struct Hardware {
    pub(crate) ram: Ram,
    pub(crate) rom: Rom,
    pub(crate) vectors: Vectors,
    pub(crate) suzy: Suzy,
    pub(crate) mikey: Mikey,
    pub(crate) cart: Cartridge,
    pub(crate) scheduler: Scheduler,
    bus: Bus,
    cpu_asleep: bool,
}

impl Hardware {
    fn new(backend: LinkBackend) -> Self {
        Self {
            ram: Ram::new(),
            rom: Rom::new(),
            vectors: Vectors::new(),
            suzy: Suzy::new(),
            mikey: Mikey::new(backend),
            cart: Cartridge::none(),
            scheduler: Scheduler::new(),
            bus: Bus::new(),
            cpu_asleep: false,
        }
    }

    #[inline]
    fn mapped_to_ram(&self, bit: u8) -> bool {
        self.ram.mapctl() & bit != 0
    }

    #[inline]
    fn is_register(addr: u16) -> bool {
        (SUZ_ADDR..ROM_ADDR).contains(&addr)
    }

    /// Advances the clock and fires every hardware action that came due,
    /// so timers and display DMA interleave with the access that paid
    /// for them.
    fn charge(&mut self, ticks: u32) {
        let now = self.scheduler.advance(ticks);
        while let Some((action, at)) = self.scheduler.pop_due_hardware(now) {
            self.run_hardware_action(action, at);
        }
    }

    /// Dispatches one timer edge, display DMA line or serial pulse. `at`
    /// is the action's deadline: recurring work is rescheduled on that
    /// grid even when the dispatch itself ran late.
    pub(crate) fn run_hardware_action(&mut self, action: Action, at: u64) {
        match action {
            Action::Timer(id) => {
                let fire = self.mikey.fire_timer(usize::from(id));
                self.reschedule_timer(usize::from(id), at);
                // The horizontal timer paces display DMA; the vertical
                // one commits the frame.
                if fire.underflowed(0) {
                    self.scheduler.schedule(Action::VideoDma, at);
                }
                if fire.underflowed(2) {
                    // The line that triggered this same edge still
                    // belongs to the outgoing frame.
                    if self.scheduler.deadline(Action::VideoDma) == Some(at) {
                        self.scheduler.cancel(Action::VideoDma);
                        self.mikey.render_line(&self.ram);
                    }
                    self.mikey.vblank();
                }
            }
            Action::VideoDma => self.mikey.render_line(&self.ram),
            Action::ComlynxPulse => {
                self.mikey.pulse_uart();
                self.scheduler
                    .schedule(Action::ComlynxPulse, at + COMLYNX_BIT_TICKS);
            }
            Action::SuzyStep | Action::CpuStep => {
                unreachable!("cpu and suzy steps only dispatch from the run loop")
            }
        }
        if self.cpu_asleep && self.mikey.irq_pending() {
            self.wake_cpu();
        }
    }

    pub(crate) fn reschedule_timer(&mut self, id: usize, from: u64) {
        let action = Action::Timer(id as u8);
        match self.mikey.timers().edge_period(id) {
            Some(period) => self.scheduler.schedule(action, from + u64::from(period)),
            None => self.scheduler.cancel(action),
        }
    }

    fn wake_cpu(&mut self) {
        self.cpu_asleep = false;
        if !self.suzy.sprite_active() && !self.scheduler.is_scheduled(Action::CpuStep) {
            self.scheduler
                .schedule(Action::CpuStep, self.scheduler.current());
        }
    }

    /// Register/overlay dispatch without timing or side effects: the
    /// debugger's view.
    pub(crate) fn debug_read(&self, addr: u16) -> u8 {
        match addr {
            0..=SUZ_ADDR_B => self.ram.get(addr),
            SUZ_ADDR..=MIK_ADDR_B => {
                if self.mapped_to_ram(MAPCTL_SUZ_BIT) {
                    self.ram.get(addr)
                } else {
                    self.suzy.read(addr, self.scheduler.current())
                }
            }
            MIK_ADDR..=ROM_ADDR_B => {
                if self.mapped_to_ram(MAPCTL_MIK_BIT) {
                    self.ram.get(addr)
                } else {
                    self.mikey.debug_read(addr)
                }
            }
            ROM_ADDR..=ROM_END => {
                if self.mapped_to_ram(MAPCTL_ROM_BIT) {
                    self.ram.get(addr)
                } else {
                    self.rom.get(addr)
                }
            }
            RAM_HOLE_ADDR | MMC_ADDR => self.ram.get(addr),
            NMIV_ADDR..=INTV_ADDR_A => {
                if self.mapped_to_ram(MAPCTL_VEC_BIT) {
                    self.ram.get(addr)
                } else {
                    self.vectors.get(addr)
                }
            }
        }
    }
}

impl Memory for Hardware {
    fn read(&mut self, addr: u16) -> u8 {
        let cost = self.bus.access_cost(addr, Self::is_register(addr));
        self.charge(cost);
        let now = self.scheduler.current();
        match addr {
            0..=SUZ_ADDR_B => self.ram.get(addr),
            SUZ_ADDR..=MIK_ADDR_B => {
                if self.mapped_to_ram(MAPCTL_SUZ_BIT) {
                    self.ram.get(addr)
                } else {
                    match addr {
                        RCART0 => self.cart.read_bank0(),
                        RCART1 => self.cart.read_bank1(),
                        _ => self.suzy.read(addr, now),
                    }
                }
            }
            MIK_ADDR..=ROM_ADDR_B => {
                if self.mapped_to_ram(MAPCTL_MIK_BIT) {
                    self.ram.get(addr)
                } else {
                    self.mikey.read(addr, &self.cart)
                }
            }
            ROM_ADDR..=ROM_END => {
                if self.mapped_to_ram(MAPCTL_ROM_BIT) {
                    self.ram.get(addr)
                } else {
                    self.rom.get(addr)
                }
            }
            RAM_HOLE_ADDR | MMC_ADDR => self.ram.get(addr),
            NMIV_ADDR..=INTV_ADDR_A => {
                if self.mapped_to_ram(MAPCTL_VEC_BIT) {
                    self.ram.get(addr)
                } else {
                    self.vectors.get(addr)
                }
            }
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let cost = self.bus.access_cost(addr, Self::is_register(addr));
        self.charge(cost);
        let now = self.scheduler.current();
        match addr {
            0..=SUZ_ADDR_B => self.ram.set(addr, value),
            SUZ_ADDR..=MIK_ADDR_B => {
                if self.mapped_to_ram(MAPCTL_SUZ_BIT) {
                    self.ram.set(addr, value);
                } else {
                    self.suzy.write(addr, value, now);
                }
            }
            MIK_ADDR..=ROM_ADDR_B => {
                if self.mapped_to_ram(MAPCTL_MIK_BIT) {
                    self.ram.set(addr, value);
                } else {
                    match self.mikey.write(addr, value, &mut self.cart) {
                        WriteEffect::TimerTouched(id) => {
                            let now = self.scheduler.current();
                            self.reschedule_timer(id, now);
                        }
                        WriteEffect::CpuSleep => {
                            trace!("cpu going to sleep");
                            self.cpu_asleep = true;
                        }
                        WriteEffect::None => {}
                    }
                }
            }
            // The boot ROM page is not writable; stores land in the RAM
            // underneath, as does MAPCTL itself.
            ROM_ADDR..=ROM_END | RAM_HOLE_ADDR | MMC_ADDR => self.ram.set(addr, value),
            NMIV_ADDR..=INTV_ADDR_A => {
                if self.mapped_to_ram(MAPCTL_VEC_BIT) {
                    self.ram.set(addr, value);
                } else {
                    self.vectors.set(addr, value);
                }
            }
        }
    }
}

/// The whole console: the CPU plus everything it talks to, driven by
/// the scheduler toward explicit tick deadlines.
#[derive(Serialize, Deserialize)]
pub struct Machine {
    cpu: Cpu,
    hw: Hardware,
    pending_trap: bool,
}

impl Machine {
    #[must_use]
    pub fn new(backend: LinkBackend) -> Self {
        let mut m = Self {
            cpu: Cpu::new(),
            hw: Hardware::new(backend),
            pending_trap: false,
        };
        m.initialize();
        m
    }

    /// Power-on state: vectors and MAPCTL come out of the boot ROM's
    /// top page, the CPU starts at the reset vector.
    fn initialize(&mut self) {
        self.hw.vectors.load(&self.hw.rom.as_slice()[0x1FA..]);
        self.hw.ram.set_mapctl(self.hw.rom.as_slice()[0x1F9]);
        self.cpu.reset(self.hw.vectors.reset());
        self.hw
            .scheduler
            .schedule(Action::CpuStep, self.hw.scheduler.current());
        self.hw
            .scheduler
            .schedule(Action::ComlynxPulse, self.hw.scheduler.current() + COMLYNX_BIT_TICKS);
    }

    pub fn reset(&mut self) {
        let wire = self.hw.mikey.uart_mut().wire();
        let backend = self.hw.mikey.backend();
        let sink = self.hw.mikey.video().sink();

        self.hw.ram = Ram::new();
        self.hw.vectors = Vectors::new();
        self.hw.suzy = Suzy::new();
        self.hw.bus = Bus::new();
        self.hw.scheduler.clear();
        self.hw.cpu_asleep = false;
        self.hw.mikey = Mikey::new(backend);
        self.hw.mikey.uart_mut().set_wire(&wire);
        if let Some(sink) = sink {
            self.hw.mikey.video_mut().attach_sink(sink);
        }
        self.hw.cart.reset();
        self.cpu = Cpu::new();
        self.pending_trap = false;
        self.initialize();
    }

    /// Runs scheduled work until every deadline at or before `target`
    /// has been dispatched, or a debug trap fires. The CPU may overshoot
    /// the target by the tail of its last instruction.
    pub fn run_until(&mut self, target: u64) {
        while let Some(action) = self.hw.scheduler.pop_due(target) {
            match action {
                Action::CpuStep => {
                    self.cpu.set_irq(self.hw.mikey.irq_pending());
                    self.cpu.step(&mut self.hw);
                    self.schedule_cpu();
                    if self.cpu.take_brk_trap() {
                        self.pending_trap = true;
                        return;
                    }
                }
                Action::SuzyStep => {
                    let ticks = self.hw.suzy.render_step(&mut self.hw.ram);
                    let next = self.hw.scheduler.current() + u64::from(ticks);
                    if self.hw.suzy.sprite_active() {
                        self.hw.scheduler.schedule(Action::SuzyStep, next);
                    } else {
                        // Engine done; the bus comes back to the CPU.
                        self.hw.cpu_asleep = false;
                        self.hw.scheduler.schedule(Action::CpuStep, next);
                    }
                }
                hardware => {
                    let at = self.hw.scheduler.current();
                    self.hw.run_hardware_action(hardware, at);
                }
            }
        }
    }

    fn schedule_cpu(&mut self) {
        let now = self.hw.scheduler.current();
        if self.hw.suzy.sprite_active() {
            // SPRGO parks the CPU until the paint finishes.
            self.hw.scheduler.schedule(Action::SuzyStep, now);
        } else if !self.hw.cpu_asleep {
            self.hw.scheduler.schedule(Action::CpuStep, now);
        }
    }

    /// True once after a break-on-BRK instruction retired.
    pub fn take_trap(&mut self) -> bool {
        core::mem::replace(&mut self.pending_trap, false)
    }

    #[must_use]
    pub fn now(&self) -> u64 {
        self.hw.scheduler.current()
    }

    /// Loads a cartridge image.
    ///
    /// # Errors
    ///
    /// Propagates `CoreError::InvalidImage`.
    pub fn load_cart(&mut self, data: &[u8]) -> Result<(), CoreError> {
        self.hw.cart = Cartridge::from_slice(data)?;
        Ok(())
    }

    /// Loads a boot ROM image and re-runs power-on initialization.
    ///
    /// # Errors
    ///
    /// Propagates `CoreError::InvalidBootRom`.
    pub fn load_boot_rom(&mut self, data: &[u8]) -> Result<(), CoreError> {
        self.hw.rom = Rom::from_slice(data).map_err(CoreError::InvalidBootRom)?;
        self.initialize();
        Ok(())
    }

    /// Copies a BS93 payload into RAM and points the CPU at it. Data
    /// past the top of RAM is dropped.
    pub fn load_bs93(&mut self, load_addr: u16, payload: &[u8]) {
        let room = crate::ram::RAM_LEN - usize::from(load_addr);
        let payload = &payload[..payload.len().min(room)];
        self.hw.ram.copy(load_addr, payload);
        self.cpu.set_pc(load_addr);
        trace!("bs93 image at 0x{load_addr:04X}, {} bytes", payload.len());
    }

    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    #[must_use]
    pub fn debug_read(&self, addr: u16) -> u8 {
        self.hw.debug_read(addr)
    }

    pub fn debug_write(&mut self, addr: u16, value: u8) {
        self.hw.ram.set(addr, value);
    }

    #[must_use]
    pub fn ram(&self) -> &Ram {
        &self.hw.ram
    }

    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.hw.ram
    }

    #[must_use]
    pub fn mikey(&self) -> &Mikey {
        &self.hw.mikey
    }

    pub fn mikey_mut(&mut self) -> &mut Mikey {
        &mut self.hw.mikey
    }

    #[must_use]
    pub fn suzy(&self) -> &Suzy {
        &self.hw.suzy
    }

    pub fn suzy_mut(&mut self) -> &mut Suzy {
        &mut self.hw.suzy
    }

    #[must_use]
    pub fn cart(&self) -> &Cartridge {
        &self.hw.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cartridge {
        &mut self.hw.cart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{
        INT_TIMER0, INTSET, SPRGO, SPRGO_GO, TIM0BKUP, TIM0CNT, TIM0CTLA, VIDBASL,
    };

    fn machine_with_program(program: &[u8]) -> Machine {
        let mut m = Machine::new(LinkBackend::Coarse);
        m.ram_mut().copy(0x0200, program);
        m.cpu_mut().set_pc(0x0200);
        m
    }

    #[test]
    fn cpu_accesses_advance_the_clock() {
        let mut m = machine_with_program(&[0xA9, 0x42, 0x85, 0x10]); // LDA #42; STA $10
        let t0 = m.now();
        m.run_until(t0 + 40);
        assert!(m.now() > t0);
        assert_eq!(m.ram().get(0x0010), 0x42);
    }

    #[test]
    fn register_writes_reach_mikey() {
        // LDA #3; STA $FD00 (TIM0BKUP)
        let mut m = machine_with_program(&[0xA9, 0x03, 0x8D, 0x00, 0xFD]);
        m.run_until(m.now() + 60);
        assert_eq!(m.debug_read(TIM0BKUP), 3);
    }

    #[test]
    fn timer_interrupts_the_cpu() {
        // Enable timer 0 with interrupt, backup 0, then spin.
        let mut m = machine_with_program(&[0x4C, 0x00, 0x02]); // JMP $0200
        // IRQ handler at 0x0300 stores a marker.
        m.ram_mut().copy(0x0300, &[0xA9, 0x55, 0x85, 0x20, 0x40]); // LDA/STA/RTI
        m.ram_mut().set(0xFFFE, 0x00);
        m.ram_mut().set(0xFFFF, 0x03);
        // Map the vector window to RAM.
        m.ram_mut().set_mapctl(crate::consts::MAPCTL_VEC_BIT);

        // Program the timer directly and clear I via the cpu.
        {
            let hw = &mut m.hw;
            hw.mikey.write(TIM0BKUP, 0, &mut hw.cart);
            hw.mikey.write(TIM0CNT, 0, &mut hw.cart);
            hw.mikey.write(TIM0CTLA, 0b1001_1000, &mut hw.cart);
            let now = hw.scheduler.current();
            hw.reschedule_timer(0, now);
        }
        m.cpu_mut().set_status(crate::cpu::Status::empty());

        m.run_until(m.now() + 2_000);
        assert_eq!(m.ram().get(0x0020), 0x55);
        assert_eq!(m.debug_read(INTSET) & INT_TIMER0, INT_TIMER0);
    }

    #[test]
    fn sprgo_parks_the_cpu_until_the_paint_ends() {
        // STA SPRGO with an empty SCB chain: the engine starts and stops
        // on the first step, then the CPU resumes.
        let mut m = machine_with_program(&[
            0xA9, 0x01, // LDA #1
            0x8D, 0x91, 0xFC, // STA SPRGO
            0xA9, 0x77, // LDA #77
            0x85, 0x30, // STA $30
        ]);
        m.suzy_mut().registers_mut().set_u16(VIDBASL, 0x2000);
        m.run_until(m.now() + 500);
        assert_eq!(m.ram().get(0x0030), 0x77);
        assert_eq!(m.debug_read(SPRGO) & SPRGO_GO, 0);
    }

    #[test]
    fn display_chain_produces_a_frame() {
        use crate::consts::{DISPADRL, GREEN0, BLUERED0, TIM2BKUP, TIM2CNT, TIM2CTLA};
        use crate::mikey::video::{SCREEN_HEIGHT, SCREEN_WIDTH};

        let mut m = machine_with_program(&[0x4C, 0x00, 0x02]); // spin
        let sink = crate::mikey::video::VideoSink::new();
        m.mikey_mut().video_mut().attach_sink(sink.clone());

        // A known pattern in the display buffer at 0x2000.
        for i in 0..(SCREEN_WIDTH * SCREEN_HEIGHT / 2) {
            m.ram_mut()
                .set(0x2000 + i as u16, (i % 256) as u8);
        }

        {
            let hw = &mut m.hw;
            // Palette: pen n = green level n.
            for i in 0..16u16 {
                hw.mikey.write(GREEN0 + i, i as u8, &mut hw.cart);
                hw.mikey.write(BLUERED0 + i, 0, &mut hw.cart);
            }
            hw.mikey.write(DISPADRL, 0x00, &mut hw.cart);
            hw.mikey.write(DISPADRL + 1, 0x20, &mut hw.cart);
            // Timer 0 clocks a line per microsecond edge; timer 2,
            // linked, commits the frame after 102 lines.
            hw.mikey.write(TIM0BKUP, 0, &mut hw.cart);
            hw.mikey.write(TIM0CNT, 0, &mut hw.cart);
            hw.mikey.write(TIM2BKUP, 101, &mut hw.cart);
            hw.mikey.write(TIM2CNT, 101, &mut hw.cart);
            hw.mikey.write(TIM2CTLA, 0b0001_1111, &mut hw.cart);
            hw.mikey.write(TIM0CTLA, 0b0001_1000, &mut hw.cart);
            let now = hw.scheduler.current();
            hw.reschedule_timer(0, now);
        }

        // 102 lines at 16 ticks per line, plus slack.
        m.run_until(m.now() + 110 * 16);
        assert!(m.mikey_mut().video_mut().take_frame_committed());

        let mut frame = Vec::new();
        assert_eq!(sink.snapshot(&mut frame), 1);
        let palette = *m.mikey().registers().palette();
        // Byte-for-byte palette expansion of the source buffer.
        for (i, pair) in frame.chunks(2).enumerate() {
            let byte = ((i as u32) % 256) as u8;
            assert_eq!(pair[0], palette[usize::from(byte >> 4)], "pixel {}", i * 2);
            assert_eq!(pair[1], palette[usize::from(byte & 0x0F)]);
        }
    }

    #[test]
    fn determinism_across_runs() {
        let run = || {
            let mut m = machine_with_program(&[
                0xA2, 0x00, // LDX #0
                0xE8, // loop: INX
                0x8A, // TXA
                0x9D, 0x00, 0x30, // STA $3000,X
                0x4C, 0x02, 0x02, // JMP loop
            ]);
            m.run_until(m.now() + 100_000);
            let mut state = Vec::new();
            for a in 0x3000..0x3100u16 {
                state.push(m.ram().get(a));
            }
            (m.now(), state, m.cpu().pc())
        };
        assert_eq!(run(), run());
    }
}
