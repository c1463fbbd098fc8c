use crate::cartridge::{bs93_load_addr, is_bs93, lnx_header::Rotation};
use crate::consts::CRYSTAL_FREQ;
use crate::cpu::Status;
use crate::error::CoreError;
use crate::machine::Machine;
use crate::mikey::uart::{wire::ComlynxWire, LinkBackend};
use crate::mikey::video::VideoSink;
use crate::ram::RAM_LEN;
use crate::suzy::registers::{joystick_swap, Joystick, Switches};
use bitflags::bitflags;
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

bitflags! {
    /// The nine console inputs.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct Keypad: u16 {
        const left     = 0b0_0000_0001;
        const up       = 0b0_0000_0010;
        const right    = 0b0_0000_0100;
        const down     = 0b0_0000_1000;
        const option_1 = 0b0_0001_0000;
        const pause    = 0b0_0010_0000;
        const option_2 = 0b0_0100_0000;
        const a        = 0b0_1000_0000;
        const b        = 0b1_0000_0000;
    }
}

/// Why a run call came back.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BreakReason {
    /// A frame was committed to the video sink during the call.
    NextFrame,
    /// The requested budget elapsed with nothing notable.
    Break,
    /// BRK retired with break-on-BRK armed.
    Trap,
    /// The stop handle was raised.
    Cancelled,
}

/// Cooperative cancellation: any thread may raise it; the emulation
/// loop notices at its next iteration.
#[derive(Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// CPU registers plus a RAM copy, taken under the machine's own thread.
pub struct DebugSnapshot {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub pc: u16,
    pub status: Status,
    pub ram: Vec<u8>,
}

/// Construction parameters for a [`Core`].
#[derive(Default)]
pub struct CoreConfig<'a> {
    /// Cartridge image: LNX container, raw dump, or BS93 RAM image.
    pub cart: Option<&'a [u8]>,
    /// Optional 512-byte boot ROM.
    pub boot_rom: Option<&'a [u8]>,
    /// Which ComLynx implementation to run.
    pub link_backend: LinkBackend,
}

/// The emulator core: one console, its video sink, and the host-facing
/// control surface.
pub struct Core {
    machine: Machine,
    video_sink: VideoSink,
    stop: StopHandle,
    keypad: Keypad,
    /// Sample-rate division remainder, so long runs keep exact cadence.
    sample_acc: u32,
}

impl Core {
    /// Builds a core and loads its images.
    ///
    /// # Errors
    ///
    /// `CoreError::InvalidImage` / `InvalidBootRom` when an input fails
    /// validation.
    pub fn new(config: &CoreConfig) -> Result<Self, CoreError> {
        let mut machine = Machine::new(config.link_backend);
        if let Some(rom) = config.boot_rom {
            machine.load_boot_rom(rom)?;
        }
        if let Some(cart) = config.cart {
            if is_bs93(cart) {
                // Ten header bytes, then the payload goes straight into
                // RAM at the encoded address.
                let addr = bs93_load_addr(cart);
                machine.load_bs93(addr, &cart[10..]);
            } else {
                machine.load_cart(cart)?;
            }
        }

        let video_sink = VideoSink::new();
        machine
            .mikey_mut()
            .video_mut()
            .attach_sink(video_sink.clone());

        Ok(Self {
            machine,
            video_sink,
            stop: StopHandle::default(),
            keypad: Keypad::empty(),
            sample_acc: 0,
        })
    }

    pub fn reset(&mut self) {
        self.machine.reset();
        self.sample_acc = 0;
        self.apply_keypad();
    }

    /// Runs the emulation just far enough to fill `out` with stereo
    /// samples at `sample_rate`. Interleaved left/right pairs.
    pub fn advance_audio(&mut self, sample_rate: u32, out: &mut [i16]) -> BreakReason {
        debug_assert!(sample_rate > 0);
        let mut saw_frame = false;
        for pair in out.chunks_mut(2) {
            if self.stop.is_stopped() {
                return BreakReason::Cancelled;
            }
            // ticks per sample, with the remainder carried forward.
            self.sample_acc += CRYSTAL_FREQ;
            let ticks = u64::from(self.sample_acc / sample_rate);
            self.sample_acc %= sample_rate;

            self.machine.run_until(self.machine.now() + ticks);
            if self.machine.take_trap() {
                return BreakReason::Trap;
            }
            if self.machine.mikey_mut().video_mut().take_frame_committed() {
                saw_frame = true;
            }

            let (l, r) = self.machine.mikey().audio_sample();
            pair[0] = l;
            if pair.len() > 1 {
                pair[1] = r;
            }
        }
        if saw_frame {
            BreakReason::NextFrame
        } else {
            BreakReason::Break
        }
    }

    /// Runs until the next frame commit (or trap/cancel). Bounded at two
    /// nominal frame times so a wedged display cannot hang the caller.
    pub fn run_frame(&mut self) -> BreakReason {
        const SLICE: u64 = 1_000;
        let budget = self.machine.now() + u64::from(CRYSTAL_FREQ / 25);
        while self.machine.now() < budget {
            if self.stop.is_stopped() {
                return BreakReason::Cancelled;
            }
            self.machine.run_until(self.machine.now() + SLICE);
            if self.machine.take_trap() {
                return BreakReason::Trap;
            }
            if self.machine.mikey_mut().video_mut().take_frame_committed() {
                return BreakReason::NextFrame;
            }
        }
        BreakReason::Break
    }

    /// Latches the keypad state into the joystick and switch registers,
    /// remapped for cart rotation and the left-handed bit.
    pub fn set_input(&mut self, keypad: Keypad) {
        self.keypad = keypad;
        self.apply_keypad();
    }

    fn apply_keypad(&mut self) {
        let keypad = self.keypad;
        let mut j = Joystick::empty();
        j.set(Joystick::up, keypad.contains(Keypad::up));
        j.set(Joystick::down, keypad.contains(Keypad::down));
        j.set(Joystick::left, keypad.contains(Keypad::left));
        j.set(Joystick::right, keypad.contains(Keypad::right));
        j.set(Joystick::option_1, keypad.contains(Keypad::option_1));
        j.set(Joystick::option_2, keypad.contains(Keypad::option_2));
        j.set(Joystick::outside, keypad.contains(Keypad::a));
        j.set(Joystick::inside, keypad.contains(Keypad::b));

        match self.machine.cart().rotation() {
            Rotation::Left => {
                j = joystick_swap(j, Joystick::down, Joystick::right);
                j = joystick_swap(j, Joystick::up, Joystick::left);
                j = joystick_swap(j, Joystick::up, Joystick::down);
            }
            Rotation::Right => {
                j = joystick_swap(j, Joystick::up, Joystick::left);
                j = joystick_swap(j, Joystick::down, Joystick::right);
            }
            Rotation::None => {}
        }

        // The hardware's natural orientation is the left-handed one;
        // everyone else gets the axes mirrored.
        if !self.machine.suzy().left_handed() {
            j = joystick_swap(j, Joystick::up, Joystick::down);
            j = joystick_swap(j, Joystick::left, Joystick::right);
        }

        let mut sw = self.machine.suzy().switches();
        sw.set(Switches::pause, keypad.contains(Keypad::pause));

        trace!("joystick {j:?} switches {sw:?}");
        self.machine.suzy_mut().set_joystick(j.bits());
        self.machine.suzy_mut().set_switches(sw.bits());
    }

    #[must_use]
    pub fn video_sink(&self) -> VideoSink {
        self.video_sink.clone()
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn set_break_on_brk(&mut self, enabled: bool) {
        self.machine.cpu_mut().set_break_on_brk(enabled);
    }

    /// The wire this console's serial port hangs on; hand it to another
    /// core's `connect_comlynx` to cable them together.
    #[must_use]
    pub fn comlynx_wire(&mut self) -> ComlynxWire {
        self.machine.mikey_mut().uart_mut().wire()
    }

    pub fn connect_comlynx(&mut self, wire: &ComlynxWire) {
        self.machine.mikey_mut().uart_mut().set_wire(wire);
    }

    #[must_use]
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let cpu = self.machine.cpu();
        let mut ram = Vec::with_capacity(RAM_LEN);
        ram.extend_from_slice(self.machine.ram().as_slice());
        DebugSnapshot {
            a: cpu.a(),
            x: cpu.x(),
            y: cpu.y(),
            s: cpu.s(),
            pc: cpu.pc(),
            status: cpu.status(),
            ram,
        }
    }

    #[must_use]
    pub fn read_mem(&self, addr: u16) -> u8 {
        self.machine.debug_read(addr)
    }

    pub fn write_mem(&mut self, addr: u16, value: u8) {
        self.machine.debug_write(addr, value);
    }

    #[must_use]
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::JOYSTICK;

    fn core() -> Core {
        Core::new(&CoreConfig::default()).unwrap()
    }

    #[test]
    fn advance_audio_fills_the_buffer_and_advances_time() {
        let mut c = core();
        // Spin forever at the reset stub.
        c.machine_mut().ram_mut().copy(0x0200, &[0x4C, 0x00, 0x02]);
        c.machine_mut().cpu_mut().set_pc(0x0200);

        let t0 = c.machine().now();
        let mut buf = vec![0i16; 256];
        let reason = c.advance_audio(44_100, &mut buf);
        assert!(matches!(reason, BreakReason::Break | BreakReason::NextFrame));
        // 128 stereo samples at 44.1 kHz is ~46k ticks.
        let elapsed = c.machine().now() - t0;
        assert!(elapsed >= 46_000, "only {elapsed} ticks elapsed");
    }

    #[test]
    fn cancellation_wins() {
        let mut c = core();
        c.machine_mut().ram_mut().copy(0x0200, &[0x4C, 0x00, 0x02]);
        c.machine_mut().cpu_mut().set_pc(0x0200);
        c.stop_handle().stop();
        let mut buf = vec![0i16; 64];
        assert_eq!(c.advance_audio(44_100, &mut buf), BreakReason::Cancelled);
    }

    #[test]
    fn brk_traps_when_armed() {
        let mut c = core();
        c.machine_mut().ram_mut().copy(0x0200, &[0x00, 0x00]); // BRK
        c.machine_mut().ram_mut().set(0xFFFE, 0x00);
        c.machine_mut().ram_mut().set(0xFFFF, 0x02);
        c.machine_mut().ram_mut().set_mapctl(crate::consts::MAPCTL_VEC_BIT);
        c.machine_mut().cpu_mut().set_pc(0x0200);
        c.set_break_on_brk(true);

        let mut buf = vec![0i16; 64];
        assert_eq!(c.advance_audio(44_100, &mut buf), BreakReason::Trap);
    }

    #[test]
    fn bs93_image_boots_into_ram() {
        let mut image = vec![0x04, 0x00];
        image.extend(b"BS93");
        image.extend([0x00; 4]); // rest of the header
        image.extend([0xEA; 32]);
        let c = Core::new(&CoreConfig {
            cart: Some(&image),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(c.machine().cpu().pc(), 0x0400);
        // Payload landed where the header said.
        assert_eq!(c.read_mem(0x0400), 0xEA);
    }

    #[test]
    fn keypad_reaches_the_joystick_register() {
        let mut c = core();
        c.set_input(Keypad::a | Keypad::up);
        let j = c.machine().suzy().registers().data(JOYSTICK);
        // Right-handed default flips the vertical axis: up arrives as
        // the hardware's down bit.
        assert_eq!(j & 0b0100_0000, 0b0100_0000);
        assert_eq!(j & 0b0000_0001, 0b0000_0001);

        c.set_input(Keypad::pause);
        assert!(c
            .machine()
            .suzy()
            .switches()
            .contains(crate::suzy::registers::Switches::pause));
    }

    #[test]
    fn cart_rotation_remaps_the_keypad() {
        use crate::suzy::registers::Joystick;

        let mut image = vec![0u8; 64];
        image[0..4].copy_from_slice(b"LYNX");
        image[5] = 0x02; // 512-byte pages
        image[58] = 2; // rotated right
        image.extend(vec![0u8; 512 * 256]);
        let mut c = Core::new(&CoreConfig {
            cart: Some(&image),
            ..Default::default()
        })
        .unwrap();

        // Up rotates onto left, then the right-handed mirror flips it.
        c.set_input(Keypad::up);
        assert!(c.machine().suzy().joystick().contains(Joystick::right));
    }

    #[test]
    fn invalid_cart_is_rejected() {
        let err = Core::new(&CoreConfig {
            cart: Some(&[1, 2, 3]),
            ..Default::default()
        });
        assert!(err.is_err());
    }
}
