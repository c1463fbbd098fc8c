pub mod math;
pub mod registers;
pub mod renderer;
pub mod sprite_data;

use crate::consts::{
    COLLADRL, COLLBASL, COLLOFFL, HOFFL, HPOSSTRTL, HSIZOFFL, JOYSTICK, MATHA, MATHB, MATHC,
    MATHD, MATHE, MATHF, MATHH, MATHK, MATHM, MATHP, PROCADRL, SCBADRL, SCBNEXTL, SPRDLINEL,
    SPRDOFFL, SPRGO, SPRGO_EVERON, SPRGO_GO, SPRHSIZL, SPRSYS, SPRVPOSL, SPRVSIZL, STRETCHL,
    SWITCHES, TILTACUML, TILTL, TMPADRL, VIDADRL, VIDBASL, VOFFL, VPOSSTRTL, VSIZACUML, VSIZOFFL,
};
use crate::ram::Ram;
use log::trace;
use registers::{Joystick, SprSysR, Switches, SuzyRegisters};
use renderer::Renderer;
use serde::{Deserialize, Serialize};

/// Suzy: the sprite/blitter engine and the hardware math unit, behind
/// the FC00 register page.
#[derive(Clone, Serialize, Deserialize)]
pub struct Suzy {
    registers: SuzyRegisters,
    renderer: Renderer,
    math_busy_until: u64,
}

impl Suzy {
    #[must_use]
    pub fn new() -> Self {
        let mut s = Self {
            registers: SuzyRegisters::new(),
            renderer: Renderer::new(),
            math_busy_until: 0,
        };
        s.registers.set_data(crate::consts::SUZYBUSEN, 1);
        s
    }

    #[must_use]
    pub fn read(&self, addr: u16, now: u64) -> u8 {
        match addr {
            SPRSYS => {
                let mut v = self.registers.sprsys_r().bits() & !SprSysR::math_working.bits();
                if now < self.math_busy_until {
                    v |= SprSysR::math_working.bits();
                }
                v
            }
            TMPADRL..=SWITCHES => self.registers.data(addr),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8, now: u64) {
        match addr {
            // The math unit triggers on its upper operand bytes.
            MATHA => {
                let busy = math::write_matha(&mut self.registers, value);
                self.math_busy_until = now + u64::from(busy);
            }
            MATHC => math::write_mathc(&mut self.registers, value),
            MATHE => {
                let busy = math::write_mathe(&mut self.registers, value);
                self.math_busy_until = now + u64::from(busy);
            }
            MATHM => math::write_mathm(&mut self.registers, value),

            // "Any CPU write to an LSB will set the MSB to 0."
            TMPADRL | TILTACUML | HOFFL | VOFFL | VIDBASL | COLLBASL | VIDADRL | COLLADRL
            | SCBNEXTL | SPRDLINEL | HPOSSTRTL | VPOSSTRTL | SPRHSIZL | SPRVSIZL | STRETCHL
            | TILTL | SPRDOFFL | SPRVPOSL | COLLOFFL | VSIZACUML | HSIZOFFL | VSIZOFFL | SCBADRL
            | PROCADRL | MATHB | MATHD | MATHF | MATHH | MATHK | MATHP => {
                self.registers.set_u16(addr, u16::from(value));
            }

            SPRSYS => self.registers.set_sprsys(value),
            SPRGO => {
                self.registers.set_data(SPRGO, value);
                if value & SPRGO_GO != 0 {
                    self.renderer
                        .start(&mut self.registers, value & SPRGO_EVERON != 0);
                }
            }
            TMPADRL..=SWITCHES => self.registers.set_data(addr, value),
            _ => trace!("write to unmapped suzy address 0x{addr:04X}"),
        }
    }

    /// True while the paint engine owns the bus and the CPU is parked.
    #[must_use]
    pub fn sprite_active(&self) -> bool {
        self.renderer.active()
    }

    /// One engine phase; returns the ticks it spent on memory.
    pub fn render_step(&mut self, ram: &mut Ram) -> u32 {
        let ticks = self.renderer.step(&mut self.registers, ram);
        if !self.renderer.active() {
            // Engine finished: drop the go bit.
            let go = self.registers.data(SPRGO);
            self.registers.set_data(SPRGO, go & !SPRGO_GO);
        }
        ticks
    }

    pub fn set_joystick(&mut self, joy: u8) {
        self.registers.set_data(JOYSTICK, joy);
    }

    pub fn set_switches(&mut self, sw: u8) {
        self.registers.set_data(SWITCHES, sw);
    }

    #[must_use]
    pub fn joystick(&self) -> Joystick {
        self.registers.joystick()
    }

    #[must_use]
    pub fn switches(&self) -> Switches {
        self.registers.switches()
    }

    #[must_use]
    pub fn left_handed(&self) -> bool {
        self.registers.sprsys_r_has(SprSysR::left_handed)
    }

    #[must_use]
    pub fn registers(&self) -> &SuzyRegisters {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut SuzyRegisters {
        &mut self.registers
    }
}

impl Default for Suzy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a minimal one-pixel SCB chain in RAM and runs the engine
    /// to completion, returning the RAM image.
    fn run_sprite(scb: &[u8], data: &[u8], setup: impl Fn(&mut Suzy)) -> (Suzy, Ram) {
        let mut ram = Ram::new();
        ram.fill(0);
        ram.copy(0x0400, scb);
        ram.copy(0x0500, data);

        let mut suzy = Suzy::new();
        // Video buffer at 0x2000, collision buffer at 0x3000.
        suzy.registers_mut().set_u16(VIDBASL, 0x2000);
        suzy.registers_mut().set_u16(COLLBASL, 0x3000);
        suzy.registers_mut().set_u16(COLLOFFL, 2);
        suzy.registers_mut().set_u16(SCBNEXTL, 0x0400);
        setup(&mut suzy);
        suzy.write(SPRGO, SPRGO_GO, 0);

        let mut guard = 0;
        while suzy.sprite_active() {
            suzy.render_step(&mut ram);
            guard += 1;
            assert!(guard < 100_000, "sprite engine failed to terminate");
        }
        (suzy, ram)
    }

    /// A 1x1 literal 4bpp sprite of pen 1 at (10, 10).
    fn tiny_scb(sprite_type: u8, coll_number: u8, x: u8, y: u8) -> Vec<u8> {
        vec![
            0b1100_0000 | sprite_type,      // SPRCTL0: 4bpp
            SPRCTL1_LITERAL_AND_RELOAD_NONE, // SPRCTL1: literal, no reload
            coll_number,                     // SPRCOLL
            0x00, 0x00, // SCBNEXT: end of chain
            0x00, 0x05, // SPRDLINE -> 0x0500
            x, 0x00, // HPOSSTRT
            y, 0x00, // VPOSSTRT
        ]
    }

    // Literal, reuse palette off would need 8 palette bytes; reuse
    // palette keeps the identity mapping set below.
    const SPRCTL1_LITERAL_AND_RELOAD_NONE: u8 = 0b1000_1000;

    fn unit_scale(suzy: &mut Suzy) {
        // hsize/vsize 0x100 = one screen pixel per source pixel.
        let r = suzy.registers_mut();
        r.set_u16(SPRHSIZL, 0x0100);
        r.set_u16(SPRVSIZL, 0x0100);
    }

    // Sprite data for one line: sprdoff 2, then one 4bpp pen "1" plus
    // padding. Literal line: budget = (2-1)*8 = 8 bits -> pens 0x1, then
    // 0x0 suppressed as trailing zero.
    const TINY_LINE: [u8; 4] = [0x02, 0x10, 0x00, 0x00];

    #[test]
    fn tiny_sprite_writes_one_nibble() {
        let mut scb = tiny_scb(4, 1, 10, 10);
        // Append a palette mapping pen n -> n.
        scb[1] = 0b1000_0000; // literal, no reload, load palette
        scb.extend_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);

        let (_, ram) = run_sprite(&scb, &TINY_LINE, unit_scale);

        // voff 10, hoff 10 -> byte 0x2000 + 10*80 + 5, high nibble.
        let addr = 0x2000 + 10 * 80 + 5;
        assert_eq!(ram.get(addr), 0x10);
        // A single write, nothing else on the row.
        assert_eq!(ram.get(addr - 1), 0);
        assert_eq!(ram.get(addr + 1), 0);
        // Collision buffer got the collision number.
        assert_eq!(ram.get(0x3000 + 10 * 80 + 5), 0x10);
        // Depository: nothing was read underneath, so 0.
        assert_eq!(ram.get(0x0400 + 2), 0x00);
    }

    #[test]
    fn overlapping_sprites_report_each_other() {
        let mut scb_a = tiny_scb(4, 1, 10, 10);
        scb_a[1] = 0b1000_0000;
        scb_a.extend_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
        let mut scb_b = tiny_scb(4, 2, 10, 10);
        scb_b[1] = 0b1000_0000;
        scb_b.extend_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);

        let mut ram = Ram::new();
        ram.fill(0);
        ram.copy(0x0400, &scb_a);
        ram.copy(0x0440, &scb_b);
        ram.copy(0x0500, &TINY_LINE);
        // Chain A -> B.
        ram.set(0x0403, 0x40);
        ram.set(0x0404, 0x04);

        let mut suzy = Suzy::new();
        suzy.registers_mut().set_u16(VIDBASL, 0x2000);
        suzy.registers_mut().set_u16(COLLBASL, 0x3000);
        suzy.registers_mut().set_u16(COLLOFFL, 2);
        suzy.registers_mut().set_u16(SCBNEXTL, 0x0400);
        suzy.registers_mut().set_u16(SPRHSIZL, 0x0100);
        suzy.registers_mut().set_u16(SPRVSIZL, 0x0100);
        suzy.write(SPRGO, SPRGO_GO, 0);

        let mut guard = 0;
        while suzy.sprite_active() {
            suzy.render_step(&mut ram);
            guard += 1;
            assert!(guard < 100_000);
        }

        // B read A's number where they overlap.
        assert_eq!(ram.get(0x0440 + 2), 1);
        // A drew first over an empty buffer.
        assert_eq!(ram.get(0x0400 + 2), 0);

        // Re-running A now reads B's number.
        suzy.registers_mut().set_u16(SCBNEXTL, 0x0400);
        ram.set(0x0403, 0x00);
        ram.set(0x0404, 0x00);
        suzy.write(SPRGO, SPRGO_GO, 0);
        let mut guard = 0;
        while suzy.sprite_active() {
            suzy.render_step(&mut ram);
            guard += 1;
            assert!(guard < 100_000);
        }
        assert_eq!(ram.get(0x0400 + 2), 2);
    }

    #[test]
    fn skip_bit_ends_processing() {
        let mut scb = tiny_scb(4, 0, 10, 10);
        scb[1] |= crate::consts::SPRCTL1_SKIP_SPRITE;
        let (suzy, ram) = run_sprite(&scb, &TINY_LINE, |_| ());
        assert!(!suzy.sprite_active());
        // Nothing drawn.
        assert_eq!(ram.get(0x2000 + 10 * 80 + 5), 0);
    }

    #[test]
    fn math_registers_via_page_writes() {
        let mut suzy = Suzy::new();
        // 300 * 200: operands land low byte first, upper bytes trigger.
        suzy.write(MATHD, 200, 0);
        suzy.write(MATHC, 0, 0);
        suzy.write(MATHB, 44, 0);
        suzy.write(MATHA, 1, 0);
        assert_eq!(suzy.registers().efgh(), 300 * 200);

        // The unit reports busy until its tick budget elapses.
        assert!(suzy.read(SPRSYS, 1) & 0x80 != 0);
        assert!(suzy.read(SPRSYS, 10_000) & 0x80 == 0);
    }

    #[test]
    fn lsb_write_clears_msb() {
        let mut suzy = Suzy::new();
        suzy.registers_mut().set_u16(HPOSSTRTL, 0x1234);
        suzy.write(HPOSSTRTL, 0x56, 0);
        assert_eq!(suzy.registers().u16(HPOSSTRTL), 0x0056);
    }
}
