use crate::consts::{
    HSIZOFFL, JOYSTICK, MATHB, MATHD, MATHH, MATHM, MATHP, SPRCOLL, SPRCTL0, SPRCTL0_BPP, SPRCTL1,
    SPRCTL1_DRAW_QUAD, SUZYHREV, SUZ_ADDR, SWITCHES, VSIZOFFL,
};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// SPRSYS as the CPU reads it.
    #[derive(Copy, Clone, Debug, Serialize, Deserialize)]
    pub struct SprSysR: u8 {
        const math_working   = 0b1000_0000;
        const math_warning   = 0b0100_0000;
        const math_carry     = 0b0010_0000;
        const v_stretching   = 0b0001_0000;
        const left_handed    = 0b0000_1000;
        const unsafe_access  = 0b0000_0100;
        const sprite_to_stop = 0b0000_0010;
        const sprite_working = 0b0000_0001;
    }
}

bitflags! {
    /// SPRSYS as the CPU writes it.
    #[derive(Copy, Clone, Debug, Serialize, Deserialize)]
    pub struct SprSysW: u8 {
        const sign_math      = 0b1000_0000;
        const accumulate     = 0b0100_0000;
        const no_collide     = 0b0010_0000;
        const v_stretching   = 0b0001_0000;
        const left_handed    = 0b0000_1000;
        const clear_unsafe   = 0b0000_0100;
        const sprite_to_stop = 0b0000_0010;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Joystick: u8 {
        const up       = 0b1000_0000;
        const down     = 0b0100_0000;
        const left     = 0b0010_0000;
        const right    = 0b0001_0000;
        const option_1 = 0b0000_1000;
        const option_2 = 0b0000_0100;
        const inside   = 0b0000_0010;
        const outside  = 0b0000_0001;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Switches: u8 {
        const cart1_inactive = 0b0000_0100;
        const cart0_inactive = 0b0000_0010;
        const pause          = 0b0000_0001;
    }
}

#[must_use]
pub fn joystick_swap(mut j: Joystick, b1: Joystick, b2: Joystick) -> Joystick {
    let b1_set = j.contains(b1);
    j.set(b1, j.contains(b2));
    j.set(b2, b1_set);
    j
}

/// Suzy's register page plus the math-unit sign bookkeeping that has no
/// CPU-visible address.
#[derive(Clone, Serialize, Deserialize)]
pub struct SuzyRegisters {
    data: Vec<u8>,
    sprsys_r: SprSysR,
    sprsys_w: SprSysW,
    sign_ab: i8,
    sign_cd: i8,
    tmp_cd: u16,
    tmp_sign_cd: i8,
}

impl SuzyRegisters {
    #[must_use]
    pub fn new() -> Self {
        let mut r = Self {
            data: vec![0; 0x100],
            sprsys_r: SprSysR::empty(),
            sprsys_w: SprSysW::empty(),
            sign_ab: 1,
            sign_cd: 1,
            tmp_cd: 0,
            tmp_sign_cd: 1,
        };
        r.set_data(SUZYHREV, 1);
        r.set_u32(MATHD, 0xFFFF_FFFF);
        r.set_u32(MATHH, 0xFFFF_FFFF);
        r.set_u32(MATHM, 0xFFFF_FFFF);
        r.set_u16(MATHP, 0xFFFF);
        r.set_data(HSIZOFFL, 0x7F);
        r.set_data(VSIZOFFL, 0x7F);
        r.set_data(SWITCHES, 0b110);
        r
    }

    #[inline]
    #[must_use]
    pub fn data(&self, addr: u16) -> u8 {
        self.data[(addr - SUZ_ADDR) as usize]
    }

    #[inline]
    pub fn set_data(&mut self, addr: u16, value: u8) {
        self.data[(addr - SUZ_ADDR) as usize] = value;
    }

    #[inline]
    #[must_use]
    pub fn u16(&self, addr: u16) -> u16 {
        u16::from(self.data(addr)) | (u16::from(self.data(addr + 1)) << 8)
    }

    #[inline]
    #[must_use]
    pub fn i16(&self, addr: u16) -> i16 {
        self.u16(addr) as i16
    }

    #[inline]
    pub fn set_u16(&mut self, addr: u16, value: u16) {
        self.set_data(addr, (value & 0xFF) as u8);
        self.set_data(addr + 1, (value >> 8) as u8);
    }

    #[inline]
    pub fn set_i16(&mut self, addr: u16, value: i16) {
        self.set_u16(addr, value as u16);
    }

    #[inline]
    pub fn add_u16(&mut self, addr: u16, value: u16) {
        let v = self.u16(addr).wrapping_add(value);
        self.set_u16(addr, v);
    }

    #[inline]
    #[must_use]
    pub fn u32(&self, addr: u16) -> u32 {
        u32::from(self.data(addr))
            | (u32::from(self.data(addr + 1)) << 8)
            | (u32::from(self.data(addr + 2)) << 16)
            | (u32::from(self.data(addr + 3)) << 24)
    }

    #[inline]
    pub fn set_u32(&mut self, addr: u16, value: u32) {
        self.set_data(addr, (value & 0xFF) as u8);
        self.set_data(addr + 1, ((value >> 8) & 0xFF) as u8);
        self.set_data(addr + 2, ((value >> 16) & 0xFF) as u8);
        self.set_data(addr + 3, ((value >> 24) & 0xFF) as u8);
    }

    // Math operand views: AB and CD multiply into EFGH, EFGH over NP
    // divides into ABCD with remainder JKLM.

    #[inline]
    #[must_use]
    pub fn ab(&self) -> u16 {
        self.u16(MATHB)
    }

    #[inline]
    #[must_use]
    pub fn cd(&self) -> u16 {
        self.u16(MATHD)
    }

    #[inline]
    #[must_use]
    pub fn np(&self) -> u16 {
        self.u16(MATHP)
    }

    #[inline]
    #[must_use]
    pub fn abcd(&self) -> u32 {
        self.u32(MATHD)
    }

    #[inline]
    #[must_use]
    pub fn efgh(&self) -> u32 {
        self.u32(MATHH)
    }

    #[inline]
    #[must_use]
    pub fn jklm(&self) -> u32 {
        self.u32(MATHM)
    }

    #[inline]
    pub fn set_ab(&mut self, v: u16) {
        self.set_u16(MATHB, v);
    }

    #[inline]
    pub fn set_cd(&mut self, v: u16) {
        self.set_u16(MATHD, v);
    }

    #[inline]
    pub fn set_abcd(&mut self, v: u32) {
        self.set_u32(MATHD, v);
    }

    #[inline]
    pub fn set_efgh(&mut self, v: u32) {
        self.set_u32(MATHH, v);
    }

    #[inline]
    pub fn set_jklm(&mut self, v: u32) {
        self.set_u32(MATHM, v);
    }

    #[inline]
    #[must_use]
    pub fn sign_ab(&self) -> i8 {
        self.sign_ab
    }

    #[inline]
    pub fn set_sign_ab(&mut self, sign: i8) {
        self.sign_ab = sign;
    }

    #[inline]
    #[must_use]
    pub fn sign_cd(&self) -> i8 {
        self.sign_cd
    }

    #[inline]
    pub fn set_sign_cd(&mut self, sign: i8) {
        self.sign_cd = sign;
    }

    /// CD is latched when the multiply starts so a rewrite during the
    /// operation cannot corrupt it.
    #[inline]
    pub fn latch_cd(&mut self) {
        self.tmp_cd = self.cd();
        self.tmp_sign_cd = self.sign_cd;
    }

    #[inline]
    #[must_use]
    pub fn latched_cd(&self) -> u16 {
        self.tmp_cd
    }

    #[inline]
    #[must_use]
    pub fn latched_sign_cd(&self) -> i8 {
        self.tmp_sign_cd
    }

    // SPRSYS views.

    #[inline]
    #[must_use]
    pub fn sprsys_r(&self) -> SprSysR {
        self.sprsys_r
    }

    #[inline]
    pub fn sprsys_r_set(&mut self, flag: SprSysR, on: bool) {
        self.sprsys_r.set(flag, on);
    }

    #[inline]
    #[must_use]
    pub fn sprsys_r_has(&self, flag: SprSysR) -> bool {
        self.sprsys_r.contains(flag)
    }

    #[inline]
    #[must_use]
    pub fn sprsys_w_has(&self, flag: SprSysW) -> bool {
        self.sprsys_w.contains(flag)
    }

    pub fn set_sprsys(&mut self, v: u8) {
        self.sprsys_w = SprSysW::from_bits_truncate(v);
        self.sprsys_r
            .set(SprSysR::v_stretching, self.sprsys_w_has(SprSysW::v_stretching));
        self.sprsys_r
            .set(SprSysR::left_handed, self.sprsys_w_has(SprSysW::left_handed));
        if self.sprsys_w_has(SprSysW::sprite_to_stop) {
            self.sprsys_r_set(SprSysR::sprite_to_stop, true);
        }
        if self.sprsys_w_has(SprSysW::clear_unsafe) {
            self.sprsys_r_set(SprSysR::unsafe_access, false);
        }
    }

    // Sprite control shorthands.

    #[inline]
    #[must_use]
    pub fn sprctl0(&self) -> u8 {
        self.data(SPRCTL0)
    }

    #[inline]
    #[must_use]
    pub fn sprctl1(&self) -> u8 {
        self.data(SPRCTL1)
    }

    #[inline]
    #[must_use]
    pub fn sprcoll(&self) -> u8 {
        self.data(SPRCOLL)
    }

    #[inline]
    #[must_use]
    pub fn bpp(&self) -> u8 {
        ((self.data(SPRCTL0) & SPRCTL0_BPP) >> 6) + 1
    }

    #[inline]
    #[must_use]
    pub fn start_quadrant(&self) -> u8 {
        static ORDER: [u8; 4] = [0, 3, 1, 2];
        ORDER[(self.sprctl1() & SPRCTL1_DRAW_QUAD) as usize]
    }

    #[inline]
    #[must_use]
    pub fn joystick(&self) -> Joystick {
        Joystick::from_bits_truncate(self.data(JOYSTICK))
    }

    #[inline]
    #[must_use]
    pub fn switches(&self) -> Switches {
        Switches::from_bits_truncate(self.data(SWITCHES))
    }
}

impl Default for SuzyRegisters {
    fn default() -> Self {
        Self::new()
    }
}
