use bitflags::bitflags;
use log::trace;
use serde::{Deserialize, Serialize};

/// Bus seam for the CPU. Every cycle of every instruction, dummy cycles
/// included, goes through one of these two calls so the implementor can
/// bill ticks and advance the rest of the machine.
pub trait Memory {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

bitflags! {
    /// Status byte layout used by PHP/PLP/BRK/RTI. The live flags are the
    /// independent booleans on `Cpu`; this view only exists on the stack.
    #[derive(Copy, Clone, Debug, Serialize, Deserialize)]
    pub struct Status: u8 {
        const N = 0b1000_0000;
        const V = 0b0100_0000;
        const X = 0b0010_0000;
        const B = 0b0001_0000;
        const D = 0b0000_1000;
        const I = 0b0000_0100;
        const Z = 0b0000_0010;
        const C = 0b0000_0001;
    }
}

const STACK_PAGE: u16 = 0x0100;

/// WDC 65C02 interpreter. `step` executes exactly one instruction (or one
/// interrupt entry); interrupts are sampled only at that boundary, NMI on
/// its edge, IRQ by level and masked by I.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    s: u8,
    pc: u16,
    n: bool,
    v: bool,
    d: bool,
    i: bool,
    z: bool,
    c: bool,
    irq_line: bool,
    nmi_line: bool,
    nmi_latch: bool,
    break_on_brk: bool,
    brk_trapped: bool,
    last_ir_pc: u16,
}

impl Cpu {
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFF,
            pc: 0,
            n: false,
            v: false,
            d: false,
            i: true,
            z: false,
            c: false,
            irq_line: false,
            nmi_line: false,
            nmi_latch: false,
            break_on_brk: false,
            brk_trapped: false,
            last_ir_pc: 0,
        }
    }

    pub fn reset(&mut self, reset_vector: u16) {
        self.s = self.s.wrapping_sub(3);
        self.i = true;
        self.d = false;
        self.pc = reset_vector;
        self.nmi_latch = false;
        self.brk_trapped = false;
        trace!("CPU reset -> {:04X}", reset_vector);
    }

    // Interrupt pins. `set_nmi` latches on the rising edge only.

    pub fn set_irq(&mut self, level: bool) {
        self.irq_line = level;
    }

    pub fn set_nmi(&mut self, level: bool) {
        if level && !self.nmi_line {
            self.nmi_latch = true;
        }
        self.nmi_line = level;
    }

    pub fn set_break_on_brk(&mut self, enabled: bool) {
        self.break_on_brk = enabled;
    }

    /// Returns true once after a BRK executed with break-on-BRK armed.
    pub fn take_brk_trap(&mut self) -> bool {
        core::mem::replace(&mut self.brk_trapped, false)
    }

    /// Executes one instruction, or services a pending interrupt instead.
    pub fn step(&mut self, m: &mut impl Memory) {
        if self.nmi_latch {
            self.nmi_latch = false;
            self.enter_interrupt(m, 0xFFFA);
            return;
        }
        if self.irq_line && !self.i {
            self.enter_interrupt(m, 0xFFFE);
            return;
        }

        self.last_ir_pc = self.pc;
        let op = self.fetch(m);
        self.execute(m, op);
    }

    /// Seven-cycle hardware interrupt entry: two dead fetches, three
    /// pushes with B clear, then the vector through the mapped window.
    fn enter_interrupt(&mut self, m: &mut impl Memory, vector_addr: u16) {
        m.read(self.pc);
        m.read(self.pc);
        self.push(m, (self.pc >> 8) as u8);
        self.push(m, self.pc as u8);
        self.push(m, (self.status() & !Status::B).bits());
        self.i = true;
        self.d = false;
        let lo = m.read(vector_addr);
        let hi = m.read(vector_addr.wrapping_add(1));
        self.pc = u16::from(lo) | (u16::from(hi) << 8);
        trace!("interrupt -> {:04X}", self.pc);
    }

    // Register and flag access for the debugger surface.

    #[must_use]
    pub fn a(&self) -> u8 {
        self.a
    }

    #[must_use]
    pub fn x(&self) -> u8 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> u8 {
        self.y
    }

    #[must_use]
    pub fn s(&self) -> u8 {
        self.s
    }

    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    #[must_use]
    pub fn last_ir_pc(&self) -> u16 {
        self.last_ir_pc
    }

    #[must_use]
    pub fn status(&self) -> Status {
        let mut p = Status::X | Status::B;
        p.set(Status::N, self.n);
        p.set(Status::V, self.v);
        p.set(Status::D, self.d);
        p.set(Status::I, self.i);
        p.set(Status::Z, self.z);
        p.set(Status::C, self.c);
        p
    }

    pub fn set_status(&mut self, p: Status) {
        self.n = p.contains(Status::N);
        self.v = p.contains(Status::V);
        self.d = p.contains(Status::D);
        self.i = p.contains(Status::I);
        self.z = p.contains(Status::Z);
        self.c = p.contains(Status::C);
    }

    // Fetch/stack primitives.

    fn fetch(&mut self, m: &mut impl Memory) -> u8 {
        let v = m.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    fn fetch_u16(&mut self, m: &mut impl Memory) -> u16 {
        let lo = self.fetch(m);
        let hi = self.fetch(m);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn push(&mut self, m: &mut impl Memory, v: u8) {
        m.write(STACK_PAGE | u16::from(self.s), v);
        self.s = self.s.wrapping_sub(1);
    }

    fn pull(&mut self, m: &mut impl Memory) -> u8 {
        self.s = self.s.wrapping_add(1);
        m.read(STACK_PAGE | u16::from(self.s))
    }

    /// The idle cycle every implied instruction spends re-reading the
    /// opcode stream.
    fn idle(&mut self, m: &mut impl Memory) {
        m.read(self.pc);
    }

    // Addressing modes. Each performs the documented memory traffic,
    // dummy cycles included.

    fn zp(&mut self, m: &mut impl Memory) -> u16 {
        u16::from(self.fetch(m))
    }

    fn zp_x(&mut self, m: &mut impl Memory) -> u16 {
        let base = self.fetch(m);
        m.read(u16::from(base));
        u16::from(base.wrapping_add(self.x))
    }

    fn zp_y(&mut self, m: &mut impl Memory) -> u16 {
        let base = self.fetch(m);
        m.read(u16::from(base));
        u16::from(base.wrapping_add(self.y))
    }

    fn abs(&mut self, m: &mut impl Memory) -> u16 {
        self.fetch_u16(m)
    }

    fn abs_x_read(&mut self, m: &mut impl Memory) -> u16 {
        let base = self.fetch_u16(m);
        let addr = base.wrapping_add(u16::from(self.x));
        if (base ^ addr) & 0xFF00 != 0 {
            m.read((base & 0xFF00) | (addr & 0x00FF));
        }
        addr
    }

    fn abs_y_read(&mut self, m: &mut impl Memory) -> u16 {
        let base = self.fetch_u16(m);
        let addr = base.wrapping_add(u16::from(self.y));
        if (base ^ addr) & 0xFF00 != 0 {
            m.read((base & 0xFF00) | (addr & 0x00FF));
        }
        addr
    }

    fn abs_x_write(&mut self, m: &mut impl Memory) -> u16 {
        let base = self.fetch_u16(m);
        let addr = base.wrapping_add(u16::from(self.x));
        m.read((base & 0xFF00) | (addr & 0x00FF));
        addr
    }

    fn abs_y_write(&mut self, m: &mut impl Memory) -> u16 {
        let base = self.fetch_u16(m);
        let addr = base.wrapping_add(u16::from(self.y));
        m.read((base & 0xFF00) | (addr & 0x00FF));
        addr
    }

    fn ind_x(&mut self, m: &mut impl Memory) -> u16 {
        let base = self.fetch(m);
        m.read(u16::from(base));
        let ptr = base.wrapping_add(self.x);
        let lo = m.read(u16::from(ptr));
        let hi = m.read(u16::from(ptr.wrapping_add(1)));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn ind_y_read(&mut self, m: &mut impl Memory) -> u16 {
        let ptr = self.fetch(m);
        let lo = m.read(u16::from(ptr));
        let hi = m.read(u16::from(ptr.wrapping_add(1)));
        let base = u16::from(lo) | (u16::from(hi) << 8);
        let addr = base.wrapping_add(u16::from(self.y));
        if (base ^ addr) & 0xFF00 != 0 {
            m.read((base & 0xFF00) | (addr & 0x00FF));
        }
        addr
    }

    fn ind_y_write(&mut self, m: &mut impl Memory) -> u16 {
        let ptr = self.fetch(m);
        let lo = m.read(u16::from(ptr));
        let hi = m.read(u16::from(ptr.wrapping_add(1)));
        let base = u16::from(lo) | (u16::from(hi) << 8);
        let addr = base.wrapping_add(u16::from(self.y));
        m.read((base & 0xFF00) | (addr & 0x00FF));
        addr
    }

    /// 65C02 (zp) with no index.
    fn ind_zp(&mut self, m: &mut impl Memory) -> u16 {
        let ptr = self.fetch(m);
        let lo = m.read(u16::from(ptr));
        let hi = m.read(u16::from(ptr.wrapping_add(1)));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Read-modify-write: the unmodified value is written back before the
    /// result.
    fn rmw(&mut self, m: &mut impl Memory, addr: u16, f: impl FnOnce(&mut Self, u8) -> u8) {
        let old = m.read(addr);
        m.write(addr, old);
        let new = f(self, old);
        m.write(addr, new);
    }

    fn branch(&mut self, m: &mut impl Memory, cond: bool) {
        let rel = self.fetch(m) as i8;
        if !cond {
            return;
        }
        m.read(self.pc);
        let target = self.pc.wrapping_add(rel as u16);
        if (target ^ self.pc) & 0xFF00 != 0 {
            m.read((self.pc & 0xFF00) | (target & 0x00FF));
        }
        self.pc = target;
    }

    // ALU.

    fn set_nz(&mut self, v: u8) {
        self.n = v & 0x80 != 0;
        self.z = v == 0;
    }

    fn adc(&mut self, m: &mut impl Memory, value: u8) {
        let carry = i32::from(self.c);
        let a = i32::from(self.a);
        let val = i32::from(value);
        if self.d {
            let mut lo = (a & 0x0F) + (val & 0x0F) + carry;
            let mut hi = (a & 0xF0) + (val & 0xF0);
            if lo > 0x09 {
                hi += 0x10;
                lo += 0x06;
            }
            self.v = !(a ^ val) & (a ^ hi) & 0x80 != 0;
            if hi > 0x90 {
                hi += 0x60;
            }
            self.c = hi & 0xFF00 != 0;
            self.a = ((lo & 0x0F) + (hi & 0xF0)) as u8;
            // Decimal mode spends one extra cycle fixing the flags up.
            self.idle(m);
        } else {
            let sum = a + val + carry;
            self.v = !(a ^ val) & (a ^ sum) & 0x80 != 0;
            self.c = sum & 0xFF00 != 0;
            self.a = sum as u8;
        }
        self.set_nz(self.a);
    }

    fn sbc(&mut self, m: &mut impl Memory, value: u8) {
        let borrow = i32::from(!self.c);
        let a = i32::from(self.a);
        let val = i32::from(value);
        let diff = a - val - borrow;
        self.v = (a ^ val) & (a ^ diff) & 0x80 != 0;
        self.c = diff & 0xFF00 == 0;
        if self.d {
            let mut lo = (a & 0x0F) - (val & 0x0F) - borrow;
            let mut hi = (a & 0xF0) - (val & 0xF0);
            if lo & 0xF0 != 0 {
                lo -= 6;
            }
            if lo & 0x80 != 0 {
                hi -= 0x10;
            }
            if hi & 0x0F00 != 0 {
                hi -= 0x60;
            }
            self.a = ((lo & 0x0F) + (hi & 0xF0)) as u8;
            self.idle(m);
        } else {
            self.a = diff as u8;
        }
        self.set_nz(self.a);
    }

    fn cmp(&mut self, reg: u8, value: u8) {
        self.c = reg >= value;
        self.set_nz(reg.wrapping_sub(value));
    }

    fn bit(&mut self, value: u8) {
        self.z = self.a & value == 0;
        self.n = value & 0x80 != 0;
        self.v = value & 0x40 != 0;
    }

    fn asl(&mut self, v: u8) -> u8 {
        self.c = v & 0x80 != 0;
        let r = v << 1;
        self.set_nz(r);
        r
    }

    fn lsr(&mut self, v: u8) -> u8 {
        self.c = v & 0x01 != 0;
        let r = v >> 1;
        self.set_nz(r);
        r
    }

    fn rol(&mut self, v: u8) -> u8 {
        let r = (v << 1) | u8::from(self.c);
        self.c = v & 0x80 != 0;
        self.set_nz(r);
        r
    }

    fn ror(&mut self, v: u8) -> u8 {
        let r = (v >> 1) | (u8::from(self.c) << 7);
        self.c = v & 0x01 != 0;
        self.set_nz(r);
        r
    }

    fn inc(&mut self, v: u8) -> u8 {
        let r = v.wrapping_add(1);
        self.set_nz(r);
        r
    }

    fn dec(&mut self, v: u8) -> u8 {
        let r = v.wrapping_sub(1);
        self.set_nz(r);
        r
    }

    fn tsb(&mut self, v: u8) -> u8 {
        self.z = self.a & v == 0;
        v | self.a
    }

    fn trb(&mut self, v: u8) -> u8 {
        self.z = self.a & v == 0;
        v & !self.a
    }

    fn lda(&mut self, v: u8) {
        self.a = v;
        self.set_nz(v);
    }

    fn ldx(&mut self, v: u8) {
        self.x = v;
        self.set_nz(v);
    }

    fn ldy(&mut self, v: u8) {
        self.y = v;
        self.set_nz(v);
    }

    fn brk(&mut self, m: &mut impl Memory) {
        // The byte after BRK is a signature the sequencer skips, so the
        // pushed return address is BRK+2.
        self.fetch(m);
        self.push(m, (self.pc >> 8) as u8);
        self.push(m, self.pc as u8);
        self.push(m, (self.status() | Status::B).bits());
        self.i = true;
        self.d = false;
        self.pc = u16::from(m.read(0xFFFE)) | (u16::from(m.read(0xFFFF)) << 8);
        if self.break_on_brk {
            self.brk_trapped = true;
        }
        trace!("BRK -> {:04X}", self.pc);
    }

    /// Branch-on-bit with the operand read folded in (Rockwell BBR/BBS).
    fn branch_on_bit(&mut self, m: &mut impl Memory, bit: u8, set: bool) {
        let zp = self.zp(m);
        let v = m.read(zp);
        m.read(zp);
        let taken = ((v >> bit) & 1 != 0) == set;
        self.branch(m, taken);
    }

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, m: &mut impl Memory, op: u8) {
        match op {
            // Control flow.
            0x00 => self.brk(m),
            0x4C => self.pc = self.abs(m),
            0x6C => {
                let ptr = self.fetch_u16(m);
                m.read(self.pc.wrapping_sub(1));
                let lo = m.read(ptr);
                let hi = m.read(ptr.wrapping_add(1));
                self.pc = u16::from(lo) | (u16::from(hi) << 8);
            }
            0x7C => {
                let ptr = self.fetch_u16(m).wrapping_add(u16::from(self.x));
                m.read(self.pc.wrapping_sub(1));
                let lo = m.read(ptr);
                let hi = m.read(ptr.wrapping_add(1));
                self.pc = u16::from(lo) | (u16::from(hi) << 8);
            }
            0x20 => {
                let lo = self.fetch(m);
                m.read(STACK_PAGE | u16::from(self.s));
                self.push(m, (self.pc >> 8) as u8);
                self.push(m, self.pc as u8);
                let hi = self.fetch(m);
                self.pc = u16::from(lo) | (u16::from(hi) << 8);
            }
            0x60 => {
                self.idle(m);
                m.read(STACK_PAGE | u16::from(self.s));
                let lo = self.pull(m);
                let hi = self.pull(m);
                self.pc = (u16::from(lo) | (u16::from(hi) << 8)).wrapping_add(1);
                m.read(self.pc);
            }
            0x40 => {
                self.idle(m);
                m.read(STACK_PAGE | u16::from(self.s));
                let p = self.pull(m);
                self.set_status(Status::from_bits_truncate(p));
                let lo = self.pull(m);
                let hi = self.pull(m);
                self.pc = u16::from(lo) | (u16::from(hi) << 8);
            }

            // Branches.
            0x10 => self.branch(m, !self.n),
            0x30 => self.branch(m, self.n),
            0x50 => self.branch(m, !self.v),
            0x70 => self.branch(m, self.v),
            0x90 => self.branch(m, !self.c),
            0xB0 => self.branch(m, self.c),
            0xD0 => self.branch(m, !self.z),
            0xF0 => self.branch(m, self.z),
            0x80 => self.branch(m, true),

            // Stack.
            0x08 => {
                self.idle(m);
                self.push(m, (self.status() | Status::B | Status::X).bits());
            }
            0x28 => {
                self.idle(m);
                m.read(STACK_PAGE | u16::from(self.s));
                let p = self.pull(m);
                self.set_status(Status::from_bits_truncate(p));
            }
            0x48 => {
                self.idle(m);
                self.push(m, self.a);
            }
            0x68 => {
                self.idle(m);
                m.read(STACK_PAGE | u16::from(self.s));
                let v = self.pull(m);
                self.lda(v);
            }
            0x5A => {
                self.idle(m);
                self.push(m, self.y);
            }
            0x7A => {
                self.idle(m);
                m.read(STACK_PAGE | u16::from(self.s));
                let v = self.pull(m);
                self.ldy(v);
            }
            0xDA => {
                self.idle(m);
                self.push(m, self.x);
            }
            0xFA => {
                self.idle(m);
                m.read(STACK_PAGE | u16::from(self.s));
                let v = self.pull(m);
                self.ldx(v);
            }

            // Flag manipulation.
            0x18 => {
                self.idle(m);
                self.c = false;
            }
            0x38 => {
                self.idle(m);
                self.c = true;
            }
            0x58 => {
                self.idle(m);
                self.i = false;
            }
            0x78 => {
                self.idle(m);
                self.i = true;
            }
            0xB8 => {
                self.idle(m);
                self.v = false;
            }
            0xD8 => {
                self.idle(m);
                self.d = false;
            }
            0xF8 => {
                self.idle(m);
                self.d = true;
            }

            // Transfers.
            0xAA => {
                self.idle(m);
                self.ldx(self.a);
            }
            0x8A => {
                self.idle(m);
                self.lda(self.x);
            }
            0xA8 => {
                self.idle(m);
                self.ldy(self.a);
            }
            0x98 => {
                self.idle(m);
                self.lda(self.y);
            }
            0xBA => {
                self.idle(m);
                self.ldx(self.s);
            }
            0x9A => {
                self.idle(m);
                self.s = self.x;
            }

            // Loads.
            0xA9 => {
                let v = self.fetch(m);
                self.lda(v);
            }
            0xA5 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xB5 => {
                let a = self.zp_x(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xAD => {
                let a = self.abs(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xBD => {
                let a = self.abs_x_read(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xB9 => {
                let a = self.abs_y_read(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xA1 => {
                let a = self.ind_x(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xB1 => {
                let a = self.ind_y_read(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xB2 => {
                let a = self.ind_zp(m);
                let v = m.read(a);
                self.lda(v);
            }
            0xA2 => {
                let v = self.fetch(m);
                self.ldx(v);
            }
            0xA6 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.ldx(v);
            }
            0xB6 => {
                let a = self.zp_y(m);
                let v = m.read(a);
                self.ldx(v);
            }
            0xAE => {
                let a = self.abs(m);
                let v = m.read(a);
                self.ldx(v);
            }
            0xBE => {
                let a = self.abs_y_read(m);
                let v = m.read(a);
                self.ldx(v);
            }
            0xA0 => {
                let v = self.fetch(m);
                self.ldy(v);
            }
            0xA4 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.ldy(v);
            }
            0xB4 => {
                let a = self.zp_x(m);
                let v = m.read(a);
                self.ldy(v);
            }
            0xAC => {
                let a = self.abs(m);
                let v = m.read(a);
                self.ldy(v);
            }
            0xBC => {
                let a = self.abs_x_read(m);
                let v = m.read(a);
                self.ldy(v);
            }

            // Stores.
            0x85 => {
                let a = self.zp(m);
                m.write(a, self.a);
            }
            0x95 => {
                let a = self.zp_x(m);
                m.write(a, self.a);
            }
            0x8D => {
                let a = self.abs(m);
                m.write(a, self.a);
            }
            0x9D => {
                let a = self.abs_x_write(m);
                m.write(a, self.a);
            }
            0x99 => {
                let a = self.abs_y_write(m);
                m.write(a, self.a);
            }
            0x81 => {
                let a = self.ind_x(m);
                m.write(a, self.a);
            }
            0x91 => {
                let a = self.ind_y_write(m);
                m.write(a, self.a);
            }
            0x92 => {
                let a = self.ind_zp(m);
                m.write(a, self.a);
            }
            0x86 => {
                let a = self.zp(m);
                m.write(a, self.x);
            }
            0x96 => {
                let a = self.zp_y(m);
                m.write(a, self.x);
            }
            0x8E => {
                let a = self.abs(m);
                m.write(a, self.x);
            }
            0x84 => {
                let a = self.zp(m);
                m.write(a, self.y);
            }
            0x94 => {
                let a = self.zp_x(m);
                m.write(a, self.y);
            }
            0x8C => {
                let a = self.abs(m);
                m.write(a, self.y);
            }
            0x64 => {
                let a = self.zp(m);
                m.write(a, 0);
            }
            0x74 => {
                let a = self.zp_x(m);
                m.write(a, 0);
            }
            0x9C => {
                let a = self.abs(m);
                m.write(a, 0);
            }
            0x9E => {
                let a = self.abs_x_write(m);
                m.write(a, 0);
            }

            // ORA / AND / EOR.
            0x09 => {
                let v = self.fetch(m);
                self.a |= v;
                self.set_nz(self.a);
            }
            0x05 => {
                let a = self.zp(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x15 => {
                let a = self.zp_x(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x0D => {
                let a = self.abs(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x1D => {
                let a = self.abs_x_read(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x19 => {
                let a = self.abs_y_read(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x01 => {
                let a = self.ind_x(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x11 => {
                let a = self.ind_y_read(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x12 => {
                let a = self.ind_zp(m);
                self.a |= m.read(a);
                self.set_nz(self.a);
            }
            0x29 => {
                let v = self.fetch(m);
                self.a &= v;
                self.set_nz(self.a);
            }
            0x25 => {
                let a = self.zp(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x35 => {
                let a = self.zp_x(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x2D => {
                let a = self.abs(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x3D => {
                let a = self.abs_x_read(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x39 => {
                let a = self.abs_y_read(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x21 => {
                let a = self.ind_x(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x31 => {
                let a = self.ind_y_read(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x32 => {
                let a = self.ind_zp(m);
                self.a &= m.read(a);
                self.set_nz(self.a);
            }
            0x49 => {
                let v = self.fetch(m);
                self.a ^= v;
                self.set_nz(self.a);
            }
            0x45 => {
                let a = self.zp(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }
            0x55 => {
                let a = self.zp_x(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }
            0x4D => {
                let a = self.abs(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }
            0x5D => {
                let a = self.abs_x_read(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }
            0x59 => {
                let a = self.abs_y_read(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }
            0x41 => {
                let a = self.ind_x(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }
            0x51 => {
                let a = self.ind_y_read(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }
            0x52 => {
                let a = self.ind_zp(m);
                self.a ^= m.read(a);
                self.set_nz(self.a);
            }

            // ADC / SBC.
            0x69 => {
                let v = self.fetch(m);
                self.adc(m, v);
            }
            0x65 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0x75 => {
                let a = self.zp_x(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0x6D => {
                let a = self.abs(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0x7D => {
                let a = self.abs_x_read(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0x79 => {
                let a = self.abs_y_read(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0x61 => {
                let a = self.ind_x(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0x71 => {
                let a = self.ind_y_read(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0x72 => {
                let a = self.ind_zp(m);
                let v = m.read(a);
                self.adc(m, v);
            }
            0xE9 => {
                let v = self.fetch(m);
                self.sbc(m, v);
            }
            0xE5 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.sbc(m, v);
            }
            0xF5 => {
                let a = self.zp_x(m);
                let v = m.read(a);
                self.sbc(m, v);
            }
            0xED => {
                let a = self.abs(m);
                let v = m.read(a);
                self.sbc(m, v);
            }
            0xFD => {
                let a = self.abs_x_read(m);
                let v = m.read(a);
                self.sbc(m, v);
            }
            0xF9 => {
                let a = self.abs_y_read(m);
                let v = m.read(a);
                self.sbc(m, v);
            }
            0xE1 => {
                let a = self.ind_x(m);
                let v = m.read(a);
                self.sbc(m, v);
            }
            0xF1 => {
                let a = self.ind_y_read(m);
                let v = m.read(a);
                self.sbc(m, v);
            }
            0xF2 => {
                let a = self.ind_zp(m);
                let v = m.read(a);
                self.sbc(m, v);
            }

            // Compares.
            0xC9 => {
                let v = self.fetch(m);
                self.cmp(self.a, v);
            }
            0xC5 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xD5 => {
                let a = self.zp_x(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xCD => {
                let a = self.abs(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xDD => {
                let a = self.abs_x_read(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xD9 => {
                let a = self.abs_y_read(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xC1 => {
                let a = self.ind_x(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xD1 => {
                let a = self.ind_y_read(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xD2 => {
                let a = self.ind_zp(m);
                let v = m.read(a);
                self.cmp(self.a, v);
            }
            0xE0 => {
                let v = self.fetch(m);
                self.cmp(self.x, v);
            }
            0xE4 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.cmp(self.x, v);
            }
            0xEC => {
                let a = self.abs(m);
                let v = m.read(a);
                self.cmp(self.x, v);
            }
            0xC0 => {
                let v = self.fetch(m);
                self.cmp(self.y, v);
            }
            0xC4 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.cmp(self.y, v);
            }
            0xCC => {
                let a = self.abs(m);
                let v = m.read(a);
                self.cmp(self.y, v);
            }

            // BIT / TSB / TRB.
            0x89 => {
                // Immediate BIT only touches Z.
                let v = self.fetch(m);
                self.z = self.a & v == 0;
            }
            0x24 => {
                let a = self.zp(m);
                let v = m.read(a);
                self.bit(v);
            }
            0x34 => {
                let a = self.zp_x(m);
                let v = m.read(a);
                self.bit(v);
            }
            0x2C => {
                let a = self.abs(m);
                let v = m.read(a);
                self.bit(v);
            }
            0x3C => {
                let a = self.abs_x_read(m);
                let v = m.read(a);
                self.bit(v);
            }
            0x04 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::tsb);
            }
            0x0C => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::tsb);
            }
            0x14 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::trb);
            }
            0x1C => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::trb);
            }

            // Shifts and rotates.
            0x0A => {
                self.idle(m);
                self.a = self.asl(self.a);
            }
            0x06 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::asl);
            }
            0x16 => {
                let a = self.zp_x(m);
                self.rmw(m, a, Cpu::asl);
            }
            0x0E => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::asl);
            }
            0x1E => {
                let a = self.abs_x_write(m);
                self.rmw(m, a, Cpu::asl);
            }
            0x4A => {
                self.idle(m);
                self.a = self.lsr(self.a);
            }
            0x46 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::lsr);
            }
            0x56 => {
                let a = self.zp_x(m);
                self.rmw(m, a, Cpu::lsr);
            }
            0x4E => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::lsr);
            }
            0x5E => {
                let a = self.abs_x_write(m);
                self.rmw(m, a, Cpu::lsr);
            }
            0x2A => {
                self.idle(m);
                self.a = self.rol(self.a);
            }
            0x26 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::rol);
            }
            0x36 => {
                let a = self.zp_x(m);
                self.rmw(m, a, Cpu::rol);
            }
            0x2E => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::rol);
            }
            0x3E => {
                let a = self.abs_x_write(m);
                self.rmw(m, a, Cpu::rol);
            }
            0x6A => {
                self.idle(m);
                self.a = self.ror(self.a);
            }
            0x66 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::ror);
            }
            0x76 => {
                let a = self.zp_x(m);
                self.rmw(m, a, Cpu::ror);
            }
            0x6E => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::ror);
            }
            0x7E => {
                let a = self.abs_x_write(m);
                self.rmw(m, a, Cpu::ror);
            }

            // Increments and decrements.
            0x1A => {
                self.idle(m);
                self.a = self.inc(self.a);
            }
            0x3A => {
                self.idle(m);
                self.a = self.dec(self.a);
            }
            0xE6 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::inc);
            }
            0xF6 => {
                let a = self.zp_x(m);
                self.rmw(m, a, Cpu::inc);
            }
            0xEE => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::inc);
            }
            0xFE => {
                let a = self.abs_x_write(m);
                self.rmw(m, a, Cpu::inc);
            }
            0xC6 => {
                let a = self.zp(m);
                self.rmw(m, a, Cpu::dec);
            }
            0xD6 => {
                let a = self.zp_x(m);
                self.rmw(m, a, Cpu::dec);
            }
            0xCE => {
                let a = self.abs(m);
                self.rmw(m, a, Cpu::dec);
            }
            0xDE => {
                let a = self.abs_x_write(m);
                self.rmw(m, a, Cpu::dec);
            }
            0xE8 => {
                self.idle(m);
                self.x = self.inc(self.x);
            }
            0xC8 => {
                self.idle(m);
                self.y = self.inc(self.y);
            }
            0xCA => {
                self.idle(m);
                self.x = self.dec(self.x);
            }
            0x88 => {
                self.idle(m);
                self.y = self.dec(self.y);
            }

            // Rockwell bit twiddles.
            0x07 | 0x17 | 0x27 | 0x37 | 0x47 | 0x57 | 0x67 | 0x77 => {
                let bit = op >> 4;
                let a = self.zp(m);
                self.rmw(m, a, |_, v| v & !(1 << bit));
            }
            0x87 | 0x97 | 0xA7 | 0xB7 | 0xC7 | 0xD7 | 0xE7 | 0xF7 => {
                let bit = (op >> 4) - 8;
                let a = self.zp(m);
                self.rmw(m, a, |_, v| v | (1 << bit));
            }
            0x0F | 0x1F | 0x2F | 0x3F | 0x4F | 0x5F | 0x6F | 0x7F => {
                self.branch_on_bit(m, op >> 4, false);
            }
            0x8F | 0x9F | 0xAF | 0xBF | 0xCF | 0xDF | 0xEF | 0xFF => {
                self.branch_on_bit(m, (op >> 4) - 8, true);
            }

            // NOPs of documented shapes (includes WAI/STP which this core
            // treats as inert).
            0xEA | 0xCB | 0xDB => self.idle(m),
            0x02 | 0x22 | 0x42 | 0x62 | 0x82 | 0xC2 | 0xE2 => {
                self.fetch(m);
            }
            0x44 => {
                let a = self.zp(m);
                m.read(a);
            }
            0x54 | 0xD4 | 0xF4 => {
                let a = self.zp_x(m);
                m.read(a);
            }
            0xDC | 0xFC => {
                let a = self.abs(m);
                m.read(a);
            }
            0x5C => {
                // The oddball 8-cycle NOP.
                let a = self.abs(m);
                m.read(a);
                for _ in 0..4 {
                    m.read(0xFFFF);
                }
            }
            // Single-cycle NOPs on the x3/xB columns: the fetch is the
            // whole instruction.
            _ => {}
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{{ A:{:02X} X:{:02X} Y:{:02X} S:{:02X} PC:{:04X} P:{:08b} }}",
            self.a,
            self.x,
            self.y,
            self.s,
            self.pc,
            self.status().bits()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Debug)]
    enum Access {
        Read(u16),
        Write(u16, u8),
    }

    struct TestBus {
        mem: Vec<u8>,
        log: Vec<Access>,
    }

    impl TestBus {
        fn new() -> Self {
            Self {
                mem: vec![0; 0x1_0000],
                log: Vec::new(),
            }
        }

        fn load(&mut self, addr: u16, bytes: &[u8]) {
            let a = addr as usize;
            self.mem[a..a + bytes.len()].copy_from_slice(bytes);
        }

        fn cycles(&self) -> usize {
            self.log.len()
        }
    }

    impl Memory for TestBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.log.push(Access::Read(addr));
            self.mem[addr as usize]
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.log.push(Access::Write(addr, value));
            self.mem[addr as usize] = value;
        }
    }

    fn cpu_at(pc: u16) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.set_pc(pc);
        cpu.i = true;
        cpu
    }

    #[test]
    fn lda_imm_sets_nz() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xA9, 0x00, 0xA9, 0x80]);
        let mut cpu = cpu_at(0x0200);

        cpu.step(&mut bus);
        assert!(cpu.z && !cpu.n);
        cpu.step(&mut bus);
        assert!(!cpu.z && cpu.n);
        assert_eq!(cpu.a(), 0x80);
    }

    #[test]
    fn adc_binary_overflow() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x69, 0x50]);
        let mut cpu = cpu_at(0x0200);
        cpu.a = 0x50;

        cpu.step(&mut bus);
        assert_eq!(cpu.a(), 0xA0);
        assert!(cpu.v);
        assert!(!cpu.c);
        assert!(cpu.n);
    }

    #[test]
    fn adc_decimal() {
        // 09 + 01 in decimal: A=10, no carry out of the high digit.
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x69, 0x01]);
        let mut cpu = cpu_at(0x0200);
        cpu.d = true;
        cpu.a = 0x09;
        cpu.c = false;

        cpu.step(&mut bus);
        assert_eq!(cpu.a(), 0x10);
        assert!(!cpu.c);
        assert!(!cpu.z);
        assert!(!cpu.n);
    }

    #[test]
    fn adc_decimal_wraps_with_carry() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x69, 0x01]);
        let mut cpu = cpu_at(0x0200);
        cpu.d = true;
        cpu.a = 0x99;
        cpu.c = false;

        cpu.step(&mut bus);
        assert_eq!(cpu.a(), 0x00);
        assert!(cpu.c);
        assert!(cpu.z);
    }

    #[test]
    fn sbc_decimal_borrow() {
        // 00 - 01 in decimal borrows down to 99.
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xE9, 0x01]);
        let mut cpu = cpu_at(0x0200);
        cpu.d = true;
        cpu.a = 0x00;
        cpu.c = true;

        cpu.step(&mut bus);
        assert_eq!(cpu.a(), 0x99);
        assert!(!cpu.c);
    }

    #[test]
    fn decimal_mode_costs_an_extra_cycle() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x69, 0x01]);
        let mut cpu = cpu_at(0x0200);
        cpu.step(&mut bus);
        let binary = bus.cycles();

        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x69, 0x01]);
        let mut cpu2 = cpu_at(0x0200);
        cpu2.d = true;
        cpu2.step(&mut bus);
        assert_eq!(bus.cycles(), binary + 1);
    }

    #[test]
    fn branch_cycle_counts() {
        // Not taken: 2 cycles.
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xD0, 0x10]);
        let mut cpu = cpu_at(0x0200);
        cpu.z = true;
        cpu.step(&mut bus);
        assert_eq!(bus.cycles(), 2);
        assert_eq!(cpu.pc(), 0x0202);

        // Taken, same page: 3 cycles.
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xD0, 0x10]);
        let mut cpu = cpu_at(0x0200);
        cpu.z = false;
        cpu.step(&mut bus);
        assert_eq!(bus.cycles(), 3);
        assert_eq!(cpu.pc(), 0x0212);

        // Taken across a page: 4 cycles.
        let mut bus = TestBus::new();
        bus.load(0x02F0, &[0xD0, 0x20]);
        let mut cpu = cpu_at(0x02F0);
        cpu.z = false;
        cpu.step(&mut bus);
        assert_eq!(bus.cycles(), 4);
        assert_eq!(cpu.pc(), 0x0312);
    }

    #[test]
    fn rmw_performs_dummy_write_of_old_value() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xE6, 0x42]); // INC $42
        bus.mem[0x42] = 0x07;
        let mut cpu = cpu_at(0x0200);

        cpu.step(&mut bus);
        let tail = &bus.log[bus.log.len() - 3..];
        assert_eq!(
            tail,
            &[
                Access::Read(0x0042),
                Access::Write(0x0042, 0x07),
                Access::Write(0x0042, 0x08)
            ]
        );
    }

    #[test]
    fn abs_x_page_cross_adds_a_cycle() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xBD, 0xF0, 0x02]); // LDA $02F0,X
        let mut cpu = cpu_at(0x0200);
        cpu.x = 0x01;
        cpu.step(&mut bus);
        assert_eq!(bus.cycles(), 4);

        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xBD, 0xF0, 0x02]);
        let mut cpu = cpu_at(0x0200);
        cpu.x = 0x20;
        cpu.step(&mut bus);
        assert_eq!(bus.cycles(), 5);
    }

    #[test]
    fn brk_pushes_pc_plus_two_and_vectors() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x00, 0xFF]);
        bus.load(0xFFFE, &[0x34, 0x12]);
        let mut cpu = cpu_at(0x0200);
        let s0 = cpu.s();

        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x1234);
        assert!(cpu.i);
        assert!(!cpu.d);
        // Return address on the stack is BRK+2, flags carry B.
        let sp = STACK_PAGE | u16::from(s0);
        assert_eq!(bus.mem[sp as usize], 0x02);
        assert_eq!(bus.mem[(sp - 1) as usize], 0x02);
        assert!(bus.mem[(sp - 2) as usize] & Status::B.bits() != 0);
    }

    #[test]
    fn brk_trap_flag() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x00, 0x00]);
        let mut cpu = cpu_at(0x0200);
        cpu.set_break_on_brk(true);
        cpu.step(&mut bus);
        assert!(cpu.take_brk_trap());
        assert!(!cpu.take_brk_trap());
    }

    #[test]
    fn irq_is_masked_by_i_and_level_sensitive() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xEA, 0xEA]);
        bus.load(0xFFFE, &[0x00, 0x80]);
        let mut cpu = cpu_at(0x0200);

        cpu.set_irq(true);
        cpu.step(&mut bus); // I set: NOP executes.
        assert_eq!(cpu.pc(), 0x0201);

        cpu.i = false;
        cpu.step(&mut bus); // now the interrupt wins
        assert_eq!(cpu.pc(), 0x8000);
        assert!(cpu.i);
    }

    #[test]
    fn nmi_is_edge_sensitive() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xEA, 0xEA, 0xEA]);
        bus.load(0xFFFA, &[0x00, 0x90]);
        let mut cpu = cpu_at(0x0200);

        cpu.set_nmi(true);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x9000);

        // Level still high: no retrigger.
        bus.load(0x9000, &[0xEA]);
        cpu.set_nmi(true);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x9001);
    }

    #[test]
    fn interrupt_pushes_with_b_clear() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xEA]);
        bus.load(0xFFFE, &[0x00, 0x80]);
        let mut cpu = cpu_at(0x0200);
        cpu.i = false;
        let s0 = cpu.s();

        cpu.set_irq(true);
        cpu.step(&mut bus);
        let pushed = bus.mem[(STACK_PAGE | u16::from(s0.wrapping_sub(2))) as usize];
        assert_eq!(pushed & Status::B.bits(), 0);
    }

    #[test]
    fn jsr_rts_round_trip() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x20, 0x00, 0x03]); // JSR $0300
        bus.load(0x0300, &[0x60]); // RTS
        let mut cpu = cpu_at(0x0200);

        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x0300);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x0203);
    }

    #[test]
    fn php_sets_b_and_x_on_the_pushed_copy() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x08]);
        let mut cpu = cpu_at(0x0200);
        let s0 = cpu.s();
        cpu.step(&mut bus);
        let pushed = bus.mem[(STACK_PAGE | u16::from(s0)) as usize];
        assert!(pushed & Status::B.bits() != 0);
        assert!(pushed & Status::X.bits() != 0);
    }

    #[test]
    fn tsb_trb() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x04, 0x10, 0x14, 0x10]); // TSB $10; TRB $10
        bus.mem[0x10] = 0b1010;
        let mut cpu = cpu_at(0x0200);
        cpu.a = 0b0110;

        cpu.step(&mut bus);
        assert_eq!(bus.mem[0x10], 0b1110);
        assert!(!cpu.z); // a & old != 0

        cpu.step(&mut bus);
        assert_eq!(bus.mem[0x10], 0b1000);
    }

    #[test]
    fn rockwell_smb_rmb_bbs() {
        let mut bus = TestBus::new();
        // SMB3 $20; BBS3 $20,+4; RMB3 $20
        bus.load(0x0200, &[0xB7, 0x20, 0xBF, 0x20, 0x02, 0x37, 0x20]);
        let mut cpu = cpu_at(0x0200);

        cpu.step(&mut bus);
        assert_eq!(bus.mem[0x20], 0b0000_1000);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x0207); // branch taken over the RMB
    }

    #[test]
    fn stz_and_bra() {
        let mut bus = TestBus::new();
        bus.mem[0x30] = 0xAA;
        bus.load(0x0200, &[0x64, 0x30, 0x80, 0x02]); // STZ $30; BRA +2
        let mut cpu = cpu_at(0x0200);

        cpu.step(&mut bus);
        assert_eq!(bus.mem[0x30], 0);
        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x0206);
    }

    #[test]
    fn jmp_indirect_crosses_page_correctly() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0x6C, 0xFF, 0x02]); // JMP ($02FF)
        bus.mem[0x02FF] = 0x78;
        bus.mem[0x0300] = 0x56; // 65C02 reads the real successor byte
        let mut cpu = cpu_at(0x0200);

        cpu.step(&mut bus);
        assert_eq!(cpu.pc(), 0x5678);
    }

    #[test]
    fn cmp_flags() {
        let mut bus = TestBus::new();
        bus.load(0x0200, &[0xC9, 0x10, 0xC9, 0x20, 0xC9, 0x18]);
        let mut cpu = cpu_at(0x0200);
        cpu.a = 0x18;

        cpu.step(&mut bus);
        assert!(cpu.c && !cpu.z);
        cpu.step(&mut bus);
        assert!(!cpu.c && !cpu.z && cpu.n);
        cpu.step(&mut bus);
        assert!(cpu.c && cpu.z);
    }

    #[test]
    fn small_program_runs() {
        // Sum 1..=10 into A.
        let mut bus = TestBus::new();
        bus.load(
            0x0200,
            &[
                0xA9, 0x00, // LDA #0
                0xA2, 0x0A, // LDX #10
                0x8A, // loop: TXA
                0x18, // CLC
                0x65, 0x10, // ADC $10
                0x85, 0x10, // STA $10
                0xCA, // DEX
                0xD0, 0xF7, // BNE loop
                0xA5, 0x10, // LDA $10
            ],
        );
        let mut cpu = cpu_at(0x0200);
        for _ in 0..100 {
            cpu.step(&mut bus);
            if cpu.pc() == 0x020F {
                break;
            }
        }
        assert_eq!(cpu.a(), 55);
    }
}
