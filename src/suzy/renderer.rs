use super::registers::{SprSysR, SprSysW, SuzyRegisters};
use super::sprite_data::SpriteData;
use crate::consts::{
    COLLADRL, COLLBASL, COLLOFFL, HOFFL, HPOSSTRTL, HSIZOFFL, SCBADRL, SCBNEXTH, SCBNEXTL,
    SPRCOLL, SPRCOLL_DONT_COLLIDE, SPRCOLL_NUMBER, SPRCTL0, SPRCTL0_HFLIP, SPRCTL0_SPR_TYPE,
    SPRCTL0_VFLIP, SPRCTL1, SPRCTL1_LITERAL, SPRCTL1_RELOAD_HV, SPRCTL1_RELOAD_HVS,
    SPRCTL1_RELOAD_HVST, SPRCTL1_REUSE_PALETTE, SPRCTL1_SKIP_SPRITE, SPRDLINEL, SPRDOFFL,
    SPRHSIZL, SPRVSIZL, STRETCHL, SUZY_DMA_TICKS, TILTACUMH, TILTACUML, TILTL, VIDADRL, VIDBASL,
    VOFFL, VPOSSTRTL, VSIZACUMH, VSIZACUML, VSIZOFFL,
};
use crate::mikey::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::ram::Ram;
use log::trace;
use serde::{Deserialize, Serialize};

/// Raw draw-direction bits per quadrant index, in rotation order:
/// down-right, up-right, up-left, down-left.
const QUAD_LEFT: [bool; 4] = [false, false, true, true];
const QUAD_UP: [bool; 4] = [false, true, true, false];

/// The horizontal size accumulator borrows the TMPADR register pair, as
/// the hardware does.
const TMPACUM_SLOT: u16 = crate::consts::TMPADRL;

/// Sprite types, SPRCTL0 bits 0..2.
const TYPE_BACKGROUND_SHADOW: u8 = 0;
const TYPE_BACKGROUND_NOCOLL: u8 = 1;
const TYPE_BOUNDARY_SHADOW: u8 = 2;
const TYPE_BOUNDARY: u8 = 3;
const TYPE_NORMAL: u8 = 4;
const TYPE_NOCOLL: u8 = 5;
const TYPE_XOR_SHADOW: u8 = 6;
const TYPE_SHADOW: u8 = 7;

/// Where the sprite engine resumes after the scheduler hands control
/// back. Every memory access the engine makes is billed between steps,
/// so timers and display DMA interleave with a running paint.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
enum DrawStep {
    Idle,
    LoadScb,
    InitQuadrants,
    InitQuadrant,
    BeginRow,
    BeginScreenRow,
    RenderPixels,
    EndScreenRow,
    EndRow,
    NextQuadrant,
    WriteDepository,
}

/// The sprite engine proper. The SCB fields it walks live in the Suzy
/// register file; everything here is working state with no CPU-visible
/// address.
#[derive(Clone, Serialize, Deserialize)]
pub struct Renderer {
    step: DrawStep,
    load_idx: u8,
    load_addr: u16,
    proc_addr: u16,
    pens: [u8; 16],
    sprite_data: SpriteData,
    start_quadrant: u8,
    quadrant: u8,
    hsign: i16,
    vsign: i16,
    hquadoff: i16,
    vquadoff: i16,
    screen_h_start: i16,
    screen_v_start: i16,
    hoff: i16,
    voff: i16,
    rows_left: u8,
    row_height: u8,
    ever_on_screen: bool,
    was_on_row: bool,
    disable_collisions: bool,
    everon: bool,
    hi_coll: u8,
}

impl Renderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: DrawStep::Idle,
            load_idx: 0,
            load_addr: 0,
            proc_addr: 0,
            pens: [0; 16],
            sprite_data: SpriteData::new(),
            start_quadrant: 0,
            quadrant: 0,
            hsign: 1,
            vsign: 1,
            hquadoff: 1,
            vquadoff: 1,
            screen_h_start: 0,
            screen_v_start: 0,
            hoff: 0,
            voff: 0,
            rows_left: 0,
            row_height: 0,
            ever_on_screen: false,
            was_on_row: false,
            disable_collisions: false,
            everon: false,
            hi_coll: 0,
        }
    }

    #[must_use]
    pub fn active(&self) -> bool {
        self.step != DrawStep::Idle
    }

    /// Arms the engine; the first scheduled step begins the SCB walk.
    pub fn start(&mut self, regs: &mut SuzyRegisters, everon: bool) {
        self.everon = everon;
        self.step = DrawStep::LoadScb;
        self.load_idx = 0;
        regs.sprsys_r_set(SprSysR::sprite_working, true);
        trace!("sprite engine started, first SCB 0x{:04X}", regs.u16(SCBNEXTL));
    }

    fn stop(&mut self, regs: &mut SuzyRegisters) {
        self.step = DrawStep::Idle;
        regs.sprsys_r_set(SprSysR::sprite_working, false);
        regs.sprsys_r_set(SprSysR::sprite_to_stop, false);
    }

    /// Runs one engine phase. Returns the ticks its memory traffic
    /// consumed; the scheduler re-enters at now + ticks while `active`.
    pub fn step(&mut self, regs: &mut SuzyRegisters, ram: &mut Ram) -> u32 {
        match self.step {
            DrawStep::Idle => 0,
            DrawStep::LoadScb => self.load_scb(regs, ram),
            DrawStep::InitQuadrants => self.init_quadrants(regs),
            DrawStep::InitQuadrant => self.init_quadrant(regs),
            DrawStep::BeginRow => self.begin_row(regs, ram),
            DrawStep::BeginScreenRow => self.begin_screen_row(regs, ram),
            DrawStep::RenderPixels => self.render_pixels(regs, ram),
            DrawStep::EndScreenRow => self.end_screen_row(regs),
            DrawStep::EndRow => self.end_row(regs),
            DrawStep::NextQuadrant => self.next_quadrant(),
            DrawStep::WriteDepository => self.write_depository(regs, ram),
        }
    }

    /// One SCB byte per step. The index mirrors the record layout:
    /// control bytes, link, data pointer, position, the optional
    /// size/stretch/tilt block, then the optional packed palette.
    fn load_scb(&mut self, regs: &mut SuzyRegisters, ram: &mut Ram) -> u32 {
        if self.load_idx == 0 {
            let next = regs.u16(SCBNEXTL);
            // The walk ends when the link's high byte is clear.
            if next & 0xFF00 == 0 {
                self.stop(regs);
                return 0;
            }
            regs.set_u16(SCBADRL, next);
            self.load_addr = next;
        }

        let byte = ram.get(self.load_addr);
        self.load_addr = self.load_addr.wrapping_add(1);

        match self.load_idx {
            0 => regs.set_data(SPRCTL0, byte),
            1 => regs.set_data(SPRCTL1, byte),
            2 => regs.set_data(SPRCOLL, byte),
            3 => regs.set_data(SCBNEXTL, byte),
            4 => {
                regs.set_data(SCBNEXTH, byte);
                if regs.sprctl1() & SPRCTL1_SKIP_SPRITE != 0 {
                    trace!("skip bit set, sprite processing ends");
                    self.stop(regs);
                    return SUZY_DMA_TICKS;
                }
            }
            5 => regs.set_data(SPRDLINEL, byte),
            6 => {
                regs.set_data(SPRDLINEL + 1, byte);
                regs.set_u16(STRETCHL, 0);
                regs.set_u16(TILTL, 0);
            }
            7 => regs.set_data(HPOSSTRTL, byte),
            8 => regs.set_data(HPOSSTRTL + 1, byte),
            9 => regs.set_data(VPOSSTRTL, byte),
            10 => regs.set_data(VPOSSTRTL + 1, byte),
            11 => regs.set_data(SPRHSIZL, byte),
            12 => regs.set_data(SPRHSIZL + 1, byte),
            13 => regs.set_data(SPRVSIZL, byte),
            14 => regs.set_data(SPRVSIZL + 1, byte),
            15 => regs.set_data(STRETCHL, byte),
            16 => regs.set_data(STRETCHL + 1, byte),
            17 => regs.set_data(TILTL, byte),
            18 => regs.set_data(TILTL + 1, byte),
            _ => {
                // Eight packed palette bytes, two pens each.
                let i = usize::from(self.load_idx - 19) * 2;
                self.pens[i] = byte >> 4;
                self.pens[i + 1] = byte & 0x0F;
            }
        }

        // The record is variable length: the reload field decides how far
        // the size/stretch/tilt block runs, and the palette follows it
        // directly unless the sprite reuses the previous one.
        self.load_idx += 1;
        let sprctl1 = regs.sprctl1();
        let reload_end = if sprctl1 & SPRCTL1_RELOAD_HVST == SPRCTL1_RELOAD_HVST {
            19
        } else if sprctl1 & SPRCTL1_RELOAD_HVS == SPRCTL1_RELOAD_HVS {
            17
        } else if sprctl1 & SPRCTL1_RELOAD_HV == SPRCTL1_RELOAD_HV {
            15
        } else {
            11
        };
        if self.load_idx == reload_end {
            self.load_idx = 19;
            if sprctl1 & SPRCTL1_REUSE_PALETTE != 0 {
                self.load_idx = 0;
                self.step = DrawStep::InitQuadrants;
            }
        } else if self.load_idx == 27 {
            self.load_idx = 0;
            self.step = DrawStep::InitQuadrants;
        }
        SUZY_DMA_TICKS
    }

    fn init_quadrants(&mut self, regs: &mut SuzyRegisters) -> u32 {
        let sprcoll = regs.sprcoll();
        let sprite_type = regs.sprctl0() & SPRCTL0_SPR_TYPE;
        self.disable_collisions = regs.sprsys_w_has(SprSysW::no_collide)
            || sprcoll & SPRCOLL_DONT_COLLIDE != 0
            || sprite_type == TYPE_BACKGROUND_NOCOLL
            || sprite_type == TYPE_NOCOLL;

        self.ever_on_screen = false;
        self.hi_coll = 0;
        self.start_quadrant = regs.start_quadrant();
        self.quadrant = self.start_quadrant;
        self.screen_h_start = regs.i16(HOFFL);
        self.screen_v_start = regs.i16(VOFFL);
        self.step = DrawStep::InitQuadrant;
        trace!(
            "sprite at ({}, {}) type {} quadrant {}",
            regs.i16(HPOSSTRTL),
            regs.i16(VPOSSTRTL),
            sprite_type,
            self.start_quadrant
        );
        0
    }

    fn init_quadrant(&mut self, regs: &mut SuzyRegisters) -> u32 {
        let q = self.quadrant as usize;
        self.hsign = if QUAD_LEFT[q] { -1 } else { 1 };
        self.vsign = if QUAD_UP[q] { -1 } else { 1 };
        if regs.sprctl0() & SPRCTL0_HFLIP != 0 {
            self.hsign = -self.hsign;
        }
        if regs.sprctl0() & SPRCTL0_VFLIP != 0 {
            self.vsign = -self.vsign;
        }

        regs.set_u16(TILTACUML, 0);
        regs.set_u16(
            VSIZACUML,
            if self.vsign == 1 { regs.u16(VSIZOFFL) } else { 0 },
        );
        self.voff = regs.i16(VPOSSTRTL) - self.screen_v_start;

        // The start quadrant owns the seam row; the others shift off it.
        if self.quadrant == self.start_quadrant {
            self.vquadoff = self.vsign;
        }
        if self.vsign != self.vquadoff {
            self.voff += self.vsign;
        }

        self.sprite_data.clear();
        self.step = DrawStep::BeginRow;
        0
    }

    /// Reads the next source row's offset byte and works out how many
    /// screen rows it covers.
    fn begin_row(&mut self, regs: &mut SuzyRegisters, ram: &mut Ram) -> u32 {
        let ticks = self.reload_line_header(regs, ram);

        let sprdoff = regs.u16(SPRDOFFL);
        if sprdoff == 0 {
            self.step = DrawStep::WriteDepository;
            return ticks;
        }
        if sprdoff == 1 {
            regs.add_u16(SPRDLINEL, 1);
            self.step = DrawStep::NextQuadrant;
            return ticks;
        }

        regs.add_u16(VSIZACUML, regs.u16(SPRVSIZL));
        self.row_height = regs.data(VSIZACUMH);
        self.rows_left = self.row_height;
        regs.set_data(VSIZACUMH, 0);

        self.step = if self.rows_left == 0 {
            DrawStep::EndRow
        } else {
            DrawStep::BeginScreenRow
        };
        ticks
    }

    /// Refills the shifter from the start of the current data line and
    /// pulls the sprdoff prefix.
    fn reload_line_header(&mut self, regs: &mut SuzyRegisters, ram: &mut Ram) -> u32 {
        self.proc_addr = regs.u16(SPRDLINEL);
        self.sprite_data.clear();
        for i in 0..4 {
            self.sprite_data.push(ram.get(self.proc_addr.wrapping_add(i)));
        }
        self.proc_addr = self.proc_addr.wrapping_add(4);
        let sprdoff = u16::from(self.sprite_data.take_raw(8));
        regs.set_u16(SPRDOFFL, sprdoff);
        4 * SUZY_DMA_TICKS
    }

    fn begin_screen_row(&mut self, regs: &mut SuzyRegisters, ram: &mut Ram) -> u32 {
        // Moving away from the screen ends the whole source row early.
        if (self.vsign > 0 && self.voff >= SCREEN_HEIGHT as i16)
            || (self.vsign < 0 && self.voff < 0)
        {
            self.step = DrawStep::EndRow;
            return 0;
        }
        if self.voff < 0 || self.voff >= SCREEN_HEIGHT as i16 {
            self.step = DrawStep::EndScreenRow;
            return 0;
        }

        let ticks = self.reload_line_header(regs, ram);
        let sprdoff = regs.u16(SPRDOFFL);
        self.sprite_data.begin_line(
            regs.sprctl1() & SPRCTL1_LITERAL != 0,
            regs.bpp(),
            sprdoff,
        );

        let row_base = self.voff as u16 * (SCREEN_WIDTH as u16 / 2);
        regs.set_u16(VIDADRL, regs.u16(VIDBASL).wrapping_add(row_base));
        regs.set_u16(COLLADRL, regs.u16(COLLBASL).wrapping_add(row_base));

        // Tilt moves the row start; the accumulated whole pixels transfer
        // into hposstrt and the fraction stays behind.
        let hposstrt = regs.i16(HPOSSTRTL) + (regs.i16(TILTACUML) >> 8);
        regs.set_i16(HPOSSTRTL, hposstrt);
        regs.set_data(TILTACUMH, 0);

        regs.set_u16(
            TMPACUM_SLOT,
            if self.hsign > 0 { regs.u16(HSIZOFFL) } else { 0 },
        );
        self.hoff = hposstrt - self.screen_h_start;
        if self.quadrant == self.start_quadrant {
            self.hquadoff = self.hsign;
        }
        if self.hsign != self.hquadoff {
            self.hoff += self.hsign;
        }

        self.was_on_row = false;
        self.step = DrawStep::RenderPixels;
        ticks
    }

    /// Parses one pen and paints its horizontal expansion.
    fn render_pixels(&mut self, regs: &mut SuzyRegisters, ram: &mut Ram) -> u32 {
        let mut ticks = 0;

        while self.sprite_data.wants_refill() {
            self.sprite_data.push(ram.get(self.proc_addr));
            self.proc_addr = self.proc_addr.wrapping_add(1);
            ticks += SUZY_DMA_TICKS;
        }

        let Some(pen) = self.sprite_data.next_pen() else {
            self.step = DrawStep::EndScreenRow;
            return ticks;
        };
        let pixel = self.pens[pen as usize];

        regs.add_u16(TMPACUM_SLOT, regs.u16(SPRHSIZL));
        let width = regs.data(TMPACUM_SLOT + 1);
        regs.set_data(TMPACUM_SLOT + 1, 0);

        for _ in 0..width {
            if self.hoff >= 0 && self.hoff < SCREEN_WIDTH as i16 {
                self.was_on_row = true;
                self.ever_on_screen = true;
                ticks += self.process_pixel(regs, ram, pixel);
            } else if self.was_on_row {
                // Left the screen on this row; nothing more can land.
                self.step = DrawStep::EndScreenRow;
                return ticks;
            }
            self.hoff += self.hsign;
        }
        ticks
    }

    fn end_screen_row(&mut self, regs: &mut SuzyRegisters) -> u32 {
        self.voff += self.vsign;
        let sprctl1 = regs.sprctl1();
        if sprctl1 & SPRCTL1_RELOAD_HVS == SPRCTL1_RELOAD_HVS {
            regs.add_u16(SPRHSIZL, regs.u16(STRETCHL));
        }
        if sprctl1 & SPRCTL1_RELOAD_HVST == SPRCTL1_RELOAD_HVST {
            regs.add_u16(TILTACUML, regs.u16(TILTL));
        }
        self.rows_left = self.rows_left.saturating_sub(1);
        self.step = if self.rows_left == 0 {
            DrawStep::EndRow
        } else {
            DrawStep::BeginScreenRow
        };
        0
    }

    fn end_row(&mut self, regs: &mut SuzyRegisters) -> u32 {
        regs.add_u16(SPRDLINEL, regs.u16(SPRDOFFL));

        // "The vertical size of a sprite can be modified every time a
        // scan line is processed."
        if regs.sprsys_r_has(SprSysR::v_stretching) {
            let grown = regs
                .i16(SPRVSIZL)
                .wrapping_add(regs.i16(STRETCHL).wrapping_mul(i16::from(self.row_height)));
            regs.set_i16(SPRVSIZL, grown);
        }

        self.step = DrawStep::BeginRow;
        0
    }

    fn next_quadrant(&mut self) -> u32 {
        self.quadrant = (self.quadrant + 1) & 0x03;
        self.step = if self.quadrant == self.start_quadrant {
            DrawStep::WriteDepository
        } else {
            DrawStep::InitQuadrant
        };
        0
    }

    /// Sprite finished: report the highest collision read, and the
    /// everon result, into the SCB's collision depository.
    fn write_depository(&mut self, regs: &mut SuzyRegisters, ram: &mut Ram) -> u32 {
        let mut ticks = 0;
        let mut fred: Option<u8> = None;
        if !self.disable_collisions {
            fred = Some(self.hi_coll & 0x0F);
        }
        if self.everon && self.ever_on_screen {
            fred = Some(fred.unwrap_or(0) | 0x80);
        }
        if let Some(value) = fred {
            let addr = regs.u16(SCBADRL).wrapping_add(regs.u16(COLLOFFL));
            ram.set(addr, value);
            ticks += SUZY_DMA_TICKS;
            trace!("depository 0x{addr:04X} = 0x{value:02X}");
        }

        if regs.sprsys_w_has(SprSysW::sprite_to_stop) {
            self.stop(regs);
        } else {
            self.step = DrawStep::LoadScb;
            self.load_idx = 0;
        }
        ticks
    }

    // Nibble helpers. Video and collision buffers pack two pixels per
    // byte, left pixel in the high nibble.

    fn read_nibble(ram: &Ram, base: u16, hoff: i16) -> u8 {
        let addr = base.wrapping_add(hoff as u16 / 2);
        let byte = ram.get(addr);
        if hoff & 1 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        }
    }

    fn write_nibble(ram: &mut Ram, base: u16, hoff: i16, value: u8) {
        let addr = base.wrapping_add(hoff as u16 / 2);
        let mut byte = ram.get(addr);
        if hoff & 1 == 0 {
            byte = (byte & 0x0F) | (value << 4);
        } else {
            byte = (byte & 0xF0) | (value & 0x0F);
        }
        ram.set(addr, byte);
    }

    fn write_video(&self, regs: &SuzyRegisters, ram: &mut Ram, pixel: u8) -> u32 {
        Self::write_nibble(ram, regs.u16(VIDADRL), self.hoff, pixel);
        2 * SUZY_DMA_TICKS
    }

    fn xor_video(&self, regs: &SuzyRegisters, ram: &mut Ram, pixel: u8) -> u32 {
        let old = Self::read_nibble(ram, regs.u16(VIDADRL), self.hoff);
        Self::write_nibble(ram, regs.u16(VIDADRL), self.hoff, old ^ pixel);
        3 * SUZY_DMA_TICKS
    }

    /// Collision read-modify-write: deposit our number, remember the
    /// highest number already there.
    fn collide(&mut self, regs: &SuzyRegisters, ram: &mut Ram) -> u32 {
        let number = regs.sprcoll() & SPRCOLL_NUMBER;
        let old = Self::read_nibble(ram, regs.u16(COLLADRL), self.hoff);
        if old > self.hi_coll {
            self.hi_coll = old;
        }
        Self::write_nibble(ram, regs.u16(COLLADRL), self.hoff, number);
        3 * SUZY_DMA_TICKS
    }

    /// Blind collision write used by the background type.
    fn collide_blind(&self, regs: &SuzyRegisters, ram: &mut Ram) -> u32 {
        let number = regs.sprcoll() & SPRCOLL_NUMBER;
        Self::write_nibble(ram, regs.u16(COLLADRL), self.hoff, number);
        2 * SUZY_DMA_TICKS
    }

    /// Applies the sprite-type write/collide policy for one screen pixel.
    fn process_pixel(&mut self, regs: &SuzyRegisters, ram: &mut Ram, pixel: u8) -> u32 {
        let mut ticks = 0;
        let collide = !self.disable_collisions;
        match regs.sprctl0() & SPRCTL0_SPR_TYPE {
            TYPE_BACKGROUND_SHADOW => {
                ticks += self.write_video(regs, ram, pixel);
                if collide && pixel != 0x0E {
                    ticks += self.collide_blind(regs, ram);
                }
            }
            TYPE_BACKGROUND_NOCOLL => {
                ticks += self.write_video(regs, ram, pixel);
            }
            TYPE_BOUNDARY_SHADOW => {
                if pixel != 0x00 && pixel != 0x0E && pixel != 0x0F {
                    ticks += self.write_video(regs, ram, pixel);
                }
                if collide && pixel != 0x00 && pixel != 0x0E {
                    ticks += self.collide(regs, ram);
                }
            }
            TYPE_BOUNDARY => {
                if pixel != 0x00 && pixel != 0x0F {
                    ticks += self.write_video(regs, ram, pixel);
                }
                if collide && pixel != 0x00 {
                    ticks += self.collide(regs, ram);
                }
            }
            TYPE_NORMAL => {
                if pixel != 0x00 {
                    ticks += self.write_video(regs, ram, pixel);
                    if collide {
                        ticks += self.collide(regs, ram);
                    }
                }
            }
            TYPE_NOCOLL => {
                if pixel != 0x00 {
                    ticks += self.write_video(regs, ram, pixel);
                }
            }
            TYPE_XOR_SHADOW => {
                if pixel != 0x00 {
                    ticks += self.xor_video(regs, ram, pixel);
                }
                if collide && pixel != 0x00 && pixel != 0x0E {
                    ticks += self.collide(regs, ram);
                }
            }
            TYPE_SHADOW => {
                if pixel != 0x00 {
                    ticks += self.write_video(regs, ram, pixel);
                }
                if collide && pixel != 0x00 && pixel != 0x0E {
                    ticks += self.collide(regs, ram);
                }
            }
            _ => unreachable!(),
        }
        ticks
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
