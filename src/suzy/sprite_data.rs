use log::trace;
use serde::{Deserialize, Serialize};

/// How the current sprite data line is encoded.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
enum LineMode {
    Idle,
    /// The whole line is raw pens (SPRCTL1 literal bit).
    AbsLiteral,
    /// Inside a packed line: a literal run of individually coded pens.
    LiteralRun,
    /// Inside a packed line: one pen repeated.
    RepeatRun,
}

/// Bit shifter and run decoder for one sprite data line.
///
/// The engine keeps the shifter topped up from `procadr`; the decoder
/// consumes a pen at a time until the line's bit budget
/// `(sprdoff - 1) * 8` runs dry.
#[derive(Clone, Serialize, Deserialize)]
pub struct SpriteData {
    shift_reg: u64,
    avail: u16,
    budget: u16,
    bpp: u16,
    mode: LineMode,
    run_left: u16,
    run_pen: u8,
    ended: bool,
}

impl SpriteData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shift_reg: 0,
            avail: 0,
            budget: 0,
            bpp: 1,
            mode: LineMode::Idle,
            run_left: 0,
            run_pen: 0,
            ended: true,
        }
    }

    /// Starts decoding a line. `sprdoff` has already been pulled off the
    /// front of the shifter.
    pub fn begin_line(&mut self, literal: bool, bpp: u8, sprdoff: u16) {
        self.budget = sprdoff.saturating_sub(1).saturating_mul(8);
        self.bpp = u16::from(bpp);
        self.run_pen = 0;
        self.ended = false;
        if literal {
            self.mode = LineMode::AbsLiteral;
            self.run_left = self.budget / self.bpp;
        } else {
            self.mode = LineMode::Idle;
            self.run_left = 0;
        }
        trace!("begin_line literal:{} budget:{}", literal, self.budget);
    }

    pub fn clear(&mut self) {
        self.shift_reg = 0;
        self.avail = 0;
        self.budget = 0;
        self.run_left = 0;
        self.mode = LineMode::Idle;
        self.ended = true;
    }

    pub fn push(&mut self, byte: u8) {
        self.shift_reg = (self.shift_reg << 8) | u64::from(byte);
        self.avail += 8;
    }

    /// True while the shifter wants another byte from `procadr`. The
    /// refill threshold keeps at least 24 bits buffered, enough for any
    /// single decode step.
    #[must_use]
    pub fn wants_refill(&self) -> bool {
        !self.ended && self.avail < 24 && self.budget > self.avail
    }

    /// Pulls `bits` bits off the front of the shifter, ignoring the line
    /// budget. Used for the sprdoff prefix.
    pub fn take_raw(&mut self, bits: u16) -> u8 {
        debug_assert!(bits <= 8 && self.avail >= bits);
        self.avail -= bits;
        ((self.shift_reg >> self.avail) & ((1 << bits) - 1)) as u8
    }

    /// Pulls `bits` bits against the budget; `None` once the line is
    /// spent.
    fn take(&mut self, bits: u16) -> Option<u8> {
        if self.budget < bits {
            return None;
        }
        self.budget -= bits;
        Some(self.take_raw(bits))
    }

    /// Decodes the next pen index, or `None` at end of line.
    pub fn next_pen(&mut self) -> Option<u8> {
        if self.ended {
            return None;
        }

        if self.run_left == 0 && self.mode != LineMode::AbsLiteral {
            // Block header: 1-bit literal flag, 4-bit count.
            let Some(literal) = self.take(1) else {
                self.ended = true;
                return None;
            };
            let Some(count) = self.take(4) else {
                self.ended = true;
                return None;
            };
            if literal != 0 {
                self.mode = LineMode::LiteralRun;
                self.run_left = u16::from(count) + 1;
            } else {
                // A repeat count of zero marks the end of the line.
                if count == 0 {
                    self.ended = true;
                    return None;
                }
                self.mode = LineMode::RepeatRun;
                self.run_left = u16::from(count) + 1;
                match self.take(self.bpp) {
                    Some(pen) => self.run_pen = pen,
                    None => {
                        self.ended = true;
                        return None;
                    }
                }
            }
        }

        match self.mode {
            LineMode::AbsLiteral => {
                if self.run_left == 0 {
                    self.ended = true;
                    return None;
                }
                self.run_left -= 1;
                let Some(pen) = self.take(self.bpp) else {
                    self.ended = true;
                    return None;
                };
                // A zero pen in the last position is padding, not a pixel.
                if self.run_left == 0 && pen == 0 {
                    self.ended = true;
                    return None;
                }
                Some(pen)
            }
            LineMode::LiteralRun => {
                self.run_left -= 1;
                match self.take(self.bpp) {
                    Some(pen) => Some(pen),
                    None => {
                        self.ended = true;
                        None
                    }
                }
            }
            LineMode::RepeatRun => {
                self.run_left -= 1;
                Some(self.run_pen)
            }
            LineMode::Idle => {
                self.ended = true;
                None
            }
        }
    }

    #[must_use]
    pub fn avail(&self) -> u16 {
        self.avail
    }
}

impl Default for SpriteData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(bytes: &[u8]) -> SpriteData {
        let mut sd = SpriteData::new();
        for b in bytes {
            sd.push(*b);
        }
        sd
    }

    #[test]
    fn take_raw_pulls_msb_first() {
        let mut sd = filled(&[0b1010_1100, 0b0101_0110]);
        assert_eq!(sd.take_raw(4), 0b1010);
        assert_eq!(sd.take_raw(4), 0b1100);
        assert_eq!(sd.take_raw(2), 0b01);
        assert_eq!(sd.take_raw(6), 0b01_0110);
    }

    #[test]
    fn packed_repeat_run() {
        // Header: flag=0, count=3, pen=0x5 -> four pixels of pen 5.
        // 4 bpp: 0 0011 0101, then a zero-count header ends the line.
        let mut sd = filled(&[0b0001_1010, 0b1000_0000, 0x00]);
        sd.begin_line(false, 4, 4); // budget 24 bits
        assert_eq!(sd.next_pen(), Some(5));
        assert_eq!(sd.next_pen(), Some(5));
        assert_eq!(sd.next_pen(), Some(5));
        assert_eq!(sd.next_pen(), Some(5));
        assert_eq!(sd.next_pen(), None);
    }

    #[test]
    fn packed_literal_run() {
        // Header: flag=1, count=2 -> three literal pens 1, 2, 3 at 4 bpp.
        // 1 0010 0001 0010 0011 ...
        let mut sd = filled(&[0b1001_0000, 0b1001_0001, 0b1000_0000]);
        sd.begin_line(false, 4, 4);
        assert_eq!(sd.next_pen(), Some(1));
        assert_eq!(sd.next_pen(), Some(2));
        assert_eq!(sd.next_pen(), Some(3));
    }

    #[test]
    fn literal_line_yields_budget_worth_of_pens() {
        let mut sd = filled(&[0x12, 0x34]);
        sd.begin_line(true, 4, 3); // budget 16 bits -> 4 pens
        assert_eq!(sd.next_pen(), Some(1));
        assert_eq!(sd.next_pen(), Some(2));
        assert_eq!(sd.next_pen(), Some(3));
        // Final zero pen would be suppressed; 4 is not zero.
        assert_eq!(sd.next_pen(), Some(4));
        assert_eq!(sd.next_pen(), None);
    }

    #[test]
    fn literal_line_suppresses_trailing_zero_pen() {
        let mut sd = filled(&[0x12, 0x30]);
        sd.begin_line(true, 4, 3);
        assert_eq!(sd.next_pen(), Some(1));
        assert_eq!(sd.next_pen(), Some(2));
        assert_eq!(sd.next_pen(), Some(3));
        assert_eq!(sd.next_pen(), None);
    }

    #[test]
    fn refill_threshold() {
        let mut sd = filled(&[0xFF]);
        sd.begin_line(false, 4, 8); // budget 56 bits
        assert!(sd.wants_refill());
        sd.push(0xFF);
        sd.push(0xFF);
        assert!(!sd.wants_refill());
    }
}
