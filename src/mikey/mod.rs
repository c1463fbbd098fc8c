pub mod registers;
pub mod timers;
pub mod uart;
pub mod video;

use crate::cartridge::Cartridge;
use crate::consts::{
    ATTEN_A, AUD3MISC, CPUSLEEP, DISPCTL, INTRST, INTSET, IODAT, IODAT_AUDIN, IODAT_CAD,
    IODAT_EXTPOWER, IODAT_NOEXP, IODAT_RESTLESS, IODIR, MIKEYHREV, MSTEREO, SERCTL, SERDAT,
    SYSCTL1, SYSCTL1_CAS, SYSCTL1_POWER, TIM0BKUP,
};
use crate::ram::Ram;
use log::trace;
use registers::MikeyRegisters;
use serde::{Deserialize, Serialize};
use timers::{TimerFire, Timers};
use uart::{LinkBackend, Uart};
use video::Video;

/// Side effects of a Mikey register write that the machine has to act
/// on: timers may need rescheduling, CPUSLEEP parks the CPU.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum WriteEffect {
    None,
    TimerTouched(usize),
    CpuSleep,
}

/// Mikey: timers, display DMA, palette, audio, interrupt aggregation and
/// the serial port, behind the FD00 register page.
#[derive(Clone, Serialize, Deserialize)]
pub struct Mikey {
    registers: MikeyRegisters,
    timers: Timers,
    uart: Uart,
    video: Video,
    backend: LinkBackend,
}

impl Mikey {
    #[must_use]
    pub fn new(backend: LinkBackend) -> Self {
        Self {
            registers: MikeyRegisters::new(),
            timers: Timers::new(),
            uart: Uart::new(backend),
            video: Video::new(),
            backend,
        }
    }

    #[must_use]
    pub fn backend(&self) -> LinkBackend {
        self.backend
    }

    /// Register view with no side effects, for the debugger.
    #[must_use]
    pub fn debug_read(&self, addr: u16) -> u8 {
        match addr {
            TIM0BKUP..=AUD3MISC => self.timers.peek(addr),
            INTRST | INTSET => self.registers.data(INTSET),
            SERCTL => self.uart.ctrl(),
            // Reading SERDAT would consume the byte; show nothing.
            SERDAT => 0xFF,
            MIKEYHREV => 1,
            _ => self.registers.data(addr),
        }
    }

    pub fn read(&mut self, addr: u16, cart: &Cartridge) -> u8 {
        match addr {
            TIM0BKUP..=AUD3MISC => self.timers.peek(addr),
            // Both interrupt registers read the pending mask.
            INTRST | INTSET => self.registers.data(INTSET),
            IODAT => self.read_iodat(cart),
            SERCTL => self.uart.ctrl(),
            SERDAT => self.uart.data(),
            MIKEYHREV => 1,
            _ => self.registers.data(addr),
        }
    }

    pub fn write(&mut self, addr: u16, value: u8, cart: &mut Cartridge) -> WriteEffect {
        match addr {
            TIM0BKUP..=AUD3MISC => {
                self.timers.poke(addr, value);
                return WriteEffect::TimerTouched(Timers::index_of(addr));
            }
            INTRST => {
                // Write-one-to-clear.
                let pending = self.registers.data(INTSET) & !value;
                self.registers.set_data(INTSET, pending);
                trace!("INTRST -> pending {pending:02X}");
            }
            INTSET => {
                let pending = self.registers.data(INTSET) | value;
                self.registers.set_data(INTSET, pending);
            }
            SYSCTL1 => self.write_sysctl1(value, cart),
            IODAT => self.write_iodat(value, cart),
            IODIR => {
                self.registers.set_data(IODIR, value);
                self.drive_cart_port(cart);
            }
            SERCTL => self.uart.set_ctrl(value),
            SERDAT => self.uart.set_data(value),
            DISPCTL => {
                self.registers.set_data(DISPCTL, value);
                self.video.set_dma_enabled(value & 0x01 != 0);
            }
            CPUSLEEP => return WriteEffect::CpuSleep,
            ATTEN_A..=MSTEREO => {
                self.registers.set_data(addr, value);
                self.registers.update_attenuations();
            }
            _ => self.registers.set_data(addr, value),
        }
        WriteEffect::None
    }

    /// SYSCTL1 carries the cartridge address strobe: a falling CAS edge
    /// with power on shifts the IODAT data bit into the address shifter.
    fn write_sysctl1(&mut self, value: u8, cart: &mut Cartridge) {
        let prev = self.registers.data(SYSCTL1);
        self.registers.set_data(SYSCTL1, value);

        if prev & SYSCTL1_POWER == 0 && value & SYSCTL1_POWER != 0 {
            cart.reset_address();
        }
        if value & SYSCTL1_POWER != 0 && prev & SYSCTL1_CAS != 0 && value & SYSCTL1_CAS == 0 {
            let bit = u8::from(self.registers.data(IODAT) & IODAT_CAD != 0);
            cart.shift_address_bit(bit);
        }
    }

    fn write_iodat(&mut self, value: u8, cart: &mut Cartridge) {
        self.registers.set_data(IODAT, value);
        self.drive_cart_port(cart);
    }

    /// Pushes the output-configured port lines down to the cartridge.
    fn drive_cart_port(&self, cart: &mut Cartridge) {
        let dir = self.registers.data(IODIR);
        let out = self.registers.data(IODAT);
        if dir & IODAT_AUDIN != 0 {
            cart.set_audin(out & IODAT_AUDIN != 0);
        }
    }

    /// Input-configured lines read the hardware; output-configured lines
    /// read back their latch.
    fn read_iodat(&self, cart: &Cartridge) -> u8 {
        let dir = self.registers.data(IODIR);
        let out = self.registers.data(IODAT);
        let mut v = 0;
        if dir & IODAT_AUDIN == 0 {
            if cart.audin() {
                v |= IODAT_AUDIN;
            }
        } else {
            v |= out & IODAT_AUDIN;
        }
        // No expansion hardware: the line reads high.
        if dir & IODAT_NOEXP == 0 {
            v |= IODAT_NOEXP;
        } else {
            v |= out & IODAT_NOEXP;
        }
        if dir & IODAT_RESTLESS != 0 {
            v |= out & IODAT_RESTLESS;
        }
        // External power present.
        if dir & IODAT_EXTPOWER == 0 {
            v |= IODAT_EXTPOWER;
        } else {
            v |= out & IODAT_EXTPOWER;
        }
        if dir & IODAT_CAD != 0 {
            v |= out & IODAT_CAD;
        }
        v
    }

    /// One prescaled edge on a timer, with its cascade.
    pub fn fire_timer(&mut self, id: usize) -> TimerFire {
        let fire = self.timers.fire(id);
        if fire.irq != 0 {
            let pending = self.registers.data(INTSET) | fire.irq;
            self.registers.set_data(INTSET, pending);
        }
        fire
    }

    /// One serial bit time; raises the UART's interrupt bit when the
    /// port asks for it.
    pub fn pulse_uart(&mut self) {
        if self.uart.pulse() {
            let pending = self.registers.data(INTSET) | crate::consts::INT_UART;
            self.registers.set_data(INTSET, pending);
        }
    }

    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.registers.data(INTSET) != 0
    }

    /// One horizontal line of display DMA.
    pub fn render_line(&mut self, ram: &Ram) {
        let dispadr = self.registers.disp_addr();
        self.video
            .render_line(ram, dispadr, self.registers.palette());
    }

    pub fn vblank(&mut self) {
        self.video.vblank();
    }

    /// Current mixer output as a stereo sample pair.
    #[must_use]
    pub fn audio_sample(&self) -> (i16, i16) {
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for ch in 0..4 {
            let out = f32::from(self.timers.audio_output(ch));
            left += out * self.registers.attenuation_left(ch);
            right += out * self.registers.attenuation_right(ch);
        }
        (((left as i32) << 5) as i16, ((right as i32) << 5) as i16)
    }

    #[must_use]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut Timers {
        &mut self.timers
    }

    #[must_use]
    pub fn registers(&self) -> &MikeyRegisters {
        &self.registers
    }

    #[must_use]
    pub fn video(&self) -> &Video {
        &self.video
    }

    pub fn video_mut(&mut self) -> &mut Video {
        &mut self.video
    }

    pub fn uart_mut(&mut self) -> &mut Uart {
        &mut self.uart
    }
}

impl Default for Mikey {
    fn default() -> Self {
        Self::new(LinkBackend::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{INT_TIMER0, TIM0CTLA};

    fn mikey() -> (Mikey, Cartridge) {
        (Mikey::new(LinkBackend::Coarse), Cartridge::none())
    }

    #[test]
    fn intset_accumulates_and_intrst_clears() {
        let (mut m, mut cart) = mikey();
        m.write(INTSET, 0b101, &mut cart);
        assert_eq!(m.read(INTSET, &cart), 0b101);
        assert_eq!(m.read(INTRST, &cart), 0b101);
        m.write(INTRST, 0b001, &mut cart);
        assert_eq!(m.read(INTSET, &cart), 0b100);
        assert!(m.irq_pending());
        m.write(INTRST, 0xFF, &mut cart);
        assert!(!m.irq_pending());
    }

    #[test]
    fn timer_underflow_latches_its_interrupt_bit() {
        let (mut m, mut cart) = mikey();
        m.write(TIM0BKUP, 0, &mut cart);
        let effect = m.write(TIM0CTLA, 0b1001_1000, &mut cart);
        assert_eq!(effect, WriteEffect::TimerTouched(0));

        let fire = m.fire_timer(0);
        assert!(fire.underflowed(0));
        assert_eq!(m.read(INTSET, &cart), INT_TIMER0);
    }

    #[test]
    fn cart_strobe_on_cas_falling_edge() {
        let (mut m, mut cart) = mikey();
        // Power on resets the counter.
        m.write(SYSCTL1, SYSCTL1_POWER | SYSCTL1_CAS, &mut cart);
        // Data bit high, CAS falls: one bit shifted in.
        m.write(IODAT, IODAT_CAD, &mut cart);
        m.write(SYSCTL1, SYSCTL1_POWER, &mut cart);
        assert_eq!(cart.shift_register(), 1);
        // Raise and drop again with data low.
        m.write(SYSCTL1, SYSCTL1_POWER | SYSCTL1_CAS, &mut cart);
        m.write(IODAT, 0, &mut cart);
        m.write(SYSCTL1, SYSCTL1_POWER, &mut cart);
        assert_eq!(cart.shift_register(), 0b10);
    }

    #[test]
    fn cpusleep_reports_to_the_machine() {
        let (mut m, mut cart) = mikey();
        assert_eq!(m.write(CPUSLEEP, 0, &mut cart), WriteEffect::CpuSleep);
    }
}
