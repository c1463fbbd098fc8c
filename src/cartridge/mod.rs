pub mod eeprom;
pub mod lnx_header;

use crate::error::CoreError;
use eeprom::{Ee93cxx, EepromKind};
use lnx_header::{LnxHeader, Rotation, LNX_HEADER_LEN};
use log::trace;
use serde::{Deserialize, Serialize};

const KIB_128: usize = 128 * 1024;
const KIB_256: usize = 256 * 1024;
const KIB_512: usize = 512 * 1024;
const KIB_1024: usize = 1024 * 1024;

/// One bank: 256 pages addressed by the shift register, bytes within a
/// page by the ripple counter.
#[derive(Clone, Serialize, Deserialize)]
pub struct CartBank {
    #[serde(skip)]
    data: Vec<u8>,
    page_size: u16,
}

impl CartBank {
    #[must_use]
    pub fn new(page_size: u16, data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            page_size,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            page_size: 0,
        }
    }

    #[must_use]
    pub fn page_size(&self) -> u16 {
        self.page_size
    }

    #[must_use]
    fn get(&self, shift: u8, ripple: u16) -> u8 {
        if self.page_size == 0 {
            return 0xFF;
        }
        let addr =
            usize::from(shift) * usize::from(self.page_size) + usize::from(ripple % self.page_size);
        self.data.get(addr).copied().unwrap_or(0xFF)
    }
}

/// The cartridge: bank arrays behind the shift/ripple address counter,
/// AUDIN routing and the optional serial EEPROM.
///
/// AUDIN doubles as a bank-select line on double-banked carts and as the
/// EEPROM's data pin.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cartridge {
    bank0: CartBank,
    bank1: CartBank,
    bank0a: Option<CartBank>,
    bank1a: Option<CartBank>,
    shift_register: u8,
    ripple_counter: u16,
    audin: bool,
    eeprom: Option<Ee93cxx>,
    rotation: Rotation,
    title: String,
}

impl Cartridge {
    /// A slot with nothing in it; every read floats to 0xFF.
    #[must_use]
    pub fn none() -> Self {
        Self {
            bank0: CartBank::empty(),
            bank1: CartBank::empty(),
            bank0a: None,
            bank1a: None,
            shift_register: 0,
            ripple_counter: 0,
            audin: false,
            eeprom: None,
            rotation: Rotation::None,
            title: String::new(),
        }
    }

    /// Loads a cartridge image: an LNX container or a raw dump whose
    /// size is a multiple of 256.
    ///
    /// # Errors
    ///
    /// `CoreError::InvalidImage` when the image matches neither shape.
    pub fn from_slice(data: &[u8]) -> Result<Self, CoreError> {
        if let Some(header) = LnxHeader::parse(data) {
            return Self::from_lnx(&header, &data[LNX_HEADER_LEN..]);
        }
        Self::from_raw(data)
    }

    fn from_lnx(header: &LnxHeader, payload: &[u8]) -> Result<Self, CoreError> {
        let page0 = header.bank0_page_size();
        if !matches!(page0, 256 | 512 | 1024 | 2048) {
            return Err(CoreError::InvalidImage("unsupported bank 0 page size"));
        }
        let page1 = header.bank1_page_size();

        let mut cart = Self::none();
        let mut rest = payload;
        let bank0_len = usize::from(page0) * 256;
        let taken = rest.len().min(bank0_len);
        cart.bank0 = CartBank::new(page0, &rest[..taken]);
        rest = &rest[taken..];

        if page1 > 0 && !rest.is_empty() {
            let bank1_len = usize::from(page1) * 256;
            let taken = rest.len().min(bank1_len);
            cart.bank1 = CartBank::new(page1, &rest[..taken]);
            rest = &rest[taken..];
        }

        // Whatever remains is the AUDIN-selected second layer.
        if !rest.is_empty() {
            let taken = rest.len().min(bank0_len);
            cart.bank0a = Some(CartBank::new(page0, &rest[..taken]));
            rest = &rest[taken..];
            if page1 > 0 && !rest.is_empty() {
                cart.bank1a = Some(CartBank::new(page1, rest));
            }
        }

        cart.eeprom = EepromKind::from_header(header.eeprom()).map(Ee93cxx::new);
        cart.rotation = header.rotation();
        cart.title = header.title().to_string();
        trace!(
            "lnx cart '{}', pages {}x{}, eeprom {:?}",
            cart.title,
            page0,
            page1,
            cart.eeprom.as_ref().map(Ee93cxx::kind)
        );
        Ok(cart)
    }

    fn from_raw(data: &[u8]) -> Result<Self, CoreError> {
        if data.is_empty() || data.len() % 256 != 0 {
            return Err(CoreError::InvalidImage("raw dump is not a page multiple"));
        }
        let mut cart = Self::none();
        match data.len() {
            l if l <= KIB_128 => cart.bank0 = CartBank::new(512, data),
            l if l <= KIB_256 => cart.bank0 = CartBank::new(1024, data),
            l if l <= KIB_512 => cart.bank0 = CartBank::new(2048, data),
            l if l <= KIB_1024 => {
                // A megabyte dump is two AUDIN-banked halves.
                cart.bank0 = CartBank::new(2048, &data[..KIB_512]);
                cart.bank0a = Some(CartBank::new(2048, &data[KIB_512..]));
            }
            _ => return Err(CoreError::InvalidImage("raw dump too large")),
        }
        Ok(cart)
    }

    pub fn reset(&mut self) {
        self.shift_register = 0;
        self.ripple_counter = 0;
        self.audin = false;
    }

    /// Power-up clears the address counter.
    pub fn reset_address(&mut self) {
        self.shift_register = 0;
        self.ripple_counter = 0;
    }

    /// A strobe on the parallel port's CART_ADDR_DATA line: the bit
    /// enters the shift register and the ripple counter restarts.
    pub fn shift_address_bit(&mut self, bit: u8) {
        self.shift_register = (self.shift_register << 1) | (bit & 1);
        self.ripple_counter = 0;
        self.tick_eeprom();
    }

    #[must_use]
    pub fn shift_register(&self) -> u8 {
        self.shift_register
    }

    #[must_use]
    pub fn ripple_counter(&self) -> u16 {
        self.ripple_counter
    }

    /// RCART0: read the current byte of bank 0 and step the counter.
    pub fn read_bank0(&mut self) -> u8 {
        let bank = if self.audin {
            self.bank0a.as_ref().unwrap_or(&self.bank0)
        } else {
            &self.bank0
        };
        let byte = bank.get(self.shift_register, self.ripple_counter);
        self.step_ripple();
        byte
    }

    /// RCART1: the second strobe line.
    pub fn read_bank1(&mut self) -> u8 {
        let bank = if self.audin {
            self.bank1a.as_ref().unwrap_or(&self.bank1)
        } else {
            &self.bank1
        };
        let byte = bank.get(self.shift_register, self.ripple_counter);
        self.step_ripple();
        byte
    }

    fn step_ripple(&mut self) {
        self.ripple_counter = self.ripple_counter.wrapping_add(1) & 0x07FF;
        self.tick_eeprom();
    }

    /// The port drives AUDIN when its direction register says so.
    pub fn set_audin(&mut self, level: bool) {
        self.audin = level;
        self.tick_eeprom();
    }

    /// AUDIN as Mikey reads it back: the EEPROM's data-out wire-ORs with
    /// whatever the port drives.
    #[must_use]
    pub fn audin(&self) -> bool {
        match &self.eeprom {
            Some(ee) => ee.output(),
            None => self.audin,
        }
    }

    /// EEPROM lines ride the address counter: clock on ripple bit 1,
    /// select on ripple bit 7, data on AUDIN.
    fn tick_eeprom(&mut self) {
        if let Some(ee) = &mut self.eeprom {
            let cs = self.ripple_counter & 0x0080 != 0;
            let clk = self.ripple_counter & 0x0002 != 0;
            ee.tick(cs, clk, self.audin);
        }
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Bank contents are not serialized; a restored machine gets them
    /// back from the original image.
    pub fn copy_banks_from(&mut self, other: &Cartridge) {
        self.bank0.data.clone_from(&other.bank0.data);
        self.bank1.data.clone_from(&other.bank1.data);
        if let (Some(a), Some(b)) = (&mut self.bank0a, &other.bank0a) {
            a.data.clone_from(&b.data);
        }
        if let (Some(a), Some(b)) = (&mut self.bank1a, &other.bank1a) {
            a.data.clone_from(&b.data);
        }
    }
}

/// BS93 images load straight into RAM rather than through the cart port:
/// a big-endian load address in bytes 0-1, then the magic.
#[must_use]
pub fn is_bs93(data: &[u8]) -> bool {
    data.len() > 10 && &data[2..6] == b"BS93"
}

#[must_use]
pub fn bs93_load_addr(data: &[u8]) -> u16 {
    u16::from(data[0]) << 8 | u16::from(data[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_cart(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn raw_dump_sizes() {
        let cart = Cartridge::from_slice(&raw_cart(KIB_128)).unwrap();
        assert_eq!(cart.bank0.page_size(), 512);
        let cart = Cartridge::from_slice(&raw_cart(KIB_256)).unwrap();
        assert_eq!(cart.bank0.page_size(), 1024);
        assert!(Cartridge::from_slice(&raw_cart(100)).is_err());
        assert!(Cartridge::from_slice(&[]).is_err());
    }

    #[test]
    fn ripple_counter_walks_a_page() {
        let mut cart = Cartridge::from_slice(&raw_cart(KIB_256)).unwrap();
        let a = cart.read_bank0();
        let b = cart.read_bank0();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(cart.ripple_counter(), 2);
    }

    #[test]
    fn shift_register_selects_the_page() {
        let mut cart = Cartridge::from_slice(&raw_cart(KIB_256)).unwrap();
        // Select page 2: shift in 10.
        cart.shift_address_bit(1);
        cart.shift_address_bit(0);
        assert_eq!(cart.shift_register(), 0b10);
        assert_eq!(cart.ripple_counter(), 0);
        let expected = ((2 * 1024) % 251) as u8;
        assert_eq!(cart.read_bank0(), expected);
    }

    #[test]
    fn lnx_header_drives_geometry() {
        let mut image = vec![0u8; LNX_HEADER_LEN];
        image[0..4].copy_from_slice(b"LYNX");
        image[4] = 0x00;
        image[5] = 0x02; // 512-byte pages
        image.extend(raw_cart(KIB_128));
        let cart = Cartridge::from_slice(&image).unwrap();
        assert_eq!(cart.bank0.page_size(), 512);
    }

    #[test]
    fn bs93_detection() {
        let mut image = vec![0x02, 0x00];
        image.extend(b"BS93");
        image.extend([0u8; 16]);
        assert!(is_bs93(&image));
        assert_eq!(bs93_load_addr(&image), 0x0200);
        assert!(!is_bs93(&raw_cart(512)));
    }

    #[test]
    fn empty_slot_reads_open_bus() {
        let mut cart = Cartridge::none();
        assert_eq!(cart.read_bank0(), 0xFF);
        assert_eq!(cart.read_bank1(), 0xFF);
    }
}
