pub mod bus;
pub mod cartridge;
pub mod consts;
pub mod core;
pub mod cpu;
pub mod error;
pub mod machine;
pub mod mikey;
pub mod ram;
pub mod rom;
pub mod scheduler;
pub mod suzy;
pub mod vectors;

pub use crate::core::{BreakReason, Core, CoreConfig, DebugSnapshot, Keypad, StopHandle};
pub use crate::error::CoreError;
pub use crate::machine::Machine;
pub use crate::mikey::uart::LinkBackend;
pub use crate::mikey::video::VideoSink;

/// Serializes a machine into `data`.
///
/// # Errors
///
/// Fails when the buffer is too small.
pub fn serialize(machine: &Machine, data: &mut [u8]) -> Result<(), &'static str> {
    match postcard::to_slice(machine, data) {
        Err(_) => Err("Serialization error."),
        Ok(_) => Ok(()),
    }
}

/// Deserializes a machine, taking the cartridge banks back from
/// `source` (bank contents are not part of the stream).
///
/// # Errors
///
/// Fails when the stream does not parse.
pub fn deserialize(data: &[u8], source: &Machine) -> Result<Machine, &'static str> {
    let mut machine = match postcard::from_bytes::<Machine>(data) {
        Err(_) => return Err("Deserialization error."),
        Ok(m) => m,
    };
    machine.cart_mut().copy_banks_from(source.cart());
    Ok(machine)
}

#[must_use]
pub const fn info() -> (&'static str, &'static str) {
    ("Caracal", env!("CARGO_PKG_VERSION"))
}

#[must_use]
pub const fn valid_extensions() -> &'static [&'static str] {
    &["lnx", "o", "lyx"]
}
