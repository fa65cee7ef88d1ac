//! Hardware layer for the tensile rig: the HX711 bit-bang driver, the
//! data-ready wait helper, simulated lines, and (with the `hardware`
//! feature) rppal-backed GPIO lines.
pub mod error;
pub mod hx711;
pub mod sim;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use hx711::Hx711;
