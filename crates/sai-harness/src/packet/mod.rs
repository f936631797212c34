//! Frame construction, encoding and comparison.

mod builder;
mod cpu;
mod frame;
mod mask;

pub use builder::*;
pub use cpu::CpuPacket;
pub use frame::*;
pub use mask::{Mask, MaskedField};
