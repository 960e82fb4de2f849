pub mod bus;
pub mod cpu;
pub mod disassembler;
pub mod display;
pub mod interrupt;
pub mod keypad;
pub mod scheduler;
pub mod swan;
pub mod u20;

pub use swan::{SystemType, WonderSwan};
