pub mod cartridge;

use crate::display::{Aswan, DisplayController, DisplayVariant, Sphinx};
use crate::interrupt::{InterruptBits, InterruptController};
use crate::keypad::Keypad;
use crate::swan::SystemType;
use crate::u20::u20;

use cartridge::{Cartridge, ROM_WINDOW_START};

/// Value seen on reads nothing answers
pub const OPEN_BUS: u8 = 0x90;

/// The CPU's view of the machine: a 20-bit memory space and a 16-bit port
/// space. `peek_u8` must not have side effects.
pub trait Bus {
    fn read_u8(&mut self, addr: u20) -> u8;
    fn peek_u8(&self, addr: u20) -> u8;
    fn write_u8(&mut self, addr: u20, data: u8);
    fn read_port(&mut self, port: u16) -> u8;
    fn write_port(&mut self, port: u16, data: u8);

    fn read_u16(&mut self, addr: u20) -> u16 {
        let lo = self.read_u8(addr) as u16;
        let hi = self.read_u8(addr + 1u32) as u16;
        (hi << 8) | lo
    }

    fn peek_u16(&self, addr: u20) -> u16 {
        let lo = self.peek_u8(addr) as u16;
        let hi = self.peek_u8(addr + 1u32) as u16;
        (hi << 8) | lo
    }

    fn write_u16(&mut self, addr: u20, data: u16) {
        self.write_u8(addr, data as u8);
        self.write_u8(addr + 1u32, (data >> 8) as u8);
    }
}

/// The machine bus: internal RAM (which doubles as video memory), the
/// cartridge ROM window, and the port-mapped devices.
pub struct SystemBus {
    ram: Vec<u8>,
    cartridge: Option<Cartridge>,
    pub display: DisplayController,
    pub interrupts: InterruptController,
    pub keypad: Keypad,
}

impl SystemBus {
    pub fn new(system: SystemType) -> Self {
        let variant: Box<dyn DisplayVariant> = match system {
            SystemType::WonderSwan => Box::new(Aswan::new()),
            SystemType::WonderSwanColor => Box::new(Sphinx::new()),
        };
        Self {
            ram: vec![0; system.ram_size()],
            cartridge: None,
            display: DisplayController::new(variant),
            interrupts: InterruptController::new(),
            keypad: Keypad::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ram.fill(0);
        self.display.reset();
        self.interrupts.reset();
        self.keypad.reset();
    }

    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    /// Advances the display and latches whatever it asserted into the
    /// interrupt controller
    pub fn step_display(&mut self, cycles: u32) -> InterruptBits {
        let bits = self.display.step(cycles, &self.ram);
        self.interrupts.request(bits);
        bits
    }
}

impl Bus for SystemBus {
    fn read_u8(&mut self, addr: u20) -> u8 {
        self.peek_u8(addr)
    }

    fn peek_u8(&self, addr: u20) -> u8 {
        if let Some(&data) = self.ram.get(addr.raw()) {
            return data;
        }
        if addr.0 < ROM_WINDOW_START {
            return OPEN_BUS;
        }
        self.cartridge
            .as_ref()
            .and_then(|cart| cart.try_read_u8(addr))
            .unwrap_or(OPEN_BUS)
    }

    fn write_u8(&mut self, addr: u20, data: u8) {
        match self.ram.get_mut(addr.raw()) {
            Some(byte) => *byte = data,
            None => log::trace!("Ignored write to {addr}: {data:02X}"),
        }
    }

    fn read_port(&mut self, port: u16) -> u8 {
        if self.display.claims_port(port) {
            return self.display.read_register(port);
        }
        if let Some(data) = self.interrupts.read_port(port) {
            return data;
        }
        if let Some(data) = self.keypad.read_port(port) {
            return data;
        }
        log::trace!("Unmapped port read {port:#06X}");
        OPEN_BUS
    }

    fn write_port(&mut self, port: u16, data: u8) {
        if self.display.claims_port(port) {
            self.display.write_register(port, data);
        } else if !self.interrupts.write_port(port, data) && !self.keypad.write_port(port, data) {
            log::trace!("Unmapped port write {port:#06X}: {data:02X}");
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::Bus;
    use crate::u20::u20;

    /// A full megabyte of RAM and a latch per port
    pub struct FlatBus {
        memory: Vec<u8>,
        ports: Vec<u8>,
    }

    impl FlatBus {
        pub fn new() -> Self {
            Self {
                memory: vec![0; 0x10_0000],
                ports: vec![0; 0x1_0000],
            }
        }

        pub fn load(&mut self, addr: u20, bytes: &[u8]) {
            for (i, &byte) in bytes.iter().enumerate() {
                self.memory[(addr + i).raw()] = byte;
            }
        }

        pub fn peek(&self, addr: u20) -> u8 {
            self.memory[addr.raw()]
        }

        pub fn port(&self, port: u16) -> u8 {
            self.ports[port as usize]
        }

        pub fn set_port(&mut self, port: u16, data: u8) {
            self.ports[port as usize] = data;
        }
    }

    impl Bus for FlatBus {
        fn read_u8(&mut self, addr: u20) -> u8 {
            self.memory[addr.raw()]
        }

        fn peek_u8(&self, addr: u20) -> u8 {
            self.memory[addr.raw()]
        }

        fn write_u8(&mut self, addr: u20, data: u8) {
            self.memory[addr.raw()] = data;
        }

        fn read_port(&mut self, port: u16) -> u8 {
            self.ports[port as usize]
        }

        fn write_port(&mut self, port: u16, data: u8) {
            self.ports[port as usize] = data;
        }
    }
}
