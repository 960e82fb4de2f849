use crate::bus::cartridge::{Cartridge, RomError};
use crate::bus::SystemBus;
use crate::cpu::{Cpu, TraceSink};
use crate::display::{DisplayController, Frame};
use crate::interrupt::InterruptBits;
use crate::keypad::Buttons;
use crate::scheduler::Scheduler;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemType {
    WonderSwan,
    WonderSwanColor,
}

impl SystemType {
    pub fn is_color(&self) -> bool {
        *self == SystemType::WonderSwanColor
    }

    pub fn ram_size(&self) -> usize {
        match self {
            SystemType::WonderSwan => 0x4000,
            SystemType::WonderSwanColor => 0x10000,
        }
    }
}

pub type InputCallback = Box<dyn FnMut() -> Buttons>;

/// The whole machine: CPU, bus devices and the coordinator that interleaves
/// them
pub struct WonderSwan {
    system: SystemType,
    cpu: Cpu,
    bus: SystemBus,
    scheduler: Scheduler,
    on_input: Option<InputCallback>,
}

impl WonderSwan {
    pub fn new(system: SystemType) -> Self {
        Self {
            system,
            cpu: Cpu::new(),
            bus: SystemBus::new(system),
            scheduler: Scheduler::new(),
            on_input: None,
        }
    }

    pub fn system(&self) -> SystemType {
        self.system
    }

    pub fn load_rom(&mut self, rom: Vec<u8>) -> Result<(), RomError> {
        let cartridge = Cartridge::new(rom)?;
        if cartridge.requires_color() && !self.system.is_color() {
            log::warn!("ROM expects color hardware; running it on {:?}", self.system);
        }
        self.bus.insert_cartridge(cartridge);
        Ok(())
    }

    pub fn reset(&mut self) {
        log::debug!("Reset {:?}", self.system);
        self.cpu.reset();
        self.bus.reset();
        self.scheduler.reset();
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    pub fn display(&self) -> &DisplayController {
        &self.bus.display
    }

    pub fn frame(&self) -> &Frame {
        self.bus.display.frame()
    }

    pub fn frames_published(&self) -> u64 {
        self.bus.display.frames_published()
    }

    pub fn set_frame_callback(&mut self, callback: Option<Box<dyn FnMut(&Frame)>>) {
        self.bus.display.set_frame_callback(callback);
    }

    pub fn set_input_callback(&mut self, callback: Option<InputCallback>) {
        self.on_input = callback;
    }

    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.cpu.set_trace_sink(sink);
    }

    /// Runs one CPU step, lets the display catch up, then delivers the
    /// highest pending interrupt if the CPU accepts it. Returns the CPU
    /// cycles spent, including any interrupt delivery.
    pub fn run_step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.bus);
        let display_cycles = self.scheduler.cpu_ran(cycles);
        self.bus.step_display(display_cycles);

        let Some(bit) = self.bus.interrupts.pending() else {
            return cycles;
        };
        let vector = self.bus.interrupts.vector(bit);
        match self.cpu.request_interrupt(&mut self.bus, vector) {
            Some(delivery) => {
                self.bus.interrupts.clear(bit);
                self.scheduler.defer(delivery);
                cycles + delivery
            }
            None => cycles,
        }
    }

    /// Runs until one frame's worth of CPU cycles has elapsed. Overshoot is
    /// carried into the next frame.
    pub fn run_frame(&mut self) {
        self.poll_input();
        while !self
            .scheduler
            .frame_complete(self.bus.display.cycles_per_frame())
        {
            self.run_step();
        }
        self.scheduler
            .end_frame(self.bus.display.cycles_per_frame());
    }

    /// CPU cycles counted toward the current frame
    pub fn frame_cycles(&self) -> u64 {
        self.scheduler.frame_cycles()
    }

    fn poll_input(&mut self) {
        let Some(on_input) = self.on_input.as_mut() else {
            return;
        };
        if self.bus.keypad.set_buttons(on_input()) {
            let mut bits = InterruptBits::default();
            bits.set_key(true);
            self.bus.interrupts.request(bits);
        }
    }
}
