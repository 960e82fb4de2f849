use std::cell::RefCell;
use std::rc::Rc;

use yeswan::bus::Bus;
use yeswan::u20::u20;
use yeswan::{SystemType, WonderSwan};

/// A 64 KiB image that jumps to 2000:0000, where `code` sits
fn rom_with(code: &[u8]) -> Vec<u8> {
    let mut rom = vec![0; 0x10000];
    rom[0xFFF0..0xFFF5].copy_from_slice(&[0xEA, 0x00, 0x00, 0x00, 0x20]);
    rom[..code.len()].copy_from_slice(code);
    rom
}

fn boot(system: SystemType, code: &[u8]) -> WonderSwan {
    let mut swan = WonderSwan::new(system);
    swan.load_rom(rom_with(code)).unwrap();
    swan.reset();
    swan
}

#[test]
fn overshoot_carries_across_frames() {
    // JMP FAR 2000:0000, 7 cycles per iteration; 256 * 159 = 7 * 5815 - 1
    let mut swan = boot(SystemType::WonderSwan, &[0xEA, 0x00, 0x00, 0x00, 0x20]);
    for frame in 1..=3 {
        swan.run_frame();
        assert_eq!(swan.frame_cycles(), frame);
        assert_eq!(swan.frames_published(), frame);
    }
}

#[test]
fn frames_reach_the_callback() {
    // Fill the color palette RAM back color entry, then spin
    #[rustfmt::skip]
    let code = [
        0xB8, 0x00, 0x00, 0x8E, 0xD8,       // DS = 0
        0xC7, 0x06, 0x00, 0xFE, 0x0F, 0x0F, // palette RAM[0] = 0F0Fh
        0xB0, 0x80, 0xE6, 0x60,             // color mode
        0xEB, 0xFE,                         // JMP $
    ];
    let mut swan = boot(SystemType::WonderSwanColor, &code);
    let pixels = Rc::new(RefCell::new(Vec::new()));
    let sink = pixels.clone();
    swan.set_frame_callback(Some(Box::new(move |frame: &yeswan::display::Frame| {
        sink.borrow_mut().push(frame[10][10]);
    })));
    swan.run_frame();
    swan.run_frame();
    assert_eq!(*pixels.borrow(), vec![[0xFF, 0x00, 0xFF]; 2]);
    assert_eq!(swan.bus().peek_u16(u20(0xFE00)), 0x0F0F);
}

#[test]
fn trace_lines_follow_execution() {
    let mut swan = boot(SystemType::WonderSwan, &[0x90, 0xEB, 0xFD]);
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    swan.set_trace_sink(Some(Box::new(move |line: &str| {
        sink.borrow_mut().push(line.to_string())
    })));
    for _ in 0..3 {
        swan.run_step();
    }
    let lines = lines.borrow();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("FFFF:0000"));
    assert!(lines[1].starts_with("2000:0000"));
    assert!(lines[1].contains("NOP"));
    assert!(lines[2].starts_with("2000:0001"));
}
