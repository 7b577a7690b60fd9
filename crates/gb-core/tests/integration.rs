//! Integration tests for the DMG system

use gb_core::instruction::Operation;
use gb_core::testing::{RomBuilder, PROGRAM_START};
use gb_core::{EmulatorError, GameBoy, RunConfig, StopReason};

fn system(program: &[u8], config: RunConfig) -> GameBoy {
    let image = RomBuilder::new().title("INTEGRATION").program(program).build();
    GameBoy::from_rom(&image, config).unwrap()
}

#[test]
fn test_system_creation() {
    let gb = system(&[], RunConfig::default());
    assert_eq!(gb.instructions(), 0);
    assert_eq!(gb.cycles(), 0);
    assert_eq!(gb.cpu().registers().pc, 0x0100);
    assert_eq!(gb.cartridge().title(), "INTEGRATION");
}

#[test]
fn test_nop_jr_loop_stops_at_limit() {
    // NOP ; JR -3
    let config = RunConfig {
        max_instructions: Some(10),
        exit_on_infinite_loop: true,
    };
    let mut gb = system(&[0x00, 0x18, 0xFD], config);

    assert_eq!(gb.run().unwrap(), StopReason::InstructionLimit);
    assert_eq!(gb.instructions(), 10);

    // Two entry instructions, then four NOP/JR pairs: the last one was JR
    assert_eq!(gb.cpu().registers().pc, PROGRAM_START);
}

#[test]
fn test_pc_alternates_in_loop() {
    let mut gb = system(&[0x00, 0x18, 0xFD], RunConfig::default());
    gb.step().unwrap();
    gb.step().unwrap();
    for _ in 0..5 {
        let nop = gb.step().unwrap();
        assert_eq!(nop.instruction.map(|i| i.operation), Some(Operation::Nop));
        assert_eq!(gb.cpu().registers().pc, PROGRAM_START + 1);

        let jr = gb.step().unwrap();
        assert_eq!(jr.cycles, 12);
        assert!(!jr.self_loop);
        assert_eq!(gb.cpu().registers().pc, PROGRAM_START);
    }
}

#[test]
fn test_infinite_loop_detection() {
    let config = RunConfig {
        max_instructions: Some(1_000),
        exit_on_infinite_loop: true,
    };
    let mut gb = system(&[0x00, 0x18, 0xFE], config);
    assert_eq!(
        gb.run().unwrap(),
        StopReason::InfiniteLoop { pc: PROGRAM_START + 1 }
    );
    assert_eq!(gb.instructions(), 4);
}

#[test]
fn test_infinite_loop_runs_to_limit_when_not_exiting() {
    let config = RunConfig {
        max_instructions: Some(50),
        exit_on_infinite_loop: false,
    };
    let mut gb = system(&[0x18, 0xFE], config);
    assert_eq!(gb.run().unwrap(), StopReason::InstructionLimit);
}

#[test]
fn test_halt_without_enabled_interrupts_is_deadlock() {
    // DI ; XOR A ; LDH (0xFF),A ; HALT
    let mut gb = system(&[0xF3, 0xAF, 0xE0, 0xFF, 0x76], RunConfig::default());
    assert_eq!(
        gb.run().unwrap(),
        StopReason::Deadlock { pc: PROGRAM_START + 5 }
    );
}

#[test]
fn test_halt_waiting_on_joypad_is_deadlock() {
    // LD A,0x10 ; LDH (IE),A ; DI ; HALT
    let config = RunConfig {
        max_instructions: Some(10),
        exit_on_infinite_loop: true,
    };
    let mut gb = system(&[0x3E, 0x10, 0xE0, 0xFF, 0xF3, 0x76], config);
    assert_eq!(
        gb.run().unwrap(),
        StopReason::Deadlock { pc: PROGRAM_START + 6 }
    );
    assert!(gb.instructions() <= 10);
}

#[test]
fn test_stop_waiting_on_joypad_is_deadlock() {
    // LD A,0x10 ; LDH (IE),A ; STOP
    let mut gb = system(&[0x3E, 0x10, 0xE0, 0xFF, 0x10, 0x00], RunConfig::default());
    assert_eq!(
        gb.run().unwrap(),
        StopReason::Deadlock { pc: PROGRAM_START + 6 }
    );
    assert!(gb.cpu().stopped());
}

#[test]
fn test_halt_on_stopped_timer_is_deadlock() {
    // LD A,0x04 ; LDH (IE),A ; XOR A ; LDH (TAC),A ; HALT
    let program = [0x3E, 0x04, 0xE0, 0xFF, 0xAF, 0xE0, 0x07, 0x76];
    let mut gb = system(&program, RunConfig::default());
    assert_eq!(
        gb.run().unwrap(),
        StopReason::Deadlock { pc: PROGRAM_START + 8 }
    );
}

#[test]
fn test_halt_on_vblank_waits_for_the_frame() {
    // LD A,0x01 ; LDH (IE),A ; XOR A ; LDH (IF),A ; DI ; HALT ; JR $
    let program = [0x3E, 0x01, 0xE0, 0xFF, 0xAF, 0xE0, 0x0F, 0xF3, 0x76, 0x18, 0xFE];
    let config = RunConfig {
        max_instructions: Some(1_000),
        exit_on_infinite_loop: true,
    };
    let mut gb = system(&program, config);
    assert_eq!(
        gb.run().unwrap(),
        StopReason::InfiniteLoop { pc: PROGRAM_START + 9 }
    );
    assert!(!gb.cpu().halted());
}

#[test]
fn test_conditional_self_loop_detection() {
    // OR 0x01 ; JR NZ,$
    let config = RunConfig {
        max_instructions: Some(1_000),
        exit_on_infinite_loop: true,
    };
    let mut gb = system(&[0xF6, 0x01, 0x20, 0xFE], config);
    assert_eq!(
        gb.run().unwrap(),
        StopReason::InfiniteLoop { pc: PROGRAM_START + 2 }
    );
    assert_eq!(gb.instructions(), 4);
}

#[test]
fn test_conditional_jr_not_taken_is_not_a_loop() {
    // XOR A ; JR NZ,$ ; JR $
    let config = RunConfig {
        max_instructions: Some(1_000),
        exit_on_infinite_loop: true,
    };
    let mut gb = system(&[0xAF, 0x20, 0xFE, 0x18, 0xFE], config);
    assert_eq!(
        gb.run().unwrap(),
        StopReason::InfiniteLoop { pc: PROGRAM_START + 3 }
    );
}

#[test]
fn test_timer_interrupt_wakes_and_dispatches() {
    let program = [
        0x31, 0xFE, 0xDF, // LD SP,0xDFFE
        0x3E, 0x04, //       LD A,0x04
        0xE0, 0xFF, //       LDH (IE),A
        0xAF, //             XOR A
        0xE0, 0x0F, //       LDH (IF),A
        0x3E, 0xFF, //       LD A,0xFF
        0xE0, 0x05, //       LDH (TIMA),A
        0x3E, 0x05, //       LD A,0x05
        0xE0, 0x07, //       LDH (TAC),A
        0xFB, //             EI
        0x76, //             HALT
        0x00, //             NOP
        0x18, 0xFE, //       JR $
    ];
    // Timer handler: LD A,0x42 ; LDH (0x80),A ; RETI
    let image = RomBuilder::new()
        .program(&program)
        .code(0x0050, &[0x3E, 0x42, 0xE0, 0x80, 0xD9])
        .build();
    let config = RunConfig {
        max_instructions: Some(10_000),
        exit_on_infinite_loop: true,
    };
    let mut gb = GameBoy::from_rom(&image, config).unwrap();

    let reason = gb.run().unwrap();
    assert_eq!(reason, StopReason::InfiniteLoop { pc: PROGRAM_START + 21 });
    assert_eq!(gb.read_memory(0xFF80), 0x42);
    assert_eq!(gb.read_memory(0xFF0F) & 0x04, 0);
    assert!(gb.cpu().ime());
    assert_eq!(gb.cpu().registers().sp, 0xDFFE);
}

#[test]
fn test_ei_delay_defers_dispatch() {
    let program = [
        0x3E, 0x01, // LD A,0x01
        0xE0, 0xFF, // LDH (IE),A   VBlank already requested after boot
        0xFB, //       EI
        0x3C, //       INC A        runs before the interrupt is taken
        0x18, 0xFE, // JR $
    ];
    let image = RomBuilder::new()
        .program(&program)
        .code(0x0040, &[0xD9])
        .build();
    let mut gb = GameBoy::from_rom(&image, RunConfig::default()).unwrap();

    for _ in 0..5 {
        gb.step().unwrap();
    }
    assert_eq!(gb.cpu().registers().pc, PROGRAM_START + 5);

    // INC A completes, then the interrupt dispatches
    let step = gb.step().unwrap();
    assert_eq!(step.cycles, 4 + 20);
    assert_eq!(gb.cpu().registers().a, 0x02);
    assert_eq!(gb.cpu().registers().pc, 0x0040);
}

#[test]
fn test_serial_output_capture() {
    let mut program = Vec::new();
    for &byte in b"OK" {
        // LD A,byte ; LDH (SB),A ; LD A,0x81 ; LDH (SC),A
        program.extend_from_slice(&[0x3E, byte, 0xE0, 0x01, 0x3E, 0x81, 0xE0, 0x02]);
    }
    program.extend_from_slice(&[0x18, 0xFE]);

    let config = RunConfig {
        max_instructions: Some(100),
        exit_on_infinite_loop: true,
    };
    let mut gb = system(&program, config);
    assert!(matches!(gb.run().unwrap(), StopReason::InfiniteLoop { .. }));
    assert_eq!(gb.serial_output(), b"OK");
    assert_eq!(gb.bus().serial().output_text(), "OK");
}

#[test]
fn test_invalid_opcode_stops_run() {
    let mut gb = system(&[0x00, 0xDD], RunConfig::default());
    match gb.run() {
        Err(EmulatorError::Cpu(err)) => {
            assert_eq!(err.to_string(), "invalid opcode 0xDD at 0x0151");
        }
        other => panic!("expected CPU error, got {other:?}"),
    }
}

#[test]
fn test_corrupt_rom_never_builds_a_system() {
    let mut image = RomBuilder::new().build();
    image[0x014D] = image[0x014D].wrapping_add(1);
    let result = GameBoy::from_rom(&image, RunConfig::default());
    assert!(matches!(result, Err(EmulatorError::Cartridge(_))));
}

#[test]
fn test_vblank_interrupt_from_lcd() {
    let program = [
        0x31, 0xFE, 0xDF, // LD SP,0xDFFE
        0x3E, 0x01, //       LD A,0x01
        0xE0, 0xFF, //       LDH (IE),A
        0xAF, //             XOR A
        0xE0, 0x0F, //       LDH (IF),A
        0xFB, //             EI
        0x18, 0xFE, //       JR $
    ];
    // VBlank handler: LD A,(0xFF81) ; INC A ; LDH (0x81),A ; RETI
    let image = RomBuilder::new()
        .program(&program)
        .code(0x0040, &[0xF0, 0x81, 0x3C, 0xE0, 0x81, 0xD9])
        .build();
    let config = RunConfig {
        max_instructions: Some(60_000),
        exit_on_infinite_loop: false,
    };
    let mut gb = GameBoy::from_rom(&image, config).unwrap();
    gb.run().unwrap();

    // 60k instructions at 12 cycles is roughly 10 frames
    let frames = gb.bus().lcd().frames();
    assert!(frames >= 9, "only {frames} frames");
    let handled = u64::from(gb.read_memory(0xFF81));
    assert!(handled + 1 >= frames && handled <= frames + 1);
}
