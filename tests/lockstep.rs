//! Integration tests for the lockstep property: small embedded ROM fixtures, run through
//! the case interpreter against each of the other backends with a synchronized RNG seed,
//! must never diverge.

use polychip::tester::run_lockstep;
use polychip::{Mode, Options, Program, System};

fn options(system: System, rng_seed: u64) -> Options {
    Options {
        system,
        rng_seed,
        ..Options::default()
    }
}

#[test]
fn case_vs_pointer_never_diverges() {
    // Exercises arithmetic, conditional skips, and a tight backward jump.
    let program = Program::new(vec![
        0x60, 0x00, // LD V0, 0x00
        0x61, 0x01, // LD V1, 0x01
        0x80, 0x14, // ADD V0, V1
        0x30, 0x05, // SE V0, 0x05
        0x12, 0x04, // JP 0x204
        0x12, 0x0A, // JP 0x20A (halt once V0 reaches 5)
    ]);
    let divergence = run_lockstep(
        options(System::Chip8, 42),
        program,
        Mode::Case,
        Mode::Pointer,
        64,
    )
    .unwrap();
    assert!(divergence.is_none());
}

#[test]
fn case_vs_cache_never_diverges() {
    let program = Program::new(vec![
        0xA3, 0x00, // LD I, 0x300
        0x60, 0x7B, // LD V0, 0x7B
        0xF0, 0x33, // BCD V0
        0x12, 0x00, // JP 0x200
    ]);
    let divergence = run_lockstep(
        options(System::Chip8, 1337),
        program,
        Mode::Case,
        Mode::Cache,
        32,
    )
    .unwrap();
    assert!(divergence.is_none());
}

#[test]
fn case_vs_dbt_never_diverges_on_straight_line_arithmetic() {
    // Pure register arithmetic: compiled to inline host code by the translator's fast path.
    let program = Program::new(vec![
        0x60, 0xFE, // LD V0, 0xFE
        0x61, 0x03, // LD V1, 0x03
        0x80, 0x14, // ADD V0, V1 (wraps, sets VF)
        0x81, 0x02, // OR V1, V0
        0x12, 0x00, // JP 0x200
    ]);
    let divergence = run_lockstep(
        options(System::Chip8, 7),
        program,
        Mode::Case,
        Mode::Dbt,
        48,
    )
    .unwrap();
    assert!(divergence.is_none());
}

#[test]
fn case_vs_dbt_never_diverges_across_block_boundaries() {
    // A call/return pair forces the translator to end blocks at the branch-type opcodes,
    // exercising the trampoline path alongside the inline fast path.
    let program = Program::new(vec![
        0x22, 0x06, // CALL 0x206
        0x12, 0x02, // JP 0x202 (infinite loop once the subroutine returns)
        0x00, 0x00, // unreached padding
        0x61, 0x2A, // LD V1, 0x2A -- subroutine body
        0x00, 0xEE, // RET
    ]);
    let divergence = run_lockstep(
        options(System::Chip8, 99),
        program,
        Mode::Case,
        Mode::Dbt,
        40,
    )
    .unwrap();
    assert!(divergence.is_none());
}

#[test]
fn case_vs_dbt_with_shared_rng_seed_never_diverges() {
    let program = Program::new(vec![
        0xC0, 0x0F, // RND V0, 0x0F
        0xC1, 0xF0, // RND V1, 0xF0
        0x80, 0x14, // ADD V0, V1
        0x12, 0x00, // JP 0x200
    ]);
    let divergence = run_lockstep(
        options(System::Chip8, 2024),
        program,
        Mode::Case,
        Mode::Dbt,
        24,
    )
    .unwrap();
    assert!(divergence.is_none());
}

#[test]
fn superchip_case_vs_dbt_never_diverges() {
    let program = Program::new(vec![
        0x62, 0x10, // LD V2, 0x10
        0x63, 0x20, // LD V3, 0x20
        0x82, 0x32, // XOR V2, V3
        0x30, 0x32, // SE V0, 0x32 (false, no skip)
        0x12, 0x00, // JP 0x200
    ]);
    let divergence = run_lockstep(
        options(System::SChip, 5),
        program,
        Mode::Case,
        Mode::Dbt,
        24,
    )
    .unwrap();
    assert!(divergence.is_none());
}
