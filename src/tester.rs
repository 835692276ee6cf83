//! The lockstep differential tester: runs two machine contexts built from identical [Options]
//! (same system, same ROM, same RNG seed) but different execution backends, and asserts they
//! reach identical architectural state after every guest cycle.
//!
//! The dynamic binary translator executes a whole basic block's worth of cycles in one call,
//! while the interpreter backends execute exactly one; this tester steps the single-cycle side
//! forward one cycle at a time until its cycle counter catches up to the block-stepped side,
//! comparing full state at each point they coincide. A mismatch at any point means the two
//! backends disagree about guest-visible behaviour, which given an identical seed and ROM can
//! only mean one of them has a bug.

use crate::callbacks::NullHandlers;
use crate::error::ErrorDetail;
use crate::interpreters;
use crate::machine::{Context, StateSnapshot};
use crate::options::Options;
use crate::program::Program;
use crate::system::Mode;
use log::error;

/// Describes the first point of divergence found between the two backends under test.
#[derive(Debug, PartialEq)]
pub struct Divergence {
    pub cycle: u64,
    pub reference: StateSnapshot,
    pub candidate: StateSnapshot,
}

/// Runs `reference_mode` against `candidate_mode` over identical copies of `program`, for up to
/// `max_cycles` guest cycles, returning the first [Divergence] found, or `None` if the two
/// backends agreed on every cycle.
pub fn run_lockstep(
    options: Options,
    program: Program,
    reference_mode: Mode,
    candidate_mode: Mode,
    max_cycles: u64,
) -> Result<Option<Divergence>, ErrorDetail> {
    let reference_options = Options {
        mode: reference_mode,
        ..options
    };
    let candidate_options = Options {
        mode: candidate_mode,
        ..options
    };
    let mut reference = Context::new(reference_options, clone_program(&program))?;
    let mut candidate = Context::new(candidate_options, program)?;
    let mut handlers = NullHandlers;

    while reference.cycles < max_cycles && candidate.cycles < max_cycles {
        interpreters::execute_cycles(&mut candidate, &mut handlers, 1)?;
        while reference.cycles < candidate.cycles {
            interpreters::execute_cycles(&mut reference, &mut handlers, 1)?;
        }
        if reference.cycles != candidate.cycles {
            continue;
        }
        let reference_snapshot = reference.extended_snapshot();
        let candidate_snapshot = candidate.extended_snapshot();
        if reference_snapshot != candidate_snapshot {
            error!(
                "lockstep divergence at cycle {}: {:?} vs {:?}",
                reference.cycles, reference_snapshot, candidate_snapshot
            );
            return Ok(Some(Divergence {
                cycle: reference.cycles,
                reference: reference_snapshot,
                candidate: candidate_snapshot,
            }));
        }
        if reference.exec_flags.break_flag || candidate.exec_flags.break_flag {
            break;
        }
    }
    Ok(None)
}

fn clone_program(program: &Program) -> Program {
    Program::new(program.program_data().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::System;

    #[test]
    fn test_identical_backends_never_diverge() {
        let options = Options {
            system: System::Chip8,
            rng_seed: 7,
            ..Options::default()
        };
        // V0 += 1 in a loop, touching ADD's carry flag and wrapping.
        let program = Program::new(vec![
            0x60, 0xFE, // LD V0, 0xFE
            0x70, 0x01, // ADD V0, 1
            0x70, 0x01, // ADD V0, 1 (wraps, sets VF)
            0x12, 0x00, // JP 0x200
        ]);
        let divergence = run_lockstep(options, program, Mode::Case, Mode::Pointer, 12).unwrap();
        assert!(divergence.is_none());
    }

    #[test]
    fn test_rnd_with_shared_seed_never_diverges() {
        let options = Options {
            system: System::Chip8,
            rng_seed: 99,
            ..Options::default()
        };
        let program = Program::new(vec![
            0xC0, 0xFF, // RND V0, 0xFF
            0xC1, 0xFF, // RND V1, 0xFF
            0x12, 0x00, // JP 0x200
        ]);
        let divergence = run_lockstep(options, program, Mode::Case, Mode::Cache, 8).unwrap();
        assert!(divergence.is_none());
    }
}
