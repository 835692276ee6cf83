//! The switch-dispatch interpreter: every cycle re-decodes the fetched opcode and executes it
//! via a single compiled match expression ([Instruction::dispatch](crate::decoder::Instruction::dispatch)).
//! This is the simplest of the four backends and the one every other backend is checked against.

use crate::callbacks::Handlers;
use crate::error::ErrorDetail;
use crate::machine::Context;

/// Drives `context` for up to `cycles` cycles, stopping early if the break flag is set (the
/// `00FD` "exit" opcode) or if a key-wait is pending and the driver cannot resolve it.
///
/// Mirrors the reference interpreter's `c8_execute_cycles_case`: fetch, advance PC, check the
/// debug hook, dispatch, repeat.
pub fn execute_cycles(
    context: &mut Context,
    handlers: &mut dyn Handlers,
    cycles: u64,
) -> Result<u64, ErrorDetail> {
    context.check_hires_detection();
    let mut executed: u64 = 0;
    while executed < cycles {
        if context.exec_flags.break_flag {
            break;
        }
        if context.is_waiting_for_key() {
            handlers.key_wait();
            if context.is_waiting_for_key() {
                break;
            }
        }
        if context.exec_flags.debug {
            handlers.vid_sync();
        }
        context.step()?;
        executed += 1;
        if context.dirty {
            handlers.vid_sync();
            context.dirty = false;
        }
        if let Some(on) = context.sound_edge() {
            handlers.snd_ctrl(on);
        }
    }
    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::NullHandlers;
    use crate::machine::Context;
    use crate::options::Options;
    use crate::program::Program;
    use crate::system::System;

    #[test]
    fn test_runs_requested_cycle_count() {
        let options = Options {
            system: System::Chip8,
            ..Options::default()
        };
        // 6 0-0x12 loads V0, jumps back to self forever.
        let program = Program::new(vec![0x60, 0x12, 0x12, 0x00]);
        let mut context = Context::new(options, program).unwrap();
        let mut handlers = NullHandlers;
        let executed = execute_cycles(&mut context, &mut handlers, 10).unwrap();
        assert_eq!(executed, 10);
    }

    #[test]
    fn test_stops_on_break_flag() {
        let options = Options {
            system: System::Chip8,
            ..Options::default()
        };
        let program = Program::new(vec![0x00, 0xFD]); // SUPER-CHIP exit
        let mut context = Context::new(options, program).unwrap();
        let mut handlers = NullHandlers;
        let executed = execute_cycles(&mut context, &mut handlers, 10).unwrap();
        assert_eq!(executed, 1);
    }
}
