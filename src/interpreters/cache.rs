//! The predecode-cache interpreter.
//!
//! Scans every addressable byte pair once at start-up, resolving each to the handler the
//! pointer-table backend would use for it, and stores that alongside the raw opcode in a
//! parallel array indexed by address. From then on execution never decodes again: it reads the
//! cached handler for the current PC and calls it directly. This mirrors the reference
//! interpreter's `c8_execute_cycles_cache`, including its lack of any invalidation scheme - a ROM
//! that writes self-modifying code after the cache is built will not see those writes reflected
//! in execution, which matches the reference behaviour rather than "fixing" it.

use super::pointer::{resolve_handler, OpFn};
use crate::callbacks::Handlers;
use crate::error::ErrorDetail;
use crate::machine::Context;

/// A predecoded, cached program: one (opcode, handler) pair per addressable byte offset.
struct Cache {
    opcodes: Vec<u16>,
    handlers: Vec<OpFn>,
}

impl Cache {
    fn build(context: &Context) -> Self {
        let size = context.addressable_size();
        let mut opcodes = vec![0u16; size];
        let mut handlers: Vec<OpFn> = Vec::with_capacity(size);
        for address in 0..size {
            let opcode = context.peek_opcode(address).unwrap_or(0);
            opcodes[address] = opcode;
            handlers.push(resolve_handler(opcode));
        }
        Cache { opcodes, handlers }
    }
}

/// Drives `context` for up to `cycles` cycles using the predecode-cache backend, building the
/// cache on first use.
pub fn execute_cycles(
    context: &mut Context,
    handlers: &mut dyn Handlers,
    cycles: u64,
) -> Result<u64, ErrorDetail> {
    context.check_hires_detection();
    let cache = Cache::build(context);
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
        let pc = context.pc as usize;
        let opcode = cache.opcodes[pc];
        context.advance_pc_past_opcode();
        (cache.handlers[pc])(context, opcode)?;
        context.finish_cycle();
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
    use crate::options::Options;
    use crate::program::Program;
    use crate::system::System;

    #[test]
    fn test_predecoded_program_executes() {
        let options = Options {
            system: System::Chip8,
            ..Options::default()
        };
        let program = Program::new(vec![0x60, 0x05, 0x70, 0x03]);
        let mut context = Context::new(options, program).unwrap();
        let mut handlers = NullHandlers;
        execute_cycles(&mut context, &mut handlers, 2).unwrap();
        assert_eq!(context.variable_register(0x0), 0x8);
    }
}
