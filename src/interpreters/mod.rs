//! The three non-translating execution backends, all driving the same
//! [Context](crate::machine::Context) but differing in how they get from a fetched opcode to the
//! executed effect.
//!
//! - [case] re-decodes every opcode on every visit via [Instruction::dispatch](crate::decoder::Instruction::dispatch).
//! - [pointer] decodes every opcode on every visit too, but via literal function-pointer tables
//!   keyed by opcode nibbles, rather than a compiled match expression.
//! - [cache] decodes the entire ROM exactly once into a parallel array of pre-resolved actions,
//!   then never decodes again.
//!
//! All three converge on the same per-cycle driver shape: check the debug hook, check the break
//! flag, execute, repeat, mirroring the original interpreter's `c8_execute_cycles_*` family.

pub mod case;
pub mod cache;
pub mod pointer;

use crate::callbacks::Handlers;
use crate::error::ErrorDetail;
use crate::machine::Context;

/// Runs `context` for up to `cycles` cycles using `context.mode`'s backend, or until the break
/// flag is set. Returns the number of cycles actually executed.
pub fn execute_cycles(
    context: &mut Context,
    handlers: &mut dyn Handlers,
    cycles: u64,
) -> Result<u64, ErrorDetail> {
    use crate::system::Mode;
    match context.mode {
        Mode::Case => case::execute_cycles(context, handlers, cycles),
        Mode::Pointer => pointer::execute_cycles(context, handlers, cycles),
        Mode::Cache => cache::execute_cycles(context, handlers, cycles),
        Mode::Dbt | Mode::Test => {
            crate::translator::execute_cycles(context, handlers, cycles)
        }
    }
}
