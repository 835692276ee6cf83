//! The dynamic binary translator: compiles guest basic blocks to host x86-64 machine code rather
//! than interpreting opcodes one at a time. Structured the same way as the reference
//! implementation's `xlat.c`/`xlat_x86.c`: [codebuf] owns executable memory, [regalloc] hands out
//! scratch host registers during emission, [emit] is the host instruction encoder, and [block]
//! ties them together into block compilation and the driver loop.
//!
//! Unlike the reference translator, which bakes a single process-global emulator context address
//! into every block and therefore only supports one running machine at a time, blocks here take
//! the [Context](crate::machine::Context) pointer as an argument and are cached per-context. This
//! is required to run two machines side by side under the lockstep differential tester, and costs
//! nothing at runtime since the pointer is already live in a register at block entry.
//!
//! Compiled blocks call back into Rust using the System V AMD64 argument registers (`rdi`,
//! `rsi`); this is correct on Linux and macOS. Windows uses `rcx`/`rdx` for the same purpose, so
//! the executable-memory allocation in [codebuf] is windows-aware but the code generated in
//! [block] is not yet; see `DESIGN.md`.

pub(crate) mod block;
pub(crate) mod codebuf;
pub(crate) mod emit;
pub(crate) mod regalloc;

pub use block::execute_cycles;
