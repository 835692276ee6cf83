//! Basic-block compilation and the dynamic binary translator's driver loop.
//!
//! Mirrors the reference translator's `translate_block`/`c8_execute_cycles_dbt`: blocks are
//! compiled lazily, keyed by their starting program counter, and cached for the lifetime of the
//! [Context](crate::machine::Context) they were compiled for. A block is a straight-line run of
//! machine code: a handful of opcodes (register loads, adds, and bitwise ops on `Vx`) are
//! compiled to real host instructions operating directly on the guest register array; everything
//! else is compiled to a call back into the interpreter's own opcode implementations. Translation
//! stops at the first instruction that can redirect control flow (jumps, calls, returns, skips,
//! and the blocking key-wait), exactly as the reference implementation's per-opcode handlers each
//! return a "block finished" flag that `translate_block` checks after every instruction.

use super::codebuf::CodeBuffer;
use super::emit::{Emitter, HostReg};
use super::regalloc::RegisterAllocator;
use crate::callbacks::Handlers;
use crate::decoder::{Instruction, OpAction};
use crate::error::ErrorDetail;
use crate::machine::Context;
use std::collections::HashMap;

/// The maximum number of guest instructions translated into a single block. Bounds both the
/// code buffer size and the worst case where a ROM never executes a control-flow opcode.
const MAX_BLOCK_INSTRUCTIONS: usize = 512;

type BlockFn = unsafe extern "C" fn(*mut Context);

/// A single compiled basic block: its executable memory, entry point, and the number of guest
/// cycles running it to completion represents (so the driver loop can account for them as a
/// unit, just as the reference implementation's `xlat_block_t::num_cycles` does).
pub(crate) struct CompiledBlock {
    #[allow(dead_code)]
    code: CodeBuffer,
    entry: BlockFn,
    num_cycles: u64,
}

/// Per-[Context] cache of compiled blocks, keyed by the program counter they start at. Unlike
/// the predecode cache, entries here are never invalidated either: a ROM that overwrites its own
/// code after a block covering that address has been compiled will keep running the stale
/// translation, matching the reference behaviour.
pub(crate) struct BlockCache {
    blocks: HashMap<u16, CompiledBlock>,
}

impl BlockCache {
    pub(crate) fn new() -> Self {
        BlockCache {
            blocks: HashMap::new(),
        }
    }
}

/// Trampoline called from compiled code for every opcode the translator doesn't inline. Re-decodes
/// and executes it the same way the case-dispatch interpreter would, storing any error on the
/// context rather than propagating it across the FFI boundary.
extern "C" fn trampoline_dispatch(context: *mut Context, opcode: u16) -> u8 {
    let context = unsafe { &mut *context };
    match Instruction::decode_from(opcode).and_then(|instruction| instruction.dispatch(context)) {
        Ok(()) => 0,
        Err(error) => {
            context.dbt_error = Some(error);
            1
        }
    }
}

/// Sets `context.pc` to `next_pc`, mirroring the interpreter's `fetch_and_advance` having already
/// moved the program counter past the opcode by the time its handler runs. Called immediately
/// before a terminal opcode's own trampoline call, since every control-flow handler (absolute
/// jump/call/return, or a conditional `pc += 2` skip) either overwrites `pc` outright or assumes
/// it already points past the instruction currently executing.
extern "C" fn sync_pc(context: *mut Context, next_pc: u16) {
    let context = unsafe { &mut *context };
    context.pc = next_pc;
}

/// The third [OpAction] witness: rather than executing or disassembling an opcode, it emits host
/// machine code that has the same effect. A handful of pure register-arithmetic opcodes are
/// compiled inline via [HostReg::R14], which the block prologue loads with the address of the
/// guest `V` register array; every other opcode compiles to a call to [trampoline_dispatch].
pub(crate) struct BlockEmitter<'a> {
    emitter: &'a mut Emitter,
    regalloc: RegisterAllocator,
    context_ptr: u64,
    trampoline_addr: u64,
    sync_pc_addr: u64,
    /// The raw opcode of the instruction currently being compiled, needed by the trampoline
    /// fallback path (the decoded [Instruction] variant doesn't retain it). Set by
    /// [translate_block] immediately before each `dispatch` call.
    pub(crate) current_opcode: u16,
    /// The program counter value once this instruction has been fetched, i.e. `pc` as it would
    /// read inside the interpreter's own `dispatch` call. Set by [translate_block] alongside
    /// `current_opcode`; consumed by terminal opcodes, whose handlers either overwrite `pc`
    /// outright or add to it assuming this baseline.
    pub(crate) next_pc: u16,
    /// Set once an opcode that can redirect control flow has been compiled; translation stops
    /// after such an opcode.
    pub(crate) terminal: bool,
}

impl<'a> BlockEmitter<'a> {
    fn new(emitter: &'a mut Emitter, context_ptr: u64) -> Self {
        BlockEmitter {
            emitter,
            regalloc: RegisterAllocator::new(),
            context_ptr,
            trampoline_addr: trampoline_dispatch as usize as u64,
            sync_pc_addr: sync_pc as usize as u64,
            current_opcode: 0,
            next_pc: 0,
            terminal: false,
        }
    }

    /// Emits a call to [trampoline_dispatch] for the opcode currently being compiled, for any
    /// opcode the fast path doesn't handle inline.
    fn emit_trampoline_call(&mut self) {
        self.emitter.mov_r64_imm64(HostReg::RDI, self.context_ptr);
        self.emitter.mov_r32_imm32(HostReg::RSI, self.current_opcode as u32);
        self.emitter.mov_r64_imm64(HostReg::RAX, self.trampoline_addr);
        self.emitter.call_r64(HostReg::RAX);
    }

    /// Emits a call to [sync_pc] setting `context.pc` to `pc`.
    fn emit_sync_pc(&mut self, pc: u16) {
        self.emitter.mov_r64_imm64(HostReg::RDI, self.context_ptr);
        self.emitter.mov_r32_imm32(HostReg::RSI, pc as u32);
        self.emitter.mov_r64_imm64(HostReg::RAX, self.sync_pc_addr);
        self.emitter.call_r64(HostReg::RAX);
    }

    /// Emits a call to [sync_pc] with `next_pc`, then a trampoline call for the opcode currently
    /// being compiled. Used for every terminal opcode, so its handler sees the same `pc` baseline
    /// the interpreter's `fetch_and_advance` would have left it at.
    fn emit_terminal_trampoline_call(&mut self) {
        self.emit_sync_pc(self.next_pc);
        self.emit_trampoline_call();
    }

    fn scratch(&mut self) -> HostReg {
        self.regalloc.reserve_temp()
    }

    fn release(&mut self, reg: HostReg) {
        self.regalloc.free_temp(reg);
    }
}

impl<'a> OpAction for BlockEmitter<'a> {
    type Output = ();

    fn op_004b(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_00cn(&mut self, _n: u8) {
        self.emit_trampoline_call();
    }
    fn op_00e0(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_00ee(&mut self) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_00fb(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_00fc(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_00fd(&mut self) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_00fe(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_00ff(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_0nnn(&mut self, _nnn: u16) {
        self.emit_trampoline_call();
    }
    fn op_1nnn(&mut self, _nnn: u16) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_2nnn(&mut self, _nnn: u16) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_3xnn(&mut self, _x: usize, _nn: u8) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_4xnn(&mut self, _x: usize, _nn: u8) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_5xy0(&mut self, _x: usize, _y: usize) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_6xnn(&mut self, x: usize, nn: u8) {
        self.emitter.mov_basedisp8_imm8(HostReg::R14, x as i8, nn);
    }
    fn op_7xnn(&mut self, x: usize, nn: u8) {
        let temp = self.scratch();
        self.emitter.mov_r8_basedisp8(temp, HostReg::R14, x as i8);
        self.emitter.add_r8_imm8(temp, nn);
        self.emitter.mov_basedisp8_r8(HostReg::R14, x as i8, temp);
        self.release(temp);
    }
    fn op_8xy0(&mut self, x: usize, y: usize) {
        let temp = self.scratch();
        self.emitter.mov_r8_basedisp8(temp, HostReg::R14, y as i8);
        self.emitter.mov_basedisp8_r8(HostReg::R14, x as i8, temp);
        self.release(temp);
    }
    fn op_8xy1(&mut self, x: usize, y: usize) {
        let dst = self.scratch();
        let src = self.scratch();
        self.emitter.mov_r8_basedisp8(dst, HostReg::R14, x as i8);
        self.emitter.mov_r8_basedisp8(src, HostReg::R14, y as i8);
        self.emitter.or_r8_r8(dst, src);
        self.emitter.mov_basedisp8_r8(HostReg::R14, x as i8, dst);
        self.release(src);
        self.release(dst);
    }
    fn op_8xy2(&mut self, x: usize, y: usize) {
        let dst = self.scratch();
        let src = self.scratch();
        self.emitter.mov_r8_basedisp8(dst, HostReg::R14, x as i8);
        self.emitter.mov_r8_basedisp8(src, HostReg::R14, y as i8);
        self.emitter.and_r8_r8(dst, src);
        self.emitter.mov_basedisp8_r8(HostReg::R14, x as i8, dst);
        self.release(src);
        self.release(dst);
    }
    fn op_8xy3(&mut self, x: usize, y: usize) {
        let dst = self.scratch();
        let src = self.scratch();
        self.emitter.mov_r8_basedisp8(dst, HostReg::R14, x as i8);
        self.emitter.mov_r8_basedisp8(src, HostReg::R14, y as i8);
        self.emitter.xor_r8_r8(dst, src);
        self.emitter.mov_basedisp8_r8(HostReg::R14, x as i8, dst);
        self.release(src);
        self.release(dst);
    }
    fn op_8xy4(&mut self, _x: usize, _y: usize) {
        self.emit_trampoline_call();
    }
    fn op_8xy5(&mut self, _x: usize, _y: usize) {
        self.emit_trampoline_call();
    }
    fn op_8xy6(&mut self, _x: usize, _y: usize) {
        self.emit_trampoline_call();
    }
    fn op_8xy7(&mut self, _x: usize, _y: usize) {
        self.emit_trampoline_call();
    }
    fn op_8xye(&mut self, _x: usize, _y: usize) {
        self.emit_trampoline_call();
    }
    fn op_9xy0(&mut self, _x: usize, _y: usize) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_annn(&mut self, _nnn: u16) {
        self.emit_trampoline_call();
    }
    fn op_bnnn(&mut self, _nnn: u16) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_cxnn(&mut self, _x: usize, _nn: u8) {
        self.emit_trampoline_call();
    }
    fn op_dxyn(&mut self, _x: usize, _y: usize, _n: u8) {
        self.emit_trampoline_call();
    }
    fn op_ex9e(&mut self, _x: usize) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_exa1(&mut self, _x: usize) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_fx07(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx0a(&mut self, _x: usize) {
        self.emit_terminal_trampoline_call();
        self.terminal = true;
    }
    fn op_fx15(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx18(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx1e(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx29(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx30(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx33(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx55(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx65(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx75(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_fx85(&mut self, _x: usize) {
        self.emit_trampoline_call();
    }
    fn op_mega_on(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_mega_off(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_ld_hi_i(&mut self, _nn: u16) {
        self.emit_trampoline_call();
    }
    fn op_ld_pal(&mut self, _nn: u8) {
        self.emit_trampoline_call();
    }
    fn op_spr_w(&mut self, _nn: u8) {
        self.emit_trampoline_call();
    }
    fn op_spr_h(&mut self, _nn: u8) {
        self.emit_trampoline_call();
    }
    fn op_alpha(&mut self, _nn: u8) {
        self.emit_trampoline_call();
    }
    fn op_digi_snd(&mut self, _nn: u8) {
        self.emit_trampoline_call();
    }
    fn op_stop_snd(&mut self) {
        self.emit_trampoline_call();
    }
    fn op_bmode(&mut self, _nn: u8) {
        self.emit_trampoline_call();
    }
}

/// Compiles the basic block starting at `context.pc`, without mutating `context` itself (decoding
/// walks its own cursor rather than reusing the live program counter, unlike the reference
/// implementation, which gets away with aliasing the two because it only ever compiles a block
/// the instant before running it for the first time).
fn translate_block(context: &mut Context) -> Result<CompiledBlock, ErrorDetail> {
    let start_address = context.pc;
    let addressable_size = context.addressable_size();
    let context_ptr = context as *mut Context as u64;
    let v_array_addr = context.v_array_ptr() as u64;

    let mut emitter = Emitter::new();
    emitter.push_r64(HostReg::R14);
    emitter.mov_r64_imm64(HostReg::R14, v_array_addr);

    let mut cursor = start_address as usize;
    let mut num_cycles: u64 = 0;
    let mut block_emitter = BlockEmitter::new(&mut emitter, context_ptr);

    loop {
        let opcode = match context.peek_opcode(cursor) {
            Some(opcode) => opcode,
            None if num_cycles == 0 => {
                return Err(ErrorDetail::MemoryAddressOutOfBounds { address: cursor })
            }
            None => break,
        };
        let instruction = match Instruction::decode_from(opcode) {
            Ok(instruction) => instruction,
            Err(error) if num_cycles == 0 => return Err(error),
            Err(_) => break,
        };
        let next_pc = ((cursor + 2) % addressable_size) as u16;
        block_emitter.current_opcode = opcode;
        block_emitter.next_pc = next_pc;
        instruction.dispatch(&mut block_emitter);
        cursor = next_pc as usize;
        num_cycles += 1;
        if block_emitter.terminal || num_cycles as usize >= MAX_BLOCK_INSTRUCTIONS {
            break;
        }
    }

    // A block that ended on a terminal opcode already has `pc` synced by that opcode's own
    // trampoline call. One that ended because it ran out of instructions to decode (hit the
    // cap, or decoding/bounds failed after at least one instruction already compiled) needs an
    // explicit sync, since the last compiled opcode may have been an inline fast-path one that
    // never touches `pc` at all.
    if !block_emitter.terminal {
        block_emitter.emit_sync_pc(cursor as u16);
    }

    emitter.pop_r64(HostReg::R14);
    emitter.ret();

    let mut code = CodeBuffer::new(emitter.bytes.len())?;
    code.as_mut_slice()[..emitter.bytes.len()].copy_from_slice(&emitter.bytes);
    code.make_executable()?;
    let entry: BlockFn = unsafe { std::mem::transmute(code.entry_point()) };

    Ok(CompiledBlock {
        code,
        entry,
        num_cycles,
    })
}

/// Drives `context` for up to `cycles` cycles using the dynamic binary translator, compiling and
/// caching one block per distinct program counter visited.
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
        let pc = context.pc;
        if !context.dbt_cache.blocks.contains_key(&pc) {
            let block = translate_block(context)?;
            context.dbt_cache.blocks.insert(pc, block);
        }
        let block = context.dbt_cache.blocks.get(&pc).expect("just inserted");
        unsafe {
            (block.entry)(context as *mut Context);
        }
        if let Some(error) = context.take_dbt_error() {
            return Err(error);
        }
        let block_cycles = context.dbt_cache.blocks.get(&pc).expect("just inserted").num_cycles;
        context.cycles += block_cycles;
        executed += block_cycles;
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
    use crate::system::{Mode, System};

    #[test]
    fn test_inline_fast_path_executes_correctly() {
        let options = Options {
            system: System::Chip8,
            mode: Mode::Dbt,
            ..Options::default()
        };
        let program = Program::new(vec![0x60, 0x05, 0x70, 0x03, 0x12, 0x00]);
        let mut context = Context::new(options, program).unwrap();
        let mut handlers = NullHandlers;
        execute_cycles(&mut context, &mut handlers, 2).unwrap();
        assert_eq!(context.variable_register(0x0), 0x8);
    }

    #[test]
    fn test_trampoline_path_executes_jump() {
        let options = Options {
            system: System::Chip8,
            mode: Mode::Dbt,
            ..Options::default()
        };
        // LD V0, 0x5 ; JP 0x206 ; (skip) ; LD V1, 0x9
        let program = Program::new(vec![0x60, 0x05, 0x12, 0x06, 0x00, 0x00, 0x61, 0x09]);
        let mut context = Context::new(options, program).unwrap();
        let mut handlers = NullHandlers;
        execute_cycles(&mut context, &mut handlers, 2).unwrap();
        assert_eq!(context.variable_register(0x0), 0x5);
        assert_eq!(context.variable_register(0x1), 0x9);
    }

    #[test]
    fn test_block_cache_reused_across_calls() {
        let options = Options {
            system: System::Chip8,
            mode: Mode::Dbt,
            ..Options::default()
        };
        let program = Program::new(vec![0x70, 0x01, 0x12, 0x00]);
        let mut context = Context::new(options, program).unwrap();
        let mut handlers = NullHandlers;
        execute_cycles(&mut context, &mut handlers, 4).unwrap();
        assert_eq!(context.dbt_cache.blocks.len(), 1);
    }
}
