//! The function-pointer-table interpreter.
//!
//! Unlike [case](super::case), which leans on the compiler to turn a match expression into a
//! jump table, this backend builds its own tables explicitly, keyed by opcode nibbles exactly as
//! the reference interpreter's `opc_tab`/`reg_tab`/`sys_tab`/`key_tab`/`mem_tab` were: the top
//! nibble selects a table, and for the families whose top nibble alone doesn't determine the
//! operation (`0`, `8`, `E`, `F`) a second-level table keyed by the remaining nibbles picks the
//! actual handler. Every slot not wired to a real opcode defaults to [unknown], mirroring the
//! reference tables' "bad opcode" default entry.

use crate::decoder::OpAction;
use crate::error::ErrorDetail;
use crate::machine::Context;
use crate::system::System;
use std::sync::OnceLock;

pub(crate) type OpFn = fn(&mut Context, u16) -> Result<(), ErrorDetail>;

fn unknown(_context: &mut Context, opcode: u16) -> Result<(), ErrorDetail> {
    Err(ErrorDetail::UnknownInstruction { opcode })
}

fn sys_tab() -> &'static [OpFn; 0x1000] {
    static TABLE: OnceLock<[OpFn; 0x1000]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: [OpFn; 0x1000] = [unknown; 0x1000];
        table[0x04B] = |c, _| c.op_004b();
        table[0x0E0] = |c, _| c.op_00e0();
        table[0x0EE] = |c, _| c.op_00ee();
        table[0x0FB] = |c, _| c.op_00fb();
        table[0x0FC] = |c, _| c.op_00fc();
        table[0x0FD] = |c, _| c.op_00fd();
        table[0x0FE] = |c, _| c.op_00fe();
        table[0x0FF] = |c, _| c.op_00ff();
        for n in 0x0..=0xF {
            table[0x0C0 | n] = |c, op| c.op_00cn((op & 0xF) as u8);
        }
        table[0x200] = |c, _| c.op_mega_on();
        table[0x201] = |c, _| c.op_mega_off();
        for low in 0x202..=0x2FF {
            table[low] = |c, op| c.op_ld_hi_i(op & 0xFF);
        }
        for low in 0x300..=0x3FF {
            table[low] = |c, op| c.op_ld_pal((op & 0xFF) as u8);
        }
        for low in 0x400..=0x4FF {
            table[low] = |c, op| c.op_spr_w((op & 0xFF) as u8);
        }
        for low in 0x500..=0x5FF {
            table[low] = |c, op| c.op_spr_h((op & 0xFF) as u8);
        }
        for low in 0x600..=0x6FF {
            table[low] = |c, op| c.op_alpha((op & 0xFF) as u8);
        }
        for low in 0x700..=0x7FF {
            table[low] = |c, op| c.op_digi_snd((op & 0xFF) as u8);
        }
        table[0x800] = |c, _| c.op_stop_snd();
        for low in 0x900..=0x9FF {
            table[low] = |c, op| c.op_bmode((op & 0xFF) as u8);
        }
        table
    })
}

fn reg_tab() -> &'static [OpFn; 0x10] {
    static TABLE: OnceLock<[OpFn; 0x10]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: [OpFn; 0x10] = [unknown; 0x10];
        table[0x0] = |c, op| c.op_8xy0(x(op), y(op));
        table[0x1] = |c, op| c.op_8xy1(x(op), y(op));
        table[0x2] = |c, op| c.op_8xy2(x(op), y(op));
        table[0x3] = |c, op| c.op_8xy3(x(op), y(op));
        table[0x4] = |c, op| c.op_8xy4(x(op), y(op));
        table[0x5] = |c, op| c.op_8xy5(x(op), y(op));
        table[0x6] = |c, op| c.op_8xy6(x(op), y(op));
        table[0x7] = |c, op| c.op_8xy7(x(op), y(op));
        table[0xE] = |c, op| c.op_8xye(x(op), y(op));
        table
    })
}

fn key_tab() -> &'static [OpFn; 0x100] {
    static TABLE: OnceLock<[OpFn; 0x100]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: [OpFn; 0x100] = [unknown; 0x100];
        table[0x9E] = |c, op| c.op_ex9e(x(op));
        table[0xA1] = |c, op| c.op_exa1(x(op));
        table
    })
}

fn mem_tab() -> &'static [OpFn; 0x100] {
    static TABLE: OnceLock<[OpFn; 0x100]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: [OpFn; 0x100] = [unknown; 0x100];
        table[0x07] = |c, op| c.op_fx07(x(op));
        table[0x0A] = |c, op| c.op_fx0a(x(op));
        table[0x15] = |c, op| c.op_fx15(x(op));
        table[0x18] = |c, op| c.op_fx18(x(op));
        table[0x1E] = |c, op| c.op_fx1e(x(op));
        table[0x29] = |c, op| c.op_fx29(x(op));
        table[0x30] = |c, op| c.op_fx30(x(op));
        table[0x33] = |c, op| c.op_fx33(x(op));
        table[0x55] = |c, op| c.op_fx55(x(op));
        table[0x65] = |c, op| c.op_fx65(x(op));
        table[0x75] = |c, op| c.op_fx75(x(op));
        table[0x85] = |c, op| c.op_fx85(x(op));
        table
    })
}

fn x(opcode: u16) -> usize {
    ((opcode & 0x0F00) >> 8) as usize
}
fn y(opcode: u16) -> usize {
    ((opcode & 0x00F0) >> 4) as usize
}
fn nn(opcode: u16) -> u8 {
    (opcode & 0x00FF) as u8
}
fn nnn(opcode: u16) -> u16 {
    opcode & 0x0FFF
}

fn dispatch_0(context: &mut Context, opcode: u16) -> Result<(), ErrorDetail> {
    let low12 = (opcode & 0x0FFF) as usize;
    let handler = sys_tab()[low12];
    if handler == (unknown as OpFn) {
        context.op_0nnn(nnn(opcode))
    } else {
        handler(context, opcode)
    }
}

fn dispatch_8(context: &mut Context, opcode: u16) -> Result<(), ErrorDetail> {
    reg_tab()[(opcode & 0xF) as usize](context, opcode)
}

fn dispatch_e(context: &mut Context, opcode: u16) -> Result<(), ErrorDetail> {
    key_tab()[nn(opcode) as usize](context, opcode)
}

fn dispatch_f(context: &mut Context, opcode: u16) -> Result<(), ErrorDetail> {
    mem_tab()[nn(opcode) as usize](context, opcode)
}

fn opc_tab() -> &'static [OpFn; 0x10] {
    static TABLE: OnceLock<[OpFn; 0x10]> = OnceLock::new();
    TABLE.get_or_init(|| {
        [
            dispatch_0,
            |c, op| c.op_1nnn(nnn(op)),
            |c, op| c.op_2nnn(nnn(op)),
            |c, op| c.op_3xnn(x(op), nn(op)),
            |c, op| c.op_4xnn(x(op), nn(op)),
            |c, op| c.op_5xy0(x(op), y(op)),
            |c, op| c.op_6xnn(x(op), nn(op)),
            |c, op| c.op_7xnn(x(op), nn(op)),
            dispatch_8,
            |c, op| c.op_9xy0(x(op), y(op)),
            |c, op| c.op_annn(nnn(op)),
            |c, op| c.op_bnnn(nnn(op)),
            |c, op| c.op_cxnn(x(op), nn(op)),
            |c, op| c.op_dxyn(x(op), y(op), (op & 0xF) as u8),
            dispatch_e,
            dispatch_f,
        ]
    })
}

/// Executes the opcode already fetched and advanced past in `context`, via the function-pointer
/// tables rather than [Instruction::dispatch](crate::decoder::Instruction::dispatch).
fn execute_one(context: &mut Context, opcode: u16) -> Result<(), ErrorDetail> {
    opc_tab()[(opcode >> 12) as usize](context, opcode)
}

/// Resolves `opcode` to the handler the pointer-table backend would invoke for it, without
/// executing it. Shared with [super::cache], which predecodes an entire ROM with this same
/// resolution logic rather than repeating it per-cycle.
pub(crate) fn resolve_handler(opcode: u16) -> OpFn {
    match opcode >> 12 {
        0x0 => {
            let low12 = (opcode & 0x0FFF) as usize;
            let handler = sys_tab()[low12];
            if handler == (unknown as OpFn) {
                |c, op| c.op_0nnn(nnn(op))
            } else {
                handler
            }
        }
        0x8 => reg_tab()[(opcode & 0xF) as usize],
        0xE => key_tab()[nn(opcode) as usize],
        0xF => mem_tab()[nn(opcode) as usize],
        top => opc_tab()[top as usize],
    }
}

/// Drives `context` for up to `cycles` cycles using the pointer-table backend.
pub fn execute_cycles(
    context: &mut Context,
    handlers: &mut dyn crate::callbacks::Handlers,
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
        let opcode = context.fetch_and_advance()?;
        execute_one(context, opcode)?;
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

    #[test]
    fn test_6xnn_then_7xnn_via_pointer_tables() {
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

    #[test]
    fn test_8xy_family_routes_through_reg_tab() {
        let options = Options {
            system: System::Chip8,
            ..Options::default()
        };
        let program = Program::new(vec![0x60, 0x0A, 0x61, 0x03, 0x80, 0x14]);
        let mut context = Context::new(options, program).unwrap();
        let mut handlers = NullHandlers;
        execute_cycles(&mut context, &mut handlers, 3).unwrap();
        assert_eq!(context.variable_register(0x0), 0xD);
    }
}
