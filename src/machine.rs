use crate::decoder::{Instruction, OpAction};
use crate::display::{Display, MegaDisplay};
use crate::error::ErrorDetail;
use crate::font::Font;
use crate::keypad::Keypad;
use crate::memory::Memory;
use crate::options::Options;
use crate::program::Program;
use crate::rng::Rng;
use crate::stack::Stack;
use crate::system::{ExecFlags, Mode, System};
use log::{debug, warn};

/// The number of general-purpose variable registers (V0-VF).
const NUMBER_OF_VARIABLE_REGISTERS: usize = 16;
/// The number of SuperChip HP48 "RPL" persistent user-flag registers.
const NUMBER_OF_RPL_REGISTERS: usize = 8;
/// Timers (delay and sound) always decrement at 60 Hz, independent of processor_speed_hertz.
const TIMER_FREQUENCY_HERTZ: u64 = 60;
/// Memory address the low-resolution (CHIP-8) font is loaded to.
const LOW_RES_FONT_START_ADDRESS: usize = 0x50;
/// Memory address the high-resolution (SuperChip) font is loaded to, directly after the
/// low-resolution font.
const HIGH_RES_FONT_START_ADDRESS: usize = 0xA0;
/// Bytes per glyph in the low-resolution (CHIP-8) font.
const LOW_RES_FONT_CHAR_SIZE_BYTES: usize = 5;
/// Bytes per glyph in the high-resolution (SuperChip 1.1) font.
const SUPERCHIP11_FONT_CHAR_SIZE_BYTES: usize = 10;

/// A snapshot of machine state, taken either routinely (for host display/debugging) or at the
/// point an error occurred (embedded in [crate::error::EmulatorError]).
#[derive(Clone, Debug, PartialEq)]
pub enum StateSnapshot {
    /// Just the pixels, cheap enough to take every frame for rendering.
    Minimal {
        frame_buffer: Display,
        mega_frame_buffer: Option<MegaDisplay>,
    },
    /// Full architectural state, suitable for debugging and for lockstep comparison between
    /// two backends under test.
    Extended {
        frame_buffer: Display,
        mega_frame_buffer: Option<MegaDisplay>,
        stack: Stack,
        program_counter: u16,
        index_register: u32,
        variable_registers: [u8; NUMBER_OF_VARIABLE_REGISTERS],
        rpl_registers: [u8; NUMBER_OF_RPL_REGISTERS],
        delay_timer: u8,
        sound_timer: u8,
        cycles: u64,
        system: System,
        mode: Mode,
        high_resolution_mode: bool,
    },
}

/// The full architectural state of one emulated CHIP-8 family machine, plus the bookkeeping
/// the interpreter/translator backends share to drive it.
///
/// This is the "Execute" witness referred to in [crate::decoder::OpAction]: every opcode has a
/// direct implementation here, and the three interpreter backends plus the translator's
/// fallback path all eventually call through to it for the opcodes they don't inline themselves.
pub struct Context {
    pub(crate) memory: Memory,
    pub(crate) stack: Stack,
    pub(crate) keypad: Keypad,
    pub(crate) display: Display,
    pub(crate) mega_display: Option<MegaDisplay>,
    v: [u8; NUMBER_OF_VARIABLE_REGISTERS],
    rpl: [u8; NUMBER_OF_RPL_REGISTERS],
    i: u32,
    pub(crate) pc: u16,
    dt: u8,
    st: u8,
    pub(crate) cycles: u64,
    pub(crate) system: System,
    pub(crate) mode: Mode,
    pub(crate) exec_flags: ExecFlags,
    rng: Rng,
    processor_speed_hertz: u64,
    program_start_address: u16,
    high_resolution_mode: bool,
    waiting_for_key: Option<usize>,
    mega_mode: bool,
    sprite_width: u8,
    sprite_height: u8,
    alpha: u8,
    blend_mode: u8,
    palette: [u32; 256],
    last_timer_decrement_cycle: u64,
    pub(crate) dirty: bool,
    sound_on: bool,
    pub(crate) dbt_cache: crate::translator::block::BlockCache,
    pub(crate) dbt_error: Option<ErrorDetail>,
}

impl Context {
    /// Constructor that builds a fresh [Context] for `options.system`, loads `program` starting
    /// at `options.program_start_address`, and seeds the embedded random generator from
    /// `options.rng_seed`.
    pub fn new(options: Options, program: Program) -> Result<Self, ErrorDetail> {
        let mut rng = Rng::new(options.rng_seed);
        let memory_system = options.system;
        let mut memory = Memory::new(memory_system, &mut rng);
        let low_res_font = Font::default_low_resolution();
        let high_res_font = Font::default_high_resolution();
        memory.write_bytes(LOW_RES_FONT_START_ADDRESS, low_res_font.font_data())?;
        memory.write_bytes(HIGH_RES_FONT_START_ADDRESS, high_res_font.font_data())?;
        memory.write_bytes(options.program_start_address as usize, program.program_data())?;
        Ok(Context {
            memory,
            stack: Stack::new(),
            keypad: Keypad::new(),
            display: Display::new(),
            mega_display: if options.system == System::MChip {
                Some(MegaDisplay::new())
            } else {
                None
            },
            v: [0x0; NUMBER_OF_VARIABLE_REGISTERS],
            rpl: [0x0; NUMBER_OF_RPL_REGISTERS],
            i: 0x0,
            pc: options.program_start_address,
            dt: 0x0,
            st: 0x0,
            cycles: 0,
            system: options.system,
            mode: options.mode,
            exec_flags: ExecFlags::default(),
            rng,
            processor_speed_hertz: options.processor_speed_hertz,
            program_start_address: options.program_start_address,
            high_resolution_mode: matches!(options.system, System::HChip | System::SChip),
            waiting_for_key: None,
            mega_mode: false,
            sprite_width: 8,
            sprite_height: 0,
            alpha: 0xFF,
            blend_mode: 0,
            palette: [0x0; 256],
            last_timer_decrement_cycle: 0,
            dirty: false,
            sound_on: false,
            dbt_cache: crate::translator::block::BlockCache::new(),
            dbt_error: None,
        })
    }

    /// Returns a raw pointer to the first variable register, `V0`. The translator bakes this
    /// address into compiled blocks so they can index straight into the register array rather
    /// than calling back into Rust for simple register arithmetic.
    pub(crate) fn v_array_ptr(&mut self) -> *mut u8 {
        self.v.as_mut_ptr()
    }

    /// Takes (clearing) any error a translated block's trampoline call recorded while running.
    pub(crate) fn take_dbt_error(&mut self) -> Option<ErrorDetail> {
        self.dbt_error.take()
    }

    /// Fetches, decodes and executes one instruction via the case-dispatch (match-based) path,
    /// advancing the program counter (wrapping within the addressable memory range) and the
    /// cycle counter, then servicing the 60 Hz timers if due.
    pub(crate) fn step(&mut self) -> Result<(), ErrorDetail> {
        if self.waiting_for_key.is_some() {
            return Ok(());
        }
        let opcode = self.fetch_and_advance()?;
        let instruction = Instruction::decode_from(opcode)?;
        debug!("executing {} ({:#06X}) at cycle {}", instruction.name(), opcode, self.cycles);
        instruction.dispatch(self)?;
        self.finish_cycle();
        Ok(())
    }

    /// Reads the opcode at the program counter and advances it, wrapping within the addressable
    /// memory range. Shared by every backend's fetch step.
    pub(crate) fn fetch_and_advance(&mut self) -> Result<u16, ErrorDetail> {
        let opcode: u16 = self.memory.read_two_bytes(self.pc as usize)?;
        self.pc = ((self.pc as usize + 2) % (self.memory.max_addressable_size() + 1)) as u16;
        Ok(opcode)
    }

    /// Bumps the cycle counter and services the 60 Hz timers. Called once an opcode has been
    /// executed, regardless of which backend executed it.
    pub(crate) fn finish_cycle(&mut self) {
        self.cycles += 1;
        self.service_timers();
    }

    /// Returns the current value of variable register `Vx`.
    pub fn variable_register(&self, x: usize) -> u8 {
        self.v[x]
    }

    /// Returns the number of addressable bytes (one past [Memory::max_addressable_size]), the
    /// size of a full predecode pass.
    pub(crate) fn addressable_size(&self) -> usize {
        self.memory.max_addressable_size() + 1
    }

    /// Returns the two-byte opcode at `address` without advancing the program counter, or `None`
    /// if `address` is the last addressable byte (no second byte available).
    pub(crate) fn peek_opcode(&self, address: usize) -> Option<u16> {
        self.memory.read_two_bytes(address).ok()
    }

    /// Advances the program counter past a two-byte opcode, wrapping within the addressable
    /// memory range. Used by backends that already know the opcode at the current PC (e.g. the
    /// predecode cache) and so skip [Context::fetch_and_advance]'s redundant read.
    pub(crate) fn advance_pc_past_opcode(&mut self) {
        self.pc = ((self.pc as usize + 2) % self.addressable_size()) as u16;
    }

    /// Detects the HIRES CHIP-8 preamble (`JP 0x260` as the very first instruction) and, if
    /// found, switches to [System::HChip] and patches the opcode's low byte so it becomes
    /// `JP 0x2C0`, the address HIRES ROMs actually expect to resume at once high-resolution
    /// mode is active. Checked once at entry to any backend, mirroring the reference
    /// interpreter's `check_for_hires`; a no-op on every call after the first, since the patched
    /// opcode no longer matches.
    pub(crate) fn check_hires_detection(&mut self) {
        if self.pc != 0x200 {
            return;
        }
        if self.memory.read_two_bytes(0x200) == Ok(0x1260) {
            self.system = System::HChip;
            self.high_resolution_mode = true;
            let _ = self.memory.write_byte(0x201, 0xC0);
        }
    }

    fn service_timers(&mut self) {
        let cycles_per_tick = self.processor_speed_hertz / TIMER_FREQUENCY_HERTZ.max(1);
        if cycles_per_tick == 0 || self.cycles - self.last_timer_decrement_cycle < cycles_per_tick {
            return;
        }
        self.last_timer_decrement_cycle = self.cycles;
        if self.dt > 0 {
            self.dt -= 1;
        }
        if self.st > 0 {
            self.st -= 1;
        }
    }

    /// Delivers a key state change from the host driver to the keypad, resolving any pending
    /// `FX0A` block-until-keypress if the key transitions to pressed.
    pub fn set_key_status(&mut self, key: u8, pressed: bool) -> Result<(), ErrorDetail> {
        self.keypad.set_key_status(key, pressed)?;
        if pressed {
            if let Some(x) = self.waiting_for_key {
                self.v[x] = key;
                self.waiting_for_key = None;
            }
        }
        Ok(())
    }

    /// Returns true if the sound timer is non-zero, i.e. the driver should be sounding its tone.
    pub fn sound_active(&self) -> bool {
        self.st > 0
    }

    /// Compares the sound timer's current active/inactive state against `sound_on` (the state
    /// last delivered to [Handlers::snd_ctrl](crate::callbacks::Handlers::snd_ctrl)) and, on a
    /// transition, updates `sound_on` and returns the new state. Returns `None` if the state
    /// hasn't changed, so callers only invoke `snd_ctrl` on an edge, not every cycle.
    pub(crate) fn sound_edge(&mut self) -> Option<bool> {
        let active = self.sound_active();
        if active == self.sound_on {
            return None;
        }
        self.sound_on = active;
        Some(active)
    }

    /// Returns true if execution is blocked on `FX0A` awaiting a keypress.
    pub(crate) fn is_waiting_for_key(&self) -> bool {
        self.waiting_for_key.is_some()
    }

    /// Returns a [StateSnapshot::Minimal] snapshot, cheap enough to take once per rendered frame.
    pub fn minimal_snapshot(&self) -> StateSnapshot {
        StateSnapshot::Minimal {
            frame_buffer: self.display.clone(),
            mega_frame_buffer: self.mega_display.clone(),
        }
    }

    /// Returns a [StateSnapshot::Extended] snapshot of full architectural state.
    pub fn extended_snapshot(&self) -> StateSnapshot {
        StateSnapshot::Extended {
            frame_buffer: self.display.clone(),
            mega_frame_buffer: self.mega_display.clone(),
            stack: self.stack.clone(),
            program_counter: self.pc,
            index_register: self.i,
            variable_registers: self.v,
            rpl_registers: self.rpl,
            delay_timer: self.dt,
            sound_timer: self.st,
            cycles: self.cycles,
            system: self.system,
            mode: self.mode,
            high_resolution_mode: self.high_resolution_mode,
        }
    }

    fn font_char_address(&self, digit: u8, wide: bool) -> usize {
        if wide {
            HIGH_RES_FONT_START_ADDRESS + (digit as usize) * SUPERCHIP11_FONT_CHAR_SIZE_BYTES
        } else {
            LOW_RES_FONT_START_ADDRESS + (digit as usize) * LOW_RES_FONT_CHAR_SIZE_BYTES
        }
    }

    fn draw_sprite(&mut self, x: usize, y: usize, n: u8) -> Result<(), ErrorDetail> {
        let vx = self.v[x] as usize;
        let vy = self.v[y] as usize;
        let collision = if self.mega_mode {
            let width = if self.sprite_width == 0 { 256 } else { self.sprite_width as usize };
            let height = if self.sprite_height == 0 { 256 } else { self.sprite_height as usize };
            let indices = self.memory.read_bytes(self.i as usize, width * height)?;
            self.mega_display
                .as_mut()
                .expect("mega_mode implies mega_display is populated")
                .draw_sprite(vx, vy, width, height, indices, &self.palette)
        } else if n == 0 && self.high_resolution_mode {
            let sprite = self.memory.read_bytes(self.i as usize, 32)?;
            self.display.draw_schip_sprite(vx, vy, sprite, true)
        } else {
            let sprite = self.memory.read_bytes(self.i as usize, n as usize)?;
            match self.system {
                System::Chip8 => self.display.draw_chip8_sprite(vx, vy, sprite),
                System::HChip => self.display.draw_hchip_sprite(vx, vy, sprite),
                System::SChip | System::MChip => self.display.draw_schip_sprite(vx, vy, sprite, false),
            }
        };
        self.v[0xF] = collision as u8;
        self.dirty = true;
        Ok(())
    }
}

impl OpAction for Context {
    type Output = Result<(), ErrorDetail>;

    fn op_004b(&mut self) -> Self::Output {
        Ok(())
    }

    fn op_00cn(&mut self, n: u8) -> Self::Output {
        self.display.scroll_down(n as usize);
        self.dirty = true;
        Ok(())
    }

    fn op_00e0(&mut self) -> Self::Output {
        self.display.clear();
        if let Some(mega) = self.mega_display.as_mut() {
            mega.clear();
        }
        self.dirty = true;
        Ok(())
    }

    fn op_00ee(&mut self) -> Self::Output {
        self.pc = self.stack.pop();
        Ok(())
    }

    fn op_00fb(&mut self) -> Self::Output {
        self.display.scroll_right();
        self.dirty = true;
        Ok(())
    }

    fn op_00fc(&mut self) -> Self::Output {
        self.display.scroll_left();
        self.dirty = true;
        Ok(())
    }

    fn op_00fd(&mut self) -> Self::Output {
        self.exec_flags.break_flag = true;
        Ok(())
    }

    fn op_00fe(&mut self) -> Self::Output {
        self.high_resolution_mode = false;
        Ok(())
    }

    fn op_00ff(&mut self) -> Self::Output {
        self.high_resolution_mode = true;
        Ok(())
    }

    fn op_0nnn(&mut self, nnn: u16) -> Self::Output {
        warn!("ignoring machine-language routine call to {:#05X}", nnn);
        Ok(())
    }

    fn op_1nnn(&mut self, nnn: u16) -> Self::Output {
        self.pc = nnn;
        Ok(())
    }

    fn op_2nnn(&mut self, nnn: u16) -> Self::Output {
        self.stack.push(self.pc);
        self.pc = nnn;
        Ok(())
    }

    fn op_3xnn(&mut self, x: usize, nn: u8) -> Self::Output {
        if self.v[x] == nn {
            self.pc = self.pc.wrapping_add(2);
        }
        Ok(())
    }

    fn op_4xnn(&mut self, x: usize, nn: u8) -> Self::Output {
        if self.v[x] != nn {
            self.pc = self.pc.wrapping_add(2);
        }
        Ok(())
    }

    fn op_5xy0(&mut self, x: usize, y: usize) -> Self::Output {
        if self.v[x] == self.v[y] {
            self.pc = self.pc.wrapping_add(2);
        }
        Ok(())
    }

    fn op_6xnn(&mut self, x: usize, nn: u8) -> Self::Output {
        self.v[x] = nn;
        Ok(())
    }

    fn op_7xnn(&mut self, x: usize, nn: u8) -> Self::Output {
        self.v[x] = self.v[x].wrapping_add(nn);
        Ok(())
    }

    fn op_8xy0(&mut self, x: usize, y: usize) -> Self::Output {
        self.v[x] = self.v[y];
        Ok(())
    }

    fn op_8xy1(&mut self, x: usize, y: usize) -> Self::Output {
        self.v[x] |= self.v[y];
        Ok(())
    }

    fn op_8xy2(&mut self, x: usize, y: usize) -> Self::Output {
        self.v[x] &= self.v[y];
        Ok(())
    }

    fn op_8xy3(&mut self, x: usize, y: usize) -> Self::Output {
        self.v[x] ^= self.v[y];
        Ok(())
    }

    fn op_8xy4(&mut self, x: usize, y: usize) -> Self::Output {
        let (result, carry) = self.v[x].overflowing_add(self.v[y]);
        self.v[x] = result;
        self.v[0xF] = carry as u8;
        Ok(())
    }

    fn op_8xy5(&mut self, x: usize, y: usize) -> Self::Output {
        let (result, borrow) = self.v[x].overflowing_sub(self.v[y]);
        self.v[x] = result;
        self.v[0xF] = !borrow as u8;
        Ok(())
    }

    fn op_8xy6(&mut self, x: usize, y: usize) -> Self::Output {
        let value = self.v[y];
        let shifted_out = value & 0x1;
        self.v[x] = value >> 1;
        self.v[0xF] = shifted_out;
        Ok(())
    }

    fn op_8xy7(&mut self, x: usize, y: usize) -> Self::Output {
        let (result, borrow) = self.v[y].overflowing_sub(self.v[x]);
        self.v[x] = result;
        self.v[0xF] = !borrow as u8;
        Ok(())
    }

    fn op_8xye(&mut self, x: usize, y: usize) -> Self::Output {
        let value = self.v[y];
        let shifted_out = (value & 0x80) >> 7;
        self.v[x] = value << 1;
        self.v[0xF] = shifted_out;
        Ok(())
    }

    fn op_9xy0(&mut self, x: usize, y: usize) -> Self::Output {
        if self.v[x] != self.v[y] {
            self.pc = self.pc.wrapping_add(2);
        }
        Ok(())
    }

    fn op_annn(&mut self, nnn: u16) -> Self::Output {
        self.i = nnn as u32;
        Ok(())
    }

    fn op_bnnn(&mut self, nnn: u16) -> Self::Output {
        self.pc = nnn.wrapping_add(self.v[0] as u16);
        Ok(())
    }

    fn op_cxnn(&mut self, x: usize, nn: u8) -> Self::Output {
        self.v[x] = self.rng.next_byte() & nn;
        Ok(())
    }

    fn op_dxyn(&mut self, x: usize, y: usize, n: u8) -> Self::Output {
        self.draw_sprite(x, y, n)
    }

    fn op_ex9e(&mut self, x: usize) -> Self::Output {
        if self.keypad.is_key_pressed(self.v[x])? {
            self.pc = self.pc.wrapping_add(2);
        }
        Ok(())
    }

    fn op_exa1(&mut self, x: usize) -> Self::Output {
        if !self.keypad.is_key_pressed(self.v[x])? {
            self.pc = self.pc.wrapping_add(2);
        }
        Ok(())
    }

    fn op_fx07(&mut self, x: usize) -> Self::Output {
        self.v[x] = self.dt;
        Ok(())
    }

    fn op_fx0a(&mut self, x: usize) -> Self::Output {
        if let Some(keys) = self.keypad.get_keys_pressed() {
            self.v[x] = keys[0];
        } else {
            self.waiting_for_key = Some(x);
        }
        Ok(())
    }

    fn op_fx15(&mut self, x: usize) -> Self::Output {
        self.dt = self.v[x];
        Ok(())
    }

    fn op_fx18(&mut self, x: usize) -> Self::Output {
        self.st = self.v[x];
        Ok(())
    }

    fn op_fx1e(&mut self, x: usize) -> Self::Output {
        self.i = self.i.wrapping_add(self.v[x] as u32);
        Ok(())
    }

    fn op_fx29(&mut self, x: usize) -> Self::Output {
        self.i = self.font_char_address(self.v[x] & 0xF, false) as u32;
        Ok(())
    }

    fn op_fx30(&mut self, x: usize) -> Self::Output {
        self.i = self.font_char_address(self.v[x] & 0xF, true) as u32;
        Ok(())
    }

    fn op_fx33(&mut self, x: usize) -> Self::Output {
        let value = self.v[x];
        self.memory.write_byte(self.i as usize, value / 100)?;
        self.memory.write_byte(self.i as usize + 1, (value / 10) % 10)?;
        self.memory.write_byte(self.i as usize + 2, value % 10)?;
        Ok(())
    }

    fn op_fx55(&mut self, x: usize) -> Self::Output {
        for offset in 0..=x {
            self.memory.write_byte(self.i as usize + offset, self.v[offset])?;
        }
        Ok(())
    }

    fn op_fx65(&mut self, x: usize) -> Self::Output {
        for offset in 0..=x {
            self.v[offset] = self.memory.read_byte(self.i as usize + offset)?;
        }
        Ok(())
    }

    fn op_fx75(&mut self, x: usize) -> Self::Output {
        let limit = x.min(NUMBER_OF_RPL_REGISTERS - 1);
        self.rpl[..=limit].copy_from_slice(&self.v[..=limit]);
        Ok(())
    }

    fn op_fx85(&mut self, x: usize) -> Self::Output {
        let limit = x.min(NUMBER_OF_RPL_REGISTERS - 1);
        self.v[..=limit].copy_from_slice(&self.rpl[..=limit]);
        Ok(())
    }

    fn op_mega_on(&mut self) -> Self::Output {
        self.mega_mode = true;
        Ok(())
    }

    fn op_mega_off(&mut self) -> Self::Output {
        self.mega_mode = false;
        Ok(())
    }

    fn op_ld_hi_i(&mut self, nn: u16) -> Self::Output {
        self.i = (self.i & 0xFFFF) | ((nn as u32) << 16);
        Ok(())
    }

    fn op_ld_pal(&mut self, nn: u8) -> Self::Output {
        // palette[0] is always transparent; entries are loaded starting at index 1, matching
        // the reference `for (i = 1; i <= palette_size; ++i)` loop.
        let bytes = self.memory.read_bytes(self.i as usize, nn as usize * 4)?;
        for (offset, chunk) in bytes.chunks(4).enumerate() {
            let (a, r, g, b) = (
                chunk[0] as u32,
                chunk[1] as u32,
                chunk[2] as u32,
                chunk[3] as u32,
            );
            self.palette[offset + 1] = (a << 24) | (b << 16) | (g << 8) | r;
        }
        Ok(())
    }

    fn op_spr_w(&mut self, nn: u8) -> Self::Output {
        self.sprite_width = nn;
        Ok(())
    }

    fn op_spr_h(&mut self, nn: u8) -> Self::Output {
        self.sprite_height = nn;
        Ok(())
    }

    fn op_alpha(&mut self, nn: u8) -> Self::Output {
        self.alpha = nn;
        Ok(())
    }

    fn op_digi_snd(&mut self, nn: u8) -> Self::Output {
        debug!("digitized sound playback requested with flags {:#04X} (host-driver concern)", nn);
        Ok(())
    }

    fn op_stop_snd(&mut self) -> Self::Output {
        Ok(())
    }

    fn op_bmode(&mut self, nn: u8) -> Self::Output {
        self.blend_mode = nn;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_context(system: System) -> Context {
        let options = Options {
            system,
            ..Options::default()
        };
        Context::new(options, Program::new(vec![0x00, 0xE0])).unwrap()
    }

    #[test]
    fn test_add_sets_carry_on_overflow() {
        let mut context = make_context(System::Chip8);
        context.v[0x0] = 0xFF;
        context.v[0x1] = 0x2;
        context.op_8xy4(0x0, 0x1).unwrap();
        assert_eq!(context.v[0x0], 0x1);
        assert_eq!(context.v[0xF], 1);
    }

    #[test]
    fn test_sub_sets_vf_on_no_borrow() {
        let mut context = make_context(System::Chip8);
        context.v[0x0] = 0x5;
        context.v[0x1] = 0x3;
        context.op_8xy5(0x0, 0x1).unwrap();
        assert_eq!(context.v[0x0], 0x2);
        assert_eq!(context.v[0xF], 1);
    }

    #[test]
    fn test_sub_clears_vf_on_borrow() {
        let mut context = make_context(System::Chip8);
        context.v[0x0] = 0x1;
        context.v[0x1] = 0x3;
        context.op_8xy5(0x0, 0x1).unwrap();
        assert_eq!(context.v[0x0], 0xFE);
        assert_eq!(context.v[0xF], 0);
    }

    #[test]
    fn test_call_then_ret_restores_pc() {
        let mut context = make_context(System::Chip8);
        context.pc = 0x200;
        context.op_2nnn(0x300).unwrap();
        assert_eq!(context.pc, 0x300);
        context.op_00ee().unwrap();
        assert_eq!(context.pc, 0x200);
    }

    #[test]
    fn test_cls_clears_and_marks_dirty() {
        let mut context = make_context(System::Chip8);
        context.display.pixels[0][0] = 0xFF;
        context.dirty = false;
        context.op_00e0().unwrap();
        assert_eq!(context.display.pixels[0][0], 0x0);
        assert!(context.dirty);
    }

    #[test]
    fn test_fx0a_blocks_until_keypress_then_resolves() {
        let mut context = make_context(System::Chip8);
        context.op_fx0a(0x3).unwrap();
        assert!(context.waiting_for_key.is_some());
        context.set_key_status(0x7, true).unwrap();
        assert!(context.waiting_for_key.is_none());
        assert_eq!(context.v[0x3], 0x7);
    }

    #[test]
    fn test_rng_is_deterministic_for_seed() {
        let options_a = Options {
            rng_seed: 123,
            ..Options::default()
        };
        let options_b = Options {
            rng_seed: 123,
            ..Options::default()
        };
        let mut context_a = Context::new(options_a, Program::new(vec![0x00, 0xE0])).unwrap();
        let mut context_b = Context::new(options_b, Program::new(vec![0x00, 0xE0])).unwrap();
        context_a.v[0x0] = 0xFF;
        context_b.v[0x0] = 0xFF;
        context_a.op_cxnn(0x0, 0xFF).unwrap();
        context_b.op_cxnn(0x0, 0xFF).unwrap();
        assert_eq!(context_a.v[0x0], context_b.v[0x0]);
    }
}
