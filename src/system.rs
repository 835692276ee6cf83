/// The CHIP-8 family variant being emulated. Determines addressable memory size, framebuffer
/// resolution/format, available instructions, and default font placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
pub enum System {
    /// The original CHIP-8 interpreter (64 x 32 logical resolution).
    Chip8,
    /// HiRes CHIP-8 (64 x 64), auto-detected from the 0x1260 preamble or selected explicitly.
    HChip,
    /// SuperChip (128 x 64), adds scrolling, HP48 persistent registers and 16x16 sprites.
    SChip,
    /// MegaChip (256 x 192, 32bpp), adds a palette, variable sprite dimensions and extended I.
    MChip,
}

/// The execution backend driving a context's cycle loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
pub enum Mode {
    /// Single decode-dispatch expression per cycle.
    Case,
    /// Dispatch via function-pointer tables built once at init.
    Pointer,
    /// Predecode the entire ROM once into an (opcode, action) cache, then execute from it.
    Cache,
    /// Dynamic binary translation: compile guest basic blocks to host machine code.
    Dbt,
    /// Lockstep differential testing of Case against Dbt.
    Test,
}

/// Execution-control flags checked before every guest instruction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecFlags {
    /// Set by the `EXIT` opcode; the driver loop checks this and stops before the next cycle.
    pub break_flag: bool,
    /// Set when a debug hook is attached; interpreters consult it before each cycle.
    pub debug: bool,
}
