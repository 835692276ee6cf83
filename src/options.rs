use crate::system::{Mode, System};
use serde_derive::{Deserialize, Serialize};

/// The default CHIP-8 processor speed in hertz.
const DEFAULT_PROCESSOR_SPEED_HERTZ: u64 = 720;
/// The default CHIP-8 program start address within memory.
const DEFAULT_PROGRAM_ADDRESS: u16 = 0x200;
/// The default seed used when the caller doesn't care about reproducibility.
const DEFAULT_RNG_SEED: u64 = 0;

/// A struct to allow specification of start-up parameters for a machine context.
///
/// Configuration of an emulated machine is done through the [Options] struct, an instance of
/// which is passed to [Context::new](crate::machine::Context::new) when instantiating a
/// [Context](crate::machine::Context). `system` and `mode` together select, respectively, which
/// CHIP-8 family member is emulated and which execution backend drives it; `rng_seed` is shared
/// between the two contexts of a [Mode::Test] lockstep run so that `RND` and SuperChip's memory
/// noise produce identical sequences on both sides.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Options {
    pub processor_speed_hertz: u64,
    pub program_start_address: u16,
    pub system: System,
    pub mode: Mode,
    pub rng_seed: u64,
}

impl Default for Options {
    /// Constructor that returns an [Options] instance using typical default settings.
    fn default() -> Self {
        Options {
            processor_speed_hertz: DEFAULT_PROCESSOR_SPEED_HERTZ,
            program_start_address: DEFAULT_PROGRAM_ADDRESS,
            system: System::Chip8,
            mode: Mode::Case,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options: Options = Options::default();
        assert_eq!(options.processor_speed_hertz, DEFAULT_PROCESSOR_SPEED_HERTZ);
        assert_eq!(options.program_start_address, DEFAULT_PROGRAM_ADDRESS);
        assert_eq!(options.system, System::Chip8);
        assert_eq!(options.mode, Mode::Case);
    }
}
