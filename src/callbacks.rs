//! The boundary between the emulation core and a host driver.
//!
//! The core never touches a window, an audio device or a file system beyond reading the ROM
//! bytes it is handed; anything that needs one of those goes through a [Handlers] implementation
//! supplied by the embedding application. This mirrors the original interpreter's split between
//! its portable core and its platform-specific front ends (SDL, EGL, ...).

/// Callbacks a host driver implements so the core can reach outside itself without knowing
/// anything about windowing, audio or threading primitives.
pub trait Handlers {
    /// Called when execution blocks on `FX0A` with no key currently pressed. The driver is
    /// expected to pump its input loop and call
    /// [Context::set_key_status](crate::machine::Context::set_key_status) as keys arrive; this
    /// callback returns once the driver has had a chance to do so for one iteration; the
    /// interpreter re-checks before continuing and calls again if still blocked.
    fn key_wait(&mut self);

    /// Called whenever the sound timer crosses the zero/non-zero boundary, telling the driver
    /// whether it should be sounding its tone.
    fn snd_ctrl(&mut self, on: bool);

    /// Called when the active system's resolution mode changes (SuperChip's `00FE`/`00FF`,
    /// or auto-detection of HiRes CHIP-8's startup preamble), so the driver can resize its
    /// presentation surface.
    fn set_mode(&mut self, high_resolution: bool);

    /// Called after a cycle leaves the frame buffer dirty, so the driver can schedule a redraw.
    /// The core does not rate-limit this; drivers that redraw on a fixed frame clock should
    /// simply check the dirty flag on their own cadence rather than relying on call frequency.
    fn vid_sync(&mut self);
}

/// A [Handlers] implementation that does nothing, useful for headless execution (the
/// differential tester, benchmarks, unit tests).
#[derive(Default)]
pub struct NullHandlers;

impl Handlers for NullHandlers {
    fn key_wait(&mut self) {}
    fn snd_ctrl(&mut self, _on: bool) {}
    fn set_mode(&mut self, _high_resolution: bool) {}
    fn vid_sync(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handlers_accepts_all_calls() {
        let mut handlers = NullHandlers;
        handlers.key_wait();
        handlers.snd_ctrl(true);
        handlers.set_mode(true);
        handlers.vid_sync();
    }
}
