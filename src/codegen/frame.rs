/// Size of a variable or argument slot. Every storage type fits.
pub const SLOT_SIZE: u32 = 8;

/// Downward-growing stack frame below `%rbp`.
///
/// Offsets handed out are negative and `%rbp`-relative. The frame only grows
/// while a function is generated; the final reservation is read afterwards so
/// that temporaries carved out during expression generation are covered.
#[derive(Debug, Default)]
pub struct Frame {
    depth: u32,
}

impl Frame {
    /// Carves `size` bytes aligned to `size` and returns their offset.
    pub fn carve(&mut self, size: u32) -> i32 {
        self.depth = round_up(self.depth + size, size);
        -(self.depth as i32)
    }

    pub fn slot(&mut self) -> i32 {
        self.carve(SLOT_SIZE)
    }

    /// Bytes to subtract from `%rsp` in the prologue, kept 16-byte aligned.
    pub fn reserved(&self) -> u32 {
        round_up(self.depth, 16)
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::Frame;

    #[test]
    fn slots_grow_downward() {
        let mut frame = Frame::default();
        assert_eq!(frame.slot(), -8);
        assert_eq!(frame.slot(), -16);
        assert_eq!(frame.reserved(), 16);
    }

    #[test]
    fn mixed_sizes_stay_aligned() {
        let mut frame = Frame::default();
        assert_eq!(frame.slot(), -8);
        assert_eq!(frame.carve(4), -12);
        assert_eq!(frame.slot(), -24);
        assert_eq!(frame.reserved(), 32);
    }

    #[test]
    fn empty_frame_reserves_nothing() {
        assert_eq!(Frame::default().reserved(), 0);
    }
}
