use super::{DISPLAY_X, DISPLAY_Y, Display};

/// Monochrome framebuffer with per-pixel change tracking.
///
/// A pixel stays dirty from the moment a draw or clear touches it until it is
/// read through [`FrameBuffer::observe`]. The frame as a whole is dirty while
/// any pixel is.
pub struct FrameBuffer {
    pixels: Display<bool>,
    dirty: Display<bool>,
    dirty_count: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: [[false; DISPLAY_X]; DISPLAY_Y],
            dirty: [[false; DISPLAY_X]; DISPLAY_Y],
            dirty_count: 0,
        }
    }

    /// Turns every pixel off and marks the whole frame changed.
    pub fn clear(&mut self) {
        self.pixels = [[false; DISPLAY_X]; DISPLAY_Y];
        self.dirty = [[true; DISPLAY_X]; DISPLAY_Y];
        self.dirty_count = DISPLAY_X * DISPLAY_Y;
    }

    /// XORs one sprite row onto the frame starting at (`x`, `y`), wrapping
    /// around both edges. Returns true if any pixel was turned off.
    pub fn xor_row(&mut self, x: usize, y: usize, bits: u8) -> bool {
        let row = y % DISPLAY_Y;
        let mut erased = false;

        for col in 0..8 {
            if bits & (0x80 >> col) == 0 {
                continue;
            }

            let column = (x + col) % DISPLAY_X;
            let pixel = &mut self.pixels[row][column];
            *pixel ^= true;
            erased |= !*pixel;
            self.mark(column, row);
        }

        erased
    }

    /// Returns the pixel value and clears its dirty flag.
    ///
    /// Panics if the coordinates are outside the display.
    pub fn observe(&mut self, x: usize, y: usize) -> bool {
        let dirty = &mut self.dirty[y][x];
        if *dirty {
            *dirty = false;
            self.dirty_count -= 1;
        }
        self.pixels[y][x]
    }

    /// Pixel value without touching the dirty flag.
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[y][x]
    }

    pub fn is_pixel_dirty(&self, x: usize, y: usize) -> bool {
        self.dirty[y][x]
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_count > 0
    }

    fn mark(&mut self, x: usize, y: usize) {
        let dirty = &mut self.dirty[y][x];
        if !*dirty {
            *dirty = true;
            self.dirty_count += 1;
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
