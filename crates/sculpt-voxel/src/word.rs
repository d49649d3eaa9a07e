//! The packed 32-bit voxel word and the edit records that target it.
//!
//! Layout, least significant byte first:
//!
//! | Bits | Field |
//! |------|-------|
//! | 0..8 | material value (0 = empty) |
//! | 8..16 | red |
//! | 16..24 | green |
//! | 24..32 | blue |

/// Mask selecting the material value of a packed word.
pub const VALUE_MASK: u32 = 0xFF;

/// A decoded voxel word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Voxel {
    /// Material value. Zero means empty regardless of colour.
    pub value: u8,
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Voxel {
    /// The empty voxel (air, black).
    pub const EMPTY: Voxel = Voxel {
        value: 0,
        r: 0,
        g: 0,
        b: 0,
    };

    /// Creates a voxel from a material value and an RGB colour.
    pub const fn new(value: u8, [r, g, b]: [u8; 3]) -> Self {
        Self { value, r, g, b }
    }

    /// Packs this voxel into its 32-bit word.
    pub const fn pack(self) -> u32 {
        ((self.b as u32) << 24) ^ ((self.g as u32) << 16) ^ ((self.r as u32) << 8) ^ self.value as u32
    }

    /// Decodes a packed word.
    pub const fn unpack(word: u32) -> Self {
        Self {
            value: (word & VALUE_MASK) as u8,
            r: ((word >> 8) & 0xFF) as u8,
            g: ((word >> 16) & 0xFF) as u8,
            b: ((word >> 24) & 0xFF) as u8,
        }
    }

    /// Returns `true` if the material value is zero.
    pub const fn is_empty(self) -> bool {
        self.value == 0
    }

    /// Returns the colour as `[r, g, b]`.
    pub const fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Returns `true` if a packed word is empty (material value zero).
#[inline]
pub const fn is_empty_word(word: u32) -> bool {
    word & VALUE_MASK == 0
}

/// A single edit targeting the voxel at world position `(x, y, z)`.
///
/// When `value` is `None` the edit paints: the current material value is
/// kept and only the colour changes. Painting an empty voxel is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelEdit {
    /// World X.
    pub x: i32,
    /// World Y.
    pub y: i32,
    /// World Z.
    pub z: i32,
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// New material value, or `None` to paint.
    pub value: Option<u8>,
}

impl VoxelEdit {
    /// Writes `value` with colour `rgb` at `(x, y, z)`.
    pub const fn set(x: i32, y: i32, z: i32, value: u8, [r, g, b]: [u8; 3]) -> Self {
        Self {
            x,
            y,
            z,
            r,
            g,
            b,
            value: Some(value),
        }
    }

    /// Recolours the voxel at `(x, y, z)` without touching its material value.
    pub const fn paint(x: i32, y: i32, z: i32, [r, g, b]: [u8; 3]) -> Self {
        Self {
            x,
            y,
            z,
            r,
            g,
            b,
            value: None,
        }
    }

    /// Clears the voxel at `(x, y, z)`.
    pub const fn erase(x: i32, y: i32, z: i32) -> Self {
        Self::set(x, y, z, 0, [0, 0, 0])
    }

    /// Rebuilds the edit that writes the packed `word` back at `(x, y, z)`.
    pub const fn restore(x: i32, y: i32, z: i32, word: u32) -> Self {
        let voxel = Voxel::unpack(word);
        Self::set(x, y, z, voxel.value, voxel.rgb())
    }
}
