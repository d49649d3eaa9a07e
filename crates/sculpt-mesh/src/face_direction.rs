//! The six cardinal directions a voxel face can point.

/// One of the six cardinal directions a voxel face can point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceDirection {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl FaceDirection {
    /// All six directions in order.
    pub const ALL: [FaceDirection; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// Returns `(layer_axis, u_axis, v_axis)`, each 0=X, 1=Y, 2=Z.
    ///
    /// `layer_axis` is perpendicular to the face; `u_axis` and `v_axis` span it.
    pub fn sweep_axes(self) -> (usize, usize, usize) {
        match self {
            Self::PosX | Self::NegX => (0, 2, 1),
            Self::PosY | Self::NegY => (1, 0, 2),
            Self::PosZ | Self::NegZ => (2, 0, 1),
        }
    }

    /// Returns the unit normal as `[f32; 3]`.
    pub fn normal(self) -> [f32; 3] {
        match self {
            Self::PosX => [1.0, 0.0, 0.0],
            Self::NegX => [-1.0, 0.0, 0.0],
            Self::PosY => [0.0, 1.0, 0.0],
            Self::NegY => [0.0, -1.0, 0.0],
            Self::PosZ => [0.0, 0.0, 1.0],
            Self::NegZ => [0.0, 0.0, -1.0],
        }
    }

    /// Returns the unit step `(dx, dy, dz)` toward the neighbor on this side.
    pub fn delta(self) -> (isize, isize, isize) {
        match self {
            Self::PosX => (1, 0, 0),
            Self::NegX => (-1, 0, 0),
            Self::PosY => (0, 1, 0),
            Self::NegY => (0, -1, 0),
            Self::PosZ => (0, 0, 1),
            Self::NegZ => (0, 0, -1),
        }
    }

    /// Returns `true` for the +X, +Y and +Z faces.
    pub fn is_positive(self) -> bool {
        matches!(self, Self::PosX | Self::PosY | Self::PosZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_directions_unique() {
        for (i, a) in FaceDirection::ALL.iter().enumerate() {
            for (j, b) in FaceDirection::ALL.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_delta_matches_normal() {
        for dir in FaceDirection::ALL {
            let (dx, dy, dz) = dir.delta();
            assert_eq!(dir.normal(), [dx as f32, dy as f32, dz as f32]);
        }
    }

    #[test]
    fn test_three_positive_faces() {
        let positive = FaceDirection::ALL.iter().filter(|d| d.is_positive()).count();
        assert_eq!(positive, 3);
    }
}
