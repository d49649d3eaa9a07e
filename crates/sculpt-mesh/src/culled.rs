//! Default kernel: one quad per exposed voxel face.
//!
//! The 2×2×2 neighborhood spans `2 * size` voxels per axis. The chunk meshed
//! is the central window `[half, half + size)` with `half = size / 2` rounded
//! down, which lines up with the chunk entity's origin from `chunk_origin`. Voxels in the
//! half-chunk margin around the window are read for culling only, so faces
//! on chunk seams match on both sides.

use sculpt_voxel::coord::{half_chunk, voxel_index};
use sculpt_voxel::word::{Voxel, is_empty_word};

use crate::face_direction::FaceDirection;
use crate::geometry::{INSTANCE_STRIDE, VERTEX_STRIDE};
use crate::kernel::{KernelOutput, MeshKernel};

/// Quad corner order for faces whose `(u, v)` basis already faces outward.
const FRONT: [usize; 6] = [0, 1, 2, 0, 2, 3];
/// Quad corner order for faces whose basis faces inward.
const BACK: [usize; 6] = [0, 2, 1, 0, 3, 2];

/// Face-culling kernel over packed voxel words.
#[derive(Clone, Copy, Debug, Default)]
pub struct CulledKernel;

impl CulledKernel {
    /// Creates the kernel.
    pub fn new() -> Self {
        Self
    }
}

/// Read-only view over a concatenated 2×2×2 neighborhood.
struct Neighborhood<'a> {
    chunks: &'a [u32],
    size: usize,
    volume: usize,
}

impl Neighborhood<'_> {
    /// Returns the word at neighborhood coordinates, or 0 outside it.
    fn word(&self, x: isize, y: isize, z: isize) -> u32 {
        let span = (self.size * 2) as isize;
        if x < 0 || y < 0 || z < 0 || x >= span || y >= span || z >= span {
            return 0;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        let s = self.size;
        let slot = ((z / s) * 2 + (y / s)) * 2 + (x / s);
        self.chunks
            .get(slot * self.volume + voxel_index([x % s, y % s, z % s], s))
            .copied()
            .unwrap_or(0)
    }
}

impl MeshKernel for CulledKernel {
    fn run(&self, chunks: &[u32], chunk_size: usize, out: &mut KernelOutput) {
        let hood = Neighborhood {
            chunks,
            size: chunk_size,
            volume: chunk_size.pow(3),
        };
        let half = half_chunk(chunk_size);
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];

        for z in half..half + chunk_size {
            for y in half..half + chunk_size {
                for x in half..half + chunk_size {
                    let (nx, ny, nz) = (x as isize, y as isize, z as isize);
                    let word = hood.word(nx, ny, nz);
                    if is_empty_word(word) {
                        continue;
                    }
                    let voxel = Voxel::unpack(word);
                    let color = [
                        f32::from(voxel.r) / 255.0,
                        f32::from(voxel.g) / 255.0,
                        f32::from(voxel.b) / 255.0,
                    ];
                    let local = [
                        (x - half) as f32,
                        (y - half) as f32,
                        (z - half) as f32,
                    ];

                    let mut exposed = false;
                    for dir in FaceDirection::ALL {
                        let (dx, dy, dz) = dir.delta();
                        if !is_empty_word(hood.word(nx + dx, ny + dy, nz + dz)) {
                            continue;
                        }
                        exposed = true;
                        push_face(out, dir, local, color, &mut min, &mut max);
                    }

                    if exposed {
                        out.voxels.extend_from_slice(&[
                            local[0] + 0.5,
                            local[1] + 0.5,
                            local[2] + 0.5,
                            color[0],
                            color[1],
                            color[2],
                        ]);
                        out.instances += 1;
                    }
                }
            }
        }

        debug_assert_eq!(out.voxels.len(), out.instances * INSTANCE_STRIDE);
        if out.triangles > 0 {
            out.bounds = [min[0], min[1], min[2], max[0], max[1], max[2]];
        }
    }
}

/// Appends the two triangles of one voxel face.
fn push_face(
    out: &mut KernelOutput,
    dir: FaceDirection,
    local: [f32; 3],
    color: [f32; 3],
    min: &mut [f32; 3],
    max: &mut [f32; 3],
) {
    let (layer_axis, u_axis, v_axis) = dir.sweep_axes();
    let normal = dir.normal();
    let layer = local[layer_axis] + if dir.is_positive() { 1.0 } else { 0.0 };
    let (u, v) = (local[u_axis], local[v_axis]);
    let corners = [(u, v), (u + 1.0, v), (u + 1.0, v + 1.0), (u, v + 1.0)];

    // u × v points along +layer only for the cyclic axis order.
    let right_handed = (u_axis + 1) % 3 == v_axis;
    let order = if dir.is_positive() == right_handed {
        FRONT
    } else {
        BACK
    };

    for corner in order {
        let (cu, cv) = corners[corner];
        let mut pos = [0.0_f32; 3];
        pos[layer_axis] = layer;
        pos[u_axis] = cu;
        pos[v_axis] = cv;
        for axis in 0..3 {
            min[axis] = min[axis].min(pos[axis]);
            max[axis] = max[axis].max(pos[axis]);
        }
        out.vertices.extend_from_slice(&pos);
        out.vertices.extend_from_slice(&normal);
        out.vertices.extend_from_slice(&color);
    }
    out.triangles += 2;
    debug_assert_eq!(out.vertices.len(), out.triangles * 3 * VERTEX_STRIDE);
}
