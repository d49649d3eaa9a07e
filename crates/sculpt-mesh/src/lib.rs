//! Chunk meshing: the kernel contract, a culled-face kernel, and the
//! worker pool that runs kernels off the orchestrating thread.

pub mod culled;
pub mod face_direction;
pub mod geometry;
pub mod kernel;
pub mod pool;

pub use culled::CulledKernel;
pub use face_direction::FaceDirection;
pub use geometry::{Geometry, INSTANCE_STRIDE, VERTEX_STRIDE};
pub use kernel::{KernelOutput, MeshKernel, MeshKernelError};
pub use pool::{JobId, MeshCompletion, MeshWorkerPool};
