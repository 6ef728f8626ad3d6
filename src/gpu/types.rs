//! GPU-compatible parameter types for the geodesic kernel.
//!
//! All types use `#[repr(C)]` and `bytemuck` derives for safe GPU buffer
//! casting. Ray state itself travels as flat `f32` arrays (see
//! [`crate::store`]), so only the per-invocation parameters need a struct.

use bytemuck::{Pod, Zeroable};

/// Uniform parameters for one kernel invocation.
///
/// Layout: 16 bytes (2 × u32 + f32 + padding).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct KernelParams {
    /// Sub-steps performed inside this invocation.
    pub num_steps: u32,
    /// Number of rays in the block (bounds guard for the last workgroup).
    pub num_rays: u32,
    /// Integration step size.
    pub h: f32,
    /// Padding for 16-byte alignment.
    pub _pad: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_params_size() {
        assert_eq!(
            std::mem::size_of::<KernelParams>(),
            16,
            "KernelParams must be 16 bytes for WGSL alignment"
        );
    }

    #[test]
    fn test_bytemuck_round_trip() {
        let params = KernelParams {
            num_steps: 1000,
            num_rays: 256,
            h: 0.01,
            _pad: 0,
        };

        let bytes: &[u8] = bytemuck::bytes_of(&params);
        assert_eq!(bytes.len(), 16);

        let recovered: &KernelParams = bytemuck::from_bytes(bytes);
        assert_eq!(recovered.num_steps, 1000);
        assert_eq!(recovered.num_rays, 256);
        assert_eq!(recovered.h, 0.01);
    }
}
