//! Device selection and load policy
//!
//! Device preference is fixed: CUDA, then Metal, then CPU. The load policy
//! (numeric precision, attention implementation) is a pure function of the
//! device class so it can be tested without any accelerator present.

use candle_core::{DType, Device};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cuda,
    Metal,
    Cpu,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Cuda => "cuda",
            DeviceKind::Metal => "metal",
            DeviceKind::Cpu => "cpu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionMode {
    /// Fused scaled-dot-product kernels
    Sdpa,
    /// Plain matmul/softmax attention
    Eager,
}

/// How to load the model on a given device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    pub dtype: DType,
    pub attention: AttentionMode,
}

/// Fixed policy table: device class -> {precision, attention mode}.
///
/// Metal lacks reliable bf16 support and CPUs have no fast half paths, so
/// both fall back to f32 with eager attention.
pub fn load_policy(kind: DeviceKind) -> LoadPolicy {
    match kind {
        DeviceKind::Cuda => LoadPolicy {
            dtype: DType::BF16,
            attention: AttentionMode::Sdpa,
        },
        DeviceKind::Metal => LoadPolicy {
            dtype: DType::F32,
            attention: AttentionMode::Eager,
        },
        DeviceKind::Cpu => LoadPolicy {
            dtype: DType::F32,
            attention: AttentionMode::Eager,
        },
    }
}

/// Probe for the best available device: CUDA, then Metal, then CPU.
pub fn select_device() -> (Device, DeviceKind) {
    if let Ok(device) = Device::new_cuda(0) {
        return (device, DeviceKind::Cuda);
    }
    if let Ok(device) = Device::new_metal(0) {
        return (device, DeviceKind::Metal);
    }
    (Device::Cpu, DeviceKind::Cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuda_uses_bf16_with_sdpa() {
        let policy = load_policy(DeviceKind::Cuda);
        assert_eq!(policy.dtype, DType::BF16);
        assert_eq!(policy.attention, AttentionMode::Sdpa);
    }

    #[test]
    fn metal_and_cpu_use_f32_with_eager() {
        for kind in [DeviceKind::Metal, DeviceKind::Cpu] {
            let policy = load_policy(kind);
            assert_eq!(policy.dtype, DType::F32);
            assert_eq!(policy.attention, AttentionMode::Eager);
        }
    }

    #[test]
    fn device_names_match_wire_values() {
        assert_eq!(DeviceKind::Cuda.as_str(), "cuda");
        assert_eq!(DeviceKind::Metal.as_str(), "metal");
        assert_eq!(DeviceKind::Cpu.as_str(), "cpu");
    }
}
