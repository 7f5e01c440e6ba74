//! Target device capabilities consumed by the tile heuristics.

/// GPU capabilities that bound a reduction launch.
///
/// Mirrors what a backend reports about itself: lanes per warp, threads and shared memory per block,
/// and the widest vector load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    /// Backend device identifier (e.g., "CUDA_SM80").
    pub device: String,

    /// Lanes that execute in lockstep and exchange registers through shuffles. Always a power of two.
    pub warp_size: usize,

    /// Maximum number of threads in a block.
    pub max_threads_per_block: usize,

    /// Widest vector load in bytes.
    ///
    /// Bounds the vector width together with the element size: 16 bytes means four `f32` or two `f64`.
    pub max_vector_bytes: usize,

    /// Shared memory available to one block in bytes.
    pub shared_memory_per_block: usize,
}

impl DeviceDescription {
    /// NVIDIA Ampere (A100).
    pub fn cuda_sm80() -> Self {
        Self {
            device: "CUDA_SM80".to_string(),
            warp_size: 32,
            max_threads_per_block: 1024,
            max_vector_bytes: 16,
            shared_memory_per_block: 49152,
        }
    }

    /// AMD CDNA2 (MI200).
    pub fn rocm_gfx90a() -> Self {
        Self {
            device: "ROCM_GFX90A".to_string(),
            warp_size: 64,
            max_threads_per_block: 1024,
            max_vector_bytes: 16,
            shared_memory_per_block: 65536,
        }
    }

    /// A CUDA-like device with a custom warp size, for exercising small launches.
    ///
    /// # Panics
    ///
    /// If `warp_size` is not a power of two or does not divide the block limit.
    pub fn with_warp_size(warp_size: usize) -> Self {
        let device = Self { device: format!("WARP{warp_size}"), warp_size, ..Self::cuda_sm80() };
        device.validate();
        device
    }

    /// # Panics
    ///
    /// If the warp size is not a power of two, or the block limit is not a multiple of it.
    pub(crate) fn validate(&self) {
        assert!(self.warp_size.is_power_of_two(), "warp size {} is not a power of two", self.warp_size);
        assert!(
            self.max_threads_per_block.is_power_of_two() && self.max_threads_per_block >= self.warp_size,
            "block limit {} must be a power of two no smaller than the warp size {}",
            self.max_threads_per_block,
            self.warp_size
        );
    }
}

impl Default for DeviceDescription {
    fn default() -> Self {
        Self::cuda_sm80()
    }
}
