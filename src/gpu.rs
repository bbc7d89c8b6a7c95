//! Headless GPU device management.
//!
//! [`GpuContext`] holds the wgpu device and queue the ID pass renders with.
//! There is no surface: picking renders offscreen and reads back.
//!
//! # Example
//!
//! ```no_run
//! use hdpick::GpuContext;
//!
//! let gpu = GpuContext::headless().expect("no usable GPU adapter");
//! println!("rendering on {}", gpu.adapter_info.name);
//! ```

use thiserror::Error;

/// Failures creating a GPU context. These are fatal for anything that needs
/// the GPU; there is no fallback renderer.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// Core GPU context holding the device and queue.
///
/// Fields are public so callers can reach the wgpu API directly.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Creates a context without a window, preferring a high-performance
    /// adapter on the primary backends.
    pub fn headless() -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "GPU adapter: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("hdpick Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))?;

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Uniform buffer dynamic-offset alignment for this device.
    pub fn uniform_alignment(&self) -> u64 {
        self.device.limits().min_uniform_buffer_offset_alignment as u64
    }
}
