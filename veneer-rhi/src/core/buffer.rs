use ash::vk;

use crate::{
    core::release_queue::ReleaseEntry,
    error::{RhiError, RhiResult},
    rhi::Rhi,
};

/// vk::Buffer 以及配套的 device memory
///
/// size 是调用方请求的逻辑大小；aligned_size 是 driver 实际分配的大小
/// （来自 memory requirements），map/flush/invalidate 都按 aligned_size 进行。
pub struct RhiBuffer {
    pub handle: vk::Buffer,
    memory: vk::DeviceMemory,

    size: vk::DeviceSize,
    aligned_size: vk::DeviceSize,

    debug_name: String,
}

impl RhiBuffer {
    pub fn new(
        rhi: &Rhi,
        size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        mem_props: vk::MemoryPropertyFlags,
        debug_name: String,
    ) -> RhiResult<Self> {
        Self::new_internal(rhi, size, buffer_usage, None, mem_props, debug_name)
    }

    /// preferred 的 memory type 找不到时退回到 required
    fn new_internal(
        rhi: &Rhi,
        size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        preferred_props: Option<vk::MemoryPropertyFlags>,
        required_props: vk::MemoryPropertyFlags,
        debug_name: String,
    ) -> RhiResult<Self> {
        let device = rhi.vk_device();

        let buffer_info = vk::BufferCreateInfo {
            size,
            usage: buffer_usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let handle = unsafe {
            device.create_buffer(&buffer_info, None).map_err(|e| RhiError::creation("buffer", e))?
        };

        let req = unsafe { device.get_buffer_memory_requirements(handle) };
        let memory_type_index = preferred_props
            .and_then(|props| rhi.find_memory_type(req.memory_type_bits, props).ok())
            .map(Ok)
            .unwrap_or_else(|| rhi.find_memory_type(req.memory_type_bits, required_props));
        let memory_type_index = match memory_type_index {
            Ok(idx) => idx,
            Err(e) => {
                unsafe { device.destroy_buffer(handle, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo {
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
        };
        let memory = unsafe {
            match device.allocate_memory(&alloc_info, None) {
                Ok(mem) => mem,
                Err(e) => {
                    device.destroy_buffer(handle, None);
                    return Err(RhiError::creation("buffer memory", e));
                }
            }
        };
        unsafe {
            if let Err(e) = device.bind_buffer_memory(handle, memory, 0) {
                device.destroy_buffer(handle, None);
                device.free_memory(memory, None);
                return Err(RhiError::creation("buffer memory binding", e));
            }
        }

        Ok(Self {
            handle,
            memory,
            size,
            aligned_size: req.size,
            debug_name,
        })
    }

    /// host 可见的 staging buffer，upload 用
    #[inline]
    pub fn new_stage_buffer<S: AsRef<str>>(rhi: &Rhi, size: vk::DeviceSize, debug_name: S) -> RhiResult<Self> {
        Self::new(
            rhi,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            debug_name.as_ref().to_string(),
        )
    }

    /// readback buffer，优先 HOST_CACHED（CPU 顺序读取快很多）
    #[inline]
    pub fn new_readback_buffer<S: AsRef<str>>(rhi: &Rhi, size: vk::DeviceSize, debug_name: S) -> RhiResult<Self> {
        Self::new_internal(
            rhi,
            size,
            vk::BufferUsageFlags::TRANSFER_DST,
            Some(
                vk::MemoryPropertyFlags::HOST_VISIBLE |
                    vk::MemoryPropertyFlags::HOST_COHERENT |
                    vk::MemoryPropertyFlags::HOST_CACHED,
            ),
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            debug_name.as_ref().to_string(),
        )
    }

    #[inline]
    pub fn new_vertex_buffer<S: AsRef<str>>(rhi: &Rhi, size: vk::DeviceSize, debug_name: S) -> RhiResult<Self> {
        Self::new(
            rhi,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            debug_name.as_ref().to_string(),
        )
    }

    #[inline]
    pub fn new_index_buffer<S: AsRef<str>>(rhi: &Rhi, size: vk::DeviceSize, debug_name: S) -> RhiResult<Self> {
        Self::new(
            rhi,
            size,
            vk::BufferUsageFlags::INDEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            debug_name.as_ref().to_string(),
        )
    }

    // region getter
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// driver 报告的实际分配大小，>= size
    #[inline]
    pub fn aligned_size(&self) -> vk::DeviceSize {
        self.aligned_size
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
    // endregion

    /// map 整个 allocation，交给 closure 写入，flush aligned range 之后 unmap
    pub fn with_mapped(&mut self, rhi: &Rhi, f: impl FnOnce(&mut [u8])) -> RhiResult<()> {
        let device = rhi.vk_device();
        unsafe {
            let ptr = device
                .map_memory(self.memory, 0, self.aligned_size, vk::MemoryMapFlags::empty())
                .map_err(|e| RhiError::creation("memory mapping", e))?;
            f(std::slice::from_raw_parts_mut(ptr as *mut u8, self.aligned_size as usize));

            // 非 coherent 的 memory type 需要显式 flush；range 用 aligned_size，
            // 它已经满足 nonCoherentAtomSize 的对齐要求
            let range = vk::MappedMemoryRange::default()
                .memory(self.memory)
                .offset(0)
                .size(self.aligned_size);
            let flush_result = device.flush_mapped_memory_ranges(&[range]);
            device.unmap_memory(self.memory);
            flush_result?;
        }
        Ok(())
    }

    /// 把 data 写入 buffer 开头。data 不能超过逻辑大小
    pub fn write_bytes(&mut self, rhi: &Rhi, data: &[u8]) -> RhiResult<()> {
        debug_assert!(data.len() as vk::DeviceSize <= self.size);
        self.with_mapped(rhi, |mapped| {
            mapped[..data.len()].copy_from_slice(data);
        })
    }

    /// 从 buffer 开头读出 out.len() 个字节
    pub fn read_bytes(&self, rhi: &Rhi, out: &mut [u8]) -> RhiResult<()> {
        if out.len() as vk::DeviceSize > self.aligned_size {
            return Err(RhiError::OversizedReadback {
                requested: out.len() as u64,
                available: self.aligned_size,
            });
        }

        let device = rhi.vk_device();
        unsafe {
            let ptr = device
                .map_memory(self.memory, 0, self.aligned_size, vk::MemoryMapFlags::empty())
                .map_err(|e| RhiError::creation("memory mapping", e))?;

            let range = vk::MappedMemoryRange::default()
                .memory(self.memory)
                .offset(0)
                .size(self.aligned_size);
            if let Err(e) = device.invalidate_mapped_memory_ranges(&[range]) {
                device.unmap_memory(self.memory);
                return Err(e.into());
            }

            out.copy_from_slice(std::slice::from_raw_parts(ptr as *const u8, out.len()));
            device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// 提交到延迟销毁队列。handle 的所有权随之转移，self 被消费掉
    pub fn release(self, rhi: &Rhi) {
        log::debug!("release buffer: {}", self.debug_name);
        rhi.defer_release(ReleaseEntry::Buffer(self.handle));
        rhi.defer_release(ReleaseEntry::Memory(self.memory));
    }
}
