use std::cell::RefCell;

use ash::vk;

use crate::{
    core::{
        command_buffer::RhiCommandBuffer,
        release_queue::{ReleaseEntry, ReleaseQueue},
    },
    error::{RhiError, RhiResult},
};

/// RHI 上下文
///
/// device/queue 等 handle 由外部创建后注入，所有资源操作都显式接收 &Rhi，
/// 不依赖全局状态。销毁资源统一走 defer_release，由 drain_release_queue
/// 在 queue 空闲之后真正执行。
pub struct Rhi {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    mem_props: vk::PhysicalDeviceMemoryProperties,

    queue: vk::Queue,
    queue_family_index: u32,
    command_pool: vk::CommandPool,

    release_queue: RefCell<ReleaseQueue>,
}

impl Rhi {
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue: vk::Queue,
        queue_family_index: u32,
    ) -> RhiResult<Self> {
        let mem_props = unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);
        let command_pool = unsafe {
            device.create_command_pool(&pool_info, None).map_err(|e| RhiError::creation("command pool", e))?
        };

        Ok(Self {
            device,
            physical_device,
            mem_props,
            queue,
            queue_family_index,
            command_pool,
            release_queue: RefCell::new(ReleaseQueue::default()),
        })
    }

    // region getter
    #[inline]
    pub fn vk_device(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn vk_physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.queue
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    #[inline]
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }
    // endregion

    /// 根据 type filter 和需要的 property flags 找一个 memory type index
    pub fn find_memory_type(&self, type_bits: u32, props: vk::MemoryPropertyFlags) -> RhiResult<u32> {
        self.mem_props.memory_types[..self.mem_props.memory_type_count as usize]
            .iter()
            .enumerate()
            .find(|(idx, mem_type)| {
                type_bits & (1 << idx) != 0 && mem_type.property_flags.contains(props)
            })
            .map(|(idx, _)| idx as u32)
            .ok_or(RhiError::NoSuitableMemoryType { type_bits, props })
    }

    /// 立即分配一个 one-time 的 command buffer 执行录制，提交后阻塞到 queue idle
    ///
    /// 适合 upload/readback 这类一次性操作，不适合每帧的热路径
    pub fn one_time_exec(&self, f: impl FnOnce(&RhiCommandBuffer) -> RhiResult<()>) -> RhiResult<()> {
        let cmd = RhiCommandBuffer::new(self, self.command_pool)?;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

        let record_result = f(&cmd);
        let end_result = cmd.end();
        if let Err(e) = record_result.and(end_result) {
            cmd.free(self);
            return Err(e);
        }

        let command_buffers = [cmd.handle];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let submit_result = unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .and_then(|_| self.device.queue_wait_idle(self.queue))
        };
        cmd.free(self);
        submit_result?;
        Ok(())
    }

    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.queue_wait_idle(self.queue)? };
        Ok(())
    }

    // region 延迟销毁
    #[inline]
    pub fn defer_release(&self, entry: ReleaseEntry) {
        self.release_queue.borrow_mut().push(entry);
    }

    #[inline]
    pub fn pending_release_count(&self) -> usize {
        self.release_queue.borrow().len()
    }

    /// 等 queue 空闲之后销毁所有积压的 handle
    pub fn drain_release_queue(&self) -> RhiResult<()> {
        if self.release_queue.borrow().is_empty() {
            return Ok(());
        }
        self.wait_idle()?;
        self.release_queue.borrow_mut().drain(&self.device);
        Ok(())
    }
    // endregion

    /// 销毁 Rhi 自己持有的对象。device 的生命周期归外部管理，这里不碰
    pub fn destroy(self) -> RhiResult<()> {
        self.wait_idle()?;
        self.release_queue.borrow_mut().drain(&self.device);
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
        Ok(())
    }
}
