use ash::vk;

use crate::{
    core::barrier,
    error::{RhiError, RhiResult},
    rhi::Rhi,
};

/// vk::CommandBuffer 的薄封装，持有 device 的 clone 以便直接调用录制命令
pub struct RhiCommandBuffer {
    pub handle: vk::CommandBuffer,
    pool: vk::CommandPool,

    device: ash::Device,
}

impl RhiCommandBuffer {
    pub fn new(rhi: &Rhi, pool: vk::CommandPool) -> RhiResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let handle = unsafe {
            rhi.vk_device()
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| RhiError::creation("command buffer", e))?[0]
        };

        Ok(Self {
            handle,
            pool,
            device: rhi.vk_device().clone(),
        })
    }

    pub fn begin(&self, usage: vk::CommandBufferUsageFlags) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(usage);
        unsafe { self.device.begin_command_buffer(self.handle, &begin_info)? };
        Ok(())
    }

    pub fn end(&self) -> RhiResult<()> {
        unsafe { self.device.end_command_buffer(self.handle)? };
        Ok(())
    }

    pub fn free(self, rhi: &Rhi) {
        unsafe {
            rhi.vk_device().free_command_buffers(self.pool, &[self.handle]);
        }
    }

    // region barrier & transfer
    /// 按 layout 转换表插入 image barrier
    pub fn image_barrier(
        &self,
        image: vk::Image,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
        aspect: vk::ImageAspectFlags,
    ) -> RhiResult<()> {
        let (image_barrier, src_stage, dst_stage) = barrier::image_barrier(image, from, to, aspect)?;
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.handle,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
        Ok(())
    }

    #[inline]
    pub fn copy_buffer_to_image(
        &self,
        buffer: vk::Buffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(self.handle, buffer, image, layout, regions);
        }
    }

    #[inline]
    pub fn copy_image_to_buffer(
        &self,
        image: vk::Image,
        layout: vk::ImageLayout,
        buffer: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.cmd_copy_image_to_buffer(self.handle, image, layout, buffer, regions);
        }
    }

    #[inline]
    pub fn blit_image(
        &self,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        unsafe {
            self.device.cmd_blit_image(self.handle, src, src_layout, dst, dst_layout, regions, filter);
        }
    }
    // endregion

    // region render pass & draw
    #[inline]
    pub fn begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo) {
        unsafe {
            self.device.cmd_begin_render_pass(self.handle, begin_info, vk::SubpassContents::INLINE);
        }
    }

    #[inline]
    pub fn end_render_pass(&self) {
        unsafe { self.device.cmd_end_render_pass(self.handle) };
    }

    #[inline]
    pub fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.cmd_bind_pipeline(self.handle, bind_point, pipeline) };
    }

    #[inline]
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(self.handle, bind_point, layout, 0, sets, &[]);
        }
    }

    #[inline]
    pub fn bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe { self.device.cmd_bind_vertex_buffers(self.handle, first_binding, buffers, offsets) };
    }

    #[inline]
    pub fn bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe { self.device.cmd_bind_index_buffer(self.handle, buffer, offset, index_type) };
    }

    #[inline]
    pub fn set_viewport(&self, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(self.handle, 0, &[viewport]) };
    }

    #[inline]
    pub fn set_scissor(&self, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(self.handle, 0, &[scissor]) };
    }

    #[inline]
    pub fn push_constants(&self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        unsafe { self.device.cmd_push_constants(self.handle, layout, stages, offset, data) };
    }

    #[inline]
    pub fn draw_indexed(
        &self,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(self.handle, index_count, 1, first_index, vertex_offset, 0);
        }
    }
    // endregion
}
