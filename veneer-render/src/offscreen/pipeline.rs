use ash::vk;
use bytemuck::{Pod, Zeroable};
use veneer_rhi::{
    core::{buffer::RhiBuffer, command_buffer::RhiCommandBuffer, image::RhiImage, release_queue::ReleaseEntry},
    error::{RhiError, RhiResult},
    rhi::Rhi,
};

use crate::{
    gui::draw_data::{DrawData, DrawVert},
    offscreen::batches::{self, DrawBatch},
    shader::ui,
    texture::TextureRegistry,
};

/// vertex stage 的 push constant：像素坐标到 clip space 的仿射变换
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UiTransform {
    pub scale: [f32; 2],
    pub translate: [f32; 2],
}

impl UiTransform {
    /// scale = 2 / size，translate = -1 - pos * scale，
    /// 使得 [pos, pos + size] 映射到 [-1, 1]
    pub fn from_display(display_pos: [f32; 2], display_size: [f32; 2]) -> Self {
        let scale = [2.0 / display_size[0], 2.0 / display_size[1]];
        Self {
            scale,
            translate: [
                -1.0 - display_pos[0] * scale[0],
                -1.0 - display_pos[1] * scale[1],
            ],
        }
    }
}

/// 几何 buffer 只增不减：容量足够时返回 None，否则返回新容量
fn grown_capacity(current: vk::DeviceSize, required: vk::DeviceSize) -> Option<vk::DeviceSize> {
    if required > current {
        Some(required)
    } else {
        None
    }
}

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// offscreen 的 UI 渲染管线
///
/// framebuffer 和目标 image 1:1 绑定，尺寸固定；目标变了就重建整个 pipeline。
/// 渲染循环严格串行：IDLE -> UPLOAD -> RECORD -> SUBMIT(阻塞) -> IDLE。
pub struct OffscreenPipeline {
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,

    command_pool: vk::CommandPool,
    cmd: RhiCommandBuffer,

    extent: vk::Extent2D,

    vertex_buffer: Option<RhiBuffer>,
    vertex_capacity: vk::DeviceSize,
    index_buffer: Option<RhiBuffer>,
    index_capacity: vk::DeviceSize,
}

impl OffscreenPipeline {
    /// target 必须是 RenderTarget 用途的 image（有 view）
    pub fn new(rhi: &Rhi, target: &RhiImage, set_layout: vk::DescriptorSetLayout) -> RhiResult<Self> {
        let device = rhi.vk_device();
        let target_view = target
            .view()
            .ok_or(RhiError::creation("offscreen framebuffer", vk::Result::ERROR_INITIALIZATION_FAILED))?;
        let extent = target.extent();

        let render_pass = Self::create_render_pass(rhi, target.format().vk_format())?;

        let attachments = [target_view];
        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe {
            device
                .create_framebuffer(&framebuffer_info, None)
                .map_err(|e| RhiError::creation("framebuffer", e))?
        };

        let set_layouts = [set_layout];
        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: std::mem::size_of::<UiTransform>() as u32,
        }];
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let pipeline_layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(|e| RhiError::creation("pipeline layout", e))?
        };

        let pipeline = Self::create_pipeline(rhi, render_pass, pipeline_layout)?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(rhi.queue_family_index());
        let command_pool = unsafe {
            device.create_command_pool(&pool_info, None).map_err(|e| RhiError::creation("command pool", e))?
        };
        let cmd = RhiCommandBuffer::new(rhi, command_pool)?;

        Ok(Self {
            render_pass,
            framebuffer,
            pipeline_layout,
            pipeline,
            command_pool,
            cmd,
            extent,
            vertex_buffer: None,
            vertex_capacity: 0,
            index_buffer: None,
            index_capacity: 0,
        })
    }

    fn create_render_pass(rhi: &Rhi, format: vk::Format) -> RhiResult<vk::RenderPass> {
        let attachments = [vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ..Default::default()
        }];
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];
        let dependencies = [vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        }];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        unsafe {
            rhi.vk_device()
                .create_render_pass(&render_pass_info, None)
                .map_err(|e| RhiError::creation("render pass", e))
        }
    }

    fn create_pipeline(
        rhi: &Rhi,
        render_pass: vk::RenderPass,
        pipeline_layout: vk::PipelineLayout,
    ) -> RhiResult<vk::Pipeline> {
        let device = rhi.vk_device();

        let vert_spv = ui::ui_vertex_shader();
        let frag_spv = ui::ui_fragment_shader();
        let vert_module = unsafe {
            device
                .create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&vert_spv), None)
                .map_err(|e| RhiError::creation("vertex shader module", e))?
        };
        let frag_module = unsafe {
            match device.create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&frag_spv), None) {
                Ok(module) => module,
                Err(e) => {
                    device.destroy_shader_module(vert_module, None);
                    return Err(RhiError::creation("fragment shader module", e));
                }
            }
        };

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        let vertex_bindings = DrawVert::vertex_input_bindings();
        let vertex_attributes = DrawVert::vertex_input_attributes();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample =
            vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // src over 混合，alpha 直接取 src
        let blend_attachments = [vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::TRUE,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        }];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipeline_result = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        // shader module 在 pipeline 创建完成后就不再需要
        unsafe {
            device.destroy_shader_module(vert_module, None);
            device.destroy_shader_module(frag_module, None);
        }

        match pipeline_result {
            Ok(pipelines) => Ok(pipelines[0]),
            Err((_, e)) => Err(RhiError::creation("graphics pipeline", e)),
        }
    }

    // region 渲染循环
    /// 完整的一帧：upload -> record -> submit，返回时目标 image 的内容已经可读
    pub fn render(
        &mut self,
        rhi: &Rhi,
        target: &mut RhiImage,
        draw_data: &DrawData,
        textures: &TextureRegistry,
    ) -> RhiResult<()> {
        self.upload_draw_data(rhi, draw_data)?;
        let batches = batches::flatten_draw_data(draw_data);
        self.record(rhi, target, draw_data, &batches, textures)?;
        self.submit(rhi)?;
        target.set_tracked_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        Ok(())
    }

    /// 把所有 draw list 的几何数据依序拷进共享的 vertex/index buffer
    ///
    /// buffer 容量只增不减，增长时整体销毁重建。空帧直接返回
    pub fn upload_draw_data(&mut self, rhi: &Rhi, draw_data: &DrawData) -> RhiResult<()> {
        if draw_data.is_empty() {
            return Ok(());
        }

        let vertex_size = (draw_data.total_vtx_count() * std::mem::size_of::<DrawVert>()) as vk::DeviceSize;
        let index_size = (draw_data.total_idx_count() * std::mem::size_of::<u16>()) as vk::DeviceSize;

        if let Some(new_capacity) = grown_capacity(self.vertex_capacity, vertex_size) {
            if let Some(old) = self.vertex_buffer.take() {
                old.release(rhi);
            }
            self.vertex_buffer = Some(RhiBuffer::new_vertex_buffer(rhi, new_capacity, "ui-vertex")?);
            self.vertex_capacity = new_capacity;
        }
        if let Some(new_capacity) = grown_capacity(self.index_capacity, index_size) {
            if let Some(old) = self.index_buffer.take() {
                old.release(rhi);
            }
            self.index_buffer = Some(RhiBuffer::new_index_buffer(rhi, new_capacity, "ui-index")?);
            self.index_capacity = new_capacity;
        }

        let vertex_buffer = self.vertex_buffer.as_mut().unwrap();
        vertex_buffer.with_mapped(rhi, |mapped| {
            let mut offset = 0;
            for list in &draw_data.lists {
                let bytes: &[u8] = bytemuck::cast_slice(&list.vertices);
                mapped[offset..offset + bytes.len()].copy_from_slice(bytes);
                offset += bytes.len();
            }
        })?;

        let index_buffer = self.index_buffer.as_mut().unwrap();
        index_buffer.with_mapped(rhi, |mapped| {
            let mut offset = 0;
            for list in &draw_data.lists {
                let bytes: &[u8] = bytemuck::cast_slice(&list.indices);
                mapped[offset..offset + bytes.len()].copy_from_slice(bytes);
                offset += bytes.len();
            }
        })?;

        Ok(())
    }

    /// 录制一帧的 command buffer
    fn record(
        &mut self,
        rhi: &Rhi,
        target: &RhiImage,
        draw_data: &DrawData,
        draw_batches: &[DrawBatch],
        textures: &TextureRegistry,
    ) -> RhiResult<()> {
        let cmd = &self.cmd;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

        // render pass 自己不做 layout 转换，进出都走显式 barrier
        cmd.image_barrier(
            target.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        )?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: CLEAR_COLOR },
        }];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);
        cmd.begin_render_pass(&begin_info);

        cmd.set_viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        });

        if let (false, Some(vertex_buffer), Some(index_buffer)) =
            (draw_batches.is_empty(), self.vertex_buffer.as_ref(), self.index_buffer.as_ref())
        {
            cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline);

            let transform = UiTransform::from_display(draw_data.display_pos, draw_data.display_size);
            cmd.push_constants(
                self.pipeline_layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&transform),
            );

            cmd.bind_vertex_buffers(0, &[vertex_buffer.handle], &[0]);
            cmd.bind_index_buffer(index_buffer.handle, 0, vk::IndexType::UINT16);

            // 相邻 batch 用同一张 texture 时不重复 bind
            let mut bound_texture = None;
            for batch in draw_batches {
                cmd.set_scissor(batch.scissor);
                if bound_texture != Some(batch.texture) {
                    let set = textures.get(batch.texture)?;
                    cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, self.pipeline_layout, &[set]);
                    bound_texture = Some(batch.texture);
                }
                cmd.draw_indexed(batch.index_count, batch.first_index, batch.vertex_offset);
            }
        }

        cmd.end_render_pass();

        // 渲染结果马上要被回读
        cmd.image_barrier(
            target.handle(),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageAspectFlags::COLOR,
        )?;

        cmd.end()
    }

    /// 提交并阻塞到 queue 空闲，返回后一帧的内容就是最终状态
    fn submit(&self, rhi: &Rhi) -> RhiResult<()> {
        let command_buffers = [self.cmd.handle];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            rhi.vk_device().queue_submit(rhi.graphics_queue(), &[submit_info], vk::Fence::null())?;
        }
        rhi.wait_idle()
    }
    // endregion

    /// 所有 handle 走延迟销毁；command buffer 随 pool 一起回收
    pub fn destroy(&mut self, rhi: &Rhi) {
        log::debug!("destroy offscreen pipeline");
        if let Some(vertex_buffer) = self.vertex_buffer.take() {
            vertex_buffer.release(rhi);
        }
        if let Some(index_buffer) = self.index_buffer.take() {
            index_buffer.release(rhi);
        }
        self.vertex_capacity = 0;
        self.index_capacity = 0;

        rhi.defer_release(ReleaseEntry::Pipeline(self.pipeline));
        rhi.defer_release(ReleaseEntry::PipelineLayout(self.pipeline_layout));
        rhi.defer_release(ReleaseEntry::Framebuffer(self.framebuffer));
        rhi.defer_release(ReleaseEntry::RenderPass(self.render_pass));
        rhi.defer_release(ReleaseEntry::CommandPool(self.command_pool));
        self.pipeline = vk::Pipeline::null();
        self.pipeline_layout = vk::PipelineLayout::null();
        self.framebuffer = vk::Framebuffer::null();
        self.render_pass = vk::RenderPass::null();
        self.command_pool = vk::CommandPool::null();
    }
}
