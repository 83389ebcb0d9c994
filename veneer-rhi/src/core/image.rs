use ash::vk;

use crate::{
    core::{buffer::RhiBuffer, format::PixelFormat, release_queue::ReleaseEntry},
    error::{RhiError, RhiResult},
    rhi::Rhi,
};

/// image 的用途，决定 usage flags 以及是否需要 view/sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageUse {
    /// 纯 CPU<->GPU 传输的中转 image（例如 blit 的源），没有 view 和 sampler
    TransferSrc,
    /// offscreen 渲染的 render target，有 view，没有 sampler
    RenderTarget,
    /// 供 UI 采样的 image，有 view 和 nearest/repeat 的 sampler
    Sampled,
}

impl ImageUse {
    fn usage_flags(self) -> vk::ImageUsageFlags {
        match self {
            ImageUse::TransferSrc => vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST,
            ImageUse::RenderTarget => {
                vk::ImageUsageFlags::COLOR_ATTACHMENT |
                    vk::ImageUsageFlags::SAMPLED |
                    vk::ImageUsageFlags::TRANSFER_SRC |
                    vk::ImageUsageFlags::TRANSFER_DST
            }
            ImageUse::Sampled => {
                vk::ImageUsageFlags::SAMPLED |
                    vk::ImageUsageFlags::TRANSFER_SRC |
                    vk::ImageUsageFlags::TRANSFER_DST
            }
        }
    }

    #[inline]
    fn needs_view(self) -> bool {
        !matches!(self, ImageUse::TransferSrc)
    }

    #[inline]
    fn needs_sampler(self) -> bool {
        matches!(self, ImageUse::Sampled)
    }
}

/// 2D image 以及配套的 memory/view/sampler
///
/// upload 和 readback 各有一个懒创建的 staging buffer，复用且只增不减，
/// 随 image 一起 release。layout 在 host 侧跟踪，用于选择 barrier。
pub struct RhiImage {
    handle: vk::Image,
    memory: vk::DeviceMemory,
    view: Option<vk::ImageView>,
    sampler: Option<vk::Sampler>,

    width: u32,
    height: u32,
    format: PixelFormat,
    image_use: ImageUse,
    layout: vk::ImageLayout,

    stage_buffer: Option<RhiBuffer>,
    readback_buffer: Option<RhiBuffer>,

    debug_name: String,
}

impl RhiImage {
    pub fn new(
        rhi: &Rhi,
        width: u32,
        height: u32,
        format: PixelFormat,
        image_use: ImageUse,
        debug_name: String,
    ) -> RhiResult<Self> {
        let mut image = Self {
            handle: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: None,
            sampler: None,
            width,
            height,
            format,
            image_use,
            layout: vk::ImageLayout::UNDEFINED,
            stage_buffer: None,
            readback_buffer: None,
            debug_name,
        };
        image.allocate(rhi)?;
        Ok(image)
    }

    fn allocate(&mut self, rhi: &Rhi) -> RhiResult<()> {
        let device = rhi.vk_device();

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format.vk_format())
            .extent(vk::Extent3D {
                width: self.width,
                height: self.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.image_use.usage_flags())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        self.handle = unsafe {
            device.create_image(&image_info, None).map_err(|e| RhiError::creation("image", e))?
        };

        let req = unsafe { device.get_image_memory_requirements(self.handle) };
        let memory_type_index =
            rhi.find_memory_type(req.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        let alloc_info = vk::MemoryAllocateInfo {
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
        };
        self.memory = unsafe {
            device.allocate_memory(&alloc_info, None).map_err(|e| RhiError::creation("image memory", e))?
        };
        unsafe { device.bind_image_memory(self.handle, self.memory, 0)? };

        if self.image_use.needs_view() {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(self.handle)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format.vk_format())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            self.view = Some(unsafe {
                device.create_image_view(&view_info, None).map_err(|e| RhiError::creation("image view", e))?
            });
        }

        if self.image_use.needs_sampler() {
            let sampler_info = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::NEAREST)
                .min_filter(vk::Filter::NEAREST)
                .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
                .address_mode_u(vk::SamplerAddressMode::REPEAT)
                .address_mode_v(vk::SamplerAddressMode::REPEAT)
                .address_mode_w(vk::SamplerAddressMode::REPEAT)
                .min_lod(-1000.0)
                .max_lod(1000.0)
                .max_anisotropy(1.0);
            self.sampler = Some(unsafe {
                device.create_sampler(&sampler_info, None).map_err(|e| RhiError::creation("sampler", e))?
            });
        }

        self.layout = vk::ImageLayout::UNDEFINED;
        log::debug!(
            "allocate image: {} ({}x{}, {:?}, {:?})",
            self.debug_name,
            self.width,
            self.height,
            self.format,
            self.image_use
        );
        Ok(())
    }

    // region getter
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn view(&self) -> Option<vk::ImageView> {
        self.view
    }

    #[inline]
    pub fn sampler(&self) -> Option<vk::Sampler> {
        self.sampler
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    /// width * height * bytes_per_pixel，staging buffer 按这个大小创建
    #[inline]
    pub fn byte_size(&self) -> vk::DeviceSize {
        self.width as vk::DeviceSize * self.height as vk::DeviceSize * self.format.bytes_per_pixel() as vk::DeviceSize
    }

    /// 多平面 image 的 barrier 走 plane 0 aspect
    #[inline]
    fn barrier_aspect(&self) -> vk::ImageAspectFlags {
        if self.format.is_planar() {
            vk::ImageAspectFlags::PLANE_0
        } else {
            vk::ImageAspectFlags::COLOR
        }
    }
    // endregion

    // region staging buffer
    /// 懒创建 upload 用的 staging buffer，容量只增不减
    fn ensure_stage_buffer(&mut self, rhi: &Rhi, size: vk::DeviceSize) -> RhiResult<()> {
        if let Some(buf) = &self.stage_buffer {
            if buf.size() >= size {
                return Ok(());
            }
            if let Some(old) = self.stage_buffer.take() {
                old.release(rhi);
            }
        }
        self.stage_buffer =
            Some(RhiBuffer::new_stage_buffer(rhi, size, format!("{}-stage", self.debug_name))?);
        Ok(())
    }

    /// readback 同样懒创建、只增不减，和 upload 的 staging 各自独立
    fn ensure_readback_buffer(&mut self, rhi: &Rhi, size: vk::DeviceSize) -> RhiResult<()> {
        if let Some(buf) = &self.readback_buffer {
            if buf.size() >= size {
                return Ok(());
            }
            if let Some(old) = self.readback_buffer.take() {
                old.release(rhi);
            }
        }
        self.readback_buffer =
            Some(RhiBuffer::new_readback_buffer(rhi, size, format!("{}-readback", self.debug_name))?);
        Ok(())
    }
    // endregion

    /// 把 data 上传到 image
    ///
    /// 普通格式：copy 之后转到 SHADER_READ_ONLY 供采样。
    /// planar 格式：逐平面 copy，最终停在 TRANSFER_SRC，后续走 blit 而不是采样。
    pub fn upload(&mut self, rhi: &Rhi, data: &[u8]) -> RhiResult<()> {
        let upload_size = self.byte_size();
        if (data.len() as vk::DeviceSize) < upload_size {
            return Err(RhiError::UndersizedUpload {
                provided: data.len() as u64,
                required: upload_size,
            });
        }

        self.ensure_stage_buffer(rhi, upload_size)?;
        let stage_buffer = self.stage_buffer.as_mut().unwrap();
        stage_buffer.write_bytes(rhi, &data[..upload_size as usize])?;
        let stage_handle = stage_buffer.handle;

        let extent = vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: 1,
        };
        let image = self.handle;
        let planar = self.format.is_planar();
        let plane_size = self.width as vk::DeviceSize * self.height as vk::DeviceSize;
        let final_aspect = self.barrier_aspect();

        rhi.one_time_exec(|cmd| {
            cmd.image_barrier(
                image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageAspectFlags::COLOR,
            )?;

            if planar {
                // G 和 B 两个平面依次 copy，每个平面在 staging buffer 里连续存放
                let regions = [
                    Self::plane_copy_region(vk::ImageAspectFlags::PLANE_0, 0, extent),
                    Self::plane_copy_region(vk::ImageAspectFlags::PLANE_1, plane_size, extent),
                ];
                cmd.copy_buffer_to_image(stage_handle, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &regions);
                cmd.image_barrier(
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    final_aspect,
                )?;
            } else {
                let region = Self::plane_copy_region(vk::ImageAspectFlags::COLOR, 0, extent);
                cmd.copy_buffer_to_image(stage_handle, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
                cmd.image_barrier(
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::ImageAspectFlags::COLOR,
                )?;
            }
            Ok(())
        })?;

        self.layout = if planar {
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        };
        Ok(())
    }

    fn plane_copy_region(
        aspect: vk::ImageAspectFlags,
        buffer_offset: vk::DeviceSize,
        extent: vk::Extent3D,
    ) -> vk::BufferImageCopy {
        vk::BufferImageCopy {
            buffer_offset,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_extent: extent,
            ..Default::default()
        }
    }

    /// 把 image 的全部内容回读到 out
    ///
    /// out 的长度不能超过 readback buffer 的实际分配大小，超了直接报错
    pub fn download(&mut self, rhi: &Rhi, out: &mut [u8]) -> RhiResult<()> {
        let image_size = self.byte_size();
        self.ensure_readback_buffer(rhi, image_size)?;
        let readback = self.readback_buffer.as_ref().unwrap();
        let readback_handle = readback.handle;

        let image = self.handle;
        let current_layout = self.layout;
        let aspect = self.barrier_aspect();
        let extent = vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: 1,
        };
        let restore_to_shader_read = self.image_use != ImageUse::TransferSrc;

        rhi.one_time_exec(|cmd| {
            if current_layout != vk::ImageLayout::TRANSFER_SRC_OPTIMAL {
                cmd.image_barrier(image, current_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, aspect)?;
            }

            let region = Self::plane_copy_region(aspect, 0, extent);
            cmd.copy_image_to_buffer(image, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, readback_handle, &[region]);

            // transfer-only 的 image 没有 SAMPLED usage，不能进 SHADER_READ_ONLY
            if restore_to_shader_read {
                cmd.image_barrier(
                    image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    aspect,
                )?;
            }
            Ok(())
        })?;

        self.layout = if restore_to_shader_read {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        } else {
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        };

        self.readback_buffer.as_ref().unwrap().read_bytes(rhi, out)
    }

    /// 尺寸没变且已分配时是 no-op，否则释放全部资源后按新尺寸重建，格式不变
    pub fn resize(&mut self, rhi: &Rhi, width: u32, height: u32) -> RhiResult<()> {
        if self.handle != vk::Image::null() && self.width == width && self.height == height {
            return Ok(());
        }

        self.width = width;
        self.height = height;
        self.release(rhi);
        self.allocate(rhi)
    }

    /// nearest blit 全图到 dst，blit 之后 dst 转到 SHADER_READ_ONLY
    ///
    /// planar 的 dst 只写 plane 0
    pub fn blit_to(&mut self, rhi: &Rhi, dst: &mut RhiImage) -> RhiResult<()> {
        let src = self.handle;
        let src_layout = self.layout;
        let src_aspect = self.barrier_aspect();
        let dst_image = dst.handle;
        let dst_layout = dst.layout;
        let dst_blit_aspect = if dst.format.is_planar() {
            vk::ImageAspectFlags::PLANE_0
        } else {
            vk::ImageAspectFlags::COLOR
        };

        let blit_region = vk::ImageBlit {
            src_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            src_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: self.width as i32,
                    y: self.height as i32,
                    z: 1,
                },
            ],
            dst_subresource: vk::ImageSubresourceLayers {
                aspect_mask: dst_blit_aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            dst_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: dst.width as i32,
                    y: dst.height as i32,
                    z: 1,
                },
            ],
        };

        rhi.one_time_exec(|cmd| {
            if src_layout != vk::ImageLayout::TRANSFER_SRC_OPTIMAL {
                cmd.image_barrier(src, src_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, src_aspect)?;
            }
            if dst_layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL {
                // dst 会被整体覆盖，旧内容不需要保留
                cmd.image_barrier(
                    dst_image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageAspectFlags::COLOR,
                )?;
            }

            cmd.blit_image(
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit_region],
                vk::Filter::NEAREST,
            );

            cmd.image_barrier(
                dst_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::ImageAspectFlags::COLOR,
            )?;
            Ok(())
        })?;

        self.layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
        dst.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        Ok(())
    }

    /// offscreen 渲染结束后由 pipeline 更新 host 侧跟踪的 layout
    pub fn set_tracked_layout(&mut self, layout: vk::ImageLayout) {
        self.layout = layout;
    }

    /// 所有 handle 提交到延迟销毁队列，本地 handle 置空
    pub fn release(&mut self, rhi: &Rhi) {
        if self.handle == vk::Image::null() {
            return;
        }
        log::debug!("release image: {}", self.debug_name);

        if let Some(sampler) = self.sampler.take() {
            rhi.defer_release(ReleaseEntry::Sampler(sampler));
        }
        if let Some(view) = self.view.take() {
            rhi.defer_release(ReleaseEntry::ImageView(view));
        }
        rhi.defer_release(ReleaseEntry::Image(self.handle));
        rhi.defer_release(ReleaseEntry::Memory(self.memory));
        self.handle = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
        self.layout = vk::ImageLayout::UNDEFINED;

        if let Some(stage) = self.stage_buffer.take() {
            stage.release(rhi);
        }
        if let Some(readback) = self.readback_buffer.take() {
            readback.release(rhi);
        }
    }
}
