//! 需要真实 Vulkan 驱动的集成测试
//!
//! 环境里没有可用的 Vulkan implementation 时每个测试直接跳过。

use ash::vk;
use veneer_render::{DrawCmd, DrawData, DrawList, DrawVert, OffscreenPipeline, TextureRegistry};
use veneer_rhi::core::format::PixelFormat;
use veneer_rhi::core::image::{ImageUse, RhiImage};
use veneer_rhi::rhi::Rhi;
use veneer_rhi::RhiError;

struct TestGpu {
    _entry: ash::Entry,
    instance: ash::Instance,
    device: ash::Device,
    rhi: Rhi,
}

impl TestGpu {
    /// 创建 headless 的 instance/device，找不到驱动或 graphics queue 时返回 None
    fn create() -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let entry = unsafe { ash::Entry::load().ok()? };
        let app_info = vk::ApplicationInfo::default().api_version(vk::API_VERSION_1_0);
        let instance_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&instance_info, None).ok()? };

        let physical_devices = match unsafe { instance.enumerate_physical_devices() } {
            Ok(devices) if !devices.is_empty() => devices,
            _ => {
                unsafe { instance.destroy_instance(None) };
                return None;
            }
        };

        for physical_device in physical_devices {
            let queue_families =
                unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
            let Some(queue_family_index) = queue_families
                .iter()
                .position(|props| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            else {
                continue;
            };
            let queue_family_index = queue_family_index as u32;

            let priorities = [1.0];
            let queue_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family_index)
                .queue_priorities(&priorities)];
            let device_info = vk::DeviceCreateInfo::default().queue_create_infos(&queue_infos);
            let Ok(device) = (unsafe { instance.create_device(physical_device, &device_info, None) }) else {
                continue;
            };
            let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

            let Ok(rhi) = Rhi::new(&instance, physical_device, device.clone(), queue, queue_family_index)
            else {
                unsafe { device.destroy_device(None) };
                continue;
            };

            return Some(Self {
                _entry: entry,
                instance,
                device,
                rhi,
            });
        }

        unsafe { instance.destroy_instance(None) };
        None
    }

    fn finish(self) {
        self.rhi.destroy().unwrap();
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

macro_rules! require_gpu {
    () => {
        match TestGpu::create() {
            Some(gpu) => gpu,
            None => {
                eprintln!("no vulkan implementation available, skipping");
                return;
            }
        }
    };
}

fn gradient_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn upload_download_roundtrip_rgba8() {
    let gpu = require_gpu!();

    let mut image =
        RhiImage::new(&gpu.rhi, 8, 8, PixelFormat::Rgba8, ImageUse::Sampled, "roundtrip-rgba8".into()).unwrap();
    let data = gradient_bytes(image.byte_size() as usize);
    image.upload(&gpu.rhi, &data).unwrap();

    let mut out = vec![0u8; data.len()];
    image.download(&gpu.rhi, &mut out).unwrap();
    assert_eq!(out, data);

    image.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn upload_download_roundtrip_rgba32f() {
    let gpu = require_gpu!();

    let mut image =
        RhiImage::new(&gpu.rhi, 16, 4, PixelFormat::Rgba32F, ImageUse::Sampled, "roundtrip-rgba32f".into())
            .unwrap();
    let pixels: Vec<f32> = (0..16 * 4 * 4).map(|i| i as f32 * 0.25).collect();
    let data: &[u8] = bytemuck::cast_slice(&pixels);
    image.upload(&gpu.rhi, data).unwrap();

    let mut out = vec![0u8; data.len()];
    image.download(&gpu.rhi, &mut out).unwrap();
    assert_eq!(out, data);

    image.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn upload_shorter_than_image_footprint_is_an_error() {
    let gpu = require_gpu!();

    let mut image =
        RhiImage::new(&gpu.rhi, 8, 8, PixelFormat::Rgba8, ImageUse::Sampled, "short-upload".into()).unwrap();
    let short = vec![0u8; image.byte_size() as usize - 1];

    let err = image.upload(&gpu.rhi, &short).unwrap_err();
    assert!(matches!(err, RhiError::UndersizedUpload { .. }));

    // image 本身仍然可用
    let data = gradient_bytes(image.byte_size() as usize);
    image.upload(&gpu.rhi, &data).unwrap();

    image.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn download_beyond_readback_capacity_is_an_error() {
    let gpu = require_gpu!();

    let mut image =
        RhiImage::new(&gpu.rhi, 4, 4, PixelFormat::Rgba8, ImageUse::Sampled, "oversized-readback".into())
            .unwrap();
    image.upload(&gpu.rhi, &gradient_bytes(image.byte_size() as usize)).unwrap();

    // readback buffer 按 image footprint 分配，远超它的请求必然越界
    let mut oversized = vec![0u8; image.byte_size() as usize + (16 << 20)];
    let err = image.download(&gpu.rhi, &mut oversized).unwrap_err();
    assert!(matches!(err, RhiError::OversizedReadback { .. }));

    image.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn resize_same_dimensions_is_noop() {
    let gpu = require_gpu!();

    let mut image =
        RhiImage::new(&gpu.rhi, 100, 50, PixelFormat::Rgba8, ImageUse::Sampled, "resize-noop".into()).unwrap();
    let handle_before = image.handle();
    let pending_before = gpu.rhi.pending_release_count();

    image.resize(&gpu.rhi, 100, 50).unwrap();

    assert_eq!(image.handle(), handle_before);
    assert_eq!(gpu.rhi.pending_release_count(), pending_before);

    image.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn resize_reallocates_and_roundtrips() {
    let gpu = require_gpu!();

    let mut image =
        RhiImage::new(&gpu.rhi, 100, 100, PixelFormat::Rgba8, ImageUse::Sampled, "resize-realloc".into())
            .unwrap();
    let handle_before = image.handle();

    image.resize(&gpu.rhi, 100, 50).unwrap();
    assert_ne!(image.handle(), handle_before);
    assert_eq!((image.width(), image.height()), (100, 50));
    // 旧的 image 和 memory 进了延迟销毁队列
    assert!(gpu.rhi.pending_release_count() >= 2);

    let data = gradient_bytes(image.byte_size() as usize);
    image.upload(&gpu.rhi, &data).unwrap();
    let mut out = vec![0u8; data.len()];
    image.download(&gpu.rhi, &mut out).unwrap();
    assert_eq!(out, data);

    image.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn release_then_drain_leaves_no_pending_handles() {
    let gpu = require_gpu!();

    let mut image =
        RhiImage::new(&gpu.rhi, 32, 32, PixelFormat::Rgba8, ImageUse::Sampled, "release-drain".into()).unwrap();
    image.upload(&gpu.rhi, &gradient_bytes(image.byte_size() as usize)).unwrap();

    image.release(&gpu.rhi);
    assert!(gpu.rhi.pending_release_count() > 0);
    // 第二次 release 是 no-op
    image.release(&gpu.rhi);

    gpu.rhi.drain_release_queue().unwrap();
    assert_eq!(gpu.rhi.pending_release_count(), 0);

    gpu.finish();
}

#[test]
fn blit_copies_full_extent() {
    let gpu = require_gpu!();

    let mut src =
        RhiImage::new(&gpu.rhi, 2, 2, PixelFormat::Rgba8, ImageUse::Sampled, "blit-src".into()).unwrap();
    src.upload(&gpu.rhi, &[0xff, 0x00, 0x00, 0xff].repeat(4)).unwrap();

    let mut dst =
        RhiImage::new(&gpu.rhi, 2, 2, PixelFormat::Rgba8, ImageUse::Sampled, "blit-dst".into()).unwrap();
    src.blit_to(&gpu.rhi, &mut dst).unwrap();

    let mut out = vec![0u8; dst.byte_size() as usize];
    dst.download(&gpu.rhi, &mut out).unwrap();
    assert_eq!(out, [0xff, 0x00, 0x00, 0xff].repeat(4));

    src.release(&gpu.rhi);
    dst.release(&gpu.rhi);
    gpu.finish();
}

/// 一个铺满 [0,0]..[w,h] 的双三角形 quad
fn full_quad(width: f32, height: f32, col: u32, texture: veneer_render::TextureId) -> DrawList {
    let vert = |x: f32, y: f32| DrawVert {
        pos: glam::vec2(x, y),
        uv: glam::vec2(0.5, 0.5),
        col,
    };
    DrawList {
        vertices: vec![
            vert(0.0, 0.0),
            vert(width, 0.0),
            vert(width, height),
            vert(0.0, height),
        ],
        indices: vec![0, 1, 2, 2, 3, 0],
        commands: vec![DrawCmd {
            clip_rect: [0.0, 0.0, width, height],
            texture,
            idx_offset: 0,
            vtx_offset: 0,
            count: 6,
        }],
    }
}

#[test]
fn render_full_quad_and_read_back() {
    let gpu = require_gpu!();

    let mut target =
        RhiImage::new(&gpu.rhi, 64, 64, PixelFormat::Rgba8, ImageUse::RenderTarget, "ui-target".into()).unwrap();

    let mut white =
        RhiImage::new(&gpu.rhi, 1, 1, PixelFormat::Rgba8, ImageUse::Sampled, "white-texel".into()).unwrap();
    white.upload(&gpu.rhi, &[0xff; 4]).unwrap();

    let mut textures = TextureRegistry::new(&gpu.rhi, 8).unwrap();
    let texture = textures.register(&gpu.rhi, white.sampler().unwrap(), white.view().unwrap()).unwrap();

    let mut pipeline = OffscreenPipeline::new(&gpu.rhi, &target, textures.set_layout()).unwrap();

    // 不透明红色铺满整个 target
    let draw_data = DrawData {
        lists: vec![full_quad(64.0, 64.0, 0xff00_00ff, texture)],
        display_pos: [0.0, 0.0],
        display_size: [64.0, 64.0],
    };
    pipeline.render(&gpu.rhi, &mut target, &draw_data, &textures).unwrap();

    let mut out = vec![0u8; target.byte_size() as usize];
    target.download(&gpu.rhi, &mut out).unwrap();
    for pixel in out.chunks_exact(4) {
        assert_eq!(pixel, [0xff, 0x00, 0x00, 0xff]);
    }

    pipeline.destroy(&gpu.rhi);
    textures.destroy(&gpu.rhi);
    white.release(&gpu.rhi);
    target.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn render_empty_draw_data_clears_target() {
    let gpu = require_gpu!();

    let mut target =
        RhiImage::new(&gpu.rhi, 16, 16, PixelFormat::Rgba8, ImageUse::RenderTarget, "clear-target".into())
            .unwrap();
    let mut textures = TextureRegistry::new(&gpu.rhi, 1).unwrap();
    let mut pipeline = OffscreenPipeline::new(&gpu.rhi, &target, textures.set_layout()).unwrap();

    pipeline.render(&gpu.rhi, &mut target, &DrawData::default(), &textures).unwrap();

    let mut out = vec![0u8; target.byte_size() as usize];
    target.download(&gpu.rhi, &mut out).unwrap();
    for pixel in out.chunks_exact(4) {
        assert_eq!(pixel, [0x00, 0x00, 0x00, 0xff]);
    }

    pipeline.destroy(&gpu.rhi);
    textures.destroy(&gpu.rhi);
    target.release(&gpu.rhi);
    gpu.finish();
}

#[test]
fn geometry_buffers_grow_but_never_shrink() {
    let gpu = require_gpu!();

    let mut target =
        RhiImage::new(&gpu.rhi, 32, 32, PixelFormat::Rgba8, ImageUse::RenderTarget, "growth-target".into())
            .unwrap();
    let mut textures = TextureRegistry::new(&gpu.rhi, 1).unwrap();
    let mut pipeline = OffscreenPipeline::new(&gpu.rhi, &target, textures.set_layout()).unwrap();

    let quad = |n: usize| DrawData {
        lists: vec![DrawList {
            vertices: vec![DrawVert::default(); n],
            indices: vec![0; n],
            commands: vec![],
        }],
        display_pos: [0.0, 0.0],
        display_size: [32.0, 32.0],
    };

    pipeline.upload_draw_data(&gpu.rhi, &quad(100)).unwrap();
    let after_first = gpu.rhi.pending_release_count();

    // 更小的数据不触发重建
    pipeline.upload_draw_data(&gpu.rhi, &quad(10)).unwrap();
    assert_eq!(gpu.rhi.pending_release_count(), after_first);

    // 更大的数据触发销毁重建，vertex/index 各有 buffer + memory 两个 entry
    pipeline.upload_draw_data(&gpu.rhi, &quad(200)).unwrap();
    assert_eq!(gpu.rhi.pending_release_count(), after_first + 4);

    pipeline.destroy(&gpu.rhi);
    textures.destroy(&gpu.rhi);
    target.release(&gpu.rhi);
    gpu.finish();
}
