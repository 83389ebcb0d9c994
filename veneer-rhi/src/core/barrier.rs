use ash::vk;

use crate::error::{RhiError, RhiResult};

/// 一次 layout 转换对应的 access mask 和 pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// 查表得到 layout 转换所需的同步参数
///
/// 只支持 upload/readback/offscreen 渲染实际会用到的转换对，
/// 出现其他组合说明调用顺序有 bug，直接报错而不是猜一组 mask。
pub fn transition_masks(from: vk::ImageLayout, to: vk::ImageLayout) -> RhiResult<TransitionMasks> {
    use vk::{AccessFlags as A, ImageLayout as L, PipelineStageFlags as S};

    let masks = match (from, to) {
        // upload：把数据拷进 image 之前
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => TransitionMasks {
            src_access: A::empty(),
            dst_access: A::TRANSFER_WRITE,
            src_stage: S::TOP_OF_PIPE,
            dst_stage: S::TRANSFER,
        },
        // upload 完成，交给 fragment shader 采样
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_access: A::TRANSFER_WRITE,
            dst_access: A::SHADER_READ,
            src_stage: S::TRANSFER,
            dst_stage: S::FRAGMENT_SHADER,
        },
        // planar upload 完成，后续走 blit 而非采样
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => TransitionMasks {
            src_access: A::TRANSFER_WRITE,
            dst_access: A::TRANSFER_READ,
            src_stage: S::TRANSFER,
            dst_stage: S::TRANSFER,
        },
        // offscreen 渲染开始，不关心之前的内容
        (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => TransitionMasks {
            src_access: A::empty(),
            dst_access: A::COLOR_ATTACHMENT_WRITE,
            src_stage: S::TOP_OF_PIPE,
            dst_stage: S::COLOR_ATTACHMENT_OUTPUT,
        },
        // 渲染结束，准备回读
        (L::COLOR_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => TransitionMasks {
            src_access: A::COLOR_ATTACHMENT_WRITE,
            dst_access: A::TRANSFER_READ,
            src_stage: S::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: S::TRANSFER,
        },
        // 回读之后继续作为 render target 使用
        (L::TRANSFER_SRC_OPTIMAL, L::COLOR_ATTACHMENT_OPTIMAL) => TransitionMasks {
            src_access: A::TRANSFER_READ,
            dst_access: A::COLOR_ATTACHMENT_WRITE,
            src_stage: S::TRANSFER,
            dst_stage: S::COLOR_ATTACHMENT_OUTPUT,
        },
        // download 开始，当前 layout 不重要
        (L::UNDEFINED, L::TRANSFER_SRC_OPTIMAL) => TransitionMasks {
            src_access: A::empty(),
            dst_access: A::TRANSFER_READ,
            src_stage: S::TOP_OF_PIPE,
            dst_stage: S::TRANSFER,
        },
        // download 完成，还给 shader
        (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_access: A::TRANSFER_READ,
            dst_access: A::SHADER_READ,
            src_stage: S::TRANSFER,
            dst_stage: S::FRAGMENT_SHADER,
        },
        // 正在被采样的 image 要做 readback 或者 blit 源
        (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => TransitionMasks {
            src_access: A::SHADER_READ,
            dst_access: A::TRANSFER_READ,
            src_stage: S::FRAGMENT_SHADER,
            dst_stage: S::TRANSFER,
        },
        // blit 目标，之前的内容会被整体覆盖
        (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_DST_OPTIMAL) => TransitionMasks {
            src_access: A::SHADER_READ,
            dst_access: A::TRANSFER_WRITE,
            src_stage: S::FRAGMENT_SHADER,
            dst_stage: S::TRANSFER,
        },
        _ => return Err(RhiError::UnsupportedLayoutTransition { from, to }),
    };
    Ok(masks)
}

/// 对单层 2D image 的 barrier 描述，填好 subresource range 的固定部分
pub fn image_barrier(
    image: vk::Image,
    from: vk::ImageLayout,
    to: vk::ImageLayout,
    aspect: vk::ImageAspectFlags,
) -> RhiResult<(vk::ImageMemoryBarrier<'static>, vk::PipelineStageFlags, vk::PipelineStageFlags)> {
    let masks = transition_masks(from, to)?;
    let barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access)
        .old_layout(from)
        .new_layout(to)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    Ok((barrier, masks.src_stage, masks.dst_stage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_transitions() {
        let m = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(m.src_access, vk::AccessFlags::empty());
        assert_eq!(m.dst_access, vk::AccessFlags::TRANSFER_WRITE);

        let m = transition_masks(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .unwrap();
        assert_eq!(m.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(m.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_render_to_readback_transition() {
        let m = transition_masks(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .unwrap();
        assert_eq!(m.src_access, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(m.dst_access, vk::AccessFlags::TRANSFER_READ);
        assert_eq!(m.src_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
    }

    #[test]
    fn test_unsupported_pair_is_error() {
        let err = transition_masks(vk::ImageLayout::GENERAL, vk::ImageLayout::PRESENT_SRC_KHR).unwrap_err();
        assert!(matches!(err, RhiError::UnsupportedLayoutTransition { .. }));
    }
}
