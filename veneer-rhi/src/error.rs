use ash::vk;
use thiserror::Error;

/// RHI 层的致命错误
///
/// Vulkan 的资源创建失败基本上意味着驱动或者调用方的 contract 被破坏了，
/// 没有重试的余地。上层应该记录日志并干净地退出，而不是带着 null handle 继续运行。
#[derive(Debug, Error)]
pub enum RhiError {
    /// native 的创建/分配调用返回了非 success
    #[error("failed to create {what}: {source:?}")]
    ResourceCreation { what: &'static str, source: vk::Result },

    /// 请求了 barrier helper 不认识的 layout 转换对，说明调用顺序有逻辑 bug
    #[error("unsupported image layout transition: {from:?} -> {to:?}")]
    UnsupportedLayoutTransition { from: vk::ImageLayout, to: vk::ImageLayout },

    /// 回读的字节数超过了 readback buffer 的实际分配（aligned）大小
    #[error("readback of {requested} bytes exceeds buffer capacity of {available} bytes")]
    OversizedReadback { requested: u64, available: u64 },

    /// 上传的数据不够填满 image 的像素 footprint
    #[error("upload of {provided} bytes is smaller than the image footprint of {required} bytes")]
    UndersizedUpload { provided: u64, required: u64 },

    /// 没有满足 type filter 和 property flags 的 memory type
    #[error("no suitable memory type: type_bits={type_bits:#x}, props={props:?}")]
    NoSuitableMemoryType { type_bits: u32, props: vk::MemoryPropertyFlags },

    /// draw command 引用了未注册的 texture id
    #[error("draw command references unknown texture id {0}")]
    UnknownTexture(u64),

    /// 其他的 native 调用失败
    #[error("vulkan call failed: {0:?}")]
    Vk(#[from] vk::Result),
}

impl RhiError {
    #[inline]
    pub fn creation(what: &'static str, source: vk::Result) -> Self {
        Self::ResourceCreation { what, source }
    }
}

pub type RhiResult<T> = Result<T, RhiError>;
