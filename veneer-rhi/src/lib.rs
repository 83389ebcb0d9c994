//! Veneer 的 RHI 层
//!
//! 对 ash/Vulkan 的薄封装：注入式的 [`rhi::Rhi`] 上下文、buffer/image 资源、
//! layout 转换表以及延迟销毁队列。不涉及 swapchain 和窗口，所有渲染都是 offscreen 的。

pub mod core;
pub mod error;
pub mod rhi;

pub use error::{RhiError, RhiResult};
