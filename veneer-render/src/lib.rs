//! Veneer 的渲染层
//!
//! 把一帧 UI 的 [`gui::draw_data::DrawData`] 渲染到 offscreen 的目标 image 上：
//! shader 由 [`shader`] 模块在运行时生成 SPIR-V，draw list 经 [`offscreen::batches`]
//! 展平后由 [`offscreen::pipeline::OffscreenPipeline`] 上传、录制并阻塞提交。
//! texture 通过 [`texture::TextureRegistry`] 注册，draw command 里只出现不透明 id。

pub mod gui;
pub mod offscreen;
pub mod shader;
pub mod texture;

pub use gui::draw_data::{DrawCmd, DrawData, DrawList, DrawVert};
pub use offscreen::pipeline::OffscreenPipeline;
pub use texture::{TextureId, TextureRegistry};
