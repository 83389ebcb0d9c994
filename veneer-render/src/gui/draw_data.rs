use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::texture::TextureId;

/// UI 顶点，和 pipeline 的 vertex input 布局一一对应
///
/// color 是 packed 的 RGBA8，在 shader 里通过 UNORM format 还原成 vec4
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct DrawVert {
    pub pos: glam::Vec2,
    pub uv: glam::Vec2,
    pub col: u32,
}

impl DrawVert {
    pub fn vertex_input_bindings() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<DrawVert>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    pub fn vertex_input_attributes() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(DrawVert, pos) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(DrawVert, uv) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R8G8B8A8_UNORM,
                offset: std::mem::offset_of!(DrawVert, col) as u32,
            },
        ]
    }
}

/// 一个 batch 的绘制指令
///
/// clip_rect 是 (min_x, min_y, max_x, max_y)，屏幕像素坐标；
/// idx_offset/vtx_offset 是相对于所属 DrawList 的偏移
#[derive(Debug, Clone, Copy)]
pub struct DrawCmd {
    pub clip_rect: [f32; 4],
    pub texture: TextureId,
    pub idx_offset: u32,
    pub vtx_offset: u32,
    pub count: u32,
}

/// 一段连续的几何数据以及其上的 draw command 序列
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub vertices: Vec<DrawVert>,
    pub indices: Vec<u16>,
    pub commands: Vec<DrawCmd>,
}

/// 一帧 UI 的全部绘制数据
///
/// display_pos/display_size 是 UI 坐标系的原点和大小（像素），
/// push constant 的 scale/translate 由此换算
#[derive(Debug, Clone, Default)]
pub struct DrawData {
    pub lists: Vec<DrawList>,
    pub display_pos: [f32; 2],
    pub display_size: [f32; 2],
}

impl DrawData {
    pub fn total_vtx_count(&self) -> usize {
        self.lists.iter().map(|list| list.vertices.len()).sum()
    }

    pub fn total_idx_count(&self) -> usize {
        self.lists.iter().map(|list| list.indices.len()).sum()
    }

    /// 空帧（没有任何顶点）是合法状态，上传和录制都应该跳过
    pub fn is_empty(&self) -> bool {
        self.total_vtx_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<DrawVert>(), 20);

        let bindings = DrawVert::vertex_input_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 20);

        let attrs = DrawVert::vertex_input_attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 8);
        assert_eq!(attrs[2].offset, 16);
        assert_eq!(attrs[2].format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_total_counts() {
        let mut draw_data = DrawData::default();
        assert!(draw_data.is_empty());

        draw_data.lists.push(DrawList {
            vertices: vec![DrawVert::default(); 4],
            indices: vec![0, 1, 2, 2, 3, 0],
            commands: vec![],
        });
        draw_data.lists.push(DrawList {
            vertices: vec![DrawVert::default(); 3],
            indices: vec![0, 1, 2],
            commands: vec![],
        });

        assert_eq!(draw_data.total_vtx_count(), 7);
        assert_eq!(draw_data.total_idx_count(), 9);
        assert!(!draw_data.is_empty());
    }
}
