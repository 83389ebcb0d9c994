use ash::vk;

use crate::{gui::draw_data::DrawData, texture::TextureId};

/// 展平后的一次 indexed draw
///
/// first_index/vertex_offset 已经是跨 list 累加后的全局偏移，
/// 录制时直接用在共享的 vertex/index buffer 上
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawBatch {
    pub scissor: vk::Rect2D,
    pub texture: TextureId,
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
}

/// 把 DrawData 展平成按序的 batch 列表
///
/// clip rect 是绝对像素坐标，先减去 display_pos 换到 framebuffer 坐标，
/// origin 为负时 clamp 到 0。零面积的 batch 不剔除，交给 scissor test。
pub fn flatten_draw_data(draw_data: &DrawData) -> Vec<DrawBatch> {
    let mut batches = Vec::new();
    let mut global_idx_offset = 0u32;
    let mut global_vtx_offset = 0i32;

    for list in &draw_data.lists {
        for cmd in &list.commands {
            let clip_min_x = (cmd.clip_rect[0] - draw_data.display_pos[0]).max(0.0);
            let clip_min_y = (cmd.clip_rect[1] - draw_data.display_pos[1]).max(0.0);
            let clip_max_x = cmd.clip_rect[2] - draw_data.display_pos[0];
            let clip_max_y = cmd.clip_rect[3] - draw_data.display_pos[1];

            let scissor = vk::Rect2D {
                offset: vk::Offset2D {
                    x: clip_min_x as i32,
                    y: clip_min_y as i32,
                },
                extent: vk::Extent2D {
                    width: (clip_max_x - clip_min_x).max(0.0) as u32,
                    height: (clip_max_y - clip_min_y).max(0.0) as u32,
                },
            };

            batches.push(DrawBatch {
                scissor,
                texture: cmd.texture,
                index_count: cmd.count,
                first_index: global_idx_offset + cmd.idx_offset,
                vertex_offset: global_vtx_offset + cmd.vtx_offset as i32,
            });
        }
        global_idx_offset += list.indices.len() as u32;
        global_vtx_offset += list.vertices.len() as i32;
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui::draw_data::{DrawCmd, DrawList, DrawVert};
    use crate::texture::TextureId;

    fn cmd(clip_rect: [f32; 4], idx_offset: u32, vtx_offset: u32, count: u32) -> DrawCmd {
        DrawCmd {
            clip_rect,
            texture: TextureId::for_test(1),
            idx_offset,
            vtx_offset,
            count,
        }
    }

    #[test]
    fn test_cumulative_offsets_across_lists() {
        let draw_data = DrawData {
            lists: vec![
                DrawList {
                    vertices: vec![DrawVert::default(); 4],
                    indices: vec![0; 6],
                    commands: vec![cmd([0.0, 0.0, 10.0, 10.0], 0, 0, 6)],
                },
                DrawList {
                    vertices: vec![DrawVert::default(); 8],
                    indices: vec![0; 12],
                    commands: vec![
                        cmd([0.0, 0.0, 10.0, 10.0], 0, 0, 6),
                        cmd([0.0, 0.0, 10.0, 10.0], 6, 4, 6),
                    ],
                },
            ],
            display_pos: [0.0, 0.0],
            display_size: [100.0, 100.0],
        };

        let batches = flatten_draw_data(&draw_data);
        assert_eq!(batches.len(), 3);
        assert_eq!((batches[0].first_index, batches[0].vertex_offset), (0, 0));
        assert_eq!((batches[1].first_index, batches[1].vertex_offset), (6, 4));
        assert_eq!((batches[2].first_index, batches[2].vertex_offset), (12, 8));
    }

    #[test]
    fn test_scissor_origin_clamped_to_zero() {
        let draw_data = DrawData {
            lists: vec![DrawList {
                vertices: vec![DrawVert::default(); 3],
                indices: vec![0; 3],
                commands: vec![cmd([-5.0, -8.0, 20.0, 30.0], 0, 0, 3)],
            }],
            display_pos: [0.0, 0.0],
            display_size: [100.0, 100.0],
        };

        let batches = flatten_draw_data(&draw_data);
        assert_eq!(batches[0].scissor.offset, vk::Offset2D { x: 0, y: 0 });
        assert_eq!(batches[0].scissor.extent, vk::Extent2D { width: 20, height: 30 });
    }

    #[test]
    fn test_display_pos_translates_clip_rect() {
        let draw_data = DrawData {
            lists: vec![DrawList {
                vertices: vec![DrawVert::default(); 3],
                indices: vec![0; 3],
                commands: vec![cmd([110.0, 120.0, 150.0, 160.0], 0, 0, 3)],
            }],
            display_pos: [100.0, 100.0],
            display_size: [100.0, 100.0],
        };

        let batches = flatten_draw_data(&draw_data);
        assert_eq!(batches[0].scissor.offset, vk::Offset2D { x: 10, y: 20 });
        assert_eq!(batches[0].scissor.extent, vk::Extent2D { width: 40, height: 40 });
    }

    #[test]
    fn test_zero_area_batch_is_kept() {
        let draw_data = DrawData {
            lists: vec![DrawList {
                vertices: vec![DrawVert::default(); 3],
                indices: vec![0; 3],
                commands: vec![cmd([10.0, 10.0, 10.0, 10.0], 0, 0, 3)],
            }],
            display_pos: [0.0, 0.0],
            display_size: [100.0, 100.0],
        };

        let batches = flatten_draw_data(&draw_data);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].scissor.extent, vk::Extent2D { width: 0, height: 0 });
    }

    #[test]
    fn test_empty_draw_data() {
        assert!(flatten_draw_data(&DrawData::default()).is_empty());
    }
}
