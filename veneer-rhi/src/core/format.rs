use ash::vk;

/// image 支持的像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// R8G8B8A8_UNORM，每像素 4 字节
    Rgba8,
    /// R32G32B32A32_SFLOAT，每像素 16 字节
    Rgba32F,
    /// G8_B8_R8 三平面格式，每像素 3 字节，用于 blit 的目标而非直接采样
    Gbr8Planar,
}

impl PixelFormat {
    /// 每个像素需要的字节数，staging buffer 的 canonical 大小由此得出
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba32F => 16,
            PixelFormat::Gbr8Planar => 3,
        }
    }

    #[inline]
    pub fn vk_format(self) -> vk::Format {
        match self {
            PixelFormat::Rgba8 => vk::Format::R8G8B8A8_UNORM,
            PixelFormat::Rgba32F => vk::Format::R32G32B32A32_SFLOAT,
            PixelFormat::Gbr8Planar => vk::Format::G8_B8_R8_3PLANE_444_UNORM,
        }
    }

    /// 多平面格式在 copy 时需要逐平面处理
    #[inline]
    pub fn is_planar(self) -> bool {
        matches!(self, PixelFormat::Gbr8Planar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgba32F.bytes_per_pixel(), 16);
        assert_eq!(PixelFormat::Gbr8Planar.bytes_per_pixel(), 3);
    }

    #[test]
    fn test_vk_format_mapping() {
        assert_eq!(PixelFormat::Rgba8.vk_format(), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(PixelFormat::Rgba32F.vk_format(), vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(PixelFormat::Gbr8Planar.vk_format(), vk::Format::G8_B8_R8_3PLANE_444_UNORM);
    }

    #[test]
    fn test_planar_flag() {
        assert!(PixelFormat::Gbr8Planar.is_planar());
        assert!(!PixelFormat::Rgba8.is_planar());
        assert!(!PixelFormat::Rgba32F.is_planar());
    }
}
