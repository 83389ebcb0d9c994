use std::collections::HashMap;

use ash::vk;
use veneer_rhi::{core::release_queue::ReleaseEntry, rhi::Rhi, RhiError, RhiResult};

/// UI 侧引用 texture 的不透明 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn for_test(raw: u64) -> Self {
        Self(raw)
    }
}

/// texture 注册表
///
/// 每个注册的 (sampler, view) 对应一个 combined image sampler 的 descriptor set，
/// draw command 里只携带 TextureId，录制时在这里查回 descriptor set。
pub struct TextureRegistry {
    descriptor_pool: vk::DescriptorPool,
    set_layout: vk::DescriptorSetLayout,

    sets: HashMap<u64, vk::DescriptorSet>,
    next_id: u64,
}

impl TextureRegistry {
    pub fn new(rhi: &Rhi, capacity: u32) -> RhiResult<Self> {
        let device = rhi.vk_device();

        let bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let set_layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(|e| RhiError::creation("descriptor set layout", e))?
        };

        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: capacity,
        }];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(capacity)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = unsafe {
            match device.create_descriptor_pool(&pool_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    device.destroy_descriptor_set_layout(set_layout, None);
                    return Err(RhiError::creation("descriptor pool", e));
                }
            }
        };

        Ok(Self {
            descriptor_pool,
            set_layout,
            sets: HashMap::new(),
            next_id: 1,
        })
    }

    #[inline]
    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// 为一对 (sampler, view) 分配 descriptor set，返回 UI 侧使用的 id
    pub fn register(
        &mut self,
        rhi: &Rhi,
        sampler: vk::Sampler,
        view: vk::ImageView,
    ) -> RhiResult<TextureId> {
        let device = rhi.vk_device();

        let set_layouts = [self.set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&set_layouts);
        let set = unsafe {
            device.allocate_descriptor_sets(&alloc_info).map_err(|e| RhiError::creation("descriptor set", e))?[0]
        };

        let image_info = [vk::DescriptorImageInfo {
            sampler,
            image_view: view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe { device.update_descriptor_sets(&[write], &[]) };

        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.sets.insert(id.0, set);
        Ok(id)
    }

    /// 查找 id 对应的 descriptor set，未注册的 id 说明 draw data 有逻辑错误
    pub fn get(&self, id: TextureId) -> RhiResult<vk::DescriptorSet> {
        self.sets.get(&id.0).copied().ok_or(RhiError::UnknownTexture(id.0))
    }

    /// 注销并立即释放 descriptor set。调用方需要保证没有 in-flight 的引用
    pub fn unregister(&mut self, rhi: &Rhi, id: TextureId) -> RhiResult<()> {
        let set = self.sets.remove(&id.0).ok_or(RhiError::UnknownTexture(id.0))?;
        unsafe {
            rhi.vk_device().free_descriptor_sets(self.descriptor_pool, &[set])?;
        }
        Ok(())
    }

    /// pool 和 layout 走延迟销毁，descriptor set 随 pool 一起回收
    pub fn destroy(&mut self, rhi: &Rhi) {
        log::debug!("destroy texture registry with {} entries", self.sets.len());
        self.sets.clear();
        rhi.defer_release(ReleaseEntry::DescriptorPool(self.descriptor_pool));
        rhi.defer_release(ReleaseEntry::DescriptorSetLayout(self.set_layout));
        self.descriptor_pool = vk::DescriptorPool::null();
        self.set_layout = vk::DescriptorSetLayout::null();
    }
}
