use ash::vk;

/// 延迟销毁的 handle，按类型打 tag
///
/// GPU 可能还在引用这些 handle，所以资源的 Release 只是把 handle 提交到这里，
/// 由持有 queue 的一方在确认 quiescent（例如 queue wait idle）之后统一 drain。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseEntry {
    Buffer(vk::Buffer),
    Memory(vk::DeviceMemory),
    Image(vk::Image),
    ImageView(vk::ImageView),
    Sampler(vk::Sampler),
    RenderPass(vk::RenderPass),
    Framebuffer(vk::Framebuffer),
    Pipeline(vk::Pipeline),
    PipelineLayout(vk::PipelineLayout),
    DescriptorSetLayout(vk::DescriptorSetLayout),
    DescriptorPool(vk::DescriptorPool),
    CommandPool(vk::CommandPool),
}

/// 延迟销毁队列
///
/// drain 会消费掉 entry，因此每个 handle 至多被销毁一次。
#[derive(Default)]
pub struct ReleaseQueue {
    entries: Vec<ReleaseEntry>,
}

impl ReleaseQueue {
    pub fn push(&mut self, entry: ReleaseEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ReleaseEntry>) {
        self.entries.extend(entries);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 实际执行销毁。调用方必须保证没有 in-flight 的 submission 还在引用这些 handle
    pub fn drain(&mut self, device: &ash::Device) {
        if self.entries.is_empty() {
            return;
        }
        log::debug!("draining release queue: {} entries", self.entries.len());

        // 销毁顺序：先 view/framebuffer 这类依赖对象，最后才是 memory。
        // 队列里同一批 entry 由同一个 Release 调用压入，顺序已经由调用方保证。
        for entry in self.entries.drain(..) {
            unsafe {
                match entry {
                    ReleaseEntry::Buffer(h) => device.destroy_buffer(h, None),
                    ReleaseEntry::Memory(h) => device.free_memory(h, None),
                    ReleaseEntry::Image(h) => device.destroy_image(h, None),
                    ReleaseEntry::ImageView(h) => device.destroy_image_view(h, None),
                    ReleaseEntry::Sampler(h) => device.destroy_sampler(h, None),
                    ReleaseEntry::RenderPass(h) => device.destroy_render_pass(h, None),
                    ReleaseEntry::Framebuffer(h) => device.destroy_framebuffer(h, None),
                    ReleaseEntry::Pipeline(h) => device.destroy_pipeline(h, None),
                    ReleaseEntry::PipelineLayout(h) => device.destroy_pipeline_layout(h, None),
                    ReleaseEntry::DescriptorSetLayout(h) => device.destroy_descriptor_set_layout(h, None),
                    ReleaseEntry::DescriptorPool(h) => device.destroy_descriptor_pool(h, None),
                    ReleaseEntry::CommandPool(h) => device.destroy_command_pool(h, None),
                }
            }
        }
    }

    /// 只取出 entry 而不销毁，测试用
    pub fn take_entries(&mut self) -> Vec<ReleaseEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_accumulate_in_order() {
        let mut queue = ReleaseQueue::default();
        queue.push(ReleaseEntry::ImageView(vk::ImageView::null()));
        queue.extend([
            ReleaseEntry::Image(vk::Image::null()),
            ReleaseEntry::Memory(vk::DeviceMemory::null()),
        ]);

        assert_eq!(queue.len(), 3);
        let entries = queue.take_entries();
        assert!(matches!(entries[0], ReleaseEntry::ImageView(_)));
        assert!(matches!(entries[1], ReleaseEntry::Image(_)));
        assert!(matches!(entries[2], ReleaseEntry::Memory(_)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_consumes_entries() {
        let mut queue = ReleaseQueue::default();
        queue.push(ReleaseEntry::Buffer(vk::Buffer::null()));
        let first = queue.take_entries();
        let second = queue.take_entries();

        // 每个 entry 只会被取出一次，不存在 double free 的窗口
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
