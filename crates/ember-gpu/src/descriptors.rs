//! Descriptor set layouts, pools, and writes.
//!
//! Layouts keep their binding table around so writers can validate type and
//! arity at write time instead of at draw time. Pool exhaustion is a
//! recoverable condition surfaced as `Ok(None)` from [`DescriptorPool::try_allocate`];
//! duplicate bindings and mismatched writes are programmer errors and panic.

use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::HashMap;

/// A descriptor set layout together with its binding table.
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    bindings: HashMap<u32, vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorSetLayout {
    /// Start building a layout.
    pub fn builder() -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder::default()
    }

    /// The raw layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Look up the binding description for a binding index.
    pub fn binding(&self, index: u32) -> Option<&vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings.get(&index)
    }

    /// Destroy the layout.
    ///
    /// # Safety
    /// No pipeline or descriptor set using this layout may still be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        device.destroy_descriptor_set_layout(self.layout, None);
        self.layout = vk::DescriptorSetLayout::null();
    }
}

/// Builder for [`DescriptorSetLayout`].
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: HashMap<u32, vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorSetLayoutBuilder {
    /// Add a binding.
    ///
    /// # Panics
    /// Panics if the binding index was already added.
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        assert!(
            !self.bindings.contains_key(&binding),
            "Binding {binding} already in use"
        );

        let layout_binding = vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(count)
            .stage_flags(stage_flags);

        self.bindings.insert(binding, layout_binding);
        self
    }

    /// Create the layout on the device.
    pub fn build(self, device: &ash::Device) -> Result<DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> =
            self.bindings.values().copied().collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None)? };

        Ok(DescriptorSetLayout {
            layout,
            bindings: self.bindings,
        })
    }
}

/// A descriptor pool.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Start building a pool.
    pub fn builder() -> DescriptorPoolBuilder {
        DescriptorPoolBuilder::default()
    }

    /// The raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Allocate one descriptor set with the given layout.
    ///
    /// Returns `Ok(None)` when the pool is exhausted or too fragmented to
    /// satisfy the allocation; the caller can retry from another pool or
    /// after a reset. All other failures are real errors.
    pub fn try_allocate(
        &self,
        device: &ash::Device,
        layout: &DescriptorSetLayout,
    ) -> Result<Option<vk::DescriptorSet>> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let result = unsafe { device.allocate_descriptor_sets(&alloc_info) };

        match result {
            Ok(sets) => Ok(Some(sets[0])),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                Ok(None)
            }
            Err(e) => Err(GpuError::Vulkan(e)),
        }
    }

    /// Return specific sets to the pool.
    ///
    /// The pool must have been built with
    /// `vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET`.
    ///
    /// # Safety
    /// The sets must come from this pool and must not be referenced by
    /// pending GPU work.
    pub unsafe fn free(&self, device: &ash::Device, sets: &[vk::DescriptorSet]) -> Result<()> {
        device.free_descriptor_sets(self.pool, sets)?;
        Ok(())
    }

    /// Return all sets allocated from this pool to it.
    ///
    /// # Safety
    /// No set from this pool may be referenced by pending GPU work.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        device.reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        Ok(())
    }

    /// Destroy the pool and implicitly free all its sets.
    ///
    /// # Safety
    /// No set from this pool may be referenced by pending GPU work.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        device.destroy_descriptor_pool(self.pool, None);
        self.pool = vk::DescriptorPool::null();
    }
}

/// Builder for [`DescriptorPool`].
pub struct DescriptorPoolBuilder {
    max_sets: u32,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    flags: vk::DescriptorPoolCreateFlags,
}

impl Default for DescriptorPoolBuilder {
    fn default() -> Self {
        Self {
            max_sets: 1000,
            pool_sizes: Vec::new(),
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }
}

impl DescriptorPoolBuilder {
    /// Set the maximum number of sets the pool can allocate.
    pub fn max_sets(mut self, count: u32) -> Self {
        self.max_sets = count;
        self
    }

    /// Add capacity for `count` descriptors of the given type.
    pub fn add_pool_size(mut self, descriptor_type: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(
            vk::DescriptorPoolSize::default()
                .ty(descriptor_type)
                .descriptor_count(count),
        );
        self
    }

    /// Set pool creation flags.
    pub fn flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Create the pool on the device.
    pub fn build(self, device: &ash::Device) -> Result<DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes)
            .flags(self.flags);

        let pool = unsafe { device.create_descriptor_pool(&create_info, None)? };

        Ok(DescriptorPool { pool })
    }
}

enum PendingWrite {
    Buffer {
        binding: u32,
        descriptor_type: vk::DescriptorType,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        binding: u32,
        descriptor_type: vk::DescriptorType,
        info: vk::DescriptorImageInfo,
    },
}

/// Accumulates descriptor writes against one layout and flushes them in a
/// single update call.
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    writes: Vec<PendingWrite>,
}

impl<'a> DescriptorWriter<'a> {
    /// Start writing against a layout.
    pub fn new(layout: &'a DescriptorSetLayout) -> Self {
        Self {
            layout,
            writes: Vec::new(),
        }
    }

    /// Queue a buffer write for a binding.
    ///
    /// # Panics
    /// Panics if the layout has no such binding or the binding is an array.
    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        let layout_binding = self
            .layout
            .binding(binding)
            .unwrap_or_else(|| panic!("Layout has no binding {binding}"));
        assert_eq!(
            layout_binding.descriptor_count, 1,
            "Binding {binding} expects multiple descriptors, single write given"
        );

        self.writes.push(PendingWrite::Buffer {
            binding,
            descriptor_type: layout_binding.descriptor_type,
            info,
        });
        self
    }

    /// Queue an image write for a binding.
    ///
    /// # Panics
    /// Panics if the layout has no such binding or the binding is an array.
    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        let layout_binding = self
            .layout
            .binding(binding)
            .unwrap_or_else(|| panic!("Layout has no binding {binding}"));
        assert_eq!(
            layout_binding.descriptor_count, 1,
            "Binding {binding} expects multiple descriptors, single write given"
        );

        self.writes.push(PendingWrite::Image {
            binding,
            descriptor_type: layout_binding.descriptor_type,
            info,
        });
        self
    }

    /// Allocate a set from the pool and apply the queued writes.
    ///
    /// Returns `Ok(None)` when the pool is exhausted.
    pub fn build(
        self,
        device: &ash::Device,
        pool: &DescriptorPool,
    ) -> Result<Option<vk::DescriptorSet>> {
        let Some(set) = pool.try_allocate(device, self.layout)? else {
            return Ok(None);
        };
        self.overwrite(device, set);
        Ok(Some(set))
    }

    /// Apply the queued writes to an existing set.
    pub fn overwrite(self, device: &ash::Device, set: vk::DescriptorSet) {
        let descriptor_writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|write| match write {
                PendingWrite::Buffer {
                    binding,
                    descriptor_type,
                    info,
                } => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(*descriptor_type)
                    .buffer_info(std::slice::from_ref(info)),
                PendingWrite::Image {
                    binding,
                    descriptor_type,
                    info,
                } => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(*descriptor_type)
                    .image_info(std::slice::from_ref(info)),
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&descriptor_writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn test_layout(bindings: &[(u32, vk::DescriptorType, u32)]) -> DescriptorSetLayout {
        let bindings = bindings
            .iter()
            .map(|&(binding, ty, count)| {
                (
                    binding,
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding)
                        .descriptor_type(ty)
                        .descriptor_count(count)
                        .stage_flags(vk::ShaderStageFlags::ALL_GRAPHICS),
                )
            })
            .collect();
        DescriptorSetLayout {
            layout: vk::DescriptorSetLayout::null(),
            bindings,
        }
    }

    #[test]
    fn writer_records_buffer_info() {
        let layout = test_layout(&[(0, vk::DescriptorType::UNIFORM_BUFFER, 1)]);
        let info = vk::DescriptorBufferInfo::default()
            .buffer(vk::Buffer::from_raw(42))
            .offset(16)
            .range(64);

        let writer = DescriptorWriter::new(&layout).write_buffer(0, info);

        assert_eq!(writer.writes.len(), 1);
        match &writer.writes[0] {
            PendingWrite::Buffer {
                binding,
                descriptor_type,
                info,
            } => {
                assert_eq!(*binding, 0);
                assert_eq!(*descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
                assert_eq!(info.buffer.as_raw(), 42);
                assert_eq!(info.offset, 16);
                assert_eq!(info.range, 64);
            }
            PendingWrite::Image { .. } => panic!("expected a buffer write"),
        }
    }

    #[test]
    #[should_panic(expected = "no binding")]
    fn writer_rejects_unknown_binding() {
        let layout = test_layout(&[(0, vk::DescriptorType::UNIFORM_BUFFER, 1)]);
        let _ = DescriptorWriter::new(&layout).write_buffer(3, vk::DescriptorBufferInfo::default());
    }

    #[test]
    #[should_panic(expected = "expects multiple descriptors")]
    fn writer_rejects_single_write_to_array_binding() {
        let layout = test_layout(&[(0, vk::DescriptorType::UNIFORM_BUFFER, 2)]);
        let _ = DescriptorWriter::new(&layout).write_buffer(0, vk::DescriptorBufferInfo::default());
    }

    #[test]
    fn builder_collects_bindings() {
        let builder = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::ALL_GRAPHICS,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            );

        assert_eq!(builder.bindings.len(), 2);
        assert_eq!(
            builder.bindings[&0].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert_eq!(
            builder.bindings[&1].stage_flags,
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    #[should_panic(expected = "already in use")]
    fn builder_rejects_duplicate_binding() {
        let _ = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            )
            .add_binding(
                0,
                vk::DescriptorType::STORAGE_BUFFER,
                vk::ShaderStageFlags::VERTEX,
                1,
            );
    }
}
