//! Synchronization primitive helpers.
//!
//! Fences gate CPU access to per-frame resources; semaphores order GPU work
//! against swapchain acquire and present. These are thin creation and wait
//! helpers; ownership stays with the caller.

use crate::error::Result;
use ash::vk;

/// Create a binary semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let info = vk::SemaphoreCreateInfo::default();
    let semaphore = device.create_semaphore(&info, None)?;
    Ok(semaphore)
}

/// Create a fence, optionally in the signaled state.
///
/// Per-frame fences start signaled so the first wait on each frame slot
/// returns immediately.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };
    let info = vk::FenceCreateInfo::default().flags(flags);
    let fence = device.create_fence(&info, None)?;
    Ok(fence)
}

/// Block until the fence is signaled.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.wait_for_fences(&[fence], true, u64::MAX)?;
    Ok(())
}

/// Reset a fence to the unsignaled state.
///
/// Must only happen once work that will signal the fence is guaranteed to be
/// submitted; resetting and then not submitting deadlocks the next wait.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence])?;
    Ok(())
}
