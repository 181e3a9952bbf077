//! Command buffer helpers.

use crate::context::GpuContext;
use crate::error::Result;
use ash::vk;

/// Allocate primary command buffers from the context's command pool.
///
/// # Safety
/// The device must be valid.
pub unsafe fn allocate_command_buffers(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    let buffers = device.allocate_command_buffers(&alloc_info)?;
    Ok(buffers)
}

/// Begin recording a command buffer for one-shot use.
///
/// # Safety
/// The device and command buffer must be valid, and the buffer must not
/// currently be recording or pending.
pub unsafe fn begin_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    let begin_info = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    device.begin_command_buffer(cmd, &begin_info)?;
    Ok(())
}

/// End recording a command buffer.
///
/// # Safety
/// The device and command buffer must be valid and recording.
pub unsafe fn end_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    device.end_command_buffer(cmd)?;
    Ok(())
}

/// Record and submit a one-shot command buffer, blocking until it completes.
///
/// Used for staging transfers and layout transitions at load time; never on
/// the per-frame path.
pub fn execute_single_time_commands<F>(gpu: &GpuContext, record: F) -> Result<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer),
{
    let device = gpu.device();
    let cmd = unsafe { allocate_command_buffers(device, gpu.command_pool(), 1)?[0] };

    run_then_free(
        || unsafe {
            begin_command_buffer(device, cmd)?;
            record(device, cmd);
            end_command_buffer(device, cmd)?;

            let submit_info =
                vk::SubmitInfo::default().command_buffers(std::slice::from_ref(&cmd));
            device.queue_submit(gpu.graphics_queue(), &[submit_info], vk::Fence::null())?;
            device.queue_wait_idle(gpu.graphics_queue())?;
            Ok(())
        },
        || unsafe { device.free_command_buffers(gpu.command_pool(), &[cmd]) },
    )
}

/// Run `body`, then `free`, returning `body`'s result.
///
/// The one-shot buffer goes back to the pool whether or not recording and
/// submission succeed.
fn run_then_free(body: impl FnOnce() -> Result<()>, free: impl FnOnce()) -> Result<()> {
    let result = body();
    free();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GpuError;

    #[test]
    fn one_shot_buffer_is_freed_when_submission_fails() {
        let mut freed = false;
        let result = run_then_free(
            || Err(GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST)),
            || freed = true,
        );
        assert!(result.is_err());
        assert!(freed);
    }

    #[test]
    fn one_shot_buffer_is_freed_on_success() {
        let mut freed = false;
        assert!(run_then_free(|| Ok(()), || freed = true).is_ok());
        assert!(freed);
    }
}
