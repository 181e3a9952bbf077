//! Frame lifecycle tests against a simulated GPU.
//!
//! The pacer is driven the same way the renderer drives it, but fences,
//! acquire results, and presents come from a tick-based model instead of a
//! device. This pins down slot rotation, backpressure, and swapchain
//! rebuild behavior.

use ember_gpu::Acquire;
use ember_render::{FramePacer, MAX_FRAMES_IN_FLIGHT};

/// Tick-based stand-in for queue submission and fence waits.
struct SimGpu {
    tick: u64,
    /// Ticks from submission to fence signal.
    latency: u64,
    /// Per slot, the tick at which its last submission completes.
    fence_ready_at: Vec<u64>,
    presents: u64,
}

impl SimGpu {
    fn new(latency: u64) -> Self {
        Self {
            tick: 0,
            latency,
            fence_ready_at: vec![0; MAX_FRAMES_IN_FLIGHT],
            presents: 0,
        }
    }

    /// Block until the slot's fence signals; returns ticks spent waiting.
    fn wait_fence(&mut self, slot: usize) -> u64 {
        let ready = self.fence_ready_at[slot];
        let waited = ready.saturating_sub(self.tick);
        self.tick = self.tick.max(ready);
        waited
    }

    fn record(&mut self, cpu_ticks: u64) {
        self.tick += cpu_ticks;
    }

    fn submit(&mut self, slot: usize) {
        self.fence_ready_at[slot] = self.tick + self.latency;
    }

    fn present(&mut self) {
        self.presents += 1;
    }
}

/// Swapchain stand-in handing out image indices round-robin.
struct SimSwapchain {
    image_count: u32,
    next_image: u32,
    stale: bool,
    suboptimal: bool,
    generation: u32,
}

impl SimSwapchain {
    fn new(image_count: u32) -> Self {
        Self {
            image_count,
            next_image: 0,
            stale: false,
            suboptimal: false,
            generation: 0,
        }
    }

    fn acquire(&mut self) -> Acquire {
        if self.stale {
            return Acquire::OutOfDate;
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Acquire::Ready {
            image_index,
            suboptimal: self.suboptimal,
        }
    }

    fn rebuild(&mut self) {
        self.stale = false;
        self.suboptimal = false;
        self.next_image = 0;
        self.generation += 1;
    }
}

/// One loop iteration, mirroring the renderer's begin/end protocol.
///
/// Returns whether the frame rendered, plus the ticks spent in the fence
/// wait.
fn run_frame(
    pacer: &mut FramePacer,
    gpu: &mut SimGpu,
    swapchain: &mut SimSwapchain,
    cpu_ticks: u64,
    window_resized: bool,
) -> (Option<u32>, u64) {
    let slot = pacer.current_slot();
    let waited = gpu.wait_fence(slot);

    let acquire = swapchain.acquire();
    if !pacer.begin_frame(acquire) {
        swapchain.rebuild();
        pacer.swapchain_rebuilt();
        return (None, waited);
    }
    let image_index = pacer.image_index();

    gpu.record(cpu_ticks);
    gpu.submit(slot);
    gpu.present();

    if pacer.end_frame(false, window_resized) {
        swapchain.rebuild();
    }

    (image_index, waited)
}

#[test]
fn clean_run_presents_every_frame() {
    let mut pacer = FramePacer::new(MAX_FRAMES_IN_FLIGHT);
    let mut gpu = SimGpu::new(1);
    let mut swapchain = SimSwapchain::new(3);

    for _ in 0..10 {
        let (rendered, _) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, false);
        assert!(rendered.is_some());
    }

    assert_eq!(gpu.presents, 10);
    assert_eq!(pacer.frame_number(), 10);
    assert_eq!(swapchain.generation, 0);
}

#[test]
fn slots_and_images_rotate_independently() {
    let mut pacer = FramePacer::new(MAX_FRAMES_IN_FLIGHT);
    let mut gpu = SimGpu::new(1);
    let mut swapchain = SimSwapchain::new(3);

    let mut slots = Vec::new();
    let mut images = Vec::new();
    for _ in 0..6 {
        slots.push(pacer.current_slot());
        let (image, _) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, false);
        images.push(image.unwrap());
    }

    // Two slots cycling against three images: the pairings drift.
    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
    assert_eq!(images, vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn slow_gpu_stalls_cpu_at_most_one_frame_ahead() {
    let mut pacer = FramePacer::new(MAX_FRAMES_IN_FLIGHT);
    let mut gpu = SimGpu::new(3);
    let mut swapchain = SimSwapchain::new(3);

    let mut waits = Vec::new();
    for _ in 0..10 {
        let (_, waited) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, false);
        waits.push(waited);
    }

    // Both slots start with signaled fences, so the first two frames record
    // without waiting; after that the fence wait throttles the CPU.
    assert_eq!(waits[0], 0);
    assert_eq!(waits[1], 0);
    assert!(waits[2..].iter().any(|&w| w > 0));
    assert!(waits.iter().all(|&w| w <= gpu.latency));
}

#[test]
fn stale_acquire_skips_frame_and_rebuilds_once() {
    let mut pacer = FramePacer::new(MAX_FRAMES_IN_FLIGHT);
    let mut gpu = SimGpu::new(1);
    let mut swapchain = SimSwapchain::new(3);

    let mut rendered = 0;
    for i in 0..10 {
        if i == 5 {
            swapchain.stale = true;
        }
        let slot_before = pacer.current_slot();
        let (image, _) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, false);
        if image.is_some() {
            rendered += 1;
        } else {
            // An aborted frame must not rotate the slot.
            assert_eq!(pacer.current_slot(), slot_before);
        }
    }

    assert_eq!(rendered, 9);
    assert_eq!(gpu.presents, 9);
    assert_eq!(swapchain.generation, 1);
    assert_eq!(pacer.frame_number(), 9);
}

#[test]
fn suboptimal_acquire_presents_then_rebuilds() {
    let mut pacer = FramePacer::new(MAX_FRAMES_IN_FLIGHT);
    let mut gpu = SimGpu::new(1);
    let mut swapchain = SimSwapchain::new(3);

    swapchain.suboptimal = true;
    let (image, _) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, false);

    // The frame still rendered and presented; the rebuild happened after.
    assert!(image.is_some());
    assert_eq!(gpu.presents, 1);
    assert_eq!(swapchain.generation, 1);

    // The rebuilt swapchain serves frames normally.
    let (image, _) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, false);
    assert_eq!(image, Some(0));
    assert_eq!(swapchain.generation, 1);
}

#[test]
fn resize_rebuilds_after_presenting() {
    let mut pacer = FramePacer::new(MAX_FRAMES_IN_FLIGHT);
    let mut gpu = SimGpu::new(1);
    let mut swapchain = SimSwapchain::new(2);

    let (image, _) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, true);
    assert!(image.is_some());
    assert_eq!(gpu.presents, 1);
    assert_eq!(swapchain.generation, 1);

    for _ in 0..3 {
        let (image, _) = run_frame(&mut pacer, &mut gpu, &mut swapchain, 1, false);
        assert!(image.is_some());
    }
    assert_eq!(swapchain.generation, 1);
}
