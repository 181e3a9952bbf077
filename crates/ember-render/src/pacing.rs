//! Frame pacing state machine.
//!
//! Tracks which frame slot is current, whether a frame is being recorded,
//! and whether the swapchain needs a rebuild. Kept free of any GPU handles
//! so the begin/end protocol and its edge cases are testable without a
//! device; [`Renderer`](crate::Renderer) drives it with real acquire and
//! present results.

use ember_gpu::Acquire;

/// Per-frame-slot rotation and lifecycle state.
///
/// The slot count is the number of frames the CPU may record ahead of the
/// GPU. It is fixed at construction and unrelated to how many images the
/// swapchain holds.
pub struct FramePacer {
    frames_in_flight: usize,
    current_slot: usize,
    frame_number: u64,
    image_index: Option<u32>,
    recording: bool,
    rebuild_pending: bool,
}

impl FramePacer {
    /// Create a pacer for `frames_in_flight` slots.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0);
        Self {
            frames_in_flight,
            current_slot: 0,
            frame_number: 0,
            image_index: None,
            recording: false,
            rebuild_pending: false,
        }
    }

    /// The slot whose resources the next (or current) frame uses.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Monotonic count of completed begin/end cycles.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The swapchain image acquired for the current frame, if recording.
    pub fn image_index(&self) -> Option<u32> {
        self.image_index
    }

    /// Whether a frame is currently between begin and end.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Feed in the acquire result for a new frame.
    ///
    /// Returns `true` if the frame proceeds. On [`Acquire::OutOfDate`] the
    /// frame is aborted: the slot does not advance and the caller must
    /// rebuild the swapchain before trying again. A suboptimal acquire still
    /// proceeds; the rebuild is deferred until after this frame presents.
    ///
    /// # Panics
    /// Panics if a frame is already being recorded.
    pub fn begin_frame(&mut self, acquire: Acquire) -> bool {
        assert!(
            !self.recording,
            "begin_frame called while a frame is already in progress"
        );

        match acquire {
            Acquire::Ready {
                image_index,
                suboptimal,
            } => {
                self.recording = true;
                self.image_index = Some(image_index);
                if suboptimal {
                    self.rebuild_pending = true;
                }
                true
            }
            Acquire::OutOfDate => {
                self.rebuild_pending = true;
                false
            }
        }
    }

    /// Complete the current frame after submission and present.
    ///
    /// Advances the slot and frame number, and returns `true` if the
    /// swapchain should be rebuilt now: either this frame's acquire was
    /// suboptimal, the present reported it, or the window was resized.
    ///
    /// # Panics
    /// Panics if no frame is in progress.
    pub fn end_frame(&mut self, present_needs_rebuild: bool, window_resized: bool) -> bool {
        assert!(
            self.recording,
            "end_frame called with no frame in progress"
        );

        self.recording = false;
        self.image_index = None;
        self.current_slot = (self.current_slot + 1) % self.frames_in_flight;
        self.frame_number += 1;

        let rebuild = self.rebuild_pending || present_needs_rebuild || window_resized;
        self.rebuild_pending = false;
        rebuild
    }

    /// Note that a rebuild has happened; clears any pending request.
    pub fn swapchain_rebuilt(&mut self) {
        self.rebuild_pending = false;
    }
}

/// Poll `extent` until it reports a non-zero framebuffer size.
///
/// A minimized window has a zero extent and cannot back a swapchain, so a
/// rebuild blocks here until the window is restored.
pub fn await_valid_extent(mut extent: impl FnMut() -> (u32, u32)) -> (u32, u32) {
    loop {
        let (width, height) = extent();
        if width > 0 && height > 0 {
            return (width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(image_index: u32) -> Acquire {
        Acquire::Ready {
            image_index,
            suboptimal: false,
        }
    }

    #[test]
    fn slots_cycle_modulo_frames_in_flight() {
        let mut pacer = FramePacer::new(2);
        let mut seen = Vec::new();
        for i in 0..5 {
            assert!(pacer.begin_frame(ready(i % 3)));
            seen.push(pacer.current_slot());
            pacer.end_frame(false, false);
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
        assert_eq!(pacer.frame_number(), 5);
    }

    #[test]
    fn image_index_tracks_acquire_and_clears_on_end() {
        let mut pacer = FramePacer::new(2);
        assert!(pacer.begin_frame(ready(2)));
        assert_eq!(pacer.image_index(), Some(2));
        pacer.end_frame(false, false);
        assert_eq!(pacer.image_index(), None);
    }

    #[test]
    fn out_of_date_aborts_without_advancing() {
        let mut pacer = FramePacer::new(2);
        assert!(!pacer.begin_frame(Acquire::OutOfDate));
        assert!(!pacer.is_recording());
        assert_eq!(pacer.current_slot(), 0);
        assert_eq!(pacer.frame_number(), 0);
    }

    #[test]
    fn suboptimal_acquire_still_renders_then_requests_rebuild() {
        let mut pacer = FramePacer::new(2);
        assert!(pacer.begin_frame(Acquire::Ready {
            image_index: 0,
            suboptimal: true,
        }));
        assert!(pacer.end_frame(false, false));
    }

    #[test]
    fn resize_requests_rebuild_after_present() {
        let mut pacer = FramePacer::new(2);
        assert!(pacer.begin_frame(ready(0)));
        assert!(pacer.end_frame(false, true));

        assert!(pacer.begin_frame(ready(1)));
        assert!(!pacer.end_frame(false, false));
    }

    #[test]
    fn rebuild_request_does_not_persist_after_rebuild() {
        let mut pacer = FramePacer::new(2);
        assert!(!pacer.begin_frame(Acquire::OutOfDate));
        pacer.swapchain_rebuilt();
        assert!(pacer.begin_frame(ready(0)));
        assert!(!pacer.end_frame(false, false));
    }

    #[test]
    #[should_panic(expected = "already in progress")]
    fn begin_twice_panics() {
        let mut pacer = FramePacer::new(2);
        pacer.begin_frame(ready(0));
        pacer.begin_frame(ready(1));
    }

    #[test]
    #[should_panic(expected = "already in progress")]
    fn frame_abandoned_by_failed_submit_blocks_the_next_begin() {
        let mut pacer = FramePacer::new(2);
        assert!(pacer.begin_frame(ready(0)));
        // A submit or present error propagates before end_frame runs, so the
        // frame stays open. Retrying begin_frame is a caller bug; the runner
        // must tear down instead.
        assert!(pacer.is_recording());
        pacer.begin_frame(ready(1));
    }

    #[test]
    #[should_panic(expected = "no frame in progress")]
    fn end_without_begin_panics() {
        let mut pacer = FramePacer::new(2);
        pacer.end_frame(false, false);
    }

    #[test]
    fn await_valid_extent_skips_zero_sizes() {
        let sizes = [(0, 0), (0, 600), (800, 0), (800, 600)];
        let mut calls = 0;
        let extent = await_valid_extent(|| {
            let size = sizes[calls];
            calls += 1;
            size
        });
        assert_eq!(extent, (800, 600));
        assert_eq!(calls, 4);
    }
}
