//! Frame-in-flight synchronization.
//!
//! [`FrameSynchronizer`] owns [`MAX_FRAMES_IN_FLIGHT`] frame slots and a
//! marker per presentable image recording which slot fence last wrote it.
//! The slot fence bounds how far the CPU runs ahead; the image marker keeps
//! two slots from rendering into the same image at once when the image count
//! differs from the slot count.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, trace};

use renderer_rhi::GpuDevice;
use renderer_rhi::device::Device;
use renderer_rhi::swapchain::{AcquiredImage, SwapchainStatus};
use renderer_rhi::sync::{FrameSlot, MAX_FRAMES_IN_FLIGHT};

use crate::error::{RenderError, RenderResult};
use crate::presentation::PresentationSurfaceSet;

pub struct FrameSynchronizer<G: GpuDevice = Device> {
    device: Arc<G>,
    slots: Vec<FrameSlot<G>>,
    /// Slot fence that last submitted work for each image; null if none.
    images_in_flight: Vec<vk::Fence>,
    current_slot: usize,
}

impl<G: GpuDevice> FrameSynchronizer<G> {
    /// Creates the frame slots and empty markers for `image_count` images.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ResourceCreation`] if a semaphore or fence
    /// cannot be created.
    pub fn new(device: Arc<G>, image_count: usize) -> RenderResult<Self> {
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSlot::new(device.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(RenderError::creating("frame slot synchronization"))?;

        debug!(
            "Frame synchronizer created: {} slots, {} images",
            MAX_FRAMES_IN_FLIGHT, image_count
        );

        Ok(Self {
            device,
            slots,
            images_in_flight: vec![vk::Fence::null(); image_count],
            current_slot: 0,
        })
    }

    /// Index of the slot the next frame uses.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Waits for the current slot's previous frame, then acquires the next
    /// image, signaling the slot's image-available semaphore.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Presentation`] for any failure other than an
    /// out-of-date surface.
    pub fn acquire_next_image(
        &mut self,
        surfaces: &PresentationSurfaceSet<G>,
    ) -> RenderResult<AcquiredImage> {
        let slot = &self.slots[self.current_slot];

        trace!("Waiting for frame slot {}", self.current_slot);
        slot.in_flight()
            .wait(u64::MAX)
            .map_err(RenderError::presenting("waiting for frame slot"))?;

        let result = self
            .device
            .acquire_next_image(surfaces.swapchain(), slot.image_available());
        let acquired =
            AcquiredImage::classify(result).map_err(RenderError::presenting("acquiring image"))?;

        match acquired {
            AcquiredImage::OutOfDate => debug!("Swapchain out of date during acquire"),
            AcquiredImage::Ready {
                suboptimal: true,
                image_index,
            } => debug!("Acquired image {} from a suboptimal swapchain", image_index),
            AcquiredImage::Ready { .. } => {}
        }

        Ok(acquired)
    }

    /// Submits `command_buffer` for `image_index` and presents the image,
    /// then advances to the next slot.
    ///
    /// If another slot still renders into the image, waits for it first.
    /// The slot advances even when the swapchain reports out-of-date or
    /// suboptimal, since the submission itself went through.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ContractViolation`] if `image_index` does not
    /// name an image of the current set, and [`RenderError::Presentation`]
    /// if the wait, submission or present fails.
    pub fn submit_and_present(
        &mut self,
        surfaces: &PresentationSurfaceSet<G>,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> RenderResult<SwapchainStatus> {
        let image = image_index as usize;
        if image >= self.images_in_flight.len() {
            return Err(RenderError::ContractViolation(
                "image index is outside the current presentation surfaces",
            ));
        }

        let marker = self.images_in_flight[image];
        if marker != vk::Fence::null() {
            trace!("Waiting for previous writer of image {}", image_index);
            self.device
                .wait_for_fence(marker, u64::MAX)
                .map_err(RenderError::presenting("waiting for image"))?;
        }

        let slot = &self.slots[self.current_slot];
        self.images_in_flight[image] = slot.in_flight().handle();

        slot.in_flight()
            .reset()
            .map_err(RenderError::presenting("resetting frame fence"))?;

        self.device
            .submit_graphics(
                command_buffer,
                slot.image_available(),
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                slot.render_finished(),
                slot.in_flight().handle(),
            )
            .map_err(RenderError::presenting("submitting commands"))?;

        let result =
            self.device
                .queue_present(surfaces.swapchain(), image_index, slot.render_finished());
        let status = SwapchainStatus::classify_present(result)
            .map_err(RenderError::presenting("presenting"))?;

        self.current_slot = (self.current_slot + 1) % MAX_FRAMES_IN_FLIGHT;

        Ok(status)
    }

    /// Clears all image markers and resizes them for a rebuilt set.
    pub fn reset_markers(&mut self, image_count: usize) {
        self.images_in_flight.clear();
        self.images_in_flight
            .resize(image_count, vk::Fence::null());
    }

    /// Marker fence for `image_index`, if the image has been submitted.
    pub fn image_marker(&self, image_index: u32) -> Option<vk::Fence> {
        self.images_in_flight
            .get(image_index as usize)
            .copied()
            .filter(|fence| *fence != vk::Fence::null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use renderer_rhi::mock::{GpuEvent, MockGpu, Outcome};

    fn setup(image_count: u32) -> (Arc<MockGpu>, PresentationSurfaceSet<MockGpu>, FrameSynchronizer<MockGpu>) {
        let gpu = Arc::new(MockGpu::new());
        gpu.set_image_count(image_count);
        let surfaces = PresentationSurfaceSet::create(
            gpu.clone(),
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            None,
        )
        .unwrap();
        let sync = FrameSynchronizer::new(gpu.clone(), surfaces.image_count()).unwrap();
        (gpu, surfaces, sync)
    }

    fn run_frame(
        sync: &mut FrameSynchronizer<MockGpu>,
        surfaces: &PresentationSurfaceSet<MockGpu>,
    ) -> SwapchainStatus {
        let AcquiredImage::Ready { image_index, .. } = sync.acquire_next_image(surfaces).unwrap()
        else {
            panic!("acquire was out of date");
        };
        sync.submit_and_present(surfaces, vk::CommandBuffer::null(), image_index)
            .unwrap()
    }

    #[test]
    fn test_slot_advances_round_robin() {
        let (_gpu, surfaces, mut sync) = setup(3);
        let mut slots = Vec::new();
        for _ in 0..4 {
            slots.push(sync.current_slot());
            run_frame(&mut sync, &surfaces);
        }
        assert_eq!(slots, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_marker_records_slot_fence() {
        let (_gpu, surfaces, mut sync) = setup(3);
        assert_eq!(sync.image_marker(0), None);

        run_frame(&mut sync, &surfaces);
        let slot0_fence = sync.slots[0].in_flight().handle();
        assert_eq!(sync.image_marker(0), Some(slot0_fence));

        sync.reset_markers(2);
        assert_eq!(sync.image_marker(0), None);
        assert_eq!(sync.images_in_flight.len(), 2);
    }

    #[test]
    fn test_marker_wait_precedes_submit() {
        let (gpu, surfaces, mut sync) = setup(3);
        // Frames 1-3 write images 0, 1, 2; frame 4 rewrites image 0.
        for _ in 0..3 {
            run_frame(&mut sync, &surfaces);
        }
        let marker = sync.image_marker(0).unwrap();
        gpu.clear_events();

        run_frame(&mut sync, &surfaces);

        let events = gpu.events();
        let marker_wait = events
            .iter()
            .rposition(|e| matches!(e, GpuEvent::FenceWait { fence, .. } if *fence == marker.as_raw()))
            .unwrap();
        let submit = events
            .iter()
            .position(|e| matches!(e, GpuEvent::Submit { .. }))
            .unwrap();
        assert!(marker_wait < submit);
    }

    #[test]
    fn test_out_of_date_acquire_does_not_touch_slot_fence() {
        let (gpu, surfaces, mut sync) = setup(3);
        gpu.push_acquire_outcome(Outcome::OutOfDate);

        let acquired = sync.acquire_next_image(&surfaces).unwrap();
        assert_eq!(acquired, AcquiredImage::OutOfDate);
        assert_eq!(sync.current_slot(), 0);
        assert!(sync.slots[0].in_flight().is_signaled());
    }

    #[test]
    fn test_present_status_is_reported_and_slot_still_advances() {
        let (gpu, surfaces, mut sync) = setup(3);
        gpu.push_present_outcome(Outcome::OutOfDate);
        assert_eq!(run_frame(&mut sync, &surfaces), SwapchainStatus::OutOfDate);
        assert_eq!(sync.current_slot(), 1);

        gpu.push_present_outcome(Outcome::Suboptimal);
        assert_eq!(run_frame(&mut sync, &surfaces), SwapchainStatus::Suboptimal);
        assert_eq!(sync.current_slot(), 0);
    }

    #[test]
    fn test_image_index_out_of_range_is_rejected() {
        let (_gpu, surfaces, mut sync) = setup(2);
        let result = sync.submit_and_present(&surfaces, vk::CommandBuffer::null(), 5);
        assert!(matches!(result, Err(RenderError::ContractViolation(_))));
    }
}
