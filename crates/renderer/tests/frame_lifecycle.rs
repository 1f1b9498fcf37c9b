//! Frame loop scenarios driven against the mock GPU and window.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk::{self, Handle};

use renderer_platform::PresentationWindow;
use renderer_platform::mock::MockWindow;
use renderer_renderer::render_pass_recorder::{CLEAR_COLOR, CLEAR_DEPTH, CLEAR_STENCIL};
use renderer_renderer::{FrameContext, FrameOrchestrator, RenderError, RenderResult, RenderSystem};
use renderer_rhi::mock::{GpuEvent, MockGpu, ObjectKind, Outcome};

fn setup(width: u32, height: u32) -> (Arc<MockGpu>, MockWindow, FrameOrchestrator<MockGpu>) {
    let gpu = Arc::new(MockGpu::new());
    let mut window = MockWindow::new(width, height);
    let orchestrator = FrameOrchestrator::new(gpu.clone(), &mut window).unwrap();
    (gpu, window, orchestrator)
}

/// Runs one full frame, returning its context.
fn run_frame(
    orchestrator: &mut FrameOrchestrator<MockGpu>,
    window: &mut MockWindow,
) -> FrameContext {
    let frame = orchestrator
        .begin_frame(window)
        .unwrap()
        .expect("frame should not be skipped");
    orchestrator.begin_render_pass(frame.command_buffer).unwrap();
    orchestrator.end_render_pass(frame.command_buffer).unwrap();
    orchestrator.end_frame(window).unwrap();
    frame
}

#[test]
fn test_slots_cycle_between_frames_in_flight() {
    let (_gpu, mut window, mut orchestrator) = setup(800, 600);

    let slots: Vec<usize> = (0..4)
        .map(|_| run_frame(&mut orchestrator, &mut window).slot_index)
        .collect();
    assert_eq!(slots, vec![0, 1, 0, 1]);
}

#[test]
fn test_ten_frames_are_throttled_and_never_share_an_image() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);
    gpu.clear_events();

    for _ in 0..10 {
        run_frame(&mut orchestrator, &mut window);
    }

    let events = gpu.events();

    // Pair every submission with the image it presented.
    let mut submits = Vec::new();
    let mut pending: Option<(u64, u64)> = None;
    for event in &events {
        match *event {
            GpuEvent::Submit {
                sequence,
                completed_through,
                ..
            } => pending = Some((sequence, completed_through)),
            GpuEvent::Present { image_index, .. } => {
                let (sequence, completed_through) = pending.take().unwrap();
                submits.push((sequence, completed_through, image_index));
            }
            _ => {}
        }
    }
    assert_eq!(submits.len(), 10);

    // At most two frames are ever queued on the GPU.
    for (frame, &(_, completed_through, _)) in submits.iter().enumerate().skip(2) {
        let frame_number = frame as u64 + 1;
        assert!(
            completed_through >= frame_number - 2,
            "frame {frame_number} submitted with only {completed_through} completed"
        );
    }

    // An image is never submitted again before its previous frame completed.
    let mut last_submit: HashMap<u32, u64> = HashMap::new();
    for &(sequence, completed_through, image_index) in &submits {
        if let Some(&previous) = last_submit.get(&image_index) {
            assert!(
                previous <= completed_through,
                "image {image_index} reused by {sequence} while {previous} was in flight"
            );
        }
        last_submit.insert(image_index, sequence);
    }

    // The first two frames find their slots free.
    let first_waits: Vec<bool> = events
        .iter()
        .filter_map(|event| match event {
            GpuEvent::FenceWait { was_pending, .. } => Some(*was_pending),
            _ => None,
        })
        .take(2)
        .collect();
    assert_eq!(first_waits, vec![false, false]);

    // Every acquire is preceded by a wait on its slot's fence, which from the
    // third frame on is the fence submitted two frames earlier.
    let submit_fences: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            GpuEvent::Submit { fence, .. } => Some(*fence),
            _ => None,
        })
        .collect();
    let acquire_waits: Vec<u64> = events
        .windows(2)
        .filter_map(|pair| match pair {
            [GpuEvent::FenceWait { fence, .. }, GpuEvent::Acquire { .. }] => Some(*fence),
            _ => None,
        })
        .collect();
    assert_eq!(acquire_waits.len(), 10);
    for frame in 2..10 {
        assert_eq!(
            acquire_waits[frame],
            submit_fences[frame - 2],
            "frame {} did not wait on its slot fence",
            frame + 1
        );
    }
}

#[test]
fn test_image_reacquired_by_other_slot_waits_for_previous_writer() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);
    gpu.clear_events();

    let first = run_frame(&mut orchestrator, &mut window);
    assert_eq!((first.slot_index, first.image_index), (0, 0));
    let slot0_fence = gpu
        .events()
        .iter()
        .find_map(|event| match event {
            GpuEvent::Submit { fence, .. } => Some(*fence),
            _ => None,
        })
        .unwrap();
    gpu.clear_events();

    // Slot 1 is handed the image slot 0 is still rendering into.
    gpu.push_acquire_index(0);
    let second = run_frame(&mut orchestrator, &mut window);
    assert_eq!((second.slot_index, second.image_index), (1, 0));

    let events = gpu.events();
    let marker_wait = events
        .iter()
        .position(|event| {
            *event
                == GpuEvent::FenceWait {
                    fence: slot0_fence,
                    was_pending: true,
                }
        })
        .expect("no blocking wait on the previous writer's fence");
    let submit = events
        .iter()
        .position(|event| matches!(event, GpuEvent::Submit { .. }))
        .unwrap();
    assert!(marker_wait < submit);
    assert!(matches!(
        events[submit],
        GpuEvent::Submit {
            completed_through: 1,
            ..
        }
    ));
}

#[test]
fn test_out_of_date_acquire_skips_frame_and_rebuilds() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);
    let before = orchestrator.surfaces().swapchain();

    gpu.push_acquire_outcome(Outcome::OutOfDate);
    assert!(orchestrator.begin_frame(&mut window).unwrap().is_none());
    assert!(!orchestrator.is_frame_in_progress());

    let after = orchestrator.surfaces().swapchain();
    assert_ne!(after, before);
    assert!(gpu.events().contains(&GpuEvent::SwapchainCreated {
        handle: after.as_raw(),
        old_swapchain: before.as_raw(),
        extent: vk::Extent2D {
            width: 800,
            height: 600
        },
        format: vk::Format::B8G8R8A8_SRGB,
    }));
    assert_eq!(gpu.live_objects_of(ObjectKind::Swapchain), 1);

    run_frame(&mut orchestrator, &mut window);
}

#[test]
fn test_format_change_on_rebuild_is_reported() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);

    gpu.set_surface_formats(vec![vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }]);
    gpu.push_acquire_outcome(Outcome::OutOfDate);

    let result = orchestrator.begin_frame(&mut window);
    assert!(matches!(
        result,
        Err(RenderError::FormatChanged {
            old_color: vk::Format::B8G8R8A8_SRGB,
            new_color: vk::Format::R8G8B8A8_UNORM,
            ..
        })
    ));
    assert_eq!(orchestrator.surfaces().color_format(), vk::Format::B8G8R8A8_SRGB);
    assert_eq!(gpu.live_objects_of(ObjectKind::Swapchain), 1);
}

#[test]
fn test_begin_frame_twice_is_rejected() {
    let (_gpu, mut window, mut orchestrator) = setup(800, 600);

    orchestrator.begin_frame(&mut window).unwrap().unwrap();
    assert!(matches!(
        orchestrator.begin_frame(&mut window),
        Err(RenderError::ContractViolation(_))
    ));
    assert!(orchestrator.is_frame_in_progress());
}

#[test]
fn test_end_frame_while_idle_is_rejected() {
    let (_gpu, mut window, mut orchestrator) = setup(800, 600);
    assert!(matches!(
        orchestrator.end_frame(&mut window),
        Err(RenderError::ContractViolation(_))
    ));
}

#[test]
fn test_foreign_command_buffer_is_rejected() {
    let (_gpu, mut window, mut orchestrator) = setup(800, 600);
    let frame = orchestrator.begin_frame(&mut window).unwrap().unwrap();

    let foreign = vk::CommandBuffer::from_raw(frame.command_buffer.as_raw() + 1000);
    assert!(matches!(
        orchestrator.begin_render_pass(foreign),
        Err(RenderError::ContractViolation(_))
    ));
    assert!(matches!(
        orchestrator.end_render_pass(foreign),
        Err(RenderError::ContractViolation(_))
    ));
}

#[test]
fn test_zero_extent_waits_for_window_events() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);

    window.script_extents([(0, 0), (640, 480)]);
    window.resize(0, 0);
    gpu.push_acquire_outcome(Outcome::OutOfDate);

    assert!(orchestrator.begin_frame(&mut window).unwrap().is_none());
    assert_eq!(window.wait_count(), 2);
    assert_eq!(
        orchestrator.extent(),
        vk::Extent2D {
            width: 640,
            height: 480
        }
    );

    let frame = orchestrator.begin_frame(&mut window).unwrap();
    assert!(frame.is_some());
}

#[test]
fn test_close_while_minimized_skips_rebuild() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);
    let before = orchestrator.surfaces().swapchain();

    window.resize(0, 0);
    window.request_close();
    gpu.push_acquire_outcome(Outcome::OutOfDate);

    assert!(orchestrator.begin_frame(&mut window).unwrap().is_none());
    assert_eq!(orchestrator.surfaces().swapchain(), before);
}

#[test]
fn test_resize_rebuilds_and_clears_flag() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);

    orchestrator.begin_frame(&mut window).unwrap().unwrap();
    window.resize(1280, 720);
    orchestrator.end_frame(&mut window).unwrap();

    assert!(!window.was_resized());
    assert_eq!(
        orchestrator.extent(),
        vk::Extent2D {
            width: 1280,
            height: 720
        }
    );
    assert!((orchestrator.aspect_ratio() - 1280.0 / 720.0).abs() < f32::EPSILON);
    assert_eq!(gpu.live_objects_of(ObjectKind::Framebuffer), 3);
}

#[test]
fn test_out_of_date_present_still_advances_slot() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);

    gpu.push_present_outcome(Outcome::OutOfDate);
    let first = run_frame(&mut orchestrator, &mut window);
    let second = run_frame(&mut orchestrator, &mut window);

    assert_eq!(first.slot_index, 0);
    assert_eq!(second.slot_index, 1);
}

#[test]
fn test_render_pass_records_clears_viewport_and_scissor() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);
    gpu.clear_events();

    let frame = run_frame(&mut orchestrator, &mut window);
    let events = gpu.events();
    let extent = vk::Extent2D {
        width: 800,
        height: 600,
    };

    assert!(events.contains(&GpuEvent::BeginRenderPass {
        command_buffer: frame.command_buffer.as_raw(),
        framebuffer: orchestrator
            .surfaces()
            .framebuffer(frame.image_index)
            .unwrap()
            .as_raw(),
        render_area: extent,
        clear_color: CLEAR_COLOR,
        clear_depth: CLEAR_DEPTH,
        clear_stencil: CLEAR_STENCIL,
    }));
    assert!(events.contains(&GpuEvent::SetViewport {
        width: 800.0,
        height: 600.0,
        min_depth: 0.0,
        max_depth: 1.0,
    }));
    assert!(events.contains(&GpuEvent::SetScissor(extent)));
    assert!(events.contains(&GpuEvent::EndRenderPass(frame.command_buffer.as_raw())));
}

struct CountingSystem {
    frames: usize,
    last_extent: Option<vk::Extent2D>,
}

impl RenderSystem<MockGpu> for CountingSystem {
    fn render(&mut self, _device: &MockGpu, frame: &FrameContext) -> RenderResult<()> {
        self.frames += 1;
        self.last_extent = Some(frame.extent);
        Ok(())
    }
}

#[test]
fn test_render_systems_see_each_frame() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);
    let mut system = CountingSystem {
        frames: 0,
        last_extent: None,
    };

    for _ in 0..3 {
        let frame = orchestrator.begin_frame(&mut window).unwrap().unwrap();
        orchestrator.begin_render_pass(frame.command_buffer).unwrap();
        system.render(&gpu, &frame).unwrap();
        orchestrator.end_render_pass(frame.command_buffer).unwrap();
        orchestrator.end_frame(&mut window).unwrap();
    }

    assert_eq!(system.frames, 3);
    assert_eq!(system.last_extent, Some(orchestrator.extent()));
}

#[test]
fn test_shutdown_releases_everything_in_reverse_order() {
    let (gpu, mut window, mut orchestrator) = setup(800, 600);
    run_frame(&mut orchestrator, &mut window);
    gpu.clear_events();

    drop(orchestrator);

    assert_eq!(gpu.live_object_count(), 0);
    let events = gpu.events();
    assert_eq!(events.first(), Some(&GpuEvent::WaitIdle));

    let position = |kind: ObjectKind| {
        events
            .iter()
            .position(|e| matches!(e, GpuEvent::Destroyed(k, _) if *k == kind))
            .unwrap()
    };
    assert!(position(ObjectKind::Framebuffer) < position(ObjectKind::RenderPass));
    assert!(position(ObjectKind::RenderPass) < position(ObjectKind::Swapchain));
    assert!(position(ObjectKind::CommandBuffer) < position(ObjectKind::CommandPool));
}
