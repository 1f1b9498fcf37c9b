//! Vulkan Renderer - Main Entry Point
//!
//! Opens a window and runs the frame loop: each iteration begins a frame,
//! clears it through the render pass, lets the render systems record, and
//! presents. Escape or closing the window ends the loop.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use renderer_core::EngineConfig;
use renderer_platform::WindowHost;
use renderer_renderer::{FrameContext, RenderResult, RenderSystem, Renderer};
use renderer_rhi::device::Device;

/// How often the frame statistics are logged.
const STATS_INTERVAL: Duration = Duration::from_secs(2);

/// Logs the average frame rate over each reporting interval.
struct FrameStatsSystem {
    frames: u32,
    accumulated: f32,
}

impl FrameStatsSystem {
    fn new() -> Self {
        Self {
            frames: 0,
            accumulated: 0.0,
        }
    }
}

impl RenderSystem<Device> for FrameStatsSystem {
    fn render(&mut self, _device: &Device, frame: &FrameContext) -> RenderResult<()> {
        self.frames += 1;
        self.accumulated += frame.frame_time;

        if self.accumulated >= STATS_INTERVAL.as_secs_f32() {
            let fps = self.frames as f32 / self.accumulated;
            info!(
                "{:.1} fps ({:.2} ms/frame) at {}x{}",
                fps,
                1000.0 / fps,
                frame.extent.width,
                frame.extent.height
            );
            self.frames = 0;
            self.accumulated = 0.0;
        }
        Ok(())
    }
}

fn run(config: &EngineConfig) -> Result<()> {
    let mut host = WindowHost::new(&config.window).context("Failed to create window")?;
    let mut renderer =
        Renderer::new(&mut host, &config.renderer).context("Failed to initialize renderer")?;

    let mut systems: Vec<Box<dyn RenderSystem<Device>>> = vec![Box::new(FrameStatsSystem::new())];

    info!("Initialization complete, entering main loop");
    while host.poll_events() {
        let Some(frame) = renderer.begin_frame(&mut host)? else {
            continue;
        };

        renderer.begin_render_pass(frame.command_buffer)?;
        for system in &mut systems {
            system.render(renderer.device(), &frame)?;
        }
        renderer.end_render_pass(frame.command_buffer)?;

        renderer.end_frame(&mut host)?;
    }

    info!("Close requested, shutting down");
    renderer.wait_idle()?;
    Ok(())
}

fn main() -> Result<()> {
    let path = EngineConfig::default_path();
    let config = EngineConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    renderer_core::init_logging(&config.logging.filter);
    info!("Starting Vulkan Renderer");

    if let Err(e) = run(&config) {
        error!("Fatal error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
