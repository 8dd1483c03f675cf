//! Application runner and event loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::context::RenderContext;
use crate::logging::init_logging;

/// Open a window and render until it is closed or the frame limit is hit.
///
/// Any setup or per-frame error stops the loop, releases all resources and
/// is returned to the caller.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    init_logging();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner {
        config,
        state: None,
        error: None,
    };

    event_loop.run_app(&mut runner)?;

    match runner.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Frame timing statistics, logged at shutdown.
#[derive(Debug, Clone)]
pub struct FrameStats {
    started: Instant,
    last_frame: Instant,
    frames: u64,
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            last_frame: now,
            frames: 0,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        }
    }

    /// Record a frame finished at `now`.
    pub fn record(&mut self, now: Instant) {
        let dt = now.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;
        self.frames += 1;

        if dt > 0.0 {
            let fps = 1.0 / dt;
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
        }
    }

    /// Mean of the per-frame rates, or zero before the first frame.
    pub fn average_fps(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.fps_sum / self.frames as f64
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.last_frame.duration_since(self.started)
    }

    pub fn log(&self) {
        if self.frames == 0 {
            return;
        }
        info!("FPS Statistics:");
        info!("  Min: {:.1}", self.min_fps);
        info!("  Max: {:.1}", self.max_fps);
        info!("  Avg: {:.1}", self.average_fps());
        info!("  Total frames: {} in {:.2?}", self.frames, self.elapsed());
    }
}

/// Internal application runner that implements winit's ApplicationHandler.
struct AppRunner {
    config: AppConfig,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

/// Internal application state.
struct AppState {
    ctx: RenderContext,
    stats: FrameStats,
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }

        info!("Creating render context...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize application")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };

                // A limit of zero presents nothing
                if self.config.frame_limit_reached(state.ctx.frames_presented()) {
                    self.shutdown(event_loop);
                    return;
                }

                if let Err(e) = state.ctx.draw_frame() {
                    self.fail(event_loop, e.context("Render error"));
                    return;
                }
                state.stats.record(Instant::now());

                if self.config.frame_limit_reached(state.ctx.frames_presented()) {
                    info!("Reached frame limit of {}", state.ctx.frames_presented());
                    self.shutdown(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.stats.log();
        }
    }
}

impl AppRunner {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let ctx = RenderContext::new(window, &self.config)?;

        Ok(AppState {
            ctx,
            stats: FrameStats::new(Instant::now()),
        })
    }

    /// Release the render context and leave the event loop.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.stats.log();
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        error!("{error:#}");
        self.error.get_or_insert(error);
        self.shutdown(event_loop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_track_rates() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);

        stats.record(start + Duration::from_millis(10));
        stats.record(start + Duration::from_millis(30));

        assert_eq!(stats.frames, 2);
        assert!((stats.min_fps - 50.0).abs() < 1e-6);
        assert!((stats.max_fps - 100.0).abs() < 1e-6);
        assert!((stats.average_fps() - 75.0).abs() < 1e-6);
        assert_eq!(stats.elapsed(), Duration::from_millis(30));
    }

    #[test]
    fn empty_stats_average_zero() {
        let stats = FrameStats::new(Instant::now());
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.average_fps(), 0.0);
    }

    #[test]
    fn zero_length_frame_counts_without_rate() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);

        stats.record(start);

        assert_eq!(stats.frames, 1);
        assert_eq!(stats.fps_sum, 0.0);
    }
}
