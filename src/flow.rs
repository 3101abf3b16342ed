//! Application event loop.
//!
//! [`run`] opens a window, builds the [`Context`] and [`Renderer`], hands both
//! to the caller's setup closure once, then draws a frame on every redraw
//! request until the window is closed.
//!
//! # Lifecycle
//!
//! 1. `resumed`: create window, context and renderer, run the setup closure,
//!    then [`Renderer::prepare`] validates models and allocates shadow maps
//! 2. window events feed the [`crate::camera::OrbitController`]
//! 3. `RedrawRequested`: apply the collected navigation, encode the shadow
//!    and colour passes, present
//!
//! Everything runs on the event loop thread and every GPU submission is
//! made from [`AppState::render`].

use std::{fmt::Debug, iter, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    config::RendererConfig, context::Context, data_structures::texture::Texture, render::Renderer,
};

/// Scene construction, called once the GPU is available.
pub type Setup = Box<dyn FnOnce(&Context, &mut Renderer) -> anyhow::Result<()>>;

/// Context, renderer and surface status of the open window.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    pub renderer: Renderer,
    is_surface_configured: bool,
    started: Instant,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &RendererConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        let renderer = Renderer::new(&ctx.device, &ctx.queue, ctx.config.format, config);
        Ok(Self {
            ctx,
            renderer,
            is_surface_configured: false,
            started: Instant::now(),
        })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    /// Draws and presents one frame.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // keep the loop going
        self.ctx.window.request_redraw();

        if !self.is_surface_configured {
            return Ok(());
        }

        self.ctx.controller.update(&mut self.ctx.camera);

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.renderer.encode_frame(
            &self.ctx.device,
            &self.ctx.queue,
            &mut encoder,
            &view,
            self.ctx.depth_view(),
            self.ctx.camera.view_matrix(),
            self.ctx.projection.calc_matrix(),
            self.started.elapsed().as_secs_f32(),
        );

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    config: RendererConfig,
    setup: Option<Setup>,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

impl Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl App {
    fn new(config: RendererConfig, setup: Setup) -> anyhow::Result<Self> {
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            async_runtime,
            config,
            setup: Some(setup),
            state: None,
            error: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let config = self.config.clone();
        let mut app_state = match self.async_runtime.block_on(AppState::new(window, &config)) {
            Ok(app_state) => app_state,
            Err(e) => {
                return self.fail(
                    event_loop,
                    e.context("App initialization failed. Cannot create the main context"),
                );
            }
        };

        if let Some(setup) = self.setup.take() {
            if let Err(e) = setup(&app_state.ctx, &mut app_state.renderer) {
                return self.fail(event_loop, e.context("Scene setup failed"));
            }
        }
        app_state.renderer.prepare(&app_state.ctx.device);
        let size = app_state.ctx.window.inner_size();
        app_state.resize(size.width, size.height);
        self.state = Some(app_state);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.controller.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => match state.render() {
                Ok(_) => {}
                // Reconfigure the surface if it's lost or outdated
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    let size = state.ctx.window.inner_size();
                    state.resize(size.width, size.height);
                }
                Err(e) => {
                    log::error!("Unable to render {}", e);
                }
            },
            _ => {}
        }
    }
}

/// Opens the window and runs the frame loop until it is closed.
///
/// `setup` registers models, lights and textures. An error from it, or from
/// creating the window or GPU context, ends the loop and is returned.
pub fn run(
    config: RendererConfig,
    setup: impl FnOnce(&Context, &mut Renderer) -> anyhow::Result<()> + 'static,
) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, Box::new(setup))?;

    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
