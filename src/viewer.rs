// src/viewer.rs
//! Interactive viewer: a spinning checkered cube with an orbiting
//! satellite, lit by one directional light. Doubles as the end-to-end
//! exercise of the schema -> runtime -> binding-set path.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use glam::{Mat4, Vec3};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::camera::Camera;
use crate::error::Result;
use crate::gpu::GpuContext;
use crate::lighting::Light;
use crate::material::MaterialLibrary;
use crate::renderer::Renderer;
use crate::resources::{cube_mesh, ResourceStore};
use crate::scene::{CameraKey, MeshInstance, NodeKey, Scene};
use crate::schema::SchemaRegistry;

const VIEWER_SCHEMAS: &str = r#"[
  {
    "id": "surface",
    "scope": "material",
    "versions": 1,
    "attributes": [
      { "name": "colorFactor", "default": { "type": "vec4", "value": [1.0, 1.0, 1.0, 1.0] } },
      { "name": "roughness", "default": { "type": "scalar", "value": 0.5 } },
      { "name": "baseTexture", "default": { "type": "texture", "value": "white" } },
      { "name": "baseSampler", "default": { "type": "sampler", "value": "linear" } }
    ]
  },
  {
    "id": "node_transform",
    "scope": "node",
    "versions": 1,
    "attributes": [
      { "name": "model", "default": { "type": "mat4", "value": [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0
      ] } }
    ]
  },
  {
    "id": "frame",
    "scope": "scene",
    "versions": 1,
    "attributes": [
      { "name": "view", "default": { "type": "mat4", "value": [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0
      ] } },
      { "name": "projection", "default": { "type": "mat4", "value": [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0
      ] } },
      { "name": "cameraPosition", "default": { "type": "vec4", "value": [0.0, 0.0, 0.0, 1.0] } },
      { "name": "lightDirection", "default": { "type": "vec4", "value": [0.0, -1.0, 0.0, 0.0] } }
    ]
  }
]"#;

const VIEWER_MATERIALS: &str = r#"[
  {
    "name": "checker",
    "values": {
      "baseTexture": { "type": "texture", "value": "checker" },
      "roughness": { "type": "scalar", "value": 0.35 }
    }
  },
  {
    "name": "magenta",
    "values": {
      "colorFactor": { "type": "vec4", "value": [0.9, 0.2, 0.8, 1.0] },
      "roughness": { "type": "scalar", "value": 0.8 }
    }
  }
]"#;

pub fn run_native() -> anyhow::Result<()> {
    pollster::block_on(run_inner())
}

// ----------------------------------------------------------------------------
// winit 0.30 + wgpu 22 app state
// ----------------------------------------------------------------------------

struct ViewerApp {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    gpu: GpuContext,

    // Created inside the `resumed` event
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    config: Option<wgpu::SurfaceConfiguration>,
    state: Option<ViewerState>,
    started: Instant,
}

/// Everything the demo scene needs once a surface exists.
struct ViewerState {
    store: ResourceStore,
    scene: Scene,
    materials: MaterialLibrary,
    renderer: Renderer,
    camera: CameraKey,
    hub: NodeKey,
    pivot: NodeKey,
}

fn build_viewer_state(gpu: &GpuContext, config: &wgpu::SurfaceConfiguration) -> Result<ViewerState> {
    let mut registry = SchemaRegistry::new();
    registry.load_json(VIEWER_SCHEMAS)?;

    let store = ResourceStore::with_defaults(gpu);
    store.register_mesh("cube", cube_mesh(gpu, "cube"));
    store.upload_color_texture(gpu, "checker", 8, 8, &checker_pixels(8));

    let mut materials = MaterialLibrary::new();
    materials.load_json(&registry, VIEWER_MATERIALS)?;

    let mut scene = Scene::new(&registry, "node_transform")?;
    let hub = scene.add_node(&registry, Mat4::IDENTITY)?;
    scene.set_mesh_instance(hub, MeshInstance::new("cube", "checker"))?;

    let pivot = scene.add_node(&registry, Mat4::IDENTITY)?;
    let satellite = scene.add_child(
        &registry,
        pivot,
        Mat4::from_translation(Vec3::new(2.5, 0.6, 0.0)) * Mat4::from_scale(Vec3::splat(0.4)),
    )?;
    scene.set_mesh_instance(satellite, MeshInstance::new("cube", "magenta"))?;

    let aspect = config.width.max(1) as f32 / config.height.max(1) as f32;
    let mut camera = Camera::new(
        Vec3::new(0.0, 2.5, -6.0),
        0.0,
        0.0,
        std::f32::consts::FRAC_PI_4,
        aspect,
        0.1,
        100.0,
    );
    camera.look_at(Vec3::ZERO);
    let camera = scene.add_camera(camera);
    scene.add_light(Light::directional(Vec3::new(-0.4, -1.0, -0.3)));

    let mut renderer = Renderer::new(
        gpu,
        &registry,
        config.format,
        "surface",
        "node_transform",
        "frame",
        config.width,
        config.height,
    )?;
    renderer.set_clear_color(wgpu::Color {
        r: 0.015,
        g: 0.02,
        b: 0.05,
        a: 1.0,
    });

    Ok(ViewerState {
        store,
        scene,
        materials,
        renderer,
        camera,
        hub,
        pivot,
    })
}

fn checker_pixels(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if (x + y) % 2 == 0 { 220 } else { 70 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    pixels
}

impl ViewerApp {
    fn render_frame(&mut self) {
        let (Some(surface), Some(config), Some(state)) = (
            self.surface.as_ref(),
            self.config.as_ref(),
            self.state.as_mut(),
        ) else {
            return;
        };

        let elapsed = self.started.elapsed().as_secs_f32();
        let animate = state
            .scene
            .set_local_transform(
                state.hub,
                Mat4::from_rotation_y(elapsed * 0.5) * Mat4::from_rotation_x(elapsed * 0.3),
            )
            .and_then(|_| {
                state
                    .scene
                    .set_local_transform(state.pivot, Mat4::from_rotation_y(elapsed * 0.8))
            })
            .and_then(|_| state.scene.update());
        if let Err(err) = animate {
            log::error!("scene update failed: {err}");
            return;
        }

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!(
                    "Failed to acquire next swap chain texture: {:?}. Reconfiguring surface.",
                    err
                );
                surface.configure(&self.gpu.device, config);
                match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::error!("Failed to acquire frame after reconfigure: {:?}", e);
                        return;
                    }
                }
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        if let Err(err) = state.renderer.render(
            &self.gpu,
            &state.store,
            &mut state.scene,
            &mut state.materials,
            &view,
        ) {
            log::error!("render failed: {err}");
        }
        frame.present();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes().with_title("basalt viewer");
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .expect("Failed to create window"),
        );
        self.window = Some(window.clone());

        let surface = self
            .instance
            .create_surface(window.clone())
            .expect("Failed to create surface");
        let size = window.inner_size();
        let caps = surface.get_capabilities(&self.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: caps.present_modes[0],
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&self.gpu.device, &config);

        let state = build_viewer_state(&self.gpu, &config).expect("Failed to build viewer scene");

        self.surface = Some(surface);
        self.config = Some(config);
        self.state = Some(state);

        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    if let (Some(surface), Some(config)) =
                        (self.surface.as_ref(), self.config.as_mut())
                    {
                        config.width = new_size.width;
                        config.height = new_size.height;
                        surface.configure(&self.gpu.device, config);
                    }
                    if let Some(state) = self.state.as_mut() {
                        state.renderer.resize(&self.gpu, new_size.width, new_size.height);
                        let aspect = new_size.width as f32 / new_size.height as f32;
                        if let Ok(camera) = state.scene.camera_mut(state.camera) {
                            camera.set_aspect(aspect);
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.render_frame();
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

// ----------------------------------------------------------------------------
// Async runner
// ----------------------------------------------------------------------------

async fn run_inner() -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        dx12_shader_compiler: Default::default(),
        flags: wgpu::InstanceFlags::empty(),
        gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable GPU adapter")?;
    log::info!("using adapter: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("basalt_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .context("failed to request GPU device")?;

    let mut app = ViewerApp {
        instance,
        adapter,
        gpu: GpuContext::new(Arc::new(device), Arc::new(queue)),
        window: None,
        surface: None,
        config: None,
        state: None,
        started: Instant::now(),
    };

    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;
    Ok(())
}
