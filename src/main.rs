use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use log::{info, warn};
use pollster::block_on;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::WindowBuilder;

use raycast_hover::{
    print_final_state, spawn_model_load, DemoApp, FixedStepper, FrameClock, FrameTask,
    HoverEvent, ModelDesc, MouseButton, PendingModel, Renderer, Scene, SceneDescription,
    Viewport,
};

/// Upper bound the headless driver waits for the model before frame 0.
const MODEL_WAIT: Duration = Duration::from_secs(5);

const USAGE: &str = "Usage: raycast-hover [scene.xml] [--model <file.obj>] [--summary-only] \
[--frames <n>] [--click <x>,<y>[@<frame>]] [--size <w>x<h>]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let description = load_description(&options)?;

    println!(
        "Loaded scene with {} objects",
        description.spheres.len()
    );
    for sphere in &description.spheres {
        println!(" - {} (sphere)", sphere.name);
    }
    if let Some(model) = &description.model {
        println!(" - {} (model {})", model.name, model.mesh.display());
    }

    let pending = match description.model.clone() {
        Some(desc) => spawn_model_load(desc)?,
        None => PendingModel::none(),
    };
    let scene = Scene::from_description(&description, options.size.aspect());

    if options.summary_only {
        run_headless(scene, pending, &options)
    } else {
        match run_interactive(scene.clone(), pending.clone(), &options) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --summary-only mode (set DISPLAY or install a GPU driver to enable rendering)."
                    );
                    run_headless(scene, pending, &options)
                } else {
                    Err(err)
                }
            }
        }
    }
}

fn load_description(options: &CliOptions) -> Result<SceneDescription> {
    let mut description = match options.scene.as_deref() {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read scene {}", path.display()))?;
            let mut description = SceneDescription::from_xml(&xml)
                .with_context(|| format!("failed to parse scene {}", path.display()))?;
            if let Some(dir) = path.parent() {
                description.resolve_paths(dir);
            }
            description
        }
        None => SceneDescription::default(),
    };

    if let Some(mesh) = options.model.as_ref() {
        match description.model.as_mut() {
            Some(model) => model.mesh = mesh.clone(),
            None => {
                description.model = Some(ModelDesc {
                    name: model_name(mesh),
                    mesh: mesh.clone(),
                    position: Vec3::new(0.0, -1.2, 0.0),
                    color: Vec3::ONE,
                })
            }
        }
    }
    Ok(description)
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Model".to_string())
}

fn run_headless(scene: Scene, pending: PendingModel, options: &CliOptions) -> Result<()> {
    if !pending.wait(MODEL_WAIT) {
        warn!("model still loading after {MODEL_WAIT:?}; running without it");
    }

    let mut app = DemoApp::new(scene, options.size, pending);
    let mut stepper = FixedStepper::new(FixedStepper::SIXTY_HZ);
    while stepper.frame() < options.frames {
        let frame = stepper.frame();
        for click in options.clicks.iter().filter(|click| click.frame == frame) {
            app.click(click.position);
        }
        stepper.step(&mut app);

        for event in &app.last_report().events {
            let (verb, id) = match event {
                HoverEvent::Enter(id) => ("enter", id),
                HoverEvent::Leave(id) => ("leave", id),
            };
            let name = app
                .scene()
                .object(*id)
                .map_or("?", |object| object.name.as_str());
            println!("frame {frame}: mouse {verb} {name}");
        }
    }

    print_final_state(&app);
    Ok(())
}

fn run_interactive(scene: Scene, pending: PendingModel, options: &CliOptions) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::<()>::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Raycast Hover")
            .with_inner_size(PhysicalSize::new(options.size.width, options.size.height))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window)))
        .map_err(|err| WindowInitError::from_error("renderer", format!("{err:#}")))?;
    let size = renderer.size();

    let mut state = AppState {
        renderer,
        app: DemoApp::new(scene, Viewport::new(size.width, size.height), pending),
        clock: FrameClock::new(),
        last_error: None,
    };

    event_loop
        .run_on_demand(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            if let Err(err) = state.process_event(&event, elwt) {
                state.last_error = Some(err);
                elwt.exit();
            }
        })
        .context("event loop failed")?;

    print_final_state(&state.app);

    match state.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct AppState {
    renderer: Renderer,
    app: DemoApp,
    clock: FrameClock,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn process_event(
        &mut self,
        event: &Event<()>,
        elwt: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed
                            && event.logical_key == Key::Named(NamedKey::Escape)
                        {
                            elwt.exit();
                        }
                    }
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                        self.app.resize(size.width, size.height);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        self.app
                            .cursor_moved(Vec2::new(position.x as f32, position.y as f32));
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        self.app
                            .mouse_button(map_button(*button), *state == ElementState::Pressed);
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        let steps = match delta {
                            MouseScrollDelta::LineDelta(_, y) => *y,
                            MouseScrollDelta::PixelDelta(position) => (position.y / 50.0) as f32,
                        };
                        self.app.scroll(steps);
                    }
                    WindowEvent::RedrawRequested => self.redraw()?,
                    _ => {}
                }
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let dt = self.clock.delta();
        self.app.tick(dt);
        self.renderer
            .update_globals(&self.app.camera_params(), &self.app.light_params());
        if let Err(err) = self.renderer.render(self.app.scene()) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
            }
        }
        Ok(())
    }
}

fn map_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::LEFT,
        WinitMouseButton::Right => MouseButton::RIGHT,
        WinitMouseButton::Middle => MouseButton::MIDDLE,
        WinitMouseButton::Back => MouseButton::new(3),
        WinitMouseButton::Forward => MouseButton::new(4),
        WinitMouseButton::Other(value) => MouseButton::new(u8::try_from(value).unwrap_or(u8::MAX)),
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Click scripted for the headless run, applied before `frame` ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScriptedClick {
    position: Vec2,
    frame: u64,
}

impl ScriptedClick {
    /// `<x>,<y>` or `<x>,<y>@<frame>`.
    fn parse(value: &str) -> Result<Self> {
        let (coords, frame) = match value.split_once('@') {
            Some((coords, frame)) => (
                coords,
                frame
                    .parse::<u64>()
                    .with_context(|| format!("invalid click frame in {value:?}"))?,
            ),
            None => (value, 0),
        };
        let (x, y) = coords
            .split_once(',')
            .ok_or_else(|| anyhow!("click {value:?} must look like <x>,<y>[@<frame>]"))?;
        let x = x
            .trim()
            .parse::<f32>()
            .with_context(|| format!("invalid click x in {value:?}"))?;
        let y = y
            .trim()
            .parse::<f32>()
            .with_context(|| format!("invalid click y in {value:?}"))?;
        Ok(Self {
            position: Vec2::new(x, y),
            frame,
        })
    }
}

fn parse_size(value: &str) -> Result<Viewport> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("size {value:?} must look like <w>x<h>"))?;
    let width = width
        .parse::<u32>()
        .with_context(|| format!("invalid width in {value:?}"))?;
    let height = height
        .parse::<u32>()
        .with_context(|| format!("invalid height in {value:?}"))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("size {value:?} must be non-zero"));
    }
    Ok(Viewport::new(width, height))
}

#[derive(Debug)]
struct CliOptions {
    scene: Option<PathBuf>,
    model: Option<PathBuf>,
    summary_only: bool,
    frames: u64,
    clicks: Vec<ScriptedClick>,
    size: Viewport,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            scene: None,
            model: None,
            summary_only: false,
            frames: 1,
            clicks: Vec::new(),
            size: Viewport::new(1280, 720),
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                "--model" => options.model = Some(PathBuf::from(value("--model")?)),
                "--frames" => {
                    let frames = value("--frames")?;
                    options.frames = frames
                        .parse()
                        .with_context(|| format!("invalid frame count {frames:?}"))?;
                }
                "--click" => options.clicks.push(ScriptedClick::parse(&value("--click")?)?),
                "--size" => options.size = parse_size(&value("--size")?)?,
                other if other.starts_with("--") => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
                path if options.scene.is_none() => options.scene = Some(PathBuf::from(path)),
                extra => return Err(anyhow!("Unexpected argument: {extra}. {USAGE}")),
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_without_arguments() {
        let options = parse(&[]).unwrap();
        assert!(options.scene.is_none());
        assert!(!options.summary_only);
        assert_eq!(options.frames, 1);
        assert_eq!(options.size, Viewport::new(1280, 720));
    }

    #[test]
    fn parses_all_flags() {
        let options = parse(&[
            "scene.xml",
            "--summary-only",
            "--frames",
            "4",
            "--click",
            "10,20@2",
            "--click",
            "5.5,6",
            "--size",
            "640x480",
            "--model",
            "gem.obj",
        ])
        .unwrap();
        assert_eq!(options.scene, Some(PathBuf::from("scene.xml")));
        assert_eq!(options.frames, 4);
        assert_eq!(
            options.clicks,
            vec![
                ScriptedClick {
                    position: Vec2::new(10.0, 20.0),
                    frame: 2
                },
                ScriptedClick {
                    position: Vec2::new(5.5, 6.0),
                    frame: 0
                },
            ]
        );
        assert_eq!(options.size, Viewport::new(640, 480));
        assert_eq!(options.model, Some(PathBuf::from("gem.obj")));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--click", "10"]).is_err());
        assert!(parse(&["--size", "0x10"]).is_err());
        assert!(parse(&["a.xml", "b.xml"]).is_err());
    }
}
