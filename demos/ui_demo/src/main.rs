//! Windowed frame-loop demo. Clears the screen every frame, keeps the
//! smoothed FPS in the window title and leaves the overlay hook where an
//! immediate mode UI backend would plug in.
use vklab::ash::vk;
use vklab::context::Ctx;
use vklab::frame::{FrameContext, FrameDriver, FrameOutcome, NoOverlay};
use vklab::inflight::FrameRing;
use vklab::recorder::FrameRecorder;
use vklab::report;
use vklab::swapchain::SwapchainTarget;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::keyboard::{Key, NamedKey};

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
const INFLIGHT_SLOTS: usize = 2;
const SWAPCHAIN_IMAGES: u32 = 3;

fn main() -> Result<(), anyhow::Error> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let ev = winit::event_loop::EventLoop::builder().build().unwrap();
    let window_attributes = winit::window::Window::default_attributes()
        .with_title("vklab ui demo")
        .with_inner_size(winit::dpi::PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
        .with_resizable(false);
    #[allow(deprecated)]
    let window = ev.create_window(window_attributes)?;

    let (context, surface) = Ctx::with_surface(&window, true)?;
    report::log_adapters(&context.instance)?;
    report::log_surface_support(&surface, context.device.physical_device)?;

    let size = window.inner_size();
    let target = SwapchainTarget::builder(
        &context.device,
        &surface,
        vk::Extent2D {
            width: size.width,
            height: size.height,
        },
    )
    .with(|builder| builder.image_count = SWAPCHAIN_IMAGES)
    .build()?;

    let queue = context.queue().clone();
    let ring = FrameRing::new(&context.device, INFLIGHT_SLOTS)?;
    let recorder = FrameRecorder::new(&context.device, queue.family_index, INFLIGHT_SLOTS)?;
    let frames = FrameContext::new(&context.device, queue, target, ring, recorder, NoOverlay);
    let mut driver = FrameDriver::new(frames);

    #[allow(deprecated)]
    ev.run(move |event, ev_loop| {
        ev_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);
        match event {
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => {
                if let Err(error) = driver.stages_mut().release() {
                    log::error!("Frame context teardown failed: {}", error);
                }
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => ev_loop.exit(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            logical_key: Key::Named(NamedKey::Escape),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => ev_loop.exit(),
                WindowEvent::RedrawRequested => match driver.run_one_frame() {
                    Ok(report) => {
                        window.set_title(&format!("FPS: {:.3}", report.fps));
                        if !matches!(report.outcome, FrameOutcome::Rendered { .. }) {
                            log::debug!("Skipped frame: {:?}", report.outcome);
                        }
                    }
                    Err(error) => {
                        log::error!("Fatal frame error: {}", error);
                        if let Err(teardown) = driver.stages_mut().release() {
                            log::error!("Frame context teardown failed: {}", teardown);
                        }
                        std::process::exit(1);
                    }
                },
                _ => {}
            },
            _ => {}
        }
    })?;

    Ok(())
}
