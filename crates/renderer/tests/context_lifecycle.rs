use std::path::Path;

use renderer::driver::recording::LiveObject;
use renderer::gpu::{GpuSession, RenderProgram};
use renderer::{
    CallKind, CallLog, ContextConfig, DriverCall, FractalKind, PaletteKind, RecordingDriver,
    RecordingSurface, RenderContext, Vertex,
};

fn context(log: &CallLog, width: u32, height: u32) -> RenderContext<RecordingSurface> {
    RenderContext::new(
        RecordingSurface::new(log.clone(), width, height),
        Box::new(RecordingDriver::new(log.clone())),
        ContextConfig::default(),
    )
    .expect("render context")
}

fn frame_target_sizes(log: &CallLog) -> Vec<(u32, u32)> {
    log.calls()
        .into_iter()
        .filter_map(|call| match call {
            DriverCall::CreateFrameTarget { width, height } => Some((width, height)),
            _ => None,
        })
        .collect()
}

#[test]
fn single_frame_issues_exactly_the_expected_calls() {
    let log = CallLog::new();
    let mut context = context(&log, 640, 480);
    context.use_program(FractalKind::Mandelbrot).unwrap();
    context.use_palette(PaletteKind::Rainbow).unwrap();
    context.draw().unwrap();
    context.swap_buffers().unwrap();

    assert_eq!(log.count(CallKind::CreatePipeline), 1);
    assert_eq!(log.count(CallKind::CompileShader), 2);
    assert_eq!(log.count(CallKind::CreateVertexBuffer), 1);
    assert_eq!(log.count(CallKind::CreateTexture), 1);
    assert_eq!(log.count(CallKind::DrawArrays), 1);
    assert_eq!(log.count(CallKind::Submit), 1);
    assert_eq!(log.count(CallKind::WaitDone), 1);
    assert_eq!(log.count(CallKind::Blit), 1);

    let draw = log.position(CallKind::DrawArrays).unwrap();
    let submit = log.position(CallKind::Submit).unwrap();
    let wait = log.position(CallKind::WaitDone).unwrap();
    let blit = log.position(CallKind::Blit).unwrap();
    assert!(draw < submit && submit < wait && wait < blit);
    assert!(log.violations().is_empty(), "{:?}", log.violations());
}

#[test]
fn dropping_the_context_releases_everything() {
    let log = CallLog::new();
    let mut context = context(&log, 320, 200);
    context.use_program(FractalKind::Julia2).unwrap();
    context.use_palette(PaletteKind::Blue).unwrap();
    context.draw().unwrap();
    context.swap_buffers().unwrap();
    drop(context);

    assert_eq!(log.live_objects(), Vec::<LiveObject>::new());
    assert!(log.violations().is_empty(), "{:?}", log.violations());
}

#[test]
fn program_teardown_destroys_pipeline_before_its_shaders() {
    let log = CallLog::new();
    let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
    let program = RenderProgram::new(
        &session,
        Path::new("shaders"),
        FractalKind::Mandelbrot,
        100,
        1.0,
    )
    .unwrap();
    log.clear();
    drop(program);

    let pipeline = log.position(CallKind::DestroyPipeline).unwrap();
    let first_shader = log.position(CallKind::DestroyShader).unwrap();
    assert!(pipeline < first_shader);
    assert_eq!(log.count(CallKind::DestroyShader), 2);
    assert!(log.violations().is_empty(), "{:?}", log.violations());
}

#[test]
fn switching_programs_tears_down_in_dependency_order() {
    let log = CallLog::new();
    let mut context = context(&log, 320, 200);
    context.use_program(FractalKind::Mandelbrot).unwrap();
    log.clear();
    context.use_program(FractalKind::Julia5).unwrap();

    let unset = log.position(CallKind::SetPipeline).unwrap();
    let destroy_pipeline = log.position(CallKind::DestroyPipeline).unwrap();
    let destroy_shader = log.position(CallKind::DestroyShader).unwrap();
    let compile = log.position(CallKind::CompileShader).unwrap();
    assert!(unset < destroy_pipeline);
    assert!(destroy_pipeline < destroy_shader);
    assert!(destroy_shader < compile);
    assert!(log.violations().is_empty(), "{:?}", log.violations());
}

#[test]
fn frame_target_only_grows() {
    let log = CallLog::new();
    let mut context = context(&log, 800, 600);
    assert_eq!(frame_target_sizes(&log), vec![(800, 600)]);

    for (width, height) in [(640, 480), (800, 600), (320, 200), (800, 1)] {
        context.window().set_client_size(width, height);
        context.resize().unwrap();
    }
    assert_eq!(frame_target_sizes(&log), vec![(800, 600)]);
    assert_eq!(context.size(), (800, 1));

    context.window().set_client_size(1024, 600);
    context.resize().unwrap();
    assert_eq!(frame_target_sizes(&log), vec![(800, 600), (1024, 600)]);

    context.window().set_client_size(800, 768);
    context.resize().unwrap();
    assert_eq!(
        frame_target_sizes(&log),
        vec![(800, 600), (1024, 600), (1024, 768)]
    );
    assert_eq!(log.count(CallKind::DestroyFrameTarget), 2);
    assert!(log.violations().is_empty(), "{:?}", log.violations());
}

#[test]
fn blit_covers_the_client_area_not_the_allocation() {
    let log = CallLog::new();
    let mut context = context(&log, 800, 600);
    context.window().set_client_size(400, 300);
    context.resize().unwrap();
    context.use_program(FractalKind::Mandelbrot).unwrap();
    context.draw().unwrap();
    context.swap_buffers().unwrap();

    let blit = log
        .calls()
        .into_iter()
        .find_map(|call| match call {
            DriverCall::Blit(request) => Some(request),
            _ => None,
        })
        .unwrap();
    assert_eq!((blit.width, blit.height), (400, 300));
}

#[test]
fn repeated_selection_builds_once() {
    let log = CallLog::new();
    let mut context = context(&log, 320, 200);

    context.use_program(FractalKind::Julia1).unwrap();
    context.use_program(FractalKind::Julia1).unwrap();
    assert_eq!(log.count(CallKind::CreatePipeline), 1);
    assert_eq!(log.count(CallKind::CompileShader), 2);

    context.use_palette(PaletteKind::Green).unwrap();
    context.use_palette(PaletteKind::Green).unwrap();
    assert_eq!(log.count(CallKind::CreateTexture), 1);

    context.use_palette(PaletteKind::Red).unwrap();
    assert_eq!(log.count(CallKind::CreateTexture), 2);
    assert_eq!(log.count(CallKind::DestroyTexture), 1);

    context.use_program(FractalKind::Julia2).unwrap();
    assert!(log.violations().is_empty(), "{:?}", log.violations());
}

#[test]
fn pan_accumulates_until_reset() {
    let log = CallLog::new();
    let mut context = context(&log, 320, 200);
    context.use_program(FractalKind::Mandelbrot).unwrap();

    let deltas = [(0.5, 0.25), (0.25, -0.5), (-0.125, 0.0)];
    let mut expected = Vertex::ZERO;
    for (dx, dy) in deltas {
        context.set_position(dx, dy);
        context.draw().unwrap();
        expected = expected + Vertex::new(dx, dy);
        assert_eq!(context.resolved_point(), Some(expected));
    }

    context.reset();
    context.set_position(0.25, 0.25);
    context.draw().unwrap();
    assert_eq!(context.resolved_point(), Some(Vertex::new(0.25, 0.25)));
}

#[test]
fn vertex_uniforms_carry_the_resolved_point() {
    let log = CallLog::new();
    let mut context = context(&log, 320, 200);
    context.use_program(FractalKind::Mandelbrot).unwrap();
    context.set_zoom(2.0);
    context.set_position(0.5, 0.0);
    context.draw().unwrap();
    context.set_position(0.5, 0.0);
    context.draw().unwrap();

    let written: Vec<[f32; 4]> = log
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            DriverCall::UnlockBuffer { bytes, .. } if bytes.len() == 16 => {
                Some(bytemuck::pod_read_unaligned::<[f32; 4]>(&bytes))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        written.last().copied(),
        Some([0.0, 2.0, 1.0, 0.0]),
        "{written:?}"
    );
}
