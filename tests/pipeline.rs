use billboard::backends::headless::{DrawCommand, HeadlessDevice};
use billboard::backends::{BufferHint, Primitive};
use billboard::prelude::*;
use billboard::texture::{TextureFilter, TextureWrap};

const VERTEX_SHADER: &str = "\
attribute vec4 position;
attribute vec2 textCoordinate;
varying lowp vec2 varyTextCoord;

void main() {
    varyTextCoord = textCoordinate;
    gl_Position = position;
}
";

const FRAGMENT_SHADER: &str = "\
varying lowp vec2 varyTextCoord;
uniform sampler2D colorMap;

void main() {
    gl_FragColor = texture2D(colorMap, varyTextCoord);
}
";

fn device() -> HeadlessDevice {
    let _ = env_logger::try_init();
    HeadlessDevice::new()
}

/// 2x2 test card, rows top-down: red, green / blue, white.
fn checkerboard() -> ImageSample {
    ImageSample::new(
        Vector2::new(2, 2),
        vec![
            255, 0, 0, 255, 0, 255, 0, 255, // top row
            0, 0, 255, 255, 255, 255, 255, 255, // bottom row
        ],
    )
}

fn solid(color: [u8; 4], dimensions: Vector2<u32>) -> ImageSample {
    let texels = (dimensions.x * dimensions.y) as usize;
    ImageSample::new(
        dimensions,
        color.iter().cloned().cycle().take(texels * 4).collect(),
    )
}

fn params(image: ImageSample) -> PassParams<'static> {
    PassParams {
        vertex_shader: VERTEX_SHADER,
        fragment_shader: FRAGMENT_SHADER,
        vertices: &QUAD_VERTICES,
        image,
    }
}

#[test]
fn compile_link_and_locate() {
    let mut device = device();

    let program = UnlinkedProgram::compile(&mut device, VERTEX_SHADER, FRAGMENT_SHADER)
        .unwrap()
        .link(&mut device)
        .unwrap();

    assert!(program.locate(&mut device, "position").unwrap().is_some());
    assert!(program
        .locate(&mut device, "textCoordinate")
        .unwrap()
        .is_some());
    assert!(program
        .locate_uniform(&mut device, "colorMap")
        .unwrap()
        .is_some());

    // Absent names resolve to None instead of failing.
    assert!(program.locate(&mut device, "normal").unwrap().is_none());
    assert!(program
        .locate_uniform(&mut device, "modelView")
        .unwrap()
        .is_none());

    // Both shader objects were released after attachment.
    assert_eq!(device.stats().shaders.alive(), 0);
}

#[test]
fn compile_failure_reports_stage_and_log() {
    let mut device = device();

    let err = UnlinkedProgram::compile(&mut device, VERTEX_SHADER, "uniform sampler2D colorMap;")
        .unwrap_err();

    match err {
        Error::CompileFailure(stage, log) => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(!log.is_empty());
        }
        err => panic!("expected CompileFailure, got {}", err),
    }

    // No shader or program object survives a failed compile.
    let stats = device.stats();
    assert_eq!(stats.shaders.alive(), 0);
    assert_eq!(stats.programs.created, 0);
}

#[test]
fn link_failure_surfaces_log_and_frees_the_program() {
    let mut device = device();

    let vs = "\
attribute vec4 position;
attribute vec2 textCoordinate;

void main() {
    gl_Position = position;
}
";

    let err = UnlinkedProgram::compile(&mut device, vs, FRAGMENT_SHADER)
        .unwrap()
        .link(&mut device)
        .unwrap_err();

    match err {
        Error::LinkFailure(log) => assert!(log.contains("varyTextCoord")),
        err => panic!("expected LinkFailure, got {}", err),
    }

    assert_eq!(device.stats().programs.alive(), 0);
}

#[test]
fn slot_lookup_before_link_is_refused() {
    let mut device = device();

    unsafe {
        let vs = device
            .compile_shader(ShaderStage::Vertex, VERTEX_SHADER)
            .unwrap();
        let fs = device
            .compile_shader(ShaderStage::Fragment, FRAGMENT_SHADER)
            .unwrap();
        let program = device.create_program(vs, fs).unwrap();

        match device.attribute_location(program, "position") {
            Err(Error::PreconditionViolation(_)) => {}
            v => panic!("expected PreconditionViolation, got {:?}", v),
        }
    }
}

#[test]
fn geometry_upload_is_idempotent() {
    let mut device = device();

    let geometry = GeometryBuffer::upload(&mut device, &QUAD_VERTICES).unwrap();
    let (hint, bytes) = device.vertex_buffer(geometry.id()).unwrap();
    assert_eq!(hint, BufferHint::Dynamic);
    assert_eq!(bytes.len(), 6 * 5 * 4);
    let first = bytes.to_vec();

    geometry.refresh(&mut device, &QUAD_VERTICES).unwrap();
    geometry.refresh(&mut device, &QUAD_VERTICES).unwrap();

    let (_, second) = device.vertex_buffer(geometry.id()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn texture_load_applies_sampling_parameters_and_flip() {
    let mut device = device();

    let texture = TextureLoader::load(&mut device, checkerboard()).unwrap();
    assert_eq!(texture.dimensions(), Vector2::new(2, 2));

    let (params, texels) = device.texture(texture.id()).unwrap();
    assert_eq!(params.filter, TextureFilter::Linear);
    assert_eq!(params.wrap, TextureWrap::Clamp);
    assert_eq!(params.dimensions, Vector2::new(2, 2));

    // Texel row 0 is the image's bottom row after the vertical flip.
    assert_eq!(&texels[..8], &[0, 0, 255, 255, 255, 255, 255, 255][..]);
    assert_eq!(&texels[8..], &[255, 0, 0, 255, 0, 255, 0, 255][..]);
}

#[test]
fn texture_load_failure_produces_nothing() {
    let mut device = device();

    let err = TextureLoader::load(&mut device, ImageSample::new(Vector2::new(0, 2), Vec::new()))
        .unwrap_err();
    match err {
        Error::ImageInvalid(_) => {}
        err => panic!("expected ImageInvalid, got {}", err),
    }

    let short = ImageSample::new(Vector2::new(2, 2), vec![0; 12]);
    assert!(TextureLoader::load(&mut device, short).is_err());

    assert_eq!(device.stats().textures.created, 0);
}

#[test]
fn rebuild_releases_the_previous_target() {
    let mut device = device();
    let surface = Surface::new(Vector2::new(200, 300), 2.0);
    let mut target = FramebufferManager::new();

    target.rebuild(&mut device, &surface).unwrap();
    target.rebuild(&mut device, &surface).unwrap();

    let stats = device.stats();
    assert_eq!(stats.render_buffers.created, 2);
    assert_eq!(stats.frame_buffers.created, 2);
    assert_eq!(stats.render_buffers.alive(), 1);
    assert_eq!(stats.frame_buffers.alive(), 1);

    target.release(&mut device).unwrap();
    // Releasing with nothing held stays a no-op.
    target.release(&mut device).unwrap();

    let stats = device.stats();
    assert_eq!(stats.render_buffers.alive(), 0);
    assert_eq!(stats.frame_buffers.alive(), 0);
}

#[test]
fn execute_renders_the_checkerboard() {
    let mut device = device();

    let mut binder = SurfaceBinder::new();
    let surface = *binder
        .bind(Surface::new(Vector2::new(200, 300), 2.0))
        .unwrap();

    let mut target = FramebufferManager::new();
    target.rebuild(&mut device, &surface).unwrap();

    let mut pass = RenderPass::new();
    let drawn = pass
        .execute(&mut device, &surface, &target, params(checkerboard()))
        .unwrap();
    assert_eq!(drawn, 6);

    // Exactly one draw call of six vertices as a triangle list.
    assert_eq!(
        device.draws(),
        &[DrawCommand {
            primitive: Primitive::Triangles,
            first: 0,
            count: 6,
        }]
    );

    // The sampler uniform points at texture unit 0.
    assert_eq!(device.uniform_writes().last().map(|v| v.1), Some(0));

    // Viewport covers the surface in device pixels; row 0 is the bottom of
    // the displayed image, so the image's top-left lands at UV (0, 1).
    let frame = device.presented().unwrap();
    assert_eq!(frame.dimensions, Vector2::new(400, 600));
    assert_eq!(frame.pixel(0, 599), [255, 0, 0, 255]);
    assert_eq!(frame.pixel(399, 599), [0, 255, 0, 255]);
    assert_eq!(frame.pixel(0, 0), [0, 0, 255, 255]);
    assert_eq!(frame.pixel(399, 0), [255, 255, 255, 255]);
}

#[test]
fn solid_color_round_trip() {
    let mut device = device();
    let surface = Surface::new(Vector2::new(8, 8), 1.0);

    let mut target = FramebufferManager::new();
    target.rebuild(&mut device, &surface).unwrap();

    let mut pass = RenderPass::new();
    pass.execute(
        &mut device,
        &surface,
        &target,
        params(solid([10, 20, 30, 255], Vector2::new(3, 2))),
    )
    .unwrap();

    let frame = device.presented().unwrap();
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(frame.pixel(x, y), [10, 20, 30, 255]);
        }
    }
}

#[test]
fn repeated_execute_reuses_one_generation() {
    let mut device = device();
    let surface = Surface::new(Vector2::new(64, 64), 1.0);

    let mut target = FramebufferManager::new();
    target.rebuild(&mut device, &surface).unwrap();

    let mut pass = RenderPass::new();
    pass.execute(&mut device, &surface, &target, params(checkerboard()))
        .unwrap();

    let stats = device.stats();
    assert_eq!(stats.programs.alive(), 1);
    assert_eq!(stats.buffers.alive(), 1);
    assert_eq!(stats.textures.alive(), 1);

    // Identical inputs: the cached generation is reused untouched.
    pass.execute(&mut device, &surface, &target, params(checkerboard()))
        .unwrap();
    assert_eq!(device.stats(), stats);

    // Changed image: the prior generation is released before the next is
    // built, so nothing accumulates.
    pass.execute(
        &mut device,
        &surface,
        &target,
        params(solid([1, 2, 3, 255], Vector2::new(2, 2))),
    )
    .unwrap();

    let stats = device.stats();
    assert_eq!(stats.programs.alive(), 1);
    assert_eq!(stats.buffers.alive(), 1);
    assert_eq!(stats.textures.alive(), 1);

    pass.release(&mut device).unwrap();
    let stats = device.stats();
    assert_eq!(stats.programs.alive(), 0);
    assert_eq!(stats.buffers.alive(), 0);
    assert_eq!(stats.textures.alive(), 0);
}

#[test]
fn pipeline_runs_through_a_graphics_context() {
    let _ = env_logger::try_init();

    let mut ctx = GraphicsContext::new(billboard::backends::new_headless());
    let mut binder = SurfaceBinder::new();
    let surface = *binder.bind(Surface::new(Vector2::new(4, 4), 1.0)).unwrap();

    let mut target = FramebufferManager::new();
    target.rebuild(ctx.device_mut().unwrap(), &surface).unwrap();

    let mut pass = RenderPass::new();
    let drawn = pass
        .execute(
            ctx.device_mut().unwrap(),
            &surface,
            &target,
            params(checkerboard()),
        )
        .unwrap();
    assert_eq!(drawn, 6);

    pass.release(ctx.device_mut().unwrap()).unwrap();
    target.release(ctx.device_mut().unwrap()).unwrap();
}

#[test]
fn execute_requires_a_built_target() {
    let mut device = device();
    let surface = Surface::new(Vector2::new(64, 64), 1.0);

    let mut pass = RenderPass::new();
    let err = pass
        .execute(
            &mut device,
            &surface,
            &FramebufferManager::new(),
            params(checkerboard()),
        )
        .unwrap_err();

    match err {
        Error::PreconditionViolation(_) => {}
        err => panic!("expected PreconditionViolation, got {}", err),
    }

    assert!(device.presented().is_none());
}

#[test]
fn unresolved_required_attribute_is_fatal() {
    let mut device = device();
    let surface = Surface::new(Vector2::new(64, 64), 1.0);

    let mut target = FramebufferManager::new();
    target.rebuild(&mut device, &surface).unwrap();

    let vs = "\
attribute vec4 position;
varying lowp vec2 varyTextCoord;

void main() {
    gl_Position = position;
    varyTextCoord = position.xy;
}
";

    let mut pass = RenderPass::new();
    let err = pass
        .execute(
            &mut device,
            &surface,
            &target,
            PassParams {
                vertex_shader: vs,
                fragment_shader: FRAGMENT_SHADER,
                vertices: &QUAD_VERTICES,
                image: checkerboard(),
            },
        )
        .unwrap_err();

    match err {
        Error::AttributeUndefined(name) => assert_eq!(name, "textCoordinate"),
        err => panic!("expected AttributeUndefined, got {}", err),
    }

    // The aborted pass left no generation behind and presented nothing.
    assert_eq!(device.stats().programs.alive(), 0);
    assert!(device.draws().is_empty());
    assert!(device.presented().is_none());
}
