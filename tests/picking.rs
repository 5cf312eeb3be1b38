use glam::Mat4;

use quadforge::{
    AttachmentFormat, DriverKind, FramebufferSpec, Quad, RenderContext, RenderSettings, ScenePass,
    ScenePassDesc, EMPTY_OWNER,
};

fn headless_settings() -> RenderSettings {
    RenderSettings {
        driver: DriverKind::Headless,
        ..RenderSettings::default()
    }
}

#[test]
fn cleared_object_id_attachment_reads_the_empty_sentinel() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let target = ctx
        .create_framebuffer(&FramebufferSpec::standard(320, 240))
        .unwrap();
    let attachment = target.object_id_attachment().unwrap();

    target.clear_attachment(ctx.driver(), attachment, EMPTY_OWNER);
    for (x, y) in [(0, 0), (160, 120), (319, 239)] {
        assert_eq!(
            target.read_pixel(ctx.driver(), attachment, x, y),
            EMPTY_OWNER
        );
    }
}

#[test]
fn clear_attachment_roundtrips_an_arbitrary_value() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let target = ctx
        .create_framebuffer(&FramebufferSpec::standard(64, 64))
        .unwrap();
    let attachment = target.object_id_attachment().unwrap();

    target.clear_attachment(ctx.driver(), attachment, 42);
    assert_eq!(target.read_pixel(ctx.driver(), attachment, 10, 10), 42);

    target.clear_attachment(ctx.driver(), attachment, EMPTY_OWNER);
    assert_eq!(
        target.read_pixel(ctx.driver(), attachment, 10, 10),
        EMPTY_OWNER
    );
}

#[test]
fn begin_scene_clears_picking_ids_every_frame() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let target = ctx
        .create_framebuffer(&FramebufferSpec::standard(128, 128))
        .unwrap();
    let attachment = target.object_id_attachment().unwrap();
    // Poison the attachment, then let the pass reset it.
    target.clear_attachment(ctx.driver(), attachment, 7);

    let quad_shader = ctx.create_shader_from_source("quad.wgsl", "").unwrap();
    let line_shader = ctx.create_shader_from_source("line.wgsl", "").unwrap();
    let mut pass = ScenePass::new(
        &mut ctx,
        &settings,
        ScenePassDesc {
            target: target.clone(),
            quad_shader,
            line_shader,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        },
    );

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    pass.submit_quad(&mut ctx, &Quad::default());
    pass.end_scene(&mut ctx);

    assert_eq!(
        target.read_pixel(ctx.driver(), attachment, 64, 64),
        EMPTY_OWNER
    );
}

#[test]
fn resize_recreates_attachments_at_the_new_size() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let target = ctx
        .create_framebuffer(&FramebufferSpec::standard(800, 600))
        .unwrap();
    let attachment = target.object_id_attachment().unwrap();

    target.resize(ctx.driver(), 1920, 1080);
    assert_eq!(target.size(), (1920, 1080));

    // Freshly recreated attachment reads the sentinel anywhere in the
    // new bounds.
    target.clear_attachment(ctx.driver(), attachment, EMPTY_OWNER);
    assert_eq!(
        target.read_pixel(ctx.driver(), attachment, 1919, 1079),
        EMPTY_OWNER
    );
}

#[test]
fn resize_preserves_the_attachment_list() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let target = ctx
        .create_framebuffer(&FramebufferSpec::standard(64, 64))
        .unwrap();

    target.resize(ctx.driver(), 32, 32);
    assert_eq!(
        target.attachments(),
        &[
            AttachmentFormat::Rgba8,
            AttachmentFormat::ObjectId,
            AttachmentFormat::DepthStencil
        ]
    );
    assert_eq!(target.object_id_attachment(), Some(1));
}

#[test]
fn zero_sized_resize_is_ignored() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let target = ctx
        .create_framebuffer(&FramebufferSpec::standard(64, 64))
        .unwrap();

    target.resize(ctx.driver(), 0, 32);
    assert_eq!(target.size(), (64, 64));
}
