use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use quadforge::renderer::driver::{Driver, HeadlessDriver, VertexKind};
use quadforge::renderer::MeshVertex;
use quadforge::{
    DriverKind, FramebufferSpec, Material, Quad, RenderContext, RenderSettings, ScenePass,
    ScenePassDesc, Texture,
};

fn headless_settings() -> RenderSettings {
    RenderSettings {
        driver: DriverKind::Headless,
        ..RenderSettings::default()
    }
}

fn scene_pass(ctx: &mut RenderContext, settings: &RenderSettings) -> ScenePass {
    let target = ctx
        .create_framebuffer(&FramebufferSpec::standard(1280, 720))
        .expect("create framebuffer");
    let quad_shader = ctx
        .create_shader_from_source("quad.wgsl", "")
        .expect("create quad shader");
    let line_shader = ctx
        .create_shader_from_source("line.wgsl", "")
        .expect("create line shader");
    ScenePass::new(
        ctx,
        settings,
        ScenePassDesc {
            target,
            quad_shader,
            line_shader,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        },
    )
}

fn colored(ctx: &mut RenderContext, color: [u8; 4]) -> Arc<Texture> {
    ctx.create_texture_rgba8(1, 1, &color, "test texture")
}

fn recorded<'a>(ctx: &'a mut RenderContext) -> &'a HeadlessDriver {
    ctx.driver()
        .as_any()
        .downcast_mut::<HeadlessDriver>()
        .expect("headless driver")
}

#[test]
fn ten_thousand_and_one_quads_issue_exactly_two_draw_calls() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let mut pass = scene_pass(&mut ctx, &settings);
    let texture = colored(&mut ctx, [255, 0, 0, 255]);

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    for _ in 0..10_001 {
        pass.submit_quad(
            &mut ctx,
            &Quad {
                texture: Some(texture.clone()),
                ..Quad::default()
            },
        );
    }
    pass.end_scene(&mut ctx);

    let stats = pass.stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.quads, 10_001);

    // 10,000 quads land in the first call, 1 in the second.
    let draws = recorded(&mut ctx).draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].count, 10_000 * 6);
    assert_eq!(draws[1].count, 6);
}

#[test]
fn end_scene_flushes_pending_geometry() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let mut pass = scene_pass(&mut ctx, &settings);

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    for _ in 0..3 {
        pass.submit_quad(&mut ctx, &Quad::default());
    }
    pass.submit_line(&mut ctx, Vec3::ZERO, Vec3::X, Vec4::ONE, -1);
    assert_eq!(pass.stats().draw_calls, 0);
    pass.end_scene(&mut ctx);

    let stats = pass.stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.quads, 3);
    assert_eq!(stats.lines, 1);
}

#[test]
fn mesh_draws_split_batches_in_submission_order() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let mut pass = scene_pass(&mut ctx, &settings);

    let mesh_shader = ctx
        .create_shader_from_source("mesh.wgsl", "")
        .expect("create mesh shader");
    let triangle = [
        MeshVertex {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
        },
        MeshVertex {
            position: [1.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [1.0, 0.0],
        },
        MeshVertex {
            position: [0.0, 1.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 1.0],
        },
    ];
    let mesh = ctx.create_mesh(&triangle, &[0, 1, 2]);
    let material = Material {
        shader: mesh_shader,
        texture: None,
    };

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    pass.submit_quad(&mut ctx, &Quad::default());
    pass.submit_mesh(&mut ctx, &mesh, &material);
    pass.submit_quad(&mut ctx, &Quad::default());
    pass.end_scene(&mut ctx);

    assert_eq!(pass.stats().draw_calls, 3);
    let kinds: Vec<VertexKind> = recorded(&mut ctx)
        .draws()
        .iter()
        .map(|draw| draw.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![VertexKind::Quad, VertexKind::Mesh, VertexKind::Quad]
    );
}

#[test]
fn repeated_texture_shares_one_slot_across_a_full_table() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let mut pass = scene_pass(&mut ctx, &settings);

    let repeated = colored(&mut ctx, [1, 1, 1, 255]);
    let others: Vec<Arc<Texture>> = (0..14)
        .map(|i| colored(&mut ctx, [i as u8, 0, 0, 255]))
        .collect();

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    // One untextured quad (white, slot 0), then the repeated texture
    // interleaved with 14 distinct ones: exactly 16 slots, one batch.
    pass.submit_quad(&mut ctx, &Quad::default());
    for other in &others {
        pass.submit_quad(
            &mut ctx,
            &Quad {
                texture: Some(repeated.clone()),
                ..Quad::default()
            },
        );
        pass.submit_quad(
            &mut ctx,
            &Quad {
                texture: Some(other.clone()),
                ..Quad::default()
            },
        );
    }
    pass.end_scene(&mut ctx);

    assert_eq!(pass.stats().draw_calls, 1);
    let draws = recorded(&mut ctx).draws();
    assert_eq!(draws[0].bound_textures.len(), 16);
}

#[test]
fn slot_exhaustion_forces_exactly_one_extra_draw() {
    let settings = RenderSettings {
        max_texture_slots: 4,
        ..headless_settings()
    };
    let mut ctx = RenderContext::new(&settings);
    let mut pass = scene_pass(&mut ctx, &settings);

    let textures: Vec<Arc<Texture>> = (0..4)
        .map(|i| colored(&mut ctx, [i as u8, 0, 0, 255]))
        .collect();

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    // White plus three distinct textures fill the 4-slot table in one
    // batch; the fourth distinct texture forces one flush.
    pass.submit_quad(&mut ctx, &Quad::default());
    for texture in &textures[..3] {
        pass.submit_quad(
            &mut ctx,
            &Quad {
                texture: Some(texture.clone()),
                ..Quad::default()
            },
        );
    }
    assert_eq!(pass.stats().draw_calls, 0);
    pass.submit_quad(
        &mut ctx,
        &Quad {
            texture: Some(textures[3].clone()),
            ..Quad::default()
        },
    );
    assert_eq!(pass.stats().draw_calls, 1);
    pass.end_scene(&mut ctx);

    assert_eq!(pass.stats().draw_calls, 2);
}

#[test]
fn stats_reset_each_scene() {
    let settings = headless_settings();
    let mut ctx = RenderContext::new(&settings);
    let mut pass = scene_pass(&mut ctx, &settings);

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    for _ in 0..5 {
        pass.submit_quad(&mut ctx, &Quad::default());
    }
    pass.end_scene(&mut ctx);
    assert_eq!(pass.stats().quads, 5);

    pass.begin_scene(&mut ctx, Mat4::IDENTITY);
    pass.submit_quad(&mut ctx, &Quad::default());
    pass.end_scene(&mut ctx);

    let stats = pass.stats();
    assert_eq!(stats.quads, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.quad_vertices(), 4);
    assert_eq!(stats.quad_indices(), 6);
}
