use std::rc::Rc;

use hdpick::geometry::{CurveGrid, PointLattice, RippleGrid, SubdivScheme};
use hdpick::{
    Camera, DelegateConfig, Engine, GpuIdPass, IdPass, Mat4, MeshDesc, PickConfig, PickError,
    SceneDelegate, ScenePath, StandardDelegate, TokenRegistry, Vec3,
};

const FRAMES: u32 = 5;

fn path(s: &str) -> ScenePath {
    // Literal paths below are all absolute.
    s.parse().unwrap_or_else(|_| ScenePath::root())
}

fn build_scene(tokens: Rc<TokenRegistry>) -> StandardDelegate {
    let mut delegate = StandardDelegate::new(tokens, DelegateConfig::default());
    delegate.add_default_tasks();

    delegate.add_cube(path("/cube0"), Mat4::from_translation(Vec3::new(-5.0, 0.0, 5.0)));
    delegate.add_cube(path("/cube1"), Mat4::from_translation(Vec3::new(5.0, 0.0, 5.0)));
    delegate.add_spin(&path("/cube0"), 0.0);

    let instancer = path("/instancer");
    delegate.add_instancer(instancer.clone(), Mat4::IDENTITY);
    delegate.add_mesh(
        MeshDesc::cube(path("/instancer/proto"), SubdivScheme::CatmullClark)
            .instancer(instancer.clone()),
    );
    let transforms = [-3.0, 0.0, 3.0]
        .map(|x| Mat4::from_translation(Vec3::new(x, -4.0, 2.0)))
        .to_vec();
    if let Err(e) = delegate.set_instancer_properties(&instancer, vec![0, 0, 0], transforms) {
        log::error!("{e}");
    }

    delegate.add_ripple_grid(path("/ripple"), RippleGrid::new(16, 16));
    delegate.update_transform(&path("/ripple"), Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));
    delegate.add_spin(&path("/ripple"), 0.0);

    delegate.add_points(path("/points"), PointLattice::default());
    delegate.add_basis_curves(path("/curves"), CurveGrid::default());

    let camera = Camera::new().matrices(1.0);
    delegate.set_camera(camera.view, camera.projection);
    delegate
}

fn run<P: IdPass>(pass: P) -> Result<(), PickError> {
    let tokens = Rc::new(TokenRegistry::new());
    let mut delegate = build_scene(tokens.clone());
    let mut engine = Engine::new(tokens, pass, PickConfig::default());

    for frame in 0..FRAMES {
        engine.request_pick(50, 256);
        let ctx = engine.execute_all(&mut delegate)?;
        log::info!(
            "frame {frame}: {} draw items, {} prims synced",
            ctx.draw_items.len(),
            ctx.synced.len()
        );
        match ctx.pick {
            Some(hit) => log::info!(
                "  (50, 256) -> {} instance {} depth {:.4}",
                hit.prim_path,
                hit.instance_index,
                hit.depth
            ),
            None => log::info!("  (50, 256) -> nothing"),
        }
        delegate.advance();
    }

    for (x, y) in [(256, 256), (256, 400), (5, 5)] {
        match engine.pick(x, y) {
            Some(hit) => log::info!(
                "({x}, {y}) -> {} instance {}",
                hit.prim_path,
                hit.instance_index
            ),
            None => log::info!("({x}, {y}) -> nothing"),
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let pass = match GpuIdPass::headless() {
        Ok(pass) => pass,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(pass) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
