//! Voxelize a procedural test scene and report what came out.
//!
//! Usage: cargo run --release --bin voxelize_scene -- [OPTIONS]
//!
//! Options:
//!   --resolution <N>      Grid resolution, power of two up to 1024 (default: 128)
//!   --strategy <NAME>     compute | projected (default: compute)
//!   --cycles <N>          Voxelization cycles to run (default: 3)
//!   --config <PATH>       Load a VoxelizerConfig from JSON first
//!   --export-slice <DIR>  Write a middle Z slice of every mip level as PNG
//!   --gpu                 Upload the volume and instances to a headless GPU
//!   --serve [PORT]        Serve the debug protocol after the cycles (default port: 9743)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3};

use voxgi::core::logging;
use voxgi::render::{GpuContext, GpuInstances, GpuVolume};
use voxgi::scene::{Material, Mesh, MeshInstance, SceneRegistry, SceneView, Texture};
use voxgi::voxel::SliceAxis;
use voxgi::{Error, Result, StrategyKind, Voxelizer, VoxelizerConfig, VoxelizerDebugHandler};
use voxgi_debug::{encode_png, DebugServer, DEFAULT_PORT};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Usage: voxelize_scene [--resolution N] [--strategy compute|projected] [--cycles N]");
        println!("                      [--config PATH] [--export-slice DIR] [--gpu] [--serve [PORT]]");
        return;
    }

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let mut config = match parse_str_arg(args, "--config") {
        Some(path) => VoxelizerConfig::load(&path)?,
        None => VoxelizerConfig::default(),
    };
    if let Some(resolution) = parse_u32_arg(args, "--resolution") {
        config.resolution = resolution;
    }
    if let Some(name) = parse_str_arg(args, "--strategy") {
        config.strategy = name.parse::<StrategyKind>().map_err(Error::InvalidConfig)?;
    }
    let cycles = parse_u32_arg(args, "--cycles").unwrap_or(3).max(1);

    let (registry, instances) = build_scene()?;
    let bounds = registry.bounds(&instances);

    println!("=== voxgi scene voxelizer ===");
    println!("Meshes:     {} ({} instances)", registry.mesh_count(), instances.len());
    println!("Resolution: {}^3", config.resolution);
    println!("Strategy:   {}", config.strategy);
    println!("Cycles:     {}", cycles);
    println!();

    let mut voxelizer = Voxelizer::new(config, bounds)?;
    for _ in 0..cycles {
        let scene = SceneView::new(&registry, &instances);
        let stats = voxelizer.run_cycle(&scene);
        println!(
            "Cycle {}: {} triangles ({} small, {} large, {} projected), {} voxels, {} instances",
            stats.cycle,
            stats.raster.triangles,
            stats.raster.small,
            stats.raster.large,
            stats.raster.projected,
            stats.occupied_voxels,
            stats.instances
        );
        println!(
            "  reset {:.2}ms, voxelize {:.2}ms, mips {:.2}ms, compact {:.2}ms",
            stats.reset_ms, stats.voxelize_ms, stats.mip_ms, stats.compact_ms
        );
    }

    println!();
    for (level, occupied) in voxelizer.volume().occupancy().iter().enumerate() {
        let side = voxelizer.layout().level_resolution(level as u32);
        println!("Level {:>2}: {:>4}^3, {} occupied", level, side, occupied);
    }

    if let Some(dir) = parse_str_arg(args, "--export-slice") {
        export_slices(&voxelizer, Path::new(&dir))?;
    }

    if args.iter().any(|a| a == "--gpu") {
        // A missing adapter is not fatal for the CPU results above
        if let Err(e) = upload_to_gpu(&voxelizer) {
            log::warn!("GPU upload skipped: {}", e);
        }
    }

    if let Some(i) = args.iter().position(|a| a == "--serve") {
        let port = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_PORT);
        serve(VoxelizerDebugHandler::new(voxelizer, registry, instances), port)?;
    }

    Ok(())
}

/// Two spheres, a rotated box, a ground slab and a large textured quad
fn build_scene() -> Result<(SceneRegistry, Vec<MeshInstance>)> {
    let mut registry = SceneRegistry::new();

    let red = registry.add_material(Material::solid("red", [220, 60, 50, 255]))?;
    let green = registry.add_material(Material::solid("green", [70, 200, 90, 255]))?;
    let stone = registry.add_material(Material::solid("stone", [150, 150, 140, 255]))?;
    let checker = registry.add_texture(Texture::checker(8, [240, 240, 240, 255], [40, 40, 160, 255]));
    let wall = registry.add_material(Material::textured("wall", [255, 255, 255, 255], checker))?;

    let sphere = registry.add_mesh(Mesh::uv_sphere(2.0, 48, 24, red))?;
    let small_sphere = registry.add_mesh(Mesh::uv_sphere(1.0, 24, 12, green))?;
    let crate_box = registry.add_mesh(Mesh::cuboid(Vec3::new(1.5, 1.0, 1.0), green))?;
    let ground = registry.add_mesh(Mesh::cuboid(Vec3::new(10.0, 0.25, 10.0), stone))?;
    let quad = registry.add_mesh(
        Mesh::new(
            "wall",
            vec![
                Vec3::new(-10.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 8.0, 0.0),
                Vec3::new(-10.0, 8.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
            wall,
        )
        .with_uvs(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]),
    )?;

    let instances = vec![
        MeshInstance::at(ground, Vec3::new(0.0, -0.25, 0.0)),
        MeshInstance::at(quad, Vec3::new(0.0, 0.0, -9.5)),
        MeshInstance::at(sphere, Vec3::new(-3.0, 2.0, 0.0)),
        MeshInstance::at(small_sphere, Vec3::new(4.0, 1.0, 3.0)),
        MeshInstance::new(
            crate_box,
            Mat4::from_rotation_translation(Quat::from_rotation_y(0.6), Vec3::new(2.5, 1.0, -2.0)),
        ),
    ];

    Ok((registry, instances))
}

fn export_slices(voxelizer: &Voxelizer, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let volume = voxelizer.volume();
    for level in 0..voxelizer.layout().mip_level_count() {
        let view = volume.level(level);
        let index = view.resolution() / 2;
        let Some(image) = view.slice_rgba8(SliceAxis::Z, index) else {
            continue;
        };
        let png = encode_png(image.width, image.height, &image.pixels)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let path: PathBuf = dir.join(format!("level{}_z{}.png", level, index));
        std::fs::write(&path, png)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn upload_to_gpu(voxelizer: &Voxelizer) -> Result<()> {
    let ctx = GpuContext::headless_blocking()?;
    if !ctx.supports_resolution(voxelizer.layout().resolution()) {
        return Err(Error::Gpu(format!(
            "adapter cannot hold a {}^3 texture",
            voxelizer.layout().resolution()
        )));
    }

    let gpu_volume = GpuVolume::new(&ctx.device, voxelizer.layout())?;
    gpu_volume.upload(&ctx.queue, voxelizer.volume())?;

    let gpu_instances = GpuInstances::new(&ctx.device, voxelizer.instances().capacity());
    gpu_instances.upload(&ctx.queue, voxelizer.instances(), voxelizer.draw_args());
    ctx.queue.submit([]);

    println!(
        "Uploaded {} mip levels and {} instances to the GPU",
        gpu_volume.mip_level_count(),
        voxelizer.draw_args().instance_count
    );
    Ok(())
}

/// Serve the debug protocol until Ctrl-C
fn serve(handler: VoxelizerDebugHandler, port: u16) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async move {
        let handler = Arc::new(tokio::sync::Mutex::new(handler));
        let server = DebugServer::bind(handler, &format!("127.0.0.1:{}", port)).await?;
        println!("Debug server on {:?}, Ctrl-C to stop", server.local_addr());
        tokio::signal::ctrl_c().await?;
        server.shutdown();
        Ok::<(), Error>(())
    })
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
