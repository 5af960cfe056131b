use criterion::{criterion_group, criterion_main, Criterion, black_box};

use glam::Vec3;

use voxgi::scene::{Material, Mesh, MeshInstance, SceneRegistry, SceneView};
use voxgi::voxel::{compact, InstanceBuffer, MipAggregator, VolumeLayout, VoxelVolume};
use voxgi::{StrategyKind, Voxelizer, VoxelizerConfig};

/// A dense sphere next to a big ground quad: mostly small triangles plus a
/// couple that go through the large queue
fn bench_scene() -> (SceneRegistry, Vec<MeshInstance>) {
    let mut registry = SceneRegistry::new();
    let flat = registry.add_material(Material::solid("flat", [180, 160, 120, 255])).unwrap();
    let sphere = registry.add_mesh(Mesh::uv_sphere(3.0, 64, 32, flat)).unwrap();
    let ground = registry
        .add_mesh(Mesh::new(
            "ground",
            vec![
                Vec3::new(-8.0, 0.0, -8.0),
                Vec3::new(8.0, 0.0, -8.0),
                Vec3::new(8.0, 0.0, 8.0),
                Vec3::new(-8.0, 0.0, 8.0),
            ],
            vec![0, 2, 1, 0, 3, 2],
            flat,
        ))
        .unwrap();
    let instances = vec![
        MeshInstance::at(ground, Vec3::ZERO),
        MeshInstance::at(sphere, Vec3::new(0.0, 3.5, 0.0)),
    ];
    (registry, instances)
}

fn bench_cycle(c: &mut Criterion, resolution: u32, strategy: StrategyKind) {
    let (registry, instances) = bench_scene();
    let scene = SceneView::new(&registry, &instances);
    let config = VoxelizerConfig::default()
        .with_resolution(resolution)
        .with_strategy(strategy);
    let mut voxelizer = Voxelizer::new(config, scene.bounds()).unwrap();

    c.bench_function(&format!("run_cycle_{}_{}", strategy, resolution), |b| {
        b.iter(|| voxelizer.run_cycle(black_box(&scene)));
    });
}

fn bench_run_cycle_compute_64(c: &mut Criterion) {
    bench_cycle(c, 64, StrategyKind::Compute);
}

fn bench_run_cycle_compute_128(c: &mut Criterion) {
    bench_cycle(c, 128, StrategyKind::Compute);
}

fn bench_run_cycle_projected_128(c: &mut Criterion) {
    bench_cycle(c, 128, StrategyKind::Projected);
}

fn filled_volume(resolution: u32) -> VoxelVolume {
    let layout = VolumeLayout::new(
        voxgi::math::Aabb::new(Vec3::ZERO, Vec3::splat(resolution as f32)),
        resolution,
    )
    .unwrap();
    let volume = VoxelVolume::new(layout);
    let center = Vec3::splat(resolution as f32 * 0.5);
    let radius = resolution as f32 * 0.4;
    for z in 0..resolution {
        for y in 0..resolution {
            for x in 0..resolution {
                let p = Vec3::new(x as f32, y as f32, z as f32) + 0.5;
                if (p.distance(center) - radius).abs() < 1.0 {
                    volume.merge(glam::UVec3::new(x, y, z), [x as u8, y as u8, z as u8]);
                }
            }
        }
    }
    volume
}

fn bench_mip_build_128(c: &mut Criterion) {
    let volume = filled_volume(128);
    let mut mips = MipAggregator::new(volume.layout(), 3);

    c.bench_function("mip_build_128", |b| {
        b.iter(|| mips.build(black_box(&volume)));
    });
}

fn bench_compact_128(c: &mut Criterion) {
    let volume = filled_volume(128);
    let mut instances = InstanceBuffer::new(128 * 128 * 128);

    c.bench_function("compact_128", |b| {
        b.iter(|| {
            instances.reset();
            compact(black_box(&volume), 0, &instances)
        });
    });
}

criterion_group!(
    benches,
    bench_run_cycle_compute_64,
    bench_run_cycle_compute_128,
    bench_run_cycle_projected_128,
    bench_mip_build_128,
    bench_compact_128,
);
criterion_main!(benches);
