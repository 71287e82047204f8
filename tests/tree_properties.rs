//! Randomised checks of containment, routing and tree coverage

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quadswarm::polygon::contains_point;
use quadswarm::prelude::*;
use quadswarm::quadtree::Quadrant;

fn random_particles(count: usize, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let position = [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)];
            let velocity = [rng.random_range(-0.5..0.5), rng.random_range(-0.5..0.5)];
            Particle::active(position, velocity)
        })
        .collect()
}

fn populated(threads: usize, particles: &[Particle]) -> (CpuBackend, TreeCounts) {
    let config = SimulationConfig::new()
        .with_max_particles(particles.len() as u32)
        .with_max_nodes(16_384)
        .with_cpu_threads(threads);
    let mut backend = CpuBackend::new(config).unwrap();
    backend.upload_particles(particles);
    backend.reset_quadtree(NodeBounds::new(-1.0, 1.0, 1.0, -1.0));
    let counts = backend.populate_quadtree().unwrap();
    (backend, counts)
}

#[test]
fn test_single_worker_stores_every_particle() {
    let particles = random_particles(4_000, 11);
    let (mut backend, counts) = populated(1, &particles);
    assert_eq!(counts.particles_in_tree, 4_000);

    let snapshot = backend.read_quadtree().unwrap();
    let report = snapshot.check(&particles);
    assert!(report.is_complete(), "{:?}", report);
    assert_eq!(report.stored, 4_000);
}

#[test]
fn test_parallel_workers_keep_tree_consistent() {
    let particles = random_particles(20_000, 23);
    let (mut backend, counts) = populated(8, &particles);

    let snapshot = backend.read_quadtree().unwrap();
    let report = snapshot.check(&particles);
    assert!(report.is_consistent(), "{:?}", report);
    assert_eq!(counts.particles_in_tree, snapshot.stored_particles());
    assert_eq!(counts.particles_in_tree as usize + report.missing.len(), 20_000);
    assert_eq!(counts.nodes_in_use as usize, snapshot.in_use_count());
}

#[test]
fn test_update_retires_exactly_the_escaped() {
    let region = PolygonRegion::demo();
    let particles = random_particles(2_000, 5);
    let config = SimulationConfig::new()
        .with_max_particles(2_000)
        .with_max_nodes(64)
        .with_cpu_threads(4);
    let mut backend = CpuBackend::new(config).unwrap();
    backend.upload_faces(region.faces());
    backend.upload_particles(&particles);

    let active = backend.update_particles(0.1).unwrap();
    let updated = backend.read_particles().unwrap();
    let mut expected = 0;
    for (before, after) in particles.iter().zip(&updated) {
        let mut moved = *before;
        moved.integrate(0.1);
        assert_eq!(after.position, moved.position);
        let inside = region.contains(moved.position_2d());
        assert_eq!(after.is_active(), inside);
        expected += inside as u32;
    }
    assert_eq!(active, expected);
}

proptest! {
    #[test]
    fn prop_containment_is_deterministic(
        x in -1.5f32..1.5,
        y in -1.5f32..1.5,
        angle in 0.0f32..360.0,
    ) {
        let mut region = PolygonRegion::demo();
        region.set_transform(&Matrix4::from_angle_z(Deg(angle)));
        let faces = region.faces();
        let inside = contains_point(faces, [x, y]);
        prop_assert_eq!(inside, contains_point(faces, [x, y]));
        prop_assert_eq!(inside, faces.iter().all(|f| f.signed_distance([x, y]) <= 0.0));
    }

    #[test]
    fn prop_point_routes_to_exactly_one_child(
        left in -10.0f32..10.0,
        bottom in -10.0f32..10.0,
        width in 0.01f32..5.0,
        height in 0.01f32..5.0,
        u in 0.0f32..=1.0,
        v in 0.0f32..=1.0,
    ) {
        let bounds = NodeBounds::new(left, bottom + height, left + width, bottom);
        let point = [left + u * width, bottom + v * height];
        prop_assume!(bounds.contains(point));

        let quadrant = bounds.quadrant_of(point);
        prop_assert!(bounds.child(quadrant).contains(point));
        prop_assert_eq!(bounds.quadrant_of(point), quadrant);

        let [cx, cy] = bounds.center();
        if point[0] != cx && point[1] != cy {
            let holders = Quadrant::ALL
                .iter()
                .filter(|q| bounds.child(**q).contains(point))
                .count();
            prop_assert_eq!(holders, 1);
        }
    }
}
