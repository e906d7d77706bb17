use approx::assert_relative_eq;
use nalgebra::Vector3;
use orbsim::{
    config::{CelestialRecord, SpacecraftRecord},
    loader::{self, LoadOptions},
    render::NullSink,
    sim::Simulation,
    time::SimClock,
};

const SOL: &str = r#"
    name = "Sol"

    [physical]
    mass = 1.98892e30
    radius = 695500000.0

    [[satellites]]
    name = "Earth"

    [satellites.physical]
    mass = 5.9736e24
    radius = 6371000.0

    [satellites.orbit]
    semimajor-axis = 1.00000261
    eccentricity = 0.01671123
    inclination = -0.00001531
    longitude-ascending-node = 0.0
    longitude-periapsis = 102.93768193
    mean-longitude = 100.46457166
"#;

const PROBE: &str = r#"
    name = "Probe"
    system = "Sol/Earth"

    [[stages]]
    name = "Core"
    detach-order = 0
    mass = { mass = 500.0, inertia = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0] }
"#;

fn sim() -> Simulation {
    let root: CelestialRecord = toml::from_str(SOL).unwrap();
    let world = loader::load_world("sol", &root, &LoadOptions::default()).unwrap();
    Simulation::new(world, SimClock::j2000())
}

fn probe(system: &str, position: Vector3<f64>, velocity: Vector3<f64>) -> SpacecraftRecord {
    let mut rec: SpacecraftRecord = toml::from_str(PROBE).unwrap();
    rec.system = system.into();
    rec.position = position.into();
    rec.velocity = velocity.into();
    rec
}

#[test]
fn leaving_earth_moves_the_spacecraft_to_sol() {
    let mut sim = sim();
    let sol = sim.world.root_id();
    let earth = sim.world.lookup("Sol/Earth").unwrap();
    let soi = sim.world.system(earth).unwrap().soi;

    let position = Vector3::new(soi - 1000.0, 0.0, 0.0);
    let velocity = Vector3::new(10_000.0, 0.0, 0.0);
    let id = sim
        .load_spacecraft(&probe("Sol/Earth", position, velocity))
        .unwrap();
    let old = sim.spacecraft(id).unwrap().body;

    let report = sim.step(1.0, &mut NullSink);
    assert_eq!(report.migrations, 1);
    assert!(report.errors.is_empty());

    let sc = sim.spacecraft(id).unwrap();
    assert_eq!(sc.body.system, sol);
    assert_ne!(sc.body, old);
    assert!(sim.world.body(old).is_err());
    assert_eq!(sim.world.system(earth).unwrap().bodies.len(), 0);

    // Re-expressed relative to Sol: Earth's offset and velocity are added.
    let e = sim.world.system(earth).unwrap();
    let body = sim.world.body(sc.body).unwrap();
    let local = body.rigid.position - e.local_position;
    assert_relative_eq!(local, position + velocity, epsilon = 1.0);
    assert_relative_eq!(body.rigid.velocity - e.local_velocity, velocity, epsilon = 1e-2);
}

#[test]
fn approaching_earth_moves_the_spacecraft_into_it() {
    let mut sim = sim();
    let earth = sim.world.lookup("Sol/Earth").unwrap();
    let e = sim.world.system(earth).unwrap();
    let offset = Vector3::new(0.0, e.soi * 0.5, 0.0);
    let position = e.local_position + offset;
    let velocity = e.local_velocity;
    let id = sim.load_spacecraft(&probe("Sol", position, velocity)).unwrap();

    let report = sim.step(1.0, &mut NullSink);
    assert_eq!(report.migrations, 1);
    let sc = sim.spacecraft(id).unwrap();
    assert_eq!(sim.world.path_of(sc.body.system).unwrap(), "Sol/Earth");

    let body = sim.world.body(sc.body).unwrap();
    // Earth's orbit is evaluated once per step, so the probe drifts by at
    // most one step of orbital motion relative to it.
    assert!((body.rigid.position - offset).norm() < 1.0e5);
    assert!(body.rigid.velocity.norm() < 100.0);
}

#[test]
fn crossings_wait_when_auto_migration_is_off() {
    let mut sim = sim();
    sim.auto_migrate = false;
    let earth = sim.world.lookup("Sol/Earth").unwrap();
    let soi = sim.world.system(earth).unwrap().soi;
    let id = sim
        .load_spacecraft(&probe(
            "Sol/Earth",
            Vector3::new(soi * 1.5, 0.0, 0.0),
            Vector3::zeros(),
        ))
        .unwrap();

    let report = sim.step(1.0, &mut NullSink);
    assert_eq!(report.migrations, 0);
    assert_eq!(sim.spacecraft(id).unwrap().body.system, earth);
    assert_eq!(sim.world.soi_transitions().len(), 1);
}
