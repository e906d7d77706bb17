use approx::assert_relative_eq;
use nalgebra::Vector3;
use orbsim::{
    config::SpacecraftRecord,
    error::PhysicsError,
    render::NullSink,
    sim::{Command, Simulation},
    spacecraft::{EngineState, StageState},
    system::{SystemDesc, World},
    time::SimClock,
};

const TWO_STAGE: &str = r#"
    name = "Lifter"
    system = "Void"
    separation-delay = 2.0

    [[stages]]
    name = "Upper"
    detach-order = 1
    offset = [0.0, 0.0, 3.0]
    primary-engine = 0
    mass = { mass = 200.0, inertia = [1.0, 1.0, 0.5, 0.0, 0.0, 0.0], min-mass = 50.0 }

    [[stages.engines]]
    name = "Upper Main"
    mount = [0.0, 0.0, -1.0]
    force = [0.0, 0.0, 400.0]
    throttle = 1.0

    [[stages]]
    name = "Booster"
    detach-order = 0
    offset = [0.0, 0.0, -2.0]
    primary-engine = 0
    separation-force = [0.0, 0.0, 100.0]
    mass = { mass = 1000.0, inertia = [2.0, 2.0, 1.0, 0.0, 0.0, 0.0], min-mass = 100.0 }

    [[stages.engines]]
    name = "Booster Main"
    state = "burning"
    mount = [0.0, 0.0, -2.0]
    force = [0.0, 0.0, 1200.0]
"#;

fn setup() -> (Simulation, orbsim::sim::SpacecraftId) {
    let world = World::new("staging", SystemDesc::new("Void", 0.0, 4));
    let mut sim = Simulation::new(world, SimClock::j2000());
    let rec: SpacecraftRecord = toml::from_str(TWO_STAGE).unwrap();
    let id = sim.load_spacecraft(&rec).unwrap();
    (sim, id)
}

#[test]
fn stages_are_ordered_by_detach_order() {
    let (sim, id) = setup();
    let sc = sim.spacecraft(id).unwrap();
    assert_eq!(&*sc.stages[0].name, "Booster");
    assert_eq!(&*sc.stages[1].name, "Upper");
    assert!(sc.detach_possible);
    assert_eq!(sc.total_mass(), 1200.0);
    assert_eq!(sim.world.body(sc.body).unwrap().mass(), 1200.0);
}

#[test]
fn throttled_engine_accelerates_the_assembly() {
    let (mut sim, id) = setup();
    sim.commands().push(Command::SetThrottle {
        spacecraft: id,
        throttle: 0.5,
    });
    let report = sim.step(1.0, &mut NullSink);
    assert!(report.errors.is_empty());

    let sc = sim.spacecraft(id).unwrap();
    let body = sim.world.body(sc.body).unwrap();
    assert_relative_eq!(body.rigid.velocity, Vector3::new(0.0, 0.0, 0.5), epsilon = 1e-12);
    assert_relative_eq!(body.rigid.angular_velocity.norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn detach_separates_and_completes_after_the_delay() {
    let (mut sim, id) = setup();
    sim.commands().push(Command::Detach { spacecraft: id });

    let report = sim.step(1.0, &mut NullSink);
    assert_eq!(report.detached, 1);
    assert!(report.errors.is_empty());
    assert_eq!(sim.pending_events(), 1);
    {
        let sc = sim.spacecraft(id).unwrap();
        assert_eq!(sc.active_stage, 1);
        assert_eq!(sc.stages[0].state, StageState::Detaching);
        assert!(sc.stages[0].engines.iter().all(|e| e.state == EngineState::Disabled));
        assert_eq!(sc.stages[1].engines[0].state, EngineState::Burning);
        assert_eq!(sc.total_mass(), 200.0);
        assert_eq!(sim.world.body(sc.body).unwrap().mass(), 200.0);
        assert!(!sc.detach_complete);
        assert!(!sc.detach_possible);
    }
    // The spent booster is left behind as its own body.
    assert_eq!(sim.world.root().bodies.len(), 2);

    sim.step(1.0, &mut NullSink);
    assert!(!sim.spacecraft(id).unwrap().detach_complete);

    let report = sim.step(1.0, &mut NullSink);
    assert_eq!(report.events, 1);
    let sc = sim.spacecraft(id).unwrap();
    assert!(sc.detach_complete);
    assert_eq!(sc.stages[0].state, StageState::Detached);
    assert!(!sc.detach_possible, "last stage cannot be dropped");
}

#[test]
fn detaching_the_last_stage_is_refused() {
    let (mut sim, id) = setup();
    sim.commands().push(Command::Detach { spacecraft: id });
    for _ in 0..3 {
        sim.step(1.0, &mut NullSink);
    }
    sim.commands().push(Command::Detach { spacecraft: id });
    let report = sim.step(1.0, &mut NullSink);
    assert!(matches!(
        report.errors.as_slice(),
        [PhysicsError::DetachUnavailable { .. }]
    ));
    assert_eq!(sim.spacecraft(id).unwrap().total_mass(), 200.0);
}

#[test]
fn detached_engines_stay_locked() {
    let (mut sim, id) = setup();
    sim.commands().push(Command::Detach { spacecraft: id });
    sim.step(1.0, &mut NullSink);
    let sc = sim.spacecraft_mut(id).unwrap();
    let engine = &mut sc.stages[0].engines[0];
    assert!(engine.locked);
    assert!(!engine.arm());
    assert_eq!(engine.state, EngineState::Disabled);
}
