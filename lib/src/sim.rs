//! The simulation context.
//!
//! [`Simulation`] owns everything that changes while the simulation runs:
//! the world, the spacecraft, the deferred event queue and the clock. It
//! is passed explicitly to whoever drives or controls the simulation.
//!
//! Input may arrive from other threads through a [`CommandQueue`]; the
//! queue is drained at the start of each step, so force accumulators are
//! only ever touched by the stepping thread.

use std::sync::Arc;

use nalgebra::Vector3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    arena::{Arena, IdLike},
    bodies::{Body, BodyHandle},
    config::SpacecraftRecord,
    error::{PhysicsError, Result},
    events::EventQueue,
    loader,
    math,
    render::RenderSink,
    spacecraft::Spacecraft,
    system::{SystemId, World},
    time::SimClock,
};

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct SpacecraftId(u64);

impl IdLike for SpacecraftId {
    fn from_raw(index: usize) -> Self {
        Self(index as u64)
    }

    fn into_raw(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    DetachComplete { spacecraft: SpacecraftId, stage: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Throttle of every engine on the active stage.
    SetThrottle { spacecraft: SpacecraftId, throttle: f64 },
    SetEngineThrottle {
        spacecraft: SpacecraftId,
        stage: usize,
        engine: usize,
        throttle: f64,
    },
    Detach { spacecraft: SpacecraftId },
    ToggleMainEngine { spacecraft: SpacecraftId },
    ApplyForce { body: BodyHandle, force: Vector3<f64> },
    ApplyForceAt {
        body: BodyHandle,
        position: Vector3<f64>,
        force: Vector3<f64>,
    },
    ApplyForceRelative {
        body: BodyHandle,
        position: Vector3<f64>,
        force: Vector3<f64>,
    },
    ApplyTorque { body: BodyHandle, torque: Vector3<f64> },
}

/// A cloneable, thread-safe handle for queueing commands.
#[derive(Clone, Debug, Default)]
pub struct CommandQueue(Arc<Mutex<Vec<Command>>>);

impl CommandQueue {
    pub fn push(&self, command: Command) {
        self.0.lock().push(command);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    fn drain(&self) -> Vec<Command> {
        std::mem::take(&mut *self.0.lock())
    }
}

/// What happened during one [`Simulation::step`].
#[derive(Debug, Default)]
pub struct StepReport {
    pub events: usize,
    pub commands: usize,
    pub detached: usize,
    pub migrations: usize,
    /// Failures that were reported and skipped.
    pub errors: Vec<PhysicsError>,
}

pub struct Simulation {
    pub world: World,
    spacecraft: Arena<SpacecraftId, Spacecraft>,
    events: EventQueue<SimEvent>,
    pub clock: SimClock,
    commands: CommandQueue,
    /// Move bodies across sphere-of-influence boundaries after each step.
    pub auto_migrate: bool,
}

impl Simulation {
    pub fn new(mut world: World, clock: SimClock) -> Self {
        world.update_positions(clock.julian_date());
        Self {
            world,
            spacecraft: Arena::new(),
            events: EventQueue::new(),
            clock,
            commands: CommandQueue::default(),
            auto_migrate: true,
        }
    }

    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    /// Elapsed simulation time in seconds.
    pub fn now(&self) -> f64 {
        self.clock.elapsed.as_seconds()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn add_spacecraft(&mut self, sc: Spacecraft) -> SpacecraftId {
        self.spacecraft.push(sc)
    }

    pub fn load_spacecraft(&mut self, rec: &SpacecraftRecord) -> Result<SpacecraftId> {
        let sc = loader::load_spacecraft(&mut self.world, rec)?;
        Ok(self.add_spacecraft(sc))
    }

    pub fn spacecraft(&self, id: SpacecraftId) -> Result<&Spacecraft> {
        self.spacecraft.get(id).ok_or(PhysicsError::InvalidHandle {
            what: "spacecraft",
            index: id.into_raw(),
        })
    }

    pub fn spacecraft_mut(&mut self, id: SpacecraftId) -> Result<&mut Spacecraft> {
        self.spacecraft.get_mut(id).ok_or(PhysicsError::InvalidHandle {
            what: "spacecraft",
            index: id.into_raw(),
        })
    }

    pub fn spacecraft_ids(&self) -> impl Iterator<Item = SpacecraftId> {
        self.spacecraft.ids()
    }

    /// Migrate a body and point any spacecraft that owned it at its new slot.
    pub fn migrate(&mut self, dest: SystemId, handle: BodyHandle, rebase: bool) -> Result<BodyHandle> {
        let new = if rebase {
            self.world.migrate_rebased(dest, handle)?
        } else {
            self.world.migrate(dest, handle)?
        };
        for (_, sc) in self.spacecraft.iter_mut() {
            if sc.body == handle {
                sc.body = new;
            }
        }
        Ok(new)
    }

    fn apply_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SetThrottle {
                spacecraft,
                throttle,
            } => self.spacecraft_mut(spacecraft)?.set_stage_throttle(throttle),
            Command::SetEngineThrottle {
                spacecraft,
                stage,
                engine,
                throttle,
            } => self
                .spacecraft_mut(spacecraft)?
                .set_engine_throttle(stage, engine, throttle),
            Command::Detach { spacecraft } => self.spacecraft_mut(spacecraft)?.command_detach(),
            Command::ToggleMainEngine { spacecraft } => {
                self.spacecraft_mut(spacecraft)?.toggle_main_engine();
                Ok(())
            }
            Command::ApplyForce { body, force } => {
                self.world.body_mut(body)?.rigid.apply_force(&force);
                Ok(())
            }
            Command::ApplyForceAt {
                body,
                position,
                force,
            } => {
                self.world
                    .body_mut(body)?
                    .rigid
                    .apply_force_at_position(&position, &force);
                Ok(())
            }
            Command::ApplyForceRelative {
                body,
                position,
                force,
            } => {
                self.world
                    .body_mut(body)?
                    .rigid
                    .apply_force_relative(&position, &force);
                Ok(())
            }
            Command::ApplyTorque { body, torque } => {
                self.world.body_mut(body)?.rigid.apply_torque(&torque);
                Ok(())
            }
        }
    }

    /// Carry out a commanded separation on spacecraft `id`, if any.
    fn process_detach(&mut self, id: SpacecraftId) -> Result<bool> {
        let now = self.now();
        let sc = self
            .spacecraft
            .get_mut(id)
            .ok_or(PhysicsError::InvalidHandle {
                what: "spacecraft",
                index: id.into_raw(),
            })?;
        if !sc.detach_pending() {
            return Ok(false);
        }
        let handle = sc.body;
        // A stale handle must fail before any stage changes state.
        self.world.body(handle)?;
        let Some(detached) = sc.begin_detach() else {
            return Ok(false);
        };
        let composite = sc.composite_mass();
        let debris_name = format!("{} {}", sc.name, detached.name);
        self.events.schedule_in(
            now,
            sc.separation_delay,
            SimEvent::DetachComplete {
                spacecraft: id,
                stage: detached.index,
            },
        );

        let body = &mut self.world.body_mut(handle)?.rigid;
        let old_cog = body.mass.cog;
        body.mass = composite;
        body.apply_force_relative(&Vector3::zeros(), &detached.separation_force);

        let mut debris_mass = detached.mass;
        let stage_cog = debris_mass.cog;
        debris_mass.translate(&-stage_cog);
        let mut debris = Body::new(debris_name, debris_mass);
        debris.rigid.position =
            body.position + math::rotate(&body.orientation, &(stage_cog - old_cog));
        debris.rigid.velocity = body.velocity;
        debris.rigid.orientation = body.orientation;
        debris.rigid.angular_velocity = body.angular_velocity;

        if let Err(e) = self.world.spawn_body(handle.system, debris) {
            warn!(error = %e, "stage debris could not be placed");
        }
        Ok(true)
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Due events are handled first, then queued commands, then staging
    /// and thrust, then the world tree itself. Sphere-of-influence
    /// migrations happen last, once the tree is no longer being stepped.
    ///
    /// A negative or non-finite `dt` is reported and nothing is advanced.
    pub fn step(&mut self, dt: f64, sink: &mut dyn RenderSink) -> StepReport {
        let mut report = StepReport::default();
        if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "refusing to step");
            report.errors.push(PhysicsError::InvalidTimeStep { dt });
            return report;
        }

        for event in self.events.drain_due(self.now()) {
            report.events += 1;
            match event {
                SimEvent::DetachComplete { spacecraft, stage } => {
                    match self.spacecraft_mut(spacecraft) {
                        Ok(sc) => sc.complete_detach(stage),
                        Err(e) => report.errors.push(e),
                    }
                }
            }
        }

        for command in self.commands.drain() {
            report.commands += 1;
            if let Err(e) = self.apply_command(command) {
                warn!(error = %e, "command failed");
                report.errors.push(e);
            }
        }

        for id in self.spacecraft.ids().collect::<Vec<_>>() {
            match self.process_detach(id) {
                Ok(true) => report.detached += 1,
                Ok(false) => {}
                Err(e) => report.errors.push(e),
            }
            let sc = &self.spacecraft[id];
            match self.world.body_mut(sc.body) {
                Ok(body) => sc.apply_thrust(&mut body.rigid),
                Err(e) => report.errors.push(e),
            }
        }

        self.world.step(dt, self.clock.julian_date(), sink);
        self.clock.advance(dt);

        if self.auto_migrate {
            for (handle, dest) in self.world.soi_transitions() {
                match self.migrate(dest, handle, true) {
                    Ok(_) => {
                        report.migrations += 1;
                        debug!(dest = ?dest, "sphere of influence transition");
                    }
                    Err(e) => report.errors.push(e),
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        render::NullSink,
        rigid::Mass,
        spacecraft::{Stage, StageState},
        system::SystemDesc,
    };

    fn sim() -> (Simulation, BodyHandle) {
        let mut world = World::new("test", SystemDesc::new("Root", 0.0, 2));
        let root = world.root_id();
        let h = world.spawn_body(root, Body::new("b", Mass::point(2.0))).unwrap();
        (Simulation::new(world, SimClock::j2000()), h)
    }

    #[test]
    fn commands_from_other_threads_apply_at_step_start() {
        let (mut sim, h) = sim();
        let queue = sim.commands();
        thread::spawn(move || {
            queue.push(Command::ApplyForce {
                body: h,
                force: Vector3::new(4.0, 0.0, 0.0),
            });
        })
        .join()
        .unwrap();
        assert_eq!(sim.commands().len(), 1);

        let report = sim.step(1.0, &mut NullSink);
        assert_eq!(report.commands, 1);
        assert!(report.errors.is_empty());
        let body = sim.world.body(h).unwrap();
        assert_relative_eq!(body.rigid.velocity.x, 2.0);
        assert_eq!(body.rigid.force, Vector3::zeros());
        assert!(sim.commands().is_empty());
    }

    #[test]
    fn bad_commands_are_reported_not_fatal() {
        let (mut sim, _) = sim();
        sim.commands().push(Command::Detach {
            spacecraft: SpacecraftId(7),
        });
        let report = sim.step(1.0, &mut NullSink);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(sim.clock.tick, 1);
    }

    #[test]
    fn non_finite_steps_are_refused() {
        let (mut sim, h) = sim();
        sim.commands().push(Command::ApplyForce {
            body: h,
            force: Vector3::new(1.0, 0.0, 0.0),
        });
        for dt in [f64::NAN, f64::INFINITY, -1.0] {
            let report = sim.step(dt, &mut NullSink);
            assert!(matches!(
                report.errors.as_slice(),
                [PhysicsError::InvalidTimeStep { .. }]
            ));
        }
        assert_eq!(sim.clock.tick, 0);
        assert_eq!(sim.commands().len(), 1);

        let report = sim.step(0.5, &mut NullSink);
        assert!(report.errors.is_empty());
        assert_eq!(sim.clock.tick, 1);
    }

    fn stage(name: &str, order: u32, mass: f64) -> Stage {
        Stage {
            name: name.into(),
            state: StageState::Attached,
            mass: Mass::point(mass),
            offset: Vector3::zeros(),
            engines: Vec::new(),
            detach_order: order,
            primary_engine: None,
            separation_force: Vector3::zeros(),
        }
    }

    #[test]
    fn detach_with_a_stale_body_changes_nothing() {
        let mut world = World::new("test", SystemDesc::new("Root", 0.0, 4));
        let root = world.root_id();
        let h = world.spawn_body(root, Body::new("sc", Mass::point(3.0))).unwrap();
        let mut sim = Simulation::new(world, SimClock::j2000());
        let stages = vec![stage("lower", 0, 2.0), stage("upper", 1, 1.0)];
        let id = sim.add_spacecraft(Spacecraft::new("sc", h, stages, 1.0));
        sim.world.remove_body(h).unwrap();

        sim.commands().push(Command::Detach { spacecraft: id });
        let report = sim.step(1.0, &mut NullSink);
        assert_eq!(report.detached, 0);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, PhysicsError::InvalidHandle { what: "body", .. })));
        assert_eq!(sim.pending_events(), 0);
        let sc = sim.spacecraft(id).unwrap();
        assert_eq!(sc.active_stage, 0);
        assert_eq!(sc.stages[0].state, StageState::DetachCommanded);
        assert_eq!(sc.total_mass(), 3.0);
    }

    #[test]
    fn migration_refreshes_spacecraft_handles() {
        let mut world = World::new("test", SystemDesc::new("Root", 0.0, 2));
        let root = world.root_id();
        let child = world.add_child(root, SystemDesc::new("Child", 0.0, 2)).unwrap();
        let h = world.spawn_body(root, Body::new("sc", Mass::point(1.0))).unwrap();
        let mut sim = Simulation::new(world, SimClock::j2000());
        let id = sim.add_spacecraft(Spacecraft::new("sc", h, Vec::new(), 1.0));
        let new = sim.migrate(child, h, false).unwrap();
        assert_eq!(sim.spacecraft(id).unwrap().body, new);
        assert_eq!(new.system, child);
    }
}
