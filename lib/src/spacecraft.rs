//! Spacecraft made of detachable stages.
//!
//! A spacecraft is a single [`Body`](crate::bodies::Body) whose mass is
//! the composition of its attached stages. Stages are kept sorted by
//! detach order; the active stage is the first one not yet detached.

use std::sync::Arc;

use itertools::Itertools;
use nalgebra::Vector3;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    bodies::BodyHandle,
    error::{PhysicsError, Result},
    rigid::{Mass, RigidBody},
};

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    TryFromPrimitive,
    IntoPrimitive,
)]
#[repr(u8)]
#[serde(rename_all = "kebab-case")]
pub enum EngineState {
    #[default]
    Disabled = 0,
    Armed = 1,
    Burning = 2,
    /// Stuck on: produces full thrust whatever the throttle says.
    FaultOpen = 3,
    /// Stuck off.
    FaultClosed = 4,
}

impl EngineState {
    pub fn is_faulted(self) -> bool {
        matches!(self, Self::FaultOpen | Self::FaultClosed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub name: Arc<str>,
    pub state: EngineState,
    /// In `[0, 1]`.
    pub throttle: f64,
    /// A locked engine can no longer be armed.
    pub locked: bool,
    /// Mount point relative to the stage offset (m).
    pub mount: Vector3<f64>,
    /// Rated force at full throttle (N, body frame).
    pub force: Vector3<f64>,
}

impl Engine {
    pub fn new(name: impl Into<Arc<str>>, mount: Vector3<f64>, force: Vector3<f64>) -> Self {
        Self {
            name: name.into(),
            state: EngineState::Disabled,
            throttle: 0.0,
            locked: false,
            mount,
            force,
        }
    }

    /// Returns whether the engine is now armed or burning.
    pub fn arm(&mut self) -> bool {
        if self.locked || self.state.is_faulted() {
            return false;
        }
        if self.state == EngineState::Disabled {
            self.state = EngineState::Armed;
        }
        true
    }

    /// Returns whether the engine is now burning.
    pub fn fire(&mut self) -> bool {
        if self.state == EngineState::Armed {
            self.state = EngineState::Burning;
        }
        self.state == EngineState::Burning
    }

    pub fn cut(&mut self) {
        if self.state == EngineState::Burning {
            self.state = EngineState::Armed;
        }
    }

    pub fn disable(&mut self) {
        self.state = EngineState::Disabled;
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn fail_open(&mut self) {
        self.state = EngineState::FaultOpen;
    }

    pub fn fail_closed(&mut self) {
        self.state = EngineState::FaultClosed;
    }

    /// Clamped to `[0, 1]`. NaN is rejected.
    pub fn set_throttle(&mut self, throttle: f64) -> Result<()> {
        if throttle.is_nan() {
            return Err(PhysicsError::invalid_config(&*self.name, "throttle is NaN"));
        }
        self.throttle = throttle.clamp(0.0, 1.0);
        Ok(())
    }

    /// Force this engine currently produces, in the body frame.
    pub fn thrust(&self) -> Vector3<f64> {
        match self.state {
            EngineState::Burning => self.force * self.throttle,
            EngineState::FaultOpen => self.force,
            EngineState::Disabled | EngineState::Armed | EngineState::FaultClosed => {
                Vector3::zeros()
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    #[default]
    Attached,
    DetachCommanded,
    Detaching,
    Detached,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: Arc<str>,
    pub state: StageState,
    /// Mass in the spacecraft frame, already moved to the stage offset.
    pub mass: Mass,
    /// Stage reference point in the spacecraft frame (m).
    pub offset: Vector3<f64>,
    pub engines: Vec<Engine>,
    pub detach_order: u32,
    pub primary_engine: Option<usize>,
    pub separation_force: Vector3<f64>,
}

impl Stage {
    pub fn is_attached(&self) -> bool {
        matches!(self.state, StageState::Attached | StageState::DetachCommanded)
    }

    pub fn disable_engines(&mut self) {
        self.engines.iter_mut().for_each(Engine::disable);
    }

    pub fn lock_engines(&mut self) {
        self.engines.iter_mut().for_each(Engine::lock);
    }

    pub fn primary_engine_mut(&mut self) -> Option<&mut Engine> {
        self.primary_engine.and_then(|i| self.engines.get_mut(i))
    }
}

/// What separated from a spacecraft, for the caller to turn into debris
/// and a completion event.
#[derive(Clone, Debug, PartialEq)]
pub struct DetachedStage {
    pub index: usize,
    pub name: Arc<str>,
    pub mass: Mass,
    pub separation_force: Vector3<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spacecraft {
    pub name: Arc<str>,
    pub body: BodyHandle,
    pub stages: Vec<Stage>,
    pub active_stage: usize,
    pub detach_possible: bool,
    pub detach_complete: bool,
    /// Seconds between separation and [`Spacecraft::complete_detach`].
    pub separation_delay: f64,
}

impl Spacecraft {
    pub fn new(
        name: impl Into<Arc<str>>,
        body: BodyHandle,
        stages: Vec<Stage>,
        separation_delay: f64,
    ) -> Self {
        let stages = stages
            .into_iter()
            .sorted_by_key(|s| s.detach_order)
            .collect_vec();
        Self {
            name: name.into(),
            body,
            detach_possible: stages.len() > 1,
            detach_complete: true,
            stages,
            active_stage: 0,
            separation_delay,
        }
    }

    pub fn active_stage(&self) -> Option<&Stage> {
        self.stages.get(self.active_stage)
    }

    pub fn active_stage_mut(&mut self) -> Option<&mut Stage> {
        self.stages.get_mut(self.active_stage)
    }

    /// Composition of every stage still attached.
    pub fn composite_mass(&self) -> Mass {
        self.stages
            .iter()
            .filter(|s| s.is_attached())
            .fold(Mass::zero(), |mut acc, s| {
                acc.add(&s.mass);
                acc
            })
    }

    pub fn total_mass(&self) -> f64 {
        self.composite_mass().mass
    }

    /// Accumulate the thrust of every burning or stuck-open engine on
    /// attached stages into `body`.
    pub fn apply_thrust(&self, body: &mut RigidBody) {
        let cog = body.mass.cog;
        for stage in self.stages.iter().filter(|s| s.is_attached()) {
            for engine in &stage.engines {
                let thrust = engine.thrust();
                if thrust != Vector3::zeros() {
                    let at = stage.offset + engine.mount - cog;
                    body.apply_force_relative(&at, &thrust);
                }
            }
        }
    }

    /// Request separation of the active stage. It happens on the next step.
    pub fn command_detach(&mut self) -> Result<()> {
        if !self.detach_possible {
            return Err(PhysicsError::DetachUnavailable {
                spacecraft: self.name.to_string(),
            });
        }
        let name = self.name.clone();
        let Some(stage) = self.active_stage_mut() else {
            return Err(PhysicsError::DetachUnavailable {
                spacecraft: name.to_string(),
            });
        };
        info!(spacecraft = %name, stage = %stage.name, "detach commanded");
        stage.state = StageState::DetachCommanded;
        self.detach_possible = false;
        Ok(())
    }

    pub fn detach_pending(&self) -> bool {
        self.active_stage()
            .is_some_and(|s| s.state == StageState::DetachCommanded)
    }

    /// Separate a commanded stage: its engines are disabled and locked, it
    /// stops contributing mass, and the next stage's primary engine is
    /// armed and fired.
    pub fn begin_detach(&mut self) -> Option<DetachedStage> {
        if !self.detach_pending() {
            return None;
        }
        let index = self.active_stage;
        let stage = &mut self.stages[index];
        stage.disable_engines();
        stage.lock_engines();
        stage.state = StageState::Detaching;
        let detached = DetachedStage {
            index,
            name: stage.name.clone(),
            mass: stage.mass,
            separation_force: stage.separation_force,
        };

        self.active_stage += 1;
        if let Some(engine) = self.active_stage_mut().and_then(Stage::primary_engine_mut) {
            if engine.arm() {
                engine.fire();
            }
        }
        self.detach_complete = false;
        info!(spacecraft = %self.name, stage = %detached.name, "detaching stage");
        Some(detached)
    }

    pub fn complete_detach(&mut self, index: usize) {
        if let Some(stage) = self.stages.get_mut(index) {
            stage.state = StageState::Detached;
        }
        self.detach_complete = true;
        self.detach_possible = self.active_stage + 1 < self.stages.len();
        info!(spacecraft = %self.name, "detach complete");
    }

    /// Set the throttle of every engine on the active stage.
    pub fn set_stage_throttle(&mut self, throttle: f64) -> Result<()> {
        if let Some(stage) = self.active_stage_mut() {
            for engine in &mut stage.engines {
                engine.set_throttle(throttle)?;
            }
        }
        Ok(())
    }

    pub fn set_engine_throttle(&mut self, stage: usize, engine: usize, throttle: f64) -> Result<()> {
        self.stages
            .get_mut(stage)
            .and_then(|s| s.engines.get_mut(engine))
            .ok_or(PhysicsError::InvalidHandle {
                what: "engine",
                index: engine,
            })?
            .set_throttle(throttle)
    }

    /// Flip the active stage's primary engine between armed and burning.
    pub fn toggle_main_engine(&mut self) {
        let Some(engine) = self.active_stage_mut().and_then(Stage::primary_engine_mut) else {
            return;
        };
        match engine.state {
            EngineState::Burning => engine.cut(),
            EngineState::Armed => {
                engine.fire();
            }
            EngineState::Disabled => {
                if engine.arm() {
                    engine.fire();
                }
            }
            EngineState::FaultOpen | EngineState::FaultClosed => {}
        }
    }
}
