//! Bodies owned by systems.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    pool::SlotIndex,
    render::{DrawableId, LightId},
    rigid::{Mass, RigidBody},
    system::SystemId,
};

/// A massed, orientable object living in exactly one system's pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: Arc<str>,
    pub rigid: RigidBody,
    /// Back-reference to a renderable, if any.
    pub drawable: Option<DrawableId>,
    /// Back-reference to a light source, if any.
    pub light: Option<LightId>,
}

impl Body {
    pub fn new(name: impl Into<Arc<str>>, mass: Mass) -> Self {
        Self {
            name: name.into(),
            rigid: RigidBody::new(mass),
            drawable: None,
            light: None,
        }
    }

    pub fn mass(&self) -> f64 {
        self.rigid.mass.mass
    }
}

/// Stable reference to a body: the owning system and the generation-checked
/// slot within its pool. Invalidated by migration and removal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle {
    pub system: SystemId,
    pub slot: SlotIndex,
}
