pub mod actuation;
pub mod adaptive;
pub mod comfort;
pub mod config;
pub mod entity;
pub mod error;
pub mod threshold;
pub mod topics;
pub mod types;

pub use actuation::Actuators;
pub use adaptive::{decide_mode, AdaptiveEngine, ZoneRuntimeState};
pub use comfort::{adaptive_setpoint, tset_cool, tset_heat, Curve};
pub use config::{
    AdaptiveZoneConfig, ComfortParams, NetworkConfig, RuntimeConfig, ThresholdZoneConfig,
    ZoneConfig, ZoneSettings, ZoneSnapshot,
};
pub use entity::{adaptive_entity_states, EntityStates, Reading};
pub use error::{ActuationError, ConfigError, EvalError};
pub use threshold::{ThresholdDecision, ThresholdEngine};
pub use topics::*;
pub use types::{DeviceCommand, HvacMode, ZoneKind, ZoneStatus};
