use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("zone name must not be empty")]
    EmptyZoneName,
    #[error("zone `{zone}` is missing required entity `{key}`")]
    MissingEntity { zone: String, key: &'static str },
    #[error("thermal conductance ua_total must be positive, got {0}")]
    NonPositiveConductance(f32),
    #[error("coefficient `{0}` is not a finite number")]
    NonFinite(&'static str),
    #[error("cooling floor tc_min ({tc_min}) is above cooling base tc_base ({tc_base})")]
    CoolingFloorAboveBase { tc_min: f32, tc_base: f32 },
    #[error("dead-band `{name}` must not be negative, got {value}")]
    NegativeDeadband { name: &'static str, value: f32 },
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("zone `{0}` has no adjustable parameters")]
    NotAdjustable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("entity `{0}` is unavailable")]
    TransientRead(String),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{service} on `{entity_id}` failed: {reason}")]
pub struct ActuationError {
    pub service: &'static str,
    pub entity_id: String,
    pub reason: String,
}
