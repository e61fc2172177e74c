use crate::{
    actuation::Actuators,
    comfort::{self, Curve},
    config::{AdaptiveZoneConfig, ComfortParams, ZoneSettings},
    error::{ConfigError, EvalError},
    types::{DeviceCommand, HvacMode, ZoneKind, ZoneStatus},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneRuntimeState {
    pub setpoint: Option<f32>,
    pub curve: Option<Curve>,
    pub mode: HvacMode,
    pub indoor_temp: Option<f32>,
    pub outdoor_temp: Option<f32>,
    pub humidity: Option<f32>,
    pub available: bool,
    pub stale: bool,
}

// Both band edges belong to `Off`.
pub fn decide_mode(
    t_in: f32,
    setpoint: f32,
    deadband_cool: f32,
    deadband_heat: f32,
    has_heater: bool,
) -> HvacMode {
    if t_in > setpoint + deadband_cool {
        HvacMode::Cool
    } else if t_in < setpoint - deadband_heat {
        if has_heater {
            HvacMode::Heat
        } else {
            HvacMode::Off
        }
    } else {
        HvacMode::Off
    }
}

#[derive(Debug, Clone)]
pub struct AdaptiveEngine {
    config: AdaptiveZoneConfig,
    params: ComfortParams,
    actuators: Actuators,
    state: ZoneRuntimeState,
}

impl AdaptiveEngine {
    pub fn new(config: AdaptiveZoneConfig, settings: &ZoneSettings) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = config.comfort_params(settings);
        params.validate()?;

        let actuators = Actuators {
            climate_entity: config.climate_entity.clone(),
            heater_entity: config.trv_entity.clone(),
            frost_protection_c: config.frost_protection_c,
        };

        Ok(Self {
            config,
            params,
            actuators,
            state: ZoneRuntimeState::default(),
        })
    }

    pub fn config(&self) -> &AdaptiveZoneConfig {
        &self.config
    }

    pub fn params(&self) -> &ComfortParams {
        &self.params
    }

    pub fn state(&self) -> &ZoneRuntimeState {
        &self.state
    }

    pub fn mode(&self) -> HvacMode {
        self.state.mode
    }

    pub fn setpoint(&self) -> Option<f32> {
        self.state.setpoint
    }

    pub fn is_available(&self) -> bool {
        self.state.available
    }

    pub fn apply_settings(&mut self, settings: &ZoneSettings) -> Result<(), ConfigError> {
        let params = self.config.comfort_params(settings);
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn update_humidity(&mut self, humidity: Option<f32>) {
        self.state.humidity = humidity;
    }

    // On error the previous set-point and mode are kept and the zone is
    // flagged unavailable.
    pub fn tick(
        &mut self,
        outdoor: Option<f32>,
        indoor: Option<f32>,
    ) -> Result<Vec<DeviceCommand>, EvalError> {
        let Some(t_out) = outdoor else {
            self.state.stale = true;
            self.state.available = false;
            return Err(EvalError::TransientRead(self.config.temp_out.clone()));
        };

        let (curve, setpoint) = match comfort::adaptive_setpoint(t_out, &self.params) {
            Ok(result) => result,
            Err(err) => {
                self.state.available = false;
                return Err(err.into());
            }
        };

        self.state.outdoor_temp = Some(t_out);
        self.state.curve = Some(curve);
        self.state.setpoint = Some(setpoint);
        self.state.stale = false;
        self.state.available = true;

        self.decide(indoor)
    }

    pub fn indoor_changed(&mut self, indoor: Option<f32>) -> Result<Vec<DeviceCommand>, EvalError> {
        self.decide(indoor)
    }

    pub fn status(&self, enabled: bool, last_update_epoch: Option<i64>) -> ZoneStatus {
        ZoneStatus {
            zone: self.config.name.clone(),
            kind: ZoneKind::Adaptive,
            available: self.state.available,
            stale: self.state.stale,
            enabled,
            mode: self.state.mode.as_str().to_string(),
            setpoint: self.state.setpoint,
            indoor_temp: self.state.indoor_temp,
            outdoor_temp: self.state.outdoor_temp,
            humidity: self.state.humidity,
            last_action: None,
            last_update_epoch,
            settings: None,
        }
    }

    fn decide(&mut self, indoor: Option<f32>) -> Result<Vec<DeviceCommand>, EvalError> {
        let Some(t_in) = indoor else {
            self.state.available = false;
            return Err(EvalError::TransientRead(self.config.temp_in.clone()));
        };
        self.state.indoor_temp = Some(t_in);

        let Some(setpoint) = self.state.setpoint else {
            return Ok(Vec::new());
        };
        self.state.available = !self.state.stale;

        let target = decide_mode(
            t_in,
            setpoint,
            self.params.deadband_cool,
            self.params.deadband_heat,
            self.actuators.has_heater(),
        );
        if target == self.state.mode {
            return Ok(Vec::new());
        }

        self.state.mode = target;
        Ok(self.actuators.commands_for(target, setpoint))
    }
}
