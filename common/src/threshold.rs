use crate::{
    config::ThresholdZoneConfig,
    entity::{EntityStates, STATE_OFF},
    error::{ConfigError, EvalError},
    types::DeviceCommand,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdDecision {
    Disabled,
    InBand {
        temp: f32,
    },
    TurnOn {
        temp: f32,
        max_temp: f32,
        commands: Vec<DeviceCommand>,
    },
    TurnOff {
        temp: f32,
        min_temp: f32,
        commands: Vec<DeviceCommand>,
    },
}

impl ThresholdDecision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::InBand { .. } => "in_band",
            Self::TurnOn { .. } => "turn_on",
            Self::TurnOff { .. } => "turn_off",
        }
    }

    pub fn commanded_mode(&self) -> Option<&str> {
        match self {
            Self::TurnOn { commands, .. } | Self::TurnOff { commands, .. } => {
                commands.iter().find_map(|command| match command {
                    DeviceCommand::SetHvacMode { hvac_mode, .. } => Some(hvac_mode.as_str()),
                    _ => None,
                })
            }
            Self::Disabled | Self::InBand { .. } => None,
        }
    }

    pub fn into_commands(self) -> Vec<DeviceCommand> {
        match self {
            Self::TurnOn { commands, .. } | Self::TurnOff { commands, .. } => commands,
            Self::Disabled | Self::InBand { .. } => Vec::new(),
        }
    }
}

// Stateless: every evaluation starts again from the raw entity states.
#[derive(Debug, Clone)]
pub struct ThresholdEngine {
    config: ThresholdZoneConfig,
}

impl ThresholdEngine {
    pub fn new(config: ThresholdZoneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ThresholdZoneConfig {
        &self.config
    }

    pub fn watched_entities(&self) -> Vec<String> {
        let mut entities = vec![self.config.temperature_sensor.clone()];
        entities.extend(
            [
                &self.config.enabled_entity,
                &self.config.min_temp_entity,
                &self.config.max_temp_entity,
                &self.config.setpoint_entity,
                &self.config.mode_entity,
                &self.config.fan_entity,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        entities
    }

    pub fn is_enabled(&self, states: &EntityStates) -> bool {
        match &self.config.enabled_entity {
            Some(entity_id) => states.is_on(entity_id),
            None => true,
        }
    }

    pub fn evaluate(&self, states: &EntityStates) -> Result<ThresholdDecision, EvalError> {
        if !self.is_enabled(states) {
            return Ok(ThresholdDecision::Disabled);
        }

        let temp = states
            .number(&self.config.temperature_sensor)
            .ok_or_else(|| EvalError::TransientRead(self.config.temperature_sensor.clone()))?;

        let min_temp = self.number_or(states, &self.config.min_temp_entity, self.config.min_temp);
        let max_temp = self.number_or(states, &self.config.max_temp_entity, self.config.max_temp);
        let climate = &self.config.climate_entity;

        if temp > max_temp {
            let setpoint =
                self.number_or(states, &self.config.setpoint_entity, self.config.setpoint);
            let mode = self
                .text(states, &self.config.mode_entity)
                .unwrap_or(self.config.mode.as_str());
            let fan = self
                .text(states, &self.config.fan_entity)
                .or(self.config.fan.as_deref());

            let mut commands = vec![
                DeviceCommand::hvac_mode(climate, mode),
                DeviceCommand::SetTemperature {
                    entity_id: climate.clone(),
                    temperature: setpoint,
                },
            ];
            if let Some(fan_mode) = fan {
                commands.push(DeviceCommand::SetFanMode {
                    entity_id: climate.clone(),
                    fan_mode: fan_mode.to_string(),
                });
            }

            Ok(ThresholdDecision::TurnOn {
                temp,
                max_temp,
                commands,
            })
        } else if temp <= min_temp {
            Ok(ThresholdDecision::TurnOff {
                temp,
                min_temp,
                commands: vec![DeviceCommand::hvac_mode(climate, STATE_OFF)],
            })
        } else {
            Ok(ThresholdDecision::InBand { temp })
        }
    }

    fn number_or(&self, states: &EntityStates, entity_id: &Option<String>, fallback: f32) -> f32 {
        entity_id
            .as_deref()
            .and_then(|id| states.number(id))
            .unwrap_or(fallback)
    }

    fn text<'a>(&self, states: &'a EntityStates, entity_id: &Option<String>) -> Option<&'a str> {
        entity_id.as_deref().and_then(|id| states.state(id))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config() -> ThresholdZoneConfig {
        let mut config =
            ThresholdZoneConfig::new("sala", "climate.sala_ac", "sensor.sala_temperature");
        config.enabled_entity = Some("input_boolean.sala_enabled".to_string());
        config.min_temp_entity = Some("input_number.sala_min".to_string());
        config.max_temp_entity = Some("input_number.sala_max".to_string());
        config.setpoint_entity = Some("input_number.sala_setpoint".to_string());
        config
    }

    fn states(temp: &str, enabled: &str) -> EntityStates {
        let mut states = EntityStates::new();
        states.update("sensor.sala_temperature", temp);
        states.update("input_boolean.sala_enabled", enabled);
        states.update("input_number.sala_min", "18");
        states.update("input_number.sala_max", "26");
        states.update("input_number.sala_setpoint", "24");
        states
    }

    #[test]
    fn above_max_turns_on_cooling_at_setpoint() {
        let engine = ThresholdEngine::new(config()).unwrap();

        let decision = engine.evaluate(&states("27", "on")).unwrap();

        assert_eq!(
            decision.into_commands(),
            vec![
                DeviceCommand::hvac_mode("climate.sala_ac", "cool"),
                DeviceCommand::SetTemperature {
                    entity_id: "climate.sala_ac".to_string(),
                    temperature: 24.0,
                },
            ]
        );
    }

    #[test]
    fn disabled_zone_issues_nothing() {
        let engine = ThresholdEngine::new(config()).unwrap();

        for temp in ["10", "22", "35"] {
            let decision = engine.evaluate(&states(temp, "off")).unwrap();
            assert_eq!(decision, ThresholdDecision::Disabled);
        }
    }

    #[test]
    fn unknown_enable_entity_counts_as_disabled() {
        let engine = ThresholdEngine::new(config()).unwrap();
        let mut states = states("30", "on");
        states.update("input_boolean.sala_enabled", "unavailable");

        assert_eq!(
            engine.evaluate(&states).unwrap(),
            ThresholdDecision::Disabled
        );
    }

    #[test]
    fn at_or_below_min_turns_off() {
        let engine = ThresholdEngine::new(config()).unwrap();

        let decision = engine.evaluate(&states("18", "on")).unwrap();

        assert_eq!(decision.label(), "turn_off");
        assert_eq!(decision.commanded_mode(), Some("off"));
        assert_eq!(
            decision.into_commands(),
            vec![DeviceCommand::hvac_mode("climate.sala_ac", "off")]
        );
    }

    #[test]
    fn inside_band_does_nothing() {
        let engine = ThresholdEngine::new(config()).unwrap();
        assert_eq!(
            engine.evaluate(&states("26", "on")).unwrap(),
            ThresholdDecision::InBand { temp: 26.0 }
        );
    }

    #[test]
    fn unreadable_temperature_aborts() {
        let engine = ThresholdEngine::new(config()).unwrap();
        assert_eq!(
            engine.evaluate(&states("unknown", "on")).unwrap_err(),
            EvalError::TransientRead("sensor.sala_temperature".to_string())
        );
    }

    #[test]
    fn mode_and_fan_selectors_are_applied() {
        let mut config = config();
        config.mode_entity = Some("input_select.sala_mode".to_string());
        config.fan_entity = Some("input_select.sala_fan".to_string());
        let engine = ThresholdEngine::new(config).unwrap();

        let mut states = states("28", "on");
        states.update("input_select.sala_mode", "dry");
        states.update("input_select.sala_fan", "high");

        let decision = engine.evaluate(&states).unwrap();
        assert_eq!(decision.commanded_mode(), Some("dry"));
        assert_eq!(
            decision.into_commands(),
            vec![
                DeviceCommand::hvac_mode("climate.sala_ac", "dry"),
                DeviceCommand::SetTemperature {
                    entity_id: "climate.sala_ac".to_string(),
                    temperature: 24.0,
                },
                DeviceCommand::SetFanMode {
                    entity_id: "climate.sala_ac".to_string(),
                    fan_mode: "high".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unreadable_bounds_fall_back_to_configured_values() {
        let mut config =
            ThresholdZoneConfig::new("sala", "climate.sala_ac", "sensor.sala_temperature");
        config.max_temp_entity = Some("input_number.sala_max".to_string());
        config.max_temp = 25.0;
        let engine = ThresholdEngine::new(config).unwrap();

        let mut states = EntityStates::new();
        states.update("sensor.sala_temperature", "25.5");
        states.update("input_number.sala_max", "unavailable");

        assert_eq!(engine.evaluate(&states).unwrap().label(), "turn_on");
    }

    #[test]
    fn watches_every_configured_entity() {
        let engine = ThresholdEngine::new(config()).unwrap();
        assert_eq!(
            engine.watched_entities(),
            vec![
                "sensor.sala_temperature".to_string(),
                "input_boolean.sala_enabled".to_string(),
                "input_number.sala_min".to_string(),
                "input_number.sala_max".to_string(),
                "input_number.sala_setpoint".to_string(),
            ]
        );
    }
}
