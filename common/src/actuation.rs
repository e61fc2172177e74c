use crate::types::{DeviceCommand, HvacMode};

#[derive(Debug, Clone, PartialEq)]
pub struct Actuators {
    pub climate_entity: String,
    pub heater_entity: Option<String>,
    pub frost_protection_c: f32,
}

impl Actuators {
    pub fn has_heater(&self) -> bool {
        self.heater_entity.is_some()
    }

    pub fn commands_for(&self, mode: HvacMode, setpoint: f32) -> Vec<DeviceCommand> {
        match (mode, &self.heater_entity) {
            (HvacMode::Cool, _) => vec![
                DeviceCommand::hvac_mode(&self.climate_entity, HvacMode::Cool.as_str()),
                DeviceCommand::SetTemperature {
                    entity_id: self.climate_entity.clone(),
                    temperature: setpoint,
                },
            ],
            (HvacMode::Heat, Some(heater)) => vec![DeviceCommand::SetValue {
                entity_id: heater.clone(),
                value: setpoint,
            }],
            (HvacMode::Heat, None) | (HvacMode::Off, _) => {
                let mut commands = vec![DeviceCommand::hvac_mode(
                    &self.climate_entity,
                    HvacMode::Off.as_str(),
                )];
                if let Some(heater) = &self.heater_entity {
                    commands.push(DeviceCommand::SetValue {
                        entity_id: heater.clone(),
                        value: self.frost_protection_c,
                    });
                }
                commands
            }
        }
    }
}
