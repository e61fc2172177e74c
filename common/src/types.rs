use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ZoneSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    #[default]
    Off,
    Cool,
    Heat,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Cool => "cool",
            Self::Heat => "heat",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SetHvacMode { entity_id: String, hvac_mode: String },
    SetTemperature { entity_id: String, temperature: f32 },
    SetFanMode { entity_id: String, fan_mode: String },
    SetValue { entity_id: String, value: f32 },
}

impl DeviceCommand {
    pub fn hvac_mode(entity_id: &str, mode: &str) -> Self {
        Self::SetHvacMode {
            entity_id: entity_id.to_string(),
            hvac_mode: mode.to_string(),
        }
    }

    pub fn domain(&self) -> &'static str {
        match self {
            Self::SetValue { .. } => "number",
            _ => "climate",
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            Self::SetHvacMode { .. } => "set_hvac_mode",
            Self::SetTemperature { .. } => "set_temperature",
            Self::SetFanMode { .. } => "set_fan_mode",
            Self::SetValue { .. } => "set_value",
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Self::SetHvacMode { entity_id, .. }
            | Self::SetTemperature { entity_id, .. }
            | Self::SetFanMode { entity_id, .. }
            | Self::SetValue { entity_id, .. } => entity_id,
        }
    }

    pub fn parameters(&self) -> Value {
        match self {
            Self::SetHvacMode {
                entity_id,
                hvac_mode,
            } => json!({ "entity_id": entity_id, "hvac_mode": hvac_mode }),
            Self::SetTemperature {
                entity_id,
                temperature,
            } => json!({ "entity_id": entity_id, "temperature": temperature }),
            Self::SetFanMode {
                entity_id,
                fan_mode,
            } => json!({ "entity_id": entity_id, "fan_mode": fan_mode }),
            Self::SetValue { entity_id, value } => {
                json!({ "entity_id": entity_id, "value": value })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Adaptive,
    Threshold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatus {
    pub zone: String,
    pub kind: ZoneKind,
    pub available: bool,
    pub stale: bool,
    pub enabled: bool,
    pub mode: String,
    pub setpoint: Option<f32>,
    #[serde(rename = "indoorTemp")]
    pub indoor_temp: Option<f32>,
    #[serde(rename = "outdoorTemp")]
    pub outdoor_temp: Option<f32>,
    pub humidity: Option<f32>,
    #[serde(rename = "lastAction")]
    pub last_action: Option<&'static str>,
    #[serde(rename = "lastUpdateEpoch")]
    pub last_update_epoch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ZoneSettings>,
}

impl ZoneStatus {
    pub fn new(zone: &str, kind: ZoneKind) -> Self {
        Self {
            zone: zone.to_string(),
            kind,
            available: false,
            stale: false,
            enabled: true,
            mode: HvacMode::Off.as_str().to_string(),
            setpoint: None,
            indoor_temp: None,
            outdoor_temp: None,
            humidity: None,
            last_action: None,
            last_update_epoch: None,
            settings: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn commands_map_to_domain_and_service() {
        let cmd = DeviceCommand::SetValue {
            entity_id: "number.quarto_trv".to_string(),
            value: 7.0,
        };
        assert_eq!(cmd.domain(), "number");
        assert_eq!(cmd.service(), "set_value");
        assert_eq!(
            cmd.parameters(),
            json!({ "entity_id": "number.quarto_trv", "value": 7.0 })
        );

        let cmd = DeviceCommand::hvac_mode("climate.quarto", "cool");
        assert_eq!(cmd.domain(), "climate");
        assert_eq!(cmd.entity_id(), "climate.quarto");
    }

    #[test]
    fn status_exposes_slider_values_only_when_present() {
        let mut status = ZoneStatus::new("quarto", ZoneKind::Adaptive);
        let bare = serde_json::to_value(&status).unwrap();
        assert!(bare.get("settings").is_none());
        assert_eq!(bare["mode"], json!("off"));

        let mut settings = ZoneSettings::default();
        settings.deadband_cool = 1.2;
        status.settings = Some(settings);
        let full = serde_json::to_value(&status).unwrap();
        assert_eq!(full["settings"]["deadband_cool"], json!(1.2f32));
    }
}
