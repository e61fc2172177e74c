use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComfortParams {
    pub tc_base: f32,
    pub tc_min: f32,
    pub th_base: f32,
    pub k_heat: f32,
    pub deadband_cool: f32,
    pub deadband_heat: f32,
    // W/K
    pub ua_total: f32,
    // W
    pub q_int: f32,
    pub humid_max: u8,
}

impl Default for ComfortParams {
    fn default() -> Self {
        Self {
            tc_base: 25.5,
            tc_min: 23.0,
            th_base: 20.5,
            k_heat: 0.18,
            deadband_cool: 0.5,
            deadband_heat: 0.5,
            ua_total: 30.0,
            q_int: 200.0,
            humid_max: 65,
        }
    }
}

impl ComfortParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("tc_base", self.tc_base),
            ("tc_min", self.tc_min),
            ("th_base", self.th_base),
            ("k_heat", self.k_heat),
            ("deadband_cool", self.deadband_cool),
            ("deadband_heat", self.deadband_heat),
            ("ua_total", self.ua_total),
            ("q_int", self.q_int),
        ];
        if let Some((name, _)) = finite.into_iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConfigError::NonFinite(name));
        }

        if self.ua_total <= 0.0 {
            return Err(ConfigError::NonPositiveConductance(self.ua_total));
        }
        if self.tc_min > self.tc_base {
            return Err(ConfigError::CoolingFloorAboveBase {
                tc_min: self.tc_min,
                tc_base: self.tc_base,
            });
        }
        if self.deadband_cool < 0.0 {
            return Err(ConfigError::NegativeDeadband {
                name: "deadband_cool",
                value: self.deadband_cool,
            });
        }
        if self.deadband_heat < 0.0 {
            return Err(ConfigError::NegativeDeadband {
                name: "deadband_heat",
                value: self.deadband_heat,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub slug: &'static str,
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub unit: Option<&'static str>,
    pub default: f32,
}

impl ParamSpec {
    pub fn coerce(&self, value: f32) -> f32 {
        let clamped = value.clamp(self.min, self.max);
        let steps = ((clamped - self.min) / self.step).round();
        let snapped = (self.min + steps * self.step).clamp(self.min, self.max);
        (snapped * 10_000.0).round() / 10_000.0
    }
}

pub static PARAMS: [ParamSpec; 7] = [
    ParamSpec {
        slug: "temp_min",
        name: "Temp Min",
        min: 16.0,
        max: 26.0,
        step: 0.5,
        unit: Some("°C"),
        default: 23.0,
    },
    ParamSpec {
        slug: "setpoint",
        name: "Set-point",
        min: 18.0,
        max: 30.0,
        step: 0.1,
        unit: Some("°C"),
        default: 25.0,
    },
    ParamSpec {
        slug: "deadband_cool",
        name: "Dead-band Cool",
        min: 0.0,
        max: 5.0,
        step: 0.1,
        unit: Some("°C"),
        default: 0.5,
    },
    ParamSpec {
        slug: "deadband_heat",
        name: "Dead-band Heat",
        min: 0.0,
        max: 5.0,
        step: 0.1,
        unit: Some("°C"),
        default: 0.5,
    },
    ParamSpec {
        slug: "humid_max",
        name: "Humidity Max",
        min: 40.0,
        max: 80.0,
        step: 1.0,
        unit: Some("%"),
        default: 65.0,
    },
    ParamSpec {
        slug: "heat_base",
        name: "Heat Base",
        min: 18.0,
        max: 24.0,
        step: 0.1,
        unit: Some("°C"),
        default: 20.5,
    },
    ParamSpec {
        slug: "k_heat",
        name: "k Heat",
        min: 0.05,
        max: 0.40,
        step: 0.01,
        unit: None,
        default: 0.18,
    },
];

pub fn param_spec(slug: &str) -> Option<&'static ParamSpec> {
    PARAMS.iter().find(|spec| spec.slug == slug)
}

fn param_default(slug: &str) -> f32 {
    param_spec(slug).map(|spec| spec.default).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSettings {
    pub temp_min: f32,
    pub setpoint: f32,
    pub deadband_cool: f32,
    pub deadband_heat: f32,
    pub humid_max: f32,
    pub heat_base: f32,
    pub k_heat: f32,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            temp_min: param_default("temp_min"),
            setpoint: param_default("setpoint"),
            deadband_cool: param_default("deadband_cool"),
            deadband_heat: param_default("deadband_heat"),
            humid_max: param_default("humid_max"),
            heat_base: param_default("heat_base"),
            k_heat: param_default("k_heat"),
        }
    }
}

impl ZoneSettings {
    pub fn get(&self, slug: &str) -> Option<f32> {
        let value = match slug {
            "temp_min" => self.temp_min,
            "setpoint" => self.setpoint,
            "deadband_cool" => self.deadband_cool,
            "deadband_heat" => self.deadband_heat,
            "humid_max" => self.humid_max,
            "heat_base" => self.heat_base,
            "k_heat" => self.k_heat,
            _ => return None,
        };
        Some(value)
    }

    pub fn set(&mut self, slug: &str, value: f32) -> Result<bool, ConfigError> {
        let spec =
            param_spec(slug).ok_or_else(|| ConfigError::UnknownParameter(slug.to_string()))?;
        if !value.is_finite() {
            return Err(ConfigError::NonFinite(spec.slug));
        }

        let coerced = spec.coerce(value);
        let slot = match slug {
            "temp_min" => &mut self.temp_min,
            "setpoint" => &mut self.setpoint,
            "deadband_cool" => &mut self.deadband_cool,
            "deadband_heat" => &mut self.deadband_heat,
            "humid_max" => &mut self.humid_max,
            "heat_base" => &mut self.heat_base,
            _ => &mut self.k_heat,
        };

        if (*slot - coerced).abs() > f32::EPSILON {
            *slot = coerced;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn sanitize(&mut self) {
        for spec in &PARAMS {
            if let Some(current) = self.get(spec.slug) {
                let value = if current.is_finite() {
                    current
                } else {
                    spec.default
                };
                let _ = self.set(spec.slug, value);
            }
        }
    }

    pub fn comfort_params(&self, ua_total: f32, q_int: f32) -> ComfortParams {
        ComfortParams {
            tc_base: self.setpoint,
            tc_min: self.temp_min,
            th_base: self.heat_base,
            k_heat: self.k_heat,
            deadband_cool: self.deadband_cool,
            deadband_heat: self.deadband_heat,
            ua_total,
            q_int,
            humid_max: self.humid_max.round().clamp(0.0, 100.0) as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub settings: ZoneSettings,
    pub enabled: bool,
}

fn default_ua_total() -> f32 {
    30.0
}

fn default_q_int() -> f32 {
    200.0
}

fn default_scan_interval_secs() -> u64 {
    30
}

fn default_frost_protection_c() -> f32 {
    7.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveZoneConfig {
    pub name: String,
    pub temp_in: String,
    pub temp_out: String,
    #[serde(default)]
    pub hum_in: Option<String>,
    pub climate_entity: String,
    #[serde(default)]
    pub trv_entity: Option<String>,
    #[serde(default = "default_ua_total")]
    pub ua_total: f32,
    #[serde(default = "default_q_int")]
    pub q_int: f32,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_frost_protection_c")]
    pub frost_protection_c: f32,
    #[serde(default)]
    pub settings: ZoneSettings,
}

impl AdaptiveZoneConfig {
    pub fn new(
        name: impl Into<String>,
        temp_in: impl Into<String>,
        temp_out: impl Into<String>,
        climate_entity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            temp_in: temp_in.into(),
            temp_out: temp_out.into(),
            hum_in: None,
            climate_entity: climate_entity.into(),
            trv_entity: None,
            ua_total: default_ua_total(),
            q_int: default_q_int(),
            scan_interval_secs: default_scan_interval_secs(),
            frost_protection_c: default_frost_protection_c(),
            settings: ZoneSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyZoneName);
        }
        require_entity(&self.name, "temp_in", &self.temp_in)?;
        require_entity(&self.name, "temp_out", &self.temp_out)?;
        require_entity(&self.name, "climate_entity", &self.climate_entity)?;
        if !self.frost_protection_c.is_finite() {
            return Err(ConfigError::NonFinite("frost_protection_c"));
        }
        self.comfort_params(&self.settings).validate()
    }

    pub fn comfort_params(&self, settings: &ZoneSettings) -> ComfortParams {
        settings.comfort_params(self.ua_total, self.q_int)
    }
}

fn default_min_temp() -> f32 {
    0.0
}

fn default_max_temp() -> f32 {
    99.0
}

fn default_threshold_setpoint() -> f32 {
    24.0
}

fn default_threshold_mode() -> String {
    "cool".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdZoneConfig {
    pub name: String,
    pub climate_entity: String,
    pub temperature_sensor: String,
    #[serde(default)]
    pub enabled_entity: Option<String>,
    #[serde(default)]
    pub min_temp_entity: Option<String>,
    #[serde(default)]
    pub max_temp_entity: Option<String>,
    #[serde(default)]
    pub setpoint_entity: Option<String>,
    #[serde(default)]
    pub mode_entity: Option<String>,
    #[serde(default)]
    pub fan_entity: Option<String>,
    #[serde(default = "default_min_temp")]
    pub min_temp: f32,
    #[serde(default = "default_max_temp")]
    pub max_temp: f32,
    #[serde(default = "default_threshold_setpoint")]
    pub setpoint: f32,
    #[serde(default = "default_threshold_mode")]
    pub mode: String,
    #[serde(default)]
    pub fan: Option<String>,
}

impl ThresholdZoneConfig {
    pub fn new(
        name: impl Into<String>,
        climate_entity: impl Into<String>,
        temperature_sensor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            climate_entity: climate_entity.into(),
            temperature_sensor: temperature_sensor.into(),
            enabled_entity: None,
            min_temp_entity: None,
            max_temp_entity: None,
            setpoint_entity: None,
            mode_entity: None,
            fan_entity: None,
            min_temp: default_min_temp(),
            max_temp: default_max_temp(),
            setpoint: default_threshold_setpoint(),
            mode: default_threshold_mode(),
            fan: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyZoneName);
        }
        require_entity(&self.name, "climate_entity", &self.climate_entity)?;
        require_entity(&self.name, "temperature_sensor", &self.temperature_sensor)?;
        for (name, value) in [
            ("min_temp", self.min_temp),
            ("max_temp", self.max_temp),
            ("setpoint", self.setpoint),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
        }
        Ok(())
    }
}

fn require_entity(zone: &str, key: &'static str, entity_id: &str) -> Result<(), ConfigError> {
    if entity_id.trim().is_empty() {
        return Err(ConfigError::MissingEntity {
            zone: zone.to_string(),
            key,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneConfig {
    Adaptive(AdaptiveZoneConfig),
    Threshold(ThresholdZoneConfig),
}

impl ZoneConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Adaptive(config) => &config.name,
            Self::Threshold(config) => &config.name,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Adaptive(config) => config.validate(),
            Self::Threshold(config) => config.validate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            http_port: default_http_port(),
            zones: Vec::new(),
        }
    }
}
