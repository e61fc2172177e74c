use std::collections::HashMap;

use crate::config::{ZoneSettings, PARAMS};

pub const ADAPTIVE_INTEGRATION: &str = "thermoadapt";
pub const ENABLED_PARAMETER: &str = "enabled";

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
const STATE_UNKNOWN: &str = "unknown";
const STATE_UNAVAILABLE: &str = "unavailable";

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

pub fn object_id(integration: &str, zone: &str, parameter: &str) -> String {
    format!("{integration}_{}_{parameter}", slugify(zone))
}

pub fn zone_entity_id(domain: &str, integration: &str, zone: &str, parameter: &str) -> String {
    format!("{domain}.{}", object_id(integration, zone, parameter))
}

pub fn adaptive_entity_states(
    zone: &str,
    settings: &ZoneSettings,
    enabled: bool,
) -> Vec<(String, String)> {
    let mut states: Vec<(String, String)> = PARAMS
        .iter()
        .filter_map(|spec| {
            let value = settings.get(spec.slug)?;
            Some((
                zone_entity_id("number", ADAPTIVE_INTEGRATION, zone, spec.slug),
                value.to_string(),
            ))
        })
        .collect();
    states.push((
        zone_entity_id("switch", ADAPTIVE_INTEGRATION, zone, ENABLED_PARAMETER),
        if enabled { STATE_ON } else { STATE_OFF }.to_string(),
    ));
    states
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: Option<f32>,
    pub available: bool,
}

impl Reading {
    pub const UNAVAILABLE: Self = Self {
        value: None,
        available: false,
    };
}

#[derive(Debug, Clone, Default)]
pub struct EntityStates {
    states: HashMap<String, String>,
}

impl EntityStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, entity_id: impl Into<String>, state: impl Into<String>) -> bool {
        let state = state.into();
        match self.states.insert(entity_id.into(), state.clone()) {
            Some(previous) => previous != state,
            None => true,
        }
    }

    pub fn state(&self, entity_id: &str) -> Option<&str> {
        let raw = self.states.get(entity_id)?.trim();
        if raw.is_empty()
            || raw.eq_ignore_ascii_case(STATE_UNKNOWN)
            || raw.eq_ignore_ascii_case(STATE_UNAVAILABLE)
        {
            return None;
        }
        Some(raw)
    }

    pub fn read(&self, entity_id: &str) -> Reading {
        match self.state(entity_id) {
            Some(raw) => Reading {
                value: raw.parse::<f32>().ok().filter(|value| value.is_finite()),
                available: true,
            },
            None => Reading::UNAVAILABLE,
        }
    }

    pub fn number(&self, entity_id: &str) -> Option<f32> {
        self.read(entity_id).value
    }

    pub fn is_on(&self, entity_id: &str) -> bool {
        self.state(entity_id)
            .map(|state| state.eq_ignore_ascii_case(STATE_ON))
            .unwrap_or(false)
    }
}
