use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use thermoadapt_common::{
    entity::{slugify, ADAPTIVE_INTEGRATION, STATE_OFF},
    AdaptiveEngine, AdaptiveZoneConfig, ConfigError, DeviceCommand, EntityStates, EvalError,
    ThresholdDecision, ThresholdEngine, ZoneConfig, ZoneKind, ZoneSettings, ZoneSnapshot,
    ZoneStatus,
};

use crate::{
    sink::{self, CommandSink},
    store::KeyValueStore,
};

const EVENT_QUEUE_DEPTH: usize = 32;

pub type Reply = oneshot::Sender<Result<ZoneStatus, ConfigError>>;

#[derive(Debug)]
pub enum ZoneEvent {
    StateChanged { entity_id: String, value: String },
    SetParam { slug: String, value: f32, reply: Reply },
    SetEnabled { enabled: bool, reply: Reply },
}

pub struct ZoneHandle {
    pub events: mpsc::Sender<ZoneEvent>,
    pub status: watch::Receiver<ZoneStatus>,
    pub watched: HashSet<String>,
    pub task: JoinHandle<()>,
}

pub fn snapshot_key(zone: &str) -> String {
    format!("{ADAPTIVE_INTEGRATION}_{}", slugify(zone))
}

pub async fn spawn_zone(
    config: ZoneConfig,
    sink: Arc<dyn CommandSink>,
    store: Arc<dyn KeyValueStore>,
) -> Result<ZoneHandle, ConfigError> {
    config.validate()?;
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

    match config {
        ZoneConfig::Adaptive(config) => {
            let (settings, enabled) = restore(store.as_ref(), &config).await;
            let (engine, settings) = match AdaptiveEngine::new(config.clone(), &settings) {
                Ok(engine) => (engine, settings),
                Err(err) => {
                    warn!(
                        "zone {}: persisted settings rejected ({err}), using configured ones",
                        config.name
                    );
                    let mut fallback = config.settings;
                    fallback.sanitize();
                    (AdaptiveEngine::new(config.clone(), &fallback)?, fallback)
                }
            };

            let mut watched: HashSet<String> =
                [config.temp_in.clone(), config.temp_out.clone()].into();
            watched.extend(config.hum_in.clone());

            let mut status = engine.status(enabled, None);
            status.settings = Some(settings);
            let (status_tx, status_rx) = watch::channel(status);
            let zone = AdaptiveZone {
                engine,
                settings,
                enabled,
                states: EntityStates::new(),
                last_update: None,
                ctx: ZoneContext {
                    sink,
                    store,
                    status: status_tx,
                },
            };
            info!("zone {} activated (adaptive)", config.name);

            Ok(ZoneHandle {
                events: events_tx,
                status: status_rx,
                watched,
                task: tokio::spawn(zone.run(events_rx)),
            })
        }
        ZoneConfig::Threshold(config) => {
            let engine = ThresholdEngine::new(config)?;
            let watched = engine.watched_entities().into_iter().collect();
            let status = ZoneStatus::new(&engine.config().name, ZoneKind::Threshold);
            let (status_tx, status_rx) = watch::channel(status);
            info!("zone {} activated (threshold)", engine.config().name);

            let zone = ThresholdZone {
                engine,
                states: EntityStates::new(),
                mode: STATE_OFF.to_string(),
                last_action: None,
                last_update: None,
                ctx: ZoneContext {
                    sink,
                    store,
                    status: status_tx,
                },
            };

            Ok(ZoneHandle {
                events: events_tx,
                status: status_rx,
                watched,
                task: tokio::spawn(zone.run(events_rx)),
            })
        }
    }
}

async fn restore(store: &dyn KeyValueStore, config: &AdaptiveZoneConfig) -> (ZoneSettings, bool) {
    let key = snapshot_key(&config.name);
    let snapshot = match store.load(&key).await {
        Ok(Some(value)) => match serde_json::from_value::<ZoneSnapshot>(value) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!("zone {}: ignoring unreadable snapshot: {err}", config.name);
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!("zone {}: failed to load snapshot: {err:#}", config.name);
            None
        }
    };

    match snapshot {
        Some(mut snapshot) => {
            snapshot.settings.sanitize();
            debug!("zone {}: restored snapshot {snapshot:?}", config.name);
            (snapshot.settings, snapshot.enabled)
        }
        None => {
            let mut settings = config.settings;
            settings.sanitize();
            (settings, true)
        }
    }
}

struct ZoneContext {
    sink: Arc<dyn CommandSink>,
    store: Arc<dyn KeyValueStore>,
    status: watch::Sender<ZoneStatus>,
}

impl ZoneContext {
    fn publish(&self, status: ZoneStatus) -> ZoneStatus {
        self.status.send_replace(status.clone());
        status
    }
}

fn reply(reply: Reply, result: Result<ZoneStatus, ConfigError>) {
    // The requester may have given up waiting.
    let _ = reply.send(result);
}

struct AdaptiveZone {
    engine: AdaptiveEngine,
    settings: ZoneSettings,
    enabled: bool,
    states: EntityStates,
    last_update: Option<i64>,
    ctx: ZoneContext,
}

impl AdaptiveZone {
    async fn run(mut self, mut events: mpsc::Receiver<ZoneEvent>) {
        let period = Duration::from_secs(self.engine.config().scan_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.on_tick(),
                event = events.recv() => match event {
                    Some(event) => self.on_event(event).await,
                    None => break,
                },
            }
        }

        info!("zone {} stopped", self.name());
    }

    fn name(&self) -> &str {
        &self.engine.config().name
    }

    fn on_tick(&mut self) {
        if !self.enabled {
            self.publish();
            return;
        }

        let config = self.engine.config();
        let outdoor = self.states.number(&config.temp_out);
        let indoor = self.states.number(&config.temp_in);
        let humidity = config.hum_in.as_deref().and_then(|id| self.states.number(id));

        self.engine.update_humidity(humidity);
        let result = self.engine.tick(outdoor, indoor);
        if result.is_ok() {
            self.last_update = Some(Utc::now().timestamp());
        }
        self.actuate(result);
        self.publish();
    }

    async fn on_event(&mut self, event: ZoneEvent) {
        match event {
            ZoneEvent::StateChanged { entity_id, value } => {
                if !self.states.update(entity_id.as_str(), value) {
                    return;
                }
                let config = self.engine.config();
                if config.hum_in.as_deref() == Some(entity_id.as_str()) {
                    let humidity = self.states.number(&entity_id);
                    self.engine.update_humidity(humidity);
                } else if entity_id == config.temp_in && self.enabled {
                    let indoor = self.states.number(&entity_id);
                    let result = self.engine.indoor_changed(indoor);
                    self.actuate(result);
                }
                self.publish();
            }
            ZoneEvent::SetParam { slug, value, reply: tx } => {
                let result = self.set_param(&slug, value).await;
                reply(tx, result);
            }
            ZoneEvent::SetEnabled { enabled, reply: tx } => {
                if enabled != self.enabled {
                    let label = if enabled { "enabled" } else { "disabled" };
                    info!("zone {}: {label}", self.name());
                    self.enabled = enabled;
                    self.persist().await;
                    if enabled {
                        self.on_tick();
                    }
                }
                reply(tx, Ok(self.publish()));
            }
        }
    }

    async fn set_param(&mut self, slug: &str, value: f32) -> Result<ZoneStatus, ConfigError> {
        let mut candidate = self.settings;
        if !candidate.set(slug, value)? {
            return Ok(self.publish());
        }

        if let Err(err) = self.engine.apply_settings(&candidate) {
            warn!("zone {}: rejected {slug}={value}: {err}", self.name());
            return Err(err);
        }
        self.settings = candidate;
        info!(
            "zone {}: {slug} set to {}",
            self.name(),
            candidate.get(slug).unwrap_or(value)
        );
        self.persist().await;
        Ok(self.publish())
    }

    fn actuate(&self, result: Result<Vec<DeviceCommand>, EvalError>) {
        match result {
            Ok(commands) if commands.is_empty() => {}
            Ok(commands) => {
                info!(
                    "zone {}: mode -> {} at {:?}",
                    self.name(),
                    self.engine.mode().as_str(),
                    self.engine.setpoint()
                );
                sink::dispatch(self.ctx.sink.as_ref(), self.name(), &commands);
            }
            Err(EvalError::TransientRead(entity_id)) => {
                warn!("zone {}: {entity_id} unavailable, keeping previous state", self.name());
            }
            Err(err) => warn!("zone {}: evaluation failed: {err}", self.name()),
        }
    }

    async fn persist(&self) {
        let snapshot = ZoneSnapshot {
            settings: self.settings,
            enabled: self.enabled,
        };
        let result = match serde_json::to_value(snapshot) {
            Ok(value) => self.ctx.store.save(&snapshot_key(self.name()), value).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            warn!("zone {}: failed to persist snapshot: {err:#}", self.name());
        }
    }

    fn publish(&self) -> ZoneStatus {
        let mut status = self.engine.status(self.enabled, self.last_update);
        status.settings = Some(self.settings);
        self.ctx.publish(status)
    }
}

struct ThresholdZone {
    engine: ThresholdEngine,
    states: EntityStates,
    mode: String,
    last_action: Option<&'static str>,
    last_update: Option<i64>,
    ctx: ZoneContext,
}

impl ThresholdZone {
    async fn run(mut self, mut events: mpsc::Receiver<ZoneEvent>) {
        while let Some(event) = events.recv().await {
            self.on_event(event);
        }
        info!("zone {} stopped", self.name());
    }

    fn name(&self) -> &str {
        &self.engine.config().name
    }

    fn on_event(&mut self, event: ZoneEvent) {
        match event {
            ZoneEvent::StateChanged { entity_id, value } => {
                if self.states.update(entity_id, value) {
                    self.evaluate();
                }
            }
            ZoneEvent::SetParam { reply: tx, .. } | ZoneEvent::SetEnabled { reply: tx, .. } => {
                reply(tx, Err(ConfigError::NotAdjustable(self.name().to_string())));
            }
        }
    }

    fn evaluate(&mut self) {
        match self.engine.evaluate(&self.states) {
            Ok(decision) => {
                match &decision {
                    ThresholdDecision::Disabled => debug!("zone {}: disabled", self.name()),
                    ThresholdDecision::InBand { temp } => {
                        debug!("zone {}: {temp} inside band", self.name())
                    }
                    ThresholdDecision::TurnOn { temp, max_temp, .. } => {
                        info!("zone {}: {temp} above {max_temp}, turning on", self.name())
                    }
                    ThresholdDecision::TurnOff { temp, min_temp, .. } => {
                        info!("zone {}: {temp} at or below {min_temp}, turning off", self.name())
                    }
                }
                if let Some(mode) = decision.commanded_mode() {
                    self.mode = mode.to_string();
                }
                self.last_action = Some(decision.label());
                self.last_update = Some(Utc::now().timestamp());
                let commands = decision.into_commands();
                sink::dispatch(self.ctx.sink.as_ref(), self.name(), &commands);
            }
            Err(err) => warn!("zone {}: {err}", self.name()),
        }
        self.publish();
    }

    fn publish(&self) {
        let config = self.engine.config();
        let indoor_temp = self.states.number(&config.temperature_sensor);

        let mut status = ZoneStatus::new(&config.name, ZoneKind::Threshold);
        status.available = indoor_temp.is_some();
        status.enabled = self.engine.is_enabled(&self.states);
        status.mode = self.mode.clone();
        status.indoor_temp = indoor_temp;
        status.last_action = self.last_action;
        status.last_update_epoch = self.last_update;
        self.ctx.publish(status);
    }
}
