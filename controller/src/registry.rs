use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};

use thermoadapt_common::{entity::slugify, ConfigError, ZoneConfig, ZoneStatus};

use crate::{
    sink::CommandSink,
    store::KeyValueStore,
    zone::{spawn_zone, ZoneEvent, ZoneHandle},
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("zone `{0}` already exists")]
    DuplicateZone(String),
    #[error("zone `{0}` not found")]
    UnknownZone(String),
    #[error("zone `{0}` is not running")]
    ZoneStopped(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct ZoneRegistry {
    zones: HashMap<String, ZoneHandle>,
    sink: Arc<dyn CommandSink>,
    store: Arc<dyn KeyValueStore>,
}

impl ZoneRegistry {
    pub fn new(sink: Arc<dyn CommandSink>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            zones: HashMap::new(),
            sink,
            store,
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub async fn create(&mut self, config: ZoneConfig) -> Result<ZoneStatus, RegistryError> {
        config.validate()?;
        let key = slugify(config.name());
        if self.zones.contains_key(&key) {
            return Err(RegistryError::DuplicateZone(config.name().to_string()));
        }

        let handle = spawn_zone(config, self.sink.clone(), self.store.clone()).await?;
        let status = handle.status.borrow().clone();
        self.zones.insert(key, handle);
        Ok(status)
    }

    // Commands the zone already issued are not awaited.
    pub fn destroy(&mut self, zone: &str) -> Result<(), RegistryError> {
        let handle = self
            .zones
            .remove(&slugify(zone))
            .ok_or_else(|| RegistryError::UnknownZone(zone.to_string()))?;
        drop(handle.events);
        info!("zone {zone} destroyed");
        Ok(())
    }

    pub async fn dispatch(&self, entity_id: &str, value: &str) -> usize {
        let mut delivered = 0;
        for (name, handle) in &self.zones {
            if !handle.watched.contains(entity_id) {
                continue;
            }
            let event = ZoneEvent::StateChanged {
                entity_id: entity_id.to_string(),
                value: value.to_string(),
            };
            match handle.events.send(event).await {
                Ok(()) => delivered += 1,
                Err(_) => warn!("zone {name} is not running, dropped {entity_id}"),
            }
        }
        delivered
    }

    pub async fn set_param(
        &self,
        zone: &str,
        slug: &str,
        value: f32,
    ) -> Result<ZoneStatus, RegistryError> {
        self.request(zone, |reply| ZoneEvent::SetParam {
            slug: slug.to_string(),
            value,
            reply,
        })
        .await
    }

    pub async fn set_enabled(
        &self,
        zone: &str,
        enabled: bool,
    ) -> Result<ZoneStatus, RegistryError> {
        self.request(zone, |reply| ZoneEvent::SetEnabled { enabled, reply })
            .await
    }

    pub fn status(&self, zone: &str) -> Result<ZoneStatus, RegistryError> {
        Ok(self.handle(zone)?.status.borrow().clone())
    }

    pub fn statuses(&self) -> Vec<ZoneStatus> {
        let mut statuses: Vec<ZoneStatus> = self
            .zones
            .values()
            .map(|handle| handle.status.borrow().clone())
            .collect();
        statuses.sort_by(|a, b| a.zone.cmp(&b.zone));
        statuses
    }

    pub async fn shutdown(&mut self) {
        for (name, handle) in self.zones.drain() {
            drop(handle.events);
            if let Err(err) = handle.task.await {
                warn!("zone {name} task ended abnormally: {err}");
            }
        }
    }

    fn handle(&self, zone: &str) -> Result<&ZoneHandle, RegistryError> {
        self.zones
            .get(&slugify(zone))
            .ok_or_else(|| RegistryError::UnknownZone(zone.to_string()))
    }

    async fn request(
        &self,
        zone: &str,
        event: impl FnOnce(oneshot::Sender<Result<ZoneStatus, ConfigError>>) -> ZoneEvent,
    ) -> Result<ZoneStatus, RegistryError> {
        let handle = self.handle(zone)?;
        let (tx, rx) = oneshot::channel();
        let stopped = || RegistryError::ZoneStopped(zone.to_string());

        handle.events.send(event(tx)).await.map_err(|_| stopped())?;
        Ok(rx.await.map_err(|_| stopped())??)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use thermoadapt_common::{AdaptiveZoneConfig, DeviceCommand, ThresholdZoneConfig};

    use super::*;
    use crate::{sink::testing::RecordingSink, store::testing::MemoryStore};

    fn registry(sink: Arc<RecordingSink>) -> ZoneRegistry {
        ZoneRegistry::new(sink, Arc::new(MemoryStore::new()))
    }

    fn quarto() -> ZoneConfig {
        ZoneConfig::Adaptive(AdaptiveZoneConfig::new(
            "quarto",
            "sensor.quarto_temperature",
            "sensor.outdoor_temperature",
            "climate.quarto_ac",
        ))
    }

    fn sala() -> ZoneConfig {
        let mut config =
            ThresholdZoneConfig::new("sala", "climate.sala_ac", "sensor.sala_temperature");
        config.max_temp = 26.0;
        ZoneConfig::Threshold(config)
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_zone_names_are_rejected() {
        let mut registry = registry(Arc::new(RecordingSink::default()));
        registry.create(quarto()).await.unwrap();

        let err = registry.create(quarto()).await.unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateZone(name) if name == "quarto"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_never_activates() {
        let mut registry = registry(Arc::new(RecordingSink::default()));
        let mut config = AdaptiveZoneConfig::new(
            "quarto",
            "sensor.quarto_temperature",
            "sensor.outdoor_temperature",
            "climate.quarto_ac",
        );
        config.ua_total = -1.0;

        let err = registry
            .create(ZoneConfig::Adaptive(config))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Config(ConfigError::NonPositiveConductance(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn states_reach_only_watching_zones() {
        let sink = Arc::new(RecordingSink::default());
        let mut registry = registry(sink.clone());
        registry.create(quarto()).await.unwrap();
        registry.create(sala()).await.unwrap();

        assert_eq!(registry.dispatch("sensor.sala_temperature", "27").await, 1);
        assert_eq!(registry.dispatch("sensor.kitchen_temperature", "27").await, 0);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            sink.take()[0],
            DeviceCommand::hvac_mode("climate.sala_ac", "cool")
        );
        let status = registry.status("sala").unwrap();
        assert_eq!(status.last_action, Some("turn_on"));
        assert_eq!(status.mode, "cool");
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_zone_is_gone() {
        let mut registry = registry(Arc::new(RecordingSink::default()));
        registry.create(quarto()).await.unwrap();

        registry.destroy("quarto").unwrap();

        assert!(matches!(
            registry.status("quarto"),
            Err(RegistryError::UnknownZone(_))
        ));
        assert!(matches!(
            registry.destroy("quarto"),
            Err(RegistryError::UnknownZone(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn parameter_updates_round_trip_through_the_zone() {
        let mut registry = registry(Arc::new(RecordingSink::default()));
        registry.create(quarto()).await.unwrap();
        registry.create(sala()).await.unwrap();

        let status = registry.set_enabled("quarto", false).await.unwrap();
        assert!(!status.enabled);

        assert!(matches!(
            registry.set_param("sala", "setpoint", 22.0).await,
            Err(RegistryError::Config(ConfigError::NotAdjustable(_)))
        ));
        assert!(matches!(
            registry.set_param("cozinha", "setpoint", 22.0).await,
            Err(RegistryError::UnknownZone(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn statuses_are_sorted_and_shutdown_empties_registry() {
        let mut registry = registry(Arc::new(RecordingSink::default()));
        registry.create(sala()).await.unwrap();
        registry.create(quarto()).await.unwrap();

        let names: Vec<String> = registry
            .statuses()
            .into_iter()
            .map(|status| status.zone)
            .collect();
        assert_eq!(names, vec!["quarto".to_string(), "sala".to_string()]);

        registry.shutdown().await;
        assert!(registry.is_empty());
    }
}
