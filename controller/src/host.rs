use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{debug, error, info, warn};

use thermoadapt_common::{
    adaptive_entity_states,
    entity::{slugify, ENABLED_PARAMETER, STATE_OFF, STATE_ON},
    entity_from_state_topic, parse_zone_set_topic, state_topic, zone_state_topic, RuntimeConfig,
    ZoneConfig, ZoneStatus, TOPIC_STATE_FILTER, TOPIC_ZONE_SET_FILTER,
};

use crate::{
    registry::{RegistryError, ZoneRegistry},
    sink::{CommandSink, MqttCommandSink},
    store::AppStore,
};

#[derive(Clone)]
struct AppState {
    registry: Arc<Mutex<ZoneRegistry>>,
    runtime: Arc<Mutex<RuntimeConfig>>,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("thermoadapt-controller", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let sink: Arc<dyn CommandSink> = Arc::new(MqttCommandSink::new(mqtt.clone()));
    let mut registry = ZoneRegistry::new(sink, Arc::new(store.clone()));
    for zone in runtime.zones.iter().cloned() {
        let name = zone.name().to_string();
        if let Err(err) = registry.create(zone).await {
            error!("zone {name} not activated: {err}");
        }
    }
    if registry.is_empty() {
        warn!("no zones configured; add one with POST /api/zones");
    } else {
        info!("{} of {} zones active", registry.len(), runtime.zones.len());
    }

    let http_port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.http_port);

    let app_state = AppState {
        registry: Arc::new(Mutex::new(registry)),
        runtime: Arc::new(Mutex::new(runtime)),
        mqtt,
        store,
    };

    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_state_publish_loop(app_state.clone());

    let app = Router::new()
        .route("/api/zones", get(handle_list_zones).post(handle_create_zone))
        .route(
            "/api/zones/{zone}",
            get(handle_get_zone).delete(handle_delete_zone),
        )
        .route("/api/zones/{zone}/param", post(handle_set_param))
        .route("/api/zones/{zone}/enabled", post(handle_set_enabled))
        .with_state(app_state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.registry.lock().await.shutdown().await;
    info!("controller stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_STATE_FILTER, TOPIC_ZONE_SET_FILTER] {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    if let Err(err) = subscribe_topics(&app_state.mqtt).await {
                        warn!("mqtt subscribe failed: {err:#}");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;

            let statuses = app_state.registry.lock().await.statuses();
            for status in &statuses {
                publish_zone(&app_state.mqtt, status).await;
            }
        }
    });
}

fn zone_publications(status: &ZoneStatus) -> Vec<(String, String)> {
    let mut publications = Vec::new();
    match serde_json::to_string(status) {
        Ok(body) => publications.push((zone_state_topic(&slugify(&status.zone)), body)),
        Err(err) => warn!("zone {} state serialization failed: {err}", status.zone),
    }
    if let Some(settings) = &status.settings {
        publications.extend(
            adaptive_entity_states(&status.zone, settings, status.enabled)
                .into_iter()
                .map(|(entity_id, state)| (state_topic(&entity_id), state)),
        );
    }
    publications
}

async fn publish_zone(mqtt: &AsyncClient, status: &ZoneStatus) {
    for (topic, payload) in zone_publications(status) {
        if let Err(err) = mqtt.publish(topic, QoS::AtLeastOnce, true, payload).await {
            warn!("zone {} state publish failed: {err}", status.zone);
        }
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let message = message.trim();

    if let Some(entity_id) = entity_from_state_topic(topic) {
        let delivered = app_state
            .registry
            .lock()
            .await
            .dispatch(entity_id, message)
            .await;
        if delivered == 0 {
            debug!("no zone watches {entity_id}");
        }
        return Ok(());
    }

    let Some((zone, slug)) = parse_zone_set_topic(topic) else {
        return Ok(());
    };

    let registry = app_state.registry.lock().await;
    let status = if slug == ENABLED_PARAMETER {
        let enabled = parse_switch(message)
            .with_context(|| format!("invalid switch value `{message}` for zone {zone}"))?;
        registry.set_enabled(zone, enabled).await
    } else {
        let value = message
            .parse::<f32>()
            .with_context(|| format!("invalid value `{message}` for {zone}/{slug}"))?;
        registry.set_param(zone, slug, value).await
    };
    let status = status.with_context(|| format!("failed to update {zone}/{slug}"))?;
    drop(registry);
    publish_zone(&app_state.mqtt, &status).await;
    Ok(())
}

fn parse_switch(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case(STATE_ON) || value == "1" || value.eq_ignore_ascii_case("true")
    {
        Some(true)
    } else if value.eq_ignore_ascii_case(STATE_OFF)
        || value == "0"
        || value.eq_ignore_ascii_case("false")
    {
        Some(false)
    } else {
        None
    }
}

async fn handle_list_zones(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.lock().await.statuses())
}

async fn handle_get_zone(
    State(state): State<AppState>,
    Path(zone): Path<String>,
) -> impl IntoResponse {
    match state.registry.lock().await.status(&zone) {
        Ok(status) => Json(status).into_response(),
        Err(err) => registry_error_response(err),
    }
}

async fn handle_create_zone(
    State(state): State<AppState>,
    Json(config): Json<ZoneConfig>,
) -> impl IntoResponse {
    let status = {
        let mut registry = state.registry.lock().await;
        match registry.create(config.clone()).await {
            Ok(status) => status,
            Err(err) => return registry_error_response(err),
        }
    };

    state.runtime.lock().await.zones.push(config);
    if let Err(err) = persist_runtime(&state).await {
        warn!("failed to persist new zone {}: {err:#}", status.zone);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    publish_zone(&state.mqtt, &status).await;
    (StatusCode::CREATED, Json(status)).into_response()
}

async fn handle_delete_zone(
    State(state): State<AppState>,
    Path(zone): Path<String>,
) -> impl IntoResponse {
    if let Err(err) = state.registry.lock().await.destroy(&zone) {
        return registry_error_response(err);
    }

    let key = slugify(&zone);
    state
        .runtime
        .lock()
        .await
        .zones
        .retain(|config| slugify(config.name()) != key);
    if let Err(err) = persist_runtime(&state).await {
        warn!("failed to persist removal of zone {zone}: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    StatusCode::NO_CONTENT.into_response()
}

async fn handle_set_param(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(slug) = params.get("slug") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'slug' parameter");
    };
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(value) = value.parse::<f32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid numeric value");
    };

    let result = state.registry.lock().await.set_param(&zone, slug, value).await;
    match result {
        Ok(status) => {
            publish_zone(&state.mqtt, &status).await;
            Json(status).into_response()
        }
        Err(err) => registry_error_response(err),
    }
}

async fn handle_set_enabled(
    State(state): State<AppState>,
    Path(zone): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(enabled) = parse_switch(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid value. Use 'on' or 'off'");
    };

    let result = state.registry.lock().await.set_enabled(&zone, enabled).await;
    match result {
        Ok(status) => {
            publish_zone(&state.mqtt, &status).await;
            Json(status).into_response()
        }
        Err(err) => registry_error_response(err),
    }
}

async fn persist_runtime(state: &AppState) -> anyhow::Result<()> {
    let runtime = state.runtime.lock().await.clone();
    state.store.save_runtime_config(&runtime).await
}

fn registry_error_response(err: RegistryError) -> axum::response::Response {
    let status = match &err {
        RegistryError::UnknownZone(_) => StatusCode::NOT_FOUND,
        RegistryError::DuplicateZone(_) | RegistryError::Config(_) => StatusCode::BAD_REQUEST,
        RegistryError::ZoneStopped(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use thermoadapt_common::{ConfigError, ZoneKind, ZoneSettings};

    use super::*;

    #[test]
    fn switch_payloads() {
        assert_eq!(parse_switch("ON"), Some(true));
        assert_eq!(parse_switch("true"), Some(true));
        assert_eq!(parse_switch("off"), Some(false));
        assert_eq!(parse_switch("0"), Some(false));
        assert_eq!(parse_switch("maybe"), None);
    }

    #[test]
    fn registry_errors_map_to_http_status() {
        let cases = [
            (
                RegistryError::UnknownZone("cozinha".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                RegistryError::DuplicateZone("sala".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::Config(ConfigError::NotAdjustable("sala".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::ZoneStopped("quarto".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(registry_error_response(err).status(), expected);
        }
    }

    #[test]
    fn adaptive_zone_publishes_slider_and_switch_states() {
        let mut settings = ZoneSettings::default();
        settings.deadband_cool = 1.2;
        let mut status = ZoneStatus::new("Quarto", ZoneKind::Adaptive);
        status.enabled = true;
        status.settings = Some(settings);

        let publications = zone_publications(&status);

        assert_eq!(publications[0].0, "thermoadapt/zone/quarto/state");
        assert!(publications.contains(&(
            "thermoadapt/state/number.thermoadapt_quarto_deadband_cool".to_string(),
            "1.2".to_string()
        )));
        assert_eq!(
            publications.last(),
            Some(&(
                "thermoadapt/state/switch.thermoadapt_quarto_enabled".to_string(),
                "on".to_string()
            ))
        );
    }

    #[test]
    fn threshold_zone_publishes_only_its_status() {
        let status = ZoneStatus::new("sala", ZoneKind::Threshold);

        let publications = zone_publications(&status);

        assert_eq!(publications.len(), 1);
        assert_eq!(publications[0].0, "thermoadapt/zone/sala/state");
    }
}
