use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, info, warn};

use thermoadapt_common::state_topic;

struct SimulatedEntities {
    temp_in: String,
    temp_out: String,
    hum_in: String,
}

impl SimulatedEntities {
    fn from_env() -> Self {
        let var = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        Self {
            temp_in: var("SIM_TEMP_IN", "sensor.quarto_temperature"),
            temp_out: var("SIM_TEMP_OUT", "sensor.outdoor_temperature"),
            hum_in: var("SIM_HUM_IN", "sensor.quarto_humidity"),
        }
    }
}

fn simulated_readings(tick: u64) -> (f32, f32, f32) {
    let phase = (tick % 36) as f32;
    let outdoor = if phase < 18.0 {
        16.0 + phase
    } else {
        52.0 - phase
    };
    let indoor = 22.0 + (outdoor - 22.0) * 0.4;
    let humidity = 55.0 + ((tick % 6) as f32 * 1.5);
    (indoor, outdoor, humidity)
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);
    let period = std::env::var("SIM_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(30)
        .max(1);

    let mut mqtt_options = MqttOptions::new("thermoadapt-sensor", mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    let entities = SimulatedEntities::from_env();
    info!(
        "sensor feed started: {} / {} / {}",
        entities.temp_in, entities.temp_out, entities.hum_in
    );

    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_secs(period));

    loop {
        interval.tick().await;
        let (indoor, outdoor, humidity) = simulated_readings(tick);
        tick = tick.saturating_add(1);
        debug!("publishing indoor {indoor:.1} outdoor {outdoor:.1} humidity {humidity:.1}");

        for (entity_id, value) in [
            (&entities.temp_out, outdoor),
            (&entities.temp_in, indoor),
            (&entities.hum_in, humidity),
        ] {
            mqtt.publish(
                state_topic(entity_id),
                QoS::AtLeastOnce,
                true,
                format!("{value:.1}"),
            )
            .await
            .with_context(|| format!("failed to publish {entity_id}"))?;
        }
    }
}
