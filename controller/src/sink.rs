use rumqttc::{AsyncClient, QoS};
use tracing::{debug, warn};

use thermoadapt_common::{command_topic, ActuationError, DeviceCommand};

// `invoke` must not block.
pub trait CommandSink: Send + Sync {
    fn invoke(&self, command: &DeviceCommand) -> Result<(), ActuationError>;
}

pub struct MqttCommandSink {
    mqtt: AsyncClient,
}

impl MqttCommandSink {
    pub fn new(mqtt: AsyncClient) -> Self {
        Self { mqtt }
    }
}

impl CommandSink for MqttCommandSink {
    fn invoke(&self, command: &DeviceCommand) -> Result<(), ActuationError> {
        let failed = |reason: String| ActuationError {
            service: command.service(),
            entity_id: command.entity_id().to_string(),
            reason,
        };

        let payload =
            serde_json::to_vec(&command.parameters()).map_err(|err| failed(err.to_string()))?;
        self.mqtt
            .try_publish(
                command_topic(command.domain(), command.service()),
                QoS::AtLeastOnce,
                false,
                payload,
            )
            .map_err(|err| failed(err.to_string()))
    }
}

pub fn dispatch(sink: &dyn CommandSink, zone: &str, commands: &[DeviceCommand]) -> usize {
    let mut sent = 0;
    for command in commands {
        match sink.invoke(command) {
            Ok(()) => {
                debug!(
                    zone,
                    service = command.service(),
                    entity = command.entity_id(),
                    "command sent"
                );
                sent += 1;
            }
            Err(err) => warn!("zone {zone}: {err}"),
        }
    }
    sent
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingSink {
        pub commands: Mutex<Vec<DeviceCommand>>,
        pub failing: Option<&'static str>,
    }

    impl RecordingSink {
        pub fn failing(service: &'static str) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                failing: Some(service),
            }
        }

        pub fn take(&self) -> Vec<DeviceCommand> {
            std::mem::take(&mut *self.commands.lock().unwrap())
        }
    }

    impl CommandSink for RecordingSink {
        fn invoke(&self, command: &DeviceCommand) -> Result<(), ActuationError> {
            self.commands.lock().unwrap().push(command.clone());
            if self.failing == Some(command.service()) {
                return Err(ActuationError {
                    service: command.service(),
                    entity_id: command.entity_id().to_string(),
                    reason: "rejected".to_string(),
                });
            }
            Ok(())
        }
    }
}
