pub const TOPIC_PREFIX: &str = "thermoadapt";

pub const TOPIC_STATE_FILTER: &str = "thermoadapt/state/#";
pub const TOPIC_ZONE_SET_FILTER: &str = "thermoadapt/zone/+/set/+";

pub fn state_topic(entity_id: &str) -> String {
    format!("{TOPIC_PREFIX}/state/{entity_id}")
}

pub fn entity_from_state_topic(topic: &str) -> Option<&str> {
    topic
        .strip_prefix(TOPIC_PREFIX)?
        .strip_prefix("/state/")
        .filter(|entity_id| !entity_id.is_empty())
}

pub fn command_topic(domain: &str, service: &str) -> String {
    format!("{TOPIC_PREFIX}/cmnd/{domain}/{service}")
}

pub fn zone_state_topic(zone: &str) -> String {
    format!("{TOPIC_PREFIX}/zone/{zone}/state")
}

pub fn zone_set_topic(zone: &str, slug: &str) -> String {
    format!("{TOPIC_PREFIX}/zone/{zone}/set/{slug}")
}

pub fn parse_zone_set_topic(topic: &str) -> Option<(&str, &str)> {
    let rest = topic.strip_prefix(TOPIC_PREFIX)?.strip_prefix("/zone/")?;
    let (zone, slug) = rest.split_once("/set/")?;
    if zone.is_empty() || slug.is_empty() || zone.contains('/') || slug.contains('/') {
        return None;
    }
    Some((zone, slug))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_topics_round_trip_entity_ids() {
        let topic = state_topic("sensor.quarto_temperature");
        assert_eq!(topic, "thermoadapt/state/sensor.quarto_temperature");
        assert_eq!(
            entity_from_state_topic(&topic),
            Some("sensor.quarto_temperature")
        );
        assert_eq!(entity_from_state_topic("thermoadapt/state/"), None);
        assert_eq!(entity_from_state_topic("other/state/x"), None);
    }

    #[test]
    fn parses_zone_set_topics() {
        assert_eq!(
            parse_zone_set_topic("thermoadapt/zone/quarto/set/setpoint"),
            Some(("quarto", "setpoint"))
        );
        assert_eq!(parse_zone_set_topic("thermoadapt/zone/quarto/state"), None);
        assert_eq!(parse_zone_set_topic("thermoadapt/zone/a/b/set/x"), None);
    }
}
