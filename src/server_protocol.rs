use serde_json::Value;

use crate::types::{ControlSource, PlayerColor};

#[derive(Debug)]
pub enum ParsedClientMessage {
    Hello {
        name: String,
    },
    ConfigureSlot {
        slot: i64,
        enabled: Option<bool>,
        control: Option<ControlSource>,
        color: Option<PlayerColor>,
        left: Option<String>,
        right: Option<String>,
    },
    Start,
    Key {
        key: String,
        pressed: bool,
    },
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let name = match object.get("name") {
                None => String::new(),
                Some(value) => value.as_str()?.to_string(),
            };
            Some(ParsedClientMessage::Hello { name })
        }
        "configure_slot" => {
            let slot = parse_integer(object.get("slot")?)?;
            let enabled = match object.get("enabled") {
                None => None,
                Some(value) => Some(value.as_bool()?),
            };
            let control = match object.get("control") {
                None => None,
                Some(value) => Some(ControlSource::parse(value.as_str()?)?),
            };
            let color = match object.get("color") {
                None => None,
                Some(value) => Some(PlayerColor::parse(value.as_str()?)?),
            };
            let left = parse_optional_key(object.get("left"))?;
            let right = parse_optional_key(object.get("right"))?;
            Some(ParsedClientMessage::ConfigureSlot {
                slot,
                enabled,
                control,
                color,
                left,
                right,
            })
        }
        "start" => Some(ParsedClientMessage::Start),
        "key" => {
            let key = object.get("key")?.as_str()?;
            if key.is_empty() {
                return None;
            }
            let pressed = object.get("pressed")?.as_bool()?;
            Some(ParsedClientMessage::Key {
                key: key.to_string(),
                pressed,
            })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_optional_key(value: Option<&Value>) -> Option<Option<String>> {
    let Some(value) = value else {
        return Some(None);
    };
    let key = value.as_str()?.trim();
    if key.is_empty() {
        return None;
    }
    Some(Some(key.to_string()))
}

fn parse_integer(value: &Value) -> Option<i64> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok();
    }
    let number = value.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    let floored = number.floor();
    if floored.abs() > MAX_SAFE_INTEGER_F64 {
        return None;
    }
    Some(floored as i64)
}
