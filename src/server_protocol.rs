use serde_json::{Map, Value};

use crate::types::{Command, PlayerClass};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello {
        name: String,
        /// `None` when absent or not one of the known classes.
        class: Option<PlayerClass>,
    },
    Command(Command),
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            // A missing name is filled in later by `sanitize_name`.
            let name = object
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let class = object
                .get("class")
                .and_then(Value::as_str)
                .and_then(PlayerClass::parse);
            Some(ParsedClientMessage::Hello { name, class })
        }
        "command" => {
            let name = object.get("command")?.as_str()?.trim().to_ascii_lowercase();
            parse_command(&name, object).map(ParsedClientMessage::Command)
        }
        _ => None,
    }
}

fn parse_command(name: &str, object: &Map<String, Value>) -> Option<Command> {
    let command = match name {
        "move" => {
            let dx = parse_delta(object.get("dx"))?;
            let dy = parse_delta(object.get("dy"))?;
            Command::Move { dx, dy }
        }
        "attack" => Command::Attack {
            target_enemy_id: parse_id(object.get("target_enemy_id")),
            target_player_id: parse_id(object.get("target_player_id")),
        },
        "special" => Command::Special {
            target_player_id: parse_id(object.get("target_player_id")),
        },
        "res" => Command::Resurrect {
            target_player_id: parse_id(object.get("target_player_id")),
            target_name: object
                .get("target")
                .and_then(|value| match value {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                }),
        },
        "enter_door" => Command::EnterDoor,
        "status" => Command::Status,
        "who" => Command::Who,
        "help" => Command::Help,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

/// Missing deltas mean no movement; anything present must be a finite number.
fn parse_delta(value: Option<&Value>) -> Option<f32> {
    let Some(value) = value else {
        return Some(0.0);
    };
    let number = value.as_f64()?;
    if !number.is_finite() {
        return None;
    }
    Some(number as f32)
}

/// Target ids are advisory: anything that is not a non-negative integer is
/// treated as "no target".
fn parse_id(value: Option<&Value>) -> Option<u32> {
    let value = value?;
    if let Some(number) = value.as_u64() {
        return u32::try_from(number).ok();
    }
    let number = value.as_f64()?;
    if number.is_finite() && number >= 0.0 && number.fract() == 0.0 && number <= u32::MAX as f64 {
        return Some(number as u32);
    }
    None
}
