use serde::Serialize;

use crate::constants::MAX_PLAYERS;
use crate::types::{ControlSource, KeyBindings, PlayerColor, StartPlayer};

const DEFAULT_KEYS: [(&str, &str); MAX_PLAYERS] = [
    ("a", "d"),
    ("j", "l"),
    ("q", "e"),
    ("u", "i"),
    ("z", "c"),
    ("b", "m"),
];

const DEFAULT_ENABLED_SLOTS: usize = 4;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LobbySlot {
    pub slot: usize,
    pub enabled: bool,
    pub control: ControlSource,
    pub color: PlayerColor,
    pub keys: KeyBindings,
}

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(16).collect()
}

pub fn normalize_slot_index(value: i64) -> Option<usize> {
    usize::try_from(value).ok().filter(|slot| *slot < MAX_PLAYERS)
}

pub fn default_key_bindings(slot: usize) -> KeyBindings {
    let (left, right) = DEFAULT_KEYS[slot % MAX_PLAYERS];
    KeyBindings::new(left, right)
}

/// Lobby in the arcade layout: slot 0 is human, the next three are bots and
/// the remaining slots start disabled.
pub fn default_slots() -> Vec<LobbySlot> {
    PlayerColor::ALL
        .iter()
        .enumerate()
        .map(|(slot, color)| LobbySlot {
            slot,
            enabled: slot < DEFAULT_ENABLED_SLOTS,
            control: if slot == 0 {
                ControlSource::Human
            } else {
                ControlSource::Bot
            },
            color: *color,
            keys: default_key_bindings(slot),
        })
        .collect()
}

pub fn roster_from_slots(slots: &[LobbySlot]) -> Vec<StartPlayer> {
    slots
        .iter()
        .filter(|slot| slot.enabled)
        .map(|slot| StartPlayer {
            id: format!("player_{}", slot.slot + 1),
            color: slot.color,
            control: slot.control,
            keys: match slot.control {
                ControlSource::Human => Some(slot.keys.clone()),
                ControlSource::Bot => None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_name_applies_trim_empty_and_max_len() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Alice "), "Alice");
        assert_eq!(sanitize_name("12345678901234567890"), "1234567890123456");
    }

    #[test]
    fn normalize_slot_index_rejects_out_of_range() {
        assert_eq!(normalize_slot_index(0), Some(0));
        assert_eq!(normalize_slot_index(5), Some(5));
        assert_eq!(normalize_slot_index(6), None);
        assert_eq!(normalize_slot_index(-1), None);
    }

    #[test]
    fn default_slots_match_arcade_layout() {
        let slots = default_slots();
        assert_eq!(slots.len(), MAX_PLAYERS);
        assert_eq!(slots[0].control, ControlSource::Human);
        assert_eq!(slots[0].keys, KeyBindings::new("a", "d"));
        assert_eq!(slots.iter().filter(|slot| slot.enabled).count(), 4);
    }

    #[test]
    fn roster_skips_disabled_slots_and_bot_keys() {
        let mut slots = default_slots();
        slots[1].enabled = false;
        let roster = roster_from_slots(&slots);
        let ids: Vec<&str> = roster.iter().map(|start| start.id.as_str()).collect();
        assert_eq!(ids, vec!["player_1", "player_3", "player_4"]);
        assert!(roster[0].keys.is_some());
        assert!(roster[1].keys.is_none());
    }
}
