use std::collections::BTreeMap;

use crate::world::World;

pub fn sanitize_name(value: &str) -> String {
    let trimmed: String = value.trim().chars().filter(|c| !c.is_control()).collect();
    if trimmed.is_empty() {
        return "Adventurer".to_string();
    }
    trimmed.chars().take(16).collect()
}

/// Connected players per floor, for the status page.
pub fn floor_occupancy(world: &World) -> BTreeMap<u8, usize> {
    let mut counts = BTreeMap::new();
    for player in world.players.values() {
        *counts.entry(player.floor).or_insert(0) += 1;
    }
    counts
}
