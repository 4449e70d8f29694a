use crate::types::EnemyKind;

pub const TICK_MS: u64 = 30;

pub const HUB_FLOOR: u8 = 0;
pub const BOSS_FLOOR: u8 = 10;
pub const SAFE_FLOOR: u8 = 11;
pub const TOP_FLOOR: u8 = 21;

pub const MAP_WIDTH: f32 = 20.0;
pub const MAP_HEIGHT: f32 = 12.0;
pub const LARGE_MAP_FROM_FLOOR: u8 = 11;

pub const DEATH_TIMEOUT_MS: u64 = 300_000;
pub const ENEMY_ATTACK_DELAY_MS: u64 = 1_000;
pub const ENEMY_MOVE_INTERVAL_MS: u64 = 30;
pub const RESPAWN_INTERVAL_MS: u64 = 60_000;
pub const DOOR_RESPAWN_INTERVAL_MS: u64 = 120_000;

pub const HP_REGEN_DELAY_MS: u64 = 10_000;
pub const MANA_REGEN_DELAY_MS: u64 = 10_000;
pub const REGEN_PERIOD_MS: u64 = 1_000;
pub const HP_REGEN_STEP: i32 = 2;
pub const MANA_REGEN_STEP: i32 = 2;

pub const MELEE_RANGE: f32 = 1.5;
pub const DOOR_ENTER_RADIUS: f32 = 0.6;
pub const DOOR_HEAL_FRACTION: f32 = 0.3;

pub const ENEMY_PATH_STEP: f32 = 0.1;
pub const ENEMY_APPROACH_STEP: f32 = 0.2;
pub const ENEMY_MIN_GAP: f32 = 0.25;
pub const MELEE_ENEMY_MULTIPLIER: i32 = 3;
pub const FINAL_BOSS_TARGETS: usize = 2;

pub const SHIELD_DAMAGE_FACTOR: f32 = 0.6;
pub const SHIELD_LEASE_MS: u64 = 1_500;
pub const CHANNEL_DRAIN_PERIOD_MS: u64 = 1_000;

pub const ARCHER_READY_MULTIPLIER: i32 = 3;
pub const ARCHER_MOVE_COOLDOWN_MS: u64 = 1_000;

pub const MAGE_ATTACK_COST: i32 = 1;
pub const MAGE_SPECIAL_COST: i32 = 15;
pub const MAGE_SPECIAL_BONUS: i32 = 5;

pub const HEALER_MINOR_HEAL: i32 = 5;
pub const HEALER_MINOR_COST: i32 = 1;
pub const HEALER_SPECIAL_COST: i32 = 10;
pub const HEALER_SPECIAL_FRACTION: f32 = 0.3;
pub const HEALER_SPECIAL_MIN: i32 = 10;
pub const HEALER_SPLASH: i32 = 10;

pub const RESURRECT_COST: i32 = 15;
pub const RESURRECT_HP_FRACTION: f32 = 0.5;

pub const BOSS_RESPAWN_INTERVAL_MS: u64 = 1_800_000;
pub const BOSS_SPAWN_TELEGRAPH_MS: u64 = 10_000;
pub const BOSS_SPAWN_RADIUS: f32 = 4.5;
pub const BOSS_RESPAWN_DAMAGE_FRACTION: f32 = 0.5;
// Phases past two and the pulse ability are reserved; nothing reaches them yet.
pub const BOSS_MAX_PHASE: u8 = 4;
pub const BOSS_PULSE_COOLDOWN_MS: u64 = 10_000;
pub const BOSS_PHASE2_THRESHOLD: f32 = 0.75;
pub const BOSS_PHASE2_DEF_BONUS: i32 = 2;

pub const EMBER_MAX_CIRCLES: usize = 10;
pub const EMBER_SPAWN_INTERVAL_MS: u64 = 2_500;
pub const EMBER_RADIUS: f32 = 0.8;
pub const EMBER_TELEGRAPH_MS: u64 = 3_000;
pub const EMBER_ACTIVE_MS: u64 = 1_000;
pub const EMBER_DAMAGE: i32 = 20;

pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
pub const MAX_LINE_BYTES: usize = 8 * 1024;

pub struct MonsterTemplate {
    pub name: &'static str,
    pub kind: EnemyKind,
    pub hp: i32,
    pub attack: i32,
    pub defense: i32,
}

pub const MONSTER_POOL: [MonsterTemplate; 5] = [
    MonsterTemplate {
        name: "Tunnel Rat",
        kind: EnemyKind::Melee,
        hp: 35,
        attack: 8,
        defense: 1,
    },
    MonsterTemplate {
        name: "Oblivion Cultist",
        kind: EnemyKind::Ranged,
        hp: 45,
        attack: 9,
        defense: 2,
    },
    MonsterTemplate {
        name: "Ghost Wolf",
        kind: EnemyKind::Melee,
        hp: 55,
        attack: 11,
        defense: 3,
    },
    MonsterTemplate {
        name: "Defiled Warden",
        kind: EnemyKind::Melee,
        hp: 70,
        attack: 13,
        defense: 4,
    },
    MonsterTemplate {
        name: "Dark Marksman",
        kind: EnemyKind::Ranged,
        hp: 50,
        attack: 12,
        defense: 2,
    },
];

pub const EXILE_NAME: &str = "The Exile";
pub const EXILE_STATS: (i32, i32, i32) = (500, 60, 4);
pub const FLAME_LORD_NAME: &str = "Lord of the Forgotten Flame";
pub const FLAME_LORD_STATS: (i32, i32, i32) = (1000, 30, 8);

pub fn get_map_size(floor: u8) -> (f32, f32) {
    if floor >= LARGE_MAP_FROM_FLOOR {
        return (MAP_WIDTH * 2.0, MAP_HEIGHT * 2.0);
    }
    (MAP_WIDTH, MAP_HEIGHT)
}

pub fn is_no_combat_floor(floor: u8) -> bool {
    floor == HUB_FLOOR || floor == SAFE_FLOOR
}

/// Mini-boss (hp, attack, defense) for an even combat floor.
pub fn get_miniboss_stats(floor: u8) -> (i32, i32, i32) {
    let f = floor as i32;
    let hp = 120 + f * 12;
    let attack = 15 + f;
    let defense = 4 + f / 2;
    if floor >= LARGE_MAP_FROM_FLOOR {
        return (
            (hp as f32 * 1.8) as i32,
            (attack as f32 * 1.5) as i32,
            defense + 2,
        );
    }
    (hp, attack, defense)
}

/// (count, hp per floor, attack per floor) for an odd-floor wave.
pub fn get_wave_scaling(floor: u8) -> (usize, i32, f32) {
    if floor >= LARGE_MAP_FROM_FLOOR {
        return (4 + floor as usize, 10, 2.0);
    }
    (2 + floor as usize, 6, 1.6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_doubles_from_safe_floor() {
        assert_eq!(get_map_size(0), (20.0, 12.0));
        assert_eq!(get_map_size(10), (20.0, 12.0));
        assert_eq!(get_map_size(11), (40.0, 24.0));
        assert_eq!(get_map_size(21), (40.0, 24.0));
    }

    #[test]
    fn miniboss_gets_stronger_past_the_boss_floor() {
        assert_eq!(get_miniboss_stats(4), (168, 19, 6));
        assert_eq!(get_miniboss_stats(12), (475, 40, 12));
    }

    #[test]
    fn wave_size_grows_with_floor() {
        assert_eq!(get_wave_scaling(1).0, 3);
        assert_eq!(get_wave_scaling(9).0, 11);
        assert_eq!(get_wave_scaling(13).0, 17);
    }
}
