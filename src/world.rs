use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{
    get_map_size, get_miniboss_stats, get_wave_scaling, is_no_combat_floor, BOSS_FLOOR,
    EXILE_NAME, EXILE_STATS, FLAME_LORD_NAME, FLAME_LORD_STATS, HUB_FLOOR, MONSTER_POOL,
    TOP_FLOOR,
};
use crate::entities::{Enemy, Player};
use crate::rng::Rng;
use crate::types::{BossPhase, EnemyKind, PlayerClass};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Door {
    pub x: f32,
    pub y: f32,
    pub open: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Hazard {
    /// Telegraph of the boss coming back. Damages whoever stands in it when it ends.
    BossSpawn {
        x: f32,
        y: f32,
        radius: f32,
        started_at: u64,
    },
    /// Phase-two floor circle. Each player is struck at most once per circle.
    Ember {
        x: f32,
        y: f32,
        radius: f32,
        started_at: u64,
        struck: BTreeSet<u32>,
    },
}

impl Hazard {
    pub fn center(&self) -> (f32, f32) {
        match self {
            Self::BossSpawn { x, y, .. } | Self::Ember { x, y, .. } => (*x, *y),
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            Self::BossSpawn { radius, .. } | Self::Ember { radius, .. } => *radius,
        }
    }

    pub fn started_at(&self) -> u64 {
        match self {
            Self::BossSpawn { started_at, .. } | Self::Ember { started_at, .. } => *started_at,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (cx, cy) = self.center();
        let r = self.radius();
        (x - cx).powi(2) + (y - cy).powi(2) <= r * r
    }

    pub fn is_boss_spawn(&self) -> bool {
        matches!(self, Self::BossSpawn { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BossStatus {
    Alive,
    Dead { died_at: u64 },
    /// The spawn circle is on the floor and lives in the hazard list.
    Telegraph { started_at: u64 },
}

#[derive(Clone, Debug)]
pub struct BossEncounter {
    pub status: BossStatus,
    pub phase: Option<BossPhase>,
    // Reserved for phases three and four, which have no transition yet.
    pub last_pulse_at: u64,
    pub adds_alive: u32,
    pub last_ember_at: u64,
}

impl BossEncounter {
    pub fn alive() -> Self {
        Self {
            status: BossStatus::Alive,
            phase: Some(BossPhase::One),
            last_pulse_at: 0,
            adds_alive: 0,
            last_ember_at: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Floor {
    pub index: u8,
    pub width: f32,
    pub height: f32,
    pub enemies: Vec<Enemy>,
    /// Absent until the floor is cleared for the first time.
    pub door: Option<Door>,
    pub shield_until: u64,
    pub hazards: Vec<Hazard>,
    pub last_respawn_at: u64,
    pub last_enemy_attack_at: u64,
    pub last_enemy_move_at: u64,
    pub boss: Option<BossEncounter>,
}

impl Floor {
    pub fn enemies_alive(&self) -> bool {
        self.enemies.iter().any(Enemy::is_alive)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }

    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.clamp(0.0, self.width - 1.0),
            y.clamp(0.0, self.height - 1.0),
        )
    }

    pub fn door_open(&self) -> bool {
        self.door.is_some_and(|door| door.open)
    }

    pub fn shield_active(&self, now_ms: u64) -> bool {
        now_ms < self.shield_until
    }
}

#[derive(Debug)]
pub struct World {
    pub players: BTreeMap<u32, Player>,
    pub floors: BTreeMap<u8, Floor>,
    pub rng: Rng,
    next_player_id: u32,
    next_enemy_id: u32,
}

impl World {
    pub fn new(seed: u32) -> Self {
        Self {
            players: BTreeMap::new(),
            floors: BTreeMap::new(),
            rng: Rng::new(seed),
            next_player_id: 1,
            next_enemy_id: 1,
        }
    }

    /// Registers a new player at the center of the hub and returns its id.
    pub fn add_player(&mut self, name: String, class: Option<PlayerClass>, now_ms: u64) -> u32 {
        let id = self.next_player_id;
        self.next_player_id += 1;
        let spawn = self.floor_mut(HUB_FLOOR, now_ms).center();
        self.players
            .insert(id, Player::new(id, name, class, HUB_FLOOR, spawn, now_ms));
        id
    }

    pub fn remove_player(&mut self, id: u32) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn floor(&self, index: u8) -> Option<&Floor> {
        self.floors.get(&index)
    }

    /// Looks a floor up, building its initial content on first reference.
    pub fn floor_mut(&mut self, index: u8, now_ms: u64) -> &mut Floor {
        let Self {
            floors,
            rng,
            next_enemy_id,
            ..
        } = self;
        floors
            .entry(index)
            .or_insert_with(|| build_floor(index, now_ms, rng, next_enemy_id))
    }

    /// Replaces the enemy list of an existing floor with a fresh wave.
    pub fn respawn_wave(&mut self, index: u8, now_ms: u64) {
        let Self {
            floors,
            rng,
            next_enemy_id,
            ..
        } = self;
        if let Some(floor) = floors.get_mut(&index) {
            floor.enemies = generate_enemies(index, floor.width, floor.height, rng, next_enemy_id);
            floor.last_respawn_at = now_ms;
        }
    }

    pub fn spawn_enemy(
        &mut self,
        name: &str,
        kind: EnemyKind,
        (hp, attack, defense): (i32, i32, i32),
        (x, y): (f32, f32),
        boss: bool,
    ) -> Enemy {
        make_enemy(
            &mut self.next_enemy_id,
            name.to_string(),
            kind,
            (hp, attack, defense),
            (x, y),
            false,
            boss,
        )
    }

    pub fn calc_damage(&mut self, attack: i32, defense: i32) -> i32 {
        calc_damage(&mut self.rng, attack, defense)
    }

    pub fn players_on(&self, floor: u8) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(move |player| player.floor == floor)
    }

    pub fn living_players_on(&self, floor: u8) -> impl Iterator<Item = &Player> {
        self.players_on(floor).filter(|player| player.alive)
    }

    /// Floors that currently host at least one connected player.
    pub fn occupied_floors(&self) -> BTreeSet<u8> {
        self.players.values().map(|player| player.floor).collect()
    }

    /// Clamp-moves a player. A stance-locked archer stays put.
    pub fn move_player(&mut self, id: u32, dx: f32, dy: f32, now_ms: u64) {
        let Some(floor_index) = self.player(id).map(|player| player.floor) else {
            return;
        };
        let (width, height) = {
            let floor = self.floor_mut(floor_index, now_ms);
            (floor.width, floor.height)
        };
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if !player.alive || player.is_stance_locked() {
            return;
        }
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        player.x = (player.x + dx).clamp(0.0, width - 1.0);
        player.y = (player.y + dy).clamp(0.0, height - 1.0);
    }
}

/// `attack - defense` with a uniform jitter of two either way, never below one.
pub fn calc_damage(rng: &mut Rng, attack: i32, defense: i32) -> i32 {
    (attack - defense + rng.int(-2, 2)).max(1)
}

pub fn build_floor(index: u8, now_ms: u64, rng: &mut Rng, next_enemy_id: &mut u32) -> Floor {
    let (width, height) = get_map_size(index);
    let mut floor = Floor {
        index,
        width,
        height,
        enemies: Vec::new(),
        door: None,
        shield_until: 0,
        hazards: Vec::new(),
        last_respawn_at: now_ms,
        last_enemy_attack_at: now_ms,
        last_enemy_move_at: now_ms,
        boss: None,
    };

    if is_no_combat_floor(index) {
        floor.door = Some(Door {
            x: width / 2.0,
            y: 2.0,
            open: true,
        });
        return floor;
    }

    floor.enemies = generate_enemies(index, width, height, rng, next_enemy_id);
    if index == BOSS_FLOOR && floor.enemies.iter().any(|enemy| enemy.boss) {
        floor.boss = Some(BossEncounter::alive());
    }
    floor
}

pub fn generate_enemies(
    index: u8,
    width: f32,
    height: f32,
    rng: &mut Rng,
    next_enemy_id: &mut u32,
) -> Vec<Enemy> {
    let mut enemies = Vec::new();
    let random_pos =
        |rng: &mut Rng| (rng.range_f32(0.0, width - 1.0), rng.range_f32(0.0, height - 1.0));

    if is_no_combat_floor(index) {
        return enemies;
    }

    if index == BOSS_FLOOR {
        let pos = random_pos(rng);
        enemies.push(make_enemy(
            next_enemy_id,
            EXILE_NAME.to_string(),
            EnemyKind::Melee,
            EXILE_STATS,
            pos,
            false,
            true,
        ));
    } else if index == TOP_FLOOR {
        let pos = random_pos(rng);
        enemies.push(make_enemy(
            next_enemy_id,
            FLAME_LORD_NAME.to_string(),
            EnemyKind::Ranged,
            FLAME_LORD_STATS,
            pos,
            false,
            true,
        ));
    } else if index % 2 == 0 {
        let kind = if index % 4 == 0 {
            EnemyKind::Ranged
        } else {
            EnemyKind::Melee
        };
        let pos = random_pos(rng);
        enemies.push(make_enemy(
            next_enemy_id,
            format!("Guardian of Floor {index}"),
            kind,
            get_miniboss_stats(index),
            pos,
            true,
            false,
        ));
    } else {
        let (count, hp_scale, atk_scale) = get_wave_scaling(index);
        let f = index as i32;
        for _ in 0..count {
            let template = &MONSTER_POOL[rng.pick_index(MONSTER_POOL.len())];
            let stats = (
                template.hp + f * hp_scale,
                (template.attack as f32 + f as f32 * atk_scale) as i32,
                template.defense + f / 2,
            );
            let pos = random_pos(rng);
            enemies.push(make_enemy(
                next_enemy_id,
                template.name.to_string(),
                template.kind,
                stats,
                pos,
                false,
                false,
            ));
        }
    }
    enemies
}

fn make_enemy(
    next_enemy_id: &mut u32,
    name: String,
    kind: EnemyKind,
    (hp, attack, defense): (i32, i32, i32),
    (x, y): (f32, f32),
    miniboss: bool,
    boss: bool,
) -> Enemy {
    let id = *next_enemy_id;
    *next_enemy_id += 1;
    Enemy {
        id,
        name,
        kind,
        hp,
        max_hp: hp,
        attack,
        defense,
        x,
        y,
        miniboss,
        boss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SAFE_FLOOR;

    #[test]
    fn no_combat_floors_have_an_open_door_and_no_enemies() {
        let mut world = World::new(1);
        for index in [HUB_FLOOR, SAFE_FLOOR] {
            let floor = world.floor_mut(index, 0);
            assert!(floor.enemies.is_empty());
            let door = floor.door.expect("door present");
            assert!(door.open);
            assert_eq!(door.x, floor.width / 2.0);
            assert_eq!(door.y, 2.0);
        }
    }

    #[test]
    fn boss_floor_starts_with_the_exile_in_phase_one() {
        let mut world = World::new(2);
        let floor = world.floor_mut(BOSS_FLOOR, 0);
        assert_eq!(floor.enemies.len(), 1);
        assert!(floor.enemies[0].boss);
        assert_eq!(floor.enemies[0].max_hp, 500);
        let boss = floor.boss.as_ref().expect("encounter state");
        assert_eq!(boss.status, BossStatus::Alive);
        assert_eq!(boss.phase, Some(BossPhase::One));
        assert!(floor.door.is_none());
    }

    #[test]
    fn even_floors_get_a_miniboss_and_odd_floors_a_wave() {
        let mut world = World::new(3);
        let even = world.floor_mut(4, 0);
        assert_eq!(even.enemies.len(), 1);
        assert!(even.enemies[0].miniboss);
        assert_eq!(even.enemies[0].kind, EnemyKind::Ranged);
        assert_eq!(world.floor_mut(6, 0).enemies[0].kind, EnemyKind::Melee);

        let odd = world.floor_mut(3, 0);
        assert_eq!(odd.enemies.len(), 5);
        for enemy in &odd.enemies {
            assert!(enemy.x >= 0.0 && enemy.x <= odd.width - 1.0);
            assert!(enemy.y >= 0.0 && enemy.y <= odd.height - 1.0);
        }
    }

    #[test]
    fn floors_are_created_once_and_enemy_ids_are_unique() {
        let mut world = World::new(4);
        let first: Vec<u32> = world.floor_mut(5, 0).enemies.iter().map(|e| e.id).collect();
        let again: Vec<u32> = world.floor_mut(5, 99).enemies.iter().map(|e| e.id).collect();
        assert_eq!(first, again);
        world.respawn_wave(5, 100);
        let fresh: Vec<u32> = world.floor_mut(5, 100).enemies.iter().map(|e| e.id).collect();
        assert!(fresh.iter().all(|id| !first.contains(id)));
    }

    #[test]
    fn damage_is_never_below_one() {
        let mut rng = Rng::new(11);
        for _ in 0..500 {
            assert!(calc_damage(&mut rng, 3, 40) >= 1);
            let dmg = calc_damage(&mut rng, 20, 7);
            assert!((11..=15).contains(&dmg));
        }
    }

    #[test]
    fn moves_are_clamped_to_floor_bounds() {
        let mut world = World::new(5);
        let id = world.add_player("A".to_string(), Some(PlayerClass::Mage), 0);
        world.move_player(id, -100.0, 100.0, 0);
        let player = world.player(id).expect("player");
        assert_eq!((player.x, player.y), (0.0, 11.0));
    }

    #[test]
    fn ready_archer_cannot_move() {
        let mut world = World::new(6);
        let id = world.add_player("A".to_string(), Some(PlayerClass::Archer), 0);
        world
            .player_mut(id)
            .expect("player")
            .stance = crate::types::ArcherStance::Ready;
        world.move_player(id, 1.0, 1.0, 0);
        let player = world.player(id).expect("player");
        assert_eq!((player.x, player.y), (10.0, 6.0));
    }
}
