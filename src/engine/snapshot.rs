use super::GameEngine;
use crate::constants::{
    is_no_combat_floor, BOSS_FLOOR, BOSS_RESPAWN_INTERVAL_MS, BOSS_SPAWN_TELEGRAPH_MS,
    DOOR_RESPAWN_INTERVAL_MS, EMBER_ACTIVE_MS, EMBER_TELEGRAPH_MS, RESPAWN_INTERVAL_MS,
};
use crate::entities::{Enemy, Player};
use crate::types::{
    DoorView, EnemyView, HazardKind, HazardView, LevelView, PlayerView, SelfView, ServerMessage,
};
use crate::world::{BossStatus, Floor, Hazard};

impl GameEngine {
    /// The full view one player gets of themselves, their floor and the
    /// players sharing it.
    pub fn state_for(&self, player_id: u32, now_ms: u64) -> Option<ServerMessage> {
        let me = self.world.player(player_id)?;
        let floor = self.world.floor(me.floor)?;
        Some(ServerMessage::State {
            you: self_view(me, now_ms),
            level: level_view(floor, now_ms),
            players: self.world.players_on(me.floor).map(player_view).collect(),
        })
    }

    pub(crate) fn send_state(&mut self, player_id: u32, now_ms: u64) {
        if let Some(state) = self.state_for(player_id, now_ms) {
            self.send_to(player_id, state);
        }
    }

    pub(crate) fn broadcast_floor_state(&mut self, floor: u8, now_ms: u64) {
        let ids: Vec<u32> = self.world.players_on(floor).map(|player| player.id).collect();
        for id in ids {
            self.send_state(id, now_ms);
        }
    }
}

fn self_view(player: &Player, now_ms: u64) -> SelfView {
    SelfView {
        id: player.id,
        name: player.name.clone(),
        class: player.class,
        hp: player.hp(),
        max_hp: player.max_hp,
        mana: player.mana(),
        max_mana: player.max_mana,
        floor: player.floor,
        alive: player.alive,
        x: player.x,
        y: player.y,
        archer_stance: player.stance,
        special_cd: player.special_cd_ms as f32 / 1000.0,
        special_cd_left: player.special_remaining_ms(now_ms) as f32 / 1000.0,
    }
}

fn player_view(player: &Player) -> PlayerView {
    PlayerView {
        id: player.id,
        name: player.name.clone(),
        class: player.class,
        hp: player.hp(),
        max_hp: player.max_hp,
        mana: player.mana(),
        max_mana: player.max_mana,
        floor: player.floor,
        alive: player.alive,
        x: player.x,
        y: player.y,
        archer_stance: player.stance,
    }
}

fn enemy_view(enemy: &Enemy) -> EnemyView {
    EnemyView {
        id: enemy.id,
        name: enemy.name.clone(),
        kind: enemy.kind,
        hp: enemy.hp,
        max_hp: enemy.max_hp,
        boss: enemy.boss,
        miniboss: enemy.miniboss,
        x: enemy.x,
        y: enemy.y,
    }
}

fn hazard_view(hazard: &Hazard, now_ms: u64) -> HazardView {
    let age = now_ms.saturating_sub(hazard.started_at());
    let (kind, active, left_ms) = match hazard {
        Hazard::BossSpawn { .. } => (
            HazardKind::BossSpawn,
            false,
            BOSS_SPAWN_TELEGRAPH_MS.saturating_sub(age),
        ),
        Hazard::Ember { .. } if age < EMBER_TELEGRAPH_MS => {
            (HazardKind::Ember, false, EMBER_TELEGRAPH_MS - age)
        }
        Hazard::Ember { .. } => (
            HazardKind::Ember,
            true,
            (EMBER_TELEGRAPH_MS + EMBER_ACTIVE_MS).saturating_sub(age),
        ),
    };
    let (x, y) = hazard.center();
    HazardView {
        kind,
        x,
        y,
        radius: hazard.radius(),
        active,
        time_left: left_ms as f32 / 1000.0,
    }
}

/// Whole seconds until the next scheduled refresh of the floor, or zero when
/// nothing is pending.
fn next_respawn_in(floor: &Floor, now_ms: u64) -> u64 {
    if is_no_combat_floor(floor.index) {
        return 0;
    }
    if floor.index == BOSS_FLOOR {
        return match floor.boss.as_ref().map(|boss| boss.status) {
            Some(BossStatus::Dead { died_at }) => {
                BOSS_RESPAWN_INTERVAL_MS.saturating_sub(now_ms.saturating_sub(died_at)) / 1000
            }
            Some(BossStatus::Telegraph { started_at }) => {
                BOSS_SPAWN_TELEGRAPH_MS.saturating_sub(now_ms.saturating_sub(started_at)) / 1000
            }
            _ => 0,
        };
    }
    let elapsed = now_ms.saturating_sub(floor.last_respawn_at);
    match (floor.door, floor.enemies_alive()) {
        (None, true) => RESPAWN_INTERVAL_MS.saturating_sub(elapsed) / 1000,
        (Some(_), false) => DOOR_RESPAWN_INTERVAL_MS.saturating_sub(elapsed) / 1000,
        _ => 0,
    }
}

fn level_view(floor: &Floor, now_ms: u64) -> LevelView {
    let boss = floor.boss.as_ref();
    LevelView {
        floor: floor.index,
        width: floor.width,
        height: floor.height,
        shield_active: floor.shield_active(now_ms),
        enemies: floor
            .enemies
            .iter()
            .filter(|enemy| enemy.is_alive())
            .map(enemy_view)
            .collect(),
        next_respawn_in: next_respawn_in(floor, now_ms),
        door: DoorView {
            open: floor.door_open(),
            x: floor.door.map(|door| door.x),
            y: floor.door.map(|door| door.y),
        },
        hazards: floor
            .hazards
            .iter()
            .map(|hazard| hazard_view(hazard, now_ms))
            .collect(),
        boss_phase: boss.and_then(|boss| boss.phase).map(|phase| phase.index()),
        boss_spawn_circle: floor
            .hazards
            .iter()
            .find(|hazard| hazard.is_boss_spawn())
            .map(|hazard| hazard_view(hazard, now_ms)),
        boss_adds_alive: boss.map(|boss| boss.adds_alive),
    }
}
