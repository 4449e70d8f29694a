use crate::constants::{is_no_combat_floor, BOSS_FLOOR, HUB_FLOOR};
use crate::error::CommandError;
use crate::types::{AttackEvent, PlayerClass, ServerMessage};
use crate::world::World;

mod boss_system;
mod combat_system;
mod dispatch;
mod enemy_system;
mod regen_system;
mod snapshot;
mod utils;
mod wave_system;

pub use self::combat_system::incoming_damage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    Player(u32),
    /// Everyone standing on the floor when the message is delivered.
    Floor(u8),
}

#[derive(Clone, Debug)]
pub struct Outbound {
    pub audience: Audience,
    pub message: ServerMessage,
}

/// The simulation. Every entry point runs under the caller's lock and takes
/// the current monotonic time; messages produced along the way pile up in
/// the outbox until the network layer drains them.
#[derive(Debug)]
pub struct GameEngine {
    pub world: World,
    outbox: Vec<Outbound>,
}

impl GameEngine {
    pub fn new(seed: u32) -> Self {
        Self {
            world: World::new(seed),
            outbox: Vec::new(),
        }
    }

    pub fn add_player(&mut self, name: String, class: Option<PlayerClass>, now_ms: u64) -> u32 {
        let id = self.world.add_player(name, class, now_ms);
        let (name, class) = match self.world.player(id) {
            Some(player) => (player.name.clone(), player.class),
            None => return id,
        };
        tracing::info!(player_id = id, %name, class = class.label(), "player joined");
        self.send_to(
            id,
            ServerMessage::Welcome {
                msg: format!(
                    "Welcome, {name}! You are a {}. You start in the hub (floor {HUB_FLOOR}).",
                    class.label()
                ),
                player_id: id,
            },
        );
        self.send_state(id, now_ms);
        self.event(HUB_FLOOR, format!("{name} connected as {}.", class.label()));
        self.broadcast_floor_state(HUB_FLOOR, now_ms);
        id
    }

    pub fn remove_player(&mut self, id: u32, now_ms: u64) {
        let Some(player) = self.world.remove_player(id) else {
            return;
        };
        tracing::info!(player_id = id, floor = player.floor, "player left");
        self.event(
            player.floor,
            format!("{} disconnected from the server.", player.name),
        );
        self.broadcast_floor_state(player.floor, now_ms);
    }

    /// Advances every time-driven rule by one tick.
    pub fn step(&mut self, now_ms: u64) {
        self.update_players(now_ms);

        let indices: Vec<u8> = self.world.floors.keys().copied().collect();
        for index in indices {
            if is_no_combat_floor(index) {
                continue;
            }
            if self.world.living_players_on(index).next().is_none() {
                continue;
            }
            self.move_enemies(index, now_ms);
            self.enemy_attack_pass(index, now_ms);
            if index == BOSS_FLOOR {
                self.update_boss(index, now_ms);
            } else {
                self.update_waves(index, now_ms);
            }
        }

        for index in self.world.occupied_floors() {
            self.broadcast_floor_state(index, now_ms);
        }
    }

    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Resolves an audience against the current registry.
    pub fn recipients(&self, audience: Audience) -> Vec<u32> {
        match audience {
            Audience::Player(id) => vec![id],
            Audience::Floor(index) => self.world.players_on(index).map(|p| p.id).collect(),
        }
    }

    pub(crate) fn send_to(&mut self, player_id: u32, message: ServerMessage) {
        self.outbox.push(Outbound {
            audience: Audience::Player(player_id),
            message,
        });
    }

    pub(crate) fn event(&mut self, floor: u8, msg: String) {
        tracing::debug!(floor, %msg, "floor event");
        self.outbox.push(Outbound {
            audience: Audience::Floor(floor),
            message: ServerMessage::Event { msg },
        });
    }

    pub(crate) fn notify(&mut self, player_id: u32, msg: String) {
        self.send_to(player_id, ServerMessage::Event { msg });
    }

    pub(crate) fn reject(&mut self, player_id: u32, err: CommandError) {
        tracing::debug!(player_id, error = %err, "command rejected");
        self.send_to(
            player_id,
            ServerMessage::Error {
                msg: err.to_string(),
            },
        );
    }

    pub(crate) fn attack(&mut self, event: AttackEvent) {
        self.outbox.push(Outbound {
            audience: Audience::Floor(event.floor),
            message: ServerMessage::Attack(event),
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Audience, GameEngine, Outbound};
    use crate::entities::Enemy;
    use crate::types::{EnemyKind, PlayerClass, ServerMessage};

    pub const T0: u64 = 1_000;

    pub fn engine() -> GameEngine {
        GameEngine::new(42)
    }

    pub fn join(engine: &mut GameEngine, name: &str, class: PlayerClass) -> u32 {
        engine.add_player(name.to_string(), Some(class), T0)
    }

    /// Moves a player onto a floor (creating it) at the given spot.
    pub fn place(engine: &mut GameEngine, id: u32, floor: u8, x: f32, y: f32) {
        engine.world.floor_mut(floor, T0);
        let player = engine.world.player_mut(id).expect("player exists");
        player.floor = floor;
        player.x = x;
        player.y = y;
    }

    /// Replaces a floor's enemies with one hand-made enemy and returns its id.
    pub fn only_enemy(
        engine: &mut GameEngine,
        floor: u8,
        (hp, attack, defense): (i32, i32, i32),
        (x, y): (f32, f32),
    ) -> u32 {
        let enemy = engine
            .world
            .spawn_enemy("Dummy", EnemyKind::Melee, (hp, attack, defense), (x, y), false);
        let id = enemy.id;
        engine.world.floor_mut(floor, T0).enemies = vec![enemy];
        id
    }

    pub fn enemy(engine: &GameEngine, floor: u8, id: u32) -> Enemy {
        engine
            .world
            .floor(floor)
            .and_then(|f| f.enemies.iter().find(|e| e.id == id))
            .cloned()
            .expect("enemy exists")
    }

    pub fn texts(outbox: &[Outbound], kind: &str) -> Vec<String> {
        outbox
            .iter()
            .filter_map(|out| match (&out.message, kind) {
                (ServerMessage::Event { msg }, "event") => Some(msg.clone()),
                (ServerMessage::Error { msg }, "error") => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn attacks(outbox: &[Outbound]) -> usize {
        outbox
            .iter()
            .filter(|out| matches!(out.message, ServerMessage::Attack(_)))
            .count()
    }

    pub fn to_player(outbox: &[Outbound], id: u32) -> Vec<&ServerMessage> {
        outbox
            .iter()
            .filter(|out| out.audience == Audience::Player(id))
            .map(|out| &out.message)
            .collect()
    }
}
