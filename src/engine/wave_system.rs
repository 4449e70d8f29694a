use super::GameEngine;
use crate::constants::{is_no_combat_floor, DOOR_RESPAWN_INTERVAL_MS, RESPAWN_INTERVAL_MS};
use crate::world::Door;

impl GameEngine {
    /// Opens the floor's door once nothing on it is alive. The first opening
    /// rolls the door position; later ones reuse it.
    pub(super) fn open_door_if_cleared(&mut self, index: u8, now_ms: u64) {
        let (width, height, existing) = match self.world.floor(index) {
            Some(floor)
                if !is_no_combat_floor(index) && !floor.door_open() && !floor.enemies_alive() =>
            {
                (floor.width, floor.height, floor.door)
            }
            _ => return,
        };
        let door = match existing {
            Some(door) => Door { open: true, ..door },
            None => Door {
                x: self.world.rng.range_f32(2.0, width - 2.0),
                y: self.world.rng.range_f32(2.0, height - 2.0),
                open: true,
            },
        };
        if let Some(floor) = self.world.floors.get_mut(&index) {
            floor.door = Some(door);
            floor.last_respawn_at = now_ms;
        }
        tracing::info!(floor = index, x = door.x, y = door.y, "door opened");
        self.event(index, format!("A door upward has opened on floor {index}!"));
    }

    pub(super) fn update_waves(&mut self, index: u8, now_ms: u64) {
        let Some(floor) = self.world.floor(index) else {
            return;
        };
        let alive = floor.enemies_alive();
        let elapsed = now_ms.saturating_sub(floor.last_respawn_at);
        let door = floor.door;

        match door {
            None if alive => {
                if elapsed < RESPAWN_INTERVAL_MS {
                    return;
                }
                self.world.respawn_wave(index, now_ms);
                tracing::info!(floor = index, "wave refreshed");
                self.event(index, format!("New enemies have appeared on floor {index}!"));
            }
            Some(door) if !alive => {
                if !door.open {
                    self.open_door_if_cleared(index, now_ms);
                    return;
                }
                if elapsed < DOOR_RESPAWN_INTERVAL_MS {
                    return;
                }
                self.world.respawn_wave(index, now_ms);
                if let Some(door) = self
                    .world
                    .floors
                    .get_mut(&index)
                    .and_then(|floor| floor.door.as_mut())
                {
                    door.open = false;
                }
                tracing::info!(floor = index, "door closed by a new wave");
                self.event(
                    index,
                    format!("The door on floor {index} slams shut as new enemies appear!"),
                );
            }
            None => self.open_door_if_cleared(index, now_ms),
            Some(_) => {}
        }
    }
}
