use super::combat_system::Actor;
use super::utils::dist2;
use super::GameEngine;
use crate::constants::{DOOR_ENTER_RADIUS, DOOR_HEAL_FRACTION, TOP_FLOOR};
use crate::error::CommandError;
use crate::types::Command;

const HELP_TEXT: &str = "Controls: move with WASD/arrows (hold), attack/heal with SPACE, special with Q, resurrect with R.\nClick an enemy or ally to target it; take the door to climb to the next floor.";

impl GameEngine {
    /// Runs one client command for `player_id`. Failures go back to that
    /// player as an error message and leave the world untouched.
    pub fn handle_command(&mut self, player_id: u32, command: Command, now_ms: u64) {
        let Some(player) = self.world.player(player_id) else {
            return;
        };
        let actor = Actor::of(player);
        let alive = player.alive;
        let changes_world = command.changes_world();

        let result = if !alive && !command.is_read_only() {
            Err(CommandError::Dead)
        } else {
            self.run_command(&actor, command, now_ms)
        };
        if let Err(err) = result {
            self.reject(player_id, err);
            return;
        }

        if changes_world {
            self.broadcast_floor_state(actor.floor, now_ms);
            let floor_now = self.world.player(player_id).map(|player| player.floor);
            if let Some(floor) = floor_now.filter(|floor| *floor != actor.floor) {
                self.broadcast_floor_state(floor, now_ms);
            }
        }
    }

    fn run_command(
        &mut self,
        actor: &Actor,
        command: Command,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        match command {
            Command::Move { dx, dy } => {
                self.world.move_player(actor.id, dx, dy, now_ms);
                Ok(())
            }
            Command::Attack {
                target_enemy_id,
                target_player_id,
            } => self.basic_attack(actor, target_enemy_id, target_player_id, now_ms),
            Command::Special { target_player_id } => {
                self.use_special(actor, target_player_id, now_ms)
            }
            Command::Resurrect {
                target_player_id,
                target_name,
            } => self.resurrect(actor, target_player_id, target_name.as_deref(), now_ms),
            Command::EnterDoor => self.enter_door(actor, now_ms),
            Command::Status => {
                self.send_state(actor.id, now_ms);
                Ok(())
            }
            Command::Who => {
                let roster = self.roster();
                self.notify(actor.id, roster);
                Ok(())
            }
            Command::Help => {
                self.notify(actor.id, HELP_TEXT.to_string());
                Ok(())
            }
            Command::Unknown(name) => {
                tracing::debug!(player_id = actor.id, command = %name, "unknown command");
                Err(CommandError::UnknownCommand)
            }
        }
    }

    fn roster(&self) -> String {
        let entries: Vec<String> = self
            .world
            .players
            .values()
            .map(|player| {
                format!(
                    "{}:{}({}){}",
                    player.id,
                    player.name,
                    player.class.label(),
                    if player.alive { "" } else { "†" }
                )
            })
            .collect();
        format!("Players: {}", entries.join(", "))
    }

    fn enter_door(&mut self, actor: &Actor, now_ms: u64) -> Result<(), CommandError> {
        let door = self
            .world
            .floor(actor.floor)
            .and_then(|floor| floor.door)
            .filter(|door| door.open)
            .ok_or(CommandError::DoorClosed)?;
        if dist2(actor.x, actor.y, door.x, door.y) > DOOR_ENTER_RADIUS * DOOR_ENTER_RADIUS {
            return Err(CommandError::TooFarFromDoor);
        }

        if actor.floor >= TOP_FLOOR {
            tracing::info!(player_id = actor.id, "tower completed");
            self.event(
                actor.floor,
                format!("{} reaches the top of the Tower. Victory!", actor.name),
            );
            return Ok(());
        }

        let next = actor.floor + 1;
        let spawn = self.world.floor_mut(next, now_ms).center();
        if let Some(player) = self.world.player_mut(actor.id) {
            player.floor = next;
            player.x = spawn.0;
            player.y = spawn.1;
            player.heal((player.max_hp as f32 * DOOR_HEAL_FRACTION) as i32);
            player.restore_mana((player.max_mana as f32 * DOOR_HEAL_FRACTION) as i32);
        }
        tracing::info!(player_id = actor.id, floor = next, "player climbed");
        self.event(next, format!("{} climbs to floor {next}.", actor.name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::types::{PlayerClass, ServerMessage};

    fn open_door_at(engine: &mut GameEngine, floor: u8, x: f32, y: f32) {
        let floor = engine.world.floor_mut(floor, T0);
        floor.enemies.clear();
        floor.door = Some(crate::world::Door { x, y, open: true });
    }

    #[test]
    fn dead_players_may_only_look() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        engine.world.player_mut(id).expect("player").take_damage(1_000, T0);
        engine.drain_outbox();

        engine.handle_command(id, Command::Move { dx: 1.0, dy: 0.0 }, T0);
        let out = engine.drain_outbox();
        assert_eq!(
            texts(&out, "error"),
            vec!["You are dead. Wait for a resurrection or the restart.".to_string()]
        );

        engine.handle_command(id, Command::Who, T0);
        let out = engine.drain_outbox();
        assert_eq!(texts(&out, "event"), vec!["Players: 1:Ayla(warrior)†".to_string()]);
        assert!(texts(&out, "error").is_empty());
    }

    #[test]
    fn roster_lists_everyone_in_join_order() {
        let mut engine = engine();
        let a = join(&mut engine, "A", PlayerClass::Warrior);
        join(&mut engine, "B", PlayerClass::Mage);
        engine.drain_outbox();

        engine.handle_command(a, Command::Who, T0);
        assert_eq!(
            texts(&engine.drain_outbox(), "event"),
            vec!["Players: 1:A(warrior), 2:B(mage)".to_string()]
        );
    }

    #[test]
    fn move_broadcasts_the_floor_and_unknown_does_not() {
        let mut engine = engine();
        let a = join(&mut engine, "A", PlayerClass::Warrior);
        let b = join(&mut engine, "B", PlayerClass::Mage);
        engine.drain_outbox();

        engine.handle_command(a, Command::Move { dx: 0.5, dy: -0.5 }, T0);
        let out = engine.drain_outbox();
        let player = engine.world.player(a).expect("player");
        assert_eq!((player.x, player.y), (10.5, 5.5));
        for id in [a, b] {
            assert!(to_player(&out, id)
                .iter()
                .any(|m| matches!(m, ServerMessage::State { .. })));
        }

        engine.handle_command(a, Command::Unknown("dance".to_string()), T0);
        let out = engine.drain_outbox();
        assert_eq!(texts(&out, "error"), vec!["Unknown command.".to_string()]);
        assert!(!out.iter().any(|o| matches!(o.message, ServerMessage::State { .. })));
    }

    #[test]
    fn status_resends_only_to_the_caller() {
        let mut engine = engine();
        let a = join(&mut engine, "A", PlayerClass::Archer);
        let b = join(&mut engine, "B", PlayerClass::Mage);
        engine.drain_outbox();

        engine.handle_command(a, Command::Status, T0);
        let out = engine.drain_outbox();
        assert_eq!(to_player(&out, a).len(), 1);
        assert!(engine.recipients(out[0].audience).contains(&a));
        assert!(!engine.recipients(out[0].audience).contains(&b));
    }

    #[test]
    fn help_is_sent_privately() {
        let mut engine = engine();
        let a = join(&mut engine, "A", PlayerClass::Healer);
        engine.drain_outbox();
        engine.handle_command(a, Command::Help, T0);
        let out = engine.drain_outbox();
        assert_eq!(to_player(&out, a).len(), 1);
        assert!(texts(&out, "event")[0].starts_with("Controls:"));
    }

    #[test]
    fn entering_the_door_climbs_one_floor_and_restores_some_vitals() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Mage);
        place(&mut engine, id, 3, 7.0, 4.0);
        open_door_at(&mut engine, 3, 7.3, 4.3);
        {
            let player = engine.world.player_mut(id).expect("player");
            player.set_hp(10);
            player.set_mana(0);
        }
        engine.drain_outbox();

        engine.handle_command(id, Command::EnterDoor, T0);
        let player = engine.world.player(id).expect("player");
        assert_eq!(player.floor, 4);
        assert_eq!((player.x, player.y), (10.0, 6.0));
        assert_eq!(player.hp(), 10 + 27);
        assert_eq!(player.mana(), 21);
        assert!(texts(&engine.drain_outbox(), "event")
            .contains(&"Ayla climbs to floor 4.".to_string()));
    }

    #[test]
    fn door_must_be_open_and_close_by() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Mage);
        place(&mut engine, id, 3, 1.0, 1.0);
        engine.drain_outbox();

        engine.handle_command(id, Command::EnterDoor, T0);
        assert_eq!(
            texts(&engine.drain_outbox(), "error"),
            vec!["The door is not open yet.".to_string()]
        );

        open_door_at(&mut engine, 3, 5.0, 5.0);
        engine.handle_command(id, Command::EnterDoor, T0);
        assert_eq!(
            texts(&engine.drain_outbox(), "error"),
            vec!["Step right up to the door to enter.".to_string()]
        );
        assert_eq!(engine.world.player(id).expect("player").floor, 3);
    }

    #[test]
    fn top_floor_door_declares_victory_without_moving() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, TOP_FLOOR, 5.0, 5.0);
        open_door_at(&mut engine, TOP_FLOOR, 5.0, 5.0);
        engine.drain_outbox();

        engine.handle_command(id, Command::EnterDoor, T0);
        assert_eq!(engine.world.player(id).expect("player").floor, TOP_FLOOR);
        assert!(texts(&engine.drain_outbox(), "event")
            .contains(&"Ayla reaches the top of the Tower. Victory!".to_string()));
    }

    #[test]
    fn hub_door_leads_to_floor_one() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Archer);
        place(&mut engine, id, 0, 10.0, 2.0);
        engine.handle_command(id, Command::EnterDoor, T0);
        assert_eq!(engine.world.player(id).expect("player").floor, 1);
        assert!(engine.world.floor(1).is_some_and(|floor| floor.enemies_alive()));
    }
}
