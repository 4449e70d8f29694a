use super::combat_system::incoming_damage;
use super::utils::{dist2, nearest, step_toward};
use super::GameEngine;
use crate::constants::{
    ENEMY_APPROACH_STEP, ENEMY_ATTACK_DELAY_MS, ENEMY_MIN_GAP, ENEMY_MOVE_INTERVAL_MS,
    ENEMY_PATH_STEP, FINAL_BOSS_TARGETS, MELEE_RANGE, TOP_FLOOR,
};
use crate::entities::Enemy;
use crate::types::{ActorKind, AttackEvent, EnemyKind, TargetRef};
use crate::world;

impl GameEngine {
    /// Walks living melee enemies a short step toward the nearest living player.
    pub(super) fn move_enemies(&mut self, index: u8, now_ms: u64) {
        let targets: Vec<(f32, f32)> = self
            .world
            .living_players_on(index)
            .map(|player| (player.x, player.y))
            .collect();
        let Some(floor) = self.world.floors.get_mut(&index) else {
            return;
        };
        if now_ms.saturating_sub(floor.last_enemy_move_at) < ENEMY_MOVE_INTERVAL_MS {
            return;
        }
        floor.last_enemy_move_at = now_ms;
        if targets.is_empty() {
            return;
        }

        let (max_x, max_y) = (floor.width - 1.0, floor.height - 1.0);
        for enemy in floor
            .enemies
            .iter_mut()
            .filter(|enemy| enemy.is_alive() && enemy.kind == EnemyKind::Melee)
        {
            let Some(t) = nearest(enemy.x, enemy.y, targets.iter().copied()) else {
                continue;
            };
            let (tx, ty) = targets[t];
            let gap = dist2(enemy.x, enemy.y, tx, ty).sqrt();
            if gap <= ENEMY_MIN_GAP {
                continue;
            }
            let step = ENEMY_PATH_STEP.min(gap - ENEMY_MIN_GAP);
            let (x, y) = step_toward((enemy.x, enemy.y), (tx, ty), step);
            enemy.x = x.clamp(0.0, max_x);
            enemy.y = y.clamp(0.0, max_y);
        }
    }

    /// One round of enemy attacks, at most once per attack delay. Melee
    /// enemies out of reach close in instead of striking.
    pub(super) fn enemy_attack_pass(&mut self, index: u8, now_ms: u64) {
        let Some(floor) = self.world.floors.get_mut(&index) else {
            return;
        };
        if now_ms.saturating_sub(floor.last_enemy_attack_at) < ENEMY_ATTACK_DELAY_MS {
            return;
        }
        if !floor.enemies_alive() {
            return;
        }
        floor.last_enemy_attack_at = now_ms;
        let shielded = floor.shield_active(now_ms);
        let attackers: Vec<usize> = floor
            .enemies
            .iter()
            .enumerate()
            .filter(|(_, enemy)| enemy.is_alive())
            .map(|(idx, _)| idx)
            .collect();

        for idx in attackers {
            let living: Vec<(u32, f32, f32)> = self
                .world
                .living_players_on(index)
                .map(|player| (player.id, player.x, player.y))
                .collect();
            if living.is_empty() {
                break;
            }
            let Some(enemy) = self
                .world
                .floor(index)
                .and_then(|floor| floor.enemies.get(idx))
                .cloned()
            else {
                continue;
            };

            if index == TOP_FLOOR && enemy.boss && enemy.kind == EnemyKind::Ranged {
                let mut by_distance = living;
                by_distance.sort_by(|a, b| {
                    let da = dist2(enemy.x, enemy.y, a.1, a.2);
                    let db = dist2(enemy.x, enemy.y, b.1, b.2);
                    da.total_cmp(&db)
                });
                for (player_id, _, _) in by_distance.into_iter().take(FINAL_BOSS_TARGETS) {
                    self.enemy_strikes(index, &enemy, player_id, shielded, true, now_ms);
                }
                continue;
            }

            let spots = living.iter().map(|&(_, x, y)| (x, y));
            let Some(t) = nearest(enemy.x, enemy.y, spots) else {
                continue;
            };
            let (player_id, px, py) = living[t];
            if enemy.kind == EnemyKind::Melee
                && dist2(enemy.x, enemy.y, px, py) > MELEE_RANGE * MELEE_RANGE
            {
                if let Some(floor) = self.world.floors.get_mut(&index) {
                    let (x, y) = step_toward((enemy.x, enemy.y), (px, py), ENEMY_APPROACH_STEP);
                    let (x, y) = floor.clamp(x, y);
                    if let Some(moving) = floor.enemies.get_mut(idx) {
                        moving.x = x;
                        moving.y = y;
                    }
                }
                continue;
            }
            self.enemy_strikes(index, &enemy, player_id, shielded, false, now_ms);
        }

        self.open_door_if_cleared(index, now_ms);
    }

    fn enemy_strikes(
        &mut self,
        index: u8,
        enemy: &Enemy,
        player_id: u32,
        shielded: bool,
        final_boss: bool,
        now_ms: u64,
    ) {
        let Some(player) = self.world.players.get_mut(&player_id) else {
            return;
        };
        let base = world::calc_damage(&mut self.world.rng, enemy.attack, player.defense);
        let damage = incoming_damage(
            base,
            enemy.kind == EnemyKind::Melee,
            shielded,
            player.is_stance_locked(),
        );
        let died = player.take_damage(damage, now_ms);
        let (name, hp, x, y) = (player.name.clone(), player.hp(), player.x, player.y);

        self.event(
            index,
            format!(
                "{} attacks {name} for {damage} damage. ({hp} HP)",
                enemy.name
            ),
        );
        let homing = (enemy.kind == EnemyKind::Ranged).then_some(TargetRef {
            kind: ActorKind::Player,
            id: player_id,
        });
        self.attack(AttackEvent {
            floor: index,
            attacker_type: ActorKind::Enemy,
            attacker_id: enemy.id,
            attacker_name: enemy.name.clone(),
            from_x: enemy.x,
            from_y: enemy.y,
            target_type: ActorKind::Player,
            target_id: player_id,
            target_name: name.clone(),
            to_x: x,
            to_y: y,
            damage,
            special: final_boss,
            homing,
        });

        if died {
            tracing::info!(player_id, floor = index, enemy = %enemy.name, "player died");
            let msg = if final_boss {
                format!("{name} was slain by the final boss.")
            } else {
                format!("{name} has fallen on floor {index}!")
            };
            self.event(index, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::constants::SHIELD_LEASE_MS;
    use crate::types::{PlayerClass, ServerMessage};

    const FLOOR: u8 = 3;

    fn hp(engine: &GameEngine, id: u32) -> i32 {
        engine.world.player(id).expect("player").hp()
    }

    #[test]
    fn melee_enemies_step_toward_the_nearest_player() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        let enemy_id = only_enemy(&mut engine, FLOOR, (50, 5, 0), (5.0, 9.0));

        engine.move_enemies(FLOOR, T0 + 30);
        let moved = enemy(&engine, FLOOR, enemy_id);
        assert!((moved.y - 8.9).abs() < 1e-5);
        assert_eq!(moved.x, 5.0);
    }

    #[test]
    fn melee_enemies_keep_a_minimum_gap() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        let enemy_id = only_enemy(&mut engine, FLOOR, (50, 5, 0), (5.0, 5.3));

        engine.move_enemies(FLOOR, T0 + 30);
        let moved = enemy(&engine, FLOOR, enemy_id);
        assert!(dist2(moved.x, moved.y, 5.0, 5.0) >= ENEMY_MIN_GAP * ENEMY_MIN_GAP - 1e-5);

        engine.move_enemies(FLOOR, T0 + 60);
        assert!((enemy(&engine, FLOOR, enemy_id).y - moved.y).abs() < 1e-4);
    }

    #[test]
    fn ranged_enemies_hold_position() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        let enemy_id = only_enemy(&mut engine, FLOOR, (50, 5, 0), (5.0, 9.0));
        engine.world.floor_mut(FLOOR, T0).enemies[0].kind = EnemyKind::Ranged;

        engine.move_enemies(FLOOR, T0 + 30);
        assert_eq!(enemy(&engine, FLOOR, enemy_id).y, 9.0);
    }

    #[test]
    fn adjacent_melee_enemy_hits_three_times_harder() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        only_enemy(&mut engine, FLOOR, (50, 17, 0), (5.0, 6.0));
        engine.drain_outbox();

        engine.enemy_attack_pass(FLOOR, T0 + 1_000);
        let lost = 160 - hp(&engine, id);
        // (17 - 7 +/- 2) * 3
        assert!((24..=36).contains(&lost), "lost {lost}");
        assert_eq!(lost % 3, 0);
        let out = engine.drain_outbox();
        assert_eq!(attacks(&out), 1);
        assert!(out.iter().any(|o| matches!(
            &o.message,
            ServerMessage::Attack(ev) if ev.attacker_type == ActorKind::Enemy && ev.homing.is_none()
        )));
    }

    #[test]
    fn attack_pass_waits_for_the_delay() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        only_enemy(&mut engine, FLOOR, (50, 17, 0), (5.0, 6.0));

        engine.enemy_attack_pass(FLOOR, T0 + 999);
        assert_eq!(hp(&engine, id), 160);
    }

    #[test]
    fn shield_softens_enemy_hits() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        only_enemy(&mut engine, FLOOR, (50, 17, 0), (5.0, 6.0));
        engine.world.floor_mut(FLOOR, T0).shield_until = T0 + 1_000 + SHIELD_LEASE_MS;

        engine.enemy_attack_pass(FLOOR, T0 + 1_000);
        let lost = 160 - hp(&engine, id);
        // floor((17 - 7 +/- 2) * 3 * 0.6)
        assert!((14..=21).contains(&lost), "lost {lost}");
    }

    #[test]
    fn distant_melee_enemy_closes_in_instead_of_striking() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        let enemy_id = only_enemy(&mut engine, FLOOR, (50, 17, 0), (5.0, 9.0));

        engine.enemy_attack_pass(FLOOR, T0 + 1_000);
        assert_eq!(hp(&engine, id), 160);
        assert!((enemy(&engine, FLOOR, enemy_id).y - 8.8).abs() < 1e-5);
    }

    #[test]
    fn ranged_hits_home_in_on_the_player() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Warrior);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        only_enemy(&mut engine, FLOOR, (50, 17, 0), (5.0, 9.0));
        engine.world.floor_mut(FLOOR, T0).enemies[0].kind = EnemyKind::Ranged;
        engine.drain_outbox();

        engine.enemy_attack_pass(FLOOR, T0 + 1_000);
        let lost = 160 - hp(&engine, id);
        assert!((8..=12).contains(&lost), "lost {lost}");
        let out = engine.drain_outbox();
        assert!(out.iter().any(|o| matches!(
            &o.message,
            ServerMessage::Attack(ev) if ev.homing == Some(TargetRef { kind: ActorKind::Player, id })
        )));
    }

    #[test]
    fn final_boss_strikes_the_two_nearest() {
        let mut engine = engine();
        let near = join(&mut engine, "Near", PlayerClass::Warrior);
        let mid = join(&mut engine, "Mid", PlayerClass::Warrior);
        let far = join(&mut engine, "Far", PlayerClass::Warrior);
        place(&mut engine, near, TOP_FLOOR, 10.0, 7.0);
        place(&mut engine, mid, TOP_FLOOR, 10.0, 9.0);
        place(&mut engine, far, TOP_FLOOR, 10.0, 20.0);
        {
            let floor = engine.world.floor_mut(TOP_FLOOR, T0);
            floor.enemies.retain(|enemy| enemy.boss);
            floor.enemies[0].x = 10.0;
            floor.enemies[0].y = 6.0;
        }
        engine.drain_outbox();

        engine.enemy_attack_pass(TOP_FLOOR, T0 + 1_000);
        assert!(hp(&engine, near) < 160);
        assert!(hp(&engine, mid) < 160);
        assert_eq!(hp(&engine, far), 160);
        let out = engine.drain_outbox();
        assert!(out
            .iter()
            .filter_map(|o| match &o.message {
                ServerMessage::Attack(ev) => Some(ev.special),
                _ => None,
            })
            .all(|special| special));
    }

    #[test]
    fn a_killing_blow_is_announced() {
        let mut engine = engine();
        let id = join(&mut engine, "Ayla", PlayerClass::Mage);
        place(&mut engine, id, FLOOR, 5.0, 5.0);
        engine.world.player_mut(id).expect("player").set_hp(1);
        only_enemy(&mut engine, FLOOR, (50, 17, 0), (5.0, 6.0));
        engine.drain_outbox();

        engine.enemy_attack_pass(FLOOR, T0 + 1_000);
        assert!(!engine.world.player(id).expect("player").alive);
        assert!(texts(&engine.drain_outbox(), "event")
            .contains(&format!("Ayla has fallen on floor {FLOOR}!")));
    }
}
