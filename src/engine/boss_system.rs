use super::utils::dist2;
use super::GameEngine;
use crate::constants::{
    BOSS_PHASE2_DEF_BONUS, BOSS_PHASE2_THRESHOLD, BOSS_RESPAWN_DAMAGE_FRACTION,
    BOSS_RESPAWN_INTERVAL_MS, BOSS_SPAWN_RADIUS, BOSS_SPAWN_TELEGRAPH_MS, EMBER_ACTIVE_MS,
    EMBER_DAMAGE, EMBER_MAX_CIRCLES, EMBER_RADIUS, EMBER_SPAWN_INTERVAL_MS, EMBER_TELEGRAPH_MS,
    EXILE_NAME, EXILE_STATS,
};
use crate::types::{BossPhase, EnemyKind};
use crate::world::{BossEncounter, BossStatus, Hazard};

impl GameEngine {
    /// Phase one gives way to phase two once, when a hit leaves the boss at or
    /// under the threshold. Later phases are never entered.
    pub(super) fn check_boss_phase(&mut self, index: u8, idx: usize) {
        let Some(floor) = self.world.floors.get_mut(&index) else {
            return;
        };
        let (Some(encounter), Some(enemy)) = (floor.boss.as_mut(), floor.enemies.get_mut(idx))
        else {
            return;
        };
        if !enemy.boss || !enemy.is_alive() {
            return;
        }
        if encounter.phase.is_none() {
            encounter.phase = Some(BossPhase::One);
        }
        if encounter.phase != Some(BossPhase::One)
            || enemy.hp as f32 > enemy.max_hp as f32 * BOSS_PHASE2_THRESHOLD
        {
            return;
        }
        encounter.phase = Some(BossPhase::Two);
        encounter.last_ember_at = 0;
        enemy.defense += BOSS_PHASE2_DEF_BONUS;
        tracing::info!(floor = index, hp = enemy.hp, "boss entered phase two");
        self.event(
            index,
            format!(
                "{EXILE_NAME} is encased in a crust of ash: his armor hardens and green circles flare across the floor."
            ),
        );
    }

    pub(super) fn on_boss_death(&mut self, index: u8, now_ms: u64) {
        let Some(floor) = self.world.floors.get_mut(&index) else {
            return;
        };
        let encounter = floor.boss.get_or_insert_with(BossEncounter::alive);
        encounter.status = BossStatus::Dead { died_at: now_ms };
        encounter.phase = None;
        floor.hazards.clear();
        tracing::info!(floor = index, "boss defeated");
        self.open_door_if_cleared(index, now_ms);
    }

    pub(super) fn update_boss(&mut self, index: u8, now_ms: u64) {
        let Some(floor) = self.world.floors.get_mut(&index) else {
            return;
        };
        let boss_alive = floor.enemies.iter().any(|enemy| enemy.boss && enemy.is_alive());
        let center = floor.center();
        let Some(encounter) = floor.boss.as_mut() else {
            return;
        };

        if boss_alive {
            encounter.status = BossStatus::Alive;
            let in_phase_two = encounter.phase == Some(BossPhase::Two);
            floor.hazards.retain(|hazard| !hazard.is_boss_spawn());
            if in_phase_two {
                self.update_embers(index, now_ms);
            }
            return;
        }

        match encounter.status {
            BossStatus::Telegraph { started_at } => {
                if now_ms.saturating_sub(started_at) >= BOSS_SPAWN_TELEGRAPH_MS {
                    self.spawn_boss_from_circle(index, now_ms);
                }
            }
            BossStatus::Dead { died_at } => {
                if now_ms.saturating_sub(died_at) < BOSS_RESPAWN_INTERVAL_MS {
                    return;
                }
                encounter.status = BossStatus::Telegraph { started_at: now_ms };
                floor.hazards.retain(|hazard| !hazard.is_boss_spawn());
                floor.hazards.push(Hazard::BossSpawn {
                    x: center.0,
                    y: center.1,
                    radius: BOSS_SPAWN_RADIUS,
                    started_at: now_ms,
                });
                tracing::info!(floor = index, "boss spawn telegraph started");
                self.event(
                    index,
                    format!("Green fire flares underfoot: {EXILE_NAME} is preparing to return..."),
                );
            }
            // No boss and no recorded death: nothing to bring back.
            BossStatus::Alive => {}
        }
    }

    fn spawn_boss_from_circle(&mut self, index: u8, now_ms: u64) {
        let Some(floor) = self.world.floor(index) else {
            return;
        };
        let circle = floor
            .hazards
            .iter()
            .find(|hazard| hazard.is_boss_spawn())
            .cloned()
            .unwrap_or_else(|| {
                let (x, y) = floor.center();
                Hazard::BossSpawn {
                    x,
                    y,
                    radius: BOSS_SPAWN_RADIUS,
                    started_at: now_ms,
                }
            });

        let caught: Vec<u32> = self
            .world
            .living_players_on(index)
            .filter(|player| circle.contains(player.x, player.y))
            .map(|player| player.id)
            .collect();
        for id in caught {
            let Some(player) = self.world.player_mut(id) else {
                continue;
            };
            let damage = ((player.hp() as f32 * BOSS_RESPAWN_DAMAGE_FRACTION) as i32).max(1);
            let died = player.take_damage(damage, now_ms);
            let name = player.name.clone();
            if died {
                tracing::info!(player_id = id, floor = index, "player died to boss spawn");
                self.event(
                    index,
                    format!("{name} was burned by green fire as {EXILE_NAME} returned."),
                );
            } else {
                self.event(
                    index,
                    format!("{name} is seared by the green flame for {damage} damage."),
                );
            }
        }

        let boss = self.world.spawn_enemy(
            EXILE_NAME,
            EnemyKind::Melee,
            EXILE_STATS,
            circle.center(),
            true,
        );
        if let Some(floor) = self.world.floors.get_mut(&index) {
            floor.enemies.push(boss);
            floor.boss = Some(BossEncounter::alive());
            floor.hazards.retain(|hazard| !hazard.is_boss_spawn());
            if let Some(door) = floor.door.as_mut() {
                door.open = false;
            }
        }
        tracing::info!(floor = index, "boss respawned");
        self.event(index, format!("{EXILE_NAME} rises from the green fire!"));
    }

    /// Phase-two circles: expire old ones, strike players inside active ones,
    /// and seed a new one on the interval.
    fn update_embers(&mut self, index: u8, now_ms: u64) {
        let living: Vec<(u32, f32, f32)> = self
            .world
            .living_players_on(index)
            .map(|player| (player.id, player.x, player.y))
            .collect();
        let Some(floor) = self.world.floors.get_mut(&index) else {
            return;
        };
        let lifetime = EMBER_TELEGRAPH_MS + EMBER_ACTIVE_MS;
        floor.hazards.retain(|hazard| match hazard {
            Hazard::Ember { started_at, .. } => now_ms.saturating_sub(*started_at) < lifetime,
            Hazard::BossSpawn { .. } => true,
        });

        let mut struck_players = Vec::new();
        for hazard in floor.hazards.iter_mut() {
            let Hazard::Ember {
                x,
                y,
                radius,
                started_at,
                struck,
            } = hazard
            else {
                continue;
            };
            if now_ms.saturating_sub(*started_at) < EMBER_TELEGRAPH_MS {
                continue;
            }
            for (id, px, py) in &living {
                if dist2(*x, *y, *px, *py) <= *radius * *radius && struck.insert(*id) {
                    struck_players.push(*id);
                }
            }
        }

        let embers = floor
            .hazards
            .iter()
            .filter(|hazard| matches!(hazard, Hazard::Ember { .. }))
            .count();
        let (width, height) = (floor.width, floor.height);
        if let Some(encounter) = floor.boss.as_mut() {
            if embers < EMBER_MAX_CIRCLES
                && now_ms.saturating_sub(encounter.last_ember_at) >= EMBER_SPAWN_INTERVAL_MS
            {
                encounter.last_ember_at = now_ms;
                let x = self.world.rng.range_f32(0.0, width - 1.0);
                let y = self.world.rng.range_f32(0.0, height - 1.0);
                floor.hazards.push(Hazard::Ember {
                    x,
                    y,
                    radius: EMBER_RADIUS,
                    started_at: now_ms,
                    struck: Default::default(),
                });
            }
        }

        for id in struck_players {
            let Some(player) = self.world.player_mut(id) else {
                continue;
            };
            let died = player.take_damage(EMBER_DAMAGE, now_ms);
            let name = player.name.clone();
            if died {
                tracing::info!(player_id = id, floor = index, "player died to ember");
                self.event(index, format!("{name} is consumed by the green flame."));
            } else {
                self.event(
                    index,
                    format!("{name} is scorched by a green circle for {EMBER_DAMAGE} damage."),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::constants::{BOSS_FLOOR, TICK_MS};
    use crate::types::PlayerClass;
    use std::collections::BTreeSet;

    fn boss_floor_with(engine: &mut GameEngine, class: PlayerClass, x: f32, y: f32) -> u32 {
        let id = join(engine, "Hero", class);
        place(engine, id, BOSS_FLOOR, x, y);
        id
    }

    fn phase(engine: &GameEngine) -> Option<BossPhase> {
        engine
            .world
            .floor(BOSS_FLOOR)
            .and_then(|floor| floor.boss.as_ref())
            .and_then(|boss| boss.phase)
    }

    #[test]
    fn phase_two_is_entered_exactly_once() {
        let mut engine = engine();
        boss_floor_with(&mut engine, PlayerClass::Mage, 1.0, 1.0);
        engine.drain_outbox();

        engine.damage_enemy(BOSS_FLOOR, 0, 130, T0).expect("boss hit");
        assert_eq!(phase(&engine), Some(BossPhase::Two));
        let boss = &engine.world.floor(BOSS_FLOOR).expect("floor").enemies[0];
        assert_eq!(boss.hp, 370);
        assert_eq!(boss.defense, 6);

        engine.damage_enemy(BOSS_FLOOR, 0, 50, T0).expect("boss hit");
        assert_eq!(phase(&engine), Some(BossPhase::Two));
        assert_eq!(engine.world.floor(BOSS_FLOOR).expect("floor").enemies[0].defense, 6);

        let narrative = texts(&engine.drain_outbox(), "event")
            .into_iter()
            .filter(|msg| msg.contains("crust of ash"))
            .count();
        assert_eq!(narrative, 1);
    }

    #[test]
    fn one_fireball_tips_the_boss_into_phase_two() {
        let mut engine = engine();
        let mage = boss_floor_with(&mut engine, PlayerClass::Mage, 1.0, 1.0);
        let add = engine.world.spawn_enemy(
            "Ash Wraith",
            crate::types::EnemyKind::Melee,
            (60, 5, 1),
            (3.0, 3.0),
            false,
        );
        {
            let floor = engine.world.floor_mut(BOSS_FLOOR, T0);
            floor.enemies[0].hp = 385;
            floor.enemies.push(add);
        }
        engine.drain_outbox();

        engine.handle_command(
            mage,
            crate::types::Command::Special {
                target_player_id: None,
            },
            T0,
        );
        let out = engine.drain_outbox();
        assert!(texts(&out, "error").is_empty());

        assert_eq!(phase(&engine), Some(BossPhase::Two));
        let floor = engine.world.floor(BOSS_FLOOR).expect("floor");
        // Fireball lands for (16 + 5 - 4) ± 2 before the armor hardens.
        assert!((366..=370).contains(&floor.enemies[0].hp));
        assert_eq!(floor.enemies[0].defense, 6);
        assert_eq!(attacks(&out), 2);
        let narrative = texts(&out, "event")
            .into_iter()
            .filter(|msg| msg.contains("crust of ash"))
            .count();
        assert_eq!(narrative, 1);
        assert_eq!(engine.world.player(mage).expect("mage").mana(), 55);
    }

    #[test]
    fn phase_stays_one_above_threshold() {
        let mut engine = engine();
        boss_floor_with(&mut engine, PlayerClass::Mage, 1.0, 1.0);
        engine.damage_enemy(BOSS_FLOOR, 0, 124, T0).expect("boss hit");
        assert_eq!(phase(&engine), Some(BossPhase::One));
    }

    #[test]
    fn boss_returns_thirty_minutes_after_death_through_a_telegraph() {
        let mut engine = engine();
        let hero = boss_floor_with(&mut engine, PlayerClass::Warrior, 10.0, 6.0);
        let bystander = join(&mut engine, "Far", PlayerClass::Warrior);
        place(&mut engine, bystander, BOSS_FLOOR, 0.0, 0.0);

        engine.damage_enemy(BOSS_FLOOR, 0, 10_000, T0).expect("boss hit");
        let floor = engine.world.floor(BOSS_FLOOR).expect("floor");
        assert!(matches!(
            floor.boss.as_ref().map(|b| b.status),
            Some(BossStatus::Dead { died_at: T0 })
        ));
        assert!(floor.door_open());

        let due = T0 + BOSS_RESPAWN_INTERVAL_MS;
        engine.step(due - TICK_MS);
        assert!(engine.world.floor(BOSS_FLOOR).expect("floor").hazards.is_empty());

        engine.step(due);
        let floor = engine.world.floor(BOSS_FLOOR).expect("floor");
        assert_eq!(
            floor.hazards,
            vec![Hazard::BossSpawn {
                x: 10.0,
                y: 6.0,
                radius: BOSS_SPAWN_RADIUS,
                started_at: due,
            }]
        );

        engine.step(due + BOSS_SPAWN_TELEGRAPH_MS - 1);
        assert!(!engine
            .world
            .floor(BOSS_FLOOR)
            .expect("floor")
            .enemies_alive());

        engine.step(due + BOSS_SPAWN_TELEGRAPH_MS);
        let floor = engine.world.floor(BOSS_FLOOR).expect("floor");
        let boss = floor
            .enemies
            .iter()
            .find(|enemy| enemy.is_alive())
            .expect("new boss");
        assert_eq!((boss.x, boss.y), (10.0, 6.0));
        assert_eq!(boss.hp, 500);
        assert_eq!(phase(&engine), Some(BossPhase::One));
        assert!(floor.hazards.is_empty());
        assert!(!floor.door_open());

        assert_eq!(engine.world.player(hero).expect("hero").hp(), 80);
        assert_eq!(engine.world.player(bystander).expect("bystander").hp(), 160);
    }

    #[test]
    fn ember_strikes_each_player_once_while_active() {
        let mut engine = engine();
        let hero = boss_floor_with(&mut engine, PlayerClass::Warrior, 1.0, 1.0);
        {
            let floor = engine.world.floor_mut(BOSS_FLOOR, T0);
            floor.enemies[0].x = 18.0;
            floor.enemies[0].y = 10.0;
            let encounter = floor.boss.as_mut().expect("encounter");
            encounter.phase = Some(BossPhase::Two);
            encounter.last_ember_at = T0;
            floor.hazards.push(Hazard::Ember {
                x: 1.0,
                y: 1.0,
                radius: EMBER_RADIUS,
                started_at: T0,
                struck: BTreeSet::new(),
            });
        }

        engine.step(T0 + EMBER_TELEGRAPH_MS - 1);
        assert_eq!(engine.world.player(hero).expect("hero").hp(), 160);

        engine.step(T0 + EMBER_TELEGRAPH_MS);
        assert_eq!(engine.world.player(hero).expect("hero").hp(), 140);

        engine.step(T0 + EMBER_TELEGRAPH_MS + TICK_MS);
        assert_eq!(engine.world.player(hero).expect("hero").hp(), 140);

        engine.step(T0 + EMBER_TELEGRAPH_MS + EMBER_ACTIVE_MS);
        let floor = engine.world.floor(BOSS_FLOOR).expect("floor");
        assert!(!floor.hazards.iter().any(|hazard| matches!(
            hazard,
            Hazard::Ember { started_at, .. } if *started_at == T0
        )));
    }

    #[test]
    fn ember_count_is_capped() {
        let mut engine = engine();
        boss_floor_with(&mut engine, PlayerClass::Mage, 1.0, 1.0);
        let now = T0 + EMBER_SPAWN_INTERVAL_MS;
        {
            let floor = engine.world.floor_mut(BOSS_FLOOR, T0);
            floor.boss.as_mut().expect("encounter").phase = Some(BossPhase::Two);
            for i in 0..EMBER_MAX_CIRCLES {
                floor.hazards.push(Hazard::Ember {
                    x: 15.0,
                    y: i as f32,
                    radius: EMBER_RADIUS,
                    started_at: now,
                    struck: BTreeSet::new(),
                });
            }
        }
        engine.update_embers(BOSS_FLOOR, now);
        assert_eq!(
            engine.world.floor(BOSS_FLOOR).expect("floor").hazards.len(),
            EMBER_MAX_CIRCLES
        );

        engine.world.floor_mut(BOSS_FLOOR, T0).hazards.clear();
        engine.update_embers(BOSS_FLOOR, now);
        assert_eq!(engine.world.floor(BOSS_FLOOR).expect("floor").hazards.len(), 1);
    }
}
