use super::utils::dist2;
use super::GameEngine;
use crate::constants::{
    ARCHER_MOVE_COOLDOWN_MS, ARCHER_READY_MULTIPLIER, BOSS_FLOOR, DEATH_TIMEOUT_MS,
    HEALER_MINOR_COST, HEALER_MINOR_HEAL, HEALER_SPECIAL_COST, HEALER_SPECIAL_FRACTION,
    HEALER_SPECIAL_MIN, HEALER_SPLASH, MAGE_ATTACK_COST, MAGE_SPECIAL_BONUS, MAGE_SPECIAL_COST,
    MELEE_ENEMY_MULTIPLIER, MELEE_RANGE, RESURRECT_COST, RESURRECT_HP_FRACTION,
    SHIELD_DAMAGE_FACTOR, SHIELD_LEASE_MS,
};
use crate::entities::Player;
use crate::error::CommandError;
use crate::types::{ActorKind, ArcherStance, AttackEvent, PlayerClass, TargetRef};

/// The acting player as it stood when the command arrived.
#[derive(Clone, Debug)]
pub(super) struct Actor {
    pub id: u32,
    pub name: String,
    pub class: PlayerClass,
    pub floor: u8,
    pub x: f32,
    pub y: f32,
    pub attack: i32,
    pub stance: ArcherStance,
    pub channeling: bool,
}

impl Actor {
    pub fn of(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            class: player.class,
            floor: player.floor,
            x: player.x,
            y: player.y,
            attack: player.attack,
            stance: player.stance,
            channeling: player.channeling,
        }
    }
}

/// Whether a special actually went off and should start its cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Cast {
    Fired,
    Skipped,
}

pub(super) trait ClassRules: Sync {
    fn basic_attack(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        target_enemy_id: Option<u32>,
        target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<(), CommandError>;

    fn special(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<Cast, CommandError>;

    fn ignores_cooldown(&self, _actor: &Actor) -> bool {
        false
    }
}

struct WarriorRules;
struct ArcherRules;
struct MageRules;
struct HealerRules;

pub(super) fn rules_for(class: PlayerClass) -> &'static dyn ClassRules {
    match class {
        PlayerClass::Warrior => &WarriorRules,
        PlayerClass::Archer => &ArcherRules,
        PlayerClass::Mage => &MageRules,
        PlayerClass::Healer => &HealerRules,
    }
}

/// Damage an enemy deals to a player after the melee, shield and stance
/// modifiers. Every step keeps the result at one or more.
pub fn incoming_damage(base: i32, melee: bool, shielded: bool, ready_archer: bool) -> i32 {
    let mut damage = base.max(1);
    if melee {
        damage = (damage * MELEE_ENEMY_MULTIPLIER).max(1);
    }
    if shielded {
        damage = ((damage as f32 * SHIELD_DAMAGE_FACTOR) as i32).max(1);
    }
    if ready_archer {
        damage = (damage * ARCHER_READY_MULTIPLIER).max(1);
    }
    damage
}

#[derive(Clone, Copy, Debug)]
pub(super) struct EnemyPick {
    pub idx: usize,
    pub x: f32,
    pub y: f32,
    pub defense: i32,
}

#[derive(Clone, Debug)]
pub(super) struct EnemyHit {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub killed: bool,
}

impl ClassRules for WarriorRules {
    fn basic_attack(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        target_enemy_id: Option<u32>,
        _target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        let pick = engine.pick_enemy(actor, target_enemy_id)?;
        if dist2(actor.x, actor.y, pick.x, pick.y) > MELEE_RANGE * MELEE_RANGE {
            return Err(CommandError::OutOfMeleeRange);
        }
        let damage = engine.world.calc_damage(actor.attack, pick.defense);
        engine.hit_enemy(actor, pick.idx, damage, false, now_ms);
        Ok(())
    }

    fn special(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        _target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<Cast, CommandError> {
        let Some(player) = engine.world.player_mut(actor.id) else {
            return Ok(Cast::Skipped);
        };
        if player.channeling {
            player.channeling = false;
            engine.event(
                actor.floor,
                format!("{} lowers the Battle Cry shield.", actor.name),
            );
            return Ok(Cast::Skipped);
        }
        if player.mana() <= 0 {
            return Err(CommandError::NotEnoughMana {
                action: "use Battle Cry",
                needed: 1,
            });
        }
        player.channeling = true;
        player.last_channel_tick_at = now_ms;
        player.last_mana_spend_at = now_ms;
        engine.world.floor_mut(actor.floor, now_ms).shield_until = now_ms + SHIELD_LEASE_MS;
        engine.event(
            actor.floor,
            format!(
                "{} uses 'Battle Cry': the shield holds while their mana lasts!",
                actor.name
            ),
        );
        Ok(Cast::Fired)
    }

    fn ignores_cooldown(&self, actor: &Actor) -> bool {
        actor.channeling
    }
}

impl ClassRules for ArcherRules {
    fn basic_attack(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        target_enemy_id: Option<u32>,
        _target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        let pick = engine.pick_enemy(actor, target_enemy_id)?;
        if actor.stance == ArcherStance::Move {
            let last = engine
                .world
                .player(actor.id)
                .map_or(0, |player| player.last_attack_at);
            let elapsed = now_ms.saturating_sub(last);
            if elapsed < ARCHER_MOVE_COOLDOWN_MS {
                return Err(CommandError::ShotCooldown {
                    remaining: (ARCHER_MOVE_COOLDOWN_MS - elapsed) as f32 / 1000.0,
                });
            }
        }
        let mut damage = engine.world.calc_damage(actor.attack, pick.defense);
        if actor.stance == ArcherStance::Ready {
            damage *= ARCHER_READY_MULTIPLIER;
        }
        engine.hit_enemy(actor, pick.idx, damage, true, now_ms);
        Ok(())
    }

    fn special(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        _target_player_id: Option<u32>,
        _now_ms: u64,
    ) -> Result<Cast, CommandError> {
        let Some(player) = engine.world.player_mut(actor.id) else {
            return Ok(Cast::Skipped);
        };
        player.stance = player.stance.toggled();
        let stance = player.stance;
        engine.event(
            actor.floor,
            format!(
                "{} switches stance: now '{}'.",
                actor.name,
                stance.label()
            ),
        );
        Ok(Cast::Fired)
    }
}

impl ClassRules for MageRules {
    fn basic_attack(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        target_enemy_id: Option<u32>,
        _target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        let pick = engine.pick_enemy(actor, target_enemy_id)?;
        if let Some(player) = engine.world.player_mut(actor.id) {
            player.spend_mana(MAGE_ATTACK_COST, "attack", now_ms)?;
        }
        let damage = engine.world.calc_damage(actor.attack, pick.defense);
        engine.hit_enemy(actor, pick.idx, damage, true, now_ms);
        Ok(())
    }

    fn special(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        _target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<Cast, CommandError> {
        let mana = engine.world.player(actor.id).map_or(0, Player::mana);
        if mana < MAGE_SPECIAL_COST {
            return Err(CommandError::NotEnoughMana {
                action: "cast Fireball",
                needed: MAGE_SPECIAL_COST,
            });
        }
        let targets: Vec<(usize, i32)> = engine
            .world
            .floor(actor.floor)
            .map(|floor| {
                floor
                    .enemies
                    .iter()
                    .enumerate()
                    .filter(|(_, enemy)| enemy.is_alive())
                    .map(|(idx, enemy)| (idx, enemy.defense))
                    .collect()
            })
            .unwrap_or_default();
        if targets.is_empty() {
            return Err(CommandError::NoEnemies);
        }
        if let Some(player) = engine.world.player_mut(actor.id) {
            player.spend_mana(MAGE_SPECIAL_COST, "cast Fireball", now_ms)?;
            player.last_attack_at = now_ms;
        }

        let mut total = 0;
        let mut fallen = Vec::new();
        for (idx, defense) in targets {
            let damage = engine
                .world
                .calc_damage(actor.attack + MAGE_SPECIAL_BONUS, defense);
            let Some(hit) = engine.damage_enemy(actor.floor, idx, damage, now_ms) else {
                continue;
            };
            total += damage;
            engine.attack(player_hits_enemy(actor, &hit, damage, true, true));
            if hit.killed {
                fallen.push(hit.name);
            }
        }
        engine.event(
            actor.floor,
            format!(
                "{} hurls a Fireball, dealing {total} total damage to every enemy!",
                actor.name
            ),
        );
        for name in fallen {
            engine.event(actor.floor, format!("{name} burns to ashes!"));
        }
        engine.open_door_if_cleared(actor.floor, now_ms);
        Ok(Cast::Fired)
    }
}

impl ClassRules for HealerRules {
    /// Healers cannot strike; the basic action is a small heal.
    fn basic_attack(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        _target_enemy_id: Option<u32>,
        target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        let mana = engine.world.player(actor.id).map_or(0, Player::mana);
        if mana < HEALER_MINOR_COST {
            return Err(CommandError::NotEnoughMana {
                action: "heal",
                needed: HEALER_MINOR_COST,
            });
        }
        let target_id = engine.ally_or_self(actor, target_player_id);
        if !engine.world.player(target_id).is_some_and(|p| p.alive) {
            return Err(CommandError::TargetDead);
        }
        if let Some(player) = engine.world.player_mut(actor.id) {
            player.spend_mana(HEALER_MINOR_COST, "heal", now_ms)?;
            player.last_attack_at = now_ms;
        }
        let Some(target) = engine.world.player_mut(target_id) else {
            return Ok(());
        };
        let healed = target.heal(HEALER_MINOR_HEAL);
        let target = target.clone();
        if healed <= 0 {
            engine.notify(
                actor.id,
                format!("{} is already at full health.", target.name),
            );
            return Ok(());
        }
        engine.event(
            actor.floor,
            format!(
                "{} heals {} for {healed} HP (quick heal).",
                actor.name, target.name
            ),
        );
        engine.attack(player_heals_player(actor, &target, healed, false));
        Ok(())
    }

    fn special(
        &self,
        engine: &mut GameEngine,
        actor: &Actor,
        target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<Cast, CommandError> {
        let mana = engine.world.player(actor.id).map_or(0, Player::mana);
        if mana < HEALER_SPECIAL_COST {
            return Err(CommandError::NotEnoughMana {
                action: "heal",
                needed: HEALER_SPECIAL_COST,
            });
        }
        let target_id = engine.ally_or_self(actor, target_player_id);
        let Some(target) = engine.world.player(target_id).filter(|p| p.alive) else {
            return Err(CommandError::TargetDead);
        };
        let target_name = target.name.clone();
        let everyone_full = engine
            .world
            .living_players_on(actor.floor)
            .chain(std::iter::once(target))
            .all(|p| p.hp() >= p.max_hp);
        if everyone_full {
            engine.notify(
                actor.id,
                format!("{target_name} is already at full health."),
            );
            return Ok(Cast::Skipped);
        }
        if let Some(player) = engine.world.player_mut(actor.id) {
            player.spend_mana(HEALER_SPECIAL_COST, "heal", now_ms)?;
        }

        let allies: Vec<u32> = engine
            .world
            .living_players_on(actor.floor)
            .map(|p| p.id)
            .filter(|id| *id != target_id)
            .collect();
        for ally_id in allies {
            let Some(ally) = engine.world.player_mut(ally_id) else {
                continue;
            };
            let healed = ally.heal(HEALER_SPLASH);
            if healed <= 0 {
                continue;
            }
            let ally = ally.clone();
            engine.attack(player_heals_player(actor, &ally, healed, true));
        }

        engine.event(
            actor.floor,
            format!(
                "{} powerfully heals {target_name} and mends the allies around!",
                actor.name
            ),
        );
        if let Some(target) = engine.world.player_mut(target_id) {
            let amount = ((target.max_hp as f32 * HEALER_SPECIAL_FRACTION) as i32)
                .max(HEALER_SPECIAL_MIN);
            let healed = target.heal(amount);
            if healed > 0 {
                let target = target.clone();
                engine.attack(player_heals_player(actor, &target, healed, true));
            }
        }
        Ok(Cast::Fired)
    }
}

impl GameEngine {
    pub(super) fn basic_attack(
        &mut self,
        actor: &Actor,
        target_enemy_id: Option<u32>,
        target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        rules_for(actor.class).basic_attack(self, actor, target_enemy_id, target_player_id, now_ms)
    }

    pub(super) fn use_special(
        &mut self,
        actor: &Actor,
        target_player_id: Option<u32>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        let rules = rules_for(actor.class);
        if !rules.ignores_cooldown(actor) {
            let remaining = self
                .world
                .player(actor.id)
                .map_or(0, |player| player.special_remaining_ms(now_ms));
            if remaining > 0 {
                return Err(CommandError::SpecialCooldown {
                    remaining: remaining.div_ceil(1000),
                });
            }
        }
        if rules.special(self, actor, target_player_id, now_ms)? == Cast::Fired {
            if let Some(player) = self.world.player_mut(actor.id) {
                player.last_special_at = Some(now_ms);
            }
        }
        Ok(())
    }

    pub(super) fn resurrect(
        &mut self,
        actor: &Actor,
        target_player_id: Option<u32>,
        target_name: Option<&str>,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        let target_id = self
            .find_player(target_player_id, target_name)
            .ok_or(CommandError::ResurrectTargetNotFound)?;
        let mana = self.world.player(actor.id).map_or(0, Player::mana);
        if mana < RESURRECT_COST {
            return Err(CommandError::NotEnoughMana {
                action: "resurrect",
                needed: RESURRECT_COST,
            });
        }
        let target = self
            .world
            .player(target_id)
            .ok_or(CommandError::ResurrectTargetNotFound)?;
        if target.alive {
            return Err(CommandError::AlreadyAlive);
        }
        let Some(dead_since) = target.dead_since else {
            return Err(CommandError::NotResurrectable);
        };
        if now_ms.saturating_sub(dead_since) > DEATH_TIMEOUT_MS {
            return Err(CommandError::ResurrectTooLate);
        }
        let restored = ((target.max_hp as f32 * RESURRECT_HP_FRACTION) as i32).max(1);
        let target_name = target.name.clone();

        if let Some(caster) = self.world.player_mut(actor.id) {
            caster.spend_mana(RESURRECT_COST, "resurrect", now_ms)?;
        }
        if let Some(target) = self.world.player_mut(target_id) {
            target.revive(actor.floor, (actor.x, actor.y), restored);
        }
        tracing::info!(
            player_id = target_id,
            caster_id = actor.id,
            floor = actor.floor,
            "player resurrected"
        );
        self.event(
            actor.floor,
            format!(
                "{} resurrects {target_name} on floor {}!",
                actor.name, actor.floor
            ),
        );
        Ok(())
    }

    /// Looks a player up by id, or by name (case-insensitive) or id written as text.
    fn find_player(&self, id: Option<u32>, name: Option<&str>) -> Option<u32> {
        if let Some(id) = id {
            return self.world.player(id).map(|player| player.id);
        }
        let wanted = name.map(str::trim).filter(|name| !name.is_empty())?;
        let wanted_lower = wanted.to_lowercase();
        self.world
            .players
            .values()
            .find(|player| {
                player.name.to_lowercase() == wanted_lower || player.id.to_string() == wanted
            })
            .map(|player| player.id)
    }

    /// The requested floor-mate, falling back to the caster.
    fn ally_or_self(&self, actor: &Actor, target_player_id: Option<u32>) -> u32 {
        target_player_id
            .and_then(|id| self.world.player(id))
            .filter(|player| player.floor == actor.floor)
            .map_or(actor.id, |player| player.id)
    }

    /// The requested living enemy, or else the one nearest to the actor.
    fn pick_enemy(
        &self,
        actor: &Actor,
        target_enemy_id: Option<u32>,
    ) -> Result<EnemyPick, CommandError> {
        let floor = self
            .world
            .floor(actor.floor)
            .ok_or(CommandError::NoEnemies)?;
        let living = || {
            floor
                .enemies
                .iter()
                .enumerate()
                .filter(|(_, enemy)| enemy.is_alive())
        };
        let chosen = target_enemy_id
            .and_then(|id| living().find(|(_, enemy)| enemy.id == id))
            .or_else(|| {
                living().min_by(|(_, a), (_, b)| {
                    dist2(actor.x, actor.y, a.x, a.y)
                        .total_cmp(&dist2(actor.x, actor.y, b.x, b.y))
                })
            });
        chosen
            .map(|(idx, enemy)| EnemyPick {
                idx,
                x: enemy.x,
                y: enemy.y,
                defense: enemy.defense,
            })
            .ok_or(CommandError::NoEnemies)
    }

    /// Applies damage to a living enemy and runs the boss hooks.
    pub(super) fn damage_enemy(
        &mut self,
        floor_index: u8,
        idx: usize,
        damage: i32,
        now_ms: u64,
    ) -> Option<EnemyHit> {
        let enemy = self
            .world
            .floors
            .get_mut(&floor_index)?
            .enemies
            .get_mut(idx)?;
        if !enemy.is_alive() {
            return None;
        }
        let killed = enemy.take_damage(damage);
        let is_boss = enemy.boss;
        let hit = EnemyHit {
            id: enemy.id,
            name: enemy.name.clone(),
            x: enemy.x,
            y: enemy.y,
            hp: enemy.hp,
            killed,
        };
        if is_boss && floor_index == BOSS_FLOOR {
            if killed {
                self.on_boss_death(floor_index, now_ms);
            } else {
                self.check_boss_phase(floor_index, idx);
            }
        }
        Some(hit)
    }

    fn hit_enemy(&mut self, actor: &Actor, idx: usize, damage: i32, homing: bool, now_ms: u64) {
        let Some(hit) = self.damage_enemy(actor.floor, idx, damage, now_ms) else {
            return;
        };
        if let Some(player) = self.world.player_mut(actor.id) {
            player.last_attack_at = now_ms;
        }
        self.event(
            actor.floor,
            format!(
                "{} attacks {} for {damage} damage. ({} HP)",
                actor.name, hit.name, hit.hp
            ),
        );
        self.attack(player_hits_enemy(actor, &hit, damage, false, homing));
        if hit.killed {
            tracing::info!(floor = actor.floor, enemy = %hit.name, "enemy defeated");
            self.event(actor.floor, format!("{} is defeated!", hit.name));
            self.open_door_if_cleared(actor.floor, now_ms);
        }
    }
}

fn player_hits_enemy(
    actor: &Actor,
    hit: &EnemyHit,
    damage: i32,
    special: bool,
    homing: bool,
) -> AttackEvent {
    AttackEvent {
        floor: actor.floor,
        attacker_type: ActorKind::Player,
        attacker_id: actor.id,
        attacker_name: actor.name.clone(),
        from_x: actor.x,
        from_y: actor.y,
        target_type: ActorKind::Enemy,
        target_id: hit.id,
        target_name: hit.name.clone(),
        to_x: hit.x,
        to_y: hit.y,
        damage,
        special,
        homing: homing.then_some(TargetRef {
            kind: ActorKind::Enemy,
            id: hit.id,
        }),
    }
}

fn player_heals_player(actor: &Actor, target: &Player, amount: i32, special: bool) -> AttackEvent {
    AttackEvent {
        floor: actor.floor,
        attacker_type: ActorKind::Player,
        attacker_id: actor.id,
        attacker_name: actor.name.clone(),
        from_x: actor.x,
        from_y: actor.y,
        target_type: ActorKind::Player,
        target_id: target.id,
        target_name: target.name.clone(),
        to_x: target.x,
        to_y: target.y,
        damage: -amount,
        special,
        homing: Some(TargetRef {
            kind: ActorKind::Player,
            id: target.id,
        }),
    }
}
