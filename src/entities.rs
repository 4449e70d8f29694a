use crate::error::CommandError;
use crate::types::{ArcherStance, EnemyKind, PlayerClass};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassProfile {
    pub max_hp: i32,
    pub max_mana: i32,
    pub attack: i32,
    pub defense: i32,
    pub special_cd_ms: u64,
}

/// Base stats for a class. An unrecognized class gets the generic profile and
/// fights as a warrior.
pub fn class_profile(class: Option<PlayerClass>) -> ClassProfile {
    match class {
        Some(PlayerClass::Warrior) => ClassProfile {
            max_hp: 160,
            max_mana: 10,
            attack: 20,
            defense: 7,
            special_cd_ms: 30_000,
        },
        Some(PlayerClass::Archer) => ClassProfile {
            max_hp: 120,
            max_mana: 40,
            attack: 22,
            defense: 4,
            special_cd_ms: 10_000,
        },
        Some(PlayerClass::Mage) => ClassProfile {
            max_hp: 90,
            max_mana: 70,
            attack: 16,
            defense: 3,
            special_cd_ms: 0,
        },
        Some(PlayerClass::Healer) => ClassProfile {
            max_hp: 110,
            max_mana: 80,
            attack: 0,
            defense: 4,
            special_cd_ms: 2_000,
        },
        None => ClassProfile {
            max_hp: 130,
            max_mana: 35,
            attack: 18,
            defense: 5,
            special_cd_ms: 15_000,
        },
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub class: PlayerClass,
    pub floor: u8,
    pub x: f32,
    pub y: f32,
    hp: i32,
    pub max_hp: i32,
    mana: i32,
    pub max_mana: i32,
    pub attack: i32,
    pub defense: i32,
    pub alive: bool,
    pub dead_since: Option<u64>,

    pub last_attack_at: u64,
    pub last_mana_spend_at: u64,
    pub last_damage_at: u64,
    pub last_hp_regen_at: u64,
    pub last_mana_regen_at: u64,
    pub special_cd_ms: u64,
    pub last_special_at: Option<u64>,

    pub stance: ArcherStance,
    pub channeling: bool,
    pub last_channel_tick_at: u64,
}

impl Player {
    pub fn new(
        id: u32,
        name: String,
        class: Option<PlayerClass>,
        floor: u8,
        (x, y): (f32, f32),
        now_ms: u64,
    ) -> Self {
        let profile = class_profile(class);
        Self {
            id,
            name,
            class: class.unwrap_or(PlayerClass::Warrior),
            floor,
            x,
            y,
            hp: profile.max_hp,
            max_hp: profile.max_hp,
            mana: profile.max_mana,
            max_mana: profile.max_mana,
            attack: profile.attack,
            defense: profile.defense,
            alive: true,
            dead_since: None,
            last_attack_at: now_ms,
            last_mana_spend_at: now_ms,
            last_damage_at: now_ms,
            last_hp_regen_at: now_ms,
            last_mana_regen_at: now_ms,
            special_cd_ms: profile.special_cd_ms,
            last_special_at: None,
            stance: ArcherStance::Move,
            channeling: false,
            last_channel_tick_at: now_ms,
        }
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn mana(&self) -> i32 {
        self.mana
    }

    /// Lowers hp, never below zero. Returns true when this hit killed the player.
    pub fn take_damage(&mut self, amount: i32, now_ms: u64) -> bool {
        self.hp = (self.hp - amount.max(0)).max(0);
        self.last_damage_at = now_ms;
        if self.hp == 0 && self.alive {
            self.alive = false;
            self.dead_since = Some(now_ms);
            self.channeling = false;
            return true;
        }
        false
    }

    /// Returns the hp actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
        self.hp - before
    }

    pub fn restore_mana(&mut self, amount: i32) -> i32 {
        let before = self.mana;
        self.mana = (self.mana + amount.max(0)).min(self.max_mana);
        self.mana - before
    }

    pub fn spend_mana(
        &mut self,
        cost: i32,
        action: &'static str,
        now_ms: u64,
    ) -> Result<(), CommandError> {
        if self.mana < cost {
            return Err(CommandError::NotEnoughMana {
                action,
                needed: cost,
            });
        }
        self.mana -= cost;
        self.last_mana_spend_at = now_ms;
        Ok(())
    }

    /// Drains one point of channel mana. Returns false once the pool is empty.
    pub fn drain_mana(&mut self, now_ms: u64) -> bool {
        if self.mana <= 0 {
            return false;
        }
        self.mana -= 1;
        self.last_mana_spend_at = now_ms;
        true
    }

    pub fn special_remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_special_at {
            Some(used_at) if self.special_cd_ms > 0 => {
                self.special_cd_ms.saturating_sub(now_ms.saturating_sub(used_at))
            }
            _ => 0,
        }
    }

    pub fn is_stance_locked(&self) -> bool {
        self.class == PlayerClass::Archer && self.stance == ArcherStance::Ready
    }

    pub fn revive(&mut self, floor: u8, (x, y): (f32, f32), hp: i32) {
        self.alive = true;
        self.dead_since = None;
        self.floor = floor;
        self.x = x;
        self.y = y;
        self.hp = hp.clamp(1, self.max_hp);
        self.stance = ArcherStance::Move;
        self.channeling = false;
    }

    pub fn respawn(&mut self, floor: u8, spawn: (f32, f32), now_ms: u64) {
        self.revive(floor, spawn, self.max_hp);
        self.mana = self.max_mana;
        self.last_attack_at = now_ms;
        self.last_mana_spend_at = now_ms;
        self.last_damage_at = now_ms;
        self.last_hp_regen_at = now_ms;
        self.last_mana_regen_at = now_ms;
    }

    #[cfg(test)]
    pub fn set_hp(&mut self, hp: i32) {
        self.hp = hp.clamp(0, self.max_hp);
    }

    #[cfg(test)]
    pub fn set_mana(&mut self, mana: i32) {
        self.mana = mana.clamp(0, self.max_mana);
    }
}

#[derive(Clone, Debug)]
pub struct Enemy {
    pub id: u32,
    pub name: String,
    pub kind: EnemyKind,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub x: f32,
    pub y: f32,
    pub miniboss: bool,
    pub boss: bool,
}

impl Enemy {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Returns true when this hit brought the enemy down.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        let was_alive = self.is_alive();
        self.hp = (self.hp - amount).max(0);
        was_alive && !self.is_alive()
    }
}
