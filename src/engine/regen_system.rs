use super::GameEngine;
use crate::constants::{
    CHANNEL_DRAIN_PERIOD_MS, DEATH_TIMEOUT_MS, HP_REGEN_DELAY_MS, HP_REGEN_STEP, HUB_FLOOR,
    MANA_REGEN_DELAY_MS, MANA_REGEN_STEP, REGEN_PERIOD_MS, SHIELD_LEASE_MS,
};

impl GameEngine {
    /// Per-tick upkeep for every connected player: the death timeout, idle
    /// regeneration and the warrior channel.
    pub(super) fn update_players(&mut self, now_ms: u64) {
        let hub_spawn = self.world.floor_mut(HUB_FLOOR, now_ms).center();
        let mut notices: Vec<(u8, String)> = Vec::new();

        for player in self.world.players.values_mut() {
            if !player.alive {
                let expired = player
                    .dead_since
                    .is_some_and(|since| now_ms.saturating_sub(since) >= DEATH_TIMEOUT_MS);
                if expired {
                    player.respawn(HUB_FLOOR, hub_spawn, now_ms);
                    tracing::info!(player_id = player.id, "death timeout, back to hub");
                    notices.push((
                        HUB_FLOOR,
                        format!("{} was dead too long and returns to the hub.", player.name),
                    ));
                }
                continue;
            }

            if now_ms.saturating_sub(player.last_mana_spend_at) >= MANA_REGEN_DELAY_MS
                && now_ms.saturating_sub(player.last_mana_regen_at) >= REGEN_PERIOD_MS
                && player.mana() < player.max_mana
            {
                player.restore_mana(MANA_REGEN_STEP);
                player.last_mana_regen_at = now_ms;
            }

            let last_active = player.last_damage_at.max(player.last_attack_at);
            if now_ms.saturating_sub(last_active) >= HP_REGEN_DELAY_MS
                && now_ms.saturating_sub(player.last_hp_regen_at) >= REGEN_PERIOD_MS
                && player.hp() < player.max_hp
            {
                player.heal(HP_REGEN_STEP);
                player.last_hp_regen_at = now_ms;
            }

            if !player.channeling {
                continue;
            }
            if now_ms.saturating_sub(player.last_channel_tick_at) >= CHANNEL_DRAIN_PERIOD_MS {
                player.drain_mana(now_ms);
                player.last_channel_tick_at = now_ms;
            }
            if player.mana() <= 0 {
                player.channeling = false;
                notices.push((
                    player.floor,
                    format!("{}'s shield fades: mana exhausted.", player.name),
                ));
                continue;
            }
            if let Some(floor) = self.world.floors.get_mut(&player.floor) {
                floor.shield_until = floor.shield_until.max(now_ms + SHIELD_LEASE_MS);
            }
        }

        for (floor, msg) in notices {
            self.event(floor, msg);
        }
    }
}
