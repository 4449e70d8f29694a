use std::io;
use std::net::SocketAddr;

/// A well-formed command that breaks a game rule. The display text is sent
/// back to the acting player verbatim and nothing in the world changes.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("You are dead. Wait for a resurrection or the restart.")]
    Dead,

    #[error("Unknown command.")]
    UnknownCommand,

    #[error("Not enough mana to {action} ({needed} MP needed).")]
    NotEnoughMana { action: &'static str, needed: i32 },

    #[error("The target is dead. Resurrect them first.")]
    TargetDead,

    #[error("There are no enemies on this floor.")]
    NoEnemies,

    #[error("The target is too far away for a melee strike.")]
    OutOfMeleeRange,

    #[error("Your shot is still on cooldown ({remaining:.1} s).")]
    ShotCooldown { remaining: f32 },

    #[error("Ability on cooldown, {remaining} s left.")]
    SpecialCooldown { remaining: u64 },

    #[error("Player to resurrect not found.")]
    ResurrectTargetNotFound,

    #[error("This player is already alive.")]
    AlreadyAlive,

    #[error("This player cannot be resurrected.")]
    NotResurrectable,

    #[error("Too much time has passed, the restart already happened.")]
    ResurrectTooLate,

    #[error("The door is not open yet.")]
    DoorClosed,

    #[error("Step right up to the door to enter.")]
    TooFarFromDoor,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid listen address: {0}")]
    InvalidAddr(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("line longer than {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
