use rkyv::{Archive, Deserialize, Serialize};

use crate::PlayerId;
use crate::combat::{Material, Slot, StructureKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityMode {
    Unreliable,
    UnreliableExpiring { ttl_ms: u64 },
    Reliable,
}

impl ReliabilityMode {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Self::Reliable)
    }
}

/// Animation montage identifiers, broadcast so remote clients can play the
/// matching third-person montage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
#[repr(u8)]
pub enum AnimCue {
    PickaxeSwing = 0,
    RifleHipFire = 1,
    RifleAimedFire = 2,
    ShotgunHipFire = 3,
    ShotgunAimedFire = 4,
    RifleHipReload = 5,
    RifleAimedReload = 6,
    ShotgunHipReload = 7,
    ShotgunAimedReload = 8,
    BandageUse = 9,
}

impl AnimCue {
    pub fn fire(slot: Slot, aimed: bool) -> Self {
        match (slot, aimed) {
            (Slot::Pickaxe, _) => AnimCue::PickaxeSwing,
            (Slot::Rifle, false) => AnimCue::RifleHipFire,
            (Slot::Rifle, true) => AnimCue::RifleAimedFire,
            (Slot::Shotgun, false) => AnimCue::ShotgunHipFire,
            (Slot::Shotgun, true) => AnimCue::ShotgunAimedFire,
        }
    }

    pub fn reload(slot: Slot, aimed: bool) -> Option<Self> {
        match (slot, aimed) {
            (Slot::Rifle, false) => Some(AnimCue::RifleHipReload),
            (Slot::Rifle, true) => Some(AnimCue::RifleAimedReload),
            (Slot::Shotgun, false) => Some(AnimCue::ShotgunHipReload),
            (Slot::Shotgun, true) => Some(AnimCue::ShotgunAimedReload),
            (Slot::Pickaxe, _) => None,
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum MatchEvent {
    Animation {
        player: PlayerId,
        cue: AnimCue,
    },
    WeaponPickedUp {
        player: PlayerId,
        slot: Slot,
    },
    AmmoPickedUp {
        player: PlayerId,
        slot: Slot,
        rounds: u16,
    },
    BandagesPickedUp {
        player: PlayerId,
        count: u16,
    },
    StructurePlaced {
        player: PlayerId,
        kind: StructureKind,
        material: Material,
    },
    PlayerJoined {
        player: PlayerId,
    },
    PlayerLeft {
        player: PlayerId,
    },
    PlayerEliminated {
        player: PlayerId,
    },
}

impl MatchEvent {
    pub fn reliability(&self) -> ReliabilityMode {
        match self {
            Self::PlayerJoined { .. } => ReliabilityMode::Reliable,
            Self::PlayerLeft { .. } => ReliabilityMode::Reliable,
            Self::PlayerEliminated { .. } => ReliabilityMode::Reliable,

            Self::WeaponPickedUp { .. } => ReliabilityMode::UnreliableExpiring { ttl_ms: 5_000 },
            Self::BandagesPickedUp { .. } => ReliabilityMode::UnreliableExpiring { ttl_ms: 5_000 },
            Self::StructurePlaced { .. } => ReliabilityMode::UnreliableExpiring { ttl_ms: 5_000 },

            Self::Animation { .. } => ReliabilityMode::Unreliable,
            Self::AmmoPickedUp { .. } => ReliabilityMode::Unreliable,
        }
    }
}

/// A queued event plus the sequence it was stamped with, as sent on the wire.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct StampedEvent {
    pub sequence: u32,
    pub event: MatchEvent,
}
