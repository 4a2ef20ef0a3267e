use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::combat::{FIREARM_COUNT, ItemKind, Material, StructureKind};
use crate::event::StampedEvent;

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x524D5054;
pub const DEFAULT_PORT: u16 = 27815;
pub const DEFAULT_TICK_RATE: u32 = 60;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// Wraps a degree angle into [-180, 180).
fn normalize_degrees(angle: f32) -> f32 {
    let mut normalized = angle % 360.0;
    if normalized >= 180.0 {
        normalized -= 360.0;
    } else if normalized < -180.0 {
        normalized += 360.0;
    }
    normalized
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            ack,
            ack_bitfield,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// One user intent, validated server-side; an illegal request is a silent
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum ActionRequest {
    SwitchWeapon { target: ItemKind },
    Fire,
    Reload,
    UseBandage,
    ToggleBuildMode { kind: StructureKind },
    CycleBuildMaterial,
    PlaceStructure,
    ToggleAim { aimed: bool },
}

/// Trusted client transform: position plus view angles, quantized to tenths
/// of a degree. Locomotion is not simulated server-side, but everything
/// combat derives from the pose (previews, projectiles, aim) reads this.
#[derive(Debug, Clone, Copy, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PoseUpdate {
    pub tick: u32,
    pub position: [f32; 3],
    pub view: [i16; 2],
}

impl PoseUpdate {
    pub fn encode_view(&mut self, yaw: f32, pitch: f32) {
        self.view = [
            (normalize_degrees(yaw) * 10.0) as i16,
            (pitch.clamp(-90.0, 90.0) * 10.0) as i16,
        ];
    }

    pub fn decode_view(&self) -> (f32, f32) {
        (self.view[0] as f32 / 10.0, self.view[1] as f32 / 10.0)
    }
}

/// The replicated per-player combat record.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct CombatSnapshot {
    pub player: u32,
    pub health: f32,
    pub equipped: i8,
    pub owned_slots: u8,
    pub clips: [u16; FIREARM_COUNT],
    pub reserves: [u16; FIREARM_COUNT],
    pub materials: [u32; Material::COUNT],
    pub bandages: u16,
    pub build_mode: i8,
    pub build_material: u8,
    pub lock: i8,
    pub flags: u8,
    pub view: [i16; 2],
    pub position: [f32; 3],
}

impl CombatSnapshot {
    pub const FLAG_AIMED: u8 = 1 << 0;
    pub const FLAG_IN_HAZARD: u8 = 1 << 1;

    pub fn new(player: u32) -> Self {
        Self {
            player,
            health: 0.0,
            equipped: 0,
            owned_slots: 0,
            clips: [0; FIREARM_COUNT],
            reserves: [0; FIREARM_COUNT],
            materials: [0; Material::COUNT],
            bandages: 0,
            build_mode: -1,
            build_material: 0,
            lock: -1,
            flags: 0,
            view: [0; 2],
            position: [0.0; 3],
        }
    }

    #[inline]
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    #[inline]
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub fn encode_view(&mut self, yaw: f32, pitch: f32) {
        self.view = [
            (normalize_degrees(yaw) * 10.0) as i16,
            (pitch.clamp(-90.0, 90.0) * 10.0) as i16,
        ];
    }

    pub fn decode_view(&self) -> (f32, f32) {
        (self.view[0] as f32 / 10.0, self.view[1] as f32 / 10.0)
    }

    pub fn equipped_kind(&self) -> ItemKind {
        ItemKind::from_wire_slot(self.equipped)
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct StateUpdate {
    pub tick: u32,
    pub server_time_ms: u64,
    /// A full refresh carries every player, not just dirty ones.
    pub full: bool,
    pub states: Vec<CombatSnapshot>,
    pub removed: Vec<u32>,
}

impl StateUpdate {
    pub fn new(tick: u32, server_time_ms: u64) -> Self {
        Self {
            tick,
            server_time_ms,
            full: false,
            states: Vec::new(),
            removed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    ConnectionRequest {
        client_salt: u64,
    },
    ConnectionChallenge {
        server_salt: u64,
        challenge: u64,
    },
    ChallengeResponse {
        combined_salt: u64,
    },
    ConnectionAccepted {
        player_id: u32,
    },
    ConnectionDenied {
        reason: String,
    },
    Action(ActionRequest),
    Pose(PoseUpdate),
    StateUpdate(StateUpdate),
    Events {
        events: Vec<StampedEvent>,
    },
    EventAck {
        through_sequence: u32,
    },
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
    Disconnect,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }

    pub fn access_archived(data: &[u8]) -> Result<&ArchivedPacket, PacketError> {
        rkyv::access::<ArchivedPacket, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}
