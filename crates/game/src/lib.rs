pub mod arena;
pub mod build;
pub mod clock;
pub mod combat;
pub mod event;
pub mod net;
pub mod stage;
pub mod timer;

/// Stable id a connection drives a combat state under.
pub type PlayerId = u32;
/// Scene entity handle; meaning belongs to the [`stage::Stage`] owner.
pub type EntityId = u32;

pub use arena::{Arena, Contact};
pub use build::{BuildState, placement_transform};
pub use clock::{FixedTimestep, tick_time_ms};
pub use combat::{
    ActionGate, AimTrack, CombatState, CombatTuning, Inventory, ItemKind, LockKind, LockToken,
    Material, Slot, SlotSet, StructureKind,
};
pub use event::{AnimCue, EventQueue, MatchEvent, PendingEvent, ReliabilityMode, StampedEvent};
pub use net::{
    ActionRequest, ClientConnection, CombatSnapshot, ConnectionManager, ConnectionRole,
    ConnectionState, DEFAULT_PORT, DEFAULT_TICK_RATE, NetworkEndpoint, NetworkStats,
    ObserverMirror, Packet, PacketError, PacketHeader, PacketType, PoseUpdate, StateUpdate,
};
pub use stage::{EntityClass, Socket, SpawnError, Stage, Transform};
pub use timer::{TimerEvent, TimerQueue};
