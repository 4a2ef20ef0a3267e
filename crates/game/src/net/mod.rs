mod mirror;
mod protocol;
mod transport;

pub use mirror::ObserverMirror;
pub use protocol::{ArchivedPacket, sequence_greater_than};
pub use protocol::{
    ActionRequest, CombatSnapshot, DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_PACKET_SIZE, Packet,
    PacketError, PacketHeader, PacketType, PoseUpdate, PROTOCOL_MAGIC, PROTOCOL_VERSION,
    StateUpdate,
};
pub use transport::{
    ClientConnection, ConnectionManager, ConnectionRole, ConnectionState, NetworkEndpoint,
    NetworkStats, ReceiveTracker,
};
