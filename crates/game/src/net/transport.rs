//! UDP transport with a thin reliability layer: per-peer sequence numbers,
//! a 32-wide ack bitfield piggybacked on every header, duplicate rejection,
//! and RFC 6298 RTT smoothing. The endpoint itself stays connectionless;
//! server-side per-client state lives in [`ConnectionManager`].

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::protocol::{MAX_PACKET_SIZE, Packet, PacketHeader, PacketType, sequence_greater_than};
use crate::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Sent a connection request, awaiting the challenge.
    Connecting,
    /// Answered the challenge, awaiting acceptance.
    ChallengeResponse,
    Connected,
    Disconnecting,
}

/// What a connected peer is allowed to do. Participants drive a player in
/// the arena; spectators only receive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Participant { player: PlayerId },
    Spectator,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Smoothed round-trip estimate in milliseconds.
    pub rtt_ms: f32,
    pub rtt_variance: f32,
    pub packet_loss_percent: f32,
}

#[derive(Debug, Clone)]
struct SentPacket {
    sequence: u32,
    send_time: Instant,
    acked: bool,
}

fn acked_by(ack: u32, ack_bitfield: u32, sequence: u32) -> bool {
    if sequence == ack {
        return true;
    }
    if !sequence_greater_than(ack, sequence) {
        return false;
    }
    let diff = ack.wrapping_sub(sequence);
    diff <= 32 && (ack_bitfield & (1 << (diff - 1))) != 0
}

/// Follows which of our sent sequences the peer has confirmed, and keeps
/// the RTT estimate current.
#[derive(Debug)]
struct AckTracker {
    pending: VecDeque<SentPacket>,
    max_pending: usize,
    srtt: f32,
    rtt_var: f32,
}

impl AckTracker {
    fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            max_pending,
            srtt: 100.0,
            rtt_var: 50.0,
        }
    }

    fn track(&mut self, sequence: u32) {
        while self.pending.len() >= self.max_pending {
            self.pending.pop_front();
        }
        self.pending.push_back(SentPacket {
            sequence,
            send_time: Instant::now(),
            acked: false,
        });
    }

    fn process_ack(&mut self, ack: u32, ack_bitfield: u32) {
        let now = Instant::now();
        let mut samples = Vec::new();

        for sent in &mut self.pending {
            if sent.acked || !acked_by(ack, ack_bitfield, sent.sequence) {
                continue;
            }
            sent.acked = true;
            samples.push(now.duration_since(sent.send_time).as_secs_f32() * 1000.0);
        }
        for rtt in samples {
            self.update_rtt(rtt);
        }

        while self.pending.front().is_some_and(|p| p.acked) {
            self.pending.pop_front();
        }
    }

    fn update_rtt(&mut self, rtt: f32) {
        // RFC 6298 smoothing constants.
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        self.rtt_var = (1.0 - BETA) * self.rtt_var + BETA * (rtt - self.srtt).abs();
        self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt;
    }

    fn unacked_count(&self) -> usize {
        self.pending.iter().filter(|p| !p.acked).count()
    }
}

/// Remembers which sequences a peer has sent us, for duplicate rejection
/// and for building the ack/ack_bitfield pair we send back.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: u32,
    received_bitfield: u32,
    recent: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: 0,
            received_bitfield: 0,
            recent: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Records an incoming sequence. Returns false for a duplicate.
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if self.recent.contains(&sequence) {
            return false;
        }
        if self.recent.len() >= self.max_recent {
            self.recent.pop_front();
        }
        self.recent.push_back(sequence);

        if sequence_greater_than(sequence, self.last_received) {
            let diff = sequence.wrapping_sub(self.last_received);
            self.received_bitfield = if diff <= 32 {
                // Slide the window and mark the old head at its new offset.
                // A shift by the full width must not touch the carried bits.
                let carried = if diff == 32 {
                    0
                } else {
                    self.received_bitfield << diff
                };
                carried | (1 << (diff - 1))
            } else {
                0
            };
            self.last_received = sequence;
        } else if sequence != self.last_received {
            let diff = self.last_received.wrapping_sub(sequence);
            if diff <= 32 {
                self.received_bitfield |= 1 << (diff - 1);
            }
        }
        true
    }

    pub fn ack_data(&self) -> (u32, u32) {
        (self.last_received, self.received_bitfield)
    }
}

/// Nonblocking UDP endpoint. Receiving only frames and validates packets;
/// sequence bookkeeping belongs to whoever owns the peer relationship
/// (the endpoint itself in client mode, [`ClientConnection`] on the server).
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    state: ConnectionState,
    send_sequence: u32,
    ack_tracker: AckTracker,
    receive_tracker: ReceiveTracker,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_PACKET_SIZE],
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            remote_addr: None,
            state: ConnectionState::Disconnected,
            send_sequence: 0,
            ack_tracker: AckTracker::new(256),
            receive_tracker: ReceiveTracker::new(),
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub fn set_remote(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> io::Result<usize> {
        let data = packet
            .serialize()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if data.len() > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "packet exceeds MTU",
            ));
        }

        let bytes = self.socket.send_to(&data, addr)?;
        self.ack_tracker.track(packet.header.sequence);
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(bytes)
    }

    /// Client-mode send to the configured remote.
    pub fn send(&mut self, packet: &Packet) -> io::Result<usize> {
        let addr = self
            .remote_addr
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no remote address set"))?;
        self.send_to(packet, addr)
    }

    /// Stamps a payload with this endpoint's own sequence/ack state
    /// (client mode; server sends go through the per-client connection).
    pub fn create_packet(&mut self, payload: PacketType) -> Packet {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);

        let (ack, ack_bitfield) = self.receive_tracker.ack_data();
        Packet::new(PacketHeader::new(sequence, ack, ack_bitfield), payload)
    }

    /// Drains everything waiting on the socket. Frames and validates but
    /// does not deduplicate; callers feed headers to [`Self::note_received`]
    /// or a per-client tracker as appropriate.
    pub fn receive(&mut self) -> io::Result<Vec<(Packet, SocketAddr)>> {
        let mut packets = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    let Ok(packet) = Packet::deserialize(&self.recv_buffer[..size]) else {
                        continue;
                    };
                    if !packet.header.is_valid() {
                        continue;
                    }

                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    packets.push((packet, addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        Ok(packets)
    }

    /// Endpoint-level bookkeeping for client mode: rejects duplicates,
    /// consumes the header's acks, refreshes RTT/loss estimates.
    pub fn note_received(&mut self, header: &PacketHeader) -> bool {
        if !self.receive_tracker.record_received(header.sequence) {
            return false;
        }
        self.ack_tracker.process_ack(header.ack, header.ack_bitfield);

        self.stats.rtt_ms = self.ack_tracker.srtt;
        self.stats.rtt_variance = self.ack_tracker.rtt_var;
        if self.stats.packets_sent > 0 {
            let unacked = self.ack_tracker.unacked_count() as f32;
            self.stats.packet_loss_percent =
                (unacked / (self.stats.packets_sent as f32).max(1.0)) * 100.0;
        }
        true
    }
}

/// Server-side record of one remote peer.
#[derive(Debug)]
pub struct ClientConnection {
    pub addr: SocketAddr,
    pub client_id: u32,
    pub state: ConnectionState,
    pub role: ConnectionRole,
    pub client_salt: u64,
    pub server_salt: u64,
    /// Highest match-event sequence this peer has confirmed.
    pub event_ack: u32,
    /// Newest pose tick applied, for reorder rejection. Pose ticks count
    /// from 1; 0 means none seen.
    pub last_pose_tick: u32,
    pub last_receive_time: Instant,
    pub receive_tracker: ReceiveTracker,
    pub send_sequence: u32,
}

impl ClientConnection {
    pub fn new(addr: SocketAddr, client_id: u32, client_salt: u64) -> Self {
        Self {
            addr,
            client_id,
            state: ConnectionState::Connecting,
            role: ConnectionRole::Participant { player: client_id },
            client_salt,
            server_salt: rand_u64(),
            event_ack: 0,
            last_pose_tick: 0,
            last_receive_time: Instant::now(),
            receive_tracker: ReceiveTracker::new(),
            send_sequence: 0,
        }
    }

    pub fn combined_salt(&self) -> u64 {
        self.client_salt ^ self.server_salt
    }

    pub fn player(&self) -> Option<PlayerId> {
        match self.role {
            ConnectionRole::Participant { player } => Some(player),
            ConnectionRole::Spectator => None,
        }
    }

    /// Elimination keeps the connection alive but read-only.
    pub fn demote_to_spectator(&mut self) {
        self.role = ConnectionRole::Spectator;
    }

    /// Stamps a payload with this connection's sequence/ack state.
    pub fn create_packet(&mut self, payload: PacketType) -> Packet {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);

        let (ack, ack_bitfield) = self.receive_tracker.ack_data();
        Packet::new(PacketHeader::new(sequence, ack, ack_bitfield), payload)
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_receive_time = Instant::now();
    }
}

/// Salt source for the connect handshake. Hashes the clock through
/// `RandomState`, which is seeded per process.
fn rand_u64() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    hasher.finish()
}

/// Address-keyed table of client connections with a capacity cap.
#[derive(Debug)]
pub struct ConnectionManager {
    clients_by_addr: HashMap<SocketAddr, u32>,
    clients: HashMap<u32, ClientConnection>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Finds the connection for `addr`, creating a pending one when the
    /// address is new. Fails when the table is full.
    pub fn get_or_create_pending(
        &mut self,
        addr: SocketAddr,
        client_salt: u64,
    ) -> Result<&mut ClientConnection, &'static str> {
        let client_id = match self.clients_by_addr.entry(addr) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                if self.clients.len() >= self.max_clients {
                    return Err("server full");
                }
                let client_id = self.next_client_id;
                self.next_client_id += 1;
                entry.insert(client_id);
                self.clients
                    .insert(client_id, ClientConnection::new(addr, client_id, client_salt));
                client_id
            }
        };

        self.clients
            .get_mut(&client_id)
            .ok_or("connection table out of sync")
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&ClientConnection> {
        self.clients_by_addr
            .get(addr)
            .and_then(|id| self.clients.get(id))
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut ClientConnection> {
        match self.clients_by_addr.get(addr) {
            Some(&id) => self.clients.get_mut(&id),
            None => None,
        }
    }

    pub fn get(&self, client_id: u32) -> Option<&ClientConnection> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut ClientConnection> {
        self.clients.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: u32) -> Option<ClientConnection> {
        let conn = self.clients.remove(&client_id)?;
        self.clients_by_addr.remove(&conn.addr);
        Some(conn)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<ClientConnection> {
        let client_id = self.clients_by_addr.remove(addr)?;
        self.clients.remove(&client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection> {
        self.clients.values_mut()
    }

    /// Drops connections that went quiet, returning them for teardown.
    pub fn cleanup_timed_out(&mut self) -> Vec<ClientConnection> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_timed_out(self.timeout))
            .map(|(&id, _)| id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// Event sequence confirmed by every fully connected peer, wrap-aware.
    /// None when nobody is connected.
    pub fn min_event_ack(&self) -> Option<u32> {
        self.clients
            .values()
            .filter(|c| c.state == ConnectionState::Connected)
            .map(|c| c.event_ack)
            .reduce(|a, b| if sequence_greater_than(a, b) { b } else { a })
    }

    pub fn client_count(&self) -> usize {
        self.clients
            .values()
            .filter(|c| c.state == ConnectionState::Connected)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.clients.len()
    }
}
