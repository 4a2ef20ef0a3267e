use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use glam::Vec3;

use rampart::net::sequence_greater_than;
use rampart::{
    ActionRequest, Arena, ClientConnection, Contact, ConnectionManager, ConnectionState,
    EventQueue, FixedTimestep, Material, MatchEvent, NetworkEndpoint, Packet, PacketHeader,
    PacketType, PlayerId, PoseUpdate, Stage, StampedEvent, StateUpdate, tick_time_ms,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::world::{OverlapEdge, World};

/// Log a status line this often (at the default 60 Hz: every five seconds).
const STATUS_INTERVAL_TICKS: u32 = 300;

pub struct GameServer {
    endpoint: NetworkEndpoint,
    connections: ConnectionManager,
    config: ServerConfig,
    arena: Arena,
    world: World,
    events: EventQueue,
    timestep: FixedTimestep,
    tick: u32,
    last_tick_time: Instant,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(bind_addr: &str, config: ServerConfig) -> io::Result<Self> {
        let endpoint = NetworkEndpoint::bind(bind_addr)?;

        let mut connections = ConnectionManager::new(config.max_clients);
        connections.set_timeout(config.client_timeout);

        let mut world = World::new(config.entity_capacity, config.hazard.clone());
        world.seed_pickups();

        Ok(Self {
            endpoint,
            connections,
            arena: Arena::default(),
            world,
            events: EventQueue::new(config.event_queue_capacity),
            timestep: FixedTimestep::new(config.tick_rate),
            tick: 0,
            last_tick_time: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            self.log_events();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
        self.log_events();
    }

    pub fn shutdown_connections(&mut self) {
        let client_ids: Vec<u32> = self.connections.iter().map(|c| c.client_id).collect();
        for client_id in client_ids {
            self.kick_client(client_id);
        }
    }

    pub fn kick_client(&mut self, client_id: u32) {
        if let Some(conn) = self.connections.get(client_id) {
            let addr = conn.addr;
            let packet = Packet::new(PacketHeader::new(0, 0, 0), PacketType::Disconnect);
            let _ = self.endpoint.send_to(&packet, addr);
        }

        if let Some(conn) = self.connections.remove(client_id) {
            self.teardown(conn, DisconnectReason::Kicked);
        }
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.timestep.accumulate(delta.as_secs_f32());

        if let Err(e) = self.process_network() {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("network error: {}", e),
            });
        }

        while self.timestep.consume_tick() {
            self.tick();
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.tick,
            client_count: self.connections.client_count(),
            max_clients: self.config.max_clients,
            player_count: self.arena.player_count(),
            entity_count: self.world.entity_count(),
            safe_radius: self.world.hazard_radius(),
        }
    }

    fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        let now_ms = self.now_ms();
        let dt = self.timestep.dt();

        // Timers, aim interpolation, preview refresh.
        self.arena.tick(&mut self.world, now_ms, dt);

        // Scene step feeds overlap transitions back into the arena. Entity
        // contacts resolve at dispatch time so an edge already consumed by an
        // earlier claim reports its new holder (or nothing at all).
        for (player, edge, began) in self.world.advance(dt) {
            let contact = match edge {
                OverlapEdge::Hazard => Some(Contact::Hazard),
                OverlapEdge::Entity(id) => self.world.pickup_contact(id),
            };
            if let Some(contact) = contact {
                self.arena
                    .handle_overlap(&mut self.world, player, contact, began);
            }
        }

        for event in self.arena.drain_events() {
            if let MatchEvent::PlayerEliminated { player } = event {
                self.retire_player(player);
            }
            self.events.push(self.tick, now_ms, event);
        }
        for (player, cue) in self.world.drain_cues() {
            self.events
                .push(self.tick, now_ms, MatchEvent::Animation { player, cue });
        }

        if self.tick % self.config.snapshot_send_rate == 0 {
            self.broadcast_state(now_ms);
        }
        self.flush_events(now_ms);

        for conn in self.connections.cleanup_timed_out() {
            self.teardown(conn, DisconnectReason::Timeout);
        }

        if self.tick % STATUS_INTERVAL_TICKS == 0 {
            let stats = self.stats();
            log::debug!(
                "tick {}: {}/{} clients, {} players, {} entities, safe radius {:.0}",
                stats.tick,
                stats.client_count,
                stats.max_clients,
                stats.player_count,
                stats.entity_count,
                stats.safe_radius
            );
        }
    }

    fn now_ms(&self) -> u64 {
        tick_time_ms(self.tick as u64, self.config.tick_rate)
    }

    /// Elimination keeps the socket open: the body leaves the scene and the
    /// connection drops to a spectator seat.
    fn retire_player(&mut self, player: PlayerId) {
        self.world.remove_body(player);
        if let Some(conn) = self.connections.get_mut(player) {
            conn.demote_to_spectator();
            log::debug!("client {} now spectating", conn.client_id);
        }
    }

    /// Full connection teardown for leavers of any kind.
    fn teardown(&mut self, conn: ClientConnection, reason: DisconnectReason) {
        if let Some(player) = conn.player() {
            if self.arena.remove(&mut self.world, player) {
                self.world.remove_body(player);
            }
        }
        self.pending_events.push_back(ServerEvent::ClientDisconnected {
            client_id: conn.client_id,
            reason,
        });
    }

    fn broadcast_state(&mut self, now_ms: u64) {
        let (states, removed) = self.arena.cut_snapshots(&self.world, true);
        if states.is_empty() && removed.is_empty() {
            return;
        }

        let mut update = StateUpdate::new(self.tick, now_ms);
        update.states = states;
        update.removed = removed;
        self.broadcast(PacketType::StateUpdate(update));
    }

    fn flush_events(&mut self, now_ms: u64) {
        if let Some(ack) = self.connections.min_event_ack() {
            self.events.ack_up_to(ack);
        }

        let events: Vec<StampedEvent> = self
            .events
            .pending_for_send()
            .map(|e| e.stamped())
            .collect();
        if !events.is_empty() {
            self.broadcast(PacketType::Events { events });
        }
        self.events.cleanup(now_ms);
    }

    /// One payload to every fully connected peer, each under its own
    /// sequence numbering.
    fn broadcast(&mut self, payload: PacketType) {
        for conn in self.connections.iter_mut() {
            if conn.state != ConnectionState::Connected {
                continue;
            }
            let packet = conn.create_packet(payload.clone());
            if let Err(err) = self.endpoint.send_to(&packet, conn.addr) {
                self.pending_events.push_back(ServerEvent::Error {
                    message: format!("send to {} failed: {}", conn.addr, err),
                });
            }
        }
    }

    fn process_network(&mut self) -> io::Result<()> {
        let packets = self.endpoint.receive()?;

        for (packet, addr) in packets {
            self.handle_packet(packet, addr)?;
        }

        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) -> io::Result<()> {
        if let Some(conn) = self.connections.get_by_addr_mut(&addr) {
            if !conn.receive_tracker.record_received(packet.header.sequence) {
                return Ok(());
            }
            conn.touch();
        }

        match packet.payload {
            PacketType::ConnectionRequest { client_salt } => {
                self.handle_connection_request(addr, client_salt)?;
            }
            PacketType::ChallengeResponse { combined_salt } => {
                self.handle_challenge_response(addr, combined_salt)?;
            }
            PacketType::Action(request) => {
                self.handle_action(addr, request);
            }
            PacketType::Pose(pose) => {
                self.handle_pose(addr, pose);
            }
            PacketType::EventAck { through_sequence } => {
                self.handle_event_ack(addr, through_sequence);
            }
            PacketType::Ping { timestamp } => {
                self.handle_ping(addr, timestamp)?;
            }
            PacketType::Disconnect => {
                self.handle_disconnect(addr);
            }
            _ => {}
        }

        Ok(())
    }

    fn handle_connection_request(&mut self, addr: SocketAddr, client_salt: u64) -> io::Result<()> {
        self.pending_events
            .push_back(ServerEvent::ClientConnecting { addr });

        let conn = match self.connections.get_or_create_pending(addr, client_salt) {
            Ok(c) => c,
            Err(reason) => {
                let packet = Packet::new(
                    PacketHeader::new(0, 0, 0),
                    PacketType::ConnectionDenied {
                        reason: reason.to_string(),
                    },
                );
                self.endpoint.send_to(&packet, addr)?;
                self.pending_events.push_back(ServerEvent::ConnectionDenied {
                    addr,
                    reason: reason.to_string(),
                });
                return Ok(());
            }
        };

        let server_salt = conn.server_salt;
        let challenge = conn.combined_salt();
        let packet = conn.create_packet(PacketType::ConnectionChallenge {
            server_salt,
            challenge,
        });
        self.endpoint.send_to(&packet, addr)?;

        Ok(())
    }

    fn handle_challenge_response(&mut self, addr: SocketAddr, combined_salt: u64) -> io::Result<()> {
        let Some(conn) = self.connections.get_by_addr_mut(&addr) else {
            return Ok(());
        };

        if combined_salt != conn.combined_salt() {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("invalid challenge response from {}", addr),
            });
            return Ok(());
        }

        // A repeated response (lost accept) just gets the accept and a fresh
        // full state again; admission happens once.
        let first_time = conn.state != ConnectionState::Connected;
        conn.state = ConnectionState::Connected;
        let client_id = conn.client_id;
        let player = conn.player();

        let accept = conn.create_packet(PacketType::ConnectionAccepted {
            player_id: client_id,
        });
        self.endpoint.send_to(&accept, addr)?;

        if first_time {
            let now_ms = self.now_ms();
            if let Some(player) = player {
                self.world.spawn_body(player);
                self.arena.admit(&mut self.world, now_ms, player);
                for material in [Material::Wood, Material::Stone, Material::Steel] {
                    self.arena
                        .grant_materials(player, material, self.config.starting_materials);
                }
            }
            self.pending_events.push_back(ServerEvent::ClientConnected {
                client_id,
                addr,
                player: client_id,
            });
        }

        let full = self.full_state_update();
        if let Some(conn) = self.connections.get_by_addr_mut(&addr) {
            let packet = conn.create_packet(PacketType::StateUpdate(full));
            self.endpoint.send_to(&packet, addr)?;
        }

        Ok(())
    }

    /// Every player's current record, for peers that have no baseline yet.
    /// Reads without clearing dirty bits or draining pending removals.
    fn full_state_update(&self) -> StateUpdate {
        let mut update = StateUpdate::new(self.tick, self.now_ms());
        update.full = true;
        update.states = self
            .arena
            .players()
            .map(|state| {
                let position = self
                    .world
                    .body_transform(state.id)
                    .map_or(Vec3::ZERO, |t| t.position);
                state.snapshot(position)
            })
            .collect();
        update
    }

    fn handle_action(&mut self, addr: SocketAddr, request: ActionRequest) {
        let Some(conn) = self.connections.get_by_addr(&addr) else {
            return;
        };
        if conn.state != ConnectionState::Connected {
            return;
        }
        // Spectators drive no combat state.
        let Some(player) = conn.player() else {
            return;
        };

        let now_ms = self.now_ms();
        self.arena.handle(&mut self.world, now_ms, player, request);
    }

    fn handle_pose(&mut self, addr: SocketAddr, pose: PoseUpdate) {
        let Some(conn) = self.connections.get_by_addr_mut(&addr) else {
            return;
        };
        if conn.state != ConnectionState::Connected {
            return;
        }
        let Some(player) = conn.player() else {
            return;
        };

        // Absolute transforms must not go backwards in time.
        if !sequence_greater_than(pose.tick, conn.last_pose_tick) {
            return;
        }
        conn.last_pose_tick = pose.tick;

        let (yaw, pitch) = pose.decode_view();
        if self
            .world
            .set_body_pose(player, Vec3::from(pose.position), yaw, pitch)
        {
            self.arena.note_body_moved(player);
        }
        self.arena.set_view_target(player, yaw, pitch);
    }

    fn handle_event_ack(&mut self, addr: SocketAddr, through_sequence: u32) {
        if let Some(conn) = self.connections.get_by_addr_mut(&addr) {
            if sequence_greater_than(through_sequence, conn.event_ack) {
                conn.event_ack = through_sequence;
            }
        }
    }

    fn handle_ping(&mut self, addr: SocketAddr, timestamp: u64) -> io::Result<()> {
        let packet = Packet::new(PacketHeader::new(0, 0, 0), PacketType::Pong { timestamp });
        self.endpoint.send_to(&packet, addr)?;
        Ok(())
    }

    fn handle_disconnect(&mut self, addr: SocketAddr) {
        if let Some(conn) = self.connections.remove_by_addr(&addr) {
            self.teardown(conn, DisconnectReason::Graceful);
        }
    }

    /// Drains lifecycle notices into the log; the headless server's only UI.
    fn log_events(&mut self) {
        for event in self.pending_events.drain(..) {
            match event {
                ServerEvent::ClientConnecting { addr } => {
                    log::debug!("connection request from {}", addr);
                }
                ServerEvent::ClientConnected {
                    client_id,
                    addr,
                    player,
                } => {
                    log::info!(
                        "client {} connected from {} as player {}",
                        client_id,
                        addr,
                        player
                    );
                }
                ServerEvent::ClientDisconnected { client_id, reason } => {
                    log::info!("client {} {}", client_id, reason.as_str());
                }
                ServerEvent::ConnectionDenied { addr, reason } => {
                    log::warn!("connection denied to {}: {}", addr, reason);
                }
                ServerEvent::Error { message } => {
                    log::error!("{}", message);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u32,
    pub client_count: usize,
    pub max_clients: usize,
    pub player_count: usize,
    pub entity_count: usize,
    pub safe_radius: f32,
}
