use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub max_clients: usize,
    /// Send dirty snapshots every N ticks.
    pub snapshot_send_rate: u32,
    pub event_queue_capacity: usize,
    pub entity_capacity: usize,
    pub client_timeout: Duration,
    /// Build materials granted per type when a player spawns in.
    pub starting_materials: u32,
    pub hazard: HazardConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_clients: 32,
            snapshot_send_rate: 1,
            event_queue_capacity: 256,
            entity_capacity: 4096,
            client_timeout: Duration::from_secs(10),
            starting_materials: 100,
            hazard: HazardConfig::default(),
        }
    }
}

/// The shrinking safe zone. Everything outside its disc takes damage on the
/// one-second pulse.
#[derive(Debug, Clone)]
pub struct HazardConfig {
    pub initial_radius: f32,
    pub min_radius: f32,
    /// Units per second the safe radius loses.
    pub shrink_rate: f32,
    pub damage_per_pulse: f32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            initial_radius: 2000.0,
            min_radius: 250.0,
            shrink_rate: 10.0,
            damage_per_pulse: 1.0,
        }
    }
}
