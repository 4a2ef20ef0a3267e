mod config;
mod events;
mod server;
mod world;

use anyhow::Result;
use clap::Parser;

use config::{HazardConfig, ServerConfig};
use server::GameServer;

#[derive(Parser)]
#[command(name = "rampart-server")]
#[command(about = "Rampart game server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = rampart::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = rampart::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,

    #[arg(long, default_value_t = 2000.0, help = "Initial safe zone radius")]
    hazard_radius: f32,

    #[arg(long, default_value_t = 10.0, help = "Safe zone shrink rate in units/s")]
    hazard_shrink: f32,

    #[arg(long, default_value_t = 1.0, help = "Storm damage per one-second pulse")]
    hazard_damage: f32,

    #[arg(long, default_value_t = 100, help = "Materials granted per type on join")]
    starting_materials: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        starting_materials: args.starting_materials,
        hazard: HazardConfig {
            initial_radius: args.hazard_radius,
            shrink_rate: args.hazard_shrink,
            damage_per_pulse: args.hazard_damage,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut server = GameServer::new(&bind_addr, config)?;
    log::info!("Server started on {}", server.local_addr());
    server.run();
    log::info!("Server shutting down");

    Ok(())
}
