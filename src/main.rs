//! Headless runner: drives a scripted race with the throttle held down and
//! prints the stored leaderboard.
//!
//! Usage: `topo-racing [config.json]`. Records go to `$TOPO_RACING_DATA_DIR`
//! (default `./data`).

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use topo_racing::game_server::records::{format_time, RecordStore};
use topo_racing::game_server::simulation::is_missing_rival;
use topo_racing::game_server::RaceEvent;
use topo_racing::topology::Scene;
use topo_racing::{GameServer, GameState, RaceConfig, Result};

const STEP: f32 = 1.0 / 60.0;
const MAX_TICKS: u32 = 60 * 60 * 10;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => RaceConfig::from_json_file(&PathBuf::from(path))?,
        None => RaceConfig::default(),
    };
    let data_dir = env::var_os("TOPO_RACING_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));

    let records = RecordStore::new(data_dir);
    records.ensure_layout()?;
    let mut server = GameServer::new(Scene::new(), records);

    if let Err(err) = server.init_race(config.clone()) {
        if !is_missing_rival(&err) {
            return Err(err);
        }
        log::warn!("{}; racing without a rival", err);
        server.init_race(RaceConfig {
            rival: None,
            ..config.clone()
        })?;
    }

    server.start();
    server.key_pressed("w");
    for _ in 0..MAX_TICKS {
        match server.tick(STEP)? {
            Some(RaceEvent::Finished { time }) => {
                println!("finished in {}", format_time(time));
            }
            Some(RaceEvent::LapCompleted { lap, time }) => {
                println!("lap {} at {}", lap, format_time(time));
            }
            _ => {}
        }
        if server.state() == GameState::Results {
            break;
        }
    }
    if server.state() != GameState::Results {
        log::warn!("race did not finish within {} ticks", MAX_TICKS);
    }
    if let Some(saved) = server.last_saved() {
        println!("{}", if saved { "new record" } else { "record kept" });
    }
    let stats = server.stats();
    log::info!(
        "{} ticks, {:.3} ms average",
        stats.ticks,
        stats.avg_tick_time_ms
    );
    server.close()?;

    for (rank, entry) in server
        .records()
        .leaderboard(config.map, config.topology)?
        .iter()
        .enumerate()
    {
        println!("{:>2}. {:<12} {}", rank + 1, entry.player, format_time(entry.final_time));
    }
    Ok(())
}
