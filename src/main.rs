use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use serde::Deserialize;

use tilewalk::components::{
    ActorId, Facing, GamePosition, MovementType, Player, PlayerInput, TickClock, WalkConfig,
};
use tilewalk::error::TilewalkError;
use tilewalk::scripting::{RhaiScripts, ScriptErrors, ScriptHost};
use tilewalk::simulation::{
    run_simulation, SimActor, SimActorSpec, SimulationRequest, SimulationResult,
};
use tilewalk::tilemap::{CollisionLayer, CollisionMap};
use tilewalk::TilewalkPlugin;

const DEFAULT_TICK_MS: f32 = 1000.0 / 60.0;
const DEFAULT_FRAMES: u32 = 600;

#[derive(Deserialize, Default)]
#[serde(default)]
struct StartupConfig {
    walk: WalkConfig,
    layers: Option<Vec<CollisionLayer>>,
    actors: Vec<SimActorSpec>,
    /// Call name to rhai source.
    scripts: HashMap<String, String>,
    tick_ms: Option<f32>,
    frames: Option<u32>,
    player_input: Option<[f32; 2]>,
}

impl StartupConfig {
    fn collision_map(&self) -> CollisionMap {
        match &self.layers {
            Some(layers) => CollisionMap::new(layers.clone()),
            None => CollisionMap::test_level(),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, TilewalkError> {
    let contents = std::fs::read_to_string(path).map_err(|source| TilewalkError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| TilewalkError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_startup_config() -> StartupConfig {
    let path = std::env::var("TILEWALK_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tilewalk.json"));
    match read_json::<StartupConfig>(&path) {
        Ok(cfg) => {
            eprintln!("[Tilewalk] Loaded startup config from {}", path.display());
            cfg
        }
        Err(TilewalkError::ConfigRead { .. }) => StartupConfig::default(),
        Err(e) => {
            eprintln!("[Tilewalk] {e}");
            StartupConfig::default()
        }
    }
}

fn simulate(
    startup: &StartupConfig,
    request_path: &Path,
) -> Result<SimulationResult, TilewalkError> {
    let request: SimulationRequest = read_json(request_path)?;
    run_simulation(&startup.collision_map(), &startup.walk, &request)
}

fn spawn_actors(world: &mut World, actors: &[SimActorSpec]) -> Result<(), TilewalkError> {
    for spec in actors {
        let actor = SimActor::from_spec(spec)?;
        let kind = actor.plan.kind;
        let mut entity = world.spawn((
            ActorId(actor.id),
            actor.position,
            actor.velocity,
            actor.facing,
            actor.walker,
            actor.plan,
            actor.timers,
        ));
        if kind == MovementType::PlayerControlled {
            entity.insert(Player);
        }
    }
    Ok(())
}

fn build_script_host(scripts: &HashMap<String, String>) -> ScriptHost {
    let mut host = RhaiScripts::new();
    for (name, source) in scripts {
        if let Err(e) = host.load_script(name.as_str(), source.as_str()) {
            eprintln!("[Tilewalk] Skipping script '{}': {}", name, e);
        }
    }
    ScriptHost::new(host)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let startup = load_startup_config();

    if args.get(1).map(String::as_str) == Some("simulate") {
        let Some(request_path) = args.get(2) else {
            eprintln!("usage: tilewalk simulate <request.json>");
            std::process::exit(2);
        };
        match simulate(&startup, Path::new(request_path)) {
            Ok(result) => match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("[Tilewalk] Failed to encode simulation result: {e}");
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("[Tilewalk] {e}");
                std::process::exit(2);
            }
        }
        return;
    }

    let tick_ms = startup.tick_ms.unwrap_or(DEFAULT_TICK_MS).max(1.0);
    let tick = Duration::from_secs_f32(tick_ms / 1000.0);
    let frames = startup.frames.unwrap_or(DEFAULT_FRAMES);

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(bevy::log::LogPlugin::default())
        .insert_resource(startup.walk.clone())
        .insert_resource(startup.collision_map())
        .insert_resource(build_script_host(&startup.scripts))
        .insert_resource(Time::<Fixed>::from_duration(tick))
        .insert_resource(TimeUpdateStrategy::ManualDuration(tick))
        .add_plugins(TilewalkPlugin);
    if let Some([dx, dy]) = startup.player_input {
        app.insert_resource(PlayerInput { dx, dy });
    }

    if let Err(e) = spawn_actors(app.world_mut(), &startup.actors) {
        eprintln!("[Tilewalk] {e}");
        std::process::exit(2);
    }

    app.finish();
    app.cleanup();
    info!(
        "[Tilewalk] Running {} frames at {:.2} ms per tick with {} actors",
        frames,
        tick_ms,
        startup.actors.len()
    );
    for _ in 0..frames {
        app.update();
    }

    let world = app.world_mut();
    let ticks = world.resource::<TickClock>().frame;
    let failures = world.resource::<ScriptErrors>().entries.len();
    let mut query = world.query::<(&ActorId, &GamePosition, &Facing)>();
    for (id, pos, facing) in query.iter(world) {
        info!(
            "[Tilewalk] actor {} at ({:.1}, {:.1}) facing {:?}",
            id.0, pos.x, pos.y, facing.0
        );
    }
    info!("[Tilewalk] {} ticks simulated, {} script failures", ticks, failures);
}
