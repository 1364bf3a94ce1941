use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dungeon::{AStar, Level, Pathfinder, Room};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dungeon_skirmish::systems::lock_level;
use dungeon_skirmish::{Direction, Game, GameConfig, PlayerCommand, Tag, TurnState, lock_world};

const MAX_TICKS: usize = 400;

/// 三个房间，用走廊串起来
fn demo_level() -> Level {
    let mut level = Level::new(40, 14);
    level.carve_room(Room::new(1, 1, 8, 6));
    level.carve_room(Room::new(16, 2, 8, 6));
    level.carve_room(Room::new(28, 5, 8, 7));
    level.carve_h_corridor(5, 20, 4);
    level.carve_v_corridor(5, 8, 20);
    level.carve_h_corridor(20, 32, 8);
    level
}

/// 朝最近的怪物走一步，没有怪物就原地等待
fn choose_command(game: &Game) -> Option<PlayerCommand> {
    let (player_pos, targets) = {
        let world = lock_world(game.world());
        let player = world.player()?;
        let player_pos = world.position(player).ok()?;
        let targets: Vec<_> = world
            .query_by_tag(Tag::Monsters)
            .into_iter()
            .filter_map(|m| world.position(m).ok())
            .collect();
        (player_pos, targets)
    };

    let level = lock_level(game.level());
    let path = targets
        .iter()
        .map(|target| AStar.find_path(&*level, player_pos.as_tuple(), target.as_tuple()))
        .filter(|path| path.len() > 1)
        .min_by_key(Vec::len);

    let Some(path) = path else {
        return Some(PlayerCommand::Wait);
    };
    let (nx, ny) = path[1];
    let direction = Direction::ALL
        .into_iter()
        .find(|d| d.delta() == (nx - player_pos.x, ny - player_pos.y))?;
    Some(PlayerCommand::Move(direction))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::load(&path).with_context(|| format!("Failed to load config from {}", path))?,
        None => GameConfig::default(),
    };

    let mut game = Game::new(demo_level(), config).context("Failed to build game")?;
    let mut now = Instant::now();

    for tick in 0..MAX_TICKS {
        if game.is_game_over() {
            break;
        }
        let command = match game.state() {
            TurnState::WaitingForPlayerInput => choose_command(&game),
            _ => None,
        };
        game.update(command, now)
            .with_context(|| format!("Simulation failed on tick {}", tick))?;

        let monsters_left = lock_world(game.world()).query_by_tag(Tag::Monsters).len();
        if monsters_left == 0 {
            info!(turn = game.turn_counter(), "all monsters defeated");
            break;
        }
        now += Duration::from_millis(game.config().auto_move_cooldown_ms);
    }

    info!(state = %game.state(), turns = game.turn_counter(), "simulation finished");
    for text in game.messages().iter().rev() {
        print!("{}", text);
    }
    Ok(())
}
