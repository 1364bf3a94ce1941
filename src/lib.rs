//! 回合制地牢遭遇战的模拟核心
//!
//! 世界存储、事件总线、玩法系统和回合驱动。渲染、输入和地图生成
//! 都不在这里，由调用方提供。

pub mod config;
pub mod ecs;
pub mod event_bus;
pub mod game_loop;
pub mod input;
pub mod systems;
pub mod turn_system;

pub use crate::config::GameConfig;
pub use crate::ecs::{SharedWorld, Tag, World, lock_world};
pub use crate::event_bus::{EventBus, EventHandler, EventKind, GameEvent, MessageCategory, SharedBus};
pub use crate::game_loop::Game;
pub use crate::input::{Direction, PlayerCommand};
pub use crate::turn_system::{TurnSink, TurnState, TurnType, next_state, next_state_from_repr};
pub use error::{GameError, Result};
