//! Player commands and the auto-move state.
//!
//! Raw key polling lives outside the core; callers translate whatever input
//! they have into a [`PlayerCommand`] and hand it to `Game::update`.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// 四个正方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// One tick's worth of player intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// 单步移动，撞到怪物时攻击
    Move(Direction),
    /// 开始沿一个方向自动移动
    AutoMove(Direction),
    /// 原地等待一回合
    Wait,
}

/// Tracks an in-progress auto-move.
#[derive(Debug, Clone)]
pub struct AutoMoveState {
    direction: Option<Direction>,
    last_move: Option<Instant>,
    cooldown: Duration,
}

impl AutoMoveState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            direction: None,
            last_move: None,
            cooldown,
        }
    }

    pub fn is_active(&self) -> bool {
        self.direction.is_some()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn start(&mut self, direction: Direction, now: Instant) {
        self.direction = Some(direction);
        self.last_move = Some(now);
    }

    pub fn stop(&mut self) {
        if self.direction.take().is_some() {
            tracing::debug!("auto-move stopped");
        }
        self.last_move = None;
    }

    /// 距离上一步是否已经超过冷却时间
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_move {
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
            None => true,
        }
    }

    pub fn record_step(&mut self, now: Instant) {
        self.last_move = Some(now);
    }
}
