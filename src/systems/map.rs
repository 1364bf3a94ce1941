//! 地图系统：让格子的占用状态跟着实体走
//!
//! `TileBlocked` / `TileUnblocked` 只是通知，本系统不订阅它们。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dungeon::Level;
use error::Result;

use super::System;
use crate::ecs::Position;
use crate::event_bus::{EventKind, GameEvent, SharedBus};

pub type SharedLevel = Arc<Mutex<Level>>;

pub fn lock_level(level: &SharedLevel) -> MutexGuard<'_, Level> {
    level.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MapSystem {
    level: SharedLevel,
    bus: SharedBus,
}

impl MapSystem {
    pub fn new(level: SharedLevel, bus: SharedBus) -> Self {
        Self { level, bus }
    }

    pub fn handle_death(&self, position: Position, is_player: bool) -> Result<()> {
        if is_player {
            return Ok(());
        }
        lock_level(&self.level).unblock_tile(position.x, position.y);
        self.bus.publish(&GameEvent::TileUnblocked {
            position,
            reason: "monster_death".to_string(),
        })
    }

    pub fn handle_move(&self, from: Position, to: Position) -> Result<()> {
        {
            let mut level = lock_level(&self.level);
            level.unblock_tile(from.x, from.y);
            level.block_tile(to.x, to.y);
        }
        self.bus.publish_many([
            GameEvent::TileUnblocked {
                position: from,
                reason: "entity_move".to_string(),
            },
            GameEvent::TileBlocked {
                position: to,
                reason: "entity_move".to_string(),
            },
        ])
    }
}

impl System for MapSystem {
    fn name(&self) -> &str {
        "MapSystem"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Death, EventKind::Move]
    }

    fn handle_event(&self, event: &GameEvent) -> Result<()> {
        match event {
            GameEvent::Death {
                position,
                is_player,
                ..
            } => self.handle_death(*position, *is_player),
            GameEvent::Move { from, to, .. } => self.handle_move(*from, *to),
            _ => Ok(()),
        }
    }
}
