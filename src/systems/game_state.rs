//! 回合/游戏状态系统
//!
//! 状态只能通过事件修改：setter 发布事件，处理器负责真正写入。
//! 唯一的例外是 `trigger_game_over`，它先直接进入 `GameOver`，
//! 再把结果广播出去。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use error::Result;
use hecs::Entity;
use tracing::{debug, info};

use super::System;
use crate::ecs::{SharedWorld, UserMessage, lock_world};
use crate::event_bus::{EventKind, GameEvent, MessageCategory, SharedBus};
use crate::turn_system::{TurnSink, TurnState, TurnType};

#[derive(Debug, Clone, Copy, Default)]
struct TurnTracking {
    state: TurnState,
    counter: u32,
    acting: Option<TurnType>,
}

pub struct GameStateSystem {
    world: SharedWorld,
    bus: SharedBus,
    tracking: Mutex<TurnTracking>,
    sink: Mutex<Option<Arc<dyn TurnSink>>>,
}

impl GameStateSystem {
    pub fn new(world: SharedWorld, bus: SharedBus) -> Self {
        Self {
            world,
            bus,
            tracking: Mutex::new(TurnTracking::default()),
            sink: Mutex::new(None),
        }
    }

    fn tracking(&self) -> MutexGuard<'_, TurnTracking> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sink(&self) -> Option<Arc<dyn TurnSink>> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 绑定外部的状态镜像
    pub fn bind_sink(&self, sink: Arc<dyn TurnSink>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn state(&self) -> TurnState {
        self.tracking().state
    }

    pub fn counter(&self) -> u32 {
        self.tracking().counter
    }

    pub fn acting(&self) -> Option<TurnType> {
        self.tracking().acting
    }

    pub fn is_game_over(&self) -> bool {
        self.state() == TurnState::GameOver
    }

    // ========== Setters（发布事件） ==========

    /// 游戏结束后不再发布
    pub fn set_state(&self, state: TurnState) -> Result<()> {
        let (from, counter) = {
            let t = self.tracking();
            (t.state, t.counter)
        };
        if from == TurnState::GameOver {
            debug!(to = %state, "state change after game over ignored");
            return Ok(());
        }
        self.bus.publish(&GameEvent::TurnChange {
            from_state: from.to_string(),
            to_state: state.to_string(),
            counter,
        })
    }

    pub fn set_counter(&self, count: u32) -> Result<()> {
        self.bus.publish(&GameEvent::TurnCounter {
            count,
            increment: false,
        })
    }

    pub fn increment_counter(&self) -> Result<()> {
        if self.is_game_over() {
            return Ok(());
        }
        let count = self.counter().saturating_add(1);
        self.bus.publish(&GameEvent::TurnCounter {
            count,
            increment: true,
        })
    }

    /// 直接进入 `GameOver`，然后发布 `GameOver` 和 `TurnChange`
    pub fn trigger_game_over(&self, reason: &str) -> Result<()> {
        let (from, counter) = {
            let mut t = self.tracking();
            if t.state == TurnState::GameOver {
                debug!(reason, "game already over");
                return Ok(());
            }
            let from = t.state;
            t.state = TurnState::GameOver;
            (from, t.counter)
        };
        if let Some(sink) = self.sink() {
            sink.set_state(TurnState::GameOver);
        }
        info!(reason, final_turn = counter, "game over");

        self.bus.publish_many([
            GameEvent::GameOver {
                reason: reason.to_string(),
                final_turn: counter,
            },
            GameEvent::TurnChange {
                from_state: from.to_string(),
                to_state: TurnState::GameOver.to_string(),
                counter,
            },
        ])
    }

    // ========== 事件处理 ==========

    fn handle_player_death(&self, entity: Entity) -> Result<()> {
        let text = "Game Over!\n".to_string();
        {
            let world = lock_world(&self.world);
            if world.contains(entity) {
                world.get_mut::<UserMessage>(entity)?.game_state_message = text.clone();
            }
        }
        self.bus.publish(&GameEvent::Message {
            text,
            category: MessageCategory::GameState,
        })?;
        self.trigger_game_over("player_death")
    }

    fn handle_turn_change(&self, to_state: &str) {
        let state = TurnState::parse_or_waiting(to_state);
        {
            let mut t = self.tracking();
            // GameOver 是终态
            if t.state == TurnState::GameOver {
                return;
            }
            if t.state != state {
                debug!(from = %t.state, to = %state, "turn state changed");
            }
            t.state = state;
        }
        if let Some(sink) = self.sink() {
            sink.set_state(state);
        }
    }

    fn handle_turn_counter(&self, count: u32) {
        self.tracking().counter = count;
        if let Some(sink) = self.sink() {
            sink.set_counter(count);
        }
    }
}

impl System for GameStateSystem {
    fn name(&self) -> &str {
        "GameStateSystem"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[
            EventKind::Death,
            EventKind::TurnChange,
            EventKind::TurnCounter,
            EventKind::TurnStart,
        ]
    }

    fn handle_event(&self, event: &GameEvent) -> Result<()> {
        match event {
            GameEvent::Death {
                entity,
                is_player: true,
                ..
            } => self.handle_player_death(*entity),
            GameEvent::TurnChange { to_state, .. } => {
                self.handle_turn_change(to_state);
                Ok(())
            }
            GameEvent::TurnCounter { count, .. } => {
                self.handle_turn_counter(*count);
                Ok(())
            }
            GameEvent::TurnStart { turn_type, .. } => {
                self.tracking().acting = Some(*turn_type);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Position, World};
    use crate::event_bus::EventBus;
    use crate::systems::register_system;

    #[derive(Default)]
    struct RecordingSink {
        states: Mutex<Vec<TurnState>>,
        counter: Mutex<u32>,
    }

    impl TurnSink for RecordingSink {
        fn set_state(&self, state: TurnState) {
            self.states.lock().unwrap().push(state);
        }

        fn set_counter(&self, counter: u32) {
            *self.counter.lock().unwrap() = counter;
        }
    }

    fn setup() -> (SharedWorld, SharedBus, Arc<GameStateSystem>) {
        let world = World::new().into_shared();
        let bus = EventBus::shared();
        let system = Arc::new(GameStateSystem::new(world.clone(), bus.clone()));
        register_system(&bus, &system);
        (world, bus, system)
    }

    #[test]
    fn test_setters_go_through_events() {
        let (_world, bus, system) = setup();
        let seen = Arc::new(Mutex::new(0));
        let s = seen.clone();
        bus.subscribe_fn(EventKind::TurnChange, "observer", move |_| {
            *s.lock().unwrap() += 1;
            Ok(())
        });

        system.set_state(TurnState::ProcessingMonsterTurn).unwrap();
        assert_eq!(system.state(), TurnState::ProcessingMonsterTurn);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_setter_without_handler_does_not_write() {
        let bus = EventBus::shared();
        let system = GameStateSystem::new(World::new().into_shared(), bus);
        system.set_state(TurnState::ProcessingMonsterTurn).unwrap();
        assert_eq!(system.state(), TurnState::WaitingForPlayerInput);
    }

    #[test]
    fn test_counter_is_absolute_and_mirrored() {
        let (_world, bus, system) = setup();
        let sink = Arc::new(RecordingSink::default());
        system.bind_sink(sink.clone());

        system.increment_counter().unwrap();
        system.increment_counter().unwrap();
        assert_eq!(system.counter(), 2);

        bus.publish(&GameEvent::TurnCounter {
            count: 7,
            increment: false,
        })
        .unwrap();
        assert_eq!(system.counter(), 7);
        assert_eq!(*sink.counter.lock().unwrap(), 7);

        system.set_counter(0).unwrap();
        assert_eq!(system.counter(), 0);
    }

    #[test]
    fn test_unknown_state_name_defaults_to_waiting() {
        let (_world, bus, system) = setup();
        system.set_state(TurnState::ProcessingMonsterTurn).unwrap();
        bus.publish(&GameEvent::TurnChange {
            from_state: "ProcessingMonsterTurn".to_string(),
            to_state: "Dancing".to_string(),
            counter: 0,
        })
        .unwrap();
        assert_eq!(system.state(), TurnState::WaitingForPlayerInput);
    }

    #[test]
    fn test_player_death_triggers_game_over() {
        let (world, bus, system) = setup();
        let sink = Arc::new(RecordingSink::default());
        system.bind_sink(sink.clone());
        let player = lock_world(&world).spawn_player("Player", Position::new(1, 1));

        let game_overs = Arc::new(Mutex::new(Vec::new()));
        let g = game_overs.clone();
        bus.subscribe_fn(EventKind::GameOver, "observer", move |event| {
            g.lock().unwrap().push(event.clone());
            Ok(())
        });

        bus.publish(&GameEvent::Death {
            entity: player,
            position: Position::new(1, 1),
            is_player: true,
        })
        .unwrap();

        assert!(system.is_game_over());
        assert_eq!(
            *game_overs.lock().unwrap(),
            vec![GameEvent::GameOver {
                reason: "player_death".to_string(),
                final_turn: 0,
            }]
        );
        assert_eq!(
            lock_world(&world)
                .get::<UserMessage>(player)
                .unwrap()
                .game_state_message,
            "Game Over!\n"
        );
        assert_eq!(sink.states.lock().unwrap().last(), Some(&TurnState::GameOver));
    }

    #[test]
    fn test_monster_death_does_not_end_game() {
        let (world, bus, system) = setup();
        let orc = lock_world(&world).spawn_monster(crate::ecs::MonsterKind::Orc, Position::new(1, 1));
        bus.publish(&GameEvent::Death {
            entity: orc,
            position: Position::new(1, 1),
            is_player: false,
        })
        .unwrap();
        assert!(!system.is_game_over());
    }

    #[test]
    fn test_turn_start_records_acting_side() {
        let (_world, bus, system) = setup();
        assert_eq!(system.acting(), None);
        bus.publish(&GameEvent::TurnStart {
            turn_type: TurnType::Monster,
            counter: 1,
        })
        .unwrap();
        assert_eq!(system.acting(), Some(TurnType::Monster));
    }

    #[test]
    fn test_game_over_is_idempotent() {
        let (_world, bus, system) = setup();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        bus.subscribe_fn(EventKind::GameOver, "counter", move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        });
        system.trigger_game_over("test").unwrap();
        system.trigger_game_over("test").unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(system.state(), TurnState::GameOver);
    }

    #[test]
    fn test_game_over_is_terminal() {
        let (_world, bus, system) = setup();
        system.trigger_game_over("test").unwrap();
        let counter = system.counter();

        system.set_state(TurnState::WaitingForPlayerInput).unwrap();
        assert_eq!(system.state(), TurnState::GameOver);

        bus.publish(&GameEvent::TurnChange {
            from_state: "GameOver".to_string(),
            to_state: "Dancing".to_string(),
            counter,
        })
        .unwrap();
        assert_eq!(system.state(), TurnState::GameOver);

        system.increment_counter().unwrap();
        assert_eq!(system.counter(), counter);
    }
}
