//! 战斗系统：把 `combat` 规则应用到世界上
//!
//! 攻击分两步：`Attack` 决定是否命中，`Damage` 扣血并检查死亡。
//! 其他来源的伤害可以直接发布 `Damage`，不经过命中判定。

use std::sync::{MutexGuard, PoisonError};

use combat::{Combat, DiceRoller, SharedDice};
use error::Result;
use hecs::Entity;
use tracing::{debug, info};

use super::System;
use crate::ecs::{Armor, Health, MeleeWeapon, Name, Position, SharedWorld, UserMessage, lock_world};
use crate::event_bus::{EventKind, GameEvent, MessageCategory, SharedBus};

pub struct CombatSystem {
    world: SharedWorld,
    bus: SharedBus,
    dice: SharedDice,
    player_label: String,
}

impl CombatSystem {
    pub fn new(world: SharedWorld, bus: SharedBus, dice: SharedDice, player_label: impl Into<String>) -> Self {
        Self {
            world,
            bus,
            dice,
            player_label: player_label.into(),
        }
    }

    fn dice(&self) -> MutexGuard<'_, dyn DiceRoller + Send + 'static> {
        self.dice.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 按坐标解析攻守双方并做命中判定
    ///
    /// 任意一方找不到或攻击者已经死亡时静默返回。
    pub fn process_attack(&self, attacker_pos: Position, defender_pos: Position) -> Result<()> {
        let event = {
            let world = lock_world(&self.world);
            let Some(attacker) = world.combatant_at(attacker_pos) else {
                debug!(?attacker_pos, "no attacker at position");
                return Ok(());
            };
            let Some(defender) = world.combatant_at(defender_pos) else {
                debug!(?defender_pos, "no defender at position");
                return Ok(());
            };

            if world.get::<Health>(attacker)?.is_dead() {
                return Ok(());
            }

            let to_hit_bonus = world.get::<MeleeWeapon>(attacker)?.to_hit_bonus;
            let armor_class = world.get::<Armor>(defender)?.armor_class;
            let roll = Combat::roll_to_hit(&mut *self.dice(), to_hit_bonus, armor_class);

            GameEvent::Attack {
                attacker,
                defender,
                attacker_pos,
                defender_pos,
                to_hit_roll: roll.roll,
                hit: roll.hit,
            }
        };

        self.bus.publish(&event)
    }

    /// 命中时掷伤害并发布 `Damage`，未命中只写叙述
    pub fn handle_attack(&self, attacker: Entity, defender: Entity, hit: bool) -> Result<()> {
        let follow_up = {
            let world = lock_world(&self.world);
            if !world.contains(attacker) || !world.contains(defender) {
                debug!(?attacker, ?defender, "attack between stale entities ignored");
                return Ok(());
            }
            if world.get::<Health>(attacker)?.is_dead() {
                return Ok(());
            }

            let weapon = world.get::<MeleeWeapon>(attacker)?.clone();
            let armor = world.get::<Armor>(defender)?.clone();
            let attacker_name = world.get::<Name>(attacker)?.label.clone();
            let defender_name = world.get::<Name>(defender)?.label.clone();

            if hit {
                let damage = Combat::roll_damage(
                    &mut *self.dice(),
                    weapon.minimum_damage,
                    weapon.maximum_damage,
                    armor.defense,
                );
                let text = format!(
                    "{} swings {} at {} and hits for {} health.\n",
                    attacker_name, weapon.name, defender_name, damage.applied
                );
                world.get_mut::<UserMessage>(attacker)?.attack_message = text.clone();

                let current = world.get::<Health>(defender)?.current_health;
                vec![
                    GameEvent::Message {
                        text,
                        category: MessageCategory::Attack,
                    },
                    GameEvent::Damage {
                        target: defender,
                        amount: damage.applied,
                        source: Some(attacker),
                        is_fatal: Combat::is_fatal(current, damage.applied),
                    },
                ]
            } else {
                let text = format!(
                    "{} swings {} at {} and misses.\n",
                    attacker_name, weapon.name, defender_name
                );
                world.get_mut::<UserMessage>(attacker)?.attack_message = text.clone();
                vec![GameEvent::Message {
                    text,
                    category: MessageCategory::Attack,
                }]
            }
        };

        self.bus.publish_many(follow_up)
    }

    /// 扣血，死亡时写叙述并发布 `Death`；非玩家目标会被移出世界
    pub fn handle_damage(&self, target: Entity, amount: i32) -> Result<()> {
        let follow_up = {
            let mut world = lock_world(&self.world);
            if !world.contains(target) {
                debug!(?target, "damage to unknown entity ignored");
                return Ok(());
            }

            let dead = {
                let mut health = world.get_mut::<Health>(target)?;
                health.current_health -= amount;
                health.is_dead()
            };
            if !dead {
                return Ok(());
            }

            let name = world.get::<Name>(target)?.label.clone();
            let text = format!("{} has died!\n", name);
            world.get_mut::<UserMessage>(target)?.dead_message = text.clone();

            // 先取坐标再销毁
            let position = world.position(target)?;
            let is_player = name == self.player_label;
            if !is_player {
                world.dispose_entity(target);
            }
            info!(entity = %name, x = position.x, y = position.y, is_player, "entity died");

            [
                GameEvent::Message {
                    text,
                    category: MessageCategory::Death,
                },
                GameEvent::Death {
                    entity: target,
                    position,
                    is_player,
                },
            ]
        };

        self.bus.publish_many(follow_up)
    }
}

impl System for CombatSystem {
    fn name(&self) -> &str {
        "CombatSystem"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Attack, EventKind::Damage]
    }

    fn handle_event(&self, event: &GameEvent) -> Result<()> {
        match event {
            GameEvent::Attack {
                attacker,
                defender,
                hit,
                ..
            } => self.handle_attack(*attacker, *defender, *hit),
            GameEvent::Damage { target, amount, .. } => self.handle_damage(*target, *amount),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{MonsterKind, World};
    use crate::event_bus::EventBus;
    use crate::systems::register_system;
    use combat::ScriptedDice;
    use std::sync::{Arc, Mutex};

    struct Fixture {
        world: SharedWorld,
        bus: SharedBus,
        combat: Arc<CombatSystem>,
        events: Arc<Mutex<Vec<GameEvent>>>,
    }

    fn fixture(dice: ScriptedDice) -> Fixture {
        let world = World::new().into_shared();
        let bus = EventBus::shared();
        let dice: SharedDice = Arc::new(Mutex::new(dice));
        let combat = Arc::new(CombatSystem::new(world.clone(), bus.clone(), dice, "Player"));
        register_system(&bus, &combat);

        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Attack, EventKind::Damage, EventKind::Death, EventKind::Message] {
            let sink = events.clone();
            bus.subscribe_fn(kind, "recorder", move |event| {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            });
        }
        Fixture {
            world,
            bus,
            combat,
            events,
        }
    }

    #[test]
    fn test_miss_writes_narration_only() {
        let fx = fixture(ScriptedDice::new().with_die_rolls([1]));
        let (orc, player) = {
            let mut world = lock_world(&fx.world);
            (
                world.spawn_monster(MonsterKind::Orc, Position::new(2, 1)),
                world.spawn_player("Player", Position::new(1, 1)),
            )
        };

        // 1 + 1 不大于 18
        fx.combat
            .process_attack(Position::new(2, 1), Position::new(1, 1))
            .unwrap();

        // 嵌套的叙述消息先于触发它的 Attack 被记录
        let events = fx.events.lock().unwrap();
        let attack = events
            .iter()
            .find(|e| e.kind() == EventKind::Attack)
            .unwrap();
        assert!(matches!(attack, GameEvent::Attack { hit: false, to_hit_roll: 1, .. }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::Damage { .. })));

        let world = lock_world(&fx.world);
        assert_eq!(
            world.get::<UserMessage>(orc).unwrap().attack_message,
            "Orc swings Machete at Player and misses.\n"
        );
        assert_eq!(world.get::<Health>(player).unwrap().current_health, 30);
    }

    #[test]
    fn test_unresolved_positions_are_silent() {
        let fx = fixture(ScriptedDice::new());
        lock_world(&fx.world).spawn_player("Player", Position::new(1, 1));

        fx.combat
            .process_attack(Position::new(1, 1), Position::new(5, 5))
            .unwrap();
        fx.combat
            .process_attack(Position::new(7, 7), Position::new(1, 1))
            .unwrap();
        assert!(fx.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dead_attacker_cannot_act() {
        let fx = fixture(ScriptedDice::new().with_die_rolls([10]));
        {
            let mut world = lock_world(&fx.world);
            let skeleton = world.spawn_monster(MonsterKind::Skeleton, Position::new(2, 1));
            world.spawn_player("Player", Position::new(1, 1));
            world.get_mut::<Health>(skeleton).unwrap().current_health = 0;
        }

        fx.combat
            .process_attack(Position::new(2, 1), Position::new(1, 1))
            .unwrap();
        assert!(fx.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_external_damage_kills_monster() {
        let fx = fixture(ScriptedDice::new());
        let orc = lock_world(&fx.world).spawn_monster(MonsterKind::Orc, Position::new(3, 3));

        fx.bus
            .publish(&GameEvent::Damage {
                target: orc,
                amount: 45,
                source: None,
                is_fatal: true,
            })
            .unwrap();

        let events = fx.events.lock().unwrap();
        assert!(events.contains(&GameEvent::Death {
            entity: orc,
            position: Position::new(3, 3),
            is_player: false,
        }));
        assert!(events.contains(&GameEvent::Message {
            text: "Orc has died!\n".to_string(),
            category: MessageCategory::Death,
        }));
        assert!(!lock_world(&fx.world).contains(orc));
    }

    #[test]
    fn test_player_death_keeps_entity() {
        let fx = fixture(ScriptedDice::new());
        let player = lock_world(&fx.world).spawn_player("Player", Position::new(1, 1));

        fx.combat.handle_damage(player, 30).unwrap();

        let world = lock_world(&fx.world);
        assert!(world.contains(player));
        assert_eq!(world.get::<Health>(player).unwrap().current_health, 0);
        assert_eq!(world.get::<UserMessage>(player).unwrap().dead_message, "Player has died!\n");
        drop(world);

        let events = fx.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, GameEvent::Death { is_player: true, .. })));
    }

    #[test]
    fn test_damage_to_disposed_entity_is_ignored() {
        let fx = fixture(ScriptedDice::new());
        let orc = lock_world(&fx.world).spawn_monster(MonsterKind::Orc, Position::new(3, 3));
        lock_world(&fx.world).dispose_entity(orc);

        fx.combat.handle_damage(orc, 5).unwrap();
        assert!(fx.events.lock().unwrap().is_empty());
    }
}
