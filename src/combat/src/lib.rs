// src/combat/src/lib.rs
//! 纯战斗规则：命中判定与伤害结算
//!
//! 这里不认识实体、组件或事件，只负责把骰子和数值变成结果，
//! 由上层的 `CombatSystem` 把结果写回世界并发布事件。

pub mod dice;

pub use crate::dice::{DiceRoller, RngDice, ScriptedDice, SharedDice};

/// Handles the numeric side of melee combat
pub struct Combat;

/// Combat configuration constants
pub mod constants {
    /// 命中骰面数（d10）
    pub const TO_HIT_DIE: i32 = 10;
    /// 伤害下限，减伤之后不会低于这个值（不会变成治疗）
    pub const DAMAGE_FLOOR: i32 = 0;
}

/// 一次命中判定的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToHitRoll {
    /// 骰面点数，不含加值
    pub roll: i32,
    pub hit: bool,
}

/// 一次伤害结算的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRoll {
    /// 武器伤害骰
    pub roll: i32,
    /// 扣除防御后的实际伤害
    pub applied: i32,
}

impl Combat {
    /// 掷 d10 + 命中加值，严格大于护甲等级才算命中
    pub fn roll_to_hit(dice: &mut dyn DiceRoller, to_hit_bonus: i32, armor_class: i32) -> ToHitRoll {
        let roll = dice.roll_die(constants::TO_HIT_DIE);
        ToHitRoll {
            roll,
            hit: Self::is_hit(roll, to_hit_bonus, armor_class),
        }
    }

    pub fn is_hit(roll: i32, to_hit_bonus: i32, armor_class: i32) -> bool {
        roll + to_hit_bonus > armor_class
    }

    /// 在 `[minimum, maximum]` 内掷伤害，再扣除防御
    pub fn roll_damage(
        dice: &mut dyn DiceRoller,
        minimum_damage: i32,
        maximum_damage: i32,
        defense: i32,
    ) -> DamageRoll {
        let roll = dice.random_between(minimum_damage, maximum_damage);
        DamageRoll {
            roll,
            applied: Self::mitigate(roll, defense),
        }
    }

    /// 固定减伤，结果不低于 0
    pub fn mitigate(damage_roll: i32, defense: i32) -> i32 {
        (damage_roll - defense).max(constants::DAMAGE_FLOOR)
    }

    /// 给定武器区间和防御时实际伤害的可能范围
    pub fn damage_bounds(minimum_damage: i32, maximum_damage: i32, defense: i32) -> (i32, i32) {
        (
            Self::mitigate(minimum_damage, defense),
            Self::mitigate(maximum_damage, defense),
        )
    }

    /// 扣血后是否死亡（生命值可以变成负数）
    pub fn is_fatal(current_health: i32, damage: i32) -> bool {
        current_health - damage <= 0
    }
}
