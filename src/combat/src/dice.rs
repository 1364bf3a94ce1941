//! 骰子抽象
//!
//! 战斗系统只通过 [`DiceRoller`] 取随机数，生产环境使用 [`RngDice`]，
//! 测试可以用 [`ScriptedDice`] 强制指定点数。

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 随机数来源
pub trait DiceRoller {
    /// 掷一个 `sides` 面骰，结果在 `1..=sides`
    fn roll_die(&mut self, sides: i32) -> i32;

    /// 闭区间 `[low, high]` 内的均匀整数
    fn random_between(&mut self, low: i32, high: i32) -> i32;
}

/// 在多个系统之间共享的骰子
pub type SharedDice = Arc<Mutex<dyn DiceRoller + Send>>;

/// 基于 `rand` 的骰子实现
#[derive(Debug, Clone)]
pub struct RngDice<R: Rng> {
    rng: R,
}

impl<R: Rng> RngDice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngDice<Pcg32> {
    /// 固定种子，便于复现一局
    pub fn seeded(seed: u64) -> Self {
        Self::new(Pcg32::seed_from_u64(seed))
    }

    /// 使用系统熵初始化
    pub fn from_entropy() -> Self {
        Self::new(Pcg32::from_rng(&mut rand::rng()))
    }
}

impl<R: Rng> DiceRoller for RngDice<R> {
    fn roll_die(&mut self, sides: i32) -> i32 {
        if sides <= 1 {
            return 1;
        }
        self.rng.random_range(1..=sides)
    }

    fn random_between(&mut self, low: i32, high: i32) -> i32 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low..=high)
    }
}

/// 按脚本返回点数的骰子
///
/// 两类掷骰各自排队。队列耗尽后骰子返回 1，区间返回下界。
/// 区间点数会被夹到 `[low, high]` 之内。
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    die_rolls: VecDeque<i32>,
    between_rolls: VecDeque<i32>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_die_rolls(mut self, rolls: impl IntoIterator<Item = i32>) -> Self {
        self.die_rolls.extend(rolls);
        self
    }

    pub fn with_between_rolls(mut self, rolls: impl IntoIterator<Item = i32>) -> Self {
        self.between_rolls.extend(rolls);
        self
    }

    pub fn push_die_roll(&mut self, roll: i32) {
        self.die_rolls.push_back(roll);
    }

    pub fn push_between_roll(&mut self, roll: i32) {
        self.between_rolls.push_back(roll);
    }

    /// 剩余未消费的点数
    pub fn remaining(&self) -> usize {
        self.die_rolls.len() + self.between_rolls.len()
    }
}

impl DiceRoller for ScriptedDice {
    fn roll_die(&mut self, sides: i32) -> i32 {
        self.die_rolls
            .pop_front()
            .map(|roll| roll.clamp(1, sides.max(1)))
            .unwrap_or(1)
    }

    fn random_between(&mut self, low: i32, high: i32) -> i32 {
        let high = high.max(low);
        self.between_rolls
            .pop_front()
            .map(|roll| roll.clamp(low, high))
            .unwrap_or(low)
    }
}
