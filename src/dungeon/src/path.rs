//! 寻路
//!
//! 默认的 [`AStar`] 只在四个正方向上移动，只看地形不看占用，
//! 所以路径可能穿过其他实体，由调用方决定怎么处理被挡住的下一步。
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::{GridMap, manhattan_distance};

const CARDINALS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// 寻路算法
pub trait Pathfinder {
    /// 返回从 `start` 到 `goal` 的路径（两端都包含），无路可走时返回空
    fn find_path(&self, map: &dyn GridMap, start: (i32, i32), goal: (i32, i32)) -> Vec<(i32, i32)>;
}

/// 四方向 A*，启发函数为曼哈顿距离
#[derive(Debug, Clone, Copy, Default)]
pub struct AStar;

impl Pathfinder for AStar {
    fn find_path(&self, map: &dyn GridMap, start: (i32, i32), goal: (i32, i32)) -> Vec<(i32, i32)> {
        if !map.in_bounds(start.0, start.1) || !map.in_bounds(goal.0, goal.1) {
            return Vec::new();
        }
        if !map.is_walkable(goal.0, goal.1) {
            return Vec::new();
        }
        if start == goal {
            return vec![start];
        }

        // (f, h, 插入序号) 作为排序键，保证结果稳定
        let mut open = BinaryHeap::new();
        let mut came_from: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
        let mut g_score: HashMap<(i32, i32), i32> = HashMap::new();
        let mut sequence: u64 = 0;

        g_score.insert(start, 0);
        let h = manhattan_distance(start, goal);
        open.push(Reverse((h, h, sequence, start)));

        while let Some(Reverse((_, _, _, current))) = open.pop() {
            if current == goal {
                return reconstruct(&came_from, current);
            }

            let current_g = g_score.get(&current).copied().unwrap_or(i32::MAX);
            for (dx, dy) in CARDINALS {
                let next = (current.0 + dx, current.1 + dy);
                if !map.in_bounds(next.0, next.1) || !map.is_walkable(next.0, next.1) {
                    continue;
                }

                let tentative = current_g + 1;
                if tentative < g_score.get(&next).copied().unwrap_or(i32::MAX) {
                    came_from.insert(next, current);
                    g_score.insert(next, tentative);
                    let h = manhattan_distance(next, goal);
                    sequence += 1;
                    open.push(Reverse((tentative + h, h, sequence, next)));
                }
            }
        }

        Vec::new()
    }
}

fn reconstruct(came_from: &HashMap<(i32, i32), (i32, i32)>, goal: (i32, i32)) -> Vec<(i32, i32)> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
