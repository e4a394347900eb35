//! 滚动窗口统计
//!
//! 固定容量 FIFO：超出容量时恰好淘汰最旧的样本。
//! 均值通过累加和维护，最小/最大值通过单调队列维护，单次更新均摊 O(1)。

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 默认窗口容量
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// 滚动统计结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    /// 平均距离（毫米）
    pub mean_distance_mm: f64,
    /// 最小距离（毫米）
    pub min_distance_mm: u32,
    /// 最大距离（毫米）
    pub max_distance_mm: u32,
    /// 平均信号质量
    pub mean_quality: f64,
    /// 窗口内样本数
    pub count: usize,
}

impl RollingStats {
    pub const EMPTY: RollingStats = RollingStats {
        mean_distance_mm: 0.0,
        min_distance_mm: 0,
        max_distance_mm: 0,
        mean_quality: 0.0,
        count: 0,
    };
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    seq: u64,
    distance_mm: u32,
    quality: u8,
}

/// 滚动窗口
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    entries: VecDeque<Entry>,
    /// 单调递增（队首为最小值）
    min_queue: VecDeque<Entry>,
    /// 单调递减（队首为最大值）
    max_queue: VecDeque<Entry>,
    sum_distance: u64,
    sum_quality: u64,
    next_seq: u64,
}

impl RollingWindow {
    /// 创建窗口；容量为 0 时按 1 处理
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            min_queue: VecDeque::new(),
            max_queue: VecDeque::new(),
            sum_distance: 0,
            sum_quality: 0,
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 加入一个样本，返回更新后的统计
    pub fn push(&mut self, distance_mm: u32, quality: u8) -> RollingStats {
        if self.entries.len() == self.capacity {
            self.evict_oldest();
        }

        let entry = Entry {
            seq: self.next_seq,
            distance_mm,
            quality,
        };
        self.next_seq += 1;

        self.sum_distance += u64::from(distance_mm);
        self.sum_quality += u64::from(quality);
        self.entries.push_back(entry);

        while self
            .min_queue
            .back()
            .is_some_and(|e| e.distance_mm >= distance_mm)
        {
            self.min_queue.pop_back();
        }
        self.min_queue.push_back(entry);

        while self
            .max_queue
            .back()
            .is_some_and(|e| e.distance_mm <= distance_mm)
        {
            self.max_queue.pop_back();
        }
        self.max_queue.push_back(entry);

        self.stats()
    }

    fn evict_oldest(&mut self) {
        let Some(old) = self.entries.pop_front() else {
            return;
        };
        self.sum_distance -= u64::from(old.distance_mm);
        self.sum_quality -= u64::from(old.quality);
        if self.min_queue.front().is_some_and(|e| e.seq == old.seq) {
            self.min_queue.pop_front();
        }
        if self.max_queue.front().is_some_and(|e| e.seq == old.seq) {
            self.max_queue.pop_front();
        }
    }

    /// 当前统计
    pub fn stats(&self) -> RollingStats {
        let count = self.entries.len();
        if count == 0 {
            return RollingStats::EMPTY;
        }
        RollingStats {
            mean_distance_mm: self.sum_distance as f64 / count as f64,
            min_distance_mm: self.min_queue.front().map_or(0, |e| e.distance_mm),
            max_distance_mm: self.max_queue.front().map_or(0, |e| e.distance_mm),
            mean_quality: self.sum_quality as f64 / count as f64,
            count,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.min_queue.clear();
        self.max_queue.clear();
        self.sum_distance = 0;
        self.sum_quality = 0;
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_window_of_two() {
        let mut window = RollingWindow::new(2);
        window.push(10, 50);
        window.push(20, 50);
        let stats = window.push(30, 50);
        assert_eq!(stats.mean_distance_mm, 25.0);
        assert_eq!(stats.count, 2);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut window = RollingWindow::new(5);
        for i in 0..100 {
            let stats = window.push(i, 10);
            assert!(stats.count <= 5);
        }
        assert_eq!(window.len(), 5);
    }

    #[test]
    fn test_min_max_follow_eviction() {
        let mut window = RollingWindow::new(3);
        window.push(5, 0);
        window.push(1, 0);
        window.push(9, 0);
        let stats = window.stats();
        assert_eq!((stats.min_distance_mm, stats.max_distance_mm), (1, 9));

        // 淘汰 5
        let stats = window.push(3, 0);
        assert_eq!((stats.min_distance_mm, stats.max_distance_mm), (1, 9));
        // 淘汰 1
        let stats = window.push(4, 0);
        assert_eq!((stats.min_distance_mm, stats.max_distance_mm), (3, 9));
        // 淘汰 9
        let stats = window.push(2, 0);
        assert_eq!((stats.min_distance_mm, stats.max_distance_mm), (2, 4));
    }

    #[test]
    fn test_mean_quality() {
        let mut window = RollingWindow::new(4);
        window.push(100, 80);
        let stats = window.push(100, 40);
        assert_eq!(stats.mean_quality, 60.0);
    }

    #[test]
    fn test_matches_brute_force() {
        let data = [7u32, 3, 3, 10, 1, 8, 8, 2, 6, 4, 9, 0, 5];
        let cap = 4;
        let mut window = RollingWindow::new(cap);
        for (i, d) in data.iter().enumerate() {
            let stats = window.push(*d, 0);
            let start = (i + 1).saturating_sub(cap);
            let slice = &data[start..=i];
            assert_eq!(stats.min_distance_mm, *slice.iter().min().unwrap());
            assert_eq!(stats.max_distance_mm, *slice.iter().max().unwrap());
            let mean = slice.iter().map(|v| f64::from(*v)).sum::<f64>() / slice.len() as f64;
            assert!((stats.mean_distance_mm - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn test_clear() {
        let mut window = RollingWindow::new(3);
        window.push(1, 1);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.stats(), RollingStats::EMPTY);
    }
}
