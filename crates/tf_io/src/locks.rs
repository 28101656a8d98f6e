// crates/tf_io/src/locks.rs

//! 墙体锁
//!
//! 同一墙体同一时刻只允许一个融合任务；不同墙体互不阻塞。
//! 锁以守卫形式返回，守卫 drop 时释放并唤醒等待者。
//!
//! 锁表挂在 [`MasterStore`](crate::MasterStore) 上，随版本库的克隆共享。
//! 它只在本进程内生效：分别打开的两个版本库、或另一个进程，
//! 由发布时的基准版本检查兜底（见 `MasterStore::publish_over`）。

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tf_foundation::error::{TfError, TfResult};
use tracing::debug;

#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// 按墙体编号的互斥锁集合
#[derive(Debug, Clone, Default)]
pub struct WallLocks {
    table: Arc<LockTable>,
}

impl WallLocks {
    /// 创建空锁集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 阻塞直到获得墙体锁
    pub fn lock(&self, wall: &str) -> WallGuard {
        let mut held = self.table.held.lock();
        while held.contains(wall) {
            self.table.released.wait(&mut held);
        }
        held.insert(wall.to_string());
        debug!(wall = %wall, "获得墙体锁");
        self.guard(wall)
    }

    /// 尝试获得墙体锁，已被占用时返回 `None`
    pub fn try_lock(&self, wall: &str) -> Option<WallGuard> {
        let mut held = self.table.held.lock();
        if !held.insert(wall.to_string()) {
            return None;
        }
        Some(self.guard(wall))
    }

    /// 限时获得墙体锁
    ///
    /// # Errors
    ///
    /// 超时返回 `LockError`。
    pub fn lock_timeout(&self, wall: &str, timeout: Duration) -> TfResult<WallGuard> {
        let deadline = Instant::now() + timeout;
        let mut held = self.table.held.lock();
        while held.contains(wall) {
            if self.table.released.wait_until(&mut held, deadline).timed_out()
                && held.contains(wall)
            {
                return Err(TfError::lock_error(format!("墙体 {wall}")));
            }
        }
        held.insert(wall.to_string());
        Ok(self.guard(wall))
    }

    /// 墙体当前是否被锁定
    pub fn is_locked(&self, wall: &str) -> bool {
        self.table.held.lock().contains(wall)
    }

    fn guard(&self, wall: &str) -> WallGuard {
        WallGuard {
            table: Arc::clone(&self.table),
            wall: wall.to_string(),
        }
    }
}

/// 墙体锁守卫
#[derive(Debug)]
pub struct WallGuard {
    table: Arc<LockTable>,
    wall: String,
}

impl WallGuard {
    /// 被锁定的墙体
    pub fn wall(&self) -> &str {
        &self.wall
    }
}

impl Drop for WallGuard {
    fn drop(&mut self) {
        self.table.held.lock().remove(&self.wall);
        self.table.released.notify_all();
        debug!(wall = %self.wall, "释放墙体锁");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_same_wall_excludes() {
        let locks = WallLocks::new();
        let guard = locks.lock("W1");
        assert!(locks.is_locked("W1"));
        assert!(locks.try_lock("W1").is_none());
        assert!(locks.try_lock("W2").is_some());
        drop(guard);
        assert!(!locks.is_locked("W1"));
        assert!(locks.try_lock("W1").is_some());
    }

    #[test]
    fn test_timeout_is_lock_error() {
        let locks = WallLocks::new();
        let _guard = locks.lock("W1");
        let err = locks
            .lock_timeout("W1", Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, TfError::LockError { .. }));
    }

    #[test]
    fn test_threads_serialise_per_wall() {
        let locks = WallLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _g = locks.lock("W7");
                        let n = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(n, Ordering::SeqCst);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!locks.is_locked("W7"));
    }
}
