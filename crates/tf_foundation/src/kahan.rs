// crates/tf_foundation/src/kahan.rs

//! Kahan 求和算法
//!
//! 栅格单元以 f32 存储，体积与统计量一律在 f64 中以补偿求和累加，
//! 避免百万级单元求和时的漂移。

/// Kahan 补偿求和器
///
/// # 示例
///
/// ```
/// use tf_foundation::KahanSum;
///
/// let mut acc = KahanSum::new();
/// for _ in 0..1000 {
///     acc.add(0.1);
/// }
/// assert!((acc.value() - 100.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// 创建新的求和器
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }

    /// 添加一个值
    #[inline]
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 合并另一个求和器（用于并行分块求和后的归并）
    #[inline]
    pub fn merge(&mut self, other: &Self) {
        self.add(other.sum);
        self.add(-other.compensation);
    }

    /// 获取当前求和值
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum
    }

    /// 从迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = f64>>(iter: I) -> f64 {
        let mut kahan = Self::new();
        for v in iter {
            kahan.add(v);
        }
        kahan.value()
    }
}
