// crates/tf_geo/src/geometry.rs
//! 几何类型定义
//!
//! 测区坐标均为投影坐标（米），因此只提供欧几里得运算。

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// 2D点 - 投影坐标系中的平面位置
///
/// # 示例
///
/// ```
/// use tf_geo::geometry::Point2D;
///
/// let p1 = Point2D::new(500000.0, 6500000.0);
/// let p2 = Point2D::new(500030.0, 6500040.0);
/// assert!((p1.distance_to(&p2) - 50.0).abs() < 1e-9);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// X坐标（东向）
    pub x: f64,
    /// Y坐标（北向）
    pub y: f64,
}

impl Point2D {
    /// 创建新的2D点
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 计算到另一个点的欧几里得距离
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    /// 计算到另一个点的距离的平方
    #[inline]
    #[must_use]
    pub fn distance_squared_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// 叉积（z 分量）
    #[inline]
    #[must_use]
    pub fn cross(&self, other: &Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// 是否所有分量都有限
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// 绕原点逆时针旋转（弧度）
    #[inline]
    #[must_use]
    pub fn rotate(&self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    /// 绕指定中心旋转
    #[inline]
    #[must_use]
    pub fn rotate_about(&self, center: &Self, angle: f64) -> Self {
        (*self - *center).rotate(angle) + *center
    }

    /// 平移
    #[inline]
    #[must_use]
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl Add for Point2D {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_point2d_euclidean_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 1e-10);
        assert!((p1.distance_squared_to(&p2) - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_point2d_rotate() {
        let p = Point2D::new(1.0, 0.0);
        let rotated = p.rotate(PI / 2.0);

        assert!(rotated.x.abs() < 1e-10);
        assert!((rotated.y - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_rotate_about_preserves_distance() {
        let center = Point2D::new(10.0, -5.0);
        let p = Point2D::new(13.0, -1.0);
        let r = p.rotate_about(&center, 1.234);
        assert!((r.distance_to(&center) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_cross_sign() {
        let a = Point2D::new(1.0, 0.0);
        let b = Point2D::new(0.0, 1.0);
        assert!(a.cross(&b) > 0.0);
        assert!(b.cross(&a) < 0.0);
    }
}
