// crates/tf_geo/src/extent.rs
//! 测区轮廓尺寸
//!
//! 长度取多边形顶点间最大欧氏距离（直径），宽度取 `面积 / 长度`。
//! 两者都只依赖顶点间距离和鞋带公式面积，因此对任意刚体旋转不变；
//! 外包框或固定断面法在主轴不与坐标轴平行时会给出错误尺寸。
//!
//! # 示例
//!
//! ```
//! use tf_geo::{Point2D, Polygon};
//!
//! let poly = Polygon::new(vec![
//!     Point2D::new(0.0, 0.0),
//!     Point2D::new(30.0, 0.0),
//!     Point2D::new(30.0, 40.0),
//!     Point2D::new(0.0, 40.0),
//! ]).unwrap();
//! let ext = poly.extent();
//! assert!((ext.length - 50.0).abs() < 1e-9);
//! assert!((ext.width - 24.0).abs() < 1e-9);
//! ```

use crate::geometry::Point2D;
use serde::{Deserialize, Serialize};
use tf_foundation::error::{TfError, TfResult};
use tf_foundation::tolerance::GEOMETRY_EPS;

/// 超过此顶点数时先求凸包再算直径
const HULL_THRESHOLD: usize = 32;

/// 轮廓尺寸 [m, m²]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FootprintExtent {
    /// 长度（最大顶点间距）
    pub length: f64,
    /// 宽度（面积 / 长度）
    pub width: f64,
    /// 面积（鞋带公式绝对值）
    pub area: f64,
    /// 周长
    pub perimeter: f64,
}

/// 简单闭合多边形（顶点按顺序排列，不重复首点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<Point2D>,
}

impl Polygon {
    /// 创建多边形
    ///
    /// 若末点与首点重合（闭合环写法）则去掉末点。
    ///
    /// # Errors
    ///
    /// 顶点少于 3 个或含非有限坐标时返回 `InvalidInput`。
    pub fn new(mut vertices: Vec<Point2D>) -> TfResult<Self> {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(TfError::invalid_input(format!(
                "多边形至少需要 3 个顶点, 实际 {}",
                vertices.len()
            )));
        }
        if let Some(bad) = vertices.iter().position(|p| !p.is_finite()) {
            return Err(TfError::invalid_input(format!("第 {bad} 个顶点坐标非有限值")));
        }
        Ok(Self { vertices })
    }

    /// 顶点切片
    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    /// 有符号面积（逆时针为正）
    ///
    /// 以首顶点为局部原点计算，避免大坐标（UTM 北向 ~6.5e6）相乘的抵消误差。
    pub fn signed_area(&self) -> f64 {
        let origin = self.vertices[0];
        let n = self.vertices.len();
        let mut twice = 0.0;
        for i in 0..n {
            let a = self.vertices[i] - origin;
            let b = self.vertices[(i + 1) % n] - origin;
            twice += a.cross(&b);
        }
        twice * 0.5
    }

    /// 面积（绝对值）
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// 周长
    pub fn perimeter(&self) -> f64 {
        let n = self.vertices.len();
        (0..n)
            .map(|i| self.vertices[i].distance_to(&self.vertices[(i + 1) % n]))
            .sum()
    }

    /// 直径：任意两顶点间最大距离
    pub fn diameter(&self) -> f64 {
        if self.vertices.len() > HULL_THRESHOLD {
            max_pairwise_distance(&convex_hull(&self.vertices))
        } else {
            max_pairwise_distance(&self.vertices)
        }
    }

    /// 计算轮廓尺寸
    pub fn extent(&self) -> FootprintExtent {
        let length = self.diameter();
        let area = self.area();
        let width = if length > GEOMETRY_EPS { area / length } else { 0.0 };
        FootprintExtent {
            length,
            width,
            area,
            perimeter: self.perimeter(),
        }
    }

    /// 绕指定中心旋转后的多边形
    #[must_use]
    pub fn rotated(&self, center: &Point2D, angle: f64) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|p| p.rotate_about(center, angle))
                .collect(),
        }
    }
}

/// 所有点对的最大距离，O(n²)
fn max_pairwise_distance(points: &[Point2D]) -> f64 {
    let mut best = 0.0f64;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            best = best.max(a.distance_squared_to(b));
        }
    }
    best.sqrt()
}

/// 单调链凸包（逆时针，不含共线点）
fn convex_hull(points: &[Point2D]) -> Vec<Point2D> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let turn = |o: &Point2D, a: &Point2D, b: &Point2D| (*a - *o).cross(&(*b - *o));

    let mut hull: Vec<Point2D> = Vec::with_capacity(pts.len() * 2);
    for p in &pts {
        while hull.len() >= 2 && turn(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && turn(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn rect(w: f64, h: f64) -> Polygon {
        Polygon::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(w, 0.0),
            Point2D::new(w, h),
            Point2D::new(0.0, h),
        ])
        .unwrap()
    }

    #[test]
    fn test_rectangle_extent() {
        let ext = rect(30.0, 40.0).extent();
        assert!((ext.length - 50.0).abs() < 1e-10);
        assert!((ext.area - 1200.0).abs() < 1e-10);
        assert!((ext.width - 24.0).abs() < 1e-10);
        assert!((ext.perimeter - 140.0).abs() < 1e-10);
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = rect(2.0, 3.0);
        assert!(ccw.signed_area() > 0.0);
        let mut rev = ccw.vertices().to_vec();
        rev.reverse();
        let cw = Polygon::new(rev).unwrap();
        assert!(cw.signed_area() < 0.0);
        assert!((cw.area() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_closing_vertex_is_dropped() {
        let p = Polygon::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(0.0, 1.0),
            Point2D::new(0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(p.vertices().len(), 3);
    }

    #[test]
    fn test_degenerate_input_rejected() {
        assert!(Polygon::new(vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)]).is_err());
        assert!(Polygon::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(f64::NAN, 1.0),
            Point2D::new(1.0, 0.0),
        ])
        .is_err());
    }

    #[test]
    fn test_utm_scale_coordinates() {
        // 大坐标下面积不应丢失精度
        let base = Point2D::new(345_000.0, 6_512_000.0);
        let p = Polygon::new(vec![
            base,
            base.translate(25.0, 0.0),
            base.translate(25.0, 8.0),
            base.translate(0.0, 8.0),
        ])
        .unwrap();
        assert!((p.area() - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_hull_diameter_matches_all_pairs() {
        // 星形多边形，顶点数超过凸包阈值
        let n = 80;
        let verts: Vec<Point2D> = (0..n)
            .map(|i| {
                let t = 2.0 * PI * f64::from(i) / f64::from(n);
                let r = if i % 2 == 0 { 50.0 } else { 20.0 };
                Point2D::new(r * t.cos() * 1.7, r * t.sin())
            })
            .collect();
        let poly = Polygon::new(verts.clone()).unwrap();
        let brute = max_pairwise_distance(&verts);
        assert!((poly.diameter() - brute).abs() < 1e-9);
    }

    #[test]
    fn test_convex_hull_square_with_interior() {
        let pts = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(2.0, 2.0),
            Point2D::new(0.0, 2.0),
            Point2D::new(1.0, 0.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
    }
}
