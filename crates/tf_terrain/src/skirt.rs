// crates/tf_terrain/src/skirt.rs

//! 过渡坡面投影
//!
//! 在补丁轮廓外侧投影一圈合成坡面，把补丁边缘平滑接到周围的母面上。
//!
//! # 算法
//!
//! 1. 边界单元：补丁有效且至少一个四邻单元位于补丁外
//! 2. 每个边界单元独立定向：搜索半径内最近的有效上下文单元
//!    （补丁外、基准有效）比边缘低则为填方坡（向外下降），高则为挖方坡（向外上升）
//! 3. `Z_proj = Z_edge ± d × slope_ratio`，d 为到边界单元中心的欧氏距离 [m]
//! 4. 投影沿远离补丁方向推进，投影面触及或越过上下文高程处为坡脚（daylight），
//!    其后不再投影；坡脚之前经过的基准空洞一并填充；半径以外保持无数据
//!
//! 最近源由两遍向量距离变换（前向/后向、八邻域、最近种子传播）求得，
//! 复杂度 O(n)。随后按距离递增处理候选单元，"已触地"状态沿同一源的
//! 邻接单元向外传递，无需逐单元的半径搜索。

use crate::diff::DifferenceGrid;
use crate::raster::Grid;
use crate::warning::TerrainWarning;
use serde::{Deserialize, Serialize};
use tf_foundation::error::TfResult;
use tracing::{debug, warn};

const NONE: usize = usize::MAX;

/// 四邻域偏移
const N4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// 八邻域偏移
const N8: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// 高差在容差内时的定向策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// 按填方处理（向外下降）
    #[default]
    Fill,
    /// 按挖方处理（向外上升）
    Cut,
}

/// 坡面方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkirtDirection {
    /// 填方坡：向外下降
    Fill,
    /// 挖方坡：向外上升
    Cut,
}

impl SkirtDirection {
    /// 高程随距离变化的符号
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Self::Fill => -1.0,
            Self::Cut => 1.0,
        }
    }

    /// 投影面是否已触及或越过地形
    #[inline]
    fn reached(self, z_proj: f64, z_terrain: f64) -> bool {
        match self {
            Self::Fill => z_proj <= z_terrain,
            Self::Cut => z_proj >= z_terrain,
        }
    }
}

impl From<TiePolicy> for SkirtDirection {
    fn from(p: TiePolicy) -> Self {
        match p {
            TiePolicy::Fill => Self::Fill,
            TiePolicy::Cut => Self::Cut,
        }
    }
}

/// 过渡坡面选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkirtOptions {
    /// 坡比（垂直/水平），1.0 = 45°
    pub slope_ratio: f64,
    /// 搜索半径 [单元]
    pub search_radius_cells: usize,
    /// 定向平局容差 [m]
    pub tie_tolerance: f64,
    /// 平局策略
    pub tie_policy: TiePolicy,
}

impl Default for SkirtOptions {
    fn default() -> Self {
        Self {
            slope_ratio: 1.0,
            search_radius_cells: 100,
            tie_tolerance: 1e-3,
            tie_policy: TiePolicy::Fill,
        }
    }
}

/// 坡面投影统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkirtStats {
    /// 边界单元数
    pub boundary_cells: usize,
    /// 填方定向的边界单元数
    pub fill_edges: usize,
    /// 挖方定向的边界单元数
    pub cut_edges: usize,
    /// 按平局策略定向的边界单元数
    pub tie_edges: usize,
    /// 半径内无上下文的边界单元数
    pub unsupported_edges: usize,
    /// 合成单元数
    pub synthetic_cells: usize,
    /// 其中落在基准空洞上的单元数
    pub void_filled_cells: usize,
    /// 坡脚单元数
    pub daylight_cells: usize,
}

/// 投影结果：补齐坡面后的补丁
#[derive(Debug, Clone)]
pub struct SkirtSurface {
    completed: Grid,
    synthetic: Vec<bool>,
    /// 统计量
    pub stats: SkirtStats,
    /// 降级警告
    pub warnings: Vec<TerrainWarning>,
}

impl SkirtSurface {
    /// 补丁 + 坡面
    pub fn completed(&self) -> &Grid {
        &self.completed
    }

    /// 合成掩膜
    pub fn synthetic(&self) -> &[bool] {
        &self.synthetic
    }

    /// 取出补齐后的补丁
    pub fn into_completed(self) -> Grid {
        self.completed
    }

    fn unchanged(patch: &Grid, stats: SkirtStats, warnings: Vec<TerrainWarning>) -> Self {
        Self {
            completed: patch.clone(),
            synthetic: vec![false; patch.len()],
            stats,
            warnings,
        }
    }
}

/// 候选单元的推进状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ray {
    Unvisited,
    Open,
    Stopped,
}

/// 行列邻居索引
#[inline]
fn neighbor(cols: usize, rows: usize, idx: usize, (dc, dr): (isize, isize)) -> Option<usize> {
    let c = (idx % cols) as isize + dc;
    let r = (idx / cols) as isize + dr;
    (c >= 0 && r >= 0 && (c as usize) < cols && (r as usize) < rows).then(|| r as usize * cols + c as usize)
}

/// 两单元间距离的平方 [单元²]
#[inline]
fn dist2(cols: usize, a: usize, b: usize) -> u64 {
    let dx = (a % cols).abs_diff(b % cols) as u64;
    let dy = (a / cols).abs_diff(b / cols) as u64;
    dx * dx + dy * dy
}

/// 最近种子距离变换
///
/// 返回每个单元的最近种子索引（无则 `NONE`）及距离平方。
/// 只有 `passable` 的单元会接收并继续传播种子。
fn nearest_seed(cols: usize, rows: usize, seeds: &[bool], passable: &[bool]) -> (Vec<usize>, Vec<u64>) {
    let n = cols * rows;
    let mut nearest = vec![NONE; n];
    let mut best = vec![u64::MAX; n];
    for i in (0..n).filter(|&i| seeds[i]) {
        nearest[i] = i;
        best[i] = 0;
    }

    let relax = |i: usize, off: (isize, isize), nearest: &mut [usize], best: &mut [u64]| {
        if best[i] == 0 || !passable[i] {
            return;
        }
        let Some(j) = neighbor(cols, rows, i, off) else {
            return;
        };
        let s = nearest[j];
        if s == NONE {
            return;
        }
        let d = dist2(cols, i, s);
        if d < best[i] {
            best[i] = d;
            nearest[i] = s;
        }
    };

    for r in 0..rows {
        for c in 0..cols {
            for off in [(-1, 0), (-1, -1), (0, -1), (1, -1)] {
                relax(r * cols + c, off, &mut nearest, &mut best);
            }
        }
        for c in (0..cols).rev() {
            relax(r * cols + c, (1, 0), &mut nearest, &mut best);
        }
    }
    for r in (0..rows).rev() {
        for c in (0..cols).rev() {
            for off in [(1, 0), (1, 1), (0, 1), (-1, 1)] {
                relax(r * cols + c, off, &mut nearest, &mut best);
            }
        }
        for c in 0..cols {
            relax(r * cols + c, (-1, 0), &mut nearest, &mut best);
        }
    }

    (nearest, best)
}

/// 投影过渡坡面
///
/// 三个输入须位于同一格网。只填充差值栅格中补丁外的空单元。
///
/// # Errors
///
/// 输入不在同一 CRS 或格网上时返回错误。
pub fn project_skirt(
    patch: &Grid,
    base: &Grid,
    difference: &DifferenceGrid,
    options: &SkirtOptions,
) -> TfResult<SkirtSurface> {
    patch.check_same_lattice(base)?;
    patch.check_same_lattice(difference.grid())?;

    let g = *patch.geometry();
    let (cols, rows, n) = (g.cols, g.rows, g.len());
    let mut stats = SkirtStats::default();

    let footprint: Vec<bool> = (0..n).map(|i| patch.is_valid(i)).collect();
    if !footprint.iter().any(|&f| f) {
        warn!("补丁为空，跳过过渡坡面");
        return Ok(SkirtSurface::unchanged(patch, stats, vec![TerrainWarning::EmptyPatch]));
    }

    let boundary: Vec<bool> = (0..n)
        .map(|i| {
            footprint[i]
                && N4
                    .iter()
                    .any(|&off| neighbor(cols, rows, i, off).is_some_and(|j| !footprint[j]))
        })
        .collect();
    let context: Vec<bool> = (0..n).map(|i| !footprint[i] && base.is_valid(i)).collect();
    stats.boundary_cells = boundary.iter().filter(|&&b| b).count();
    if stats.boundary_cells == 0 {
        return Ok(SkirtSurface::unchanged(patch, stats, Vec::new()));
    }

    let radius = options.search_radius_cells as u64;
    let r2 = radius * radius;

    // 边界单元定向
    let all = vec![true; n];
    let (ctx_nearest, ctx_best) = nearest_seed(cols, rows, &context, &all);
    let mut direction: Vec<Option<SkirtDirection>> = vec![None; n];
    for b in (0..n).filter(|&i| boundary[i]) {
        if ctx_nearest[b] == NONE || ctx_best[b] > r2 {
            stats.unsupported_edges += 1;
            continue;
        }
        let z_edge = f64::from(patch.data()[b]);
        let z_ctx = f64::from(base.data()[ctx_nearest[b]]);
        let dz = z_ctx - z_edge;
        let dir = if dz.abs() <= options.tie_tolerance {
            stats.tie_edges += 1;
            SkirtDirection::from(options.tie_policy)
        } else if dz < 0.0 {
            SkirtDirection::Fill
        } else {
            SkirtDirection::Cut
        };
        match dir {
            SkirtDirection::Fill => stats.fill_edges += 1,
            SkirtDirection::Cut => stats.cut_edges += 1,
        }
        direction[b] = Some(dir);
    }

    let mut warnings = Vec::new();
    if stats.unsupported_edges == stats.boundary_cells {
        warn!(
            boundary = stats.boundary_cells,
            radius = options.search_radius_cells,
            "补丁孤立，边缘保持硬边"
        );
        warnings.push(TerrainWarning::IsolatedPatch {
            boundary_cells: stats.boundary_cells,
            search_radius_cells: options.search_radius_cells,
        });
        return Ok(SkirtSurface::unchanged(patch, stats, warnings));
    }
    if stats.unsupported_edges > 0 {
        warn!(
            unsupported = stats.unsupported_edges,
            total = stats.boundary_cells,
            "部分边界单元无上下文"
        );
        warnings.push(TerrainWarning::PartiallyUnsupportedEdge {
            unsupported: stats.unsupported_edges,
            total: stats.boundary_cells,
        });
    }

    // 补丁外每个单元的最近边界源
    let outside: Vec<bool> = footprint.iter().map(|&f| !f).collect();
    let (src_of, src_best) = nearest_seed(cols, rows, &boundary, &outside);

    let void = |i: usize| !footprint[i] && !difference.grid().is_valid(i);
    let mut candidates: Vec<usize> = (0..n)
        .filter(|&i| {
            void(i) && src_of[i] != NONE && src_best[i] <= r2 && direction[src_of[i]].is_some()
        })
        .collect();
    candidates.sort_unstable_by_key(|&i| (src_best[i], i));

    let mut state = vec![Ray::Unvisited; n];
    let mut data = patch.data().to_vec();
    let mut synthetic = vec![false; n];
    let step = g.cell_size * options.slope_ratio;

    for &i in &candidates {
        let src = src_of[i];
        let Some(dir) = direction[src] else {
            continue;
        };

        if inherited_state(cols, rows, i, src, &src_of, &src_best, &state, &footprint) == Ray::Stopped {
            state[i] = Ray::Stopped;
            continue;
        }

        let d = (src_best[i] as f64).sqrt();
        let z_proj = f64::from(patch.data()[src]) + dir.sign() * d * step;
        match base.value(i) {
            Some(z_base) if dir.reached(z_proj, f64::from(z_base)) => {
                state[i] = Ray::Stopped;
                stats.daylight_cells += 1;
            }
            terrain => {
                state[i] = Ray::Open;
                data[i] = z_proj as f32;
                synthetic[i] = true;
                stats.synthetic_cells += 1;
                if terrain.is_none() {
                    stats.void_filled_cells += 1;
                }
            }
        }
    }

    debug!(
        boundary = stats.boundary_cells,
        fill = stats.fill_edges,
        cut = stats.cut_edges,
        synthetic = stats.synthetic_cells,
        void_filled = stats.void_filled_cells,
        "过渡坡面投影完成"
    );

    Ok(SkirtSurface {
        completed: patch.with_data(data)?,
        synthetic,
        stats,
        warnings,
    })
}

/// 候选单元从内侧邻居继承的推进状态
///
/// 优先取同源且离源最近的已处理邻居；与源直接相邻时视为新射线起点。
#[allow(clippy::too_many_arguments)]
fn inherited_state(
    cols: usize,
    rows: usize,
    i: usize,
    src: usize,
    src_of: &[usize],
    src_best: &[u64],
    state: &[Ray],
    footprint: &[bool],
) -> Ray {
    let mut same_source: Option<(u64, Ray)> = None;
    let mut any_visited: Option<(u64, Ray)> = None;
    let mut touches_footprint = false;

    for j in N8.iter().filter_map(|&off| neighbor(cols, rows, i, off)) {
        if j == src {
            return Ray::Open;
        }
        if footprint[j] {
            touches_footprint = true;
            continue;
        }
        if state[j] == Ray::Unvisited {
            continue;
        }
        let cand = (src_best[j], state[j]);
        if src_of[j] == src && same_source.map_or(true, |(d, _)| cand.0 < d) {
            same_source = Some(cand);
        }
        if any_visited.map_or(true, |(d, _)| cand.0 < d) {
            any_visited = Some(cand);
        }
    }

    if let Some((_, s)) = same_source {
        s
    } else if touches_footprint {
        Ray::Open
    } else {
        any_visited.map_or(Ray::Stopped, |(_, s)| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{difference, DiffOptions};
    use crate::raster::GridGeometry;
    use tf_geo::CrsDefinition;

    const ND: f32 = -9999.0;

    fn geom(cols: usize, rows: usize) -> GridGeometry {
        GridGeometry::new(0.0, rows as f64, 1.0, cols, rows).unwrap()
    }

    fn crs() -> CrsDefinition {
        CrsDefinition::Epsg(32719)
    }

    fn run(patch: &Grid, base: &Grid, opts: &SkirtOptions) -> SkirtSurface {
        let diff = difference(patch, base, &DiffOptions::default()).unwrap();
        project_skirt(patch, base, &diff.difference, opts).unwrap()
    }

    #[test]
    fn test_distance_transform_matches_brute_force() {
        let (cols, rows) = (23, 17);
        let mut seeds = vec![false; cols * rows];
        for &i in &[5, 77, 200, 311] {
            seeds[i] = true;
        }
        let (nearest, best) = nearest_seed(cols, rows, &seeds, &vec![true; cols * rows]);
        for i in 0..cols * rows {
            let brute = (0..cols * rows)
                .filter(|&s| seeds[s])
                .map(|s| dist2(cols, i, s))
                .min()
                .unwrap();
            assert!(seeds[nearest[i]]);
            assert_eq!(best[i], dist2(cols, i, nearest[i]));
            // 两遍扫描的误差小于一个单元
            assert!((best[i] as f64).sqrt() - (brute as f64).sqrt() < 1.0, "cell {i}");
        }
    }

    #[test]
    fn test_fill_skirt_descends_to_daylight() {
        // 平地上 3 m 高的方块
        let g = geom(20, 20);
        let base = Grid::filled(g, ND, crs(), 0.0).unwrap();
        let patch = Grid::from_fn(g, ND, crs(), |c, r| {
            ((8..12).contains(&c) && (8..12).contains(&r)).then_some(3.0)
        })
        .unwrap();

        let s = run(&patch, &base, &SkirtOptions::default());
        assert!(s.warnings.is_empty());
        assert_eq!(s.stats.fill_edges, s.stats.boundary_cells);
        assert_eq!(s.stats.cut_edges, 0);

        let z = s.completed();
        assert_eq!(z.get(12, 9), Some(2.0));
        assert_eq!(z.get(13, 9), Some(1.0));
        assert_eq!(z.get(14, 9), None);
        assert!(!s.synthetic()[g.index(14, 9)]);
        assert!(s.synthetic()[g.index(12, 9)]);
        // 投影面高于地形
        for i in s.synthetic().iter().enumerate().filter_map(|(i, &b)| b.then_some(i)) {
            assert!(z.data()[i] > 0.0);
        }
    }

    #[test]
    fn test_cut_skirt_ascends() {
        let g = geom(20, 20);
        let base = Grid::filled(g, ND, crs(), 0.0).unwrap();
        let patch = Grid::from_fn(g, ND, crs(), |c, r| {
            ((8..12).contains(&c) && (8..12).contains(&r)).then_some(-3.0)
        })
        .unwrap();

        let s = run(&patch, &base, &SkirtOptions::default());
        assert_eq!(s.stats.cut_edges, s.stats.boundary_cells);
        assert_eq!(s.completed().get(7, 10), Some(-2.0));
        assert_eq!(s.completed().get(6, 10), Some(-1.0));
        assert_eq!(s.completed().get(5, 10), None);
    }

    #[test]
    fn test_direction_decided_per_edge() {
        // 左侧地形低于补丁、右侧高于补丁：同一补丁两侧分别填方和挖方
        let g = geom(20, 5);
        let base = Grid::from_fn(g, ND, crs(), |c, _| Some(if c < 10 { 0.0 } else { 10.0 })).unwrap();
        let patch = Grid::from_fn(g, ND, crs(), |c, _| (8..12).contains(&c).then_some(5.0)).unwrap();

        let s = run(&patch, &base, &SkirtOptions::default());
        assert_eq!(s.stats.boundary_cells, 10);
        assert_eq!(s.stats.fill_edges, 5);
        assert_eq!(s.stats.cut_edges, 5);
        assert!(s.warnings.is_empty());

        let z = s.completed();
        assert_eq!(z.get(7, 2), Some(4.0));
        assert_eq!(z.get(4, 2), Some(1.0));
        assert_eq!(z.get(3, 2), None);
        assert_eq!(z.get(12, 2), Some(6.0));
        assert_eq!(z.get(15, 2), Some(9.0));
        assert_eq!(z.get(16, 2), None);
    }

    #[test]
    fn test_partially_unsupported_edge() {
        // 只有左侧有地形；半径 1 时右侧边界找不到上下文
        let g = geom(30, 3);
        let base = Grid::from_fn(g, ND, crs(), |c, _| (8..10).contains(&c).then_some(0.0)).unwrap();
        let patch = Grid::from_fn(g, ND, crs(), |c, _| (10..12).contains(&c).then_some(5.0)).unwrap();
        let opts = SkirtOptions {
            search_radius_cells: 1,
            ..SkirtOptions::default()
        };

        let s = run(&patch, &base, &opts);
        assert_eq!(
            s.warnings,
            vec![TerrainWarning::PartiallyUnsupportedEdge {
                unsupported: 3,
                total: 6,
            }]
        );
        assert_eq!(s.stats.unsupported_edges, 3);
        assert_eq!(s.stats.fill_edges, 3);

        let z = s.completed();
        assert_eq!(z.get(9, 1), Some(4.0));
        assert_eq!(z.get(8, 1), None);
        // 无上下文的一侧保持硬边
        assert_eq!(z.get(12, 1), None);
        assert!(!s.synthetic()[g.index(12, 1)]);
    }

    #[test]
    fn test_tie_uses_policy() {
        let g = geom(10, 10);
        let base = Grid::filled(g, ND, crs(), 1.0).unwrap();
        let patch = Grid::from_fn(g, ND, crs(), |c, r| {
            ((4..6).contains(&c) && (4..6).contains(&r)).then_some(1.0005)
        })
        .unwrap();
        let opts = SkirtOptions {
            tie_policy: TiePolicy::Cut,
            ..SkirtOptions::default()
        };
        let s = run(&patch, &base, &opts);
        assert_eq!(s.stats.tie_edges, s.stats.boundary_cells);
        assert_eq!(s.stats.cut_edges, s.stats.boundary_cells);
    }

    #[test]
    fn test_void_crossed_before_daylight_is_filled() {
        // 补丁在左侧，中间是基准空洞，右侧才有地形
        let g = geom(20, 3);
        let base = Grid::from_fn(g, ND, crs(), |c, _| (c >= 8).then_some(0.0)).unwrap();
        let patch = Grid::from_fn(g, ND, crs(), |c, _| (c < 4).then_some(10.0)).unwrap();

        let s = run(&patch, &base, &SkirtOptions::default());
        let z = s.completed();
        assert_eq!(z.get(4, 1), Some(9.0));
        assert_eq!(z.get(7, 1), Some(6.0));
        assert_eq!(z.get(12, 1), Some(1.0));
        assert_eq!(z.get(13, 1), None);
        assert_eq!(s.stats.void_filled_cells, 4 * 3);
    }

    #[test]
    fn test_isolated_patch_keeps_hard_edges() {
        let g = geom(30, 3);
        let base = Grid::from_fn(g, ND, crs(), |c, _| (c >= 25).then_some(0.0)).unwrap();
        let patch = Grid::from_fn(g, ND, crs(), |c, _| (c < 3).then_some(5.0)).unwrap();
        let opts = SkirtOptions {
            search_radius_cells: 10,
            ..SkirtOptions::default()
        };
        let s = run(&patch, &base, &opts);
        assert_eq!(s.stats.synthetic_cells, 0);
        assert!(matches!(s.warnings[0], TerrainWarning::IsolatedPatch { .. }));
        assert_eq!(s.completed().data(), patch.data());
    }

    #[test]
    fn test_empty_patch_warning() {
        let g = geom(5, 5);
        let base = Grid::filled(g, ND, crs(), 0.0).unwrap();
        let patch = Grid::empty(g, ND, crs()).unwrap();
        let s = run(&patch, &base, &SkirtOptions::default());
        assert_eq!(s.warnings, vec![TerrainWarning::EmptyPatch]);
        assert_eq!(s.stats.synthetic_cells, 0);
    }
}
