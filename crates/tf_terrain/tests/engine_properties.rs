// crates/tf_terrain/tests/engine_properties.rs

//! 差分/融合引擎的整体性质

use tf_foundation::TfError;
use tf_geo::CrsDefinition;
use tf_terrain::{
    aggregate, difference, harmonize, overlay_patch, project_skirt, DiffOptions, Grid,
    GridGeometry, HarmonizeOptions, SkirtOptions, TerrainWarning, UpdateOptions, VolumeOptions,
};

const ND: f32 = -9999.0;

fn crs() -> CrsDefinition {
    CrsDefinition::utm_zone(19, false)
}

fn geom(cols: usize, rows: usize, cs: f64) -> GridGeometry {
    GridGeometry::new(345_000.0, 6_512_000.0, cs, cols, rows).unwrap()
}

/// 起伏的基准面
fn terrain(g: GridGeometry) -> Grid {
    Grid::from_fn(g, ND, crs(), |c, r| {
        Some(1200.0 + 0.05 * c as f32 - 0.03 * r as f32 + ((c * 7 + r * 3) % 5) as f32 * 0.01)
    })
    .unwrap()
}

#[test]
fn self_difference_is_zero() {
    let g = geom(40, 30, 0.5);
    let master = terrain(g);
    let pair = harmonize(&master, &master, &HarmonizeOptions::default()).unwrap();
    let out = difference(&pair.patch, &pair.base, &DiffOptions::default()).unwrap();
    let vol = aggregate(&out.difference, &VolumeOptions::default());

    assert_eq!(vol.cut_volume, 0.0);
    assert_eq!(vol.fill_volume, 0.0);
    assert_eq!(vol.net_volume, 0.0);
    assert_eq!(out.stats.suppressed_cells, 0);
    assert_eq!(out.stats.valid_cells, 1200);
}

#[test]
fn uniform_raise_is_pure_fill() {
    let g = geom(10, 10, 1.0);
    let base = Grid::filled(g, ND, crs(), 50.0).unwrap();
    let patch = Grid::filled(g, ND, crs(), 51.0).unwrap();
    let out = difference(&patch, &base, &DiffOptions::default()).unwrap();
    let vol = aggregate(&out.difference, &VolumeOptions::default());

    assert!((vol.fill_volume - 100.0).abs() < 1e-6);
    assert_eq!(vol.cut_volume, 0.0);
    assert!((vol.net_volume - 100.0).abs() < 1e-6);
    assert!((vol.mean_thickness - 1.0).abs() < 1e-9);
}

#[test]
fn single_spike_is_suppressed() {
    let g = geom(10, 10, 1.0);
    let base = Grid::filled(g, ND, crs(), 0.0).unwrap();
    let patch = Grid::from_fn(g, ND, crs(), |c, r| {
        Some(if (c, r) == (4, 6) { 50.0 } else { 0.001 * ((c + r) % 3) as f32 })
    })
    .unwrap();
    let out = difference(&patch, &base, &DiffOptions::default()).unwrap();

    assert_eq!(out.stats.suppressed_cells, 1);
    assert_eq!(out.difference.grid().get(4, 6), None);
    assert_eq!(out.difference.grid().valid_count(), 99);
    assert_eq!(out.stats.raw_max, Some(50.0));
}

#[test]
fn skirt_without_context_in_radius_is_empty() {
    let g = geom(60, 5, 1.0);
    let base = Grid::from_fn(g, ND, crs(), |c, _| (c >= 50).then_some(0.0)).unwrap();
    let patch = Grid::from_fn(g, ND, crs(), |c, _| (c < 5).then_some(3.0)).unwrap();
    let out = difference(&patch, &base, &DiffOptions::default()).unwrap();
    let opts = SkirtOptions {
        search_radius_cells: 20,
        ..SkirtOptions::default()
    };
    let skirt = project_skirt(&patch, &base, &out.difference, &opts).unwrap();

    assert_eq!(skirt.stats.synthetic_cells, 0);
    assert!(skirt.synthetic().iter().all(|&s| !s));
    assert!(matches!(
        skirt.warnings.as_slice(),
        [TerrainWarning::IsolatedPatch { .. }]
    ));
}

#[test]
fn merge_never_mutates_inputs() {
    let mg = geom(30, 30, 1.0);
    let master = terrain(mg);
    let patch_geom = GridGeometry::new(345_010.0, 6_511_990.0, 0.5, 12, 12).unwrap();
    let patch = Grid::filled(patch_geom, ND, crs(), 1203.0).unwrap();
    let master_before = master.clone();
    let patch_before = patch.clone();

    let pair = harmonize(&patch, &master, &HarmonizeOptions::default()).unwrap();
    let out = difference(&pair.patch, &pair.base, &DiffOptions::default()).unwrap();
    let skirt = project_skirt(&pair.patch, &pair.base, &out.difference, &SkirtOptions::default())
        .unwrap();
    let update = overlay_patch(&master, skirt.completed(), &UpdateOptions::default()).unwrap();

    assert_eq!(master, master_before);
    assert_eq!(patch, patch_before);
    assert!(update.report.cells_written > 144);
    assert!((update.master.cell_size() - 0.5).abs() < 1e-12);
}

#[test]
fn skirt_volume_joins_difference() {
    let g = geom(20, 20, 1.0);
    let base = Grid::filled(g, ND, crs(), 0.0).unwrap();
    let patch = Grid::from_fn(g, ND, crs(), |c, r| {
        ((8..12).contains(&c) && (8..12).contains(&r)).then_some(2.0)
    })
    .unwrap();
    let out = difference(&patch, &base, &DiffOptions::default()).unwrap();
    let skirt = project_skirt(&patch, &base, &out.difference, &SkirtOptions::default()).unwrap();
    let completed = out.difference.with_skirt(&skirt, &base).unwrap();

    let measured = aggregate(&out.difference, &VolumeOptions::default());
    let with = aggregate(&completed, &VolumeOptions::default());
    let without = aggregate(
        &completed,
        &VolumeOptions {
            include_synthetic: false,
        },
    );

    assert!((measured.fill_volume - 32.0).abs() < 1e-9);
    assert!(with.fill_volume > measured.fill_volume);
    assert_eq!(with.synthetic_cells, skirt.stats.synthetic_cells);
    assert!((without.fill_volume - measured.fill_volume).abs() < 1e-9);
}

#[test]
fn crs_mismatch_aborts() {
    let g = geom(4, 4, 1.0);
    let a = Grid::filled(g, ND, CrsDefinition::Epsg(32719), 0.0).unwrap();
    let b = Grid::filled(g, ND, CrsDefinition::Epsg(32619), 0.0).unwrap();
    let err = harmonize(&a, &b, &HarmonizeOptions::default()).unwrap_err();
    assert!(matches!(err, TfError::IncompatibleReference { .. }));
}
