// crates/tf_io/src/codec.rs

//! TFGR 栅格容器
//!
//! 无损、分块压缩的高程栅格格式。所有整数和浮点头字段为小端序。
//!
//! ```text
//! "TFGR" | version u32 | header_len u32 | header | header_crc u32
//! tile directory: n_tiles × (payload_len u64, payload_crc u32)
//! payloads
//! ```
//!
//! 头部：origin_x f64, origin_y f64, cell_size f64, cols u64, rows u64,
//! nodata f32, tile_size u32, predictor u8, crs_len u32, crs（UTF-8 文本）。
//!
//! 每个分块逐行做浮点差分预测：把大端 f32 拆成 4 个字节平面依次排列，
//! 再对整行字节做水平差分，最后用 zstd 压缩。高程面平滑时高位字节几乎不变，
//! 差分后大部分为 0，压缩比远高于直接压缩原始浮点。
//!
//! 解码校验魔数、版本、头部与分块 CRC、分块长度，任何不一致都是 `CorruptPayload`。

use crate::error::{IoError, IoResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tf_foundation::error::TfResult;
use tf_geo::CrsDefinition;
use tf_terrain::{Grid, GridGeometry};
use tracing::debug;

/// 容器魔数
pub const TFGR_MAGIC: &[u8; 4] = b"TFGR";

/// 当前容器版本
pub const TFGR_VERSION: u32 = 1;

/// 推荐文件扩展名
pub const TFGR_EXTENSION: &str = "tfgr";

/// 头部长度上限（字节）
const MAX_HEADER_LEN: usize = 1 << 20;

/// 每个分块目录项的字节数
const DIRECTORY_ENTRY_LEN: usize = 12;

/// 预测器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Predictor {
    /// 浮点差分（字节平面 + 水平差分）
    #[default]
    FloatingPointDelta = 3,
}

impl Predictor {
    fn from_code(code: u8) -> IoResult<Self> {
        match code {
            3 => Ok(Self::FloatingPointDelta),
            other => Err(IoError::InvalidHeader(format!("未知预测器: {other}"))),
        }
    }
}

/// 编码选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// 分块边长 [单元]
    pub tile_size: u32,
    /// zstd 压缩级别
    pub compression_level: i32,
    /// 预测器
    pub predictor: Predictor,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            tile_size: 256,
            compression_level: 3,
            predictor: Predictor::FloatingPointDelta,
        }
    }
}

/// 容器头
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    /// 容器版本
    pub version: u32,
    /// 网格几何
    pub geometry: GridGeometry,
    /// 无数据值
    pub nodata: f32,
    /// 坐标参考系统
    pub crs: CrsDefinition,
    /// 分块边长
    pub tile_size: u32,
    /// 预测器
    pub predictor: Predictor,
}

impl GridHeader {
    /// 分块行列数
    pub fn tile_grid(&self) -> (usize, usize) {
        let ts = self.tile_size as usize;
        (
            self.geometry.cols.div_ceil(ts),
            self.geometry.rows.div_ceil(ts),
        )
    }

    /// 分块总数
    pub fn tile_count(&self) -> usize {
        let (tc, tr) = self.tile_grid();
        tc * tr
    }

    /// 第 `tile` 个分块覆盖的 (起始列, 起始行, 宽, 高)
    fn tile_window(&self, tile: usize) -> (usize, usize, usize, usize) {
        let ts = self.tile_size as usize;
        let (tc, _) = self.tile_grid();
        let c0 = (tile % tc) * ts;
        let r0 = (tile / tc) * ts;
        let w = ts.min(self.geometry.cols - c0);
        let h = ts.min(self.geometry.rows - r0);
        (c0, r0, w, h)
    }

    fn encode(&self) -> Vec<u8> {
        let crs = self.crs.to_text();
        let mut buf = Vec::with_capacity(53 + crs.len());
        buf.extend_from_slice(&self.geometry.origin_x.to_le_bytes());
        buf.extend_from_slice(&self.geometry.origin_y.to_le_bytes());
        buf.extend_from_slice(&self.geometry.cell_size.to_le_bytes());
        buf.extend_from_slice(&(self.geometry.cols as u64).to_le_bytes());
        buf.extend_from_slice(&(self.geometry.rows as u64).to_le_bytes());
        buf.extend_from_slice(&self.nodata.to_le_bytes());
        buf.extend_from_slice(&self.tile_size.to_le_bytes());
        buf.push(self.predictor as u8);
        buf.extend_from_slice(&(crs.len() as u32).to_le_bytes());
        buf.extend_from_slice(crs.as_bytes());
        buf
    }

    fn decode(version: u32, body: &[u8]) -> IoResult<Self> {
        let mut r = Cursor::new(body, "header");
        let origin_x = r.f64()?;
        let origin_y = r.f64()?;
        let cell_size = r.f64()?;
        let cols = usize::try_from(r.u64()?).map_err(|_| IoError::InvalidHeader("列数溢出".into()))?;
        let rows = usize::try_from(r.u64()?).map_err(|_| IoError::InvalidHeader("行数溢出".into()))?;
        let nodata = r.f32()?;
        let tile_size = r.u32()?;
        let predictor = Predictor::from_code(r.u8()?)?;
        let crs_len = r.u32()? as usize;
        let crs_text = std::str::from_utf8(r.take(crs_len)?)
            .map_err(|e| IoError::InvalidHeader(format!("CRS 文本不是 UTF-8: {e}")))?;
        if !r.is_empty() {
            return Err(IoError::InvalidHeader("头部含多余字节".into()));
        }

        if cols.checked_mul(rows).and_then(|n| n.checked_mul(4)).is_none() {
            return Err(IoError::InvalidHeader(format!("网格尺寸溢出: {cols}x{rows}")));
        }
        let geometry = GridGeometry::new(origin_x, origin_y, cell_size, cols, rows)
            .map_err(|e| IoError::InvalidHeader(e.to_string()))?;
        if tile_size == 0 {
            return Err(IoError::InvalidHeader("分块边长为 0".into()));
        }
        if !nodata.is_finite() {
            return Err(IoError::InvalidHeader(format!("无数据值非有限: {nodata}")));
        }
        let crs = CrsDefinition::parse(crs_text).map_err(|e| IoError::InvalidHeader(e.to_string()))?;

        Ok(Self {
            version,
            geometry,
            nodata,
            crs,
            tile_size,
            predictor,
        })
    }
}

/// 小端读取游标
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], context: &'static str) -> Self {
        Self { data, pos: 0, context }
    }

    fn take(&mut self, n: usize) -> IoResult<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(IoError::Truncated {
                context: self.context,
                needed: n,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> IoResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> IoResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> IoResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> IoResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> IoResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> IoResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

// ============================================================
// 预测器
// ============================================================

/// 一行 f32 → 字节平面 + 水平差分
fn predict_row(values: &[f32], out: &mut Vec<u8>) {
    let w = values.len();
    let start = out.len();
    out.resize(start + 4 * w, 0);
    let row = &mut out[start..];
    for (i, v) in values.iter().enumerate() {
        let b = v.to_be_bytes();
        for (plane, &byte) in b.iter().enumerate() {
            row[plane * w + i] = byte;
        }
    }
    for i in (1..row.len()).rev() {
        row[i] = row[i].wrapping_sub(row[i - 1]);
    }
}

/// `predict_row` 的逆变换
fn unpredict_row(bytes: &mut [u8], out: &mut Vec<f32>) {
    for i in 1..bytes.len() {
        bytes[i] = bytes[i].wrapping_add(bytes[i - 1]);
    }
    let w = bytes.len() / 4;
    for i in 0..w {
        out.push(f32::from_be_bytes([
            bytes[i],
            bytes[w + i],
            bytes[2 * w + i],
            bytes[3 * w + i],
        ]));
    }
}

// ============================================================
// 编码 / 解码
// ============================================================

/// 把栅格编码为 TFGR 字节
///
/// # Errors
///
/// 分块边长为 0 时返回 `InvalidHeader`，zstd 压缩失败时返回 `Compression`。
pub fn encode(grid: &Grid, options: &CodecOptions) -> IoResult<Vec<u8>> {
    if options.tile_size == 0 {
        return Err(IoError::InvalidHeader("分块边长为 0".into()));
    }
    let header = GridHeader {
        version: TFGR_VERSION,
        geometry: *grid.geometry(),
        nodata: grid.nodata(),
        crs: grid.crs().clone(),
        tile_size: options.tile_size,
        predictor: options.predictor,
    };

    let cols = grid.cols();
    let payloads: Vec<Vec<u8>> = (0..header.tile_count())
        .into_par_iter()
        .map(|tile| {
            let (c0, r0, w, h) = header.tile_window(tile);
            let mut raw = Vec::with_capacity(4 * w * h);
            for r in r0..r0 + h {
                let start = r * cols + c0;
                predict_row(&grid.data()[start..start + w], &mut raw);
            }
            zstd::encode_all(&raw[..], options.compression_level)
                .map_err(|e| IoError::Compression(e.to_string()))
        })
        .collect::<IoResult<_>>()?;

    let head = header.encode();
    let body_len: usize = payloads.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(16 + head.len() + DIRECTORY_ENTRY_LEN * payloads.len() + body_len);
    out.extend_from_slice(TFGR_MAGIC);
    out.extend_from_slice(&TFGR_VERSION.to_le_bytes());
    out.extend_from_slice(&(head.len() as u32).to_le_bytes());
    out.extend_from_slice(&head);
    out.extend_from_slice(&compute_crc32(&head).to_le_bytes());
    for p in &payloads {
        out.extend_from_slice(&(p.len() as u64).to_le_bytes());
        out.extend_from_slice(&compute_crc32(p).to_le_bytes());
    }
    for p in &payloads {
        out.extend_from_slice(p);
    }

    debug!(
        cells = grid.len(),
        tiles = payloads.len(),
        raw_bytes = grid.len() * 4,
        encoded_bytes = out.len(),
        "TFGR 编码完成"
    );
    Ok(out)
}

/// 解析并校验容器头，返回头部和剩余字节
fn parse_header(bytes: &[u8]) -> IoResult<(GridHeader, &[u8])> {
    let mut r = Cursor::new(bytes, "preamble");
    let magic = r.array::<4>()?;
    if &magic != TFGR_MAGIC {
        return Err(IoError::BadMagic { found: magic });
    }
    let version = r.u32()?;
    if version != TFGR_VERSION {
        return Err(IoError::UnsupportedVersion {
            found: version,
            supported: TFGR_VERSION,
        });
    }
    let head_len = r.u32()? as usize;
    if head_len > MAX_HEADER_LEN {
        return Err(IoError::InvalidHeader(format!("头部长度异常: {head_len}")));
    }
    let head = r.take(head_len)?;
    let stored = r.u32()?;
    let computed = compute_crc32(head);
    if stored != computed {
        return Err(IoError::ChecksumMismatch {
            section: "header".into(),
            expected: stored,
            found: computed,
        });
    }
    Ok((GridHeader::decode(version, head)?, r.rest()))
}

/// 只读取容器头
pub fn decode_header(bytes: &[u8]) -> IoResult<GridHeader> {
    parse_header(bytes).map(|(h, _)| h)
}

/// 从 TFGR 字节解码栅格
///
/// # Errors
///
/// 容器任何部分不一致时返回对应的损坏错误（可转换为 `CorruptPayload`）。
pub fn decode(bytes: &[u8]) -> IoResult<Grid> {
    let (header, rest) = parse_header(bytes)?;
    let n_tiles = header.tile_count();
    let dir_len = n_tiles.saturating_mul(DIRECTORY_ENTRY_LEN);
    if dir_len > rest.len() {
        return Err(IoError::Truncated {
            context: "tile directory",
            needed: dir_len,
            available: rest.len(),
        });
    }

    let mut r = Cursor::new(rest, "tile directory");
    let mut directory = Vec::with_capacity(n_tiles);
    for _ in 0..n_tiles {
        let len = usize::try_from(r.u64()?).map_err(|_| IoError::InvalidHeader("分块长度溢出".into()))?;
        let crc = r.u32()?;
        directory.push((len, crc));
    }

    let mut payload_cursor = Cursor::new(r.rest(), "tile payload");
    let mut payloads = Vec::with_capacity(n_tiles);
    for &(len, crc) in &directory {
        payloads.push((payload_cursor.take(len)?, crc));
    }
    if !payload_cursor.is_empty() {
        return Err(IoError::InvalidHeader(format!(
            "分块之后存在 {} 个多余字节",
            payload_cursor.rest().len()
        )));
    }

    let tiles: Vec<Vec<f32>> = payloads
        .par_iter()
        .enumerate()
        .map(|(tile, &(payload, stored))| {
            let computed = compute_crc32(payload);
            if computed != stored {
                return Err(IoError::ChecksumMismatch {
                    section: format!("tile {tile}"),
                    expected: stored,
                    found: computed,
                });
            }
            let mut raw = zstd::decode_all(payload).map_err(|e| IoError::Decompression {
                tile,
                message: e.to_string(),
            })?;
            let (_, _, w, h) = header.tile_window(tile);
            if raw.len() != 4 * w * h {
                return Err(IoError::TileLength {
                    tile,
                    expected: 4 * w * h,
                    actual: raw.len(),
                });
            }
            let mut values = Vec::with_capacity(w * h);
            for row in raw.chunks_mut(4 * w) {
                unpredict_row(row, &mut values);
            }
            Ok(values)
        })
        .collect::<IoResult<_>>()?;

    let cols = header.geometry.cols;
    let mut data = vec![header.nodata; header.geometry.len()];
    for (tile, values) in tiles.iter().enumerate() {
        let (c0, r0, w, _) = header.tile_window(tile);
        for (i, line) in values.chunks(w).enumerate() {
            let start = (r0 + i) * cols + c0;
            data[start..start + w].copy_from_slice(line);
        }
    }

    Ok(Grid::from_data(header.geometry, header.nodata, header.crs, data)?)
}

/// 原子写入：先写临时文件，成功后重命名
///
/// # Errors
///
/// 编码或文件系统错误。
pub fn write_grid(path: &Path, grid: &Grid, options: &CodecOptions) -> TfResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = encode(grid, options)?;
    let temp_path = temp_path_for(path);
    {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// 读取 TFGR 文件
pub fn read_grid(path: &Path) -> TfResult<Grid> {
    if !path.exists() {
        return Err(tf_foundation::TfError::file_not_found(path));
    }
    let bytes = std::fs::read(path)?;
    Ok(decode(&bytes)?)
}

/// 只读取文件头（不解压分块）
pub fn read_header(path: &Path) -> TfResult<GridHeader> {
    if !path.exists() {
        return Err(tf_foundation::TfError::file_not_found(path));
    }
    let mut file = File::open(path)?;
    let mut preamble = [0u8; 12];
    file.read_exact(&mut preamble)?;
    let head_len = u32::from_le_bytes([preamble[8], preamble[9], preamble[10], preamble[11]]) as usize;
    if head_len > MAX_HEADER_LEN {
        return Err(IoError::InvalidHeader(format!("头部长度异常: {head_len}")).into());
    }
    let mut bytes = preamble.to_vec();
    bytes.resize(12 + head_len + 4, 0);
    file.read_exact(&mut bytes[12..])?;
    Ok(decode_header(&bytes)?)
}

/// 写入时使用的临时路径
pub(crate) fn temp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// 计算 CRC32 校验和（IEEE 多项式）
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    !crc
}

/// 生成 CRC32 查找表（编译期计算）
const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = 0xEDB8_8320 ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC32 查找表
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f32 = -9999.0;

    fn sample(cols: usize, rows: usize) -> Grid {
        let g = GridGeometry::new(345_000.0, 6_512_000.0, 0.5, cols, rows).unwrap();
        Grid::from_fn(g, ND, CrsDefinition::Epsg(32719), |c, r| {
            ((c + r) % 11 != 0).then(|| 1180.0 + c as f32 * 0.013 - r as f32 * 0.007)
        })
        .unwrap()
    }

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_predictor_round_trip() {
        let values = [1.5f32, -9999.0, 1200.25, 0.0, -0.0, f32::MIN_POSITIVE];
        let mut bytes = Vec::new();
        predict_row(&values, &mut bytes);
        let mut back = Vec::new();
        unpredict_row(&mut bytes, &mut back);
        for (a, b) in values.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_round_trip_with_partial_tiles() {
        let grid = sample(37, 23);
        let opts = CodecOptions {
            tile_size: 16,
            ..CodecOptions::default()
        };
        let bytes = encode(&grid, &opts).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back.geometry(), grid.geometry());
        assert_eq!(back.crs(), grid.crs());
        assert_eq!(back.nodata().to_bits(), grid.nodata().to_bits());
        let same = grid
            .data()
            .iter()
            .zip(back.data())
            .all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same);
    }

    #[test]
    fn test_smooth_surface_compresses() {
        let grid = sample(256, 256);
        let bytes = encode(&grid, &CodecOptions::default()).unwrap();
        assert!(bytes.len() < grid.len() * 3);
    }

    #[test]
    fn test_header_only() {
        let grid = sample(5, 4);
        let bytes = encode(&grid, &CodecOptions::default()).unwrap();
        let h = decode_header(&bytes).unwrap();
        assert_eq!(h.geometry, *grid.geometry());
        assert_eq!(h.tile_count(), 1);
        assert_eq!(h.crs, CrsDefinition::Epsg(32719));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let grid = sample(5, 4);
        let mut bytes = encode(&grid, &CodecOptions::default()).unwrap();
        let mut wrong = bytes.clone();
        wrong[0] = b'X';
        assert!(matches!(decode(&wrong), Err(IoError::BadMagic { .. })));
        bytes[4] = 9;
        assert!(matches!(decode(&bytes), Err(IoError::UnsupportedVersion { found: 9, .. })));
    }

    #[test]
    fn test_truncated_and_trailing_bytes() {
        let grid = sample(20, 20);
        let bytes = encode(&grid, &CodecOptions::default()).unwrap();
        let short = &bytes[..bytes.len() - 3];
        assert!(decode(short).unwrap_err().is_corruption());
        let mut long = bytes.clone();
        long.push(0);
        assert!(decode(&long).unwrap_err().is_corruption());
    }

    #[test]
    fn test_temp_path() {
        let p = temp_path_for(Path::new("/data/mp/mp_20240105.tfgr"));
        assert_eq!(p, Path::new("/data/mp/mp_20240105.tfgr.tmp"));
    }
}
