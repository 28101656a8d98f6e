// crates/tf_geo/src/crs.rs
//! 坐标参考系统 (CRS) 定义和解析
//!
//! 本引擎不做任何重投影：CRS 只用于判断两个栅格能否直接比较。
//! 支持 EPSG 代码、PROJ4 字符串和 WKT 格式。
//!
//! # 示例
//!
//! ```
//! use tf_geo::crs::CrsDefinition;
//!
//! let a = CrsDefinition::parse("EPSG:32719").unwrap();
//! let b = CrsDefinition::parse("epsg:32719").unwrap();
//! assert!(a.is_compatible(&b));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tf_foundation::error::{TfError, TfResult};

/// CRS 定义类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsDefinition {
    /// EPSG 代码（如 32719 = WGS84 / UTM 19S）
    Epsg(u32),
    /// PROJ4 字符串
    Proj4(String),
    /// WKT 格式
    Wkt(String),
}

impl CrsDefinition {
    /// 从文本解析 CRS 定义
    ///
    /// - `EPSG:xxxx`（大小写不敏感）→ [`CrsDefinition::Epsg`]
    /// - 以 `+proj=` 开头 → [`CrsDefinition::Proj4`]
    /// - 其他非空文本 → [`CrsDefinition::Wkt`]
    ///
    /// # Errors
    ///
    /// 空字符串或无法解析的 EPSG 代码返回 `InvalidInput`。
    pub fn parse(text: &str) -> TfResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TfError::invalid_input("CRS 定义为空"));
        }

        if let Some(code) = trimmed
            .get(..5)
            .filter(|p| p.eq_ignore_ascii_case("epsg:"))
            .map(|_| &trimmed[5..])
        {
            let code = code
                .trim()
                .parse::<u32>()
                .map_err(|_| TfError::invalid_input(format!("无效的 EPSG 代码: {trimmed}")))?;
            return Ok(Self::Epsg(code));
        }

        if trimmed.starts_with("+proj=") {
            return Ok(Self::Proj4(normalize_whitespace(trimmed)));
        }

        Ok(Self::Wkt(trimmed.to_string()))
    }

    /// UTM 区域投影
    ///
    /// # Arguments
    /// - `zone`: 1-60
    /// - `north`: true = 北半球, false = 南半球
    #[must_use]
    pub fn utm_zone(zone: u8, north: bool) -> Self {
        let code = if north {
            32600 + u32::from(zone)
        } else {
            32700 + u32::from(zone)
        };
        CrsDefinition::Epsg(code)
    }

    /// 转换为可存储的文本形式（`parse` 的逆操作）
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            CrsDefinition::Epsg(code) => format!("EPSG:{code}"),
            CrsDefinition::Proj4(s) | CrsDefinition::Wkt(s) => s.clone(),
        }
    }

    /// 两个 CRS 是否可以直接比较（无需重投影）
    ///
    /// 判断是严格的：不同表示形式（EPSG 与 WKT）即使语义相同也视为不兼容，
    /// 由调用方在入库前统一表示。
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Epsg(a), Self::Epsg(b)) => a == b,
            (Self::Proj4(a), Self::Proj4(b)) => normalize_whitespace(a) == normalize_whitespace(b),
            (Self::Wkt(a), Self::Wkt(b)) => a.trim() == b.trim(),
            _ => false,
        }
    }
}

impl fmt::Display for CrsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
