// 该文件是 Subwindow （子窗口搜索） 项目的一部分。
// src/oracle.rs - 外部最大化搜索的数值接口
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! 搜索库只认固定布局的缓冲区：坐标、聚类编号和权重均为 `f64` 数组，
//! 真值框压平为 `[left, top, right, bottom, score]` 五元组。
//! 所有打包逻辑都集中在本模块，其余代码不依赖缓冲区布局。

use std::{error::Error as StdError, time::Duration};

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::ModelConfig,
  feature::{FeatureError, clip_cluster, warn_clipped},
  geometry::BBox,
  image::PointCloud,
  label::Label,
  loss::LossKind,
};

mod exhaustive;
pub use self::exhaustive::ExhaustiveOracle;

mod timeout;
pub use self::timeout::TimeoutOracle;

#[cfg(feature = "libess")]
mod ess;
#[cfg(feature = "libess")]
pub use self::ess::EssOracle;

/// 每个真值框在扁平数组中占用的字段数
pub const BOX_FIELDS: usize = 5;

/// 与搜索库中 `Box` 结构体内存布局一致的返回值
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct RawBox {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
  pub score: f64,
}

impl From<RawBox> for BBox {
  fn from(raw: RawBox) -> Self {
    BBox::new(raw.left, raw.top, raw.right, raw.bottom).with_score(raw.score)
  }
}

impl From<BBox> for RawBox {
  fn from(bbox: BBox) -> Self {
    RawBox {
      left: bbox.left,
      top: bbox.top,
      right: bbox.right,
      bottom: bbox.bottom,
      score: bbox.score,
    }
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum PackingError {
  #[error("真值数组长度 {0} 不是 5 的倍数")]
  RaggedBoxes(usize),
  #[error("真值框个数 {count} 与数组中的 {packed} 个五元组不符")]
  CountMismatch { count: i32, packed: usize },
  #[error("点坐标数组长度不一致: x={x}, y={y}, c={c}")]
  PointLength { x: usize, y: usize, c: usize },
  #[error("权重向量长度不匹配: 期望 {expected}, 实际 {actual}")]
  WeightLength { expected: usize, actual: usize },
  #[error("点数 {0} 超出 C int 范围")]
  TooManyPoints(usize),
}

#[derive(Error, Debug)]
pub enum OracleError {
  #[error("搜索库不可用: {0}")]
  Unavailable(String),
  #[error("搜索超时: {0:?}")]
  Timeout(Duration),
  #[error("搜索线程异常退出")]
  WorkerPanicked,
  #[error("无法启动搜索线程: {0}")]
  Spawn(#[from] std::io::Error),
  #[error("候选框数量 {count} 超出上限 {limit}")]
  TooManyCandidates { count: u128, limit: u128 },
  #[error("请求无效: {0}")]
  Packing(#[from] PackingError),
  #[error("搜索失败: {0}")]
  Backend(Box<dyn StdError + Send + Sync>),
  #[error("搜索方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("URL 参数无效: {0}")]
  InvalidParameter(String),
  #[error("返回值违反约定: {0}")]
  InvalidResult(String),
}

/// 损失增强的最大化搜索：`argmax_y w·psi(x, y) + Delta(y*, y)`
///
/// 实现只需满足数值约定，返回得分最高的框，`score` 为该框的目标值。
pub trait InferenceOracle {
  type Error: StdError + Send + Sync + 'static;

  fn search(&self, request: &OracleRequest) -> Result<RawBox, Self::Error>;

  /// 搜索内部使用的损失形式；外部库只实现了 `1 - overlap`
  fn supports_loss(&self, kind: LossKind) -> bool {
    kind == LossKind::OneMinusOverlap
  }
}

impl<O: InferenceOracle + ?Sized> InferenceOracle for &O {
  type Error = O::Error;

  fn search(&self, request: &OracleRequest) -> Result<RawBox, Self::Error> {
    (**self).search(request)
  }

  fn supports_loss(&self, kind: LossKind) -> bool {
    (**self).supports_loss(kind)
  }
}

/// 把标签压平为搜索库使用的五元组数组
pub fn pack_ground_truth(label: &Label) -> Vec<f64> {
  label
    .to_signed()
    .iter()
    .flat_map(|b| {
      [
        b.left as f64,
        b.top as f64,
        b.right as f64,
        b.bottom as f64,
        b.score,
      ]
    })
    .collect()
}

/// 真值框个数：只有第一个框分数为正时才等于五元组总数，否则为 0
///
/// 搜索库不支持正负混合的列表。
pub fn genuine_count(packed: &[f64]) -> Result<i32, PackingError> {
  if packed.len() % BOX_FIELDS != 0 {
    return Err(PackingError::RaggedBoxes(packed.len()));
  }
  match packed.get(BOX_FIELDS - 1) {
    Some(&score) if score > 0.0 => {
      i32::try_from(packed.len() / BOX_FIELDS).map_err(|_| PackingError::CountMismatch {
        count: i32::MAX,
        packed: packed.len() / BOX_FIELDS,
      })
    }
    _ => Ok(0),
  }
}

/// 按数值约定打包好的一次搜索请求，所有缓冲区连续且为定长数值类型
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
  pub width: i32,
  pub height: i32,
  pub x: Vec<f64>,
  pub y: Vec<f64>,
  pub c: Vec<f64>,
  pub numbins: i32,
  pub numlevels: i32,
  pub weights: Vec<f64>,
  pub gt_count: i32,
  pub gt_boxes: Vec<f64>,
}

impl OracleRequest {
  pub fn new(
    image: &PointCloud,
    weights: &[f64],
    label: &Label,
    config: &ModelConfig,
  ) -> Result<Self, RequestError> {
    let numbins = config.numbins();
    if weights.len() != config.size_psi() {
      return Err(
        PackingError::WeightLength {
          expected: config.size_psi(),
          actual: weights.len(),
        }
        .into(),
      );
    }

    // 搜索覆盖整幅图像，因此任何一个点越界都按配置处理
    let mut clipped = 0usize;
    let mut c = Vec::with_capacity(image.len());
    for &cluster in image.clusters() {
      let (bin, was_clipped) = clip_cluster(cluster, config)?;
      c.push(bin as f64);
      clipped += usize::from(was_clipped);
    }
    warn_clipped(image, clipped, numbins);

    let gt_boxes = pack_ground_truth(label);
    let gt_count = genuine_count(&gt_boxes)?;

    let request = Self {
      width: image.width(),
      height: image.height(),
      x: image.xs().iter().map(|&v| v as f64).collect(),
      y: image.ys().iter().map(|&v| v as f64).collect(),
      c,
      numbins: numbins as i32,
      numlevels: config.numlevels() as i32,
      weights: weights.to_vec(),
      gt_count,
      gt_boxes,
    };
    request.validate()?;
    Ok(request)
  }

  pub fn point_count(&self) -> i32 {
    self.x.len() as i32
  }

  /// 检查缓冲区长度是否满足数值约定
  pub fn validate(&self) -> Result<(), PackingError> {
    if self.x.len() != self.y.len() || self.x.len() != self.c.len() {
      return Err(PackingError::PointLength {
        x: self.x.len(),
        y: self.y.len(),
        c: self.c.len(),
      });
    }
    if i32::try_from(self.x.len()).is_err() {
      return Err(PackingError::TooManyPoints(self.x.len()));
    }
    if self.weights.len() != self.numbins.max(0) as usize {
      return Err(PackingError::WeightLength {
        expected: self.numbins.max(0) as usize,
        actual: self.weights.len(),
      });
    }
    if self.gt_boxes.len() % BOX_FIELDS != 0 {
      return Err(PackingError::RaggedBoxes(self.gt_boxes.len()));
    }
    let packed = self.gt_boxes.len() / BOX_FIELDS;
    if self.gt_count != 0 && self.gt_count as usize != packed {
      return Err(PackingError::CountMismatch {
        count: self.gt_count,
        packed,
      });
    }
    Ok(())
  }

  /// 搜索库实际看到的真值框，即前 `gt_count` 个五元组
  pub fn ground_truth(&self) -> Vec<BBox> {
    self
      .gt_boxes
      .chunks_exact(BOX_FIELDS)
      .take(self.gt_count.max(0) as usize)
      .map(|q| BBox::new(q[0] as i32, q[1] as i32, q[2] as i32, q[3] as i32).with_score(q[4]))
      .collect()
  }

  /// 搜索库视角下的标签；负样本的 `gt_count` 为 0，因此与 `Unknown` 等价
  pub fn visible_label(&self) -> Label {
    Label::from_signed(&self.ground_truth())
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
  #[error("{0}")]
  Packing(#[from] PackingError),
  #[error("{0}")]
  Feature(#[from] FeatureError),
}

/// 通过 URL 选择搜索实现
///
/// - `exhaustive://`：crate 内的穷举搜索，适合小图和测试
/// - `ess://`：外部分支定界库（需要 `libess` 特性）
///
/// 任一方案都可以追加 `?timeout_ms=N`，为搜索加上超时保护。
pub enum OracleWrapper {
  Exhaustive(ExhaustiveOracle),
  #[cfg(feature = "libess")]
  Ess(EssOracle),
  Guarded(TimeoutOracle<OracleWrapper>),
}

const TIMEOUT_PARAM: &str = "timeout_ms";

impl FromUrl for OracleWrapper {
  type Error = OracleError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let inner = match url.scheme() {
      ExhaustiveOracle::SCHEME => OracleWrapper::Exhaustive(ExhaustiveOracle::from_url(url)?),
      #[cfg(feature = "libess")]
      EssOracle::SCHEME => OracleWrapper::Ess(EssOracle::from_url(url)?),
      #[cfg(not(feature = "libess"))]
      "ess" => {
        return Err(OracleError::Unavailable(
          "编译时未启用 libess 特性".to_string(),
        ));
      }
      other => return Err(OracleError::SchemeMismatch(other.to_string())),
    };

    let timeout = url
      .query_pairs()
      .find(|(k, _)| k == TIMEOUT_PARAM)
      .map(|(_, v)| {
        v.parse::<u64>()
          .map_err(|_| OracleError::InvalidParameter(format!("{}={}", TIMEOUT_PARAM, v)))
      })
      .transpose()?;

    Ok(match timeout {
      Some(ms) => OracleWrapper::Guarded(TimeoutOracle::new(inner, Duration::from_millis(ms))),
      None => inner,
    })
  }
}

impl InferenceOracle for OracleWrapper {
  type Error = OracleError;

  fn search(&self, request: &OracleRequest) -> Result<RawBox, Self::Error> {
    match self {
      OracleWrapper::Exhaustive(oracle) => oracle.search(request),
      #[cfg(feature = "libess")]
      OracleWrapper::Ess(oracle) => oracle.search(request),
      OracleWrapper::Guarded(oracle) => oracle.search(request),
    }
  }

  fn supports_loss(&self, kind: LossKind) -> bool {
    match self {
      OracleWrapper::Exhaustive(oracle) => oracle.supports_loss(kind),
      #[cfg(feature = "libess")]
      OracleWrapper::Ess(oracle) => oracle.supports_loss(kind),
      OracleWrapper::Guarded(oracle) => oracle.supports_loss(kind),
    }
  }
}
