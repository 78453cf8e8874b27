//! ユーティリティモジュール
//!
//! このモジュールには、物理レイヤー全体で使用される一般的なユーティリティ関数や構造体が含まれています。

pub mod id_generator;
pub mod logger;
pub mod math;
pub mod time;

// サブモジュールの再エクスポート
pub use id_generator::*;
pub use logger::*;
pub use math::*;
pub use time::*;
