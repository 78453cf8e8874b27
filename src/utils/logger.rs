//! ロギングユーティリティモジュール
//!
//! このモジュールには、物理レイヤーのロギング設定が含まれています。
//! WebAssemblyからブラウザのコンソールへのログ出力は`wasm_logger`が担当し、
//! ここではログレベルの解釈と初期化だけを行います。

use std::sync::Once;

use serde::Deserialize;

static LOGGER_INIT: Once = Once::new();

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// デバッグ情報（詳細な情報）
    Debug,
    /// 情報（一般的な情報）
    Info,
    /// 警告（潜在的な問題）
    #[serde(alias = "warn")]
    Warning,
    /// エラー（実行を妨げる問題）
    Error,
}

impl LogLevel {
    /// `log`クレートのレベルに変換
    pub fn to_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// ロギング初期化
///
/// 2回目以降の呼び出しではロガーを差し替えず、最小レベルだけを更新します。
/// 出力の絞り込みは`log::set_max_level`で行うため、ロガー自体は全レベルを受け付けます。
pub fn init_logging(min_level: LogLevel) {
    LOGGER_INIT.call_once(|| {
        wasm_logger::init(wasm_logger::Config::new(log::Level::Trace));
    });
    set_log_level(min_level);
    log::info!("ロガーが初期化されました (最小レベル: {:?})", min_level);
}

/// 最小ログレベルを変更
pub fn set_log_level(min_level: LogLevel) {
    log::set_max_level(min_level.to_level().to_level_filter());
}
