//! 数学ユーティリティモジュール
//!
//! 物理ワールド（ラジアン）とレンダリング層（度数法）の間の変換関数が含まれています。

use std::f32::consts::PI;

/// 度数法からラジアンに変換
///
/// # 引数
///
/// * `degrees` - 度数法の角度
///
/// # 戻り値
///
/// * ラジアン角
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * PI / 180.0
}

/// ラジアンから度数法に変換
///
/// # 引数
///
/// * `radians` - ラジアン角
///
/// # 戻り値
///
/// * 度数法の角度
pub fn radians_to_degrees(radians: f32) -> f32 {
    radians * 180.0 / PI
}

/// 基準点からの差分を計算
pub fn offset_from(current: (f32, f32), origin: (f32, f32)) -> (f32, f32) {
    (current.0 - origin.0, current.1 - origin.1)
}
