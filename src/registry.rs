//! 剛体レジストリ
//!
//! 剛体ハンドルから剛体レコード（要素ID・出力バインディング・元の位置）への対応表です。
//! 寿命は1つのシミュレーションワールドと同じです。

use std::collections::HashMap;

use crate::bindings::OutputBindings;
use crate::physics::{BodyHandle, BodyPose};
use crate::utils::{offset_from, radians_to_degrees, CancellationToken, ElementId, TimerId};

/// 生成時に記録した元の中心位置（以後変更されない）
///
/// 回転は差分ではなく絶対値で出力するため、位置だけを保持します。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginalPosition {
    pub x: f32,
    pub y: f32,
}

/// 未発火の遅延アクティベーション
#[derive(Debug, Clone)]
pub struct PendingActivation {
    pub timer: TimerId,
    pub token: CancellationToken,
}

impl PendingActivation {
    /// トークンを取り消す（タイマー本体の取り消しは呼び出し側で行う）
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// 剛体レコード
#[derive(Debug)]
pub struct BodyRecord {
    pub handle: BodyHandle,
    /// 駆動対象の要素（所有しない）
    pub element: ElementId,
    pub bindings: OutputBindings,
    pub original: OriginalPosition,
    pub activation: Option<PendingActivation>,
}

impl BodyRecord {
    pub fn new(
        handle: BodyHandle,
        element: ElementId,
        bindings: OutputBindings,
        original: OriginalPosition,
    ) -> Self {
        Self {
            handle,
            element,
            bindings,
            original,
            activation: None,
        }
    }

    /// 現在姿勢から出力値 (xオフセット, yオフセット, 絶対回転[度]) を計算
    pub fn output_for(&self, pose: &BodyPose) -> (f32, f32, f32) {
        let (dx, dy) = offset_from((pose.x, pose.y), (self.original.x, self.original.y));
        (dx, dy, radians_to_degrees(pose.rotation))
    }
}

/// 剛体レジストリ
#[derive(Debug, Default)]
pub struct BodyRegistry {
    records: HashMap<BodyHandle, BodyRecord>,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// レコードを登録（同じハンドルの既存レコードは置き換え）
    pub fn insert(&mut self, record: BodyRecord) -> Option<BodyRecord> {
        self.records.insert(record.handle, record)
    }

    /// レコードを削除
    pub fn remove(&mut self, handle: BodyHandle) -> Option<BodyRecord> {
        self.records.remove(&handle)
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&BodyRecord> {
        self.records.get(&handle)
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut BodyRecord> {
        self.records.get_mut(&handle)
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.records.contains_key(&handle)
    }

    /// ハンドルのレコードが指定要素のものかどうか
    pub fn is_owned_by(&self, handle: BodyHandle, element: ElementId) -> bool {
        self.records
            .get(&handle)
            .map_or(false, |record| record.element == element)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BodyRecord> {
        self.records.values()
    }

    /// 指定要素に紐づくレコード数
    #[cfg(test)]
    pub fn count_for_element(&self, element: ElementId) -> usize {
        self.records.values().filter(|record| record.element == element).count()
    }

    /// すべてのレコードを取り出す
    pub fn drain(&mut self) -> Vec<BodyRecord> {
        self.records.drain().map(|(_, record)| record).collect()
    }
}
