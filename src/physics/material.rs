//! 剛体の物理特性
//!
//! 質量・摩擦・反発係数、その合成ルール、衝突グループを定義します。

use rapier2d::prelude::{CoefficientCombineRule, Group, InteractionGroups};
use serde::Deserialize;

/// 剛体の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// 固定（無限質量、動かない）
    Fixed,
    /// 動的（重力・衝突の影響を受ける）
    Dynamic,
}

impl Default for BodyType {
    fn default() -> Self {
        BodyType::Fixed
    }
}

/// 2物体間で係数を合成するルール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineRule {
    /// 平均
    Average,
    /// 最小値
    #[serde(alias = "min")]
    Minimum,
    /// 積
    Multiply,
    /// 最大値
    #[serde(alias = "max")]
    Maximum,
}

impl CombineRule {
    pub(crate) fn to_rapier(self) -> CoefficientCombineRule {
        match self {
            CombineRule::Average => CoefficientCombineRule::Average,
            CombineRule::Minimum => CoefficientCombineRule::Min,
            CombineRule::Multiply => CoefficientCombineRule::Multiply,
            CombineRule::Maximum => CoefficientCombineRule::Max,
        }
    }
}

impl Default for CombineRule {
    fn default() -> Self {
        CombineRule::Average
    }
}

/// 剛体の物理マテリアル
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BodyMaterial {
    /// 質量
    pub mass: f32,
    /// 摩擦係数
    pub friction: f32,
    pub friction_combine_rule: CombineRule,
    /// 反発係数
    pub restitution: f32,
    pub restitution_combine_rule: CombineRule,
}

impl Default for BodyMaterial {
    fn default() -> Self {
        Self {
            mass: 10.0,
            friction: 0.5,
            friction_combine_rule: CombineRule::Average,
            restitution: 0.5,
            restitution_combine_rule: CombineRule::Average,
        }
    }
}

/// 衝突グループのビットマスク
///
/// 上位16ビットが所属グループ、下位16ビットが衝突相手のフィルタです。
/// 2物体は互いの所属がお互いのフィルタに含まれるときだけ衝突します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionGroups(pub u32);

impl CollisionGroups {
    /// ページ端の見えない壁: すべてと衝突
    pub const BOUNDARY: CollisionGroups = CollisionGroups(0x0001_000F);
    /// タイル: 壁・タイル・ラベルと衝突
    pub const TILE: CollisionGroups = CollisionGroups(0x0002_0007);
    /// ラベル: タイル・ラベルと衝突し、壁はすり抜ける
    pub const LABEL: CollisionGroups = CollisionGroups(0x0004_0006);

    /// 所属グループ
    pub fn memberships(&self) -> u32 {
        self.0 >> 16
    }

    /// 衝突相手のフィルタ
    pub fn filter(&self) -> u32 {
        self.0 & 0xFFFF
    }

    /// 2つのグループが衝突するかどうか
    #[cfg(test)]
    pub fn interacts_with(&self, other: &CollisionGroups) -> bool {
        (self.memberships() & other.filter()) != 0 && (other.memberships() & self.filter()) != 0
    }

    pub(crate) fn to_rapier(self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.memberships()),
            Group::from_bits_truncate(self.filter()),
        )
    }
}

/// 剛体の用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Boundary,
    Tile,
    Label,
}

impl BodyKind {
    /// 用途ごとの衝突グループ
    pub fn collision_groups(self) -> CollisionGroups {
        match self {
            BodyKind::Boundary => CollisionGroups::BOUNDARY,
            BodyKind::Tile => CollisionGroups::TILE,
            BodyKind::Label => CollisionGroups::LABEL,
        }
    }
}
