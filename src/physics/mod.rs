//! 物理システムモジュール
//!
//! このモジュールは、タイルの剛体シミュレーションを担当します。
//! 物理計算はrapier2dに委譲し、ここでは剛体の生成・特性変更・削除と
//! ステップ実行の窓口だけを提供します。

pub mod material;
pub mod world;

pub use material::{BodyKind, BodyMaterial, BodyType, CollisionGroups, CombineRule};
pub use world::{BodyDescriptor, BodyHandle, BodyPose, PhysicsWorld};
