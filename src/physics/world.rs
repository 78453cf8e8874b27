//! シミュレーションワールド
//!
//! rapier2dのパイプライン一式をまとめ、剛体の生成・変更・削除と
//! 固定ステップでの更新を提供します。物理計算そのものはrapierに委譲します。

use rapier2d::prelude::*;

use super::material::{BodyMaterial, CollisionGroups};
use crate::geometry::ColliderShape;

/// 剛体ハンドル（レジストリのキー）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// 剛体の現在姿勢
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub x: f32,
    pub y: f32,
    /// 回転（ラジアン）
    pub rotation: f32,
}

/// 剛体とコライダーの生成記述子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDescriptor {
    /// 中心位置（スクリーン座標）
    pub position: (f32, f32),
    /// 初期回転（ラジアン）
    pub rotation: f32,
    pub shape: ColliderShape,
    pub material: BodyMaterial,
    pub collision_groups: CollisionGroups,
}

impl ColliderShape {
    fn to_builder(&self) -> ColliderBuilder {
        match *self {
            ColliderShape::Rectangle {
                half_width,
                half_height,
            } => ColliderBuilder::cuboid(half_width, half_height),
            ColliderShape::RoundedRectangle {
                half_width,
                half_height,
                radius,
            } => ColliderBuilder::round_cuboid(half_width, half_height, radius),
        }
    }
}

/// 物理ワールド
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    /// 重力を指定して作成（ステップ幅は1/60秒）
    pub fn new(gravity: (f32, f32)) -> Self {
        Self {
            gravity: vector![gravity.0, gravity.1],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// 重力を取得
    pub fn gravity(&self) -> (f32, f32) {
        (self.gravity.x, self.gravity.y)
    }

    /// 重力を設定
    pub fn set_gravity(&mut self, gravity: (f32, f32)) {
        self.gravity = vector![gravity.0, gravity.1];
    }

    /// 剛体とコライダーを生成
    ///
    /// スリープは無効、CCDは有効で生成されます。
    pub fn create(&mut self, desc: &BodyDescriptor, immobile: bool) -> BodyHandle {
        let body_type = if immobile {
            RigidBodyType::Fixed
        } else {
            RigidBodyType::Dynamic
        };

        let rigid_body = RigidBodyBuilder::new(body_type)
            .translation(vector![desc.position.0, desc.position.1])
            .rotation(desc.rotation)
            .can_sleep(false)
            .ccd_enabled(true)
            .build();
        let body_handle = self.bodies.insert(rigid_body);

        let material = &desc.material;
        let collider = desc
            .shape
            .to_builder()
            .mass(material.mass)
            .friction(material.friction)
            .friction_combine_rule(material.friction_combine_rule.to_rapier())
            .restitution(material.restitution)
            .restitution_combine_rule(material.restitution_combine_rule.to_rapier())
            .collision_groups(desc.collision_groups.to_rapier())
            .build();
        self.colliders
            .insert_with_parent(collider, body_handle, &mut self.bodies);

        BodyHandle(body_handle)
    }

    /// 剛体の種類をその場で切り替える
    ///
    /// # 戻り値
    ///
    /// * 剛体が存在した場合はtrue
    pub fn set_mobility(&mut self, handle: BodyHandle, mobile: bool) -> bool {
        let Some(rigid_body) = self.bodies.get_mut(handle.0) else {
            return false;
        };

        let body_type = if mobile {
            RigidBodyType::Dynamic
        } else {
            RigidBodyType::Fixed
        };
        rigid_body.set_body_type(body_type, true);
        true
    }

    /// 剛体と付属コライダーを削除
    pub fn destroy(&mut self, handle: BodyHandle) -> bool {
        self.bodies
            .remove(
                handle.0,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    /// マテリアルを再生成なしで更新
    pub fn set_properties(&mut self, handle: BodyHandle, material: &BodyMaterial) -> bool {
        let Some(collider_handles) = self.collider_handles(handle) else {
            return false;
        };

        for collider_handle in collider_handles {
            if let Some(collider) = self.colliders.get_mut(collider_handle) {
                collider.set_mass(material.mass);
                collider.set_friction(material.friction);
                collider.set_friction_combine_rule(material.friction_combine_rule.to_rapier());
                collider.set_restitution(material.restitution);
                collider.set_restitution_combine_rule(material.restitution_combine_rule.to_rapier());
            }
        }
        true
    }

    /// 衝突グループを更新
    pub fn set_collision_groups(&mut self, handle: BodyHandle, groups: CollisionGroups) -> bool {
        let Some(collider_handles) = self.collider_handles(handle) else {
            return false;
        };

        for collider_handle in collider_handles {
            if let Some(collider) = self.colliders.get_mut(collider_handle) {
                collider.set_collision_groups(groups.to_rapier());
            }
        }
        true
    }

    /// 1ステップ進める
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// 剛体の現在姿勢
    pub fn pose(&self, handle: BodyHandle) -> Option<BodyPose> {
        self.bodies.get(handle.0).map(|rigid_body| {
            let translation = rigid_body.translation();
            BodyPose {
                x: translation.x,
                y: translation.y,
                rotation: rigid_body.rotation().angle(),
            }
        })
    }

    /// 動的剛体かどうか（存在しなければ`None`）
    pub fn is_dynamic(&self, handle: BodyHandle) -> Option<bool> {
        self.bodies.get(handle.0).map(|rigid_body| rigid_body.is_dynamic())
    }

    /// 剛体が存在するかどうか
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    /// 剛体の数
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// コライダーの数
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// すべての剛体を破棄する（重力は維持）
    ///
    /// 剛体は1つずつ削除するため、破棄前のハンドルが以後の剛体と一致することはありません。
    pub fn clear(&mut self) {
        let handles: Vec<RigidBodyHandle> = self.bodies.iter().map(|(handle, _)| handle).collect();
        for handle in handles {
            self.bodies.remove(
                handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    /// 剛体に付属するコライダー（検証用）
    #[cfg(test)]
    pub(crate) fn collider_of(&self, handle: BodyHandle) -> Option<&Collider> {
        let collider_handle = *self.bodies.get(handle.0)?.colliders().first()?;
        self.colliders.get(collider_handle)
    }

    fn collider_handles(&self, handle: BodyHandle) -> Option<Vec<ColliderHandle>> {
        self.bodies
            .get(handle.0)
            .map(|rigid_body| rigid_body.colliders().to_vec())
    }
}
