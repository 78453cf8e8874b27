//! 剛体コントローラ
//!
//! 1つの要素から1つの剛体を生成し、その寿命を管理します。
//!
//! 状態遷移は `Uninitialized → Live → Disposed` の一方向のみです。
//!
//! - 初期化はマウント時（既定）または`initialize()`の明示呼び出しで行われます。
//!   画像の読み込み完了を待ってから寸法を測る場合などは後者を使います。
//! - `Live`中の再初期化は何もしません。
//! - 破棄はどの状態からでも安全に呼べます。
//! - セッション終了で剛体が失われた場合は`Uninitialized`に戻り、再初期化できます。
//!   失われた剛体のハンドルで他の要素の剛体に触れることはありません。

use std::fmt;

use serde::Deserialize;
use wasm_bindgen::JsValue;

use crate::bindings::OutputBindings;
use crate::geometry::{extract_geometry, LayoutElement};
use crate::physics::{BodyDescriptor, BodyHandle, BodyKind, BodyMaterial, BodyType, CollisionGroups};
use crate::session::PhysicsSession;
use crate::utils::{degrees_to_radians, ElementId};

/// コントローラのエラー
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// 出力バインディングを受け付けない要素をラップしようとした
    NotAnimatable,
    /// オプションの解析に失敗
    InvalidOptions(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::NotAnimatable => {
                write!(f, "RigidBodyの子要素はtransformを適用できる要素である必要があります")
            }
            ControllerError::InvalidOptions(msg) => write!(f, "剛体オプションの解析エラー: {}", msg),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ControllerError> for JsValue {
    fn from(err: ControllerError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// 剛体の設定
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BodyConfig {
    pub body_type: BodyType,
    /// 動的化までの遅延（ミリ秒）
    pub delay: u32,
    /// 初期回転（度）
    pub initial_rotation: f32,
    #[serde(flatten)]
    pub material: BodyMaterial,
    /// 用途（衝突グループの既定値を決める）
    pub kind: Option<BodyKind>,
    /// 衝突グループの生ビットマスク（指定時は`kind`より優先）
    pub collision_groups: Option<u32>,
    /// マウント時に自動で初期化するか
    pub initialize_on_mount: bool,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            body_type: BodyType::Fixed,
            delay: 0,
            initial_rotation: 0.0,
            material: BodyMaterial::default(),
            kind: None,
            collision_groups: None,
            initialize_on_mount: true,
        }
    }
}

impl BodyConfig {
    /// JSON文字列から読み込む
    pub fn from_json(json: &str) -> Result<Self, ControllerError> {
        serde_json::from_str(json).map_err(|err| ControllerError::InvalidOptions(err.to_string()))
    }

    pub fn dynamic() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn with_initial_rotation(mut self, degrees: f32) -> Self {
        self.initial_rotation = degrees;
        self
    }

    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_material(mut self, material: BodyMaterial) -> Self {
        self.material = material;
        self
    }

    /// 自動初期化を無効にする（`initialize()`を待つ）
    pub fn manual(mut self) -> Self {
        self.initialize_on_mount = false;
        self
    }

    /// 固定状態で生成されるかどうか
    pub fn starts_immobile(&self) -> bool {
        self.body_type == BodyType::Fixed || self.delay > 0
    }

    /// 遅延アクティベーションが必要かどうか
    pub fn has_delayed_activation(&self) -> bool {
        self.body_type == BodyType::Dynamic && self.delay > 0
    }

    /// 実際に使う衝突グループ
    ///
    /// 固定剛体は常に壁のグループになります。
    pub fn collision_groups(&self) -> CollisionGroups {
        if self.body_type == BodyType::Fixed {
            return CollisionGroups::BOUNDARY;
        }
        if let Some(bits) = self.collision_groups {
            return CollisionGroups(bits);
        }
        self.kind.unwrap_or(BodyKind::Tile).collision_groups()
    }
}

/// コントローラの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Live(BodyHandle),
    Disposed,
}

/// 剛体コントローラ
pub struct BodyController<E: LayoutElement> {
    session: PhysicsSession,
    element: E,
    element_id: ElementId,
    config: BodyConfig,
    bindings: OutputBindings,
    state: ControllerState,
}

impl<E: LayoutElement> BodyController<E> {
    /// コントローラを作成
    ///
    /// 要素が出力バインディングを受け付けない場合は構築時にエラーになります。
    pub fn new(session: &PhysicsSession, element: E, config: BodyConfig) -> Result<Self, ControllerError> {
        if !element.accepts_bindings() {
            log::error!("アニメーションできない要素に剛体を設定しようとしました");
            return Err(ControllerError::NotAnimatable);
        }

        let element_id = session.next_element_id();
        let bindings = OutputBindings::new(config.initial_rotation);

        Ok(Self {
            session: session.clone(),
            element,
            element_id,
            config,
            bindings,
            state: ControllerState::Uninitialized,
        })
    }

    /// マウント時の処理（自動初期化が有効なら初期化する）
    pub fn mount(&mut self) -> bool {
        if self.config.initialize_on_mount {
            self.initialize()
        } else {
            false
        }
    }

    /// 剛体を生成する
    ///
    /// # 戻り値
    ///
    /// * 今回の呼び出しで剛体が生成された場合はtrue
    pub fn initialize(&mut self) -> bool {
        let current = self.state;
        match current {
            ControllerState::Live(handle) if self.session.owns(handle, self.element_id) => return false,
            ControllerState::Live(_) => {
                log::debug!("セッション終了で失われた剛体を再生成: {}", self.element_id);
                self.state = ControllerState::Uninitialized;
            }
            ControllerState::Disposed => {
                log::debug!("破棄済みのコントローラの初期化を無視: {}", self.element_id);
                return false;
            }
            ControllerState::Uninitialized => {}
        }

        let Some(geometry) = extract_geometry(&self.element) else {
            log::debug!("要素が未接続のため初期化を見送り: {}", self.element_id);
            return false;
        };

        let desc = BodyDescriptor {
            position: geometry.position,
            rotation: degrees_to_radians(self.config.initial_rotation),
            shape: geometry.shape,
            material: self.config.material,
            collision_groups: self.config.collision_groups(),
        };
        let handle = self.session.spawn(
            self.element_id,
            &desc,
            self.config.starts_immobile(),
            self.bindings.clone(),
        );

        if self.config.has_delayed_activation() {
            self.session.schedule_activation(handle, self.config.delay);
        }

        self.state = ControllerState::Live(handle);
        log::debug!(
            "剛体を生成: {} {:?} at {:?} ({:?})",
            self.element_id,
            geometry.shape,
            geometry.position,
            self.config.body_type
        );
        true
    }

    /// リサイズ通知（未実装）
    pub fn on_resize(&self) {
        log::warn!("onResize not implemented");
    }

    /// マテリアルを更新（`Live`中なら即座に反映）
    pub fn set_material(&mut self, material: BodyMaterial) {
        self.config.material = material;
        if let ControllerState::Live(handle) = self.state {
            self.session.with_owned_body(handle, self.element_id, |world| {
                world.set_properties(handle, &material)
            });
        }
    }

    /// 衝突グループを更新（`Live`中なら即座に反映）
    ///
    /// 固定剛体は壁のグループのままです。
    pub fn set_collision_groups(&mut self, groups: CollisionGroups) {
        self.config.collision_groups = Some(groups.0);
        let effective = self.config.collision_groups();
        if let ControllerState::Live(handle) = self.state {
            self.session.with_owned_body(handle, self.element_id, |world| {
                world.set_collision_groups(handle, effective)
            });
        }
    }

    /// 剛体を破棄する
    pub fn dispose(&mut self) {
        if let ControllerState::Live(handle) = self.state {
            if self.session.release(handle, self.element_id) {
                log::debug!("剛体を破棄: {}", self.element_id);
            }
        }
        self.state = ControllerState::Disposed;
    }

    /// 現在の状態
    ///
    /// セッション終了で剛体が失われていれば`Uninitialized`として扱います。
    pub fn state(&self) -> ControllerState {
        match self.state {
            ControllerState::Live(handle) if !self.session.owns(handle, self.element_id) => {
                ControllerState::Uninitialized
            }
            state => state,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state(), ControllerState::Live(_))
    }

    /// 剛体ハンドル（`Live`中のみ）
    pub fn handle(&self) -> Option<BodyHandle> {
        match self.state() {
            ControllerState::Live(handle) => Some(handle),
            _ => None,
        }
    }

    /// レンダリング層が購読する出力チャンネル
    pub fn bindings(&self) -> &OutputBindings {
        &self.bindings
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn element_id(&self) -> ElementId {
        self.element_id
    }

    pub fn config(&self) -> &BodyConfig {
        &self.config
    }
}

impl<E: LayoutElement> Drop for BodyController<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}
