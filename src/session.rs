//! シミュレーションセッション
//!
//! 物理ワールドと剛体レジストリを1つのセッションにまとめ、
//! 毎フレームの同期ループと遅延アクティベーションを管理します。
//!
//! ## 同期ループ
//!
//! 1ティックごとに次を行います。
//!
//! 1. ワールドを1ステップ進める
//! 2. すべてのレコードについて、元の位置からの差分と回転を出力バインディングに書き込む
//!
//! 書き込みはステップ後の同じ状態から計算され、購読者への通知は
//! セッションの借用を解放してから行われます。

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::bindings::OutputBindings;
use crate::physics::{BodyDescriptor, BodyHandle, BodyPose, PhysicsWorld};
use crate::registry::{BodyRecord, BodyRegistry, PendingActivation};
use crate::utils::{BrowserTimers, CancellationToken, ElementId, IdGenerator, LogLevel, TimerHost};

/// 設定エラー
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// JSONの解析に失敗
    InvalidJson(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidJson(msg) => write!(f, "設定の解析エラー: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for JsValue {
    fn from(err: ConfigError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// 重力設定（未指定の成分は0）
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct GravityConfig {
    pub x: Option<f32>,
    pub y: Option<f32>,
}

impl GravityConfig {
    /// ベクトルに変換
    pub fn resolve(&self) -> (f32, f32) {
        (self.x.unwrap_or(0.0), self.y.unwrap_or(0.0))
    }
}

/// セッション設定
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub gravity: GravityConfig,
    pub log_level: LogLevel,
    /// 生成直後に同期ループを開始するか
    pub auto_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gravity: GravityConfig::default(),
            log_level: LogLevel::Info,
            auto_start: true,
        }
    }
}

impl SessionConfig {
    /// JSON文字列から読み込む
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::InvalidJson(err.to_string()))
    }
}

/// セッション統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// 実行したティック数
    pub ticks: u64,
    /// 発火した遅延アクティベーション数
    pub activations: u32,
}

pub(crate) struct SessionState {
    pub(crate) world: PhysicsWorld,
    pub(crate) registry: BodyRegistry,
    ids: IdGenerator,
    stats: SessionStats,
    loop_running: bool,
    /// ループを開始するたびに増える世代番号（古いループを止めるため）
    loop_generation: u32,
}

/// シミュレーションセッション
///
/// クローンは同じセッションを共有します。シングルスレッド専用です。
#[derive(Clone)]
pub struct PhysicsSession {
    state: Rc<RefCell<SessionState>>,
    timers: Rc<dyn TimerHost>,
}

impl PhysicsSession {
    /// タイマーホストを指定して作成
    pub fn new(config: &SessionConfig, timers: Rc<dyn TimerHost>) -> Self {
        let gravity = config.gravity.resolve();
        log::info!("物理セッション作成: gravity = {:?}", gravity);

        Self {
            state: Rc::new(RefCell::new(SessionState {
                world: PhysicsWorld::new(gravity),
                registry: BodyRegistry::new(),
                ids: IdGenerator::new(),
                stats: SessionStats::default(),
                loop_running: false,
                loop_generation: 0,
            })),
            timers,
        }
    }

    /// ブラウザの`setTimeout`を使うセッションを作成
    pub fn in_browser(config: &SessionConfig) -> Self {
        Self::new(config, Rc::new(BrowserTimers::new()))
    }

    /// 重力を更新
    pub fn set_gravity(&self, gravity: GravityConfig) {
        let resolved = gravity.resolve();
        self.state.borrow_mut().world.set_gravity(resolved);
        log::debug!("重力を更新: {:?}", resolved);
    }

    pub fn gravity(&self) -> (f32, f32) {
        self.state.borrow().world.gravity()
    }

    /// 登録済みの剛体数
    pub fn body_count(&self) -> usize {
        self.state.borrow().registry.len()
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.state.borrow().registry.contains(handle)
    }

    /// 剛体の現在姿勢
    pub fn pose(&self, handle: BodyHandle) -> Option<BodyPose> {
        self.state.borrow().world.pose(handle)
    }

    /// 動的剛体かどうか
    pub fn is_dynamic(&self, handle: BodyHandle) -> Option<bool> {
        self.state.borrow().world.is_dynamic(handle)
    }

    /// 剛体の出力バインディング
    pub fn bindings(&self, handle: BodyHandle) -> Option<OutputBindings> {
        self.state
            .borrow()
            .registry
            .get(handle)
            .map(|record| record.bindings.clone())
    }

    pub fn stats(&self) -> SessionStats {
        self.state.borrow().stats
    }

    /// 同期ループが動作中かどうか
    pub fn is_running(&self) -> bool {
        self.state.borrow().loop_running
    }

    /// 新しい要素IDを発行
    pub fn next_element_id(&self) -> ElementId {
        self.state.borrow().ids.next_element_id()
    }

    /// 同期ループを1ティック進める
    pub fn tick(&self) {
        run_tick(&self.state);
    }

    /// `requestAnimationFrame`で同期ループを開始
    ///
    /// すでに動作中なら何もしません。
    pub fn start_loop(&self) -> Result<(), JsValue> {
        let generation = {
            let mut state = self.state.borrow_mut();
            if state.loop_running {
                return Ok(());
            }
            state.loop_running = true;
            state.loop_generation += 1;
            state.loop_generation
        };

        let weak_state = Rc::downgrade(&self.state);
        let frame: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
        let next_frame = frame.clone();

        *frame.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            let running = weak_state
                .upgrade()
                .map(|state| {
                    let running = {
                        let state = state.borrow();
                        state.loop_running && state.loop_generation == generation
                    };
                    if running {
                        run_tick(&state);
                    }
                    running
                })
                .unwrap_or(false);

            if !running {
                // 自己参照を切ってクロージャを解放する
                next_frame.borrow_mut().take();
                return;
            }

            if let Some(callback) = next_frame.borrow().as_ref() {
                if let Err(err) = request_animation_frame(callback) {
                    log::error!("requestAnimationFrameの登録に失敗: {:?}", err);
                }
            }
        }) as Box<dyn FnMut()>));

        let started = match frame.borrow().as_ref() {
            Some(callback) => request_animation_frame(callback).map(|_| ()),
            None => Ok(()),
        };
        if let Err(err) = started {
            self.state.borrow_mut().loop_running = false;
            frame.borrow_mut().take();
            return Err(err);
        }

        log::info!("同期ループを開始しました");
        Ok(())
    }

    /// セッションを終了
    ///
    /// ループを止め、保留中のアクティベーションを取り消し、すべての剛体を破棄します。
    pub fn shutdown(&self) {
        let records = {
            let mut state = self.state.borrow_mut();
            state.loop_running = false;
            let records = state.registry.drain();
            state.world.clear();
            records
        };

        for record in &records {
            if let Some(activation) = &record.activation {
                activation.cancel();
                self.timers.cancel(activation.timer);
            }
        }
        log::info!("物理セッションを終了しました ({}体を破棄)", records.len());
    }

    /// 剛体を生成してレジストリに登録
    pub(crate) fn spawn(
        &self,
        element: ElementId,
        desc: &BodyDescriptor,
        immobile: bool,
        bindings: OutputBindings,
    ) -> BodyHandle {
        let mut state = self.state.borrow_mut();
        let handle = state.world.create(desc, immobile);
        let original = crate::registry::OriginalPosition {
            x: desc.position.0,
            y: desc.position.1,
        };
        state
            .registry
            .insert(BodyRecord::new(handle, element, bindings, original));
        handle
    }

    /// 遅延後に剛体を動的に切り替えるよう予約
    ///
    /// 発火時に剛体が既に破棄されていれば何もしません。
    pub(crate) fn schedule_activation(&self, handle: BodyHandle, delay_ms: u32) -> bool {
        let token = CancellationToken::new();
        let fire_token = token.clone();
        let weak_state: Weak<RefCell<SessionState>> = Rc::downgrade(&self.state);

        let timer = self.timers.schedule(
            delay_ms,
            Box::new(move || {
                if fire_token.is_cancelled() {
                    return;
                }
                let Some(state) = weak_state.upgrade() else {
                    return;
                };
                activate(&mut state.borrow_mut(), handle);
            }),
        );

        let Some(timer) = timer else {
            log::warn!("遅延アクティベーションを予約できませんでした: {:?}", handle);
            return false;
        };

        let attached = {
            let mut state = self.state.borrow_mut();
            match state.registry.get_mut(handle) {
                Some(record) => {
                    record.activation = Some(PendingActivation {
                        timer,
                        token: token.clone(),
                    });
                    true
                }
                None => false,
            }
        };

        if !attached {
            token.cancel();
            self.timers.cancel(timer);
        }
        attached
    }

    /// ハンドルの剛体が指定要素のものとして登録されているか
    pub fn owns(&self, handle: BodyHandle, element: ElementId) -> bool {
        self.state.borrow().registry.is_owned_by(handle, element)
    }

    /// 指定要素の剛体であればワールドを操作する
    ///
    /// 別の要素の剛体や破棄済みのハンドルでは`None`を返します。
    pub(crate) fn with_owned_body<R>(
        &self,
        handle: BodyHandle,
        element: ElementId,
        f: impl FnOnce(&mut PhysicsWorld) -> R,
    ) -> Option<R> {
        let mut state = self.state.borrow_mut();
        if !state.registry.is_owned_by(handle, element) {
            log::debug!("所有者の異なる剛体への操作を無視: {:?} ({})", handle, element);
            return None;
        }
        Some(f(&mut state.world))
    }

    #[cfg(test)]
    pub(crate) fn with_world<R>(&self, f: impl FnOnce(&mut PhysicsWorld) -> R) -> R {
        f(&mut self.state.borrow_mut().world)
    }

    /// 指定要素の剛体をレジストリとワールドから削除
    ///
    /// 別の要素の剛体や破棄済みのハンドルには何もしません。
    pub(crate) fn release(&self, handle: BodyHandle, element: ElementId) -> bool {
        let record = {
            let mut state = self.state.borrow_mut();
            if !state.registry.is_owned_by(handle, element) {
                return false;
            }
            let record = state.registry.remove(handle);
            state.world.destroy(handle);
            record
        };

        match record {
            Some(record) => {
                if let Some(activation) = record.activation {
                    activation.cancel();
                    self.timers.cancel(activation.timer);
                }
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for PhysicsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("PhysicsSession")
            .field("bodies", &state.registry.len())
            .field("gravity", &state.world.gravity())
            .field("stats", &state.stats)
            .finish()
    }
}

/// 1ティック分の処理
fn run_tick(state: &RefCell<SessionState>) {
    let updates: Vec<(OutputBindings, (f32, f32, f32))> = {
        let mut state = state.borrow_mut();
        state.world.step();
        state.stats.ticks += 1;

        let state = &*state;
        let updates = state
            .registry
            .iter()
            .filter_map(|record| {
                state
                    .world
                    .pose(record.handle)
                    .map(|pose| (record.bindings.clone(), record.output_for(&pose)))
            })
            .collect();
        updates
    };

    for (bindings, (x, y, rotate_z)) in updates {
        bindings.publish(x, y, rotate_z);
    }
}

/// 遅延アクティベーションの発火
fn activate(state: &mut SessionState, handle: BodyHandle) {
    match state.registry.get_mut(handle) {
        Some(record) => record.activation = None,
        None => {
            log::debug!("破棄済みの剛体へのアクティベーションを無視: {:?}", handle);
            return;
        }
    }

    if state.world.set_mobility(handle, true) {
        state.stats.activations += 1;
    }
}

fn request_animation_frame(callback: &Closure<dyn FnMut()>) -> Result<i32, JsValue> {
    web_sys::window()
        .ok_or_else(|| JsValue::from_str("window not available"))?
        .request_animation_frame(callback.as_ref().unchecked_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ColliderShape;
    use crate::physics::{BodyKind, BodyMaterial};
    use crate::utils::ManualTimers;

    fn session_with(gravity: (f32, f32)) -> (PhysicsSession, Rc<ManualTimers>) {
        let timers = Rc::new(ManualTimers::new());
        let config = SessionConfig {
            gravity: GravityConfig {
                x: Some(gravity.0),
                y: Some(gravity.1),
            },
            ..SessionConfig::default()
        };
        (PhysicsSession::new(&config, timers.clone()), timers)
    }

    fn tile_at(position: (f32, f32)) -> BodyDescriptor {
        BodyDescriptor {
            position,
            rotation: 0.0,
            shape: ColliderShape::Rectangle {
                half_width: 10.0,
                half_height: 10.0,
            },
            material: BodyMaterial::default(),
            collision_groups: BodyKind::Tile.collision_groups(),
        }
    }

    #[test]
    fn test_config_defaults_and_json() {
        let config = SessionConfig::default();
        assert_eq!(config.gravity.resolve(), (0.0, 0.0));
        assert!(config.auto_start);

        let config =
            SessionConfig::from_json(r#"{"gravity": {"y": -200}, "logLevel": "debug"}"#).unwrap();
        assert_eq!(config.gravity.resolve(), (0.0, -200.0));
        assert_eq!(config.log_level, LogLevel::Debug);

        assert!(matches!(
            SessionConfig::from_json("{not json"),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_gravity_update_falls_back_to_zero() {
        let (session, _) = session_with((0.0, -200.0));
        session.set_gravity(GravityConfig {
            x: Some(4.0),
            y: None,
        });
        assert_eq!(session.gravity(), (4.0, 0.0));
    }

    #[test]
    fn test_tick_publishes_offsets() {
        let (session, _) = session_with((0.0, -200.0));
        let element = session.next_element_id();
        let bindings = OutputBindings::new(0.0);
        let handle = session.spawn(element, &tile_at((260.0, 200.0)), false, bindings.clone());

        assert_eq!(bindings.snapshot(), (0.0, 0.0, 0.0));
        session.tick();

        let (x, y, _) = bindings.snapshot();
        assert_eq!(x, 0.0);
        assert!(y < 0.0);
        let pose = session.pose(handle).unwrap();
        assert!((pose.y - 200.0 - y).abs() < 1e-4);
        assert_eq!(session.stats().ticks, 1);
    }

    #[test]
    fn test_released_body_is_not_written() {
        let (session, _) = session_with((0.0, 100.0));
        let bindings = OutputBindings::new(0.0);
        let element = session.next_element_id();
        let handle = session.spawn(element, &tile_at((0.0, 0.0)), false, bindings.clone());

        // 別の要素からは削除できない
        assert!(!session.release(handle, session.next_element_id()));
        assert!(session.contains(handle));

        assert!(session.release(handle, element));
        assert!(!session.contains(handle));
        assert!(!session.release(handle, element));

        session.tick();
        assert_eq!(bindings.snapshot(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_activation_fires_once() {
        let (session, timers) = session_with((0.0, 100.0));
        let handle = session.spawn(
            session.next_element_id(),
            &tile_at((0.0, 0.0)),
            true,
            OutputBindings::new(0.0),
        );
        assert!(session.schedule_activation(handle, 300));

        timers.advance(299);
        assert_eq!(session.is_dynamic(handle), Some(false));
        timers.advance(1);
        assert_eq!(session.is_dynamic(handle), Some(true));
        timers.advance(10_000);
        assert_eq!(session.stats().activations, 1);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_release_cancels_activation() {
        let (session, timers) = session_with((0.0, 100.0));
        let element = session.next_element_id();
        let handle = session.spawn(element, &tile_at((0.0, 0.0)), true, OutputBindings::new(0.0));
        session.schedule_activation(handle, 300);

        session.release(handle, element);
        assert_eq!(timers.pending(), 0);
        timers.advance(1_000);
        assert_eq!(session.stats().activations, 0);
    }

    #[test]
    fn test_shutdown_destroys_everything() {
        let (session, timers) = session_with((0.0, 100.0));
        for i in 0..3 {
            let handle = session.spawn(
                session.next_element_id(),
                &tile_at((i as f32 * 50.0, 0.0)),
                true,
                OutputBindings::new(0.0),
            );
            session.schedule_activation(handle, 100);
        }
        assert_eq!(session.body_count(), 3);

        session.shutdown();
        assert_eq!(session.body_count(), 0);
        assert_eq!(session.with_world(|world| world.body_count()), 0);
        assert!(!session.is_running());
        assert_eq!(timers.pending(), 0);
        timers.advance(1_000);
        assert_eq!(session.stats().activations, 0);
    }

    #[test]
    fn test_handles_before_shutdown_do_not_reach_new_bodies() {
        let (session, _) = session_with((0.0, 100.0));
        let old_element = session.next_element_id();
        let old = session.spawn(old_element, &tile_at((0.0, 0.0)), false, OutputBindings::new(0.0));
        session.shutdown();

        let new_element = session.next_element_id();
        let new = session.spawn(new_element, &tile_at((0.0, 0.0)), false, OutputBindings::new(0.0));
        assert_ne!(old, new);
        assert!(!session.owns(old, old_element));

        assert!(!session.release(old, old_element));
        assert!(session
            .with_owned_body(old, old_element, |world| world.set_mobility(old, false))
            .is_none());
        assert!(session.owns(new, new_element));
        assert_eq!(session.body_count(), 1);
        assert_eq!(session.is_dynamic(new), Some(true));
    }
}
