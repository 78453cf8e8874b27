use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlImageElement};

// モジュール宣言
pub mod bindings;
pub mod controller;
pub mod dom;
pub mod geometry;
pub mod physics;
pub mod registry;
pub mod rendering;
pub mod session;
pub mod utils;

use controller::{BodyConfig, BodyController};
use dom::DomElement;
use rendering::TransformWriter;
use session::{GravityConfig, PhysicsSession, SessionConfig};

// 初期化用のエントリーポイント
#[wasm_bindgen(start)]
pub fn start() {
    // エラーをコンソールにパニックフックとして表示
    console_error_panic_hook::set_once();

    // ロガーの初期化
    utils::init_logging(utils::LogLevel::Info);
    log::info!("WebAssembly module initialized!");
}

/// 物理エンジンの準備を待ってハンドルを返す
///
/// エンジンはモジュールに静的リンクされているため、インスタンス化済みなら即座に解決します。
#[wasm_bindgen(js_name = loadPhysics)]
pub async fn load_physics(config_json: Option<String>) -> Result<PhysicsHandle, JsValue> {
    let loaded_at = js_sys::Date::now();
    let handle = PhysicsHandle::new(config_json)?;
    log::debug!("物理エンジンの準備完了 ({:.1}ms)", js_sys::Date::now() - loaded_at);
    Ok(handle)
}

// JavaScriptからアクセス可能な物理セッション
#[wasm_bindgen]
pub struct PhysicsHandle {
    session: PhysicsSession,
}

#[wasm_bindgen]
impl PhysicsHandle {
    /// 新しいセッションを作成（設定はJSON文字列、省略時は既定値）
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<PhysicsHandle, JsValue> {
        let config = match config_json.as_deref() {
            Some(json) if !json.trim().is_empty() => SessionConfig::from_json(json)?,
            _ => SessionConfig::default(),
        };
        utils::set_log_level(config.log_level);

        let session = PhysicsSession::in_browser(&config);
        if config.auto_start {
            session.start_loop()?;
        }
        Ok(PhysicsHandle { session })
    }

    /// 重力を更新（省略した成分は0）
    #[wasm_bindgen(js_name = setGravity)]
    pub fn set_gravity(&self, x: Option<f32>, y: Option<f32>) {
        self.session.set_gravity(GravityConfig { x, y });
    }

    /// 同期ループを開始
    pub fn start(&self) -> Result<(), JsValue> {
        self.session.start_loop()
    }

    /// 同期ループを1ティック進める
    pub fn step(&self) {
        self.session.tick();
    }

    /// ループを止め、すべての剛体を破棄
    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    #[wasm_bindgen(js_name = bodyCount)]
    pub fn body_count(&self) -> usize {
        self.session.body_count()
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// 要素に剛体を設定
    ///
    /// `initializeOnMount`が有効（既定）なら、この時点で剛体を生成します。
    pub fn attach(
        &self,
        element: Element,
        options_json: Option<String>,
    ) -> Result<RigidBodyControl, JsValue> {
        let config = match options_json.as_deref() {
            Some(json) if !json.trim().is_empty() => BodyConfig::from_json(json)?,
            _ => BodyConfig::default(),
        };

        let element = DomElement::new(element);
        let mut controller = BodyController::new(&self.session, element.clone(), config)?;
        let writer = TransformWriter::attach(&element, controller.bindings())?;
        controller.mount();

        Ok(RigidBodyControl {
            inner: Rc::new(RefCell::new(AttachedBody {
                controller,
                _writer: writer,
            })),
        })
    }
}

struct AttachedBody {
    controller: BodyController<DomElement>,
    _writer: TransformWriter,
}

// 要素1つ分の剛体操作
#[wasm_bindgen]
pub struct RigidBodyControl {
    inner: Rc<RefCell<AttachedBody>>,
}

#[wasm_bindgen]
impl RigidBodyControl {
    /// 剛体を生成（生成済み・未接続なら何もしない）
    pub fn initialize(&self) -> bool {
        self.inner.borrow_mut().controller.initialize()
    }

    #[wasm_bindgen(js_name = onResize)]
    pub fn on_resize(&self) {
        self.inner.borrow().controller.on_resize();
    }

    /// 剛体を破棄
    pub fn dispose(&self) {
        self.inner.borrow_mut().controller.dispose();
    }

    #[wasm_bindgen(js_name = isLive)]
    pub fn is_live(&self) -> bool {
        self.inner.borrow().controller.is_live()
    }

    /// 画像の読み込み完了後に初期化する
    ///
    /// 読み込み済みなら即座に初期化します。
    #[wasm_bindgen(js_name = initializeOnLoad)]
    pub fn initialize_on_load(&self, image: HtmlImageElement) -> Result<(), JsValue> {
        if image.complete() {
            self.initialize();
            return Ok(());
        }

        let weak: Weak<RefCell<AttachedBody>> = Rc::downgrade(&self.inner);
        let on_load = Closure::once_into_js(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().controller.initialize();
            }
        });
        image.add_event_listener_with_callback("load", on_load.unchecked_ref())
    }

    #[wasm_bindgen(getter)]
    pub fn x(&self) -> f32 {
        self.inner.borrow().controller.bindings().x.get()
    }

    #[wasm_bindgen(getter)]
    pub fn y(&self) -> f32 {
        self.inner.borrow().controller.bindings().y.get()
    }

    #[wasm_bindgen(getter, js_name = rotateZ)]
    pub fn rotate_z(&self) -> f32 {
        self.inner.borrow().controller.bindings().rotate_z.get()
    }
}
