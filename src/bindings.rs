//! 出力バインディングモジュール
//!
//! レンダリング層が購読する「観測可能な数値」を提供します。
//! 値は同期ループだけが書き込み、レンダリング層は読み取りと購読のみを行います。

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// 購読の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u32);

type Listener = Rc<dyn Fn(f32)>;

struct MotionValueInner {
    current: f32,
    next_listener: u32,
    listeners: Vec<(ListenerId, Listener)>,
}

/// 観測可能な数値
///
/// クローンは同じ値を共有します。
#[derive(Clone)]
pub struct MotionValue {
    inner: Rc<RefCell<MotionValueInner>>,
}

impl MotionValue {
    /// 初期値を指定して作成
    pub fn new(initial: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MotionValueInner {
                current: initial,
                next_listener: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// 現在値
    pub fn get(&self) -> f32 {
        self.inner.borrow().current
    }

    /// 値を更新し、変化があれば購読者に通知
    pub(crate) fn set(&self, value: f32) {
        let listeners: Vec<Listener> = {
            let mut inner = self.inner.borrow_mut();
            if inner.current == value {
                return;
            }
            inner.current = value;
            inner.listeners.iter().map(|(_, listener)| listener.clone()).collect()
        };

        // 借用を解放してから通知する
        for listener in listeners {
            listener(value);
        }
    }

    /// 値の変化を購読
    pub fn on_change(&self, listener: impl Fn(f32) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, Rc::new(listener)));
        id
    }

    /// 購読を解除
    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner.borrow_mut().listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    /// 購読者数
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// 同じ値を共有しているかどうか
    pub fn ptr_eq(&self, other: &MotionValue) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MotionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MotionValue").field(&self.get()).finish()
    }
}

/// 剛体1つ分の出力チャンネル
#[derive(Debug, Clone)]
pub struct OutputBindings {
    /// 元の位置からのXオフセット（ピクセル）
    pub x: MotionValue,
    /// 元の位置からのYオフセット（ピクセル）
    pub y: MotionValue,
    /// 回転（度）
    pub rotate_z: MotionValue,
}

impl OutputBindings {
    /// オフセット0、指定した回転（度）で作成
    pub fn new(initial_rotation_deg: f32) -> Self {
        Self {
            x: MotionValue::new(0.0),
            y: MotionValue::new(0.0),
            rotate_z: MotionValue::new(initial_rotation_deg),
        }
    }

    /// 現在値を (x, y, 回転) で取得
    pub fn snapshot(&self) -> (f32, f32, f32) {
        (self.x.get(), self.y.get(), self.rotate_z.get())
    }

    /// 3チャンネルをまとめて書き込む
    pub(crate) fn publish(&self, x: f32, y: f32, rotate_z: f32) {
        self.x.set(x);
        self.y.set(y);
        self.rotate_z.set(rotate_z);
    }
}
