//! 時間ユーティリティモジュール
//!
//! 遅延アクティベーションに使うキャンセル可能なタイマーを提供します。
//! ブラウザでは`setTimeout`を使い、テストでは仮想時計で駆動します。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// スケジュール済みタイマーの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(i32);

/// 一度きりのコールバックを遅延実行するホスト
pub trait TimerHost {
    /// `delay_ms`ミリ秒後に`callback`を実行するよう登録
    ///
    /// 登録に失敗した場合は`None`を返します。
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Option<TimerId>;

    /// 未実行のタイマーを取り消す（実行済み・不明なIDは無視）
    fn cancel(&self, id: TimerId);
}

/// キャンセルトークン
///
/// タイマー本体の取り消しとは独立に、コールバック側で確認できるフラグです。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    /// 新しいトークンを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 取り消す
    pub fn cancel(&self) {
        self.0.set(true);
    }

    /// 取り消されたかどうか
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// ブラウザの`setTimeout`を使うタイマーホスト
#[derive(Debug, Default)]
pub struct BrowserTimers;

impl BrowserTimers {
    pub fn new() -> Self {
        Self
    }
}

impl TimerHost for BrowserTimers {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Option<TimerId> {
        let window = web_sys::window()?;
        // 実行後に自動で解放される。取り消された場合はリークするが、1体につき1回限り
        let function = Closure::once_into_js(move || callback());
        let timeout = i32::try_from(delay_ms).unwrap_or(i32::MAX);

        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            function.unchecked_ref(),
            timeout,
        ) {
            Ok(id) => Some(TimerId(id)),
            Err(err) => {
                log::error!("setTimeoutの登録に失敗: {:?}", err);
                None
            }
        }
    }

    fn cancel(&self, id: TimerId) {
        if let Some(window) = web_sys::window() {
            window.clear_timeout_with_handle(id.0);
        }
    }
}

/// 手動で時間を進めるタイマーホスト
///
/// `advance`を呼ぶまで何も実行されません。
#[derive(Default)]
pub struct ManualTimers {
    inner: RefCell<ManualTimersInner>,
}

#[derive(Default)]
struct ManualTimersInner {
    now_ms: u64,
    next_id: i32,
    queue: Vec<ScheduledTimer>,
}

struct ScheduledTimer {
    id: TimerId,
    due_ms: u64,
    callback: Box<dyn FnOnce()>,
}

impl ManualTimers {
    /// 新しい仮想時計を作成（時刻0から開始）
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在の仮想時刻（ミリ秒）
    pub fn now_ms(&self) -> u64 {
        self.inner.borrow().now_ms
    }

    /// 未実行のタイマー数
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// 時間を進め、期限に達したコールバックを期限順に実行
    ///
    /// # 戻り値
    ///
    /// * 実行されたコールバックの数
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.inner.borrow().now_ms + ms;
        let mut fired = 0;

        loop {
            // 借用を解放してからコールバックを呼ぶ（コールバック内で再登録できるように）
            let next = {
                let mut inner = self.inner.borrow_mut();
                let earliest = inner
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due_ms <= target)
                    .min_by_key(|(_, timer)| (timer.due_ms, timer.id.0))
                    .map(|(index, _)| index);

                earliest.map(|index| {
                    let timer = inner.queue.remove(index);
                    inner.now_ms = timer.due_ms;
                    timer
                })
            };

            match next {
                Some(timer) => {
                    (timer.callback)();
                    fired += 1;
                }
                None => break,
            }
        }

        self.inner.borrow_mut().now_ms = target;
        fired
    }
}

impl TimerHost for ManualTimers {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Option<TimerId> {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = TimerId(inner.next_id);
        let due_ms = inner.now_ms + u64::from(delay_ms);
        inner.queue.push(ScheduledTimer {
            id,
            due_ms,
            callback,
        });
        Some(id)
    }

    fn cancel(&self, id: TimerId) {
        self.inner.borrow_mut().queue.retain(|timer| timer.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timers_fire_in_due_order() {
        let timers = ManualTimers::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, name) in [(300, "c"), (100, "a"), (200, "b")] {
            let log = log.clone();
            timers.schedule(delay, Box::new(move || log.borrow_mut().push(name)));
        }

        assert_eq!(timers.advance(150), 1);
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(timers.advance(1000), 2);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(timers.now_ms(), 1150);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_manual_timer_not_early() {
        let timers = ManualTimers::new();
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        timers.schedule(500, Box::new(move || flag.set(true)));

        timers.advance(499);
        assert!(!fired.get());
        timers.advance(1);
        assert!(fired.get());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let timers = ManualTimers::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let id = timers
            .schedule(10, Box::new(move || counter.set(counter.get() + 1)))
            .unwrap();

        timers.cancel(id);
        assert_eq!(timers.advance(100), 0);
        assert_eq!(fired.get(), 0);

        // 不明なIDの取り消しは無視される
        timers.cancel(id);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
