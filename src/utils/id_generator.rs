//! ID生成ユーティリティモジュール
//!
//! 剛体が参照する要素ID（所有権を持たない関連付け）を発行します。

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// 要素の一意な識別子
///
/// 剛体レコードはこのIDだけを保持し、要素そのものは所有しません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u32);

impl ElementId {
    /// 生の値を取得
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({})", self.0)
    }
}

/// シンプルなID生成器
pub struct IdGenerator {
    /// 次に生成するID値
    next_id: AtomicU32,
}

impl IdGenerator {
    /// 新しいID生成器を作成
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
        }
    }

    /// 新しい要素IDを作成
    pub fn next_element_id(&self) -> ElementId {
        ElementId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// 発行済みのID数を取得
    #[cfg(test)]
    pub fn issued(&self) -> u32 {
        self.next_id.load(Ordering::SeqCst) - 1
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
