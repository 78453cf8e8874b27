//! レンダリングモジュール
//!
//! 剛体の出力バインディングをDOM要素の見た目に反映します。
//! 位置はレイアウトを変えずに`transform`だけで表現します。

mod transform;

pub use transform::*;
