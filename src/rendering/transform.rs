//! transform書き込み
//!
//! 出力バインディングを購読し、要素のインラインスタイルの`transform`に反映します。
//! レイアウトには触れないため、シミュレーションによるリフローは発生しません。

use std::rc::Rc;

use wasm_bindgen::JsValue;
use web_sys::CssStyleDeclaration;

use crate::bindings::{ListenerId, MotionValue, OutputBindings};
use crate::dom::DomElement;

/// transform文字列を組み立てる
pub fn format_transform(x: f32, y: f32, rotate_z: f32) -> String {
    format!(
        "translateX({}px) translateY({}px) rotateZ({}deg)",
        x, y, rotate_z
    )
}

/// バインディングから要素のtransformへの書き込み
pub struct TransformWriter {
    bindings: OutputBindings,
    listeners: [ListenerId; 3],
}

impl TransformWriter {
    /// 要素にバインディングを接続し、現在値を書き込む
    pub fn attach(element: &DomElement, bindings: &OutputBindings) -> Result<Self, JsValue> {
        let style = element
            .style()
            .ok_or_else(|| JsValue::from_str("element has no inline style"))?;
        let style = Rc::new(style);

        write_transform(&style, bindings)?;

        let subscribe = |target: &MotionValue| {
            let style = style.clone();
            let source = bindings.clone();
            target.on_change(move |_| {
                if let Err(err) = write_transform(&style, &source) {
                    log::warn!("transformの書き込みに失敗: {:?}", err);
                }
            })
        };
        let listeners = [
            subscribe(&bindings.x),
            subscribe(&bindings.y),
            subscribe(&bindings.rotate_z),
        ];

        Ok(Self {
            bindings: bindings.clone(),
            listeners,
        })
    }
}

impl Drop for TransformWriter {
    fn drop(&mut self) {
        let [x, y, rotate_z] = self.listeners;
        self.bindings.x.unsubscribe(x);
        self.bindings.y.unsubscribe(y);
        self.bindings.rotate_z.unsubscribe(rotate_z);
    }
}

fn write_transform(style: &CssStyleDeclaration, bindings: &OutputBindings) -> Result<(), JsValue> {
    let (x, y, rotate_z) = bindings.snapshot();
    style.set_property("transform", &format_transform(x, y, rotate_z))
}
