//! DOM要素アダプタ
//!
//! `web_sys::Element`を物理レイヤーの`LayoutElement`として扱うための実装です。
//! 読み取るのは生成時点のバウンディングボックスと計算済みの`border-radius`だけです。

use wasm_bindgen::JsCast;
use web_sys::{CssStyleDeclaration, Element, HtmlElement, SvgElement};

use crate::geometry::{ElementBox, LayoutElement};

/// DOM要素
#[derive(Debug, Clone)]
pub struct DomElement {
    element: Element,
}

impl DomElement {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// インラインスタイル（transformの書き込み先）
    pub fn style(&self) -> Option<CssStyleDeclaration> {
        if let Some(html) = self.element.dyn_ref::<HtmlElement>() {
            return Some(html.style());
        }
        self.element.dyn_ref::<SvgElement>().map(|svg| svg.style())
    }
}

impl From<Element> for DomElement {
    fn from(element: Element) -> Self {
        Self::new(element)
    }
}

impl LayoutElement for DomElement {
    fn is_attached(&self) -> bool {
        self.element.is_connected()
    }

    fn bounding_box(&self) -> ElementBox {
        let rect = self.element.get_bounding_client_rect();
        ElementBox::new(
            rect.x() as f32,
            rect.y() as f32,
            rect.width() as f32,
            rect.height() as f32,
        )
    }

    fn computed_border_radius(&self) -> String {
        let Some(style) = web_sys::window()
            .and_then(|window| window.get_computed_style(&self.element).ok().flatten())
        else {
            return String::new();
        };

        // ショートハンドが空になるブラウザでは左上の角を読む
        let shorthand = style.get_property_value("border-radius").unwrap_or_default();
        if !shorthand.trim().is_empty() {
            return shorthand;
        }
        style
            .get_property_value("border-top-left-radius")
            .unwrap_or_default()
    }

    fn accepts_bindings(&self) -> bool {
        self.element.dyn_ref::<HtmlElement>().is_some() || self.element.dyn_ref::<SvgElement>().is_some()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use crate::geometry::{extract_geometry, ColliderShape};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn create_div(style: &str) -> Element {
        let document = web_sys::window().unwrap().document().unwrap();
        let div = document.create_element("div").unwrap();
        div.set_attribute("style", style).unwrap();
        div
    }

    #[wasm_bindgen_test]
    fn test_geometry_from_attached_div() {
        let div = create_div(
            "position: fixed; left: 100px; top: 100px; width: 320px; height: 200px; border-radius: 8px;",
        );
        let body = web_sys::window().unwrap().document().unwrap().body().unwrap();
        body.append_child(&div).unwrap();

        let element = DomElement::new(div.clone());
        let geometry = extract_geometry(&element).unwrap();
        assert_eq!(geometry.position, (260.0, 200.0));
        assert_eq!(
            geometry.shape,
            ColliderShape::RoundedRectangle {
                half_width: 152.0,
                half_height: 92.0,
                radius: 8.0
            }
        );
        assert!(element.accepts_bindings());

        body.remove_child(&div).unwrap();
    }

    #[wasm_bindgen_test]
    fn test_detached_div_is_skipped() {
        let element = DomElement::new(create_div("width: 10px; height: 10px;"));
        assert!(!element.is_attached());
        assert!(extract_geometry(&element).is_none());
    }
}
