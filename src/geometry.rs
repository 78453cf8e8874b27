//! ジオメトリ抽出モジュール
//!
//! 描画済み要素のバウンディングボックスと角丸半径から、
//! コライダー形状とスクリーン座標系の中心位置を導出します。
//! 抽出は剛体生成の瞬間に一度だけ行われ、その後のリサイズは反映されません。

/// 要素の描画済みボックス（スクリーン座標、CSSピクセル）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ElementBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// ボックスの中心
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// 短辺の長さ
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }
}

/// コライダー形状
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    /// 矩形（半幅・半高さ）
    Rectangle { half_width: f32, half_height: f32 },
    /// 角丸矩形（内側の半幅・半高さと角の半径）
    RoundedRectangle {
        half_width: f32,
        half_height: f32,
        radius: f32,
    },
}

impl ColliderShape {
    /// ボックスと角丸半径から形状を導出
    ///
    /// 半径は短辺の半分でクランプされるため、半幅・半高さが負になることはありません。
    pub fn from_box(bbox: &ElementBox, corner_radius: f32) -> Self {
        let half_width = (bbox.width / 2.0).max(0.0);
        let half_height = (bbox.height / 2.0).max(0.0);
        let radius = if corner_radius.is_finite() {
            corner_radius.clamp(0.0, half_width.min(half_height))
        } else {
            0.0
        };

        if radius > 0.0 {
            ColliderShape::RoundedRectangle {
                half_width: (half_width - radius).max(0.0),
                half_height: (half_height - radius).max(0.0),
                radius,
            }
        } else {
            ColliderShape::Rectangle {
                half_width,
                half_height,
            }
        }
    }

    /// 外形の半幅・半高さ（角丸を含む）
    #[cfg(test)]
    pub fn outer_half_extents(&self) -> (f32, f32) {
        match *self {
            ColliderShape::Rectangle {
                half_width,
                half_height,
            } => (half_width, half_height),
            ColliderShape::RoundedRectangle {
                half_width,
                half_height,
                radius,
            } => (half_width + radius, half_height + radius),
        }
    }
}

/// 抽出結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementGeometry {
    /// スクリーン座標系での中心
    pub position: (f32, f32),
    pub shape: ColliderShape,
}

/// レイアウトツリー上の要素
///
/// 物理レイヤーは要素を読み取るだけで、所有も変更もしません。
pub trait LayoutElement {
    /// レイアウトツリーに接続されているかどうか
    fn is_attached(&self) -> bool;

    /// 現在の描画済みボックス
    fn bounding_box(&self) -> ElementBox;

    /// 計算済みスタイルの`border-radius`（例: `"8px"`）
    fn computed_border_radius(&self) -> String;

    /// 出力バインディング（transform）を受け付けられるかどうか
    fn accepts_bindings(&self) -> bool;
}

/// 要素からジオメトリを抽出
///
/// 要素がまだレイアウトツリーに接続されていない場合は`None`を返します。
pub fn extract_geometry(element: &dyn LayoutElement) -> Option<ElementGeometry> {
    if !element.is_attached() {
        return None;
    }

    let bbox = element.bounding_box();
    let radius = parse_corner_radius(&element.computed_border_radius(), &bbox);

    Some(ElementGeometry {
        position: bbox.center(),
        shape: ColliderShape::from_box(&bbox, radius),
    })
}

/// `border-radius`の値を数値に変換
///
/// 先頭の数値だけを読み取ります（`"8px 4px"`なら8）。
/// パーセント指定は短辺に対する割合として解決します。
pub fn parse_corner_radius(value: &str, bbox: &ElementBox) -> f32 {
    let value = value.trim();
    let numeric_len = value
        .char_indices()
        .find(|&(index, c)| !(c.is_ascii_digit() || c == '.' || (index == 0 && (c == '-' || c == '+'))))
        .map(|(index, _)| index)
        .unwrap_or(value.len());

    let number = match value[..numeric_len].parse::<f32>() {
        Ok(number) if number.is_finite() && number > 0.0 => number,
        _ => return 0.0,
    };

    if value[numeric_len..].starts_with('%') {
        bbox.min_side() * number / 100.0
    } else {
        number
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::StaticElement;
    use super::*;

    #[test]
    fn test_square_corners_give_rectangle() {
        let element = StaticElement::new(0.0, 0.0, 120.0, 40.0);
        let geometry = extract_geometry(&element).unwrap();

        assert_eq!(geometry.position, (60.0, 20.0));
        assert_eq!(
            geometry.shape,
            ColliderShape::Rectangle {
                half_width: 60.0,
                half_height: 20.0
            }
        );
    }

    #[test]
    fn test_rounded_tile() {
        let element = StaticElement::new(100.0, 100.0, 320.0, 200.0).with_radius("8px");
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
        assert_eq!(geometry.shape.outer_half_extents(), (160.0, 100.0));
    }

    #[test]
    fn test_oversized_radius_is_clamped() {
        // 短辺の半分を超える半径（ピル型ボタンなど）
        let bbox = ElementBox::new(0.0, 0.0, 100.0, 30.0);
        let shape = ColliderShape::from_box(&bbox, 9999.0);

        match shape {
            ColliderShape::RoundedRectangle {
                half_width,
                half_height,
                radius,
            } => {
                assert_eq!(radius, 15.0);
                assert_eq!(half_width, 35.0);
                assert_eq!(half_height, 0.0);
            }
            other => panic!("unexpected shape: {:?}", other),
        }

        let circle = ColliderShape::from_box(&ElementBox::new(0.0, 0.0, 40.0, 40.0), 20.0);
        assert_eq!(
            circle,
            ColliderShape::RoundedRectangle {
                half_width: 0.0,
                half_height: 0.0,
                radius: 20.0
            }
        );
    }

    #[test]
    fn test_detached_element_yields_nothing() {
        let element = StaticElement::new(0.0, 0.0, 10.0, 10.0).detached();
        assert!(extract_geometry(&element).is_none());
    }

    #[test]
    fn test_parse_corner_radius() {
        let bbox = ElementBox::new(0.0, 0.0, 200.0, 80.0);

        assert_eq!(parse_corner_radius("8px", &bbox), 8.0);
        assert_eq!(parse_corner_radius(" 2.5px ", &bbox), 2.5);
        assert_eq!(parse_corner_radius("12px 4px", &bbox), 12.0);
        assert_eq!(parse_corner_radius("50%", &bbox), 40.0);
        assert_eq!(parse_corner_radius("", &bbox), 0.0);
        assert_eq!(parse_corner_radius("none", &bbox), 0.0);
        assert_eq!(parse_corner_radius("0px", &bbox), 0.0);
        assert_eq!(parse_corner_radius("-4px", &bbox), 0.0);
    }
}
