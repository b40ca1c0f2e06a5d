//! Region-of-interest sub-parser for `<image_roi>` elements.

use roxmltree::Node;

use crate::core::errors::ConfigError;
use crate::core::types::Rect;
use crate::io::document::{elements, parse_field};

/// Parse `<x>`, `<y>`, `<width>`, `<height>` (in that order) into a [`Rect`].
pub fn parse_roi(node: Node<'_, '_>) -> Result<Rect, ConfigError> {
    let mut fields = elements(node);
    let x = parse_field(fields.next(), "x")?;
    let y = parse_field(fields.next(), "y")?;
    let width: i32 = parse_field(fields.next(), "width")?;
    let height: i32 = parse_field(fields.next(), "height")?;
    for (field, value) in [("width", width), ("height", height)] {
        if value < 0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(Rect {
        x,
        y,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn roi(xml: &str) -> Result<Rect, ConfigError> {
        let doc = Document::parse(xml).expect("xml");
        parse_roi(doc.root_element())
    }

    #[test]
    fn parses_rectangle() {
        let rect = roi("<image_roi><x>1</x><y>2</y><width>3</width><height>4</height></image_roi>")
            .expect("roi");
        assert_eq!(
            rect,
            Rect {
                x: 1,
                y: 2,
                width: 3,
                height: 4
            }
        );
    }

    #[test]
    fn missing_height_is_missing_field() {
        let err = roi("<image_roi><x>1</x><y>2</y><width>3</width></image_roi>").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref field) if field == "height"));
    }

    #[test]
    fn negative_width_is_invalid() {
        let err = roi("<image_roi><x>1</x><y>2</y><width>-3</width><height>4</height></image_roi>")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "width"));
    }

    #[test]
    fn fractional_coordinates_are_invalid() {
        let err = roi("<image_roi><x>1.5</x><y>2</y><width>3</width><height>4</height></image_roi>")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "x"));
    }
}
