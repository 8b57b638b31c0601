use super::types::BoundingBox;

/// One `key value...` segment of an hOCR `title` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleProperty {
    pub key: String,
    pub values: Vec<String>,
}

impl TitleProperty {
    pub fn joined(&self) -> String {
        self.values.join(" ")
    }

    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// Splits `bbox 10 20 30 40; x_wconf 95` into ordered key/values pairs.
pub fn parse_title(title: &str) -> Vec<TitleProperty> {
    title
        .split(';')
        .filter_map(|segment| {
            let mut tokens = segment.split_whitespace();
            let key = tokens.next()?;
            Some(TitleProperty {
                key: key.to_string(),
                values: tokens.map(str::to_string).collect(),
            })
        })
        .collect()
}

pub fn find<'a>(props: &'a [TitleProperty], key: &str) -> Option<&'a TitleProperty> {
    props.iter().find(|prop| prop.key == key)
}

pub fn parse_bbox(values: &[String]) -> Option<BoundingBox> {
    if values.len() < 4 {
        return None;
    }
    let mut coords = [0.0f64; 4];
    for (slot, raw) in coords.iter_mut().zip(values) {
        *slot = raw.parse().ok()?;
    }
    Some(BoundingBox::new(coords[0], coords[1], coords[2], coords[3]))
}

pub fn bbox_from_title(title: &str) -> Option<BoundingBox> {
    let props = parse_title(title);
    find(&props, "bbox").and_then(|prop| parse_bbox(&prop.values))
}

/// Strips the quotes Tesseract puts around `image` paths.
pub(crate) fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    let stripped = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_keys_and_values() {
        let props = parse_title("bbox 1 2 3 4;  x_wconf 95 ; ;baseline 0.01 -3");
        assert_eq!(props.len(), 3);
        assert_eq!(props[0].key, "bbox");
        assert_eq!(props[0].values, vec!["1", "2", "3", "4"]);
        assert_eq!(props[1].first(), Some("95"));
        assert_eq!(props[2].joined(), "0.01 -3");
    }

    #[test]
    fn bbox_requires_four_numbers() {
        assert_eq!(
            bbox_from_title("bbox 10 20 30 40"),
            Some(BoundingBox::new(10.0, 20.0, 30.0, 40.0))
        );
        assert_eq!(bbox_from_title("bbox 10 20 30"), None);
        assert_eq!(bbox_from_title("bbox 10 twenty 30 40"), None);
        assert_eq!(bbox_from_title("x_wconf 90"), None);
    }

    #[test]
    fn key_without_values_is_kept() {
        let props = parse_title("x_bold");
        assert_eq!(props[0].key, "x_bold");
        assert!(props[0].values.is_empty());
    }

    #[test]
    fn unquote_handles_bare_and_quoted() {
        assert_eq!(unquote("\"/tmp/page 1.png\""), "/tmp/page 1.png");
        assert_eq!(unquote("scan.tif"), "scan.tif");
    }
}
