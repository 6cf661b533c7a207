use crate::domain::store_model::ROW_INDEX_FIELD;

/// Rebuilds a header list from the keys of a stored entry when the
/// registry lost it. Descriptive labels come first and purely numeric ones
/// (usually years) last, each group in lexicographic order.
pub fn recover_headers<'a, I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut headers: Vec<String> = keys
        .into_iter()
        .filter(|key| key.as_str() != ROW_INDEX_FIELD)
        .cloned()
        .collect();

    headers.sort_by(|a, b| {
        is_numeric_label(a)
            .cmp(&is_numeric_label(b))
            .then_with(|| a.cmp(b))
    });
    headers
}

fn is_numeric_label(label: &str) -> bool {
    !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_labels_sort_last() {
        let keys = labels(&["2020", "Region", "_rowIndex", "1990", "Area"]);
        assert_eq!(
            recover_headers(&keys),
            labels(&["Area", "Region", "1990", "2020"])
        );
    }

    #[test]
    fn test_region_scenario() {
        let keys = labels(&["Region", "2020", "_rowIndex"]);
        assert_eq!(recover_headers(&keys), labels(&["Region", "2020"]));
    }

    #[test]
    fn test_mixed_labels_are_not_numeric() {
        assert!(is_numeric_label("2020"));
        assert!(!is_numeric_label("2020a"));
        assert!(!is_numeric_label("20.5"));
        assert!(!is_numeric_label(""));
    }
}
