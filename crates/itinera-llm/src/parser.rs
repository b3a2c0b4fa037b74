/// City names extracted from a completion, in the order the model listed them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CityList {
    pub cities: Vec<String>,
    /// True when the text contained a `[` followed later by a `]`.
    /// Unbracketed text is still split, this only feeds diagnostics.
    pub bracketed: bool,
}

impl CityList {
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }
}

/// Best-effort extraction of `[a, b, c]` style output.
///
/// Brackets and quote characters are removed, the rest is split on commas and
/// every piece trimmed. Pieces that end up empty are dropped. Nothing checks
/// that the names are real cities, unique, or match the requested count.
pub fn parse_city_list(raw: &str) -> CityList {
    let bracketed = match (raw.find('['), raw.rfind(']')) {
        (Some(open), Some(close)) => open < close,
        _ => false,
    };

    let cleaned: String = raw.chars().filter(|c| !matches!(c, '[' | ']')).collect();

    let cities = cleaned
        .split(',')
        .map(|piece| {
            piece
                .chars()
                .filter(|c| !matches!(c, '\'' | '"'))
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect();

    CityList { cities, bracketed }
}
