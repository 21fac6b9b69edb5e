//! Free-form race name parsing ("Bahrain GP 2023", "Monaco 2024")

/// Country keywords, matched as substrings in this order
const COUNTRY_KEYWORDS: &[(&str, &str)] = &[
    ("bahrain", "Bahrain"),
    ("saudi", "Saudi Arabia"),
    ("australia", "Australia"),
    ("japan", "Japan"),
    ("china", "China"),
    ("miami", "United States"),
    ("italy", "Italy"),
    ("monaco", "Monaco"),
    ("spain", "Spain"),
    ("canada", "Canada"),
    ("austria", "Austria"),
    ("britain", "United Kingdom"),
    ("uk", "United Kingdom"),
    ("hungary", "Hungary"),
    ("belgium", "Belgium"),
    ("netherlands", "Netherlands"),
    ("singapore", "Singapore"),
    ("mexico", "Mexico"),
    ("brazil", "Brazil"),
    ("usa", "United States"),
    ("united states", "United States"),
    ("abu dhabi", "United Arab Emirates"),
    ("uae", "United Arab Emirates"),
];

/// Session search derived from a race name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceQuery {
    pub year: i32,
    pub country: &'static str,
}

/// Extract the season year and country from a race name
///
/// The year is the first four-digit word. Both parts are required.
pub fn parse_race_name(name: &str) -> Option<RaceQuery> {
    let lowered = name.trim().to_lowercase();

    let year = lowered
        .split_whitespace()
        .find(|word| word.len() == 4 && word.bytes().all(|b| b.is_ascii_digit()))?
        .parse()
        .ok()?;

    let country = COUNTRY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, country)| *country)?;

    Some(RaceQuery { year, country })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_year_and_country() {
        assert_eq!(
            parse_race_name("Bahrain GP 2023"),
            Some(RaceQuery {
                year: 2023,
                country: "Bahrain"
            })
        );
        assert_eq!(
            parse_race_name("  MONACO 2024 "),
            Some(RaceQuery {
                year: 2024,
                country: "Monaco"
            })
        );
        assert_eq!(
            parse_race_name("2023 Abu Dhabi Grand Prix").map(|q| q.country),
            Some("United Arab Emirates")
        );
    }

    #[test]
    fn keyword_order_decides_ties() {
        // "miami" is listed before "usa"
        assert_eq!(
            parse_race_name("Miami USA 2023").map(|q| q.country),
            Some("United States")
        );
        assert_eq!(
            parse_race_name("British GP UK 2022").map(|q| q.country),
            Some("United Kingdom")
        );
    }

    #[test]
    fn requires_both_parts() {
        assert_eq!(parse_race_name("Bahrain GP"), None);
        assert_eq!(parse_race_name("Atlantis 2023"), None);
        assert_eq!(parse_race_name("Bahrain 23"), None);
        assert_eq!(parse_race_name(""), None);
    }
}
