//! Text signals shared by the metadata extractor and the categorizer.
//! Both must agree on employment type and location for the same text, so
//! there is exactly one implementation of each.

use crate::tables::{first_find, first_group, Tables};

// First employment type (in precedence order) whose patterns match.
pub fn detect_employment_type(tables: &Tables, text: &str) -> Option<String> {
    first_group(&tables.employment_types, text).map(str::to_string)
}

// Location mentioned in free text: remote indicators, then "City, ST",
// then a known city (with a trailing state code when one follows closely),
// then a country.
pub fn detect_location(tables: &Tables, text: &str) -> Option<String> {
    let patterns = &tables.location;

    if first_find(&patterns.remote, text).is_some() {
        return Some("Remote".to_string());
    }

    if let Some(m) = first_find(&patterns.city_state, text) {
        return Some(m.as_str().to_string());
    }

    if let Some(city) = first_find(&patterns.cities, text) {
        let after = &text[city.end()..];
        let window_end = after
            .char_indices()
            .nth(patterns.state_window)
            .map(|(idx, _)| idx)
            .unwrap_or(after.len());
        if let Some(state) = first_find(&patterns.states, &after[..window_end]) {
            return Some(format!("{}, {}", city.as_str(), state.as_str()));
        }
        return Some(city.as_str().to_string());
    }

    first_find(&patterns.countries, text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employment_type_precedence() {
        let tables = Tables::builtin();
        // Full-time beats everything listed after it
        assert_eq!(
            detect_employment_type(&tables, "Remote contract, full time"),
            Some("Full-time".to_string())
        );
        assert_eq!(
            detect_employment_type(&tables, "6 month contract, remote ok"),
            Some("Contract".to_string())
        );
        assert_eq!(
            detect_employment_type(&tables, "Summer internship program"),
            Some("Internship".to_string())
        );
        assert_eq!(
            detect_employment_type(&tables, "Hybrid schedule in Denver"),
            Some("Hybrid".to_string())
        );
        assert_eq!(
            detect_employment_type(&tables, "Must work on-site"),
            Some("On-site".to_string())
        );
        assert_eq!(detect_employment_type(&tables, "Backend Engineer"), None);
    }

    #[test]
    fn test_employment_type_word_boundaries() {
        let tables = Tables::builtin();
        // "gigabit" is not a gig, "software" is not "ft"
        assert_eq!(detect_employment_type(&tables, "gigabit software"), None);
        for text in ["international team", "internal tooling", "internet scale"] {
            assert_eq!(detect_employment_type(&tables, text), None, "for {text}");
        }
        assert_eq!(
            detect_employment_type(&tables, "Hiring interns this summer"),
            Some("Internship".to_string())
        );
        assert_eq!(
            detect_employment_type(&tables, "Paid gigs available"),
            Some("Freelance".to_string())
        );
    }

    #[test]
    fn test_location_remote_first() {
        let tables = Tables::builtin();
        assert_eq!(
            detect_location(&tables, "Seattle, WA or fully remote"),
            Some("Remote".to_string())
        );
        assert_eq!(
            detect_location(&tables, "Work from home anywhere"),
            Some("Remote".to_string())
        );
    }

    #[test]
    fn test_location_city_state() {
        let tables = Tables::builtin();
        assert_eq!(
            detect_location(&tables, "Opening in Mountain View, CA this fall"),
            Some("Mountain View, CA".to_string())
        );
    }

    #[test]
    fn test_location_known_city_with_nearby_state() {
        let tables = Tables::builtin();
        assert_eq!(
            detect_location(&tables, "based in seattle (WA) office"),
            Some("seattle, WA".to_string())
        );
        assert_eq!(
            detect_location(&tables, "Based in Boston. It is a long way before MA shows up"),
            Some("Boston".to_string())
        );
    }

    #[test]
    fn test_location_country() {
        let tables = Tables::builtin();
        assert_eq!(
            detect_location(&tables, "Open to candidates in germany"),
            Some("germany".to_string())
        );
        assert_eq!(
            detect_location(&tables, "Visa support for the UK office"),
            Some("UK".to_string())
        );
        // lower-case "us" is a pronoun, not a country
        assert_eq!(detect_location(&tables, "come build with us"), None);
    }

    #[test]
    fn test_location_none() {
        let tables = Tables::builtin();
        assert_eq!(detect_location(&tables, "Senior Backend Engineer"), None);
        assert_eq!(detect_location(&tables, ""), None);
    }
}
