use crate::models::Listing;

/// Prices above this are assumed to be concatenated scrape garbage
pub const MAX_PLAUSIBLE_PRICE: f64 = 10_000_000.0;

/// Earliest and latest model years accepted from free text
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1886..=2100;

/// Clean up a listing coming out of a source adapter
///
/// Returns `None` for listings that must not reach the matcher (no title).
/// Otherwise trims text fields, turns blank optionals into `None`, fills a
/// missing `external_id` from the URL or title and recovers a missing year
/// from the title.
pub fn normalize(mut listing: Listing) -> Option<Listing> {
    listing.title = listing.title.trim().to_string();
    if listing.title.is_empty() {
        return None;
    }

    listing.url = listing.url.trim().to_string();
    listing.source = listing.source.trim().to_string();
    listing.make = clean_optional(listing.make);
    listing.model = clean_optional(listing.model);
    listing.location = clean_optional(listing.location);

    listing.external_id = listing.external_id.trim().to_string();
    if listing.external_id.is_empty() {
        listing.external_id = if listing.url.is_empty() {
            listing.title.clone()
        } else {
            listing.url.clone()
        };
    }

    if listing.year.is_none() {
        listing.year = year_from_title(&listing.title);
    }

    listing.price = listing.price.filter(|p| p.is_finite() && *p >= 0.0);

    Some(listing)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Model year written as the leading token of the title, e.g. "1997 Toyota Supra"
///
/// Numbers later in the title are too often mileage or trim codes to trust.
pub fn year_from_title(title: &str) -> Option<i32> {
    let first = title
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_ascii_alphanumeric());

    if first.len() != 4 || !first.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    first.parse::<i32>().ok().filter(|year| YEAR_RANGE.contains(year))
}

/// Parse a display price such as "$45,990" into a number
pub fn parse_price(text: &str) -> Option<f64> {
    let value = digits_only(text)?.parse::<f64>().ok()?;
    (value <= MAX_PLAUSIBLE_PRICE).then_some(value)
}

/// Parse a display mileage such as "12,345 mi."
pub fn parse_mileage(text: &str) -> Option<u32> {
    digits_only(text)?.parse::<u32>().ok()
}

fn digits_only(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, url: &str, title: &str) -> Listing {
        Listing {
            external_id: id.to_string(),
            source: " cars_com ".to_string(),
            url: url.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_blank_title_dropped() {
        assert!(normalize(raw("1", "", "   ")).is_none());
    }

    #[test]
    fn test_external_id_falls_back_to_url_then_title() {
        let from_url = normalize(raw("", "https://cars.example/123", "Porsche 911")).unwrap();
        assert_eq!(from_url.external_id, "https://cars.example/123");

        let from_title = normalize(raw(" ", "", "Porsche 911")).unwrap();
        assert_eq!(from_title.external_id, "Porsche 911");
    }

    #[test]
    fn test_year_recovered_from_title() {
        let listing = normalize(raw("1", "", "  1997 Toyota Supra Turbo 6-Speed ")).unwrap();
        assert_eq!(listing.title, "1997 Toyota Supra Turbo 6-Speed");
        assert_eq!(listing.year, Some(1997));
        assert_eq!(listing.source, "cars_com");
    }

    #[test]
    fn test_mileage_in_title_is_not_a_year() {
        let listing = normalize(raw("1", "", "Ferrari F40 - only 2000 miles")).unwrap();
        assert_eq!(listing.year, None);
    }

    #[test]
    fn test_existing_year_kept() {
        let mut input = raw("1", "", "1997 Toyota Supra");
        input.year = Some(1998);
        assert_eq!(normalize(input).unwrap().year, Some(1998));
    }

    #[test]
    fn test_blank_make_becomes_none() {
        let mut input = raw("1", "", "Toyota Supra");
        input.make = Some("  ".to_string());
        input.model = Some(" Supra ".to_string());

        let listing = normalize(input).unwrap();
        assert_eq!(listing.make, None);
        assert_eq!(listing.model.as_deref(), Some("Supra"));
    }

    #[test]
    fn test_negative_price_dropped() {
        let mut input = raw("1", "", "Toyota Supra");
        input.price = Some(-1.0);
        assert_eq!(normalize(input).unwrap().price, None);
    }

    #[test]
    fn test_year_from_title() {
        assert_eq!(year_from_title("2021 Porsche 911"), Some(2021));
        assert_eq!(year_from_title("(1989) Lamborghini Countach"), Some(1989));
        assert_eq!(year_from_title("Porsche 911 GT3 (2018)"), None);
        assert_eq!(year_from_title("Ferrari F40 12345 miles"), None);
        assert_eq!(year_from_title("1200 mile Ferrari F40"), None);
        assert_eq!(year_from_title("Porsche 9110"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$45,990"), Some(45990.0));
        assert_eq!(parse_price("Contact for price"), None);
        assert_eq!(parse_price("$45,990$52,000"), None);
    }

    #[test]
    fn test_parse_mileage() {
        assert_eq!(parse_mileage("12,345 mi."), Some(12345));
        assert_eq!(parse_mileage("N/A"), None);
    }
}
