use crate::core::similarity::partial_ratio;
use crate::models::{Listing, MatchPolicy, VehicleCriterion};

/// Two-tier attribute lookup used by the fuzzy make/model tests
///
/// When the listing carries the structured attribute it is the only thing
/// compared; otherwise the title stands in for it. Blank attributes count as
/// absent.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    field: Option<&'a str>,
    title: &'a str,
}

impl<'a> FieldResolver<'a> {
    pub fn new(field: Option<&'a str>, title: &'a str) -> Self {
        Self {
            field: field.filter(|value| !value.trim().is_empty()),
            title,
        }
    }

    pub fn make(listing: &'a Listing) -> Self {
        Self::new(listing.make.as_deref(), &listing.title)
    }

    pub fn model(listing: &'a Listing) -> Self {
        Self::new(listing.model.as_deref(), &listing.title)
    }

    /// Text the comparison runs against
    pub fn target(&self) -> &'a str {
        self.field.unwrap_or(self.title)
    }

    pub fn uses_title(&self) -> bool {
        self.field.is_none()
    }

    /// Strictly-above-threshold fuzzy match against the resolved text
    #[inline]
    pub fn matches(&self, wanted: &str, threshold: f64) -> bool {
        partial_ratio(wanted, self.target()) > threshold
    }

    pub fn matches_any<S: AsRef<str>>(&self, wanted: &[S], threshold: f64) -> bool {
        wanted.iter().any(|w| self.matches(w.as_ref(), threshold))
    }
}

/// Inclusive range check; absent bounds are unconstrained
#[inline]
pub fn within_bounds<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

/// Case-insensitive substring test. The keyword is used verbatim, padding
/// included; an empty keyword never hits.
#[inline]
pub fn contains_keyword(title: &str, keyword: &str) -> bool {
    !keyword.is_empty() && title.to_lowercase().contains(&keyword.to_lowercase())
}

/// Check a listing against one criterion of a multi-vehicle profile
///
/// Make, model and year must all hold. A listing without a year passes the
/// year test, so missing year data never causes a rejection here.
pub fn matches_criterion(
    listing: &Listing,
    criterion: &VehicleCriterion,
    policy: &MatchPolicy,
) -> bool {
    if !FieldResolver::make(listing).matches(&criterion.make, policy.make_threshold) {
        return false;
    }

    if !FieldResolver::model(listing).matches(&criterion.model, policy.model_threshold) {
        return false;
    }

    match listing.year {
        Some(year) => within_bounds(year, criterion.year_min, criterion.year_max),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, make: Option<&str>, model: Option<&str>, year: Option<i32>) -> Listing {
        Listing {
            external_id: "id-1".to_string(),
            source: "test".to_string(),
            title: title.to_string(),
            make: make.map(String::from),
            model: model.map(String::from),
            year,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolver_prefers_structured_field() {
        let l = listing("2020 Ferrari F8", Some("Porsche"), None, None);
        let resolver = FieldResolver::make(&l);

        assert_eq!(resolver.target(), "Porsche");
        assert!(!resolver.uses_title());
        // The title mentions Ferrari, but the structured make wins
        assert!(!resolver.matches("Ferrari", 90.0));
    }

    #[test]
    fn test_resolver_falls_back_to_title() {
        let l = listing("2020 Porsche 911 Carrera S", None, None, None);
        let resolver = FieldResolver::model(&l);

        assert!(resolver.uses_title());
        assert!(resolver.matches("911", 85.0));
    }

    #[test]
    fn test_blank_field_treated_as_absent() {
        let l = listing("1994 Toyota Supra Turbo", Some("  "), None, None);
        let resolver = FieldResolver::make(&l);

        assert!(resolver.uses_title());
        assert!(resolver.matches("Toyota", 90.0));
    }

    #[test]
    fn test_matches_any() {
        let l = listing("BMW M3", Some("BMW"), Some("M3"), None);
        assert!(FieldResolver::make(&l).matches_any(&["Audi", "BMW"], 90.0));
        assert!(!FieldResolver::make(&l).matches_any(&["Audi", "Lexus"], 90.0));
        assert!(!FieldResolver::make(&l).matches_any::<&str>(&[], 90.0));
    }

    #[test]
    fn test_within_bounds_inclusive() {
        assert!(within_bounds(2020, Some(2020), Some(2020)));
        assert!(within_bounds(2020, None, None));
        assert!(!within_bounds(2019, Some(2020), None));
        assert!(!within_bounds(2021, None, Some(2020)));
    }

    #[test]
    fn test_contains_keyword() {
        assert!(contains_keyword("2020 Porsche 911 - Salvage Title", "salvage"));
        assert!(contains_keyword("2020 porsche 911", "PORSCHE"));
        assert!(!contains_keyword("2020 Porsche 911", "salvage"));
        assert!(!contains_keyword("2020 Porsche 911", ""));
    }

    #[test]
    fn test_padded_keyword_kept_verbatim() {
        assert!(!contains_keyword("2018 Porsche 911 GT3", " gt "));
        assert!(contains_keyword("1969 Ford Mustang GT Fastback", " gt "));
    }

    #[test]
    fn test_criterion_year_skipped_when_absent() {
        let criterion = VehicleCriterion::new("Porsche", "911").with_years(Some(2020), None);
        let l = listing("Porsche 911", Some("Porsche"), Some("911"), None);

        assert!(matches_criterion(&l, &criterion, &MatchPolicy::default()));
    }

    #[test]
    fn test_criterion_year_out_of_range() {
        let criterion = VehicleCriterion::new("Porsche", "911").with_years(Some(2020), Some(2022));
        let l = listing("Porsche 911", Some("Porsche"), Some("911"), Some(2019));

        assert!(!matches_criterion(&l, &criterion, &MatchPolicy::default()));
    }
}
