use crate::core::filters::contains_keyword;
use crate::models::{Listing, MatchPolicy, SearchProfile};

/// Apply the rules shared by both selection modes
///
/// Runs after the vehicle selection has passed:
/// 1. Price: reject above `price_max`, otherwise bonus when a price is known
/// 2. Mileage: reject above `mileage_max`, otherwise bonus when mileage is known
/// 3. Exclude keywords: any hit in the title rejects
/// 4. Features: each hit in the title adds a bonus, never rejects
///
/// Returns `None` on rejection, or the bonus to add to the selection score.
pub fn score_shared_tail(
    listing: &Listing,
    profile: &SearchProfile,
    policy: &MatchPolicy,
) -> Option<f64> {
    let mut score = 0.0;

    if let Some(price) = listing.price {
        if matches!(profile.price_max, Some(max) if price > max) {
            return None;
        }
        score += policy.price_score;
    }

    if let Some(mileage) = listing.mileage {
        if matches!(profile.mileage_max, Some(max) if mileage > max) {
            return None;
        }
        score += policy.mileage_score;
    }

    if profile
        .exclude_keywords
        .iter()
        .any(|kw| contains_keyword(&listing.title, kw))
    {
        return None;
    }

    score += feature_hits(&listing.title, &profile.features_any) as f64 * policy.feature_score;

    Some(score)
}

/// Count how many wanted features appear in the title
#[inline]
pub fn feature_hits(title: &str, features: &[String]) -> usize {
    features
        .iter()
        .filter(|feature| contains_keyword(title, feature))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, price: Option<f64>, mileage: Option<u32>) -> Listing {
        Listing {
            external_id: "id-1".to_string(),
            source: "test".to_string(),
            title: title.to_string(),
            price,
            mileage,
            ..Default::default()
        }
    }

    #[test]
    fn test_price_bonus_without_bound() {
        let bonus = score_shared_tail(
            &listing("Car", Some(45000.0), None),
            &SearchProfile::default(),
            &MatchPolicy::default(),
        );
        assert_eq!(bonus, Some(10.0));
    }

    #[test]
    fn test_price_at_bound_is_allowed() {
        let profile = SearchProfile::default().with_price_max(50000.0);
        let bonus = score_shared_tail(&listing("Car", Some(50000.0), None), &profile, &MatchPolicy::default());
        assert_eq!(bonus, Some(10.0));
    }

    #[test]
    fn test_price_above_bound_rejects() {
        let profile = SearchProfile::default().with_price_max(50000.0);
        let bonus = score_shared_tail(&listing("Car", Some(50000.01), None), &profile, &MatchPolicy::default());
        assert_eq!(bonus, None);
    }

    #[test]
    fn test_missing_price_ignores_bound() {
        let profile = SearchProfile::default().with_price_max(1.0);
        let bonus = score_shared_tail(&listing("Car", None, None), &profile, &MatchPolicy::default());
        assert_eq!(bonus, Some(0.0));
    }

    #[test]
    fn test_mileage_rules() {
        let profile = SearchProfile::default().with_mileage_max(30000);
        let policy = MatchPolicy::default();

        assert_eq!(score_shared_tail(&listing("Car", None, Some(29999)), &profile, &policy), Some(5.0));
        assert_eq!(score_shared_tail(&listing("Car", None, Some(30001)), &profile, &policy), None);
    }

    #[test]
    fn test_each_feature_hit_adds_bonus() {
        let profile = SearchProfile::default().with_features_any(&["manual", "PTS", "sunroof"]);
        let bonus = score_shared_tail(
            &listing("2011 Porsche 911 GT3 Manual, Paint-to-Sample (PTS)", None, None),
            &profile,
            &MatchPolicy::default(),
        );
        assert_eq!(bonus, Some(10.0));
    }

    #[test]
    fn test_exclude_keyword_rejects() {
        let profile = SearchProfile::default().with_exclude_keywords(&["salvage", "rebuilt"]);
        let bonus = score_shared_tail(
            &listing("2020 Porsche 911 - Rebuilt Title", Some(1000.0), None),
            &profile,
            &MatchPolicy::default(),
        );
        assert_eq!(bonus, None);
    }
}
