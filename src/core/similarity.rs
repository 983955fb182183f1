/// Score for identical or fully contained strings
pub const MAX_SIMILARITY: f64 = 100.0;

/// Fuzzy partial-ratio similarity on a 0-100 scale
///
/// Both operands are lower-cased. The shorter string is slid over every
/// equal-length character window of the longer one and each window is scored
/// by its Indel similarity (insertions and deletions only, so a swapped pair
/// of letters costs less than two substitutions); the best window wins. A
/// plain substring hit short-circuits to 100.
///
/// An empty operand scores 0, so a blank field can never satisfy a threshold.
///
/// # Examples
/// * `partial_ratio("Porsche", "2020 Porsche 911")` is 100
/// * `partial_ratio("Alfa Romeo", "alfa romea")` is 90
/// * `partial_ratio("Carrera", "Carerra")` is about 85.7
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    if long.contains(short.as_str()) {
        return MAX_SIMILARITY;
    }

    let short_chars: Vec<char> = short.chars().collect();
    let long_chars: Vec<char> = long.chars().collect();

    long_chars
        .windows(short_chars.len())
        .map(|window| indel_ratio(&short_chars, window))
        .fold(0.0, f64::max)
}

/// Normalized Indel similarity: `200 * LCS / (|a| + |b|)`
#[inline]
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    (2 * lcs_len(a, b)) as f64 * MAX_SIMILARITY / total as f64
}

/// Length of the longest common subsequence, two-row dynamic programming
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_scores_max() {
        assert_eq!(partial_ratio("Porsche", "2020 Porsche 911 Carrera"), 100.0);
        assert_eq!(partial_ratio("911", "2020 porsche 911"), 100.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(partial_ratio("FERRARI", "ferrari"), 100.0);
    }

    #[test]
    fn test_operand_order_does_not_matter() {
        let forward = partial_ratio("Lamborghini", "lamborghine huracan");
        let backward = partial_ratio("lamborghine huracan", "Lamborghini");
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_single_edit_over_ten_chars_is_exactly_ninety() {
        assert_eq!(partial_ratio("Alfa Romeo", "Alfa Romea"), 90.0);
    }

    #[test]
    fn test_single_edit_over_eleven_chars_is_above_ninety() {
        let score = partial_ratio("Lamborghini", "Lamborghine");
        assert!(score > 90.0 && score < 91.0, "got {}", score);
    }

    #[test]
    fn test_empty_operand_scores_zero() {
        assert_eq!(partial_ratio("", "porsche"), 0.0);
        assert_eq!(partial_ratio("porsche", ""), 0.0);
    }

    #[test]
    fn test_unrelated_strings_score_low() {
        assert!(partial_ratio("Ferrari", "Toyota Camry") < 50.0);
    }

    #[test]
    fn test_transposed_letters_stay_close() {
        let carrera = partial_ratio("Carrera", "Carerra");
        assert!(carrera > 85.0 && carrera < 86.0, "got {}", carrera);

        let porsche = partial_ratio("Porsche", "Porshce");
        assert!(porsche > 85.0 && porsche < 86.0, "got {}", porsche);

        assert_eq!(partial_ratio("Countach", "Countahc"), 87.5);
    }

    #[test]
    fn test_transposition_found_inside_title() {
        let score = partial_ratio("carrera", "2019 Porsche 911 Carerra S");
        assert!(score > 85.0, "got {}", score);
    }

    #[test]
    fn test_lcs_len() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(lcs_len(&chars("carrera"), &chars("carerra")), 6);
        assert_eq!(lcs_len(&chars("abc"), &chars("xyz")), 0);
        assert_eq!(lcs_len(&chars(""), &chars("abc")), 0);
        assert_eq!(indel_ratio(&chars("alfa romeo"), &chars("alfa romea")), 90.0);
        assert_eq!(indel_ratio(&[], &[]), 0.0);
    }
}
