use super::*;

#[test]
fn test_literal_pattern() {
    let p = GlobPattern::new("fct_orders").unwrap();
    assert!(p.is_literal());
    assert!(p.matches("fct_orders"));
    assert!(!p.matches("fct_orders_v2"));
    assert!(!p.matches("x_fct_orders"));
}

#[test]
fn test_star_matches_any_suffix() {
    let p = GlobPattern::new("stg_*").unwrap();
    assert!(!p.is_literal());
    assert!(p.matches("stg_users"));
    assert!(p.matches("stg_"));
    assert!(!p.matches("fct_stg_users"));
}

#[test]
fn test_question_mark_matches_one_char() {
    let p = GlobPattern::new("dim_?").unwrap();
    assert!(p.matches("dim_a"));
    assert!(!p.matches("dim_ab"));
    assert!(!p.matches("dim_"));
}

#[test]
fn test_character_class() {
    let p = GlobPattern::new("mart_[ab]*").unwrap();
    assert!(p.matches("mart_alpha"));
    assert!(p.matches("mart_beta"));
    assert!(!p.matches("mart_gamma"));

    let negated = GlobPattern::new("mart_[!ab]*").unwrap();
    assert!(negated.matches("mart_gamma"));
    assert!(!negated.matches("mart_alpha"));
}

#[test]
fn test_class_set_operators_are_literal() {
    let p = GlobPattern::new("x_[a&&b]").unwrap();
    assert!(p.matches("x_a"));
    assert!(p.matches("x_&"));
    assert!(!p.matches("x_c"));

    let p = GlobPattern::new("x_[a--b]").unwrap();
    assert!(p.matches("x_a"));
    assert!(p.matches("x_-"));
    assert!(p.matches("x_b"));
    assert!(!p.matches("x_c"));

    let p = GlobPattern::new("x_[~~z]").unwrap();
    assert!(p.matches("x_~"));
    assert!(p.matches("x_z"));
    assert!(!p.matches("x_y"));

    // ranges and a leading caret keep their glob meaning
    let p = GlobPattern::new("x_[a-c^]").unwrap();
    assert!(p.matches("x_b"));
    assert!(p.matches("x_^"));
    assert!(!p.matches("x_d"));
    assert!(GlobPattern::new("x_[^a]").unwrap().matches("x_^"));
}

#[test]
fn test_regex_metacharacters_are_literal() {
    let p = GlobPattern::new("a.b+c").unwrap();
    assert!(p.matches("a.b+c"));
    assert!(!p.matches("aXbbc"));
}

#[test]
fn test_invalid_patterns() {
    assert!(matches!(
        GlobPattern::new(""),
        Err(CoreError::InvalidPattern { .. })
    ));
    assert!(matches!(
        GlobPattern::new("stg_[abc"),
        Err(CoreError::InvalidPattern { .. })
    ));
    assert!(matches!(
        GlobPattern::new("stg_[!]"),
        Err(CoreError::InvalidPattern { .. })
    ));
}

#[test]
fn test_deserialize_rejects_bad_pattern() {
    let ok: GlobPattern = serde_yaml::from_str("\"large_*\"").unwrap();
    assert_eq!(ok.as_str(), "large_*");
    assert!(serde_yaml::from_str::<GlobPattern>("\"large_[\"").is_err());
}
