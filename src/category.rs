// src/category.rs

use crate::models::Gender;

type KeywordTable = &'static [(&'static str, &'static [&'static str])];

// Order matters: the first keyword contained in the product type wins.
const FEMALE_CATEGORIES: KeywordTable = &[
    ("원피스", &["50000804", "50000805", "50000806"]),
    ("블라우스", &["50000167", "50000168"]),
    ("니트", &["50000160", "50000161"]),
    ("티셔츠", &["50000158", "50000159"]),
    ("팬츠", &["50000171", "50000172"]),
    ("스커트", &["50000169", "50000170"]),
    ("자켓", &["50000163", "50000164"]),
    ("코트", &["50000165", "50000166"]),
    ("가디건", &["50000162"]),
];

const MALE_CATEGORIES: KeywordTable = &[
    ("티셔츠", &["50000201", "50000202"]),
    ("셔츠", &["50000203", "50000204"]),
    ("니트", &["50000205", "50000206"]),
    ("팬츠", &["50000207", "50000208"]),
    ("자켓", &["50000209", "50000210"]),
    ("코트", &["50000211", "50000212"]),
];

const FEMALE_DEFAULT: &str = "50000158";
const MALE_DEFAULT: &str = "50000201";

/// Candidate category ids for a free-text product type, best first.
pub fn suggest(product_type: &str, gender: Gender) -> Vec<String> {
    let (table, default_id) = match gender {
        Gender::Female => (FEMALE_CATEGORIES, FEMALE_DEFAULT),
        Gender::Male => (MALE_CATEGORIES, MALE_DEFAULT),
    };

    table
        .iter()
        .find(|(keyword, _)| product_type.contains(keyword))
        .map(|(_, ids)| ids.iter().map(|id| id.to_string()).collect())
        .unwrap_or_else(|| vec![default_id.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn dress_keyword_matches() {
        assert_eq!(
            suggest("여성 원피스 롱", Gender::Female),
            vec!["50000804", "50000805", "50000806"]
        );
    }

    #[test]
    fn suggestion_is_stable_across_calls() {
        let first = suggest("여성 원피스 롱", Gender::Female);
        for _ in 0..10 {
            assert_eq!(suggest("여성 원피스 롱", Gender::Female), first);
        }
    }

    #[test]
    fn first_mapped_keyword_wins() {
        // "티셔츠" is listed before "셔츠" and both are contained.
        assert_eq!(suggest("오버핏 티셔츠", Gender::Male), vec!["50000201", "50000202"]);
        // "니트" comes before "가디건" in the female table.
        assert_eq!(suggest("니트 가디건", Gender::Female), vec!["50000160", "50000161"]);
    }

    #[test]
    fn gender_selects_the_table() {
        assert_eq!(suggest("니트", Gender::Female), vec!["50000160", "50000161"]);
        assert_eq!(suggest("니트", Gender::Male), vec!["50000205", "50000206"]);
    }

    #[test]
    fn unknown_type_falls_back_to_default() {
        assert_eq!(suggest("모자", Gender::Female), vec![FEMALE_DEFAULT]);
        assert_eq!(suggest("", Gender::Male), vec![MALE_DEFAULT]);
    }

    #[test]
    fn every_gender_has_a_single_default() {
        for gender in Gender::iter() {
            assert_eq!(suggest("액세서리", gender).len(), 1);
        }
    }
}
