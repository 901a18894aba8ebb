use needed_items::text_processing::{extract_needed_items, normalize, NeedExtractor};
use proptest::prelude::*;
use std::collections::HashSet;

// Property: normalization is idempotent
proptest! {
    #[test]
    fn prop_normalize_idempotent(s in "(?s).*") {
        let once = normalize(&s);
        prop_assert_eq!(normalize(&once), once);
    }
}

// Property: extraction never panics and is deterministic
proptest! {
    #[test]
    fn prop_extract_no_panic_and_deterministic(s in "(?s).{0,200}") {
        let first: HashSet<String> = extract_needed_items(&s).into_iter().map(|i| i.name).collect();
        let second: HashSet<String> = extract_needed_items(&s).into_iter().map(|i| i.name).collect();
        prop_assert_eq!(first, second);
    }
}

fn report_like_text() -> impl Strategy<Value = String> {
    let words = vec![
        "LANケーブル", "脚立", "養生テープ", "今日", "明日は", "テスター", "予備", "部材", "ｎ", "網",
    ];
    let glue = vec![
        "が必要", "を用意する", "と", "、", "の", "は", "を購入します", "が要る", "。", "\n", "必要: ", "2本",
    ];
    prop::collection::vec(
        (proptest::sample::select(words), proptest::sample::select(glue)),
        1..12,
    )
    .prop_map(|parts| {
        parts
            .into_iter()
            .map(|(word, glue)| format!("{word}{glue}"))
            .collect::<String>()
    })
}

// Property: candidates never share characters of the normalized input
proptest! {
    #[test]
    fn prop_candidate_spans_do_not_overlap(text in report_like_text()) {
        let extractor = NeedExtractor::new();
        let candidates = extractor.match_candidates(&normalize(&text));
        for (i, a) in candidates.iter().enumerate() {
            for b in candidates.iter().skip(i + 1) {
                prop_assert!(!a.span.overlaps(&b.span));
            }
        }
    }
}

// Property: every returned name is non-empty and never a stopword
proptest! {
    #[test]
    fn prop_items_are_clean(text in report_like_text()) {
        let extractor = NeedExtractor::new();
        for item in extractor.extract(&text).unwrap() {
            prop_assert!(!item.name.is_empty());
            prop_assert!(!extractor.config().vocabulary.stopwords.contains(&item.name));
        }
    }
}
