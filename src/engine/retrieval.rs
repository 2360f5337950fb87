use std::cmp::Reverse;

use crate::model::Category;

pub const RETRIEVAL_TOP_N: usize = 50;

const HAYSTACK_HIT: u32 = 10;
const NAME_HIT: u32 = 5;
const PATH_HIT: u32 = 3;

/// Ranks `categories` by keyword overlap with `query` and keeps the top 50.
///
/// Tokens are whitespace-separated, lower-cased, and must be longer than one
/// UTF-16 code unit, so a lone emoji still counts. Ties keep catalog order.
pub fn score<'a>(query: &str, categories: &'a [Category]) -> Vec<&'a Category> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut scored = categories
        .iter()
        .map(|category| (category_score(&tokens, category), category))
        .filter(|(score, _)| *score > 0)
        .collect::<Vec<(u32, &Category)>>();

    scored.sort_by_key(|(score, _)| Reverse(*score));
    scored.truncate(RETRIEVAL_TOP_N);

    scored.into_iter().map(|(_, category)| category).collect()
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|token| token.encode_utf16().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn category_score(tokens: &[String], category: &Category) -> u32 {
    let name = category.category_name.to_lowercase();
    let path = category.full_path.as_deref().map(str::to_lowercase);
    let haystack = format!("{} {}", name, path.as_deref().unwrap_or(""));

    let mut total = 0;
    for token in tokens {
        if !haystack.contains(token.as_str()) {
            continue;
        }

        total += HAYSTACK_HIT;
        if name.contains(token.as_str()) {
            total += NAME_HIT;
        }
        if path
            .as_deref()
            .is_some_and(|path| path.contains(token.as_str()))
        {
            total += PATH_HIT;
        }
    }

    total
}
