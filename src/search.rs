//! Token Search
//!
//! Free-text search over the data index: a query is lowercased,
//! whitespace-split, and each token classified as an include/exclude
//! keyword, an include/exclude operation type, an entry id, or a free
//! token. The filter evaluator runs a linear scan over an entity slice,
//! applying bitmask filters first and substring filters last, with
//! skip/limit pagination and an exact total match count.

use crate::index::{Program, Sequence, Submitter};
use crate::keywords;
use crate::optypes::OpTypeIndex;
use crate::uid::Uid;

/// A parsed search query.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub include_keywords: u64,
    pub exclude_keywords: u64,
    pub include_ops: u64,
    pub exclude_ops: u64,
    pub uids: Vec<Uid>,
    pub free_tokens: Vec<String>,
}

/// Classify the tokens of `q`. Keyword and operation names may carry an
/// optional `+` (include, the default) or `-`/`!` (exclude) prefix;
/// anything that parses as an entry id becomes an id token; the rest are
/// free tokens matched as substrings.
pub fn parse_search_query(q: &str, optypes: &OpTypeIndex) -> SearchQuery {
    let mut query = SearchQuery::default();
    for raw in q.to_lowercase().split_whitespace() {
        let (exclude, token) = match raw.strip_prefix('-').or_else(|| raw.strip_prefix('!')) {
            Some(stripped) => (true, stripped),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        if let Ok(bit) = keywords::bit(token) {
            if exclude {
                query.exclude_keywords |= bit;
            } else {
                query.include_keywords |= bit;
            }
            continue;
        }
        if let Some(bit) = optypes.bit(token) {
            if exclude {
                query.exclude_ops |= bit;
            } else {
                query.include_ops |= bit;
            }
            continue;
        }
        if let Ok(uid) = raw.to_uppercase().parse::<Uid>() {
            query.uids.push(uid);
            continue;
        }
        query.free_tokens.push(raw.to_string());
    }
    query
}

/// Anything the filter evaluator can scan.
pub trait SearchEntity {
    fn uid(&self) -> Uid;
    fn name(&self) -> &str;
    fn keyword_mask(&self) -> u64;
    /// `None` for entities without an operation mask; the op filters are
    /// then not applied.
    fn op_mask(&self) -> Option<u64>;
    fn submitter_name(&self) -> Option<&str>;
    fn authors(&self) -> &[Submitter];
}

impl SearchEntity for Sequence {
    fn uid(&self) -> Uid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn keyword_mask(&self) -> u64 {
        self.keywords
    }
    fn op_mask(&self) -> Option<u64> {
        None
    }
    fn submitter_name(&self) -> Option<&str> {
        self.submitter.as_ref().map(|s| s.name.as_str())
    }
    fn authors(&self) -> &[Submitter] {
        &self.authors
    }
}

impl SearchEntity for Program {
    fn uid(&self) -> Uid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn keyword_mask(&self) -> u64 {
        self.keywords
    }
    fn op_mask(&self) -> Option<u64> {
        Some(self.ops_mask)
    }
    fn submitter_name(&self) -> Option<&str> {
        self.submitter.as_ref().map(|s| s.name.as_str())
    }
    fn authors(&self) -> &[Submitter] {
        &[]
    }
}

/// Linear scan of `entities` against `query`. Returns the requested page
/// and the exact number of entities matching all filters.
pub fn search<'a, T: SearchEntity>(
    entities: &'a [T],
    query: &SearchQuery,
    limit: usize,
    skip: usize,
) -> (Vec<&'a T>, usize) {
    let mut results = Vec::new();
    let mut total = 0usize;
    for entity in entities {
        if !matches(entity, query) {
            continue;
        }
        total += 1;
        if total > skip && results.len() < limit {
            results.push(entity);
        }
    }
    (results, total)
}

fn matches<T: SearchEntity>(entity: &T, query: &SearchQuery) -> bool {
    let kw = entity.keyword_mask();
    if !keywords::has_all(kw, query.include_keywords)
        || !keywords::has_none(kw, query.exclude_keywords)
    {
        return false;
    }
    if let Some(ops) = entity.op_mask() {
        if !keywords::has_all(ops, query.include_ops)
            || !keywords::has_none(ops, query.exclude_ops)
        {
            return false;
        }
    }
    for uid in &query.uids {
        if entity.uid() != *uid && !entity.name().contains(&uid.to_string()) {
            return false;
        }
    }
    if query.free_tokens.is_empty() {
        return true;
    }
    let name = entity.name().to_lowercase();
    let submitter = entity
        .submitter_name()
        .map(str::to_lowercase)
        .unwrap_or_default();
    for token in &query.free_tokens {
        let in_name = name.contains(token);
        let in_submitter = !submitter.is_empty() && submitter.contains(token);
        let in_authors = entity
            .authors()
            .iter()
            .any(|a| a.name.to_lowercase().contains(token));
        if !in_name && !in_submitter && !in_authors {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optypes() -> OpTypeIndex {
        let csv = "name,ref_id,num_programs\nmov,1,1\nadd,2,1\nlpb,3,1\n";
        OpTypeIndex::from_reader(csv.as_bytes()).unwrap()
    }

    fn sequence(id: &str, name: &str, kws: &[&str]) -> Sequence {
        Sequence {
            id: id.parse().unwrap(),
            name: name.to_string(),
            keywords: keywords::encode(kws.iter().copied()).unwrap(),
            terms: String::new(),
            authors: Vec::new(),
            submitter: None,
        }
    }

    /// Ten sequences; seven carry "core", one carries "hard".
    fn seed() -> Vec<Sequence> {
        vec![
            sequence("A000001", "Number of groups of order n.", &["nonn", "core", "nice"]),
            sequence("A000002", "Kolakoski sequence", &["nonn", "core"]),
            sequence("A000003", "Class numbers", &["nonn"]),
            sequence("A000004", "The zero sequence", &["core", "easy"]),
            sequence("A000005", "d(n), the number of divisors", &["nonn", "core"]),
            sequence("A000006", "Integer part of square root", &["nonn"]),
            sequence("A000007", "The characteristic function of {0}", &["core"]),
            sequence("A000008", "Ways of making change", &["nonn", "hard"]),
            sequence("A000009", "Partitions into odd parts", &["nonn", "core"]),
            sequence("A000045", "Fibonacci numbers: A000045 grows.", &["nonn", "core", "nice"]),
        ]
    }

    #[test]
    fn test_parse_classifies_tokens() {
        let optypes = optypes();
        let query = parse_search_query("+core -hard mov !add A000045 fib", &optypes);
        assert_eq!(query.include_keywords, keywords::bit("core").unwrap());
        assert_eq!(query.exclude_keywords, keywords::bit("hard").unwrap());
        assert_eq!(query.include_ops, optypes.bit("mov").unwrap());
        assert_eq!(query.exclude_ops, optypes.bit("add").unwrap());
        assert_eq!(query.uids, vec!["A000045".parse::<Uid>().unwrap()]);
        assert_eq!(query.free_tokens, vec!["fib"]);
    }

    #[test]
    fn test_parse_lowercases_uid_tokens() {
        let query = parse_search_query("a000045", &OpTypeIndex::empty());
        assert_eq!(query.uids, vec!["A000045".parse::<Uid>().unwrap()]);
        assert!(query.free_tokens.is_empty());
    }

    #[test]
    fn test_plain_keyword_is_included() {
        let query = parse_search_query("core", &OpTypeIndex::empty());
        assert_eq!(query.include_keywords, keywords::bit("core").unwrap());
    }

    #[test]
    fn test_keyword_include_filter() {
        let entities = seed();
        let query = parse_search_query("+core", &OpTypeIndex::empty());
        let (results, total) = search(&entities, &query, 100, 0);
        assert_eq!(total, 7);
        assert!(results
            .iter()
            .all(|s| s.keywords & keywords::bit("core").unwrap() != 0));
    }

    #[test]
    fn test_keyword_exclude_filter() {
        let entities = seed();
        let query = parse_search_query("-hard", &OpTypeIndex::empty());
        let (_, total) = search(&entities, &query, 100, 0);
        assert_eq!(total, 9);
    }

    #[test]
    fn test_uid_token_matches_id_or_name() {
        let entities = seed();
        let query = parse_search_query("A000045", &OpTypeIndex::empty());
        let (results, total) = search(&entities, &query, 100, 0);
        assert_eq!(total, 1);
        assert_eq!(results[0].id.to_string(), "A000045");

        // An entity whose *name* carries the literal id also matches.
        let mut entities = seed();
        entities[2].name = "Related to A000045 somehow".to_string();
        let (_, total) = search(&entities, &query, 100, 0);
        assert_eq!(total, 2);
    }

    #[test]
    fn test_free_token_matches_name_case_insensitive() {
        let entities = seed();
        let query = parse_search_query("kolakoski", &OpTypeIndex::empty());
        let (results, total) = search(&entities, &query, 100, 0);
        assert_eq!(total, 1);
        assert_eq!(results[0].id.to_string(), "A000002");
    }

    #[test]
    fn test_free_token_matches_author_and_submitter() {
        let mut entities = seed();
        entities[0].authors.push(Submitter {
            name: "N. J. A. Sloane".to_string(),
            ref_id: 0,
            num_programs: 0,
        });
        entities[1].submitter = Some(Submitter {
            name: "alice".to_string(),
            ref_id: 1,
            num_programs: 1,
        });
        let (_, total) = search(&entities, &parse_search_query("sloane", &OpTypeIndex::empty()), 10, 0);
        assert_eq!(total, 1);
        let (_, total) = search(&entities, &parse_search_query("alice", &OpTypeIndex::empty()), 10, 0);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_pagination_bounds_results_but_not_total() {
        let entities = seed();
        let query = parse_search_query("+core", &OpTypeIndex::empty());
        let (results, total) = search(&entities, &query, 2, 0);
        assert_eq!(total, 7);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id.to_string(), "A000001");

        let (results, total) = search(&entities, &query, 2, 2);
        assert_eq!(total, 7);
        assert_eq!(results[0].id.to_string(), "A000004");
    }

    #[test]
    fn test_op_filter_applies_to_programs_only() {
        let optypes = optypes();
        let program = Program {
            id: "A000045".parse().unwrap(),
            name: "Fibonacci numbers".to_string(),
            code: String::new(),
            submitter: None,
            keywords: keywords::bit("loda").unwrap(),
            ops_mask: optypes.encode(["mov", "lpb"]).unwrap(),
            operations: vec!["mov".to_string(), "lpb".to_string()],
            formula: String::new(),
            length: 2,
            usages: String::new(),
        };
        let programs = vec![program];

        let query = parse_search_query("lpb", &optypes);
        let (_, total) = search(&programs, &query, 10, 0);
        assert_eq!(total, 1);

        let query = parse_search_query("!lpb", &optypes);
        let (_, total) = search(&programs, &query, 10, 0);
        assert_eq!(total, 0);

        // Sequences carry no op mask, so op filters do not reject them.
        let sequences = seed();
        let query = parse_search_query("mov", &optypes);
        let (_, total) = search(&sequences, &query, 100, 0);
        assert_eq!(total, 10);
    }

    #[test]
    fn test_combined_filters() {
        let entities = seed();
        let query = parse_search_query("+core nice", &OpTypeIndex::empty());
        let (results, total) = search(&entities, &query, 100, 0);
        assert_eq!(total, 2);
        assert!(results.iter().all(|s| s.name.contains("n")));
    }
}
