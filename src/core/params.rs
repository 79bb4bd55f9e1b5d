//! Typed tool parameter records.
//!
//! Every query a tool agent issues is recorded in the per-question dedup
//! history. The records here are what the model extracts from the question
//! and what the duplicate predicates compare against.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Default BLAST hit list size.
pub const DEFAULT_HITLIST_SIZE: u32 = 10;
/// Default E-utilities search result limit.
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Parameters of a sequence-alignment submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentParams {
    /// The nucleotide sequence literal.
    pub sequence: String,
    /// Number of hits to return.
    #[serde(default = "default_hitlist_size", alias = "limit")]
    pub hitlist_size: u32,
}

const fn default_hitlist_size() -> u32 {
    DEFAULT_HITLIST_SIZE
}

impl AlignmentParams {
    /// Returns `true` if `history` already holds the same sequence.
    ///
    /// The hit count is ignored: resubmitting a sequence with a different
    /// count is still a duplicate.
    #[must_use]
    pub fn is_duplicate(&self, history: &[Self]) -> bool {
        let seq = self.sequence.trim();
        history.iter().any(|p| p.sequence.trim() == seq)
    }
}

/// Target database of a structured lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    /// Genes: symbols, aliases, function, location.
    Gene,
    /// Variants: rs identifiers.
    Snp,
    /// Disorders and phenotypes.
    Omim,
}

impl Database {
    /// Returns the E-utilities `db` parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gene => "gene",
            Self::Snp => "snp",
            Self::Omim => "omim",
        }
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// E-utilities detail method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Full records.
    Efetch,
    /// Document summaries.
    #[default]
    Esummary,
}

impl FetchMethod {
    /// Returns the E-utilities endpoint name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Efetch => "efetch",
            Self::Esummary => "esummary",
        }
    }
}

/// Parameters of a database search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Database to search.
    pub db: Database,
    /// Search term.
    pub term: String,
    /// Maximum identifiers returned.
    #[serde(default = "default_search_limit", alias = "retmax")]
    pub limit: u32,
}

const fn default_search_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

/// Parameters of a database detail fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    /// Detail endpoint.
    #[serde(default)]
    pub method: FetchMethod,
    /// Database holding the identifiers.
    pub db: Database,
    /// Record identifiers. Accepts a comma-delimited string or an array.
    #[serde(alias = "id", deserialize_with = "deserialize_ids")]
    pub ids: Vec<String>,
}

impl FetchParams {
    /// Returns the identifiers as an order-free set.
    #[must_use]
    pub fn id_set(&self) -> BTreeSet<&str> {
        self.ids.iter().map(String::as_str).collect()
    }

    /// Returns the identifiers joined for a request URL.
    #[must_use]
    pub fn joined_ids(&self) -> String {
        self.ids.join(",")
    }
}

fn deserialize_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ids {
        Delimited(String),
        Number(u64),
        List(Vec<serde_json::Value>),
    }

    let raw = match Ids::deserialize(deserializer)? {
        Ids::Delimited(s) => s.split(',').map(str::to_string).collect(),
        Ids::Number(n) => vec![n.to_string()],
        Ids::List(values) => values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>(),
    };

    let ids: Vec<String> = raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if ids.is_empty() {
        return Err(serde::de::Error::custom("no identifiers given"));
    }
    Ok(ids)
}

/// One entry of the database agent's dedup history.
///
/// Search and fetch entries share a history but never collide with each
/// other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum DatabaseQuery {
    /// An issued search.
    Search(SearchParams),
    /// An issued fetch.
    Fetch(FetchParams),
}

impl SearchParams {
    /// Returns `true` if a prior search used the same database and term.
    #[must_use]
    pub fn is_duplicate(&self, history: &[DatabaseQuery]) -> bool {
        history.iter().any(|q| match q {
            DatabaseQuery::Search(p) => p.db == self.db && p.term == self.term,
            DatabaseQuery::Fetch(_) => false,
        })
    }
}

impl FetchParams {
    /// Returns `true` if a prior fetch used the same database and id set.
    #[must_use]
    pub fn is_duplicate(&self, history: &[DatabaseQuery]) -> bool {
        let ids = self.id_set();
        history.iter().any(|q| match q {
            DatabaseQuery::Fetch(p) => p.db == self.db && p.id_set() == ids,
            DatabaseQuery::Search(_) => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn search(db: Database, term: &str) -> DatabaseQuery {
        DatabaseQuery::Search(SearchParams {
            db,
            term: term.to_string(),
            limit: 10,
        })
    }

    fn fetch(db: Database, ids: &[&str]) -> FetchParams {
        FetchParams {
            method: FetchMethod::Esummary,
            db,
            ids: ids.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_alignment_duplicate_ignores_hit_count() {
        let history = vec![AlignmentParams {
            sequence: "ATTCTGCC".to_string(),
            hitlist_size: 10,
        }];
        let again = AlignmentParams {
            sequence: "ATTCTGCC".to_string(),
            hitlist_size: 50,
        };
        assert!(again.is_duplicate(&history));

        let other = AlignmentParams {
            sequence: "GGGTTTAA".to_string(),
            hitlist_size: 10,
        };
        assert!(!other.is_duplicate(&history));
    }

    #[test]
    fn test_search_duplicate_is_db_scoped() {
        let history = vec![search(Database::Gene, "LMP10")];
        let same = SearchParams {
            db: Database::Gene,
            term: "LMP10".to_string(),
            limit: 5,
        };
        let other_db = SearchParams {
            db: Database::Omim,
            term: "LMP10".to_string(),
            limit: 10,
        };
        assert!(same.is_duplicate(&history));
        assert!(!other_db.is_duplicate(&history));
    }

    #[test]
    fn test_fetch_duplicate_ignores_order() {
        let history = vec![DatabaseQuery::Fetch(fetch(
            Database::Gene,
            &["19171", "5699", "8138"],
        ))];
        assert!(fetch(Database::Gene, &["8138", "19171", "5699"]).is_duplicate(&history));
        assert!(!fetch(Database::Gene, &["8138", "19171"]).is_duplicate(&history));
        assert!(!fetch(Database::Snp, &["19171", "5699", "8138"]).is_duplicate(&history));
    }

    #[test]
    fn test_search_and_fetch_do_not_collide() {
        let history = vec![DatabaseQuery::Fetch(fetch(Database::Gene, &["LMP10"]))];
        let s = SearchParams {
            db: Database::Gene,
            term: "LMP10".to_string(),
            limit: 10,
        };
        assert!(!s.is_duplicate(&history));
    }

    #[test_case(r#"{"method":"efetch","db":"gene","id":"19171,5699"}"#, &["19171", "5699"]; "delimited")]
    #[test_case(r#"{"db":"snp","ids":["1217074595"]}"#, &["1217074595"]; "array")]
    #[test_case(r#"{"db":"omim","id":618767}"#, &["618767"]; "bare number")]
    #[test_case(r#"{"db":"gene","id":" 1 , 2 ,"}"#, &["1", "2"]; "padded")]
    fn test_fetch_params_ids(json: &str, expected: &[&str]) {
        let params: FetchParams =
            serde_json::from_str(json).unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(params.ids, expected);
    }

    #[test]
    fn test_fetch_params_rejects_empty_ids() {
        let result: Result<FetchParams, _> = serde_json::from_str(r#"{"db":"gene","id":""}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_params_defaults_and_alias() {
        let p: SearchParams = serde_json::from_str(r#"{"db":"gene","term":"BRCA1"}"#)
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(p.limit, DEFAULT_SEARCH_LIMIT);

        let p: SearchParams =
            serde_json::from_str(r#"{"db":"snp","term":"rs1217074595","retmax":5}"#)
                .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(p.db, Database::Snp);
        assert_eq!(p.limit, 5);
    }

    #[test]
    fn test_unknown_database_rejected() {
        let result: Result<SearchParams, _> =
            serde_json::from_str(r#"{"db":"pubmed","term":"x"}"#);
        assert!(result.is_err());
    }
}
