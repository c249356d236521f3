//! Typed query AST
//!
//! A small subset of the Elasticsearch query DSL, enough to express the
//! composite search and ranking queries. `Query::to_json` renders the wire
//! form; the in-memory index evaluates the same tree directly.

use serde_json::{json, Map, Value};

use super::documents::fields;

/// How the terms of a `match` query combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Or,
    And,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Or => "or",
            Operator::And => "and",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Match {
        field: String,
        text: String,
        boost: Option<f32>,
        operator: Operator,
    },
    MatchPhrase {
        field: String,
        text: String,
    },
    MultiMatch {
        fields: Vec<String>,
        text: String,
    },
    Term {
        field: String,
        value: Value,
    },
    /// Inclusive range; either bound may be open
    Range {
        field: String,
        gte: Option<String>,
        lte: Option<String>,
    },
    Bool(BoolQuery),
    FunctionScore {
        query: Box<Query>,
        function: ScoreFunction,
    },
}

impl Query {
    pub fn match_text(field: &str, text: &str) -> Self {
        Query::Match {
            field: field.to_string(),
            text: text.to_string(),
            boost: None,
            operator: Operator::Or,
        }
    }

    pub fn match_boosted(field: &str, text: &str, boost: f32) -> Self {
        Query::Match {
            field: field.to_string(),
            text: text.to_string(),
            boost: Some(boost),
            operator: Operator::Or,
        }
    }

    /// Every term must be present
    pub fn match_all_terms(field: &str, text: &str) -> Self {
        Query::Match {
            field: field.to_string(),
            text: text.to_string(),
            boost: None,
            operator: Operator::And,
        }
    }

    pub fn phrase(field: &str, text: &str) -> Self {
        Query::MatchPhrase {
            field: field.to_string(),
            text: text.to_string(),
        }
    }

    pub fn multi_match(fields: &[&str], text: &str) -> Self {
        Query::MultiMatch {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            text: text.to_string(),
        }
    }

    pub fn term(field: &str, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn range(field: &str, gte: Option<&str>, lte: Option<&str>) -> Self {
        Query::Range {
            field: field.to_string(),
            gte: gte.map(String::from),
            lte: lte.map(String::from),
        }
    }

    /// Multiply relevance by the engagement factor
    pub fn engagement_scored(self) -> Self {
        Query::FunctionScore {
            query: Box::new(self),
            function: ScoreFunction::Engagement(EngagementWeights::default()),
        }
    }

    /// Render to Elasticsearch query DSL
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Match { field, text, boost, operator } => {
                let mut body = Map::new();
                body.insert("query".into(), json!(text));
                if *operator != Operator::Or {
                    body.insert("operator".into(), json!(operator.as_str()));
                }
                if let Some(boost) = boost {
                    body.insert("boost".into(), json!(boost));
                }
                json!({ "match": { field: body } })
            }
            Query::MatchPhrase { field, text } => json!({ "match_phrase": { field: text } }),
            Query::MultiMatch { fields, text } => {
                json!({ "multi_match": { "query": text, "fields": fields } })
            }
            Query::Term { field, value } => json!({ "term": { field: { "value": value } } }),
            Query::Range { field, gte, lte } => {
                let mut bounds = Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".into(), json!(gte));
                }
                if let Some(lte) = lte {
                    bounds.insert("lte".into(), json!(lte));
                }
                json!({ "range": { field: bounds } })
            }
            Query::Bool(bool_query) => bool_query.to_json(),
            Query::FunctionScore { query, function } => json!({
                "function_score": {
                    "query": query.to_json(),
                    "functions": [function.to_json()],
                    "score_mode": "multiply",
                    "boost_mode": "multiply"
                }
            }),
        }
    }
}

/// Boolean combination of clauses
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub filter: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn minimum_should_match(mut self, n: u32) -> Self {
        self.minimum_should_match = Some(n);
        self
    }

    /// Number of `should` clauses that must hold. Mirrors the index: with no
    /// `must`/`filter` clauses at least one `should` has to match.
    pub fn required_should(&self) -> usize {
        match self.minimum_should_match {
            Some(n) => n as usize,
            None if self.must.is_empty() && self.filter.is_empty() && !self.should.is_empty() => 1,
            None => 0,
        }
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        let clauses = [("must", &self.must), ("should", &self.should), ("filter", &self.filter)];
        for (name, queries) in clauses {
            if !queries.is_empty() {
                body.insert(name.into(), Value::Array(queries.iter().map(Query::to_json).collect()));
            }
        }
        if let Some(n) = self.minimum_should_match {
            body.insert("minimum_should_match".into(), json!(n));
        }
        json!({ "bool": body })
    }
}

impl From<BoolQuery> for Query {
    fn from(value: BoolQuery) -> Self {
        Query::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFunction {
    Engagement(EngagementWeights),
}

impl ScoreFunction {
    fn to_json(&self) -> Value {
        match self {
            ScoreFunction::Engagement(weights) => json!({
                "script_score": {
                    "script": { "source": weights.painless_source(), "lang": "painless" }
                }
            }),
        }
    }
}

/// Fixed engagement weighting:
/// `1 + (log1p(citations)*1.2 + log1p(favourites)*1.0 + log1p(reads)*0.8) / 3`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngagementWeights {
    pub citations: f64,
    pub favourites: f64,
    pub reads: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            citations: 1.2,
            favourites: 1.0,
            reads: 0.8,
        }
    }
}

impl EngagementWeights {
    /// Missing counters count as zero
    pub fn factor(&self, citations: Option<i64>, favourites: Option<i64>, reads: Option<i64>) -> f64 {
        let term = |count: Option<i64>, weight: f64| (count.unwrap_or(0).max(0) as f64).ln_1p() * weight;
        1.0 + (term(citations, self.citations) + term(favourites, self.favourites) + term(reads, self.reads)) / 3.0
    }

    pub fn painless_source(&self) -> String {
        let term = |field: &str, weight: f64| {
            format!(
                "(doc.containsKey('{f}') && doc['{f}'].size() > 0 ? Math.log1p(doc['{f}'].value) * {w:?} : 0.0)",
                f = field,
                w = weight
            )
        };
        format!(
            "return 1.0 + ({} + {} + {}) / 3.0;",
            term(fields::CITED_BY_COUNT, self.citations),
            term(fields::FAVOURITE_COUNT, self.favourites),
            term(fields::READ_COUNT, self.reads)
        )
    }
}

/// Atomic counter update executed inside the index
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateScript {
    /// Positive deltas initialise a missing counter; negative deltas only
    /// apply while the counter is above zero.
    Increment { field: String, delta: i64 },
}

impl UpdateScript {
    pub fn increment(field: &str, delta: i64) -> Self {
        UpdateScript::Increment {
            field: field.to_string(),
            delta,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            UpdateScript::Increment { field, delta } => {
                let source = if *delta > 0 {
                    format!(
                        "if (ctx._source['{f}'] == null) {{ ctx._source['{f}'] = params.delta }} else {{ ctx._source['{f}'] += params.delta }}",
                        f = field
                    )
                } else {
                    format!(
                        "if (ctx._source['{f}'] != null && ctx._source['{f}'] > 0) {{ ctx._source['{f}'] += params.delta }}",
                        f = field
                    )
                };
                json!({
                    "script": {
                        "source": source,
                        "lang": "painless",
                        "params": { "delta": delta }
                    }
                })
            }
        }
    }

    /// Apply the script to a document source the way the index would
    pub fn apply(&self, source: &mut Value) {
        let UpdateScript::Increment { field, delta } = self;
        let Some(object) = source.as_object_mut() else {
            return;
        };
        let current = object.get(field).and_then(Value::as_i64);
        let next = match current {
            None if *delta > 0 => Some(*delta),
            Some(count) if *delta > 0 => Some(count + delta),
            Some(count) if count > 0 => Some(count + delta),
            _ => None,
        };
        if let Some(next) = next {
            object.insert(field.clone(), json!(next));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_factor() {
        let weights = EngagementWeights::default();
        assert_eq!(weights.factor(None, None, None), 1.0);

        let expected = 1.0 + ((100f64).ln_1p() * 1.2 + (4f64).ln_1p() * 1.0 + (9f64).ln_1p() * 0.8) / 3.0;
        assert!((weights.factor(Some(100), Some(4), Some(9)) - expected).abs() < 1e-12);
        assert!(weights.factor(Some(10), None, None) > weights.factor(Some(9), None, None));
    }

    #[test]
    fn test_function_score_json() {
        let query = Query::MatchAll.engagement_scored().to_json();
        let fs = &query["function_score"];
        assert_eq!(fs["score_mode"], "multiply");
        assert_eq!(fs["boost_mode"], "multiply");
        let source = fs["functions"][0]["script_score"]["script"]["source"].as_str().unwrap();
        assert!(source.contains("cited_by_count"));
        assert!(source.contains("* 1.2"));
        assert!(source.contains("* 0.8"));
    }

    #[test]
    fn test_bool_json_omits_empty_clauses() {
        let query: Query = BoolQuery::new()
            .should(Query::match_boosted("title", "graphene", 3.0))
            .minimum_should_match(1)
            .into();
        let json = query.to_json();
        assert!(json["bool"].get("must").is_none());
        assert_eq!(json["bool"]["minimum_should_match"], 1);
        assert_eq!(json["bool"]["should"][0]["match"]["title"]["boost"], 3.0);
    }

    #[test]
    fn test_half_open_range() {
        let json = Query::range("publication_date", Some("2020-01-01"), None).to_json();
        assert_eq!(json["range"]["publication_date"]["gte"], "2020-01-01");
        assert!(json["range"]["publication_date"].get("lte").is_none());
    }

    #[test]
    fn test_decrement_never_goes_negative() {
        let down = UpdateScript::increment("favouriteCount", -1);
        let up = UpdateScript::increment("favouriteCount", 1);

        let mut doc = json!({ "id": "W1" });
        down.apply(&mut doc);
        assert!(doc.get("favouriteCount").is_none());

        up.apply(&mut doc);
        assert_eq!(doc["favouriteCount"], 1);
        down.apply(&mut doc);
        down.apply(&mut doc);
        assert_eq!(doc["favouriteCount"], 0);
    }

    #[test]
    fn test_update_script_json() {
        let json = UpdateScript::increment("readCount", 1).to_json();
        assert_eq!(json["script"]["params"]["delta"], 1);
        assert!(json["script"]["source"].as_str().unwrap().contains("== null"));
        let json = UpdateScript::increment("favouriteCount", -1).to_json();
        assert!(json["script"]["source"].as_str().unwrap().contains("> 0"));
    }
}
