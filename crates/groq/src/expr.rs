//! Typed filter/order expressions rendered to parametrized GROQ.
//!
//! Values never appear inline in the query text; every literal becomes a
//! numbered `$p{n}` parameter bound in the accompanying map. Fixed
//! structural fragments (draft-path predicates) are the one exception,
//! exposed as named constructors so callers cannot smuggle raw strings in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `field == $p`
    Eq { field: String, value: Value },
    /// `field match $p`; pattern should already be sanitized.
    Match { field: String, pattern: String },
    /// `field in $p` with an array parameter.
    In { field: String, values: Vec<Value> },
    /// `defined(field)`
    Defined { field: String },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    /// `_id in path("drafts.**")`
    DraftsOnly,
    /// `!(_id in path("drafts.**"))`
    NoDrafts,
}

impl FilterExpr {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn type_is(doc_type: impl Into<Value>) -> Self {
        Self::eq("_type", doc_type)
    }

    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        FilterExpr::Match {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn id_in(ids: &[String]) -> Self {
        FilterExpr::In {
            field: "_id".into(),
            values: ids.iter().map(|id| Value::String(id.clone())).collect(),
        }
    }

    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        FilterExpr::In {
            field: field.into(),
            values,
        }
    }

    pub fn defined(field: impl Into<String>) -> Self {
        FilterExpr::Defined {
            field: field.into(),
        }
    }

    pub fn and(exprs: Vec<FilterExpr>) -> Self {
        FilterExpr::And(exprs)
    }

    fn render(&self, params: &mut ParamBinder) -> String {
        match self {
            FilterExpr::Eq { field, value } => {
                let name = params.bind(value.clone());
                format!("{field} == ${name}")
            }
            FilterExpr::Match { field, pattern } => {
                let name = params.bind(Value::String(pattern.clone()));
                format!("{field} match ${name}")
            }
            FilterExpr::In { field, values } => {
                let name = params.bind(Value::Array(values.clone()));
                format!("{field} in ${name}")
            }
            FilterExpr::Defined { field } => format!("defined({field})"),
            FilterExpr::And(exprs) => Self::render_joined(exprs, " && ", params),
            FilterExpr::Or(exprs) => Self::render_joined(exprs, " || ", params),
            FilterExpr::Not(inner) => format!("!({})", inner.render(params)),
            FilterExpr::DraftsOnly => r#"_id in path("drafts.**")"#.to_string(),
            FilterExpr::NoDrafts => r#"!(_id in path("drafts.**"))"#.to_string(),
        }
    }

    fn render_joined(exprs: &[FilterExpr], sep: &str, params: &mut ParamBinder) -> String {
        let parts: Vec<String> = exprs
            .iter()
            .map(|e| format!("({})", e.render(params)))
            .collect();
        parts.join(sep)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// One `order(...)` clause. String columns fold through `lower()` so
/// ordering is case-insensitive, matching how the table presents them.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
    pub case_insensitive: bool,
}

impl Ordering {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
            case_insensitive: false,
        }
    }

    pub fn text(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
            case_insensitive: true,
        }
    }

    fn render(&self) -> String {
        let key = if self.case_insensitive {
            format!("lower({})", self.field)
        } else {
            self.field.clone()
        };
        format!("{key} {}", self.direction.as_str())
    }
}

/// Assembled query: `*[filter] | order(...) [start...end] {projection}`.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filter: Option<FilterExpr>,
    order: Vec<Ordering>,
    slice: Option<(usize, usize)>,
    projection: Option<String>,
    count: bool,
}

#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub groq: String,
    pub params: Map<String, Value>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, expr: FilterExpr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => FilterExpr::And(vec![existing, expr]),
            None => expr,
        });
        self
    }

    pub fn order(mut self, ordering: Ordering) -> Self {
        self.order.push(ordering);
        self
    }

    /// Half-open raw-row range `[start...end]`.
    pub fn slice(mut self, start: usize, end: usize) -> Self {
        self.slice = Some((start, end));
        self
    }

    /// Projection body without the surrounding braces, e.g. `_id`.
    pub fn project(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Wrap the whole query in `count(...)`.
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn build(self) -> BuiltQuery {
        let mut params = ParamBinder::default();
        let filter = self
            .filter
            .map(|f| f.render(&mut params))
            .unwrap_or_default();

        let mut groq = format!("*[{filter}]");
        if !self.order.is_empty() {
            let clauses: Vec<String> = self.order.iter().map(Ordering::render).collect();
            groq.push_str(&format!(" | order({})", clauses.join(", ")));
        }
        if let Some((start, end)) = self.slice {
            groq.push_str(&format!(" [{start}...{end}]"));
        }
        if let Some(projection) = self.projection {
            groq.push_str(&format!(" {{{projection}}}"));
        }
        if self.count {
            groq = format!("count({groq})");
        }

        tracing::debug!(query = %groq, "built GROQ query");
        BuiltQuery {
            groq,
            params: params.into_map(),
        }
    }
}

#[derive(Debug, Default)]
struct ParamBinder {
    params: Map<String, Value>,
}

impl ParamBinder {
    fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.params.len());
        self.params.insert(name.clone(), value);
        name
    }

    fn into_map(self) -> Map<String, Value> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_filtered_ordered_slice() {
        let built = Query::new()
            .filter(FilterExpr::type_is("review"))
            .filter(FilterExpr::NoDrafts)
            .order(Ordering::text("title", Direction::Asc))
            .slice(0, 60)
            .project("_id")
            .build();

        assert_eq!(
            built.groq,
            r#"*[(_type == $p0) && (!(_id in path("drafts.**")))] | order(lower(title) asc) [0...60] {_id}"#
        );
        assert_eq!(built.params.get("p0"), Some(&json!("review")));
    }

    #[test]
    fn match_and_in_bind_parameters() {
        let built = Query::new()
            .filter(FilterExpr::and(vec![
                FilterExpr::matches("title", "gato*"),
                FilterExpr::id_in(&["a".into(), "drafts.a".into()]),
            ]))
            .build();

        assert_eq!(
            built.groq,
            "*[(title match $p0) && (_id in $p1)]"
        );
        assert_eq!(built.params.get("p0"), Some(&json!("gato*")));
        assert_eq!(built.params.get("p1"), Some(&json!(["a", "drafts.a"])));
    }

    #[test]
    fn count_wraps_query() {
        let built = Query::new()
            .filter(FilterExpr::type_is("brand"))
            .count()
            .build();
        assert_eq!(built.groq, "count(*[_type == $p0])");
    }

    #[test]
    fn no_user_value_ever_lands_in_query_text() {
        let built = Query::new()
            .filter(FilterExpr::matches("title", "evil\" || _type == \"secret"))
            .build();
        // The pattern travels as a parameter, never inline.
        assert!(!built.groq.contains("evil"));
        assert!(built.params.values().any(|v| v.as_str().is_some_and(|s| s.contains("evil"))));
    }
}
