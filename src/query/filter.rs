use serde_json::Value;

use super::FilterError;
use crate::event::Level;

/// Predicate evaluator applied to a session's records in file order.
///
/// Implementations may select, reshape or aggregate; the engine returns
/// whatever values they emit.
pub trait RecordFilter: Send + Sync {
    fn apply(&self, records: Vec<Value>) -> Result<Vec<Value>, FilterError>;
}

/// In-process filter matching on the required record keys
///
/// Unset criteria match everything, so `MatchFilter::default()` passes every
/// record through.
#[derive(Debug, Clone, Default, bon::Builder)]
pub struct MatchFilter {
    #[builder(into)]
    event_type: Option<String>,
    /// Keep records at or above this level
    min_level: Option<Level>,
    #[builder(into)]
    agent_id: Option<String>,
    #[builder(into)]
    correlation_id: Option<String>,
}

impl MatchFilter {
    pub fn matches(&self, record: &Value) -> bool {
        let field = |key: &str| record.get(key).and_then(Value::as_str);

        if let Some(event_type) = &self.event_type {
            if field("evt") != Some(event_type.as_str()) {
                return false;
            }
        }
        if let Some(min_level) = self.min_level {
            match field("lvl").and_then(|lvl| lvl.parse::<Level>().ok()) {
                Some(level) if level >= min_level => {}
                _ => return false,
            }
        }
        if let Some(agent_id) = &self.agent_id {
            if field("aid") != Some(agent_id.as_str()) {
                return false;
            }
        }
        if let Some(correlation_id) = &self.correlation_id {
            if field("cid") != Some(correlation_id.as_str()) {
                return false;
            }
        }
        true
    }
}

impl RecordFilter for MatchFilter {
    fn apply(&self, records: Vec<Value>) -> Result<Vec<Value>, FilterError> {
        Ok(records.into_iter().filter(|r| self.matches(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Value> {
        vec![
            json!({"lvl": "debug", "evt": "hook.pre_tool", "aid": "a1", "cid": "c1"}),
            json!({"lvl": "info", "evt": "decision.made", "aid": "a1", "cid": "c2"}),
            json!({"lvl": "error", "evt": "tool.failed", "aid": "a2", "cid": "c2"}),
            json!({"lvl": "loud", "evt": "odd", "aid": "a2", "cid": "c3"}),
        ]
    }

    #[test]
    fn test_default_passes_everything() {
        assert_eq!(MatchFilter::default().apply(records()).unwrap().len(), 4);
    }

    #[test]
    fn test_combined_criteria() {
        let filter = MatchFilter::builder()
            .correlation_id("c2")
            .min_level(Level::Info)
            .build();
        let matched = filter.apply(records()).unwrap();
        assert_eq!(matched.len(), 2);

        let filter = MatchFilter::builder().agent_id("a2").min_level(Level::Warn).build();
        let matched = filter.apply(records()).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0]["evt"], "tool.failed");
    }

    #[test]
    fn test_event_type_keeps_order() {
        let mut input = records();
        input.push(json!({"lvl": "info", "evt": "decision.made", "aid": "a3", "cid": "c9"}));

        let filter = MatchFilter::builder().event_type("decision.made").build();
        let matched = filter.apply(input).unwrap();
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0]["aid"], "a1");
        assert_eq!(matched[1]["aid"], "a3");
    }
}
