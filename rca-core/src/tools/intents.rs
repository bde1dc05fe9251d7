//! Registered tool intents and their parameter schemas.
//!
//! An intent is dispatched only after every required parameter is present;
//! missing parameters are reported back as a single `missing: a, b` error
//! rather than failing on the first one found, so a caller can fix its
//! request in one round trip.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// A registered tool intent name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    FetchPodLogs,
    DescribeResource,
    QueryPrometheus,
    SearchLogs,
    CheckPodStatus,
    GetEvents,
    ReInvestigateService,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::FetchPodLogs => "fetch_pod_logs",
            Intent::DescribeResource => "describe_resource",
            Intent::QueryPrometheus => "query_prometheus",
            Intent::SearchLogs => "search_logs",
            Intent::CheckPodStatus => "check_pod_status",
            Intent::GetEvents => "get_events",
            Intent::ReInvestigateService => "re_investigate_service",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fetch_pod_logs" => Some(Intent::FetchPodLogs),
            "describe_resource" => Some(Intent::DescribeResource),
            "query_prometheus" => Some(Intent::QueryPrometheus),
            "search_logs" => Some(Intent::SearchLogs),
            "check_pod_status" => Some(Intent::CheckPodStatus),
            "get_events" => Some(Intent::GetEvents),
            "re_investigate_service" => Some(Intent::ReInvestigateService),
            _ => None,
        }
    }

    pub fn schema(&self) -> &'static [ParamSchema] {
        const FETCH_POD_LOGS: &[ParamSchema] = &[
            ParamSchema::required("namespace", ParamType::String),
            ParamSchema::required("pod", ParamType::String),
            ParamSchema::optional("container", ParamType::String),
            ParamSchema::optional("tail_lines", ParamType::Number),
        ];
        const DESCRIBE_RESOURCE: &[ParamSchema] = &[
            ParamSchema::required("namespace", ParamType::String),
            ParamSchema::required("kind", ParamType::String),
            ParamSchema::required("name", ParamType::String),
        ];
        const QUERY_PROMETHEUS: &[ParamSchema] = &[
            ParamSchema::required("query", ParamType::String),
            ParamSchema::optional("range_minutes", ParamType::Number),
        ];
        const SEARCH_LOGS: &[ParamSchema] = &[
            ParamSchema::required("namespace", ParamType::String),
            ParamSchema::required("pattern", ParamType::String),
            ParamSchema::optional("since_minutes", ParamType::Number),
        ];
        const CHECK_POD_STATUS: &[ParamSchema] = &[
            ParamSchema::required("namespace", ParamType::String),
            ParamSchema::required("pod", ParamType::String),
        ];
        const GET_EVENTS: &[ParamSchema] = &[
            ParamSchema::required("namespace", ParamType::String),
            ParamSchema::optional("since_minutes", ParamType::Number),
        ];
        const RE_INVESTIGATE_SERVICE: &[ParamSchema] = &[
            ParamSchema::required("namespace", ParamType::String),
            ParamSchema::required("service", ParamType::String),
        ];

        match self {
            Intent::FetchPodLogs => FETCH_POD_LOGS,
            Intent::DescribeResource => DESCRIBE_RESOURCE,
            Intent::QueryPrometheus => QUERY_PROMETHEUS,
            Intent::SearchLogs => SEARCH_LOGS,
            Intent::CheckPodStatus => CHECK_POD_STATUS,
            Intent::GetEvents => GET_EVENTS,
            Intent::ReInvestigateService => RE_INVESTIGATE_SERVICE,
        }
    }
}

/// Scalar parameter type accepted by an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
}

/// One parameter an intent accepts.
#[derive(Debug, Clone, Copy)]
pub struct ParamSchema {
    pub name: &'static str,
    pub required: bool,
    pub param_type: ParamType,
}

impl ParamSchema {
    const fn required(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            required: true,
            param_type,
        }
    }

    const fn optional(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            required: false,
            param_type,
        }
    }
}

/// Validate that `params` satisfies `intent`'s schema: every required
/// parameter present and every present parameter of the right type.
/// Reports all missing required parameters together.
pub fn validate_params(intent: Intent, params: &HashMap<String, Value>) -> Result<()> {
    let mut missing = Vec::new();
    let mut wrong_type = Vec::new();

    for field in intent.schema() {
        match params.get(field.name) {
            None => {
                if field.required {
                    missing.push(field.name);
                }
            }
            Some(value) => {
                let ok = match field.param_type {
                    ParamType::String => value.is_string(),
                    ParamType::Number => value.is_number(),
                };
                if !ok {
                    wrong_type.push(field.name);
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(Error::InvalidParam(format!(
            "missing: {}",
            missing.join(", ")
        )));
    }
    if !wrong_type.is_empty() {
        return Err(Error::InvalidParam(format!(
            "wrong type: {}",
            wrong_type.join(", ")
        )));
    }
    Ok(())
}

/// Clamp a `tail_lines` parameter into `[1, 5000]`, defaulting to `500`.
pub fn clamp_tail_lines(params: &HashMap<String, Value>) -> u64 {
    clamp_u64(params, "tail_lines", 500, 1, 5000)
}

/// Clamp a `range_minutes`/`since_minutes` parameter into `[1, 1440]`,
/// defaulting to `60`.
pub fn clamp_minutes(params: &HashMap<String, Value>, key: &str) -> u64 {
    clamp_u64(params, key, 60, 1, 1440)
}

fn clamp_u64(params: &HashMap<String, Value>, key: &str, default: u64, min: u64, max: u64) -> u64 {
    let raw = params
        .get(key)
        .and_then(|v| v.as_u64())
        .unwrap_or(default);
    raw.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_params_lists_all() {
        let params = HashMap::new();
        let err = validate_params(Intent::FetchPodLogs, &params).unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter: missing: namespace, pod");
    }

    #[test]
    fn present_required_params_pass() {
        let mut params = HashMap::new();
        params.insert("namespace".to_string(), json!("prod"));
        params.insert("pod".to_string(), json!("checkout-7f9"));
        assert!(validate_params(Intent::FetchPodLogs, &params).is_ok());
    }

    #[test]
    fn tail_lines_clamps_to_upper_bound() {
        let mut params = HashMap::new();
        params.insert("tail_lines".to_string(), json!(999_999));
        assert_eq!(clamp_tail_lines(&params), 5000);
    }

    #[test]
    fn tail_lines_clamps_to_lower_bound() {
        let mut params = HashMap::new();
        params.insert("tail_lines".to_string(), json!(0));
        assert_eq!(clamp_tail_lines(&params), 1);
    }

    #[test]
    fn tail_lines_default_is_500() {
        let params = HashMap::new();
        assert_eq!(clamp_tail_lines(&params), 500);
    }

    #[test]
    fn minutes_clamp_to_one_day() {
        let mut params = HashMap::new();
        params.insert("since_minutes".to_string(), json!(10_000));
        assert_eq!(clamp_minutes(&params, "since_minutes"), 1440);
    }
}
