use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed view over the tracer's opaque span payload. The payload is an
/// envelope (`{"span_data": {"type": ..., ...}}`) whose discriminator
/// set is open: anything unrecognized, including payloads that fail to
/// parse at all, degrades to `Other` instead of erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpanData {
    Agent {
        #[serde(default)]
        name: Option<String>,
    },
    Function {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Option<Value>,
        #[serde(default)]
        output: Option<Value>,
    },
    Guardrail {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        triggered: Option<bool>,
    },
    Tool {
        #[serde(default)]
        name: Option<String>,
    },
    Response {
        #[serde(default)]
        response_id: Option<String>,
    },
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    span_data: SpanData,
}

impl SpanData {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str::<Envelope>(raw)
            .map(|env| env.span_data)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SpanData::Agent { .. } => "agent",
            SpanData::Function { .. } => "function",
            SpanData::Guardrail { .. } => "guardrail",
            SpanData::Tool { .. } => "tool",
            SpanData::Response { .. } => "response",
            SpanData::Other => "other",
        }
    }

    /// Label shown in span lists and detail headers. Response spans
    /// carry no name and display as the API call they wrap.
    pub fn display_name(&self) -> String {
        match self {
            SpanData::Response { .. } => "POST /v1/responses".to_string(),
            SpanData::Agent { name }
            | SpanData::Function { name, .. }
            | SpanData::Guardrail { name, .. }
            | SpanData::Tool { name } => name.clone().unwrap_or_else(|| self.kind().to_string()),
            SpanData::Other => "other".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds() {
        let agent = SpanData::parse(r#"{"span_data":{"type":"agent","name":"planner"}}"#);
        assert_eq!(agent.kind(), "agent");
        assert_eq!(agent.display_name(), "planner");

        let func = SpanData::parse(
            r#"{"span_data":{"type":"function","name":"search","input":[1],"output":"ok"}}"#,
        );
        assert_eq!(func.kind(), "function");
    }

    #[test]
    fn response_spans_display_the_api_call() {
        let data = SpanData::parse(r#"{"span_data":{"type":"response","response_id":"r_1"}}"#);
        assert_eq!(data.display_name(), "POST /v1/responses");
    }

    #[test]
    fn unknown_type_falls_back_to_other() {
        let data = SpanData::parse(r#"{"span_data":{"type":"handoff","from":"a","to":"b"}}"#);
        assert_eq!(data, SpanData::Other);
    }

    #[test]
    fn malformed_payload_falls_back_to_other() {
        assert_eq!(SpanData::parse("not json"), SpanData::Other);
        assert_eq!(SpanData::parse("{}"), SpanData::Other);
    }
}
