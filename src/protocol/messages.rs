use serde::{Deserialize, Deserializer, Serialize};

/// Inbound envelope from the ASR service
///
/// Only the fields used for recognition are modelled; timing and role
/// annotations on words are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub data: Option<ResultData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub cn: Option<Recognition>,
    /// Set on the last message of the session
    #[serde(default, deserialize_with = "lenient_bool")]
    pub ls: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Recognition {
    #[serde(default)]
    pub st: Option<Sentence>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sentence {
    /// 0 = confirmed result, anything else is an interim hypothesis
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default)]
    pub rt: Option<Vec<RecognitionResult>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub ws: Option<Vec<WordGroup>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WordGroup {
    #[serde(default)]
    pub cw: Option<Vec<WordCandidate>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WordCandidate {
    #[serde(default)]
    pub w: Option<String>,
}

/// End-of-audio control message, sent once after the last frame
#[derive(Debug, Serialize)]
pub struct EndOfStream<'a> {
    pub end: bool,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
}

impl<'a> EndOfStream<'a> {
    pub fn new(session_id: Option<&'a str>) -> Self {
        Self {
            end: true,
            session_id: session_id.filter(|sid| !sid.is_empty()),
        }
    }
}

/// Accept either a JSON string or number (the service is not consistent)
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) => Some(s.eq_ignore_ascii_case("true")),
        Some(serde_json::Value::Number(n)) => Some(n.as_i64() == Some(1)),
        _ => None,
    })
}
