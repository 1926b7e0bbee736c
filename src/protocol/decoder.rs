use serde::Serialize;

use super::messages::{ResponseEnvelope, ResultData};

/// One unit of recognized speech
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionFragment {
    /// Concatenated word text of this fragment (may be empty on the terminal message)
    pub text: String,

    /// Confirmed result; interim hypotheses must never be persisted
    pub is_final: bool,

    /// The service will send nothing further for this session
    pub is_last_segment: bool,
}

/// A decoded inbound protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Handshake { session_id: String },
    Fragment(RecognitionFragment),
    ProtocolError { code: String, description: String },
}

/// Decode one inbound text message.
///
/// Returns `Ok(None)` for messages that carry nothing actionable (keepalives,
/// unknown actions, result envelopes with neither text nor a terminal flag).
/// Returns `Err` only when the message is not a JSON envelope at all.
pub fn decode(message: &str) -> Result<Option<InboundEvent>, serde_json::Error> {
    let envelope: ResponseEnvelope = serde_json::from_str(message)?;

    let event = match envelope.action.as_deref() {
        Some("started") => Some(InboundEvent::Handshake {
            session_id: envelope.sid.unwrap_or_default(),
        }),
        Some("result") => envelope.data.as_ref().and_then(decode_result),
        Some("error") => Some(InboundEvent::ProtocolError {
            code: envelope.code.unwrap_or_else(|| "unknown".to_string()),
            description: envelope.desc.unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(event)
}

fn decode_result(data: &ResultData) -> Option<InboundEvent> {
    let sentence = data.cn.as_ref().and_then(|cn| cn.st.as_ref());

    let text: String = sentence
        .and_then(|st| st.rt.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|rt| rt.ws.as_ref())
        .flatten()
        .filter_map(|ws| ws.cw.as_ref())
        .flatten()
        .filter_map(|cw| cw.w.as_deref())
        .collect();

    let is_final = sentence
        .and_then(|st| st.kind.as_deref())
        .map(|kind| kind.trim() == "0")
        .unwrap_or(false);
    let is_last_segment = data.ls.unwrap_or(false);

    if text.is_empty() && !is_last_segment {
        return None;
    }

    Some(InboundEvent::Fragment(RecognitionFragment {
        text,
        is_final,
        is_last_segment,
    }))
}
