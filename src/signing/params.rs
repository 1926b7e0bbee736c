use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audio encoding that requires an explicit `samplerate` parameter
pub const RAW_PCM_ENCODING: &str = "pcm_s16le";

/// Per-session recognition parameters sent in the connection URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessParams {
    /// Audio encoding (`pcm_s16le` for raw 16-bit PCM)
    pub audio_encode: String,

    /// Sample rate in Hz, only sent for raw PCM
    pub sample_rate: u32,

    /// Recognition language (e.g. "autodialect")
    pub lang: String,

    /// Speaker separation; 0 disables it and omits the parameter
    pub role_type: u32,

    /// Domain hint (e.g. "medical")
    pub pd: Option<String>,

    /// Whether punctuation is returned (1 = yes)
    pub eng_punc: Option<u32>,

    /// Voice activity detection near/far field mode
    pub eng_vad_mdn: Option<u32>,
}

impl Default for BusinessParams {
    fn default() -> Self {
        Self {
            audio_encode: RAW_PCM_ENCODING.to_string(),
            sample_rate: 16000,
            lang: "autodialect".to_string(),
            role_type: 0,
            pd: None,
            eng_punc: Some(1),
            eng_vad_mdn: Some(1),
        }
    }
}

impl BusinessParams {
    /// Protocol parameter map for these settings.
    ///
    /// Optional settings that are unset (or disabled) are left out entirely.
    pub fn to_query_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();

        params.insert("audio_encode".to_string(), self.audio_encode.clone());

        if self.audio_encode == RAW_PCM_ENCODING {
            params.insert("samplerate".to_string(), self.sample_rate.to_string());
        }

        params.insert("lang".to_string(), self.lang.clone());

        if self.role_type > 0 {
            params.insert("role_type".to_string(), self.role_type.to_string());
        }

        if let Some(pd) = self.pd.as_deref().filter(|pd| !pd.is_empty()) {
            params.insert("pd".to_string(), pd.to_string());
        }

        if let Some(punc) = self.eng_punc {
            params.insert("eng_punc".to_string(), punc.to_string());
        }

        if let Some(vad) = self.eng_vad_mdn {
            params.insert("eng_vad_mdn".to_string(), vad.to_string());
        }

        params
    }

    /// Bytes of audio per second for 16-bit mono PCM at this sample rate
    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.sample_rate) * 2
    }
}
