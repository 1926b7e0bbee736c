use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use std::collections::BTreeMap;
use tracing::debug;

use super::params::BusinessParams;
use crate::error::{AsrError, AsrResult};

type HmacSha1 = Hmac<Sha1>;

pub const APP_ID_KEY: &str = "appId";
pub const ACCESS_KEY_ID_KEY: &str = "accessKeyId";
pub const UTC_KEY: &str = "utc";
pub const NONCE_KEY: &str = "uuid";
pub const SIGNATURE_KEY: &str = "signature";

const RESERVED_KEYS: [&str; 5] = [APP_ID_KEY, ACCESS_KEY_ID_KEY, UTC_KEY, NONCE_KEY, SIGNATURE_KEY];

/// Long-lived credentials issued by the ASR provider
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub app_id: String,
    pub access_key_id: String,
    pub access_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("access_key_id", &self.access_key_id)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

/// Builds signed connection URLs for the realtime ASR endpoint
#[derive(Debug, Clone)]
pub struct RequestSigner {
    endpoint: String,
    credentials: Credentials,
}

impl RequestSigner {
    /// Validate credentials up front so a bad configuration fails before any dialing
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> AsrResult<Self> {
        let endpoint = endpoint.into();

        if endpoint.trim().is_empty() {
            return Err(AsrError::Signing("endpoint is empty".to_string()));
        }
        if credentials.app_id.trim().is_empty() {
            return Err(AsrError::Signing(format!("{} is blank", APP_ID_KEY)));
        }
        if credentials.access_key_id.trim().is_empty() {
            return Err(AsrError::Signing(format!("{} is blank", ACCESS_KEY_ID_KEY)));
        }
        if credentials.access_secret.is_empty() {
            return Err(AsrError::Signing("access secret is empty".to_string()));
        }

        Ok(Self {
            endpoint,
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sign a URL for a new connection attempt with a fresh timestamp and nonce
    pub fn signed_url(&self, business: &BusinessParams) -> AsrResult<String> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.signed_url_at(business, Utc::now(), &nonce)
    }

    /// Sign a URL with an explicit timestamp and nonce
    pub fn signed_url_at(
        &self,
        business: &BusinessParams,
        utc: DateTime<Utc>,
        nonce: &str,
    ) -> AsrResult<String> {
        let mut params = BTreeMap::new();
        params.insert(APP_ID_KEY.to_string(), self.credentials.app_id.clone());
        params.insert(
            ACCESS_KEY_ID_KEY.to_string(),
            self.credentials.access_key_id.clone(),
        );
        params.insert(UTC_KEY.to_string(), format_utc(utc));
        params.insert(NONCE_KEY.to_string(), nonce.to_string());

        for (key, value) in business.to_query_params() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(AsrError::Signing(format!(
                    "business parameter collides with reserved key: {}",
                    key
                )));
            }
            params.insert(key, value);
        }

        let base_string = canonical_query(&params);
        debug!("Signing base string: {}", base_string);

        let signature = sign(&base_string, &self.credentials.access_secret)?;
        params.insert(SIGNATURE_KEY.to_string(), signature);

        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        let url = format!("{}{}{}", self.endpoint, separator, encode_pairs(&params, true));
        debug!("Signed connection URL: {}", url);

        Ok(url)
    }
}

/// Signature input: sorted, encoded `key=value` pairs without empty values or the signature
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    encode_pairs(params, false)
}

/// HMAC-SHA1 of the canonical string keyed by the access secret, Base64 encoded
pub fn sign(canonical: &str, secret: &str) -> AsrResult<String> {
    if secret.is_empty() {
        return Err(AsrError::Signing("access secret is empty".to_string()));
    }

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| AsrError::Signing(format!("invalid HMAC key: {}", e)))?;
    mac.update(canonical.as_bytes());

    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn format_utc(utc: DateTime<Utc>) -> String {
    utc.format("%Y-%m-%dT%H:%M:%S%z").to_string()
}

fn encode_pairs(params: &BTreeMap<String, String>, include_signature: bool) -> String {
    params
        .iter()
        .filter(|(key, value)| !value.is_empty() && (include_signature || key.as_str() != SIGNATURE_KEY))
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credentials() -> Credentials {
        Credentials {
            app_id: "app123".to_string(),
            access_key_id: "key456".to_string(),
            access_secret: "secret789".to_string(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap()
    }

    fn query_value<'a>(url: &'a str, key: &str) -> Option<&'a str> {
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    #[test]
    fn test_hmac_sha1_known_vector() {
        let signature = sign("The quick brown fox jumps over the lazy dog", "key").unwrap();
        assert_eq!(signature, "3nybhbi3iqa8ino29wqQcBydtNk=");
    }

    #[test]
    fn test_utc_format() {
        assert_eq!(format_utc(fixed_time()), "2025-03-01T08:30:00+0000");
    }

    #[test]
    fn test_canonical_query_sorted_and_encoded() {
        let mut params = BTreeMap::new();
        params.insert("utc".to_string(), "2025-03-01T08:30:00+0000".to_string());
        params.insert("appId".to_string(), "app".to_string());
        params.insert("accessKeyId".to_string(), "key".to_string());
        params.insert("pd".to_string(), "a b*~".to_string());

        assert_eq!(
            canonical_query(&params),
            "accessKeyId=key&appId=app&pd=a%20b%2A~&utc=2025-03-01T08%3A30%3A00%2B0000"
        );
    }

    #[test]
    fn test_canonical_query_skips_empty_and_signature() {
        let mut params = BTreeMap::new();
        params.insert("appId".to_string(), "app".to_string());
        params.insert("pd".to_string(), String::new());
        params.insert("signature".to_string(), "abc".to_string());

        let canonical = canonical_query(&params);
        assert_eq!(canonical, "appId=app");

        // Including the skipped entries must change the digest
        let with_signature = encode_pairs(&params, true);
        assert_ne!(
            sign(&canonical, "secret").unwrap(),
            sign(&with_signature, "secret").unwrap()
        );
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = RequestSigner::new("wss://asr.example.com/ast", credentials()).unwrap();
        let params = BusinessParams::default();

        let first = signer.signed_url_at(&params, fixed_time(), "nonce").unwrap();
        let second = signer.signed_url_at(&params, fixed_time(), "nonce").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_signature_changes_with_params() {
        let signer = RequestSigner::new("wss://asr.example.com/ast", credentials()).unwrap();
        let base = BusinessParams::default();
        let changed = BusinessParams {
            lang: "cn".to_string(),
            ..Default::default()
        };

        let first = signer.signed_url_at(&base, fixed_time(), "nonce").unwrap();
        let second = signer.signed_url_at(&changed, fixed_time(), "nonce").unwrap();
        assert_ne!(
            query_value(&first, "signature"),
            query_value(&second, "signature")
        );
    }

    #[test]
    fn test_signed_url_contains_all_parameters() {
        let signer = RequestSigner::new("wss://asr.example.com/ast", credentials()).unwrap();
        let url = signer
            .signed_url_at(&BusinessParams::default(), fixed_time(), "nonce")
            .unwrap();

        assert!(url.starts_with("wss://asr.example.com/ast?accessKeyId=key456&appId=app123"));
        for key in ["audio_encode", "samplerate", "lang", "eng_punc", "eng_vad_mdn", "utc", "uuid", "signature"] {
            assert!(query_value(&url, key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_signature_matches_canonical_string() {
        let signer = RequestSigner::new("wss://asr.example.com/ast", credentials()).unwrap();
        let url = signer
            .signed_url_at(&BusinessParams::default(), fixed_time(), "nonce")
            .unwrap();

        let mut params = BusinessParams::default().to_query_params();
        params.insert("appId".to_string(), "app123".to_string());
        params.insert("accessKeyId".to_string(), "key456".to_string());
        params.insert("utc".to_string(), format_utc(fixed_time()));
        params.insert("uuid".to_string(), "nonce".to_string());
        let expected = sign(&canonical_query(&params), "secret789").unwrap();

        assert_eq!(
            query_value(&url, "signature"),
            Some(urlencoding::encode(&expected).as_ref())
        );
    }

    #[test]
    fn test_blank_credentials_rejected() {
        let mut creds = credentials();
        creds.access_secret = String::new();
        assert!(matches!(
            RequestSigner::new("wss://asr.example.com", creds),
            Err(AsrError::Signing(_))
        ));

        let mut creds = credentials();
        creds.app_id = "  ".to_string();
        assert!(matches!(
            RequestSigner::new("wss://asr.example.com", creds),
            Err(AsrError::Signing(_))
        ));

        let mut creds = credentials();
        creds.access_key_id = String::new();
        assert!(matches!(
            RequestSigner::new("wss://asr.example.com", creds),
            Err(AsrError::Signing(_))
        ));
    }

    #[test]
    fn test_empty_secret_rejected_by_sign() {
        assert!(matches!(sign("a=b", ""), Err(AsrError::Signing(_))));
    }
}
