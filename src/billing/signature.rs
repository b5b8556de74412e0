use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("timestamp outside tolerance")]
    Stale,
    #[error("no matching v1 signature")]
    Mismatch,
}

/// Hex HMAC-SHA256 over `"{timestamp}.{payload}"`, the Stripe v1 scheme.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(mac(secret, timestamp, payload).finalize().into_bytes())
}

fn mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Verifies a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) for `payload`.
pub fn verify(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(SignatureError::Malformed);
        };
        match key {
            "t" => timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Mismatch);
    }
    // `t` is untrusted; compare without signed subtraction.
    if now_unix.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Stale);
    }

    let expected = mac(secret, timestamp, payload);
    let matched = candidates
        .iter()
        .any(|sig| expected.clone().verify_slice(sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    fn header_for(payload: &[u8], secret: &str, t: i64) -> String {
        format!("t={t},v1={}", compute_signature(secret, t, payload))
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let h = header_for(body, SECRET, NOW);
        assert_eq!(verify(body, Some(&h), SECRET, 300, NOW + 10), Ok(()));
    }

    #[test]
    fn accepts_when_any_v1_matches() {
        let body = b"{}";
        let h = format!("t={NOW},v1=deadbeef,v0=zzz,v1={}", compute_signature(SECRET, NOW, body));
        assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn rejects_tampered_body_and_wrong_secret() {
        let body = br#"{"amount":99}"#;
        let h = header_for(body, SECRET, NOW);
        assert_eq!(
            verify(br#"{"amount":0}"#, Some(&h), SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
        let h = header_for(body, "whsec_other", NOW);
        assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Err(SignatureError::Mismatch));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let body = b"{}";
        let h = header_for(body, SECRET, NOW - 301);
        assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Err(SignatureError::Stale));
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let body = b"{}";
        let h = header_for(body, SECRET, NOW - 300);
        assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Ok(()));
        let h = header_for(body, SECRET, NOW + 300);
        assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Ok(()));
        let h = header_for(body, SECRET, NOW + 301);
        assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Err(SignatureError::Stale));
    }

    #[test]
    fn extreme_timestamps_are_stale_not_a_crash() {
        let body = b"{}";
        for t in [i64::MIN, i64::MAX, i64::MIN + 1] {
            let h = format!("t={t},v1=00");
            assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Err(SignatureError::Stale));
            let h = header_for(body, SECRET, t);
            assert_eq!(verify(body, Some(&h), SECRET, 300, NOW), Err(SignatureError::Stale));
        }
        let h = header_for(body, SECRET, NOW);
        assert_eq!(
            verify(body, Some(&h), SECRET, i64::MIN, NOW),
            Ok(()),
            "negative tolerance is read as its magnitude"
        );
    }

    #[test]
    fn non_numeric_timestamp_is_malformed_even_with_valid_mac() {
        let body = b"{}";
        let sig = compute_signature(SECRET, NOW, body);
        for t in ["soon", "", "1.5", "99999999999999999999"] {
            let h = format!("t={t},v1={sig}");
            assert_eq!(
                verify(body, Some(&h), SECRET, 300, NOW),
                Err(SignatureError::Malformed),
                "t={t:?}"
            );
        }
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert_eq!(verify(b"{}", None, SECRET, 300, NOW), Err(SignatureError::MissingHeader));
        assert_eq!(
            verify(b"{}", Some("garbage"), SECRET, 300, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(b"{}", Some("v1=abcd"), SECRET, 300, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(b"{}", Some(&format!("t={NOW}")), SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }
}
