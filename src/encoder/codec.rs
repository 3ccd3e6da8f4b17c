//! Recording format negotiation

use super::{EncoderError, EncoderFactory};

/// Fallback order when no preferred type is given or it is unsupported
pub const CANDIDATE_MIME_TYPES: &[&str] = &[
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
    "video/mp4",
];

/// Pick the preferred type if the host supports it, else the first
/// supported candidate.
pub fn negotiate_mime_type(
    preferred: Option<&str>,
    factory: &dyn EncoderFactory,
) -> Result<String, EncoderError> {
    if let Some(preferred) = preferred {
        if factory.is_type_supported(preferred) {
            return Ok(preferred.to_string());
        }
        tracing::warn!("Preferred format {} unsupported, falling back", preferred);
    }

    CANDIDATE_MIME_TYPES
        .iter()
        .find(|mime| factory.is_type_supported(mime))
        .map(|mime| mime.to_string())
        .ok_or_else(|| EncoderError::NoSupportedType(CANDIDATE_MIME_TYPES.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticHost;

    #[test]
    fn test_preferred_type_wins_when_supported() {
        let host = SyntheticHost::new();
        host.set_supported_types(&["video/mp4", "video/webm"]);
        let mime = negotiate_mime_type(Some("video/mp4"), &host).unwrap();
        assert_eq!(mime, "video/mp4");
    }

    #[test]
    fn test_falls_back_in_candidate_order() {
        let host = SyntheticHost::new();
        host.set_supported_types(&["video/mp4", "video/webm"]);
        let mime = negotiate_mime_type(Some("video/x-matroska"), &host).unwrap();
        assert_eq!(mime, "video/webm");
    }

    #[test]
    fn test_nothing_supported() {
        let host = SyntheticHost::new();
        host.set_supported_types(&[]);
        assert!(matches!(
            negotiate_mime_type(None, &host),
            Err(EncoderError::NoSupportedType(_))
        ));
    }
}
