use url::Url;

use crate::error::{DirProbeError, Result};

/// Builds request URLs by joining wordlist candidates onto a validated base.
///
/// The base must be an absolute http(s) URL. Its path is normalized to end
/// with a slash so that joining appends rather than replaces the last
/// segment. A resolved URL must keep the base's scheme, host, port, and path
/// prefix; candidates that would escape the target authority are rejected.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    base: Url,
}

impl TargetResolver {
    pub fn new(base: &str) -> Result<Self> {
        let trimmed = base.trim();
        let mut url = Url::parse(trimmed)
            .map_err(|e| DirProbeError::InvalidBase(format!("{trimmed}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(DirProbeError::InvalidBase(format!(
                    "{trimmed}: unsupported scheme '{scheme}'"
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(DirProbeError::InvalidBase(format!("{trimmed}: missing host")));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { base: url })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Join a candidate segment onto the base, escaping it per URL syntax.
    pub fn resolve(&self, candidate: &str) -> Result<Url> {
        let segment = candidate.trim().trim_start_matches('/');
        if segment.is_empty() {
            return Err(DirProbeError::InvalidCandidate(format!(
                "'{candidate}' is empty after normalization"
            )));
        }

        let resolved = self
            .base
            .join(segment)
            .map_err(|e| DirProbeError::InvalidCandidate(format!("{candidate}: {e}")))?;

        let same_authority = resolved.scheme() == self.base.scheme()
            && resolved.host_str() == self.base.host_str()
            && resolved.port_or_known_default() == self.base.port_or_known_default();
        if !same_authority || !resolved.path().starts_with(self.base.path()) {
            return Err(DirProbeError::InvalidCandidate(format!(
                "{candidate}: escapes the target authority"
            )));
        }

        Ok(resolved)
    }
}
