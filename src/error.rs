use std::fmt;

/// Errors from the external transcription / extraction services.
///
/// These are the typed failures the capability contracts return; free-form
/// service output never leaks past the parse edge. Rasterization has its own
/// error type ([`crate::pdf::RasterizeError`]) and the orchestration layer
/// aggregates with `anyhow`.
#[derive(Debug)]
pub enum ServiceError {
    /// The request itself failed (network, API rejection, timeout after the
    /// retry policy is exhausted).
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The service returned nothing usable.
    EmptyResponse { endpoint: String },
    /// The service responded, but not in the requested schema.
    SchemaMismatch { endpoint: String, detail: String },
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::RequestFailed { endpoint, source } => {
                write!(f, "request to {endpoint} failed: {source}")
            }
            ServiceError::EmptyResponse { endpoint } => {
                write!(f, "empty response from {endpoint}")
            }
            ServiceError::SchemaMismatch { endpoint, detail } => {
                write!(f, "schema mismatch from {endpoint}: {detail}")
            }
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::RequestFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl ServiceError {
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ServiceError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    pub fn schema_mismatch(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        ServiceError::SchemaMismatch {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn request_failed_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = ServiceError::request_failed("transcribe", io);

        assert_eq!(err.to_string(), "request to transcribe failed: reset");
        assert!(err.source().is_some());
    }

    #[test]
    fn schema_mismatch_names_endpoint_and_detail() {
        let err = ServiceError::schema_mismatch("extract_questions", "missing field `entries`");
        assert_eq!(
            err.to_string(),
            "schema mismatch from extract_questions: missing field `entries`"
        );
        assert!(err.source().is_none());
    }
}
