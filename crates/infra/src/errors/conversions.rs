//! Conversions from external infrastructure errors into domain errors.

use fabricflow_domain::FlowError;
use reqwest::Error as HttpError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FlowError);

impl From<InfraError> for FlowError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FlowError> for InfraError {
    fn from(value: FlowError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoFlowError {
    fn into_flow(self) -> FlowError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FlowError */
/* -------------------------------------------------------------------------- */

impl IntoFlowError for HttpError {
    fn into_flow(self) -> FlowError {
        let target = self.url().map_or_else(String::new, |url| format!(" ({url})"));

        if self.is_builder() {
            return FlowError::fatal_transport(format!("invalid HTTP request{target}: {self}"));
        }

        if self.is_timeout() {
            return FlowError::transient_transport(format!("HTTP request timed out{target}"));
        }

        if self.is_connect() {
            return FlowError::transient_transport(format!("HTTP connection failure{target}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            return FlowError::Api { status: code, message };
        }

        if self.is_decode() {
            return FlowError::InvalidResponse(format!("failed to decode response body: {self}"));
        }

        if self.is_request() || self.is_body() {
            return FlowError::transient_transport(self.to_string());
        }

        FlowError::fatal_transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_flow())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → FlowError */
/* -------------------------------------------------------------------------- */

impl IntoFlowError for UrlError {
    fn into_flow(self) -> FlowError {
        FlowError::fatal_transport(format!("invalid URL: {self}"))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        Self(value.into_flow())
    }
}

/* -------------------------------------------------------------------------- */
/* toml::de::Error → FlowError */
/* -------------------------------------------------------------------------- */

impl IntoFlowError for toml::de::Error {
    fn into_flow(self) -> FlowError {
        FlowError::Config(format!("Invalid TOML format: {}", self.message()))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        Self(value.into_flow())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
