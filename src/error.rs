//! Error kinds surfaced by the engine.
//!
//! Parameter problems that are a consequence of extreme patient attributes are *not*
//! errors: the adjustment layer clamps them and records a [`crate::ClampEvent`].

/// Errors returned by sampling, simulation and aggregation entry points.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// A distribution parameter violates its mathematical domain (e.g. Beta `alpha <= 0`).
    #[error("{distribution} parameter `{parameter}` = {value} is out of domain: {reason}")]
    Domain {
        distribution: &'static str,
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Caller-supplied configuration or input is unusable; raised before any sampling.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A treatment name did not resolve to a known protocol.
    #[error("unknown treatment `{name}`")]
    UnknownTreatment { name: String },
}

impl SimError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        SimError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn domain(
        distribution: &'static str,
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    ) -> Self {
        SimError::Domain {
            distribution,
            parameter,
            value,
            reason,
        }
    }

    /// True for [`SimError::Domain`].
    pub fn is_domain(&self) -> bool {
        matches!(self, SimError::Domain { .. })
    }

    /// True for [`SimError::InvalidConfiguration`].
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, SimError::InvalidConfiguration { .. })
    }
}
