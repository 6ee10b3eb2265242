//! Sediment-transport closures for gravel-bed channels.
//!
//! The evolution equation needs a transport law relating sediment flux to
//! local slope, discharge, and width. The specific law is pluggable: any
//! type implementing [`TransportClosure`] can drive the engine, provided
//! its flux is monotonic increasing in slope and in discharge. The shipped
//! [`ThresholdWidth`] closure is the gravel-bed threshold-channel relation
//! `Q_s = c · I · Q · |S|^(e-1) · S`.

use crate::error::ConfigurationError;

/// Transport law closing the bed-evolution equation.
///
/// The engine linearizes the flux about the prior step's state: within one
/// implicit solve the flux through a cell face is `conductance · S_new`,
/// with the conductance evaluated at the frozen old slope. The three
/// methods must be mutually consistent:
///
/// - `sediment_flux(q, b, s) == conductance(q, b, s) * s`
/// - `equilibrium_slope(q, b, sediment_flux(q, b, s)) == s` for `s >= 0`
///
/// Implementations must be monotonic increasing in discharge and in
/// absolute slope, and must return nonnegative conductances. `Send + Sync`
/// lets per-segment assembly fan out across threads while sharing one
/// closure.
pub trait TransportClosure: Send + Sync {
    /// Linearized diffusive conductance at the given (frozen) state.
    fn conductance(&self, discharge: f64, width: f64, slope: f64) -> f64;

    /// Transport capacity at the given state, signed with the slope.
    fn sediment_flux(&self, discharge: f64, width: f64, slope: f64) -> f64;

    /// The (nonnegative) slope at which capacity equals `flux`.
    fn equilibrium_slope(&self, discharge: f64, width: f64, flux: f64) -> f64;
}

/// Threshold-width gravel transport closure.
///
/// Channels at the threshold of motion adjust their width so that capacity
/// scales with discharge and a superlinear power of slope:
///
/// `Q_s = transport_coefficient · intermittency · Q · |S|^(slope_exponent - 1) · S`
///
/// Width does not appear: the threshold assumption absorbs it. The
/// intermittency factor rescales instantaneous capacity to the fraction of
/// time the river is at transport-effective flow.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdWidth {
    /// Dimensionless transport coefficient.
    pub transport_coefficient: f64,
    /// Fraction of time at transport-effective discharge, in (0, 1].
    pub intermittency: f64,
    /// Slope exponent `e > 1` (superlinear capacity in slope).
    pub slope_exponent: f64,
}

impl ThresholdWidth {
    /// Create a closure, validating all parameters.
    pub fn new(
        transport_coefficient: f64,
        intermittency: f64,
        slope_exponent: f64,
    ) -> Result<Self, ConfigurationError> {
        if !(transport_coefficient.is_finite() && transport_coefficient > 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "transport_coefficient",
                value: transport_coefficient,
                reason: "must be finite and positive",
            });
        }
        if !(intermittency.is_finite() && intermittency > 0.0 && intermittency <= 1.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "intermittency",
                value: intermittency,
                reason: "must lie in (0, 1]",
            });
        }
        if !(slope_exponent.is_finite() && slope_exponent > 1.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "slope_exponent",
                value: slope_exponent,
                reason: "must be greater than one",
            });
        }
        Ok(Self {
            transport_coefficient,
            intermittency,
            slope_exponent,
        })
    }

    fn prefactor(&self, discharge: f64) -> f64 {
        self.transport_coefficient * self.intermittency * discharge
    }
}

impl Default for ThresholdWidth {
    /// Typical gravel-bed values: coefficient 0.041, continuous
    /// transport-effective flow, slope exponent 7/6.
    fn default() -> Self {
        Self {
            transport_coefficient: 0.041,
            intermittency: 1.0,
            slope_exponent: 7.0 / 6.0,
        }
    }
}

impl TransportClosure for ThresholdWidth {
    fn conductance(&self, discharge: f64, _width: f64, slope: f64) -> f64 {
        self.prefactor(discharge) * slope.abs().powf(self.slope_exponent - 1.0)
    }

    fn sediment_flux(&self, discharge: f64, width: f64, slope: f64) -> f64 {
        self.conductance(discharge, width, slope) * slope
    }

    fn equilibrium_slope(&self, discharge: f64, _width: f64, flux: f64) -> f64 {
        let k = self.prefactor(discharge);
        if k <= 0.0 || flux <= 0.0 {
            return 0.0;
        }
        (flux / k).powf(1.0 / self.slope_exponent)
    }
}

/// Rule for channel width between steps.
#[derive(Clone, Copy, Debug)]
pub enum WidthRule {
    /// Width stays at the initialization-time arrays.
    Prescribed,
    /// Width is recomputed from discharge and local slope after every
    /// accepted step: `B = coefficient · Q · |S|^exponent`, floored at
    /// `min_width` so the Exner scaling stays finite.
    SelfFormed {
        coefficient: f64,
        exponent: f64,
        min_width: f64,
    },
}

impl WidthRule {
    /// Validate the rule's parameters.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let WidthRule::SelfFormed {
            coefficient,
            exponent,
            min_width,
        } = *self
        {
            if !(coefficient.is_finite() && coefficient > 0.0) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "width_coefficient",
                    value: coefficient,
                    reason: "must be finite and positive",
                });
            }
            if !exponent.is_finite() {
                return Err(ConfigurationError::InvalidParameter {
                    name: "width_exponent",
                    value: exponent,
                    reason: "must be finite",
                });
            }
            if !(min_width.is_finite() && min_width > 0.0) {
                return Err(ConfigurationError::InvalidParameter {
                    name: "min_width",
                    value: min_width,
                    reason: "must be finite and positive",
                });
            }
        }
        Ok(())
    }

    /// Width for the given local state under this rule, or `None` when the
    /// prescribed width should be kept.
    pub(crate) fn width(&self, discharge: f64, slope: f64) -> Option<f64> {
        match *self {
            WidthRule::Prescribed => None,
            WidthRule::SelfFormed {
                coefficient,
                exponent,
                min_width,
            } => Some((coefficient * discharge * slope.abs().powf(exponent)).max(min_width)),
        }
    }
}
