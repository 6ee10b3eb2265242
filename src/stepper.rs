//! Time-stepping driver.
//!
//! [`TimeStepper`] runs a [`Network`] through a fixed number of implicit
//! steps, optionally recording the elevation state after each one. It
//! performs no I/O and no automatic retries: the first failed step is
//! returned to the caller, who may choose a different `dt` and run again
//! from the network's last valid state.

use log::debug;

use crate::closure::TransportClosure;
use crate::error::{ConfigurationError, NetworkError};
use crate::network::Network;
use crate::types::SegmentId;

/// Control parameters for an evolution run.
#[derive(Clone, Copy, Debug)]
pub struct EvolutionConfig {
    /// Time increment per step.
    pub dt: f64,
    /// Number of steps to take.
    pub n_steps: usize,
    /// Picard re-linearizations per step; 1 is the reference single-solve
    /// scheme.
    pub picard_iterations: usize,
    /// Record the elevation state after every step.
    pub record_history: bool,
}

impl EvolutionConfig {
    /// Single-solve configuration without history recording.
    pub fn new(dt: f64, n_steps: usize) -> Self {
        Self {
            dt,
            n_steps,
            picard_iterations: 1,
            record_history: false,
        }
    }

    /// Set the number of Picard re-linearizations per step.
    pub fn with_picard_iterations(mut self, iterations: usize) -> Self {
        self.picard_iterations = iterations;
        self
    }

    /// Record elevations after every step.
    pub fn with_history(mut self) -> Self {
        self.record_history = true;
        self
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "dt",
                value: self.dt,
                reason: "must be finite and positive",
            });
        }
        if self.picard_iterations == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "picard_iterations",
                value: 0.0,
                reason: "must be at least one",
            });
        }
        Ok(())
    }
}

/// Elevation snapshots over a run, including the initial state.
#[derive(Clone, Debug, Default)]
pub struct ElevationHistory {
    times: Vec<f64>,
    /// `elevations[snapshot][segment][node]`.
    elevations: Vec<Vec<Vec<f64>>>,
}

impl ElevationHistory {
    fn record<C: TransportClosure>(&mut self, network: &Network<C>) {
        self.times.push(network.time());
        self.elevations.push(
            network
                .segments()
                .iter()
                .map(|s| s.z().to_vec())
                .collect(),
        );
    }

    /// Number of snapshots (`n_steps + 1` after a successful run).
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Simulation time of each snapshot.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Per-segment elevations of snapshot `index`.
    pub fn snapshot(&self, index: usize) -> &[Vec<f64>] {
        &self.elevations[index]
    }

    /// One segment's elevation trace across all snapshots.
    pub fn segment_trace(&self, segment: SegmentId) -> impl Iterator<Item = &[f64]> + '_ {
        self.elevations
            .iter()
            .map(move |snapshot| snapshot[segment.get()].as_slice())
    }
}

/// Drives repeated implicit steps over a network.
#[derive(Clone, Copy, Debug)]
pub struct TimeStepper {
    config: EvolutionConfig,
}

impl TimeStepper {
    /// Create a stepper, validating the configuration.
    pub fn new(config: EvolutionConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Run the configured number of steps. Returns the recorded history
    /// when `record_history` is set, `None` otherwise.
    ///
    /// On error the network keeps the state of the last successful step;
    /// the step index inside the error identifies the failed step.
    pub fn run<C: TransportClosure>(
        &self,
        network: &mut Network<C>,
    ) -> Result<Option<ElevationHistory>, NetworkError> {
        let mut history = if self.config.record_history {
            let mut h = ElevationHistory::default();
            h.record(network);
            Some(h)
        } else {
            None
        };

        for i in 0..self.config.n_steps {
            network.advance_one_step_iterated(self.config.dt, self.config.picard_iterations)?;
            if let Some(h) = history.as_mut() {
                h.record(network);
            }
            debug!("completed step {} of {}", i + 1, self.config.n_steps);
        }

        Ok(history)
    }
}
