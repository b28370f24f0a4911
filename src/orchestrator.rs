//! Fading orchestrator
//!
//! Owns one Markov chain per channel and dispatches gain queries to them,
//! polling terminal geometry and simulated time from injected callbacks.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::chain::MarkovChain;
use crate::channel::ChannelType;
use crate::config::FadingConfig;
use crate::params::ParameterConfig;
use crate::time::SimTime;
use crate::trace::FadingTraceRecord;
use crate::{db_to_linear, FadingError};

/// Elevation and velocity of the terminal, polled on every query.
pub struct GeometryAccessors {
    elevation_deg: Box<dyn Fn() -> f64>,
    velocity_mps: Box<dyn Fn() -> f64>,
}

impl GeometryAccessors {
    pub fn new(
        elevation_deg: impl Fn() -> f64 + 'static,
        velocity_mps: impl Fn() -> f64 + 'static,
    ) -> Self {
        Self {
            elevation_deg: Box::new(elevation_deg),
            velocity_mps: Box::new(velocity_mps),
        }
    }

    /// Constant geometry.
    pub fn fixed(elevation_deg: f64, velocity_mps: f64) -> Self {
        Self::new(move || elevation_deg, move || velocity_mps)
    }

    pub fn elevation_deg(&self) -> f64 {
        (self.elevation_deg)()
    }

    pub fn velocity_mps(&self) -> f64 {
        (self.velocity_mps)()
    }
}

impl fmt::Debug for GeometryAccessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryAccessors").finish_non_exhaustive()
    }
}

type TraceSink = Box<dyn FnMut(&FadingTraceRecord)>;

pub struct FadingOrchestrator {
    params: Arc<ParameterConfig>,
    geometry: GeometryAccessors,
    clock: Box<dyn Fn() -> SimTime>,
    chains: BTreeMap<ChannelType, MarkovChain>,
    rng: ChaCha8Rng,
    trace_sink: Option<TraceSink>,
}

impl FadingOrchestrator {
    /// Orchestrator owning a chain for every channel.
    pub fn new(
        params: Arc<ParameterConfig>,
        geometry: GeometryAccessors,
        clock: impl Fn() -> SimTime + 'static,
    ) -> Self {
        Self::with_channels(params, geometry, clock, ChannelType::ALL)
    }

    /// Orchestrator owning chains for `channels` only.
    pub fn with_channels(
        params: Arc<ParameterConfig>,
        geometry: GeometryAccessors,
        clock: impl Fn() -> SimTime + 'static,
        channels: impl IntoIterator<Item = ChannelType>,
    ) -> Self {
        let start = clock();
        let chains: BTreeMap<_, _> = channels
            .into_iter()
            .map(|channel| (channel, MarkovChain::new(Arc::clone(&params), start)))
            .collect();
        let rng = ChaCha8Rng::seed_from_u64(params.seed());

        info!(
            channels = chains.len(),
            sets = params.set_count(),
            seed = params.seed(),
            %start,
            "fading orchestrator built"
        );

        Self {
            params,
            geometry,
            clock: Box::new(clock),
            chains,
            rng,
            trace_sink: None,
        }
    }

    /// Validate `config` and build an orchestrator for every channel.
    pub fn from_config(
        config: FadingConfig,
        geometry: GeometryAccessors,
        clock: impl Fn() -> SimTime + 'static,
    ) -> Result<Self, FadingError> {
        let params = Arc::new(ParameterConfig::new(config)?);
        Ok(Self::new(params, geometry, clock))
    }

    /// Fading of `channel` at the current simulated time: dB, or linear when
    /// decibel reporting is disabled.
    pub fn fading(&mut self, channel: ChannelType) -> Result<f64, FadingError> {
        let now = (self.clock)();
        self.fading_at(channel, now)
    }

    /// Like [`Self::fading`], with the channel given by name.
    pub fn fading_by_name(&mut self, channel: &str) -> Result<f64, FadingError> {
        self.fading(channel.parse()?)
    }

    /// Fading of `channel` at `now`.
    pub fn fading_at(&mut self, channel: ChannelType, now: SimTime) -> Result<f64, FadingError> {
        let chain = self
            .chains
            .get_mut(&channel)
            .ok_or_else(|| FadingError::UnknownChannel(channel.to_string()))?;

        let elevation_deg = self.geometry.elevation_deg();
        let velocity_mps = self.geometry.velocity_mps();
        let gain_db = chain.evaluate(elevation_deg, velocity_mps, now, &mut self.rng)?;
        let value = if self.params.use_decibels() {
            gain_db
        } else {
            db_to_linear(gain_db)
        };

        if let Some(sink) = self.trace_sink.as_mut() {
            sink(&FadingTraceRecord {
                time_s: now.as_secs_f64(),
                channel,
                elevation_deg,
                velocity_mps,
                set: chain.set_index(),
                state: chain.state_index(),
                value,
            });
        }

        Ok(value)
    }

    /// Receive a record for every reported value.
    pub fn set_trace_sink(&mut self, sink: impl FnMut(&FadingTraceRecord) + 'static) {
        self.trace_sink = Some(Box::new(sink));
    }

    pub fn clear_trace_sink(&mut self) {
        self.trace_sink = None;
    }

    /// Lock `channel` to a random set and state drawn from the engine stream.
    pub fn randomize_locked_set_and_state(
        &mut self,
        channel: ChannelType,
    ) -> Result<(), FadingError> {
        let chain = self
            .chains
            .get_mut(&channel)
            .ok_or_else(|| FadingError::UnknownChannel(channel.to_string()))?;
        chain.randomize_locked_set_and_state(&mut self.rng);
        Ok(())
    }

    /// Lock `channel` to `set` and a random state drawn from the engine stream.
    pub fn randomize_locked_state(
        &mut self,
        channel: ChannelType,
        set: usize,
    ) -> Result<(), FadingError> {
        let chain = self
            .chains
            .get_mut(&channel)
            .ok_or_else(|| FadingError::UnknownChannel(channel.to_string()))?;
        chain.randomize_locked_state(set, &mut self.rng)
    }

    pub fn chain(&self, channel: ChannelType) -> Option<&MarkovChain> {
        self.chains.get(&channel)
    }

    pub fn chain_mut(&mut self, channel: ChannelType) -> Option<&mut MarkovChain> {
        self.chains.get_mut(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelType> + '_ {
        self.chains.keys().copied()
    }

    pub fn params(&self) -> &Arc<ParameterConfig> {
        &self.params
    }

    pub fn now(&self) -> SimTime {
        (self.clock)()
    }
}

impl fmt::Debug for FadingOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FadingOrchestrator")
            .field("chains", &self.chains)
            .field("geometry", &self.geometry)
            .field("tracing", &self.trace_sink.is_some())
            .finish_non_exhaustive()
    }
}
