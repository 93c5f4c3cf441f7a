//! Simulated Channel
//!
//! A `ChannelFactory` producing plausible telemetry without a service, for demos
//! and bench testing of the rendering side. The IV bag drains by up to 2 g per
//! tick and the backup pump starts once it runs low; vitals random-walk within
//! physiological bounds and are emitted at the slow-stream cadence.
use crate::{
    api::controller::{ChannelFactory, FrameStream},
    core::constants::{
        FLUID_CRITICAL_GRAMS, FULL_BAG_GRAMS, SIMULATION_PUMP_BELOW_GRAMS,
        SIMULATION_TICK, SIMULATION_VITALS_EVERY,
    },
    model::{
        frame::Frame,
        telemetry::{FluidSample, VitalsSample},
    },
};
use anyhow::Result;
use async_trait::async_trait;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{collections::VecDeque, time::Duration};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct SimulatedChannelFactory {
    tick: Duration,
    vitals_every: u32,
    seed: Option<u64>,
}

impl Default for SimulatedChannelFactory {
    fn default() -> Self {
        Self {
            tick: SIMULATION_TICK,
            vitals_every: SIMULATION_VITALS_EVERY,
            seed: None,
        }
    }
}

impl SimulatedChannelFactory {
    /// Deterministic simulation.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

struct Simulation {
    rng: StdRng,
    weight: f64,
    heart_rate: f64,
    oxygen_saturation: f64,
    ticks: u32,
    vitals_every: u32,
    pending: VecDeque<String>,
}

impl Simulation {
    fn new(rng: StdRng, vitals_every: u32) -> Self {
        Self {
            rng,
            weight: FULL_BAG_GRAMS,
            heart_rate: 75.0,
            oxygen_saturation: 98.0,
            ticks: 0,
            vitals_every: vitals_every.max(1),
            pending: VecDeque::new(),
        }
    }

    /// Advances one tick and queues the frames it produced.
    fn step(&mut self) -> Result<()> {
        self.ticks += 1;
        let now = OffsetDateTime::now_utc();

        let pump_active = self.weight < SIMULATION_PUMP_BELOW_GRAMS;
        self.weight = (self.weight - self.rng.gen_range(0.0..2.0)).max(0.0);
        let fluid_state = if self.weight < FLUID_CRITICAL_GRAMS {
            "CRITICO"
        } else {
            "NORMAL"
        };
        self.pending.push_back(
            Frame::Fluid(FluidSample {
                id: None,
                timestamp: Some(now),
                weight: (self.weight * 10.0).round() / 10.0,
                pump_active,
                fluid_state: fluid_state.to_owned(),
            })
            .encode()?,
        );

        if self.ticks % self.vitals_every == 0 {
            self.heart_rate = (self.heart_rate + self.rng.gen_range(-3.0..3.0)).clamp(50.0, 130.0);
            self.oxygen_saturation =
                (self.oxygen_saturation + self.rng.gen_range(-1.0..1.0)).clamp(85.0, 100.0);
            self.pending.push_back(
                Frame::Vitals(VitalsSample {
                    id: None,
                    timestamp: Some(now),
                    heart_rate: self.heart_rate.round() as u32,
                    oxygen_saturation: self.oxygen_saturation.round() as u32,
                    vitals_state: "NORMAL".to_owned(),
                })
                .encode()?,
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelFactory for SimulatedChannelFactory {
    async fn open(&self, url: &str) -> Result<FrameStream> {
        info!("simulating live channel instead of {}", url);
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let simulation = Simulation::new(rng, self.vitals_every);
        let interval = tokio::time::interval(self.tick);

        let frames = futures::stream::unfold(
            (simulation, interval),
            |(mut simulation, mut interval)| async move {
                while simulation.pending.is_empty() {
                    interval.tick().await;
                    if let Err(e) = simulation.step() {
                        return Some((Err(e), (simulation, interval)));
                    }
                }
                let frame = simulation.pending.pop_front();
                frame.map(|frame| (Ok(frame), (simulation, interval)))
            },
        );
        Ok(Box::pin(frames))
    }
}
