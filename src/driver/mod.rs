//! The co-simulation driver.
//!
//! A [`Driver`] owns a [`Testbench`] and advances it one clock tick at a
//! time. Each tick evaluates the model twice, once per clock level. When the
//! device signals that it is ready for a sample the driver:
//!
//! 1. serves the head of the send queue (start, deliver one byte, retire)
//! 2. increments the sample clock and advances elapsed time by one period
//! 3. presents the next stimulus sample and captures the device output
//! 4. clears the ready flag and, if enabled, cross-validates the output
//!
//! The transfer check runs against the sample clock value from before the
//! increment, so a batch with deadline `D` first goes out on the cycle that
//! produces sample `D + 1`.

mod queue;
mod stats;
mod trace;
mod validate;

pub use queue::{ScheduledSend, SendQueue, TransferState};
pub use stats::RunStats;
pub use trace::Tracer;
pub use validate::{CrossValidator, Mismatch};

use std::fs::File;
use std::io::BufWriter;

use log::{debug, info, trace, warn};

use crate::audio::Stimulus;
use crate::config::{DriverConfig, EffectEntry};
use crate::device::{Delivery, Testbench};
use crate::emulator::{Emulator, ProgramEmulator};
use crate::error::{FxsimError, Result};
use crate::program::{compile_file, Batch};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// One device sample per ready cycle
    pub samples: Vec<i16>,
    /// Emulator predictions, when cross-validation was enabled
    pub predicted: Option<Vec<i16>>,
    pub mismatches: Vec<Mismatch>,
    pub stats: RunStats,
}

pub struct Driver<B: Testbench> {
    bench: B,
    config: DriverConfig,
    queue: SendQueue,
    stimulus: Stimulus,

    /// Ready cycles completed so far
    sample_clock: u64,
    /// Half-step counter used to stamp trace records
    time_index: u64,
    elapsed: f64,
    sample_period: f64,
    limit: u64,

    output: Vec<i16>,
    validator: Option<CrossValidator>,
    tracer: Option<Tracer<BufWriter<File>>>,
    stats: RunStats,
}

impl<B: Testbench> Driver<B> {
    /// Create a driver around `bench`.
    ///
    /// The run stops after `config.sample_limit` samples or when a finite
    /// stimulus runs out, whichever comes first. Opens the trace file when
    /// tracing is enabled and installs a [`ProgramEmulator`] when
    /// cross-validation is.
    pub fn new(bench: B, config: DriverConfig, stimulus: Stimulus, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(FxsimError::invalid_config("sample rate must be non-zero"));
        }

        let tracer = if config.trace {
            let tracer = Tracer::create(&config.trace_path)?;
            info!("writing waveform trace to {}", config.trace_path.display());
            Some(tracer)
        } else {
            None
        };

        let validator = config.cross_validate.then(|| {
            CrossValidator::new(
                Box::new(ProgramEmulator::new()),
                config.latency,
                config.tolerance,
            )
        });

        let limit = match stimulus.len() {
            Some(len) => len.min(config.sample_limit),
            None => config.sample_limit,
        } as u64;

        Ok(Self {
            bench,
            queue: SendQueue::new(config.max_pending),
            stimulus,
            sample_clock: 0,
            time_index: 0,
            elapsed: 0.0,
            sample_period: 1.0 / sample_rate as f64,
            limit,
            output: Vec::with_capacity(limit as usize),
            validator,
            tracer,
            stats: RunStats::default(),
            config,
        })
    }

    /// Replace the reference emulator. Has no effect unless cross-validation
    /// is enabled.
    pub fn with_emulator(mut self, emulator: Box<dyn Emulator>) -> Self {
        if self.validator.is_some() {
            self.validator = Some(CrossValidator::new(
                emulator,
                self.config.latency,
                self.config.tolerance,
            ));
        }
        self
    }

    /// Schedule `batch` to start transferring once the sample clock reaches
    /// `deadline`. Batches go out strictly in the order they were enqueued.
    pub fn enqueue(&mut self, batch: Batch, deadline: u64) -> Result<()> {
        debug!("queued {}-byte batch for sample {}", batch.len(), deadline);
        self.queue.enqueue(batch, deadline)
    }

    /// Compile and enqueue each effect at its deadline.
    ///
    /// An effect that cannot be loaded or compiled is logged and skipped.
    /// A queue failure stops scheduling and is returned. Yields the number
    /// of batches queued.
    pub fn schedule_effects(&mut self, effects: &[EffectEntry]) -> Result<usize> {
        let mut queued = 0;
        for effect in effects {
            let batch = match compile_file(&effect.path) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("skipping effect {}: {}", effect.path.display(), e);
                    continue;
                }
            };
            info!(
                "scheduled {} ({} bytes) for sample {}",
                effect.path.display(),
                batch.len(),
                effect.deadline
            );
            self.enqueue(batch, effect.deadline)?;
            queued += 1;
        }
        Ok(queued)
    }

    /// Hold reset for `ticks` clock ticks.
    pub fn reset(&mut self, ticks: u32) {
        self.bench.set_reset(true);
        for _ in 0..ticks {
            self.tick();
        }
        self.bench.set_reset(false);
        self.bench.clear_sample_ready();
        self.stats.reset_ticks += ticks as u64;
    }

    /// Advance one full clock period: high phase then low phase.
    pub fn tick(&mut self) {
        for level in [true, false] {
            self.bench.set_clock(level);
            self.bench.update_io();
            self.bench.eval();
            self.dump_trace();
            trace!("t={} {:?}", self.time_index, self.bench.signals());
            self.time_index += 1;
        }
        self.stats.ticks += 1;
    }

    fn dump_trace(&mut self) {
        let Some(tracer) = self.tracer.as_mut() else {
            return;
        };
        if let Err(e) = tracer.dump(self.time_index, &self.bench.signals()) {
            warn!("waveform trace disabled after write error: {}", e);
            self.tracer = None;
        }
    }

    /// Run one tick and, if the device asked for a sample, one ready cycle.
    ///
    /// Returns whether a ready cycle happened.
    pub fn step(&mut self) -> bool {
        self.tick();
        if !self.bench.sample_ready() {
            return false;
        }
        self.stats.ready_cycles += 1;
        self.serve_queue();
        self.pump_sample();
        true
    }

    /// Step until the sample limit is reached.
    ///
    /// Fails if the device goes `stall_ticks` ticks without asking for a
    /// sample.
    pub fn run(&mut self) -> Result<()> {
        let mut idle = 0u64;
        while !self.is_finished() {
            if self.step() {
                idle = 0;
                continue;
            }
            idle += 1;
            if idle >= self.config.stall_ticks {
                return Err(FxsimError::DeviceStalled {
                    sample: self.sample_clock,
                    ticks: idle,
                });
            }
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.sample_clock >= self.limit
    }

    fn serve_queue(&mut self) {
        let now = self.sample_clock;
        match self.queue.head() {
            Some(head) if now >= head.deadline() => {}
            _ => return,
        }

        if let Some(batch) = self.queue.start_head() {
            info!("sending batch at sample {}: {}", now, batch);
            if let Some(validator) = self.validator.as_mut() {
                validator.apply_batch(batch);
            }
            self.stats.batches_started += 1;
        }

        if let Some(byte) = self.queue.head().and_then(ScheduledSend::next_byte) {
            match self.bench.send_byte(byte) {
                Delivery::Accepted => {
                    self.queue.commit_head_byte();
                    self.stats.bytes_sent += 1;
                }
                Delivery::Rejected => {
                    self.stats.bytes_rejected += 1;
                    trace!("byte {:#04x} refused at sample {}, retrying", byte, now);
                }
            }
        }

        if self.queue.advance_head().is_some() {
            debug!("batch transfer complete at sample {}", now);
            self.stats.batches_completed += 1;
        }
    }

    fn pump_sample(&mut self) {
        self.sample_clock += 1;
        self.elapsed += self.sample_period;

        let input = self.stimulus.sample(self.sample_clock, self.elapsed);
        self.bench.set_sample_in(input);
        let actual = self.bench.sample_out();
        self.output.push(actual);
        self.bench.clear_sample_ready();

        if let Some(validator) = self.validator.as_mut() {
            if validator.observe(self.sample_clock, input, actual).is_some() {
                self.stats.mismatches += 1;
            }
        }

        if self.config.progress_interval > 0 && self.sample_clock % self.config.progress_interval == 0 {
            debug!(
                "samples processed: {}/{} ({:.2}%)",
                self.sample_clock,
                self.limit,
                100.0 * self.sample_clock as f64 / self.limit.max(1) as f64
            );
        }
    }

    /// Ready cycles completed so far.
    pub fn sample_clock(&self) -> u64 {
        self.sample_clock
    }

    /// Samples this run will produce.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Seconds of audio produced so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn queue(&self) -> &SendQueue {
        &self.queue
    }

    pub fn output(&self) -> &[i16] {
        &self.output
    }

    pub fn bench(&self) -> &B {
        &self.bench
    }

    pub fn bench_mut(&mut self) -> &mut B {
        &mut self.bench
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Close the trace and hand back the collected streams.
    pub fn finish(mut self) -> RunOutput {
        if let Some(tracer) = self.tracer.take() {
            match tracer.close() {
                Ok(points) => info!("waveform trace closed after {} time points", points),
                Err(e) => warn!("waveform trace may be incomplete: {}", e),
            }
        }
        if self.sample_clock < self.limit {
            warn!(
                "run finished early: {} of {} samples",
                self.sample_clock, self.limit
            );
        }

        let (predicted, mismatches) = match self.validator {
            Some(validator) => {
                let (predicted, mismatches) = validator.into_parts();
                (Some(predicted), mismatches)
            }
            None => (None, Vec::new()),
        };

        RunOutput {
            samples: self.output,
            predicted,
            mismatches,
            stats: self.stats,
        }
    }
}
