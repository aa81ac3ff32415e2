//! Demo Mode - simulated ALDL ECM
//!
//! Answers data requests with checksummed frames shaped by a
//! [`DecoderSchema`], so the acquisition engine can be exercised without a
//! car. Simulates an engine idling at ~850 RPM with random throttle blips;
//! parameters are matched to simulated sensors by title keyword.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::definition::{DecoderSchema, ParameterDef, MAX_FRAME_LENGTH};
use crate::protocol::frame::seal_frame;

const IDLE_RPM: f64 = 850.0;
const RAMP_UP_MS: u64 = 300;
const HOLD_MS: u64 = 200;
const RAMP_DOWN_MS: u64 = 800;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlipState {
    /// Engine idling normally
    Idle,
    /// Throttle opening, RPM rising
    RampUp { start_ms: u64 },
    /// At peak RPM, holding
    Hold { start_ms: u64 },
    /// Throttle closing, RPM falling
    RampDown { start_ms: u64 },
}

/// Engine state behind the simulated sensors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSample {
    /// Engine speed, RPM
    pub rpm: f64,
    /// Throttle position, percent
    pub tps: f64,
    /// Manifold pressure, kPa
    pub map_kpa: f64,
    /// Coolant temperature, °C
    pub coolant_c: f64,
    /// Vehicle speed, km/h
    pub speed_kph: f64,
    /// Battery voltage
    pub battery_v: f64,
    /// Oxygen sensor, mV
    pub o2_mv: f64,
}

/// Simulated ECM answering ALDL data requests
pub struct SimulatedEcm {
    schema: Arc<DecoderSchema>,
    echo: bool,
    corruption_rate: f64,
    blip_state: BlipState,
    next_blip_at_ms: u64,
    blip_target_rpm: f64,
    rng: StdRng,
}

impl SimulatedEcm {
    /// Create a simulator that echoes requests the way most ALDL cables do
    pub fn new(schema: Arc<DecoderSchema>) -> Self {
        Self::with_rng(schema, StdRng::from_entropy())
    }

    /// Create a simulator with a fixed seed for reproducible runs
    pub fn seeded(schema: Arc<DecoderSchema>, seed: u64) -> Self {
        Self::with_rng(schema, StdRng::seed_from_u64(seed))
    }

    fn with_rng(schema: Arc<DecoderSchema>, mut rng: StdRng) -> Self {
        let next_blip_at_ms = rng.gen_range(8000..15000);
        Self {
            schema,
            echo: true,
            corruption_rate: 0.0,
            blip_state: BlipState::Idle,
            next_blip_at_ms,
            blip_target_rpm: IDLE_RPM,
            rng,
        }
    }

    /// Whether the request is looped back ahead of each frame
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Fraction of frames sent with a broken checksum, 0.0-1.0
    pub fn with_corruption(mut self, rate: f64) -> Self {
        self.corruption_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Engine state at `elapsed_ms` since the simulation started
    pub fn sample(&mut self, elapsed_ms: u64) -> EngineSample {
        self.update_blip_state(elapsed_ms);
        let rpm_target = self.target_rpm(elapsed_ms);

        let t = elapsed_ms as f64 / 1000.0;
        let idle_wobble = if self.blip_state == BlipState::Idle {
            20.0 * (t * 2.5).sin() + 10.0 * (t * 7.3).sin()
        } else {
            0.0
        };
        let rpm = (rpm_target + idle_wobble).max(0.0);

        let load = ((rpm - IDLE_RPM) / (self.blip_target_rpm - IDLE_RPM).max(1.0)).clamp(0.0, 1.0);
        let tps = 1.5 + load * 45.0;
        let map_kpa = if rpm < 1000.0 {
            35.0 + 10.0 * (1.0 - rpm / 1000.0)
        } else {
            25.0 + rpm / 100.0
        };

        EngineSample {
            rpm,
            tps: tps.clamp(0.0, 100.0),
            map_kpa: map_kpa.clamp(20.0, 105.0),
            coolant_c: 20.0 + 70.0 * (1.0 - (-t / 120.0).exp()),
            speed_kph: 0.0,
            battery_v: 13.8 + 0.2 * (t * 0.5).sin(),
            o2_mv: 450.0 + 350.0 * (t * 1.5).sin(),
        }
    }

    /// Display values for every parameter of the schema
    pub fn parameter_values(&mut self, elapsed_ms: u64) -> BTreeMap<String, f64> {
        let sample = self.sample(elapsed_ms);
        self.schema
            .parameters
            .iter()
            .map(|p| (p.id.clone(), sensor_value(p, &sample)))
            .collect()
    }

    /// Build a checksummed frame carrying `values`.
    ///
    /// Byte 0 is always the header byte; a parameter mapped onto it is not
    /// encoded.
    pub fn encode_frame(&self, values: &BTreeMap<String, f64>) -> Vec<u8> {
        let body_len = self
            .schema
            .expected_frame_length
            .clamp(2, MAX_FRAME_LENGTH)
            - 1;
        let mut body = vec![0u8; body_len];
        body[0] = self.schema.header_byte().unwrap_or_default();

        for param in self.schema.parameters.iter().filter(|p| p.byte_offset > 0) {
            let Some(value) = values.get(&param.id) else {
                continue;
            };
            let raw = encode_raw(param, *value);
            match param.byte_count {
                2 => {
                    if let Some(bytes) = body.get_mut(param.byte_offset..param.end()) {
                        bytes.copy_from_slice(&raw.to_be_bytes());
                    }
                }
                _ => {
                    if let Some(byte) = body.get_mut(param.byte_offset) {
                        *byte = raw as u8;
                    }
                }
            }
        }

        seal_frame(body)
    }

    /// Full response to one request: optional echo followed by a frame
    pub fn response(&mut self, elapsed_ms: u64) -> Vec<u8> {
        let values = self.parameter_values(elapsed_ms);
        let mut frame = self.encode_frame(&values);
        if self.corruption_rate > 0.0 && self.rng.gen_bool(self.corruption_rate) {
            if let Some(last) = frame.last_mut() {
                *last = last.wrapping_add(1);
            }
        }

        let mut out = Vec::with_capacity(self.schema.request_command.len() + frame.len());
        if self.echo {
            out.extend_from_slice(&self.schema.request_command);
        }
        out.extend(frame);
        out
    }

    /// Answer requests on `stream` until the host side closes it.
    pub async fn serve<S>(mut self, mut stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let start = Instant::now();
        let request = self.schema.request_command.clone();
        let mut pending: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 64];

        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            pending.extend_from_slice(&chunk[..n]);

            if !request.is_empty() && pending.ends_with(&request) {
                pending.clear();
                let elapsed_ms = start.elapsed().as_millis() as u64;
                let response = self.response(elapsed_ms);
                stream.write_all(&response).await?;
                stream.flush().await?;
            } else if pending.len() > request.len() * 4 {
                // Garbage on the line; keep only what could still start a request
                let keep = pending.len() - request.len();
                pending.drain(..keep);
            }
        }
    }

    /// Spawn the simulator on an in-memory pipe and return the host end
    pub fn spawn(self) -> (DuplexStream, JoinHandle<io::Result<()>>) {
        let (host, device) = tokio::io::duplex(1024);
        let handle = tokio::spawn(self.serve(device));
        (host, handle)
    }

    fn update_blip_state(&mut self, sim_time: u64) {
        match self.blip_state {
            BlipState::Idle => {
                if sim_time >= self.next_blip_at_ms {
                    self.blip_target_rpm = self.rng.gen_range(2000.0..4000.0);
                    self.blip_state = BlipState::RampUp { start_ms: sim_time };
                }
            }
            BlipState::RampUp { start_ms } => {
                if sim_time >= start_ms + RAMP_UP_MS {
                    self.blip_state = BlipState::Hold { start_ms: sim_time };
                }
            }
            BlipState::Hold { start_ms } => {
                if sim_time >= start_ms + HOLD_MS {
                    self.blip_state = BlipState::RampDown { start_ms: sim_time };
                }
            }
            BlipState::RampDown { start_ms } => {
                if sim_time >= start_ms + RAMP_DOWN_MS {
                    self.blip_state = BlipState::Idle;
                    self.next_blip_at_ms = sim_time + self.rng.gen_range(8000..15000);
                }
            }
        }
    }

    fn target_rpm(&self, sim_time: u64) -> f64 {
        match self.blip_state {
            BlipState::Idle => IDLE_RPM,
            BlipState::RampUp { start_ms } => {
                let progress = (sim_time.saturating_sub(start_ms) as f64 / RAMP_UP_MS as f64).min(1.0);
                IDLE_RPM + (self.blip_target_rpm - IDLE_RPM) * progress
            }
            BlipState::Hold { .. } => self.blip_target_rpm,
            BlipState::RampDown { start_ms } => {
                let progress =
                    (sim_time.saturating_sub(start_ms) as f64 / RAMP_DOWN_MS as f64).min(1.0);
                self.blip_target_rpm + (IDLE_RPM - self.blip_target_rpm) * progress
            }
        }
    }
}

/// Pick the simulated sensor a parameter most likely measures
fn sensor_value(param: &ParameterDef, sample: &EngineSample) -> f64 {
    let title = param.title.to_uppercase();
    if title.contains("RPM") {
        sample.rpm
    } else if title.contains("TPS") || title.contains("THROTTLE") {
        sample.tps
    } else if title.contains("MAP") {
        sample.map_kpa
    } else if title.contains("TEMP") || title.contains("COOLANT") {
        sample.coolant_c
    } else if title.contains("SPEED") {
        sample.speed_kph
    } else if title.contains("VOLT") {
        sample.battery_v
    } else if title.contains("O2") {
        sample.o2_mv
    } else {
        // Unknown sensor: sit mid-scale
        param.raw_to_display(128.0)
    }
}

/// Invert the parameter's scale/offset and clamp to its raw width
fn encode_raw(param: &ParameterDef, value: f64) -> u16 {
    let max = if param.byte_count == 2 { u16::MAX as f64 } else { u8::MAX as f64 };
    if param.scale == 0.0 {
        return 0;
    }
    ((value - param.offset) / param.scale).round().clamp(0.0, max) as u16
}
