//! Kinematic vehicle model on a ring track
//!
//! Stand-in for the external simulator so the server runs on its own. Cars
//! follow a single-track (bicycle) model, stop dead on wall contact and do not
//! collide with each other.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::engine::{EngineError, EngineState, SimEngine, StepOutcome};
use super::{Command, StartPose, SCAN_BEAMS};

/// Integration step; longer elapsed times are split into sub-steps
const SUB_STEP: f64 = 0.01;
/// Upper bound on simulated time per call
const MAX_ELAPSED: f64 = 1.0;
/// First and last beam angle relative to heading (rad)
pub const SCAN_FOV_HALF: f64 = 2.35;

/// Vehicle constants
#[derive(Debug, Clone, Copy)]
pub struct VehicleParams {
    /// Axle distance (m)
    pub wheelbase: f64,
    /// Longitudinal acceleration limit (m/s^2)
    pub max_accel: f64,
    /// Body radius used for wall contact (m)
    pub body_radius: f64,
    /// Range finder maximum distance (m)
    pub scan_range: f64,
    /// Half width of uniform range noise (m)
    pub scan_noise: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            wheelbase: 0.33,
            max_accel: 9.51,
            body_radius: 0.2,
            scan_range: 30.0,
            scan_noise: 0.01,
        }
    }
}

/// Annulus centred on the origin; the start line is the positive x axis
#[derive(Debug, Clone, Copy)]
pub struct TrackGeometry {
    pub inner_radius: f64,
    pub outer_radius: f64,
}

impl Default for TrackGeometry {
    fn default() -> Self {
        Self {
            inner_radius: 8.0,
            outer_radius: 12.0,
        }
    }
}

impl TrackGeometry {
    /// Default start: on the start line, mid-track, heading counter-clockwise
    pub fn default_start(&self) -> StartPose {
        StartPose {
            x: (self.inner_radius + self.outer_radius) / 2.0,
            y: 0.0,
            theta: PI / 2.0,
        }
    }

    /// Check if a body of `radius` at (x, y) fits between the walls
    pub fn is_on_track(&self, x: f64, y: f64, radius: f64) -> bool {
        let r = x.hypot(y);
        r - radius >= self.inner_radius && r + radius <= self.outer_radius
    }

    /// Distance along a ray to the first wall, capped at `max_range`
    pub fn ray_distance(&self, x: f64, y: f64, angle: f64, max_range: f64) -> f64 {
        let (dx, dy) = (angle.cos(), angle.sin());
        let b = x * dx + y * dy;
        let p2 = x * x + y * y;
        let mut best = max_range;

        // Outer wall: origin of the ray is inside, always one forward hit
        let disc = b * b - (p2 - self.outer_radius * self.outer_radius);
        if disc >= 0.0 {
            let t = -b + disc.sqrt();
            if t > 0.0 {
                best = best.min(t);
            }
        }

        // Inner wall: the ray may miss it entirely
        let disc = b * b - (p2 - self.inner_radius * self.inner_radius);
        if disc >= 0.0 {
            let t = -b - disc.sqrt();
            if t > 0.0 {
                best = best.min(t);
            }
        }

        best
    }
}

#[derive(Debug, Clone, Copy)]
struct Vehicle {
    x: f64,
    y: f64,
    theta: f64,
    speed: f64,
    yaw_rate: f64,
    /// Signed start line crossings; forward +1, backward -1
    crossings: i64,
    collided: bool,
}

impl Vehicle {
    fn at(pose: StartPose) -> Self {
        Self {
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            speed: 0.0,
            yaw_rate: 0.0,
            crossings: 0,
            collided: false,
        }
    }

    fn lap_count(&self) -> u32 {
        self.crossings.max(0) as u32
    }
}

/// Physics system for the stand-in simulator
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one vehicle by `dt`. Returns true on wall contact.
    fn update_vehicle(
        vehicle: &mut Vehicle,
        cmd: Command,
        dt: f64,
        params: &VehicleParams,
        track: &TrackGeometry,
    ) -> bool {
        // Speed tracks the target within the acceleration limit
        let max_dv = params.max_accel * dt;
        vehicle.speed += (cmd.speed - vehicle.speed).clamp(-max_dv, max_dv);

        vehicle.yaw_rate = vehicle.speed * cmd.steer.tan() / params.wheelbase;
        let theta = (vehicle.theta + vehicle.yaw_rate * dt).rem_euclid(2.0 * PI);
        let x = vehicle.x + vehicle.speed * theta.cos() * dt;
        let y = vehicle.y + vehicle.speed * theta.sin() * dt;

        if !track.is_on_track(x, y, params.body_radius) {
            vehicle.speed = 0.0;
            vehicle.yaw_rate = 0.0;
            return true;
        }

        vehicle.crossings += Self::start_line_crossing(vehicle.x, vehicle.y, x, y);
        vehicle.x = x;
        vehicle.y = y;
        vehicle.theta = theta;
        false
    }

    /// +1 when moving counter-clockwise over the start line, -1 when reversing over it
    fn start_line_crossing(x0: f64, y0: f64, x1: f64, y1: f64) -> i64 {
        if x0 <= 0.0 || x1 <= 0.0 {
            return 0;
        }
        if y0 < 0.0 && y1 >= 0.0 {
            1
        } else if y0 >= 0.0 && y1 < 0.0 {
            -1
        } else {
            0
        }
    }
}

/// Ring-track simulator implementing [`SimEngine`]
pub struct KinematicEngine {
    params: VehicleParams,
    track: TrackGeometry,
    vehicles: Vec<Vehicle>,
    sim_time: f64,
    rng: ChaCha8Rng,
}

impl KinematicEngine {
    pub fn new(seed: u64) -> Self {
        Self::with_geometry(seed, VehicleParams::default(), TrackGeometry::default())
    }

    pub fn with_geometry(seed: u64, params: VehicleParams, track: TrackGeometry) -> Self {
        Self {
            params,
            track,
            vehicles: Vec::new(),
            sim_time: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn track(&self) -> &TrackGeometry {
        &self.track
    }

    fn scan(&mut self, vehicle: &Vehicle) -> Vec<f64> {
        let step = 2.0 * SCAN_FOV_HALF / (SCAN_BEAMS - 1) as f64;
        (0..SCAN_BEAMS)
            .map(|i| {
                let angle = vehicle.theta - SCAN_FOV_HALF + step * i as f64;
                let range =
                    self.track
                        .ray_distance(vehicle.x, vehicle.y, angle, self.params.scan_range);
                let noise = if self.params.scan_noise > 0.0 {
                    self.rng.gen_range(-self.params.scan_noise..=self.params.scan_noise)
                } else {
                    0.0
                };
                (range + noise).max(0.0)
            })
            .collect()
    }

    fn state(&mut self) -> EngineState {
        let vehicles = self.vehicles.clone();
        let scans = vehicles.iter().map(|v| self.scan(v)).collect();

        EngineState {
            scans,
            poses_x: vehicles.iter().map(|v| v.x).collect(),
            poses_y: vehicles.iter().map(|v| v.y).collect(),
            poses_theta: vehicles.iter().map(|v| v.theta).collect(),
            linear_vels_x: vehicles.iter().map(|v| v.speed).collect(),
            linear_vels_y: vec![0.0; vehicles.len()],
            ang_vels_z: vehicles.iter().map(|v| v.yaw_rate).collect(),
            lap_counts: vehicles.iter().map(Vehicle::lap_count).collect(),
            lap_times: vec![self.sim_time; vehicles.len()],
            collisions: vehicles.iter().map(|v| v.collided).collect(),
        }
    }
}

impl SimEngine for KinematicEngine {
    fn reset(&mut self, starts: &[StartPose]) -> Result<EngineState, EngineError> {
        if starts.is_empty() {
            return Err(EngineError::Reset("no starting positions".to_string()));
        }
        if let Some(i) = starts
            .iter()
            .position(|p| !self.track.is_on_track(p.x, p.y, self.params.body_radius))
        {
            return Err(EngineError::Reset(format!(
                "starting position {i} is off the track"
            )));
        }

        self.vehicles = starts.iter().copied().map(Vehicle::at).collect();
        self.sim_time = 0.0;
        Ok(self.state())
    }

    fn step(&mut self, commands: &[Command], elapsed: f64) -> Result<StepOutcome, EngineError> {
        if self.vehicles.is_empty() {
            return Err(EngineError::Step("step before reset".to_string()));
        }
        if commands.len() != self.vehicles.len() {
            return Err(EngineError::Step(format!(
                "got {} commands for {} vehicles",
                commands.len(),
                self.vehicles.len()
            )));
        }
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(EngineError::Step(format!("invalid elapsed time {elapsed}")));
        }

        let elapsed = elapsed.min(MAX_ELAPSED);
        let sub_steps = (elapsed / SUB_STEP).ceil().max(1.0) as usize;
        let dt = elapsed / sub_steps as f64;

        for v in self.vehicles.iter_mut() {
            v.collided = false;
        }

        for _ in 0..sub_steps {
            for (vehicle, cmd) in self.vehicles.iter_mut().zip(commands) {
                if PhysicsSystem::update_vehicle(vehicle, *cmd, dt, &self.params, &self.track) {
                    vehicle.collided = true;
                }
            }
        }
        self.sim_time += elapsed;

        let state = self.state();
        let done = state.collisions.iter().any(|&c| c);
        Ok(StepOutcome {
            state,
            reward: elapsed,
            done,
        })
    }
}
