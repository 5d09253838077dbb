//! # amuse-core
//!
//! Simulation engine for the amuse linkage drawing machine: a rotor carrying
//! two hands, each ending in a jointed arm, whose meeting point traces a
//! curve. Independent of any presentation surface or audio sink.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use amuse_core::config::Config;
//! use amuse_core::session::Session;
//!
//! let config = Config::load();
//! let mut session = Session::from_config(&config);
//! session.start_new_run();
//! while session.is_running() {
//!     let out = session.tick(None, now());
//!     // draw out.segments, out.particles
//!     session.poll_chords(now());
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`kinematics`] — closed-form linkage solve, pointer attraction
//! - [`cycle`] — period of the combined rotor and hand motion
//! - [`autostop`] — closure detection
//! - [`style`] — pen color, alpha and width per sub-step
//! - [`segments`] — bounded segment store and SVG export
//! - [`driver`] — `EngineState` and the per-tick `tick` loop
//! - [`session`] — run lifecycle (start, pause, clear, reset) and audio dispatch
//! - [`randomize`] — random parameter sets
//! - [`config`] — TOML application config (embedded + user override) and JSON presets
//! - [`telemetry`] — tick timing ring buffer

pub mod autostop;
pub mod config;
pub mod cycle;
pub mod driver;
pub mod kinematics;
pub mod randomize;
pub mod segments;
pub mod session;
pub mod style;
pub mod telemetry;

pub use driver::{tick, Canvas, EngineLimits, EngineState, TickInput, TickOutput};
pub use session::Session;
