//! Audio backend trait: a semantic-level abstraction over the audio sink.
//!
//! `AudioBackend` captures what the graph *means* to do (create a node, wire it,
//! ramp a parameter) independently of how it's done (OSC messages to an external
//! synthesis server). This enables unit testing of graph lifecycle and ramp
//! scheduling without a running audio server.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use amuse_types::{NodeId, Waveform};
use rosc::{OscMessage, OscTime, OscType};

use super::NodeKind;
use crate::osc_client::{clock_secs, osc_time_at, osc_time_immediate, OscClient};

/// Result type for backend operations.
pub type BackendResult<T = ()> = Result<T, BackendError>;

/// Error from a backend operation.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError(e.to_string())
    }
}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

/// Shape of a scheduled parameter ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampCurve {
    Linear,
    Exponential,
}

impl RampCurve {
    fn name(&self) -> &'static str {
        match self {
            RampCurve::Linear => "lin",
            RampCurve::Exponential => "exp",
        }
    }
}

/// Semantic-level audio backend trait.
///
/// Times are absolute seconds on the sink's own clock, as reported by
/// [`AudioBackend::current_time`]. Ramps start from whatever value the
/// parameter holds at `start`, so callers never need to track it.
/// Scheduled events accumulate until cancelled with
/// [`AudioBackend::cancel_scheduled`].
pub trait AudioBackend: Send {
    /// Acquire the output context. Must precede any node creation.
    fn open(&self) -> BackendResult;

    /// Release the output context. Nodes are gone afterwards.
    fn close(&self) -> BackendResult;

    /// Whether the render clock is currently running.
    fn is_running(&self) -> bool;

    /// Current time of the render clock in seconds.
    fn current_time(&self) -> f64;

    /// Create a node of the given kind with initial parameter values.
    fn create_node(&self, node_id: NodeId, kind: NodeKind, params: &[(String, f32)]) -> BackendResult;

    /// Route `from`'s output into `to`'s input.
    fn connect(&self, from: NodeId, to: NodeId) -> BackendResult;

    /// Route `from`'s output into a modulatable parameter of `to`.
    fn connect_param(&self, from: NodeId, to: NodeId, param: &str) -> BackendResult;

    /// Remove every outgoing connection of a node.
    fn disconnect(&self, node_id: NodeId) -> BackendResult;

    /// Start a source node at `at`.
    fn start_node(&self, node_id: NodeId, at: f64) -> BackendResult;

    /// Stop a source node at `at`.
    fn stop_node(&self, node_id: NodeId, at: f64) -> BackendResult;

    /// Drop automation events on `param` scheduled at or after `from`.
    fn cancel_scheduled(&self, node_id: NodeId, param: &str, from: f64) -> BackendResult;

    /// Jump to `value` at `at`.
    fn set_param(&self, node_id: NodeId, param: &str, value: f32, at: f64) -> BackendResult;

    /// Ramp from the value held at `start` to `target` by `end`.
    fn ramp_param(
        &self,
        node_id: NodeId,
        param: &str,
        target: f32,
        curve: RampCurve,
        start: f64,
        end: f64,
    ) -> BackendResult;

    /// Replace a wave-shaper transfer curve.
    fn set_curve(&self, node_id: NodeId, curve: &[f32]) -> BackendResult;

    /// Change an oscillator's waveform.
    fn set_waveform(&self, node_id: NodeId, waveform: Waveform) -> BackendResult;
}

// ─── OSC Backend ────────────────────────────────────────────────────

/// Backend that forwards graph operations to an external synthesis server.
///
/// The server owns the actual DSP; this side only keeps the clock. Ramps are
/// sent as bundles timetagged at their start time. A send that fails marks
/// the output as not running, which is what the graph checks before every
/// melody step.
pub struct OscBackend {
    client: OscClient,
    running: AtomicBool,
}

impl OscBackend {
    pub fn new(client: OscClient) -> Self {
        Self {
            client,
            running: AtomicBool::new(false),
        }
    }

    pub fn connect_to(server_addr: &str) -> BackendResult<Self> {
        Ok(Self::new(OscClient::new(server_addr)?))
    }

    fn delivered(&self, sent: std::io::Result<()>) -> BackendResult {
        sent.map_err(|e| {
            if self.running.swap(false, Ordering::AcqRel) {
                log::warn!(target: "audio::osc", "send failed, output marked stopped: {}", e);
            }
            BackendError::from(e)
        })
    }

    fn message(&self, addr: &str, args: Vec<OscType>) -> BackendResult {
        self.delivered(self.client.send_message(addr, args))
    }

    fn scheduled(&self, addr: &str, args: Vec<OscType>, time: OscTime) -> BackendResult {
        let msg = OscMessage {
            addr: addr.to_string(),
            args,
        };
        self.delivered(self.client.send_bundle(vec![msg], time))
    }
}

fn node_arg(node_id: NodeId) -> OscType {
    OscType::Int(node_id.get())
}

impl AudioBackend for OscBackend {
    fn open(&self) -> BackendResult {
        self.message("/amuse/open", vec![])?;
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> BackendResult {
        self.running.store(false, Ordering::Release);
        self.client
            .send_message("/amuse/close", vec![])
            .map_err(BackendError::from)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn current_time(&self) -> f64 {
        clock_secs()
    }

    fn create_node(&self, node_id: NodeId, kind: NodeKind, params: &[(String, f32)]) -> BackendResult {
        let mut args = vec![
            OscType::String(kind.def_name().to_string()),
            node_arg(node_id),
        ];
        for (name, value) in params {
            args.push(OscType::String(name.clone()));
            args.push(OscType::Float(*value));
        }
        self.message("/amuse/node_new", args)
    }

    fn connect(&self, from: NodeId, to: NodeId) -> BackendResult {
        self.message("/amuse/connect", vec![node_arg(from), node_arg(to)])
    }

    fn connect_param(&self, from: NodeId, to: NodeId, param: &str) -> BackendResult {
        self.message(
            "/amuse/connect_param",
            vec![node_arg(from), node_arg(to), OscType::String(param.to_string())],
        )
    }

    fn disconnect(&self, node_id: NodeId) -> BackendResult {
        self.message("/amuse/disconnect", vec![node_arg(node_id)])
    }

    fn start_node(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.scheduled("/amuse/start", vec![node_arg(node_id)], osc_time_at(at))
    }

    fn stop_node(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.scheduled("/amuse/stop", vec![node_arg(node_id)], osc_time_at(at))
    }

    fn cancel_scheduled(&self, node_id: NodeId, param: &str, from: f64) -> BackendResult {
        self.scheduled(
            "/amuse/cancel",
            vec![node_arg(node_id), OscType::String(param.to_string())],
            osc_time_at(from),
        )
    }

    fn set_param(&self, node_id: NodeId, param: &str, value: f32, at: f64) -> BackendResult {
        let time = if at <= self.current_time() {
            osc_time_immediate()
        } else {
            osc_time_at(at)
        };
        self.scheduled(
            "/amuse/set",
            vec![
                node_arg(node_id),
                OscType::String(param.to_string()),
                OscType::Float(value),
            ],
            time,
        )
    }

    fn ramp_param(
        &self,
        node_id: NodeId,
        param: &str,
        target: f32,
        curve: RampCurve,
        start: f64,
        end: f64,
    ) -> BackendResult {
        self.scheduled(
            "/amuse/ramp",
            vec![
                node_arg(node_id),
                OscType::String(param.to_string()),
                OscType::Float(target),
                OscType::String(curve.name().to_string()),
                OscType::Float((end - start).max(0.0) as f32),
            ],
            osc_time_at(start),
        )
    }

    fn set_curve(&self, node_id: NodeId, curve: &[f32]) -> BackendResult {
        let blob: Vec<u8> = curve.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.message("/amuse/curve", vec![node_arg(node_id), OscType::Blob(blob)])
    }

    fn set_waveform(&self, node_id: NodeId, waveform: Waveform) -> BackendResult {
        self.message(
            "/amuse/waveform",
            vec![node_arg(node_id), OscType::String(waveform.name().to_string())],
        )
    }
}

// ─── Test Backend ───────────────────────────────────────────────────

/// An operation recorded by `TestBackend` for assertion in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOp {
    Open,
    Close,
    CreateNode {
        node_id: NodeId,
        kind: NodeKind,
        params: Vec<(String, f32)>,
    },
    Connect {
        from: NodeId,
        to: NodeId,
    },
    ConnectParam {
        from: NodeId,
        to: NodeId,
        param: String,
    },
    Disconnect(NodeId),
    Start {
        node_id: NodeId,
        at: f64,
    },
    Stop {
        node_id: NodeId,
        at: f64,
    },
    Cancel {
        node_id: NodeId,
        param: String,
        from: f64,
    },
    SetParam {
        node_id: NodeId,
        param: String,
        value: f32,
        at: f64,
    },
    Ramp {
        node_id: NodeId,
        param: String,
        target: f32,
        curve: RampCurve,
        start: f64,
        end: f64,
    },
    SetCurve {
        node_id: NodeId,
        len: usize,
    },
    SetWaveform {
        node_id: NodeId,
        waveform: Waveform,
    },
}

/// A test backend that records all operations into a vector for assertions.
/// The clock and the running flag are settable so tests can simulate a
/// stalled output path, and `fail_next` makes operations fail the way an
/// unreachable server does.
pub struct TestBackend {
    ops: Mutex<Vec<TestOp>>,
    running: AtomicBool,
    clock: Mutex<f64>,
    failures: AtomicUsize,
}

impl TestBackend {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            clock: Mutex::new(0.0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<TestOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Clear recorded operations.
    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&TestOp) -> bool>(&self, f: F) -> usize {
        self.ops.lock().unwrap().iter().filter(|op| f(op)).count()
    }

    /// Find the first operation matching a predicate.
    pub fn find<F: Fn(&TestOp) -> bool>(&self, f: F) -> Option<TestOp> {
        self.ops.lock().unwrap().iter().find(|op| f(op)).cloned()
    }

    /// Return all ramps scheduled on a node.
    pub fn ramps_on(&self, node_id: NodeId) -> Vec<TestOp> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, TestOp::Ramp { node_id: n, .. } if *n == node_id))
            .cloned()
            .collect()
    }

    /// Simulate the render clock stopping (or resuming) behind the engine's back.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn advance_clock(&self, secs: f64) {
        *self.clock.lock().unwrap() += secs;
    }

    /// Fail the next `n` operations. A failed operation is not recorded and
    /// stops the render clock.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::Release);
    }

    fn record(&self, op: TestOp) -> BackendResult {
        let fail = self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            self.running.store(false, Ordering::Release);
            return Err(BackendError(format!("sink unreachable: {:?}", op)));
        }
        self.ops.lock().unwrap().push(op);
        Ok(())
    }
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for TestBackend {
    fn open(&self) -> BackendResult {
        self.running.store(true, Ordering::Release);
        self.record(TestOp::Open)
    }

    fn close(&self) -> BackendResult {
        self.running.store(false, Ordering::Release);
        self.record(TestOp::Close)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn current_time(&self) -> f64 {
        *self.clock.lock().unwrap()
    }

    fn create_node(&self, node_id: NodeId, kind: NodeKind, params: &[(String, f32)]) -> BackendResult {
        self.record(TestOp::CreateNode {
            node_id,
            kind,
            params: params.to_vec(),
        })
    }

    fn connect(&self, from: NodeId, to: NodeId) -> BackendResult {
        self.record(TestOp::Connect { from, to })
    }

    fn connect_param(&self, from: NodeId, to: NodeId, param: &str) -> BackendResult {
        self.record(TestOp::ConnectParam {
            from,
            to,
            param: param.to_string(),
        })
    }

    fn disconnect(&self, node_id: NodeId) -> BackendResult {
        self.record(TestOp::Disconnect(node_id))
    }

    fn start_node(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.record(TestOp::Start { node_id, at })
    }

    fn stop_node(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.record(TestOp::Stop { node_id, at })
    }

    fn cancel_scheduled(&self, node_id: NodeId, param: &str, from: f64) -> BackendResult {
        self.record(TestOp::Cancel {
            node_id,
            param: param.to_string(),
            from,
        })
    }

    fn set_param(&self, node_id: NodeId, param: &str, value: f32, at: f64) -> BackendResult {
        self.record(TestOp::SetParam {
            node_id,
            param: param.to_string(),
            value,
            at,
        })
    }

    fn ramp_param(
        &self,
        node_id: NodeId,
        param: &str,
        target: f32,
        curve: RampCurve,
        start: f64,
        end: f64,
    ) -> BackendResult {
        self.record(TestOp::Ramp {
            node_id,
            param: param.to_string(),
            target,
            curve,
            start,
            end,
        })
    }

    fn set_curve(&self, node_id: NodeId, curve: &[f32]) -> BackendResult {
        self.record(TestOp::SetCurve {
            node_id,
            len: curve.len(),
        })
    }

    fn set_waveform(&self, node_id: NodeId, waveform: Waveform) -> BackendResult {
        self.record(TestOp::SetWaveform { node_id, waveform })
    }
}

/// Wraps `Arc<TestBackend>` to implement `AudioBackend` so the graph can
/// own a `Box<dyn AudioBackend>` while tests retain an `Arc` for assertions.
pub struct SharedTestBackend(pub Arc<TestBackend>);

impl AudioBackend for SharedTestBackend {
    fn open(&self) -> BackendResult {
        self.0.open()
    }
    fn close(&self) -> BackendResult {
        self.0.close()
    }
    fn is_running(&self) -> bool {
        self.0.is_running()
    }
    fn current_time(&self) -> f64 {
        self.0.current_time()
    }
    fn create_node(&self, node_id: NodeId, kind: NodeKind, params: &[(String, f32)]) -> BackendResult {
        self.0.create_node(node_id, kind, params)
    }
    fn connect(&self, from: NodeId, to: NodeId) -> BackendResult {
        self.0.connect(from, to)
    }
    fn connect_param(&self, from: NodeId, to: NodeId, param: &str) -> BackendResult {
        self.0.connect_param(from, to, param)
    }
    fn disconnect(&self, node_id: NodeId) -> BackendResult {
        self.0.disconnect(node_id)
    }
    fn start_node(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.0.start_node(node_id, at)
    }
    fn stop_node(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.0.stop_node(node_id, at)
    }
    fn cancel_scheduled(&self, node_id: NodeId, param: &str, from: f64) -> BackendResult {
        self.0.cancel_scheduled(node_id, param, from)
    }
    fn set_param(&self, node_id: NodeId, param: &str, value: f32, at: f64) -> BackendResult {
        self.0.set_param(node_id, param, value, at)
    }
    fn ramp_param(
        &self,
        node_id: NodeId,
        param: &str,
        target: f32,
        curve: RampCurve,
        start: f64,
        end: f64,
    ) -> BackendResult {
        self.0.ramp_param(node_id, param, target, curve, start, end)
    }
    fn set_curve(&self, node_id: NodeId, curve: &[f32]) -> BackendResult {
        self.0.set_curve(node_id, curve)
    }
    fn set_waveform(&self, node_id: NodeId, waveform: Waveform) -> BackendResult {
        self.0.set_waveform(node_id, waveform)
    }
}

// ─── NullBackend ────────────────────────────────────────────────────

/// A no-op backend that silently succeeds. Useful as a default when
/// no audio server is connected.
pub struct NullBackend {
    running: AtomicBool,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn open(&self) -> BackendResult {
        self.running.store(true, Ordering::Release);
        Ok(())
    }
    fn close(&self) -> BackendResult {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
    fn current_time(&self) -> f64 {
        clock_secs()
    }
    fn create_node(&self, _: NodeId, _: NodeKind, _: &[(String, f32)]) -> BackendResult { Ok(()) }
    fn connect(&self, _: NodeId, _: NodeId) -> BackendResult { Ok(()) }
    fn connect_param(&self, _: NodeId, _: NodeId, _: &str) -> BackendResult { Ok(()) }
    fn disconnect(&self, _: NodeId) -> BackendResult { Ok(()) }
    fn start_node(&self, _: NodeId, _: f64) -> BackendResult { Ok(()) }
    fn stop_node(&self, _: NodeId, _: f64) -> BackendResult { Ok(()) }
    fn cancel_scheduled(&self, _: NodeId, _: &str, _: f64) -> BackendResult { Ok(()) }
    fn set_param(&self, _: NodeId, _: &str, _: f32, _: f64) -> BackendResult { Ok(()) }
    fn ramp_param(&self, _: NodeId, _: &str, _: f32, _: RampCurve, _: f64, _: f64) -> BackendResult { Ok(()) }
    fn set_curve(&self, _: NodeId, _: &[f32]) -> BackendResult { Ok(()) }
    fn set_waveform(&self, _: NodeId, _: Waveform) -> BackendResult { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable() -> OscBackend {
        // no port, so every send_to fails to resolve
        OscBackend::connect_to("amuse-no-port").unwrap()
    }

    #[test]
    fn osc_open_fails_without_a_server_address() {
        let backend = unreachable();
        assert!(backend.open().is_err());
        assert!(!backend.is_running());
    }

    #[test]
    fn osc_send_failure_stops_the_output() {
        let backend = unreachable();
        backend.running.store(true, Ordering::Release);
        let gain = NodeId::new(2);
        let now = backend.current_time();
        assert!(backend
            .ramp_param(gain, "gain", 0.5, RampCurve::Linear, now, now + 0.01)
            .is_err());
        assert!(!backend.is_running());
    }

    #[test]
    fn failing_test_backend_stops_its_clock() {
        let backend = TestBackend::new();
        backend.open().unwrap();
        backend.fail_next(1);
        assert!(backend.connect(NodeId::new(1), NodeId::new(2)).is_err());
        assert!(!backend.is_running());
        assert!(backend.connect(NodeId::new(1), NodeId::new(2)).is_ok());
        assert_eq!(
            backend.operations(),
            vec![
                TestOp::Open,
                TestOp::Connect {
                    from: NodeId::new(1),
                    to: NodeId::new(2),
                },
            ]
        );
    }
}
