use std::net::UdpSocket;
use std::sync::LazyLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};

/// Fire-and-forget OSC sender for an external synthesis server.
pub struct OscClient {
    socket: UdpSocket,
    server_addr: String,
}

impl OscClient {
    pub fn new(server_addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            server_addr: server_addr.to_string(),
        })
    }

    pub fn send_message(&self, addr: &str, args: Vec<OscType>) -> std::io::Result<()> {
        let msg = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        self.send_packet(&msg)
    }

    /// Messages delivered together, executed at `time` on the server.
    pub fn send_bundle(&self, messages: Vec<OscMessage>, time: OscTime) -> std::io::Result<()> {
        let content = messages.into_iter().map(OscPacket::Message).collect();
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: time,
            content,
        });
        self.send_packet(&bundle)
    }

    fn send_packet(&self, packet: &OscPacket) -> std::io::Result<()> {
        let buf = rosc::encoder::encode(packet)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        self.socket.send_to(&buf, &self.server_addr)?;
        Ok(())
    }
}

/// OSC timetags count seconds from the NTP epoch (1900-01-01).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Anchor pair captured once at init: (monotonic instant, wall-clock time).
/// Timetags are derived from the Instant elapsed since this anchor so
/// wall-clock adjustments never make scheduled ramps jump.
static CLOCK_ANCHOR: LazyLock<(Instant, f64)> = LazyLock::new(|| {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    (Instant::now(), wall)
});

/// Seconds elapsed on the monotonic anchor clock.
pub fn clock_secs() -> f64 {
    CLOCK_ANCHOR.0.elapsed().as_secs_f64()
}

/// Timetag for an absolute time on the anchor clock (see [`clock_secs`]).
pub fn osc_time_at(clock: f64) -> OscTime {
    let (_, anchor_wall) = &*CLOCK_ANCHOR;
    let total_secs = anchor_wall + clock.max(0.0);
    let secs = total_secs as u64 + NTP_UNIX_OFFSET;
    let frac = (total_secs.fract() * (u32::MAX as f64)) as u32;
    OscTime {
        seconds: secs as u32,
        fractional: frac,
    }
}

/// The reserved (0, 1) timetag: run on arrival.
pub fn osc_time_immediate() -> OscTime {
    OscTime {
        seconds: 0,
        fractional: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timetags_are_monotonic() {
        let a = osc_time_at(1.0);
        let b = osc_time_at(2.5);
        assert!((b.seconds, b.fractional) > (a.seconds, a.fractional));
    }

    #[test]
    fn clock_advances() {
        let a = clock_secs();
        let b = clock_secs();
        assert!(b >= a);
    }
}
