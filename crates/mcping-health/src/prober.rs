//! Liveness probes.
//!
//! Two strategies share the [`Probe`] trait: a RakNet unconnected ping over
//! UDP, which proves the game server itself is answering, and a plain TCP
//! connect for targets that only need a reachability check. Each call makes
//! exactly one attempt on a fresh socket, bounded by the probe deadline.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

use crate::codec::{PingCodec, classify_reply};
use crate::error::ProbeError;
use crate::outcome::{ProbeOutcome, UnhealthyReason};

/// Largest reply we read. Pongs carry a short status string.
const RECV_BUF_LEN: usize = 1024;

/// Host and port of the monitored server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Which probe strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// RakNet unconnected ping over UDP.
    RakNet,
    /// Plain TCP connect.
    Tcp,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::RakNet => f.write_str("raknet"),
            ProbeKind::Tcp => f.write_str("tcp"),
        }
    }
}

/// A single-shot liveness check.
pub trait Probe: Send + Sync {
    /// Run one attempt. Completes within [`Probe::deadline`] plus scheduling slack.
    fn probe(&self) -> impl Future<Output = ProbeOutcome> + Send;

    /// The probed target, for logging.
    fn target(&self) -> &ProbeTarget;

    /// Upper bound on one attempt.
    fn deadline(&self) -> Duration;
}

/// Probe strategy selected by configuration.
#[derive(Debug, Clone)]
pub enum Prober {
    RakNet(RakNetProber),
    Tcp(TcpProber),
}

impl Prober {
    pub fn new(kind: ProbeKind, target: ProbeTarget, deadline: Duration) -> Self {
        match kind {
            ProbeKind::RakNet => Prober::RakNet(RakNetProber::new(target, deadline)),
            ProbeKind::Tcp => Prober::Tcp(TcpProber::new(target, deadline)),
        }
    }

    pub fn kind(&self) -> ProbeKind {
        match self {
            Prober::RakNet(_) => ProbeKind::RakNet,
            Prober::Tcp(_) => ProbeKind::Tcp,
        }
    }
}

impl Probe for Prober {
    async fn probe(&self) -> ProbeOutcome {
        match self {
            Prober::RakNet(p) => p.probe().await,
            Prober::Tcp(p) => p.probe().await,
        }
    }

    fn target(&self) -> &ProbeTarget {
        match self {
            Prober::RakNet(p) => p.target(),
            Prober::Tcp(p) => p.target(),
        }
    }

    fn deadline(&self) -> Duration {
        match self {
            Prober::RakNet(p) => p.deadline(),
            Prober::Tcp(p) => p.deadline(),
        }
    }
}

/// Sends one unconnected ping and waits for one pong.
#[derive(Debug, Clone)]
pub struct RakNetProber {
    target: ProbeTarget,
    deadline: Duration,
    codec: PingCodec,
}

impl RakNetProber {
    pub fn new(target: ProbeTarget, deadline: Duration) -> Self {
        Self::with_codec(target, deadline, PingCodec::new())
    }

    /// Use a codec with a specific timestamp epoch.
    pub fn with_codec(target: ProbeTarget, deadline: Duration, codec: PingCodec) -> Self {
        Self {
            target,
            deadline,
            codec,
        }
    }

    async fn attempt(&self) -> Result<ProbeOutcome, ProbeError> {
        let addr = resolve(&self.target).await?;

        // Left unconnected: a pong is accepted from whatever address the
        // server answers from.
        let socket = UdpSocket::bind(unspecified_for(&addr)).await?;

        let ping = self.codec.build_probe();
        socket.send_to(&ping, addr).await?;
        debug!(%addr, bytes = ping.len(), "unconnected ping sent");

        let mut buf = [0u8; RECV_BUF_LEN];
        let (len, from) = socket.recv_from(&mut buf).await?;
        debug!(%addr, %from, bytes = len, "reply received");

        Ok(classify_reply(&buf[..len]))
    }
}

impl Probe for RakNetProber {
    async fn probe(&self) -> ProbeOutcome {
        bounded(self.deadline, self.attempt()).await
    }

    fn target(&self) -> &ProbeTarget {
        &self.target
    }

    fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Completes a TCP handshake and closes it immediately.
#[derive(Debug, Clone)]
pub struct TcpProber {
    target: ProbeTarget,
    deadline: Duration,
}

impl TcpProber {
    pub fn new(target: ProbeTarget, deadline: Duration) -> Self {
        Self { target, deadline }
    }

    async fn attempt(&self) -> Result<ProbeOutcome, ProbeError> {
        let addr = resolve(&self.target).await?;
        let stream = TcpStream::connect(addr).await?;
        debug!(%addr, "tcp handshake completed");
        drop(stream);
        Ok(ProbeOutcome::Healthy)
    }
}

impl Probe for TcpProber {
    async fn probe(&self) -> ProbeOutcome {
        bounded(self.deadline, self.attempt()).await
    }

    fn target(&self) -> &ProbeTarget {
        &self.target
    }

    fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Run an attempt under the deadline and fold transport errors into an outcome.
async fn bounded<F>(deadline: Duration, attempt: F) -> ProbeOutcome
where
    F: Future<Output = Result<ProbeOutcome, ProbeError>>,
{
    match tokio::time::timeout(deadline, attempt).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => classify_error(err),
        Err(_) => ProbeOutcome::Unhealthy(UnhealthyReason::Timeout),
    }
}

/// A refused connection means the server is down, which is an expected
/// state rather than a fault of the monitor.
fn classify_error(err: ProbeError) -> ProbeOutcome {
    let refused =
        matches!(&err, ProbeError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused);
    if refused {
        ProbeOutcome::Unhealthy(UnhealthyReason::ConnectionRefused)
    } else {
        ProbeOutcome::Error(err)
    }
}

async fn resolve(target: &ProbeTarget) -> Result<SocketAddr, ProbeError> {
    let mut addrs = tokio::net::lookup_host((target.host.as_str(), target.port))
        .await
        .map_err(|source| ProbeError::Resolve {
            target: target.to_string(),
            source,
        })?;
    addrs
        .next()
        .ok_or_else(|| ProbeError::NoAddress(target.to_string()))
}

fn unspecified_for(addr: &SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{
        MAGIC, MAGIC_OFFSET, NONCE_OFFSET, PING_LEN, TIMESTAMP_OFFSET, UNCONNECTED_PING,
    };
    use std::time::Instant;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Bind a UDP peer that answers the first datagram with `reply` and
    /// hands the received ping back to the test.
    async fn udp_responder(reply: &'static [u8]) -> (ProbeTarget, oneshot::Receiver<Vec<u8>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = [0u8; 1500];
            let (len, from) = socket.recv_from(&mut buf).await.unwrap();
            socket.send_to(reply, from).await.unwrap();
            let _ = tx.send(buf[..len].to_vec());
        });

        (ProbeTarget::new("127.0.0.1", port), rx)
    }

    #[tokio::test]
    async fn raknet_pong_is_healthy() {
        let (target, received) = udp_responder(&[0x1C, 0, 0, 0, 0, 0, 0, 0, 1]).await;
        let epoch = Instant::now().checked_sub(Duration::from_secs(3)).unwrap_or_else(Instant::now);
        let prober =
            RakNetProber::with_codec(target, Duration::from_secs(2), PingCodec::with_epoch(epoch));

        let outcome = prober.probe().await;
        assert!(outcome.is_healthy(), "outcome: {outcome:?}");

        let ping = received.await.unwrap();
        assert_eq!(ping.len(), PING_LEN);
        assert_eq!(ping[0], UNCONNECTED_PING);
        assert_eq!(&ping[MAGIC_OFFSET..NONCE_OFFSET], &MAGIC);

        let mut raw = [0u8; 8];
        raw.copy_from_slice(&ping[TIMESTAMP_OFFSET..MAGIC_OFFSET]);
        assert!(u64::from_le_bytes(raw) <= epoch.elapsed().as_millis() as u64);
    }

    #[tokio::test]
    async fn raknet_pong_from_other_port_is_healthy() {
        // Servers behind NAT or on multi-homed hosts may answer from a
        // different source than the one pinged.
        let listen = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let answer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listen.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 1500];
            let (_, from) = listen.recv_from(&mut buf).await.unwrap();
            answer.send_to(&[0x1C, 0, 0], from).await.unwrap();
        });

        let prober = RakNetProber::new(ProbeTarget::new("127.0.0.1", port), Duration::from_millis(500));
        let outcome = prober.probe().await;
        assert!(outcome.is_healthy(), "outcome: {outcome:?}");
    }

    #[tokio::test]
    async fn raknet_wrong_reply_is_unhealthy() {
        let (target, _received) = udp_responder(&[0x05, 0x1C]).await;
        let prober = RakNetProber::new(target, Duration::from_secs(2));

        let outcome = prober.probe().await;
        assert!(matches!(
            outcome,
            ProbeOutcome::Unhealthy(UnhealthyReason::UnexpectedReply(0x05))
        ));
    }

    #[tokio::test]
    async fn raknet_silent_peer_times_out_after_deadline() {
        // Bound but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let deadline = Duration::from_millis(200);
        let prober = RakNetProber::new(ProbeTarget::new("127.0.0.1", port), deadline);

        let started = Instant::now();
        let outcome = prober.probe().await;
        let elapsed = started.elapsed();

        assert!(matches!(
            outcome,
            ProbeOutcome::Unhealthy(UnhealthyReason::Timeout)
        ));
        assert!(elapsed >= deadline, "returned early: {elapsed:?}");
        assert!(
            elapsed < deadline + Duration::from_millis(500),
            "overran deadline: {elapsed:?}"
        );
        drop(silent);
    }

    #[tokio::test]
    async fn raknet_closed_port_is_unhealthy_not_error() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        drop(socket);

        let prober = RakNetProber::new(ProbeTarget::new("127.0.0.1", port), Duration::from_millis(300));
        let outcome = prober.probe().await;
        assert!(
            matches!(
                outcome,
                ProbeOutcome::Unhealthy(
                    UnhealthyReason::ConnectionRefused | UnhealthyReason::Timeout
                )
            ),
            "outcome: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn tcp_listener_is_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let prober = TcpProber::new(ProbeTarget::new("127.0.0.1", port), Duration::from_secs(2));

        assert!(prober.probe().await.is_healthy());
        drop(listener);
    }

    #[tokio::test]
    async fn tcp_refused_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = TcpProber::new(ProbeTarget::new("127.0.0.1", port), Duration::from_secs(2));
        let outcome = prober.probe().await;
        assert!(
            matches!(
                outcome,
                ProbeOutcome::Unhealthy(UnhealthyReason::ConnectionRefused)
            ),
            "outcome: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn unresolvable_host_is_not_healthy() {
        let prober = Prober::new(
            ProbeKind::Tcp,
            ProbeTarget::new("mcping-test.invalid", 19132),
            Duration::from_secs(2),
        );
        let outcome = prober.probe().await;
        assert!(
            matches!(
                outcome,
                ProbeOutcome::Error(ProbeError::Resolve { .. } | ProbeError::NoAddress(_))
                    | ProbeOutcome::Unhealthy(UnhealthyReason::Timeout)
            ),
            "outcome: {outcome:?}"
        );
    }

    #[test]
    fn refused_io_error_is_expected_down() {
        let refused = ProbeError::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(
            classify_error(refused),
            ProbeOutcome::Unhealthy(UnhealthyReason::ConnectionRefused)
        ));

        let denied = ProbeError::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(classify_error(denied), ProbeOutcome::Error(_)));
    }

    #[test]
    fn prober_selected_by_kind() {
        let target = ProbeTarget::new("127.0.0.1", 19132);
        let raknet = Prober::new(ProbeKind::RakNet, target.clone(), Duration::from_secs(1));
        let tcp = Prober::new(ProbeKind::Tcp, target.clone(), Duration::from_millis(500));

        assert_eq!(raknet.kind(), ProbeKind::RakNet);
        assert_eq!(tcp.kind(), ProbeKind::Tcp);
        assert_eq!(tcp.target(), &target);
        assert_eq!(tcp.deadline(), Duration::from_millis(500));
    }

    #[test]
    fn target_display_brackets_ipv6() {
        assert_eq!(ProbeTarget::new("127.0.0.1", 19132).to_string(), "127.0.0.1:19132");
        assert_eq!(ProbeTarget::new("::1", 19132).to_string(), "[::1]:19132");
        assert_eq!(ProbeTarget::new("mc.local", 25565).to_string(), "mc.local:25565");
    }
}
