//! SNTP client (RFC 4330) over a tokio UDP socket

use std::io;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, warn};

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// SNTP port (UDP 123)
pub const SNTP_PORT: u16 = 123;

const NTP_PACKET_LEN: usize = 48;

/// LI=0, VN=3, Mode=3 (client)
const CLIENT_REQUEST_HEADER: u8 = 0x1B;

/// Upper bound for the RTT/2 correction
const MAX_RTT_CORRECTION: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SntpError {
    #[error("failed to resolve {server}: {source}")]
    Resolve {
        server: String,
        #[source]
        source: io::Error,
    },

    #[error("{server} did not resolve to any address")]
    NoAddress { server: String },

    #[error("network error: {0}")]
    Io(#[from] io::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("invalid NTP response: {0}")]
    InvalidResponse(&'static str),

    #[error("server stratum {stratum} not accepted (max {max})")]
    InvalidStratum { stratum: u8, max: u8 },
}

/// Fields of interest from a server reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpReply {
    pub stratum: u8,
    /// Server transmit time as seconds since the Unix epoch
    pub unix_secs: u64,
    pub micros: u32,
}

impl NtpReply {
    pub fn to_utc(self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.unix_secs).ok()?;
        DateTime::from_timestamp(secs, self.micros * 1_000)
    }
}

#[derive(Debug, Clone)]
pub struct SntpClient {
    timeout: Duration,
    max_stratum: u8,
}

impl Default for SntpClient {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_stratum: 3,
        }
    }
}

impl SntpClient {
    pub fn new(timeout: Duration, max_stratum: u8) -> Self {
        Self {
            timeout,
            max_stratum,
        }
    }

    /// Query `server` (host name or `host:port`) for the current UTC time
    pub async fn query(&self, server: &str) -> Result<DateTime<Utc>, SntpError> {
        let target = if server.contains(':') {
            server.to_string()
        } else {
            format!("{server}:{SNTP_PORT}")
        };

        let addr = lookup_host(target.as_str())
            .await
            .map_err(|source| SntpError::Resolve {
                server: server.to_string(),
                source,
            })?
            .find(|addr| addr.is_ipv4())
            .ok_or_else(|| SntpError::NoAddress {
                server: server.to_string(),
            })?;
        debug!(server, %addr, "Resolved time server");

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;

        let request = build_request();
        let sent_at = Instant::now();
        socket.send(&request).await?;

        let mut response = [0u8; 64];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut response))
            .await
            .map_err(|_| SntpError::Timeout(self.timeout))??;
        let rtt = sent_at.elapsed();

        let reply = parse_response(&response[..len])?;
        if reply.stratum == 0 || reply.stratum > self.max_stratum {
            warn!(server, stratum = reply.stratum, "Rejecting time server stratum");
            return Err(SntpError::InvalidStratum {
                stratum: reply.stratum,
                max: self.max_stratum,
            });
        }

        let server_time = reply
            .to_utc()
            .ok_or(SntpError::InvalidResponse("transmit timestamp out of range"))?;
        let correction = (rtt / 2).min(MAX_RTT_CORRECTION);
        let corrected = server_time
            + TimeDelta::from_std(correction).unwrap_or_else(|_| TimeDelta::zero());

        debug!(
            server,
            stratum = reply.stratum,
            rtt_ms = rtt.as_millis() as u64,
            "SNTP reply accepted"
        );
        Ok(corrected)
    }
}

pub fn build_request() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = CLIENT_REQUEST_HEADER;
    packet
}

/// Decode stratum and transmit timestamp (bytes 40..48) from a reply
pub fn parse_response(packet: &[u8]) -> Result<NtpReply, SntpError> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(SntpError::InvalidResponse("short packet"));
    }

    let mode = packet[0] & 0x07;
    // 4 = server, 5 = broadcast
    if mode != 4 && mode != 5 {
        return Err(SntpError::InvalidResponse("not a server reply"));
    }

    let secs = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]) as u64;
    let frac = u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]) as u64;
    if secs == 0 && frac == 0 {
        return Err(SntpError::InvalidResponse("zero transmit timestamp"));
    }

    let unix_secs = secs
        .checked_sub(NTP_UNIX_OFFSET)
        .ok_or(SntpError::InvalidResponse("transmit timestamp before 1970"))?;
    let micros = ((frac * 1_000_000) >> 32) as u32;

    Ok(NtpReply {
        stratum: packet[1],
        unix_secs,
        micros,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(stratum: u8, ntp_secs: u32, frac: u32) -> [u8; 48] {
        let mut packet = [0u8; 48];
        packet[0] = 0x24; // LI=0, VN=4, Mode=4
        packet[1] = stratum;
        packet[40..44].copy_from_slice(&ntp_secs.to_be_bytes());
        packet[44..48].copy_from_slice(&frac.to_be_bytes());
        packet
    }

    #[test]
    fn test_build_request() {
        let request = build_request();
        assert_eq!(request.len(), 48);
        assert_eq!(request[0], 0x1B);
        assert!(request[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_transmit_timestamp() {
        // 2024-03-05T14:30:07Z = 1709649007 unix
        let ntp_secs = (1_709_649_007u64 + NTP_UNIX_OFFSET) as u32;
        let parsed = parse_response(&reply(2, ntp_secs, 0x8000_0000)).unwrap();

        assert_eq!(parsed.stratum, 2);
        assert_eq!(parsed.unix_secs, 1_709_649_007);
        assert_eq!(parsed.micros, 500_000);
        assert_eq!(
            parsed.to_utc().unwrap().to_rfc3339(),
            "2024-03-05T14:30:07.500+00:00"
        );
    }

    #[test]
    fn test_rejects_short_packet() {
        let result = parse_response(&[0x24; 20]);
        assert!(matches!(result, Err(SntpError::InvalidResponse(_))));
    }

    #[test]
    fn test_rejects_client_mode_echo() {
        let mut packet = reply(2, 3_900_000_000, 0);
        packet[0] = 0x1B;
        assert!(matches!(
            parse_response(&packet),
            Err(SntpError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timestamp() {
        assert!(matches!(
            parse_response(&reply(1, 0, 0)),
            Err(SntpError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_query_against_local_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 48];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            let ntp_secs = (1_709_649_007u64 + NTP_UNIX_OFFSET) as u32;
            server.send_to(&reply(1, ntp_secs, 0), peer).await.unwrap();
        });

        let client = SntpClient::new(Duration::from_secs(2), 3);
        let time = client.query(&addr.to_string()).await.unwrap();
        assert_eq!(time.timestamp(), 1_709_649_007);
    }

    #[tokio::test]
    async fn test_query_rejects_high_stratum() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 48];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&reply(9, 3_900_000_000, 0), peer).await.unwrap();
        });

        let client = SntpClient::new(Duration::from_secs(2), 3);
        let result = client.query(&addr.to_string()).await;
        assert!(matches!(
            result,
            Err(SntpError::InvalidStratum { stratum: 9, max: 3 })
        ));
    }

    #[tokio::test]
    async fn test_query_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let client = SntpClient::new(Duration::from_millis(50), 3);
        let result = client.query(&addr.to_string()).await;
        assert!(matches!(result, Err(SntpError::Timeout(_))));
        drop(server);
    }
}
