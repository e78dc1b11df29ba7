use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Error, Result, anyhow};

use crate::bencoding::Value;

#[derive(Debug, PartialEq)]
pub struct TrackerResponse {
    pub complete: usize,
    pub incomplete: usize,
    pub interval: Duration,
    pub peers: Vec<Peer>,
}

impl TrackerResponse {
    pub fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.peers
            .iter()
            .map(|peer| SocketAddr::new(peer.ip, peer.port))
            .collect()
    }
}

impl TryFrom<Value> for TrackerResponse {
    type Error = Error;

    fn try_from(mut value: Value) -> Result<Self> {
        if let Some(reason) = value.try_remove_entry("failure reason")? {
            let reason: String = reason.try_into()?;
            return Err(anyhow!("tracker returned failure: {}", reason));
        }
        let complete = match value.try_remove_entry("complete")? {
            Some(complete) => complete.try_into()?,
            None => 0,
        };
        let incomplete = match value.try_remove_entry("incomplete")? {
            Some(incomplete) => incomplete.try_into()?,
            None => 0,
        };
        let interval = value.remove_entry("interval")?.try_into()?;
        let peers = match value.remove_entry("peers")? {
            // Compact model: 6 bytes per peer, 4 for the IPv4 address and 2
            // for the port, both in network byte order
            Value::String(bytes) => {
                if bytes.len() % 6 != 0 {
                    return Err(anyhow!(
                        "compact peer list length {} is not a multiple of 6",
                        bytes.len()
                    ));
                }
                bytes.chunks(6).map(Peer::from_compact).collect()
            }
            // Dictionary model: a list of {peer id, ip, port} dictionaries
            Value::List(values) => {
                let mut result = Vec::with_capacity(values.len());
                for peer in values {
                    result.push(Peer::try_from(peer)?);
                }
                result
            }
            other => return Err(anyhow!("unsupported peers value: {:?}", other)),
        };
        Ok(TrackerResponse {
            complete,
            incomplete,
            interval,
            peers,
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct Peer {
    pub peer_id: Option<Vec<u8>>,
    pub ip: IpAddr,
    pub port: u16,
}

impl Peer {
    fn from_compact(bytes: &[u8]) -> Self {
        let ip = IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]));
        let port = u16::from_be_bytes([bytes[4], bytes[5]]);
        Self {
            peer_id: None,
            ip,
            port,
        }
    }
}

impl TryFrom<Value> for Peer {
    type Error = Error;

    fn try_from(mut value: Value) -> Result<Self> {
        let peer_id = match value.try_remove_entry("peer id") {
            Ok(Some(peer_id)) => Some(peer_id.try_into()?),
            _ => None,
        };
        let port = value.remove_entry("port")?.try_into()?;
        let ip: String = value.remove_entry("ip")?.try_into()?;
        let ip = ip.parse()?;
        Ok(Peer { peer_id, ip, port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_tracker_response() {
        let peer_id = "-TR3000-47qm0ov7eav4";
        let body = Value::dictionary()
            .with_entry("complete", Value::Integer(12))
            .with_entry("incomplete", Value::Integer(34))
            .with_entry("interval", Value::Integer(1800))
            .with_entry(
                "peers",
                Value::list().with_value(
                    Value::dictionary()
                        .with_entry("ip", Value::string("12.34.56.78"))
                        .with_entry("peer id", Value::string(peer_id))
                        .with_entry("port", Value::Integer(51413)),
                ),
            );

        let response = TrackerResponse::try_from(body).expect("invalid response body");

        assert_eq!(
            response,
            TrackerResponse {
                complete: 12,
                incomplete: 34,
                interval: Duration::from_secs(1800),
                peers: vec![Peer {
                    peer_id: Some(peer_id.as_bytes().to_vec()),
                    ip: IpAddr::V4(Ipv4Addr::new(12, 34, 56, 78)),
                    port: 51413
                }]
            }
        );
    }

    #[test]
    fn support_peer_ip_v6() {
        let body = Value::dictionary()
            .with_entry("interval", Value::Integer(1800))
            .with_entry(
                "peers",
                Value::list().with_value(
                    Value::dictionary()
                        .with_entry("ip", Value::string("2600:1702:6aa3:b210::72"))
                        .with_entry("port", Value::Integer(51413)),
                ),
            );

        let response = TrackerResponse::try_from(body).expect("invalid response body");

        assert_eq!(
            response.peers[0].ip,
            IpAddr::V6("2600:1702:6aa3:b210::72".parse().unwrap())
        );
    }

    #[test]
    fn compact_peer_list() {
        let peers = vec![12, 34, 56, 78, 0xC8, 0xD5, 127, 0, 0, 1, 0x1A, 0xE1];
        let body = Value::dictionary()
            .with_entry("interval", Value::Integer(900))
            .with_entry("peers", Value::String(peers));

        let response = TrackerResponse::try_from(body).expect("invalid response body");

        assert_eq!(
            response.peer_addrs(),
            vec![
                "12.34.56.78:51413".parse().unwrap(),
                "127.0.0.1:6881".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn reject_truncated_compact_peer_list() {
        let body = Value::dictionary()
            .with_entry("interval", Value::Integer(900))
            .with_entry("peers", Value::String(vec![12, 34, 56, 78, 0xC8]));

        assert!(TrackerResponse::try_from(body).is_err());
    }

    #[test]
    fn failure_reason_is_an_error() {
        let body = Value::dictionary()
            .with_entry("failure reason", Value::string("unregistered torrent"));

        let result = TrackerResponse::try_from(body);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unregistered"));
    }
}
