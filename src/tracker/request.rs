use size::Size;
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::core::PeerId;
use crate::crypto::Sha1;

#[derive(Debug)]
pub struct TrackerRequest {
    pub announce: Url,
    pub info_hash: Sha1,
    pub peer_id: PeerId,
    /// The port number that the client is listening on. Ports reserved for BitTorrent are
    /// typically 6881-6889.
    pub port: u16,
    /// The total amount uploaded since the client sent the 'started' event to the tracker.
    pub uploaded: Size,
    /// The total amount downloaded since the client sent the 'started' event to the tracker.
    pub downloaded: Size,
    /// The number of bytes needed to download to be 100% complete.
    pub left: Size,
    pub event: Option<AnnounceEvent>,
}

impl From<TrackerRequest> for Url {
    fn from(value: TrackerRequest) -> Self {
        let mut url = value.announce;
        let mut query = format!(
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
            url_encode(&value.info_hash.0),
            url_encode(&value.peer_id.0),
            value.port,
            value.uploaded.bytes(),
            value.downloaded.bytes(),
            value.left.bytes(),
        );
        if let Some(event) = &value.event {
            query.push_str("&event=");
            query.push_str(event.into());
        }
        url.set_query(Some(&query));
        url
    }
}

fn url_encode(bytes: &[u8]) -> String {
    String::from_iter(byte_serialize(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    /// The first request to the tracker must include the event key with this value.
    Started,
    /// Must be sent to the tracker if the client is shutting down gracefully.
    Stopped,
    /// Must be sent to the tracker when the download completes. However, must not be sent if the
    /// download was already 100% complete when the client started.
    Completed,
}

impl From<&AnnounceEvent> for &str {
    fn from(value: &AnnounceEvent) -> Self {
        match value {
            AnnounceEvent::Started => "started",
            AnnounceEvent::Stopped => "stopped",
            AnnounceEvent::Completed => "completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_announce_url() {
        let request = TrackerRequest {
            announce: Url::parse("http://tracker.example.com/announce").unwrap(),
            info_hash: Sha1([0x01; 20]),
            peer_id: PeerId([b'x'; 20]),
            port: 6881,
            uploaded: Size::from_bytes(10),
            downloaded: Size::from_bytes(20),
            left: Size::from_bytes(30),
            event: Some(AnnounceEvent::Started),
        };

        let url = Url::from(request);
        let query = url.query().unwrap();

        assert!(query.contains(
            "info_hash=%01%01%01%01%01%01%01%01%01%01%01%01%01%01%01%01%01%01%01%01"
        ));
        assert!(query.contains("peer_id=xxxxxxxxxxxxxxxxxxxx"));
        assert!(query.contains("port=6881"));
        assert!(query.contains("uploaded=10"));
        assert!(query.contains("downloaded=20"));
        assert!(query.contains("left=30"));
        assert!(query.contains("compact=1"));
        assert!(query.contains("event=started"));
    }

    #[test]
    fn event_is_omitted_for_periodic_announces() {
        let request = TrackerRequest {
            announce: Url::parse("http://tracker.example.com/announce").unwrap(),
            info_hash: Sha1([0x01; 20]),
            peer_id: PeerId([b'x'; 20]),
            port: 6881,
            uploaded: Size::from_bytes(0),
            downloaded: Size::from_bytes(0),
            left: Size::from_bytes(0),
            event: None,
        };

        let url = Url::from(request);

        assert!(!url.query().unwrap().contains("event="));
    }
}
