//! The emulated client itself: a parsed fingerprint file plus the template
//! expansion that turns announce bookkeeping into a wire-level query string.
use std::net::IpAddr;

use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_primitives::info_hash::InfoHash;
use serde::Deserialize;

use crate::encoder::{HexCase, UrlEncoder};
use crate::generator::{Alphabet, KeyGenerator, PeerIdGenerator, RefreshPolicy};
use crate::Error;

/// One HTTP header sent with every announce.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Everything the core knows about one announce, ready for template
/// expansion.
#[derive(Debug, Clone)]
pub struct AnnounceQuery {
    pub info_hash: InfoHash,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub event: AnnounceEvent,
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ClientFileModel {
    peer_id_generator: PeerIdGeneratorModel,
    key_generator: Option<KeyGeneratorModel>,
    url_encoder: UrlEncoderModel,
    query: String,
    numwant: u32,
    numwant_on_stop: u32,
    request_headers: Vec<Header>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PeerIdGeneratorModel {
    prefix: String,
    #[serde(default)]
    alphabet: Alphabet,
    #[serde(default)]
    refresh_on: RefreshPolicy,
    #[serde(default)]
    should_url_encode: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct KeyGeneratorModel {
    length: usize,
    #[serde(default)]
    case: HexCase,
    #[serde(default)]
    refresh_on: RefreshPolicy,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UrlEncoderModel {
    encoding_exclusion_pattern: String,
    #[serde(default)]
    encoded_hex_case: HexCase,
}

/// A loaded client fingerprint.
#[derive(Debug)]
pub struct EmulatedClient {
    query_template: String,
    headers: Vec<Header>,
    numwant: u32,
    numwant_on_stop: u32,
    peer_id_generator: PeerIdGenerator,
    peer_id_url_encoded: bool,
    key_generator: Option<KeyGenerator>,
    url_encoder: UrlEncoder,
}

impl EmulatedClient {
    /// Parses a fingerprint from the JSON contents of a `.client` file.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] when the JSON is malformed or a generator
    /// setting is invalid.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let model: ClientFileModel = serde_json::from_str(json).map_err(|source| Error::InvalidClientFile { source })?;

        let url_encoder = UrlEncoder::new(&model.url_encoder.encoding_exclusion_pattern, model.url_encoder.encoded_hex_case)?;

        let peer_id_generator = PeerIdGenerator::new(
            &model.peer_id_generator.prefix,
            model.peer_id_generator.alphabet,
            model.peer_id_generator.refresh_on,
        )?;

        let key_generator = model
            .key_generator
            .map(|key| KeyGenerator::new(key.length, key.case, key.refresh_on));

        Ok(Self {
            query_template: model.query,
            headers: model.request_headers,
            numwant: model.numwant,
            numwant_on_stop: model.numwant_on_stop,
            peer_id_generator,
            peer_id_url_encoded: model.peer_id_generator.should_url_encode,
            key_generator,
            url_encoder,
        })
    }

    /// Expands the client's query template for one announce.
    #[must_use]
    pub fn announce_query(&self, announce: &AnnounceQuery) -> String {
        let mut query = self.query_template.clone();

        if announce.event.wire_value().is_none() {
            query = strip_param(&query, "event={event}");
        }
        if self.key_generator.is_none() {
            query = strip_param(&query, "key={key}");
        }

        let peer_id = self.peer_id_generator.peer_id_for(&announce.info_hash);
        let peer_id = if self.peer_id_url_encoded {
            self.url_encoder.encode(peer_id.as_bytes())
        } else {
            peer_id
        };

        let numwant = match announce.event {
            AnnounceEvent::Stopped => self.numwant_on_stop,
            _ => self.numwant,
        };

        query = query.replace("{infohash}", &self.url_encoder.encode(announce.info_hash.as_bytes()));
        query = query.replace("{peerid}", &peer_id);
        query = query.replace("{uploaded}", &announce.uploaded.to_string());
        query = query.replace("{downloaded}", &announce.downloaded.to_string());
        query = query.replace("{left}", &announce.left.to_string());
        query = query.replace("{port}", &announce.port.to_string());
        query = query.replace("{ip}", &announce.ip.to_string());
        query = query.replace("{numwant}", &numwant.to_string());

        if let Some(value) = announce.event.wire_value() {
            query = query.replace("{event}", value);
        }
        if let Some(key_generator) = &self.key_generator {
            query = query.replace("{key}", &key_generator.key_for(&announce.info_hash));
        }

        query
    }

    /// The headers to attach to every announce request.
    #[must_use]
    pub fn request_headers(&self) -> &[Header] {
        &self.headers
    }

    /// The User-Agent header value, when the fingerprint carries one.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case("user-agent"))
            .map(|header| header.value.as_str())
    }
}

fn strip_param(query: &str, param: &str) -> String {
    query
        .split('&')
        .filter(|pair| *pair != param)
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use ghostseed_primitives::announce_event::AnnounceEvent;
    use ghostseed_primitives::info_hash::InfoHash;

    use super::{AnnounceQuery, EmulatedClient};

    pub(crate) const SAMPLE_CLIENT_FILE: &str = r#"{
        "peerIdGenerator": { "prefix": "-qB4650-", "alphabet": "alphanumeric", "refreshOn": "NEVER" },
        "keyGenerator": { "length": 8, "case": "lower", "refreshOn": "TORRENT_VOLATILE" },
        "urlEncoder": { "encodingExclusionPattern": "[A-Za-z0-9-]", "encodedHexCase": "lower" },
        "query": "info_hash={infohash}&peer_id={peerid}&port={port}&uploaded={uploaded}&downloaded={downloaded}&left={left}&corrupt=0&key={key}&event={event}&numwant={numwant}&compact=1&no_peer_id=1",
        "numwant": 200,
        "numwantOnStop": 0,
        "requestHeaders": [
            { "name": "User-Agent", "value": "qBittorrent/4.6.5" },
            { "name": "Accept-Encoding", "value": "gzip" },
            { "name": "Connection", "value": "close" }
        ]
    }"#;

    fn sample_client() -> EmulatedClient {
        EmulatedClient::from_json(SAMPLE_CLIENT_FILE).expect("the sample client file should parse")
    }

    fn sample_announce(event: AnnounceEvent) -> AnnounceQuery {
        AnnounceQuery {
            info_hash: InfoHash::new([0xffu8; 20]),
            uploaded: 1024,
            downloaded: 0,
            left: 0,
            event,
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 50_000,
        }
    }

    #[test]
    fn it_should_expand_every_placeholder_in_the_template() {
        let query = sample_client().announce_query(&sample_announce(AnnounceEvent::Started));

        assert!(query.contains(&format!("info_hash={}", "%ff".repeat(20))));
        assert!(query.contains("port=50000"));
        assert!(query.contains("uploaded=1024"));
        assert!(query.contains("downloaded=0"));
        assert!(query.contains("left=0"));
        assert!(query.contains("event=started"));
        assert!(query.contains("numwant=200"));
        assert!(!query.contains('{'));
    }

    #[test]
    fn it_should_drop_the_event_parameter_on_regular_reannounces() {
        let query = sample_client().announce_query(&sample_announce(AnnounceEvent::None));

        assert!(!query.contains("event="));
        assert!(query.contains("corrupt=0&key="));
    }

    #[test]
    fn it_should_use_numwant_on_stop_for_stop_announces() {
        let query = sample_client().announce_query(&sample_announce(AnnounceEvent::Stopped));

        assert!(query.contains("numwant=0"));
        assert!(query.contains("event=stopped"));
    }

    #[test]
    fn it_should_keep_the_same_key_for_the_same_torrent() {
        let client = sample_client();

        let first = client.announce_query(&sample_announce(AnnounceEvent::Started));
        let second = client.announce_query(&sample_announce(AnnounceEvent::None));

        let key_of = |query: &str| {
            query
                .split('&')
                .find(|pair| pair.starts_with("key="))
                .map(ToString::to_string)
        };

        assert_eq!(key_of(&first), key_of(&second));
    }

    #[test]
    fn it_should_expose_the_user_agent_header() {
        assert_eq!(sample_client().user_agent(), Some("qBittorrent/4.6.5"));
    }

    #[test]
    fn it_should_drop_the_key_parameter_when_the_client_has_no_key_generator() {
        let json = SAMPLE_CLIENT_FILE.replace(
            r#""keyGenerator": { "length": 8, "case": "lower", "refreshOn": "TORRENT_VOLATILE" },"#,
            "",
        );
        let client = EmulatedClient::from_json(&json).unwrap();

        let query = client.announce_query(&sample_announce(AnnounceEvent::Started));

        assert!(!query.contains("key="));
    }
}
