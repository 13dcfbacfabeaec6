//! Feed protocol
//!
//! The feed server sends single-message text frames, each a JSON object
//! with a `type` discriminant. Two frame types matter: `init`, which
//! carries the full catalog of sources and chains, and `update`, which
//! carries one height observation for a (source, chain) pair. Anything
//! else decodes to `Frame::Unknown` and is for the receiver to skip.
//!
//! Older servers sent updates with bare scalar ids, `{"id": ...}` objects,
//! or a nested `state` object for the height/hash. Those shapes are
//! normalized here at decode time so nothing past this module has to know
//! they ever existed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type SourceId = String;
pub type ChainId = String;
pub type Height = u64;
pub type BlockHash = String;

/// Catalog entry for one data source, as sent in an `init` frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub id: SourceId,
    pub short_name: String,
    pub full_name: String,
}

/// Catalog entry for one tracked chain, as sent in an `init` frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub id: ChainId,
    pub full_name: String,
    /// Expected interval between blocks. Only used for staleness cutoffs.
    pub block_time_secs: u32,
}

/// One height observation for a (source, chain) pair.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub source: SourceId,
    pub chain: ChainId,
    pub height: Height,
    pub hash: BlockHash,
    /// When the source reported this value, unix seconds.
    pub ts: u64,
}

#[derive(Debug, Clone)]
pub enum Frame {
    /// Full catalog. Resets all receiver state wholesale.
    Init {
        sources: Vec<SourceInfo>,
        chains: Vec<ChainInfo>,
    },
    Update(Update),
    /// A frame with a `type` tag this client does not know about.
    Unknown(String),
}

/// Decode failure. `Unknown` frames are not errors; these are.
#[derive(Debug)]
pub enum Error {
    /// The frame was not valid JSON.
    Json(serde_json::Error),
    /// Valid JSON, but not the shape its `type` tag requires.
    Malformed(&'static str),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitFields {
    sources: Vec<SourceInfo>,
    chains: Vec<ChainInfo>,
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<Frame, Error> {
    let value: Value = serde_json::from_str(text).map_err(Error::Json)?;
    let tag = match value.get("type").and_then(Value::as_str) {
        Some(tag) => tag.to_string(),
        None => return Err(Error::Malformed("missing type tag")),
    };
    match tag.as_str() {
        "init" => {
            let fields: InitFields = serde_json::from_value(value)
                .map_err(|_| Error::Malformed("bad init fields"))?;
            Ok(Frame::Init {
                sources: fields.sources,
                chains: fields.chains,
            })
        }
        "update" => Ok(Frame::Update(decode_update(&value)?)),
        _ => Ok(Frame::Unknown(tag)),
    }
}

/// An id in a legacy update can be a bare string, a bare number, or a
/// `{"id": ...}` object.
fn id_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => match map.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn decode_update(value: &Value) -> Result<Update, Error> {
    let source =
        id_field(value.get("source").ok_or(Error::Malformed("missing source"))?)
            .ok_or(Error::Malformed("bad source id"))?;
    let chain = id_field(value.get("chain").ok_or(Error::Malformed("missing chain"))?)
        .ok_or(Error::Malformed("bad chain id"))?;

    // Legacy updates nest height/hash under a "state" object.
    let state = value.get("state").unwrap_or(value);
    let height = state
        .get("height")
        .and_then(Value::as_u64)
        .ok_or(Error::Malformed("missing height"))?;
    let hash = state
        .get("hash")
        .and_then(Value::as_str)
        .ok_or(Error::Malformed("missing hash"))?
        .to_string();

    // Legacy updates carried the server-side firstSeenTs instead of ts.
    let ts = value
        .get("ts")
        .or_else(|| value.get("firstSeenTs"))
        .and_then(Value::as_u64)
        .ok_or(Error::Malformed("missing ts"))?;

    Ok(Update {
        source,
        chain,
        height,
        hash,
        ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_init() {
        let text = r#"{"type":"init",
            "sources":[{"id":"bkc","shortName":"BkC","fullName":"Blockchair"}],
            "chains":[{"id":"btc","fullName":"Bitcoin","blockTimeSecs":600}]}"#;
        match decode(text).unwrap() {
            Frame::Init { sources, chains } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].id, "bkc");
                assert_eq!(sources[0].short_name, "BkC");
                assert_eq!(chains[0].block_time_secs, 600);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn decode_flat_update() {
        let text = r#"{"type":"update","source":"bkc","chain":"btc",
            "height":800000,"hash":"00ab","ts":1700000000}"#;
        match decode(text).unwrap() {
            Frame::Update(u) => {
                assert_eq!(u.source, "bkc");
                assert_eq!(u.chain, "btc");
                assert_eq!(u.height, 800000);
                assert_eq!(u.hash, "00ab");
                assert_eq!(u.ts, 1700000000);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn decode_legacy_shapes() {
        // Object ids plus nested state, with the old firstSeenTs field.
        let text = r#"{"type":"update",
            "source":{"id":"bkc","fullName":"Blockchair"},
            "chain":{"id":"btc"},
            "state":{"height":1,"hash":"aa"},
            "firstSeenTs":123}"#;
        match decode(text).unwrap() {
            Frame::Update(u) => {
                assert_eq!((u.source.as_str(), u.chain.as_str()), ("bkc", "btc"));
                assert_eq!((u.height, u.hash.as_str(), u.ts), (1, "aa", 123));
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        // Bare numeric ids.
        let text = r#"{"type":"update","source":3,"chain":7,"height":2,"hash":"bb","ts":5}"#;
        match decode(text).unwrap() {
            Frame::Update(u) => assert_eq!((u.source.as_str(), u.chain.as_str()), ("3", "7")),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_is_not_an_error() {
        match decode(r#"{"type":"ping","whatever":1}"#).unwrap() {
            Frame::Unknown(tag) => assert_eq!(tag, "ping"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn malformed_frames() {
        assert!(matches!(decode("not json"), Err(Error::Json(_))));
        assert!(matches!(
            decode(r#"{"notype":true}"#),
            Err(Error::Malformed(_))
        ));
        assert!(matches!(
            decode(r#"{"type":"update","source":"a","chain":"b","hash":"x","ts":1}"#),
            Err(Error::Malformed("missing height"))
        ));
        assert!(matches!(
            decode(r#"{"type":"update","source":[],"chain":"b","height":1,"hash":"x","ts":1}"#),
            Err(Error::Malformed("bad source id"))
        ));
    }
}
