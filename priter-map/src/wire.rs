//! Encodes/decodes `(key, value)` pairs to and from `KV` record streams —
//! the shape both the PKVBUF (reduce -> map activations) and STREAM
//! (map -> reduce deltas) payloads carry on the wire (spec.md 3, 4.2).
//! Mirrors `priter-reduce`'s wire module; kept as its own copy here so
//! `priter-map` does not depend on `priter-reduce` (the two sides of the
//! transport only share the transport and codec crates, spec.md 2
//! dependency order).

use priter_codec::{Record, RecordKind, RecordReader, RecordWriter};
use priter_core::{PriterErrorKind, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes `pairs` as a `KV` record stream.
pub fn encode_kv_batch<K: Serialize, V: Serialize>(pairs: &[(K, V)]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = RecordWriter::new(&mut buf, RecordKind::Kv);
    for (key, value) in pairs {
        let key_bytes = serde_json::to_vec(key).map_err(|_| PriterErrorKind::Codec)?;
        let value_bytes = serde_json::to_vec(value).map_err(|_| PriterErrorKind::Codec)?;
        writer
            .append_kv(&key_bytes, &value_bytes)
            .map_err(|_| PriterErrorKind::Codec)?;
    }
    writer.close().map_err(|_| PriterErrorKind::Codec)?;
    Ok(buf)
}

/// Decodes a `KV` record stream back into `(key, value)` pairs.
pub fn decode_kv_batch<K: DeserializeOwned, V: DeserializeOwned>(
    payload: &[u8],
) -> Result<Vec<(K, V)>> {
    let mut reader = RecordReader::new(payload, RecordKind::Kv);
    let mut out = Vec::new();
    loop {
        let record = reader.next().map_err(|_| PriterErrorKind::Codec)?;
        match record {
            None => break,
            Some(Record::Kv { key, value }) => {
                let key: K = serde_json::from_slice(&key).map_err(|_| PriterErrorKind::Codec)?;
                let value: V =
                    serde_json::from_slice(&value).map_err(|_| PriterErrorKind::Codec)?;
                out.push((key, value));
            }
            Some(_) => unreachable!("reader is fixed to RecordKind::Kv"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_kv_pairs() {
        let pairs = vec![(1u32, 0.5f64), (2u32, 1.5f64)];
        let encoded = encode_kv_batch(&pairs).unwrap();
        let decoded: Vec<(u32, f64)> = decode_kv_batch(&encoded).unwrap();
        assert_eq!(decoded, pairs);
    }

    #[test]
    fn empty_batch_round_trips() {
        let pairs: Vec<(u32, f64)> = Vec::new();
        let encoded = encode_kv_batch(&pairs).unwrap();
        let decoded: Vec<(u32, f64)> = decode_kv_batch(&encoded).unwrap();
        assert!(decoded.is_empty());
    }
}
