//! # Reply Vocabulary
//!
//! Purpose: Name every reply shape the command surface needs as a pure
//! `RespValue -> T` mapper, so each command is one builder call plus one of
//! these functions.
//!
//! ## Rules
//! - Null bulk and null array map to `None`, never to `""` or `[]`.
//! - A tag the shape does not allow is `ClientError::UnexpectedReply`;
//!   nothing is coerced silently.
//! - `bytes` / `optional_bytes` are the binary-safe decode mode; every
//!   `text` mapper decodes UTF-8.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use respool_proto::RespValue;

use crate::error::{ClientError, ClientResult};
use crate::role::Role;
use crate::scan::ScanCursor;

/// Passes the reply through untouched.
pub fn raw(reply: RespValue) -> ClientResult<RespValue> {
    Ok(reply)
}

/// `+STATUS` → text.
pub fn status(reply: RespValue) -> ClientResult<String> {
    match reply {
        RespValue::Simple(text) => Ok(text),
        other => Err(ClientError::unexpected("simple string", other.kind())),
    }
}

/// `+OK` (or any status) → `()`.
pub fn ok(reply: RespValue) -> ClientResult<()> {
    status(reply).map(|_| ())
}

/// `:n` → `i64`.
pub fn integer(reply: RespValue) -> ClientResult<i64> {
    match reply {
        RespValue::Integer(value) => Ok(value),
        other => Err(ClientError::unexpected("integer", other.kind())),
    }
}

/// `:1` / `:0` → `bool`.
pub fn boolean(reply: RespValue) -> ClientResult<bool> {
    match integer(reply)? {
        1 => Ok(true),
        0 => Ok(false),
        value => Err(ClientError::unexpected("0 or 1", &value.to_string())),
    }
}

/// `:n` or `$-1` → `Option<i64>`.
pub fn optional_integer(reply: RespValue) -> ClientResult<Option<i64>> {
    match reply {
        RespValue::Integer(value) => Ok(Some(value)),
        RespValue::Bulk(None) => Ok(None),
        other => Err(ClientError::unexpected("integer or null", other.kind())),
    }
}

/// Non-null bulk or status → text.
pub fn text(reply: RespValue) -> ClientResult<String> {
    match reply {
        RespValue::Bulk(Some(data)) => utf8(data),
        RespValue::Simple(text) => Ok(text),
        other => Err(ClientError::unexpected("bulk string", other.kind())),
    }
}

/// Bulk → optional text.
pub fn optional_text(reply: RespValue) -> ClientResult<Option<String>> {
    match reply {
        RespValue::Bulk(Some(data)) => utf8(data).map(Some),
        RespValue::Bulk(None) => Ok(None),
        other => Err(ClientError::unexpected("bulk string", other.kind())),
    }
}

/// Non-null bulk → raw bytes.
pub fn bytes(reply: RespValue) -> ClientResult<Bytes> {
    match reply {
        RespValue::Bulk(Some(data)) => Ok(data),
        other => Err(ClientError::unexpected("bulk string", other.kind())),
    }
}

/// Bulk → optional raw bytes.
pub fn optional_bytes(reply: RespValue) -> ClientResult<Option<Bytes>> {
    match reply {
        RespValue::Bulk(data) => Ok(data),
        other => Err(ClientError::unexpected("bulk string", other.kind())),
    }
}

/// Bulk decimal → `f64`.
pub fn float(reply: RespValue) -> ClientResult<f64> {
    parse_float(&text(reply)?)
}

/// Bulk decimal or null → `Option<f64>`.
pub fn optional_float(reply: RespValue) -> ClientResult<Option<f64>> {
    optional_text(reply)?.map(|text| parse_float(&text)).transpose()
}

/// Array of non-null bulks → text list.
pub fn text_array(reply: RespValue) -> ClientResult<Vec<String>> {
    items(reply)?.into_iter().map(element_text).collect()
}

/// Array of bulks, nulls kept → optional text list.
pub fn optional_text_array(reply: RespValue) -> ClientResult<Vec<Option<String>>> {
    items(reply)?.into_iter().map(optional_text).collect()
}

/// Array of `:1`/`:0` → bool list.
pub fn boolean_array(reply: RespValue) -> ClientResult<Vec<bool>> {
    items(reply)?.into_iter().map(boolean).collect()
}

/// Flat `k1 v1 k2 v2 ...` array → ordered pairs.
pub fn text_pairs(reply: RespValue) -> ClientResult<Vec<(String, String)>> {
    pairs(items(reply)?, element_text, element_text)
}

/// Flat pairs whose values may be null (e.g. unset config parameters).
pub fn optional_text_pairs(reply: RespValue) -> ClientResult<Vec<(String, Option<String>)>> {
    pairs(items(reply)?, element_text, optional_text)
}

/// Flat `member score ...` array → `(member, score)` pairs.
pub fn scored_members(reply: RespValue) -> ClientResult<Vec<(String, f64)>> {
    pairs(items(reply)?, element_text, float)
}

/// `[key, value]` or null array (blocking pop timeout) → optional pair.
pub fn keyed_text(reply: RespValue) -> ClientResult<Option<(String, String)>> {
    match reply {
        RespValue::Array(None) => Ok(None),
        RespValue::Array(Some(items)) if items.len() == 2 => {
            let mut pair = pairs(items, element_text, element_text)?;
            Ok(pair.pop())
        }
        RespValue::Array(Some(items)) => Err(ClientError::unexpected(
            "two-element array",
            &format!("array of {}", items.len()),
        )),
        other => Err(ClientError::unexpected("array", other.kind())),
    }
}

/// `:seconds` since the epoch → `SystemTime`.
pub fn unix_time(reply: RespValue) -> ClientResult<SystemTime> {
    let seconds = integer(reply)?;
    let seconds = u64::try_from(seconds)
        .map_err(|_| ClientError::unexpected("non-negative timestamp", &seconds.to_string()))?;
    Ok(UNIX_EPOCH + Duration::from_secs(seconds))
}

/// `[seconds, microseconds]` → `SystemTime`.
pub fn server_time(reply: RespValue) -> ClientResult<SystemTime> {
    let [seconds, micros] = <[RespValue; 2]>::try_from(items(reply)?).map_err(|parts| {
        ClientError::unexpected("two-element array", &format!("array of {}", parts.len()))
    })?;
    let seconds = element_u64(seconds)?;
    let micros = element_u64(micros)?;
    Ok(UNIX_EPOCH + Duration::from_secs(seconds) + Duration::from_micros(micros))
}

/// Replication role, discriminated by the first element.
pub fn role(reply: RespValue) -> ClientResult<Role> {
    Role::from_reply(reply)
}

/// `[cursor, [key ...]]` → one page of keys.
pub fn scan_keys(reply: RespValue) -> ClientResult<ScanCursor<String>> {
    ScanCursor::from_reply(reply, |items| items.into_iter().map(element_text).collect())
}

/// `[cursor, [field value ...]]` → one page of pairs.
pub fn scan_pairs(reply: RespValue) -> ClientResult<ScanCursor<(String, String)>> {
    ScanCursor::from_reply(reply, |items| pairs(items, element_text, element_text))
}

/// `[cursor, [member score ...]]` → one page of scored members.
pub fn scan_scored(reply: RespValue) -> ClientResult<ScanCursor<(String, f64)>> {
    ScanCursor::from_reply(reply, |items| pairs(items, element_text, float))
}

/// Elements of a non-null array.
pub(crate) fn items(reply: RespValue) -> ClientResult<Vec<RespValue>> {
    match reply {
        RespValue::Array(Some(items)) => Ok(items),
        other => Err(ClientError::unexpected("array", other.kind())),
    }
}

/// Text element inside an array; status lines are accepted too.
pub(crate) fn element_text(value: RespValue) -> ClientResult<String> {
    text(value)
}

/// Integer element that may also arrive as a decimal bulk string.
pub(crate) fn element_i64(value: RespValue) -> ClientResult<i64> {
    match value {
        RespValue::Integer(value) => Ok(value),
        RespValue::Bulk(Some(data)) => {
            let text = utf8(data)?;
            text.parse()
                .map_err(|_| ClientError::unexpected("decimal integer", &text))
        }
        other => Err(ClientError::unexpected("integer", other.kind())),
    }
}

fn element_u64(value: RespValue) -> ClientResult<u64> {
    let value = element_i64(value)?;
    u64::try_from(value).map_err(|_| ClientError::unexpected("non-negative integer", &value.to_string()))
}

fn pairs<A, B>(
    items: Vec<RespValue>,
    first: fn(RespValue) -> ClientResult<A>,
    second: fn(RespValue) -> ClientResult<B>,
) -> ClientResult<Vec<(A, B)>> {
    if items.len() % 2 != 0 {
        return Err(ClientError::unexpected(
            "even number of elements",
            &items.len().to_string(),
        ));
    }
    let mut out = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(a), Some(b)) = (iter.next(), iter.next()) {
        out.push((first(a)?, second(b)?));
    }
    Ok(out)
}

fn utf8(data: Bytes) -> ClientResult<String> {
    String::from_utf8(data.to_vec())
        .map_err(|_| ClientError::UnexpectedReply("text reply is not valid UTF-8".into()))
}

fn parse_float(text: &str) -> ClientResult<f64> {
    // The server spells infinities `inf` / `-inf`, which `f64::from_str` accepts.
    text.parse()
        .map_err(|_| ClientError::unexpected("decimal number", text))
}
