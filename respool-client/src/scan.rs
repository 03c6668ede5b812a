//! # Scan Cursor
//!
//! Purpose: Represent one page of a SCAN-family iteration and drive the
//! page loop for callers that want the whole keyspace.
//!
//! ## Notes
//! - The server owns the real iteration state; a cursor of `0` ends it.
//! - `MATCH` and `COUNT` are hints. Pages may be empty, may exceed `COUNT`,
//!   and items may repeat or be missed if the keyspace changes mid-scan.
//!   Nothing here deduplicates.

use respool_proto::RespValue;

use crate::command::Command;
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::reply::{element_i64, items};

/// One page of a cursor-based scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCursor<T> {
    /// Cursor to send for the next page; `0` when the iteration is done.
    pub cursor: u64,
    /// Items returned in this page.
    pub items: Vec<T>,
}

impl<T> ScanCursor<T> {
    pub fn is_complete(&self) -> bool {
        self.cursor == 0
    }

    pub(crate) fn from_reply<F>(reply: RespValue, decode_items: F) -> ClientResult<Self>
    where
        F: FnOnce(Vec<RespValue>) -> ClientResult<Vec<T>>,
    {
        let [cursor, page] = <[RespValue; 2]>::try_from(items(reply)?).map_err(|parts| {
            ClientError::unexpected("[cursor, items]", &format!("array of {}", parts.len()))
        })?;
        let cursor = element_i64(cursor)?;
        let cursor = u64::try_from(cursor)
            .map_err(|_| ClientError::unexpected("non-negative cursor", &cursor.to_string()))?;
        Ok(ScanCursor {
            cursor,
            items: decode_items(items(page)?)?,
        })
    }
}

/// Optional `MATCH` / `COUNT` hints for a scan call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub pattern: Option<String>,
    pub count: Option<u64>,
}

impl ScanOptions {
    pub fn new() -> Self {
        ScanOptions::default()
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub(crate) fn apply<T>(&self, command: Command<T>) -> Command<T> {
        command
            .opt_keyword("MATCH", self.pattern.as_deref())
            .opt_keyword("COUNT", self.count)
    }
}

/// Requests pages until the cursor returns to `0` and concatenates them.
///
/// `page` builds the command for a given cursor, e.g.
/// `|cursor| commands::scan(cursor, &options)`.
pub fn collect<T, F>(conn: &mut Connection, mut page: F) -> ClientResult<Vec<T>>
where
    F: FnMut(u64) -> Command<ScanCursor<T>>,
{
    let mut cursor = 0;
    let mut out = Vec::new();
    loop {
        let next = conn.execute(&page(cursor))?;
        out.extend(next.items);
        if next.cursor == 0 {
            return Ok(out);
        }
        cursor = next.cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use crate::reply;
    use crate::transport::mock::MockStream;
    use bytes::BytesMut;
    use respool_proto::ReadLimits;

    fn page(cursor: &str, keys: &[&str]) -> Vec<u8> {
        let items = keys.iter().map(|key| RespValue::bulk(key.to_string())).collect();
        let mut out = BytesMut::new();
        RespValue::array(vec![RespValue::bulk(cursor.to_string()), RespValue::array(items)])
            .encode(&mut out);
        out.to_vec()
    }

    #[test]
    fn decodes_a_page() {
        let reply = RespValue::array(vec![
            RespValue::bulk("17"),
            RespValue::array(vec![RespValue::bulk("a"), RespValue::bulk("b")]),
        ]);
        let cursor = reply::scan_keys(reply).unwrap();
        assert_eq!(cursor.cursor, 17);
        assert_eq!(cursor.items, vec!["a", "b"]);
        assert!(!cursor.is_complete());
    }

    #[test]
    fn rejects_malformed_pages() {
        let short = RespValue::array(vec![RespValue::bulk("0")]);
        assert!(reply::scan_keys(short).is_err());

        let negative = RespValue::array(vec![RespValue::bulk("-3"), RespValue::array(vec![])]);
        assert!(reply::scan_keys(negative).is_err());
    }

    #[test]
    fn options_append_hints() {
        let options = ScanOptions::new().pattern("user:*").count(100);
        let command = commands::scan(0, &options);
        let mut out = BytesMut::new();
        command.encode(&mut out);
        assert_eq!(
            &out[..],
            b"*6\r\n$4\r\nSCAN\r\n$1\r\n0\r\n$5\r\nMATCH\r\n$6\r\nuser:*\r\n$5\r\nCOUNT\r\n$3\r\n100\r\n"
        );
    }

    #[test]
    fn collect_walks_until_cursor_zero() {
        let keyspace = ["k1", "k2", "k3", "k4", "k5"];
        let mut script = Vec::new();
        script.extend(page("3", &keyspace[..2]));
        script.extend(page("7", &[]));
        script.extend(page("0", &keyspace[2..]));

        let (stream, sent) = MockStream::new(script);
        let mut conn = Connection::with_transport(Box::new(stream), ReadLimits::default());
        let options = ScanOptions::new();
        let keys = collect(&mut conn, |cursor| commands::scan(cursor, &options)).unwrap();

        assert_eq!(keys, keyspace);
        assert_eq!(
            sent.text(),
            "*2\r\n$4\r\nSCAN\r\n$1\r\n0\r\n*2\r\n$4\r\nSCAN\r\n$1\r\n3\r\n*2\r\n$4\r\nSCAN\r\n$1\r\n7\r\n"
        );
    }

    #[test]
    fn collect_stops_on_first_complete_page() {
        let (stream, _) = MockStream::new(page("0", &["only"]));
        let mut conn = Connection::with_transport(Box::new(stream), ReadLimits::default());
        let keys = collect(&mut conn, |cursor| commands::scan(cursor, &ScanOptions::new())).unwrap();
        assert_eq!(keys, vec!["only"]);
    }
}
