//! # Command Builders
//!
//! One function per command: each returns a [`Command`] carrying the request
//! arguments and the reply mapper for that command. Builders never touch a
//! connection, so the same descriptor works with `Connection::execute`,
//! a pipeline, or the pool.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use respool_proto::{Arg, RespValue};

use crate::command::Command;
use crate::error::{ClientError, ClientResult};
use crate::reply;
use crate::role::Role;
use crate::scan::{ScanCursor, ScanOptions};

/// Key expiry state as reported by `TTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

fn ttl_reply(reply: RespValue) -> ClientResult<Ttl> {
    match reply::integer(reply)? {
        -2 => Ok(Ttl::Missing),
        -1 => Ok(Ttl::NoExpiry),
        seconds if seconds >= 0 => Ok(Ttl::ExpiresIn(Duration::from_secs(seconds as u64))),
        other => Err(ClientError::unexpected("ttl", &other.to_string())),
    }
}

// `SET ... NX|XX` answers `+OK` when written and a null bulk when skipped.
fn set_outcome(reply: RespValue) -> ClientResult<bool> {
    match reply {
        RespValue::Simple(_) => Ok(true),
        RespValue::Bulk(None) => Ok(false),
        other => Err(ClientError::unexpected("OK or null", other.kind())),
    }
}

// Connection

pub fn ping() -> Command<String> {
    Command::new("PING", reply::text)
}

pub fn echo(message: impl Into<Arg>) -> Command<String> {
    Command::new("ECHO", reply::text).arg(message)
}

pub fn select(db: u32) -> Command<()> {
    Command::new("SELECT", reply::ok).arg(db)
}

pub fn auth(password: &str) -> Command<()> {
    Command::new("AUTH", reply::ok).arg(password)
}

// Keys

/// `DEL key [key ...]`, returning how many keys were removed.
pub fn del<K: Into<Arg>>(keys: impl IntoIterator<Item = K>) -> Command<i64> {
    Command::new("DEL", reply::integer).args(keys)
}

pub fn exists<K: Into<Arg>>(keys: impl IntoIterator<Item = K>) -> Command<i64> {
    Command::new("EXISTS", reply::integer).args(keys)
}

/// `EXPIRE key seconds`; false when the key does not exist.
pub fn expire(key: impl Into<Arg>, ttl: Duration) -> Command<bool> {
    Command::new("EXPIRE", reply::boolean).arg(key).arg(ttl.as_secs())
}

pub fn ttl(key: impl Into<Arg>) -> Command<Ttl> {
    Command::new("TTL", ttl_reply).arg(key)
}

/// `TYPE key`.
pub fn key_type(key: impl Into<Arg>) -> Command<String> {
    Command::new("TYPE", reply::status).arg(key)
}

pub fn keys(pattern: impl Into<Arg>) -> Command<Vec<String>> {
    Command::new("KEYS", reply::text_array).arg(pattern)
}

/// Serialized value of `key`, or `None` when missing.
pub fn dump(key: impl Into<Arg>) -> Command<Option<Bytes>> {
    Command::new("DUMP", reply::optional_bytes).arg(key)
}

/// `RESTORE key ttl payload`; a zero `ttl` means no expiry.
pub fn restore(key: impl Into<Arg>, ttl: Duration, payload: impl Into<Arg>) -> Command<()> {
    Command::new("RESTORE", reply::ok)
        .arg(key)
        .arg(ttl.as_millis() as u64)
        .arg(payload)
}

// Strings

pub fn get(key: impl Into<Arg>) -> Command<Option<String>> {
    Command::new("GET", reply::optional_text).arg(key)
}

/// `GET` without UTF-8 decoding.
pub fn get_bytes(key: impl Into<Arg>) -> Command<Option<Bytes>> {
    Command::new("GET", reply::optional_bytes).arg(key)
}

pub fn set(key: impl Into<Arg>, value: impl Into<Arg>) -> Command<()> {
    Command::new("SET", reply::ok).arg(key).arg(value)
}

/// `SET key value EX seconds`.
pub fn set_ex(key: impl Into<Arg>, value: impl Into<Arg>, ttl: Duration) -> Command<()> {
    set(key, value).arg("EX").arg(ttl.as_secs())
}

/// `SET key value NX`; false when the key already existed.
pub fn set_nx(key: impl Into<Arg>, value: impl Into<Arg>) -> Command<bool> {
    Command::new("SET", set_outcome).arg(key).arg(value).arg("NX")
}

pub fn incr(key: impl Into<Arg>) -> Command<i64> {
    Command::new("INCR", reply::integer).arg(key)
}

pub fn incrby(key: impl Into<Arg>, delta: i64) -> Command<i64> {
    Command::new("INCRBY", reply::integer).arg(key).arg(delta)
}

pub fn incrbyfloat(key: impl Into<Arg>, delta: f64) -> Command<f64> {
    Command::new("INCRBYFLOAT", reply::float).arg(key).arg(delta)
}

/// Values in key order; missing keys are `None`.
pub fn mget<K: Into<Arg>>(keys: impl IntoIterator<Item = K>) -> Command<Vec<Option<String>>> {
    Command::new("MGET", reply::optional_text_array).args(keys)
}

pub fn append(key: impl Into<Arg>, value: impl Into<Arg>) -> Command<i64> {
    Command::new("APPEND", reply::integer).arg(key).arg(value)
}

pub fn strlen(key: impl Into<Arg>) -> Command<i64> {
    Command::new("STRLEN", reply::integer).arg(key)
}

// Hashes

pub fn hget(key: impl Into<Arg>, field: impl Into<Arg>) -> Command<Option<String>> {
    Command::new("HGET", reply::optional_text).arg(key).arg(field)
}

/// `HSET key field value`, returning the number of new fields.
pub fn hset(key: impl Into<Arg>, field: impl Into<Arg>, value: impl Into<Arg>) -> Command<i64> {
    Command::new("HSET", reply::integer).arg(key).arg(field).arg(value)
}

pub fn hgetall(key: impl Into<Arg>) -> Command<Vec<(String, String)>> {
    Command::new("HGETALL", reply::text_pairs).arg(key)
}

pub fn hdel<F: Into<Arg>>(key: impl Into<Arg>, fields: impl IntoIterator<Item = F>) -> Command<i64> {
    Command::new("HDEL", reply::integer).arg(key).args(fields)
}

// Lists

pub fn lpush<V: Into<Arg>>(key: impl Into<Arg>, values: impl IntoIterator<Item = V>) -> Command<i64> {
    Command::new("LPUSH", reply::integer).arg(key).args(values)
}

pub fn rpush<V: Into<Arg>>(key: impl Into<Arg>, values: impl IntoIterator<Item = V>) -> Command<i64> {
    Command::new("RPUSH", reply::integer).arg(key).args(values)
}

pub fn lpop(key: impl Into<Arg>) -> Command<Option<String>> {
    Command::new("LPOP", reply::optional_text).arg(key)
}

pub fn lrange(key: impl Into<Arg>, start: i64, stop: i64) -> Command<Vec<String>> {
    Command::new("LRANGE", reply::text_array).arg(key).arg(start).arg(stop)
}

/// `BLPOP key [key ...] timeout`. Yields `(key, element)`, or `None` when the
/// timeout passes. The timeout is sent in whole seconds, rounded up so a
/// sub-second wait never turns into `0` (block forever).
pub fn blpop<K: Into<Arg>>(
    keys: impl IntoIterator<Item = K>,
    timeout: Duration,
) -> Command<Option<(String, String)>> {
    let secs = timeout
        .as_secs()
        .saturating_add(u64::from(timeout.subsec_nanos() > 0));
    Command::new("BLPOP", reply::keyed_text).args(keys).arg(secs)
}

// Sets

pub fn sadd<M: Into<Arg>>(key: impl Into<Arg>, members: impl IntoIterator<Item = M>) -> Command<i64> {
    Command::new("SADD", reply::integer).arg(key).args(members)
}

pub fn smembers(key: impl Into<Arg>) -> Command<Vec<String>> {
    Command::new("SMEMBERS", reply::text_array).arg(key)
}

pub fn sismember(key: impl Into<Arg>, member: impl Into<Arg>) -> Command<bool> {
    Command::new("SISMEMBER", reply::boolean).arg(key).arg(member)
}

// Sorted sets

pub fn zadd(key: impl Into<Arg>, score: f64, member: impl Into<Arg>) -> Command<i64> {
    Command::new("ZADD", reply::integer).arg(key).arg(score).arg(member)
}

pub fn zscore(key: impl Into<Arg>, member: impl Into<Arg>) -> Command<Option<f64>> {
    Command::new("ZSCORE", reply::optional_float).arg(key).arg(member)
}

pub fn zrank(key: impl Into<Arg>, member: impl Into<Arg>) -> Command<Option<i64>> {
    Command::new("ZRANK", reply::optional_integer).arg(key).arg(member)
}

pub fn zrange_with_scores(key: impl Into<Arg>, start: i64, stop: i64) -> Command<Vec<(String, f64)>> {
    Command::new("ZRANGE", reply::scored_members)
        .arg(key)
        .arg(start)
        .arg(stop)
        .arg("WITHSCORES")
}

// Scanning

pub fn scan(cursor: u64, options: &ScanOptions) -> Command<ScanCursor<String>> {
    options.apply(Command::new("SCAN", reply::scan_keys).arg(cursor))
}

pub fn hscan(key: impl Into<Arg>, cursor: u64, options: &ScanOptions) -> Command<ScanCursor<(String, String)>> {
    options.apply(Command::new("HSCAN", reply::scan_pairs).arg(key).arg(cursor))
}

pub fn sscan(key: impl Into<Arg>, cursor: u64, options: &ScanOptions) -> Command<ScanCursor<String>> {
    options.apply(Command::new("SSCAN", reply::scan_keys).arg(key).arg(cursor))
}

pub fn zscan(key: impl Into<Arg>, cursor: u64, options: &ScanOptions) -> Command<ScanCursor<(String, f64)>> {
    options.apply(Command::new("ZSCAN", reply::scan_scored).arg(key).arg(cursor))
}

// Scripting

/// `EVAL script numkeys key... arg...`. The reply shape depends on the
/// script, so it is returned undecoded.
pub fn eval<K, A>(
    script: &str,
    keys: impl IntoIterator<Item = K>,
    args: impl IntoIterator<Item = A>,
) -> Command<RespValue>
where
    K: Into<Arg>,
    A: Into<Arg>,
{
    let keys: Vec<Arg> = keys.into_iter().map(Into::into).collect();
    Command::new("EVAL", reply::raw)
        .arg(script)
        .arg(keys.len())
        .args(keys)
        .args(args)
}

pub fn script_exists<S: Into<Arg>>(sha1s: impl IntoIterator<Item = S>) -> Command<Vec<bool>> {
    Command::new("SCRIPT", reply::boolean_array)
        .arg("EXISTS")
        .args(sha1s)
}

// Server

pub fn dbsize() -> Command<i64> {
    Command::new("DBSIZE", reply::integer)
}

pub fn flushdb() -> Command<()> {
    Command::new("FLUSHDB", reply::ok)
}

/// `INFO [section]`.
pub fn info(section: Option<&str>) -> Command<String> {
    Command::new("INFO", reply::text).opt_arg(section)
}

pub fn lastsave() -> Command<SystemTime> {
    Command::new("LASTSAVE", reply::unix_time)
}

pub fn time() -> Command<SystemTime> {
    Command::new("TIME", reply::server_time)
}

pub fn role() -> Command<Role> {
    Command::new("ROLE", reply::role)
}

/// `CONFIG GET pattern`; parameters without a value map to `None`.
pub fn config_get(pattern: impl Into<Arg>) -> Command<Vec<(String, Option<String>)>> {
    Command::new("CONFIG", reply::optional_text_pairs)
        .arg("GET")
        .arg(pattern)
}

pub fn config_set(parameter: impl Into<Arg>, value: impl Into<Arg>) -> Command<()> {
    Command::new("CONFIG", reply::ok)
        .arg("SET")
        .arg(parameter)
        .arg(value)
}

pub fn client_setname(name: impl Into<Arg>) -> Command<()> {
    Command::new("CLIENT", reply::ok).arg("SETNAME").arg(name)
}

pub fn client_getname() -> Command<Option<String>> {
    Command::new("CLIENT", reply::optional_text).arg("GETNAME")
}

pub fn slowlog_len() -> Command<i64> {
    Command::new("SLOWLOG", reply::integer).arg("LEN")
}

/// `SYNC`, returning the raw RDB payload.
pub fn sync() -> Command<Bytes> {
    Command::new("SYNC", reply::bytes)
}
