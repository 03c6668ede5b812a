//! # Command Descriptor
//!
//! Purpose: Pair a command name and argument list with the pure function that
//! turns its reply into a typed result.
//!
//! ## Design Principles
//! 1. **Immutable Descriptor**: Built once with a fluent builder, then only read.
//! 2. **Pure Mapping**: `ReplyMapper<T>` is a plain `fn`, so descriptors are
//!    cheap to clone and can be queued in a pipeline.
//! 3. **Errors Before Mapping**: A `-` reply becomes `ClientError::Server`
//!    before the mapper runs; mappers only see success shapes.

use std::borrow::Cow;
use std::fmt;

use bytes::BytesMut;
use respool_proto::{encode_request, Arg, RespValue};

use crate::error::{ClientError, ClientResult};

/// Maps one decoded reply to a command's result type.
pub type ReplyMapper<T> = fn(RespValue) -> ClientResult<T>;

/// A command ready to be written, with its reply-decoding rule.
pub struct Command<T> {
    name: Cow<'static, str>,
    args: Vec<Arg>,
    map: ReplyMapper<T>,
}

impl<T> Command<T> {
    /// Creates a command with no arguments.
    pub fn new(name: impl Into<Cow<'static, str>>, map: ReplyMapper<T>) -> Self {
        Command {
            name: name.into(),
            args: Vec::new(),
            map,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends every argument from an iterator.
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `arg` only when present.
    pub fn opt_arg(self, arg: Option<impl Into<Arg>>) -> Self {
        match arg {
            Some(arg) => self.arg(arg),
            None => self,
        }
    }

    /// Appends a `keyword value` pair only when the value is present.
    pub fn opt_keyword(self, keyword: &'static str, value: Option<impl Into<Arg>>) -> Self {
        match value {
            Some(value) => self.arg(keyword).arg(value),
            None => self,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.args
    }

    pub fn mapper(&self) -> ReplyMapper<T> {
        self.map
    }

    /// Appends the RESP request framing to `out`.
    pub fn encode(&self, out: &mut BytesMut) {
        encode_request(&self.name, &self.args, out);
    }

    /// Turns a decoded reply into the command's result.
    pub fn map_reply(&self, reply: RespValue) -> ClientResult<T> {
        map_with(self.map, reply)
    }
}

/// Applies `map` after surfacing `-` replies as server errors.
pub(crate) fn map_with<T>(map: ReplyMapper<T>, reply: RespValue) -> ClientResult<T> {
    match reply {
        RespValue::Error(message) => Err(ClientError::Server(message)),
        other => map(other),
    }
}

impl<T> Clone for Command<T> {
    fn clone(&self) -> Self {
        Command {
            name: self.name.clone(),
            args: self.args.clone(),
            map: self.map,
        }
    }
}

impl<T> fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply;

    #[test]
    fn encodes_name_then_arguments() {
        let command = Command::new("SET", reply::ok).arg("key").arg(b"va\0l".to_vec());
        let mut out = BytesMut::new();
        command.encode(&mut out);
        assert_eq!(&out[..], b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$4\r\nva\0l\r\n");
    }

    #[test]
    fn optional_arguments_are_skipped_when_absent() {
        let command = Command::new("SCAN", reply::raw)
            .arg(0u64)
            .opt_keyword("MATCH", Some("user:*"))
            .opt_keyword("COUNT", None::<u64>)
            .opt_arg(None::<&str>);
        assert_eq!(
            command.arguments(),
            &[Arg::from("0"), Arg::from("MATCH"), Arg::from("user:*")]
        );
    }

    #[test]
    fn error_replies_never_reach_the_mapper() {
        let command = Command::new("INCR", reply::integer).arg("k");
        match command.map_reply(RespValue::Error("ERR not an integer".into())) {
            Err(ClientError::Server(message)) => assert_eq!(message, "ERR not an integer"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(command.map_reply(RespValue::Integer(3)).unwrap(), 3);
    }

    #[test]
    fn debug_lists_name_and_args() {
        let command = Command::new("GET", reply::optional_text).arg("k");
        let debug = format!("{:?}", command);
        assert!(debug.contains("GET"));
        assert!(debug.contains("Text(\"k\")"));
    }
}
