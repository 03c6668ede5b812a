//! # Pipeline
//!
//! Purpose: Queue several commands on one connection without waiting for
//! replies, then read every reply back in write order.
//!
//! ## Design Principles
//! 1. **Exclusive Borrow**: A pipeline holds `&mut Connection`, so no other
//!    command can interleave with the queued ones.
//! 2. **Positional Results**: `flush` performs exactly one read per queued
//!    command and returns results aligned with the queue.
//! 3. **Bounded Buffering**: Requests accumulate in memory and are spilled to
//!    the stream once the buffer passes `SPILL_THRESHOLD`.

use tracing::trace;

use crate::command::{map_with, Command, ReplyMapper};
use crate::connection::{Connection, BROKEN};
use crate::error::{ClientError, ClientResult};

/// Buffered request bytes that trigger an early write during `send`.
pub const SPILL_THRESHOLD: usize = 64 * 1024;

/// Batch of commands queued on one connection.
///
/// Dropping a pipeline without calling [`Pipeline::flush`] discards commands
/// that have not reached the stream yet. If some already have, their replies
/// can no longer be matched up and the connection is poisoned.
pub struct Pipeline<'c, T> {
    conn: &'c mut Connection,
    pending: Vec<ReplyMapper<T>>,
    spilled: bool,
    finished: bool,
}

impl<'c, T> Pipeline<'c, T> {
    pub(crate) fn new(conn: &'c mut Connection) -> Self {
        Pipeline {
            conn,
            pending: Vec::new(),
            spilled: false,
            finished: false,
        }
    }

    /// Queues a command. Only writes to the stream when the request buffer is
    /// over the spill threshold; never reads.
    ///
    /// Fails with `ConnectionState` once an earlier spill has poisoned the
    /// connection.
    pub fn send(&mut self, command: &Command<T>) -> ClientResult<&mut Self> {
        self.ensure_healthy()?;
        command.encode(&mut self.conn.write_buf);
        self.pending.push(command.mapper());
        if self.conn.write_buf.len() > SPILL_THRESHOLD {
            self.spill()?;
        }
        Ok(self)
    }

    /// Number of commands queued so far.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Writes every queued command, then reads exactly one reply per command.
    ///
    /// A server error for one command lands in that command's slot. A
    /// transport or protocol failure aborts the whole batch and poisons the
    /// connection.
    pub fn flush(mut self) -> ClientResult<Vec<ClientResult<T>>> {
        let pending = std::mem::take(&mut self.pending);
        self.finished = true;
        self.conn.pipelining = false;
        self.ensure_healthy()?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        trace!(conn_id = self.conn.id(), pending = pending.len(), "Flushing pipeline");
        self.conn.send_buffer(true)?;

        let mut results = Vec::with_capacity(pending.len());
        for map in pending {
            let reply = self.conn.read_reply()?;
            results.push(map_with(map, reply));
        }
        Ok(results)
    }

    fn spill(&mut self) -> ClientResult<()> {
        trace!(
            conn_id = self.conn.id(),
            bytes = self.conn.write_buf.len(),
            "Spilling pipeline buffer"
        );
        self.spilled = true;
        let result = self.conn.send_buffer(false);
        if result.is_err() {
            self.pending.clear();
            self.finished = true;
        }
        result
    }

    fn ensure_healthy(&self) -> ClientResult<()> {
        if self.conn.is_broken() {
            return Err(ClientError::ConnectionState(BROKEN));
        }
        Ok(())
    }
}

impl<T> Drop for Pipeline<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.conn.pipelining = false;
        self.conn.write_buf.clear();
        if self.spilled && !self.pending.is_empty() {
            let reason = format!("pipeline dropped with {} unread replies", self.pending.len());
            self.conn.mark_broken(&reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use crate::transport::mock::MockStream;
    use respool_proto::ReadLimits;

    fn connection(replies: impl AsRef<[u8]>) -> (Connection, crate::transport::mock::Sent) {
        let (stream, sent) = MockStream::new(replies);
        (Connection::with_transport(Box::new(stream), ReadLimits::default()), sent)
    }

    fn counter_replies(n: usize) -> String {
        (1..=n).map(|i| format!(":{}\r\n", i)).collect()
    }

    #[test]
    fn three_incr_flush_in_order() {
        let (mut conn, sent) = connection(":1\r\n:2\r\n:3\r\n");
        let mut pipeline = conn.pipeline().unwrap();
        for _ in 0..3 {
            pipeline.send(&commands::incr("counter")).unwrap();
        }
        assert_eq!(pipeline.len(), 3);
        assert!(sent.text().is_empty());

        let results: Vec<i64> = pipeline
            .flush()
            .unwrap()
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(results, vec![1, 2, 3]);
        assert!(!conn.is_pipelining());
        assert_eq!(sent.text(), "*2\r\n$4\r\nINCR\r\n$7\r\ncounter\r\n".repeat(3));
    }

    #[test]
    fn flush_matches_sequential_execution() {
        for n in [0usize, 1, 5, 1000] {
            let script = counter_replies(n);

            let (mut sequential, sequential_sent) = connection(&script);
            let expected: Vec<i64> = (0..n)
                .map(|_| sequential.execute(&commands::incr("k")).unwrap())
                .collect();

            let (mut pipelined, pipelined_sent) = connection(&script);
            let mut pipeline = pipelined.pipeline().unwrap();
            for _ in 0..n {
                pipeline.send(&commands::incr("k")).unwrap();
            }
            let actual: Vec<i64> = pipeline
                .flush()
                .unwrap()
                .into_iter()
                .map(Result::unwrap)
                .collect();

            assert_eq!(actual.len(), n);
            assert_eq!(actual, expected);
            assert_eq!(pipelined_sent.bytes(), sequential_sent.bytes());
        }
    }

    #[test]
    fn server_errors_stay_in_their_slot() {
        let (mut conn, _) = connection(":1\r\n-ERR value is not an integer\r\n:2\r\n");
        let mut pipeline = conn.pipeline().unwrap();
        pipeline
            .send(&commands::incr("a"))
            .unwrap()
            .send(&commands::incr("b"))
            .unwrap()
            .send(&commands::incr("a"))
            .unwrap();
        let results = pipeline.flush().unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &1);
        assert!(matches!(&results[1], Err(ClientError::Server(m)) if m.starts_with("ERR")));
        assert_eq!(results[2].as_ref().unwrap(), &2);
        assert!(!conn.is_broken());
    }

    #[test]
    fn short_reply_stream_poisons() {
        let (mut conn, _) = connection(":1\r\n");
        let mut pipeline = conn.pipeline().unwrap();
        pipeline.send(&commands::incr("a")).unwrap();
        pipeline.send(&commands::incr("a")).unwrap();
        assert!(matches!(pipeline.flush(), Err(ClientError::Io(_))));
        assert!(conn.is_broken());
        assert!(!conn.is_pipelining());
    }

    #[test]
    fn execute_is_refused_while_pipelining() {
        let (mut conn, _) = connection("");
        let pipeline = conn.pipeline::<i64>().unwrap();
        std::mem::forget(pipeline);
        assert!(conn.is_pipelining());
        assert!(matches!(
            conn.execute(&commands::ping()),
            Err(ClientError::ConnectionState(_))
        ));
    }

    #[test]
    fn dropping_an_unspilled_pipeline_discards_it() {
        let (mut conn, sent) = connection("+PONG\r\n");
        {
            let mut pipeline = conn.pipeline().unwrap();
            pipeline.send(&commands::incr("a")).unwrap();
        }
        assert!(sent.text().is_empty());
        assert!(!conn.is_broken());
        assert!(!conn.is_pipelining());
        assert_eq!(conn.execute(&commands::ping()).unwrap(), "PONG");
    }

    #[test]
    fn large_batches_spill_early() {
        let value = "x".repeat(SPILL_THRESHOLD / 4);
        let (mut conn, sent) = connection("+OK\r\n".repeat(5));
        let mut pipeline = conn.pipeline().unwrap();
        for i in 0..5 {
            pipeline.send(&commands::set(format!("key{}", i), value.as_str())).unwrap();
        }
        assert!(!sent.bytes().is_empty());

        let results = pipeline.flush().unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(!conn.is_broken());
    }

    #[test]
    fn dropping_a_spilled_pipeline_poisons() {
        let value = "x".repeat(SPILL_THRESHOLD);
        let (mut conn, sent) = connection("");
        {
            let mut pipeline = conn.pipeline().unwrap();
            pipeline.send(&commands::set("big", value.as_str())).unwrap();
            assert!(!sent.bytes().is_empty());
        }
        assert!(conn.is_broken());
        assert!(!conn.is_pipelining());
    }

    #[test]
    fn failed_spill_refuses_further_sends_and_reads() {
        let (stream, _) = MockStream::new(":1\r\n");
        let mut conn = Connection::with_transport(Box::new(stream.failing()), ReadLimits::default());
        let value = "x".repeat(SPILL_THRESHOLD);

        let mut pipeline = conn.pipeline().unwrap();
        assert!(matches!(
            pipeline.send(&commands::set("big", value.as_str())),
            Err(ClientError::Io(_))
        ));
        assert!(pipeline.is_empty());
        assert!(matches!(
            pipeline.send(&commands::set("k", "v")),
            Err(ClientError::ConnectionState(_))
        ));
        assert!(matches!(pipeline.flush(), Err(ClientError::ConnectionState(_))));
        assert!(conn.is_broken());
        assert!(!conn.is_pipelining());
    }
}
