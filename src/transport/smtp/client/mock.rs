//! In-memory stream standing in for a relay connection in unit tests

use std::{
    io::{self, Cursor, Read, Write},
    sync::{Arc, Mutex},
};

type MockCursor = Cursor<Vec<u8>>;

/// Replays a scripted relay transcript and records everything written
///
/// Clones share both buffers, so a test can keep one handle and inspect
/// what the session wrote after handing the other to it.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockStream {
    reader: Arc<Mutex<MockCursor>>,
    writer: Arc<Mutex<Vec<u8>>>,
    /// Writes going past this many bytes in total fail
    write_limit: Option<usize>,
}

impl MockStream {
    /// Creates a stream that will answer with `replies`, in order
    pub(crate) fn with_replies(replies: &[&str]) -> MockStream {
        MockStream::with_bytes(replies.concat().as_bytes())
    }

    /// Creates a stream that will answer with raw `bytes`
    pub(crate) fn with_bytes(bytes: &[u8]) -> MockStream {
        MockStream {
            reader: Arc::new(Mutex::new(MockCursor::new(bytes.to_vec()))),
            writer: Arc::new(Mutex::new(Vec::new())),
            write_limit: None,
        }
    }

    /// Makes writes fail once `limit` bytes were accepted, like a peer
    /// resetting the connection
    pub(crate) fn fail_writes_after(mut self, limit: usize) -> MockStream {
        self.write_limit = Some(limit);
        self
    }

    /// Everything written so far, lossily decoded
    pub(crate) fn written(&self) -> String {
        String::from_utf8_lossy(&self.writer.lock().unwrap()).into_owned()
    }
}

impl Write for MockStream {
    fn write(&mut self, msg: &[u8]) -> io::Result<usize> {
        let mut writer = self.writer.lock().unwrap();
        if let Some(limit) = self.write_limit {
            if writer.len() + msg.len() > limit {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ));
            }
        }
        writer.write(msg)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.lock().unwrap().read(buf)
    }
}
