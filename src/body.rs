//! Request body storage: buffered in memory for small bodies, spilled to an
//! anonymous temp file once they cross [`BODY_IN_FILE_THRESHOLD`].
//!
//! Grounded in `original_source/src/http_server.c`'s `init_body_reading`,
//! which picks between `malloc` and `tmpfile()` on the same threshold.

use std::io::{self, Seek, SeekFrom, Write};

/// Bodies smaller than this stay in memory; larger ones spill to disk.
pub const BODY_IN_FILE_THRESHOLD: u64 = 1024 * 1024;

/// Ceiling on an accepted `Content-Length`. Requests declaring more than
/// this are rejected as malformed before any sink is allocated.
pub const MAX_CONTENT_LENGTH: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug)]
pub enum BodySink {
    Memory(Vec<u8>),
    File(std::fs::File),
}

impl BodySink {
    /// Choose a sink for a body of the given expected length. A body of
    /// exactly `BODY_IN_FILE_THRESHOLD` bytes still fits in memory —
    /// `init_body_reading` only spills once the body is strictly larger.
    pub fn for_expected_len(expected: u64) -> io::Result<Self> {
        if expected > BODY_IN_FILE_THRESHOLD {
            Ok(BodySink::File(tempfile::tempfile()?))
        } else {
            Ok(BodySink::Memory(Vec::with_capacity(expected as usize)))
        }
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            BodySink::Memory(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            BodySink::File(file) => file.write_all(data),
        }
    }

    /// Rewind the sink so the body can be read back from the start, for
    /// handlers that want to inspect or stream it.
    pub fn finalize(&mut self) -> io::Result<()> {
        match self {
            BodySink::Memory(_) => Ok(()),
            BodySink::File(file) => {
                file.seek(SeekFrom::Start(0))?;
                Ok(())
            }
        }
    }
}
