//! Length-Prefixed Frames
//!
//! Pipes are byte streams, so every message is preceded by its length:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 LE)  | rkyv payload     |
//! +----------------+------------------+
//! ```

use rkyv::ser::serializers::AllocSerializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{Archive, CheckBytes, Deserialize, Infallible, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use thiserror::Error;

/// Maximum frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const PIPE_BUFFER: usize = 64 * 1024;

/// Errors raised while encoding or decoding frames
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying pipe failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// rkyv could not serialize the message
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Payload failed validation
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// Length prefix out of range
    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Announced size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// Zero-length frame
    #[error("empty frame")]
    EmptyFrame,

    /// Peer closed the stream between frames
    #[error("end of stream")]
    EndOfStream,
}

/// Writes length-prefixed rkyv frames
pub struct FrameWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Wrap a byte sink
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(PIPE_BUFFER, writer),
        }
    }

    /// Serialize and send one message, flushing immediately
    pub fn write<T>(&mut self, message: &T) -> Result<(), WireError>
    where
        T: Serialize<AllocSerializer<256>>,
    {
        let bytes =
            rkyv::to_bytes::<_, 256>(message).map_err(|e| WireError::Encode(e.to_string()))?;

        let len = bytes.len();
        if len > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        self.writer.write_all(&(len as u32).to_le_bytes())?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads length-prefixed rkyv frames
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a byte source
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(PIPE_BUFFER, reader),
        }
    }

    /// Block until one full message has been read and validated
    pub fn read<T>(&mut self) -> Result<T, WireError>
    where
        T: Archive,
        T::Archived: for<'a> CheckBytes<DefaultValidator<'a>> + Deserialize<T, Infallible>,
    {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(WireError::EndOfStream);
            }
            Err(e) => return Err(WireError::Io(e)),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }
        if len == 0 {
            return Err(WireError::EmptyFrame);
        }

        // rkyv needs an aligned buffer to validate in place
        let mut buf = rkyv::AlignedVec::with_capacity(len);
        buf.resize(len, 0);
        self.reader.read_exact(&mut buf)?;

        let archived = rkyv::check_archived_root::<T>(&buf)
            .map_err(|e| WireError::Decode(e.to_string()))?;
        archived
            .deserialize(&mut Infallible)
            .map_err(|_| WireError::Decode("deserialization failed".to_string()))
    }

    /// Whether bytes are already sitting in the read buffer
    pub fn has_buffered_data(&self) -> bool {
        !self.reader.buffer().is_empty()
    }
}
