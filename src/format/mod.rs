use crate::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

pub mod ts;

use self::ts::TS_PACKET_SIZE;

/// Supplier of transport stream buffers for one stream, in arrival order.
#[async_trait]
pub trait PacketSource: Send {
    /// Next buffer of whole 188-byte packets, or `None` once the source is done.
    async fn next_buffer(&mut self) -> Result<Option<Bytes>>;
}

/// Packet buffers handed over by a host task.
#[async_trait]
impl PacketSource for mpsc::Receiver<Bytes> {
    async fn next_buffer(&mut self) -> Result<Option<Bytes>> {
        Ok(self.recv().await)
    }
}

/// Reads a byte stream and regroups it into whole transport packets.
///
/// Reads of any size are accepted; a buffer is handed out as soon as at
/// least one full packet is available. A partial packet left at end of
/// stream is discarded.
pub struct ReaderPacketSource<R: AsyncRead + Unpin + Send> {
    reader: R,
    buf: BytesMut,
    max_buffer: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin + Send> ReaderPacketSource<R> {
    /// Default upper bound: 7 packets, one UDP datagram's worth.
    pub const DEFAULT_PACKETS_PER_BUFFER: usize = 7;

    pub fn new(reader: R) -> Self {
        Self::with_packets_per_buffer(reader, Self::DEFAULT_PACKETS_PER_BUFFER)
    }

    pub fn with_packets_per_buffer(reader: R, packets: usize) -> Self {
        let max_buffer = packets.max(1) * TS_PACKET_SIZE;
        Self {
            reader,
            buf: BytesMut::with_capacity(max_buffer),
            max_buffer,
            eof: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> PacketSource for ReaderPacketSource<R> {
    async fn next_buffer(&mut self) -> Result<Option<Bytes>> {
        loop {
            let whole = self.buf.len() / TS_PACKET_SIZE * TS_PACKET_SIZE;
            if whole > 0 {
                let take = whole.min(self.max_buffer);
                return Ok(Some(self.buf.split_to(take).freeze()));
            }
            if self.eof {
                if !self.buf.is_empty() {
                    debug!("dropping {} trailing bytes at end of stream", self.buf.len());
                    self.buf.clear();
                }
                return Ok(None);
            }

            self.buf.reserve(self.max_buffer);
            if self.reader.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
    }
}
