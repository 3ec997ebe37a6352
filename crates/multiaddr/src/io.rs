//! Binary multiaddr I/O over byte streams.
//!
//! The async functions work on [`futures`] `AsyncRead`/`AsyncWrite`; the
//! `*_abortable` variants return [`Error::Cancelled`] when aborted through
//! their [`AbortHandle`](futures::future::AbortHandle) before completion, and
//! the `*_blocking` variants drive the same code over `std::io`.

use std::io::{self, Read, Write};

use futures::{
    executor::block_on,
    future::{AbortRegistration, Abortable, Aborted},
    io::AllowStdIo,
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
};
use unsigned_varint::io::ReadError;

use crate::{
    codec::ValueKind,
    errors::{DataError, Error, Result},
    registry::{global_registry, Registry},
    segment::Segment,
    Multiaddr,
};

fn eof_as_truncated(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DataError::Truncated.into()
    } else {
        err.into()
    }
}

#[allow(unreachable_patterns)]
fn varint_read_error(err: ReadError) -> Error {
    match err {
        ReadError::Io(err) => eof_as_truncated(err),
        ReadError::Decode(err) => DataError::Varint(err).into(),
        _ => DataError::Truncated.into(),
    }
}

/// Read a protocol code, returns `None` on a clean end of stream.
async fn read_code<R>(reader: &mut R) -> Result<Option<u32>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = unsigned_varint::encode::u32_buffer();

    if reader.read(&mut buf[..1]).await? == 0 {
        return Ok(None);
    }

    let mut len = 1;

    while buf[len - 1] & 0x80 != 0 {
        if len == buf.len() {
            return Err(DataError::Varint(unsigned_varint::decode::Error::Overflow).into());
        }

        reader
            .read_exact(&mut buf[len..len + 1])
            .await
            .map_err(eof_as_truncated)?;

        len += 1;
    }

    let (code, _) = unsigned_varint::decode::u32(&buf[..len]).map_err(DataError::from)?;

    Ok(Some(code))
}

async fn read_segment<R>(reader: &mut R, registry: &Registry, code: u32) -> Result<Segment>
where
    R: AsyncRead + Unpin,
{
    let protocol = registry
        .lookup_by_code(code)
        .map_err(|_| DataError::UnknownCode(code))?;

    let payload = match protocol.kind() {
        ValueKind::None => vec![],
        ValueKind::Fixed(len) => {
            let mut payload = vec![0u8; len];

            reader
                .read_exact(&mut payload)
                .await
                .map_err(eof_as_truncated)?;

            payload
        }
        ValueKind::LengthPrefixed | ValueKind::Utf8 => {
            let len = unsigned_varint::aio::read_usize(&mut *reader)
                .await
                .map_err(varint_read_error)?;

            let mut payload = vec![];

            (&mut *reader)
                .take(len as u64)
                .read_to_end(&mut payload)
                .await?;

            if payload.len() < len {
                return Err(DataError::Truncated.into());
            }

            payload
        }
    };

    log::trace!(
        "read multiaddr segment, protocol={}, payload length={}",
        protocol.name(),
        payload.len()
    );

    Segment::from_payload(protocol, &payload)
}

impl Multiaddr {
    /// Read the binary form from `reader` until end of stream, with the [`global_registry`].
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        Self::read_from_with(reader, global_registry()).await
    }

    /// Read the binary form from `reader` until end of stream.
    ///
    /// End of stream inside a segment is [`DataError::Truncated`].
    pub async fn read_from_with<R>(reader: &mut R, registry: &Registry) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut segments = vec![];

        while let Some(code) = read_code(reader).await? {
            segments.push(read_segment(reader, registry, code).await?);
        }

        Ok(Self::from_segments(segments))
    }

    /// Like [`read_from`](Self::read_from), returns [`Error::Cancelled`] if aborted.
    pub async fn read_from_abortable<R>(
        reader: &mut R,
        registration: AbortRegistration,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        match Abortable::new(Self::read_from(reader), registration).await {
            Ok(result) => result,
            Err(Aborted) => {
                log::debug!("read multiaddr aborted");
                Err(Error::Cancelled)
            }
        }
    }

    /// Blocking version of [`read_from`](Self::read_from).
    pub fn read_from_blocking<R>(reader: R) -> Result<Self>
    where
        R: Read + Unpin,
    {
        block_on(Self::read_from(&mut AllowStdIo::new(reader)))
    }

    /// Write the binary form to `writer` and flush it.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = self.to_vec();

        writer.write_all(&buf).await?;
        writer.flush().await?;

        log::trace!("write multiaddr {}, length={}", self, buf.len());

        Ok(())
    }

    /// Like [`write_to`](Self::write_to), returns [`Error::Cancelled`] if aborted.
    pub async fn write_to_abortable<W>(
        &self,
        writer: &mut W,
        registration: AbortRegistration,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match Abortable::new(self.write_to(writer), registration).await {
            Ok(result) => result,
            Err(Aborted) => {
                log::debug!("write multiaddr {} aborted", self);
                Err(Error::Cancelled)
            }
        }
    }

    /// Blocking version of [`write_to`](Self::write_to).
    pub fn write_to_blocking<W>(&self, writer: W) -> Result<()>
    where
        W: Write + Unpin,
    {
        block_on(self.write_to(&mut AllowStdIo::new(writer)))
    }
}
