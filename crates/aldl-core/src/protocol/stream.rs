use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream the engine can drive: a serial port, a TCP
/// bridge or an in-memory pipe.
///
/// Implemented for every `AsyncRead + AsyncWrite + Unpin + Send` type.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}
