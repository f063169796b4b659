//! Subscription Protocol
//!
//! Builds the depth subscribe request for a symbol and writes it to an
//! open connection. The protocol is fire-and-forget: the acknowledgement
//! is never awaited, it simply arrives later as an ordinary frame.

use super::codec::{CodecError, DepthCodec};
use super::messages::SubscriptionRequest;
use crate::application::ports::{ConnectionPort, TransportError};

/// Errors raised while sending a subscribe request.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    /// The request could not be serialized.
    #[error("failed to encode subscribe request: {0}")]
    Encode(#[from] CodecError),

    /// The request could not be written to the connection.
    #[error("failed to send subscribe request: {0}")]
    Write(#[from] TransportError),
}

/// Build the subscribe request for one symbol's depth stream.
#[must_use]
pub fn build_subscribe_request(symbol: &str) -> SubscriptionRequest {
    SubscriptionRequest::depth(symbol)
}

/// Serialize `request` and write it as one text frame.
///
/// # Errors
///
/// Returns an error if encoding or the write fails.
pub async fn send_subscribe<C>(
    connection: &mut C,
    codec: &DepthCodec,
    request: &SubscriptionRequest,
) -> Result<(), SubscribeError>
where
    C: ConnectionPort + ?Sized,
{
    let json = codec.encode(request)?;

    tracing::debug!(params = ?request.params, id = request.id, "Sending subscribe request");

    connection.write_frame(json).await?;
    Ok(())
}
