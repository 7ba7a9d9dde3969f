use thiserror::Error;

/// Errors raised while translating between [`RawMessage`] and [`KnownMessage`]
#[derive(Debug, Error)]
pub enum CodecError {
    /// The type header is absent or empty
    #[error("message carries no type header")]
    MissingType,
    /// The type header names a payload type that is not part of the message union
    #[error("unknown message type '{0}'")]
    UnknownType(String),
    /// The payload could not be (de-)serialized
    #[error("malformed payload for message type '{message_type}'")]
    Payload {
        /// Type named by the header
        message_type: String,
        /// Underlying serialization error
        #[source]
        source: serde_json::Error,
    },
}

/// Metadata travelling alongside the payload of a message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageHeader {
    /// Name of the payload type, used to select the decoder
    pub message_type: String,
    /// Distributed tracing identifier propagated from the originating request
    pub trace_id: Option<String>,
}

/// Message as it travels over the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Correlation key shared by a request and all of its results
    pub key: String,
    /// Type and trace metadata
    pub header: MessageHeader,
    /// Serialized payload
    pub payload: Vec<u8>,
}

/// Payload types which can be carried inside a [`KnownMessage`]
///
/// Usually implemented for a tagged union using the [`message_union!`](crate::message_union) macro.
pub trait MessageCodec: Sized {
    /// Name written into the type header
    fn message_type(&self) -> &'static str;

    /// Serializes the payload
    fn encode(&self) -> Result<Vec<u8>, CodecError>;

    /// Restores a payload from its type name and serialized form
    fn decode(message_type: &str, payload: &[u8]) -> Result<Self, CodecError>;
}

/// Message with a decoded, strongly typed payload
#[derive(Debug, Clone, PartialEq)]
pub struct KnownMessage<V> {
    /// Correlation key shared by a request and all of its results
    pub key: String,
    /// Distributed tracing identifier
    pub trace_id: Option<String>,
    /// Decoded payload
    pub value: V,
}

impl<V: MessageCodec> KnownMessage<V> {
    /// Creates a new message without a trace id
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            trace_id: None,
            value,
        }
    }

    /// Attaches a trace id
    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Creates a message carrying the same key and trace id as this one
    pub fn reply<R: MessageCodec>(&self, value: R) -> KnownMessage<R> {
        KnownMessage {
            key: self.key.clone(),
            trace_id: self.trace_id.clone(),
            value,
        }
    }

    /// Header derived from the payload type and trace id
    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            message_type: self.value.message_type().to_owned(),
            trace_id: self.trace_id.clone(),
        }
    }

    /// Converts the message into its wire format
    pub fn encode(&self) -> Result<RawMessage, CodecError> {
        Ok(RawMessage {
            key: self.key.clone(),
            header: self.header(),
            payload: self.value.encode()?,
        })
    }

    /// Parses a wire message, selecting the payload decoder by its type header
    pub fn decode(raw: &RawMessage) -> Result<Self, CodecError> {
        if raw.header.message_type.is_empty() {
            return Err(CodecError::MissingType);
        }

        Ok(Self {
            key: raw.key.clone(),
            trace_id: raw.header.trace_id.clone(),
            value: V::decode(&raw.header.message_type, &raw.payload)?,
        })
    }
}

/// Declares a tagged union of message payloads and implements [`MessageCodec`] for it
///
/// The type header of each variant is the variant name and payloads are encoded as JSON.
///
/// ```
/// # use serde::{Serialize, Deserialize};
/// # use library::message_union;
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Ping { pub sequence: u32 }
///
/// message_union! {
///     #[derive(Debug, Clone)]
///     pub enum Message {
///         Ping(Ping),
///     }
/// }
/// ```
#[macro_export]
macro_rules! message_union {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident($payload:ty)),+ $(,)? }) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                #[allow(missing_docs)]
                $variant($payload),
            )+
        }

        impl $crate::communication::event::MessageCodec for $name {
            fn message_type(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => stringify!($variant),)+
                }
            }

            fn encode(&self) -> Result<Vec<u8>, $crate::communication::event::CodecError> {
                match self {
                    $(Self::$variant(value) => $crate::communication::implementation::json::encode(stringify!($variant), value),)+
                }
            }

            fn decode(
                message_type: &str,
                payload: &[u8],
            ) -> Result<Self, $crate::communication::event::CodecError> {
                match message_type {
                    $(stringify!($variant) => $crate::communication::implementation::json::decode(message_type, payload).map(Self::$variant),)+
                    other => Err($crate::communication::event::CodecError::UnknownType(other.to_owned())),
                }
            }
        }

        $(
            impl From<$payload> for $name {
                fn from(value: $payload) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}
