//! medichat - A streaming client for the MediBot medical assistant.
//!
//! This library provides the chat session, the server-sent event transport
//! and an offline asset cache, abstracted from any specific UI. Rendering
//! goes through the [`ChatView`] trait.
//!
//! # Example
//!
//! ```no_run
//! use medichat::{ChatConfig, ChatSession, ExchangeOutcome, HttpTransport, NoView};
//!
//! # async fn example() -> medichat::Result<()> {
//! let config = ChatConfig::new().with_server_url("http://127.0.0.1:8080");
//! let transport = HttpTransport::new(config.clone());
//! let mut session = ChatSession::new(config, transport, NoView);
//! session.start();
//!
//! if let ExchangeOutcome::Completed(answer) = session.send_message("What causes a fever?").await? {
//!     println!("{}", answer.content);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod chat;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod exchange;
pub mod input;
pub mod markup;
pub mod message;
pub mod session;
pub mod sse;
pub mod transport;
pub mod view;

// Re-export main types for convenience
pub use cache::{
    AssetManifest, AssetRequest, AssetResponse, CacheStorage, DiskStorage, HttpNetwork,
    InstallReport, MemoryStorage, Network, OfflineCache, RequestMode,
};
pub use chat::{ChatSession, WELCOME_MESSAGE};
pub use config::{AppConfig, CacheConfig, ChatConfig};
pub use error::{Error, Result};
pub use event::ServerEvent;
pub use exchange::{ExchangeOutcome, ExchangeState};
pub use input::{CharCounter, CounterLevel, MAX_MESSAGE_CHARS, ValidationError, validate_message};
pub use markup::{escape_html, format_time, to_markup};
pub use message::{CredibilityTier, Message, Role, Source};
pub use session::SessionId;
pub use sse::{SseCodec, SseFrame};
pub use transport::{ChatRequest, EventTransport, FrameStream, HttpTransport};
pub use view::{ChatView, NoView, RecordingView, ToastLevel, ViewEvent};
