pub mod access;
pub mod auth;
pub mod catalog;
pub mod fanout;
pub mod lifecycle;
pub mod players;
pub mod realtime;
pub mod telegram;
pub mod upload;

pub use auth::AuthService;
pub use catalog::CatalogService;
pub use fanout::Fanout;
pub use lifecycle::TransactionLifecycle;
pub use players::PlayerService;
pub use realtime::RealtimeHub;
pub use telegram::TelegramClient;
pub use upload::LocalUploader;
