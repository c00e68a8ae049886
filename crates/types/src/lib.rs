pub mod credentials;
pub mod state;

pub use credentials::*;
pub use state::*;

/// Name of the provider session cookie carried in every slot's cookie map.
pub const SESSION_COOKIE: &str = "BOXTOPLAY_SESSION";

/// Substring expected in well-formed FTP hostnames handed out by the provider.
pub const PROVIDER_DOMAIN_MARKER: &str = "boxtoplay";

/// Remote directory holding the persistent world data on every server.
pub const WORLD_DIR: &str = "/world";
