//! Command implementations.
//!
//! Every command runs against a [`Context`] built once per invocation: a
//! session restored from disk, an API client authenticating with it, and a
//! cart synchronizer bound to both.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;

use std::io::BufRead;
use std::sync::Arc;

use thiserror::Error;

use shopfront_client::session::StoreError;
use shopfront_client::types::User;
use shopfront_client::{
    ApiClient, ApiError, AuthError, CartError, CartSynchronizer, ClientConfig, ConfigError,
    FileSessionStore, SessionState,
};

/// Errors surfaced to the user by a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Session storage: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not signed in. Run `shopfront login` first.")]
    NotSignedIn,

    #[error("This command requires an admin account")]
    NotAdmin,

    #[error("{0}")]
    Usage(String),
}

/// Everything a command needs.
pub struct Context {
    pub api: ApiClient,
    pub session: Arc<SessionState>,
    pub cart: CartSynchronizer<ApiClient>,
}

impl Context {
    /// Restore the persisted session and wire up the client.
    ///
    /// # Errors
    ///
    /// Returns an error if session storage is unreadable or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, CliError> {
        let session = Arc::new(SessionState::new(FileSessionStore::new(&config.session_dir)));
        if let Some(user) = session.restore()? {
            set_sentry_user(&user);
        }

        let api = ApiClient::new(&config.api, Arc::clone(&session))?;
        let cart = CartSynchronizer::new(api.clone(), Arc::clone(&session));

        Ok(Self { api, session, cart })
    }

    /// The signed-in user, or `NotSignedIn`.
    pub fn require_user(&self) -> Result<User, CliError> {
        self.session.user().ok_or(CliError::NotSignedIn)
    }

    /// Checked locally so a customer gets a clear message instead of a 403.
    pub fn require_admin(&self) -> Result<User, CliError> {
        let user = self.require_user()?;
        if self.session.is_admin() {
            Ok(user)
        } else {
            Err(CliError::NotAdmin)
        }
    }
}

/// `shopfront health`
#[allow(clippy::print_stdout)]
pub async fn health(ctx: &Context) -> Result<(), CliError> {
    ctx.api.health().await?;
    println!("Backend at {} is healthy", ctx.api.config().base_url);
    Ok(())
}

/// Use the given password or read one line from stdin.
pub(crate) fn read_password(password: Option<String>) -> Result<String, CliError> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint_prompt("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    if line.is_empty() {
        return Err(CliError::Usage("Password must not be empty".to_string()));
    }
    Ok(line)
}

#[allow(clippy::print_stderr)]
fn eprint_prompt(prompt: &str) {
    eprint!("{prompt}");
}

/// Associate subsequent Sentry events with the signed-in user.
pub(crate) fn set_sentry_user(user: &User) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.id.to_string()),
            email: Some(user.email.to_string()),
            ..Default::default()
        }));
    });
}

/// Stop associating events with a user.
pub(crate) fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
