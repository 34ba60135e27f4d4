//! Blocking Bassa client.
//!
//! # Design
//! `Bassa` glues the pure request builder to a `Transport` and runs every
//! request through the same retry loop. The client is immutable once built:
//! credentials travel in a caller-held `Session`, and a different retry
//! policy is obtained with [`Bassa::with_policy`], which borrows the
//! transport instead of changing the client.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::address::BaseUrl;
use crate::api::BassaApi;
use crate::config::ClientConfig;
use crate::error::BassaError;
use crate::http::{HttpRequest, HttpResponse};
use crate::retry::{send_with_retry, RetryPolicy};
use crate::session::{Session, DEFAULT_SERVER_KEY};
use crate::transport::{Transport, UreqTransport};
use crate::types::{AuthLevel, NewUser, UserUpdate};

/// Client for a Bassa download server.
#[derive(Debug, Clone)]
pub struct Bassa<T> {
    api: BassaApi,
    transport: T,
    policy: RetryPolicy,
    server_key: String,
}

impl Bassa<UreqTransport> {
    /// Build a client with a `ureq` transport from configuration.
    pub fn connect(config: &ClientConfig) -> Result<Self, BassaError> {
        config.validate()?;
        let base_url = BaseUrl::parse(&config.api_url)?;
        let policy = config.retry.policy()?;
        debug!(
            api_url = %base_url,
            timeout_secs = config.timeout_secs,
            max_attempts = policy.max_attempts(),
            "connecting Bassa client"
        );
        Ok(Self {
            api: BassaApi::new(base_url),
            transport: UreqTransport::new(config.timeout()),
            policy,
            server_key: config.server_key.clone(),
        })
    }
}

impl<T: Transport> Bassa<T> {
    /// Validate `base_url` and build a client with the default retry policy.
    pub fn new(base_url: &str, transport: T) -> Result<Self, BassaError> {
        Ok(Self {
            api: BassaApi::new(BaseUrl::parse(base_url)?),
            transport,
            policy: RetryPolicy::default(),
            server_key: DEFAULT_SERVER_KEY.to_string(),
        })
    }

    /// Replace the retry policy used by every call.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the server key given to sessions created by [`Bassa::login`].
    #[must_use]
    pub fn server_key(mut self, key: impl Into<String>) -> Self {
        self.server_key = key.into();
        self
    }

    /// A view of this client that sends with `policy`, sharing the transport.
    pub fn with_policy(&self, policy: RetryPolicy) -> Bassa<&T> {
        Bassa {
            api: self.api.clone(),
            transport: &self.transport,
            policy,
            server_key: self.server_key.clone(),
        }
    }

    pub fn api(&self) -> &BassaApi {
        &self.api
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` under this client's retry policy and return the first
    /// successful response.
    pub fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, BassaError> {
        send_with_retry(&self.transport, &self.policy, request)
    }

    fn read(&self, request: Result<HttpRequest, BassaError>) -> Result<Value, BassaError> {
        let response = self.execute(&request?)?;
        self.api.parse_json(&response)
    }

    fn write(&self, request: Result<HttpRequest, BassaError>) -> Result<(), BassaError> {
        self.execute(&request?)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Log in and return a session carrying the server-issued token.
    ///
    /// Sent exactly once: any status other than 200 is a rejection.
    #[instrument(skip(self, password))]
    pub fn login(&self, user_name: &str, password: &str) -> Result<Session, BassaError> {
        let request = self.api.build_login(user_name, password)?;
        let response = self.transport.send(&request)?;
        let session = self.api.parse_login(&response)?;
        Ok(session.server_key(self.server_key.clone()))
    }

    pub fn add_regular_user(&self, session: &Session, user: &NewUser) -> Result<(), BassaError> {
        self.write(self.api.build_add_regular_user(session, user))
    }

    pub fn add_user(
        &self,
        session: &Session,
        user: &NewUser,
        auth_level: AuthLevel,
    ) -> Result<(), BassaError> {
        self.write(self.api.build_add_user(session, user, auth_level))
    }

    pub fn remove_user(&self, session: &Session, user_name: &str) -> Result<(), BassaError> {
        self.write(self.api.build_remove_user(session, user_name))
    }

    pub fn update_user(
        &self,
        session: &Session,
        user_name: &str,
        update: &UserUpdate,
    ) -> Result<(), BassaError> {
        self.write(self.api.build_update_user(session, user_name, update))
    }

    /// The account behind `session`.
    pub fn get_user(&self, session: &Session) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_get_user(session)))
    }

    pub fn user_signup_requests(&self, session: &Session) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_user_signup_requests(session)))
    }

    pub fn approve_user(&self, session: &Session, user_name: &str) -> Result<(), BassaError> {
        self.write(self.api.build_approve_user(session, user_name))
    }

    pub fn blocked_users(&self, session: &Session) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_blocked_users(session)))
    }

    pub fn block_user(&self, session: &Session, user_name: &str) -> Result<(), BassaError> {
        self.write(self.api.build_block_user(session, user_name))
    }

    pub fn unblock_user(&self, session: &Session, user_name: &str) -> Result<(), BassaError> {
        self.write(self.api.build_unblock_user(session, user_name))
    }

    pub fn user_downloads(&self, session: &Session, limit: u32) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_user_downloads(session, limit)))
    }

    /// The ten users with the largest download volume.
    pub fn heaviest_users(&self, session: &Session) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_heaviest_users(session)))
    }

    // -----------------------------------------------------------------------
    // Downloads
    // -----------------------------------------------------------------------

    pub fn start_download(&self, session: &Session) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_start_download(session)))
    }

    pub fn kill_download(&self, session: &Session) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_kill_download(session)))
    }

    pub fn add_download(&self, session: &Session, link: &str) -> Result<(), BassaError> {
        self.write(self.api.build_add_download(session, link))
    }

    pub fn remove_download(&self, session: &Session, id: u64) -> Result<(), BassaError> {
        self.write(Ok(self.api.build_remove_download(session, id)))
    }

    pub fn rate_download(&self, session: &Session, id: u64, rate: u32) -> Result<(), BassaError> {
        self.write(Ok(self.api.build_rate_download(session, id, rate)))
    }

    pub fn downloads(&self, session: &Session, limit: u32) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_downloads(session, limit)))
    }

    pub fn download(&self, session: &Session, id: u64) -> Result<Value, BassaError> {
        self.read(Ok(self.api.build_download(session, id)))
    }

    // -----------------------------------------------------------------------
    // Files
    // -----------------------------------------------------------------------

    pub fn start_compression<S: AsRef<str>>(
        &self,
        session: &Session,
        gids: &[S],
    ) -> Result<(), BassaError> {
        self.write(self.api.build_start_compression(session, gids))
    }

    pub fn compression_progress(&self, session: &Session, id: &str) -> Result<Value, BassaError> {
        self.read(self.api.build_compression_progress(session, id))
    }

    pub fn file(&self, session: &Session, gid: &str) -> Result<Value, BassaError> {
        self.read(self.api.build_file(session, gid))
    }
}
