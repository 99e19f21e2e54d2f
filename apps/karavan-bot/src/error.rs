use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds surfaced by the panel client and the services built on it.
/// Everything user-visible maps onto one of these; the chat layer turns each
/// into exactly one message.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure, timeout or a malformed response from the panel.
    #[error("panel unreachable: {0}")]
    RemoteUnavailable(String),

    /// The panel rejected the stored credentials. Not retried.
    #[error("panel login failed")]
    AuthFailed,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The plan has no inbounds linked, so there is nowhere to provision.
    #[error("plan has no server assigned")]
    NoServerAssigned,

    /// Every add-client attempt across the plan's inbounds failed.
    #[error("provisioning failed on all servers")]
    ProvisioningFailed,

    /// The payment already left the pending state.
    #[error("payment already decided")]
    AlreadyDecided,

    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        Error::RemoteUnavailable(err.to_string())
    }
}
