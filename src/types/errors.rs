use std::fmt;

// === StoreError ===

/// Errors surfaced by bookmark store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Input was rejected before any remote call was made.
    Validation(String),
    /// Loading the bookmark list from the data service failed.
    Fetch(String),
    /// A create or delete against the data service failed.
    Persistence(String),
    /// The realtime channel could not be established.
    Channel(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Validation(msg) => write!(f, "Validation error: {}", msg),
            StoreError::Fetch(msg) => write!(f, "Fetch failed: {}", msg),
            StoreError::Persistence(msg) => write!(f, "Persistence failed: {}", msg),
            StoreError::Channel(msg) => write!(f, "Channel error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === AuthError ===

/// Errors related to authentication operations.
#[derive(Debug)]
pub enum AuthError {
    /// Authentication with the auth service failed.
    AuthFailed(String),
    /// The access token has expired and could not be refreshed.
    TokenExpired,
    /// A network error occurred while communicating with the auth service.
    NetworkError(String),
    /// The auth service returned an error.
    ApiError(String),
    /// No user is currently authenticated.
    NotAuthenticated,
    /// The access token could not be decoded.
    InvalidToken(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::AuthFailed(msg) => write!(f, "Authentication failed: {}", msg),
            AuthError::TokenExpired => write!(f, "Access token expired"),
            AuthError::NetworkError(msg) => write!(f, "Auth network error: {}", msg),
            AuthError::ApiError(msg) => write!(f, "Auth API error: {}", msg),
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
            AuthError::InvalidToken(msg) => write!(f, "Invalid access token: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

// === ApiError ===

/// Errors related to remote table access.
#[derive(Debug)]
pub enum ApiError {
    /// A network error occurred while calling the data service.
    NetworkError(String),
    /// The data service rejected the request with a non-success status.
    Status(u16, String),
    /// Failed to decode the response body.
    DecodeError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NetworkError(msg) => write!(f, "Data network error: {}", msg),
            ApiError::Status(status, msg) => {
                write!(f, "Data service error (status {}): {}", status, msg)
            }
            ApiError::DecodeError(msg) => write!(f, "Data decode error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

// === RealtimeError ===

/// Errors related to the realtime change feed.
#[derive(Debug)]
pub enum RealtimeError {
    /// Establishing the websocket connection failed.
    ConnectFailed(String),
    /// The channel join was rejected by the server.
    JoinRejected(String),
    /// An unexpected or malformed protocol message was received.
    ProtocolError(String),
}

impl fmt::Display for RealtimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RealtimeError::ConnectFailed(msg) => {
                write!(f, "Realtime connect failed: {}", msg)
            }
            RealtimeError::JoinRejected(msg) => {
                write!(f, "Realtime join rejected: {}", msg)
            }
            RealtimeError::ProtocolError(msg) => {
                write!(f, "Realtime protocol error: {}", msg)
            }
        }
    }
}

impl std::error::Error for RealtimeError {}

// === CryptoError ===

/// Errors related to cryptographic operations.
#[derive(Debug)]
pub enum CryptoError {
    /// Failed to derive an encryption key.
    KeyDerivation(String),
    /// Encryption operation failed.
    Encryption(String),
    /// Decryption operation failed.
    Decryption(String),
    /// Failed to generate random bytes.
    RandomGeneration(String),
    /// The provided key is invalid.
    InvalidKey(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::KeyDerivation(msg) => write!(f, "Key derivation failed: {}", msg),
            CryptoError::Encryption(msg) => write!(f, "Encryption failed: {}", msg),
            CryptoError::Decryption(msg) => write!(f, "Decryption failed: {}", msg),
            CryptoError::RandomGeneration(msg) => {
                write!(f, "Random generation failed: {}", msg)
            }
            CryptoError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

// === SessionError ===

/// Errors related to the persisted session vault.
#[derive(Debug)]
pub enum SessionError {
    /// Failed to serialize or deserialize session data.
    SerializationError(String),
    /// Database operation failed.
    DatabaseError(String),
    /// Cryptographic operation failed during session encryption/decryption.
    CryptoError(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SerializationError(msg) => {
                write!(f, "Session serialization error: {}", msg)
            }
            SessionError::DatabaseError(msg) => {
                write!(f, "Session database error: {}", msg)
            }
            SessionError::CryptoError(msg) => {
                write!(f, "Session crypto error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SessionError {}

// === ConfigError ===

/// Errors related to loading configuration from the environment.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is missing or empty.
    MissingVar(String),
    /// A configuration value could not be parsed.
    InvalidValue(String, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "Missing environment variable: {}", name)
            }
            ConfigError::InvalidValue(name, msg) => {
                write!(f, "Invalid value for {}: {}", name, msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
