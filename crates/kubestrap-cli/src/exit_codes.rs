//! Standard exit codes for CLI operations
//!
//! Each provisioning failure kind has its own code so wrapper scripts can
//! tell which step stopped the run.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - unreadable, unparsable or invalid configuration
pub const CONFIG_ERROR: i32 = 2;

/// Caller identity could not be resolved (credentials)
pub const IDENTITY_ERROR: i32 = 3;

/// Cluster keypair could not be generated
pub const KEY_ERROR: i32 = 4;

/// Bucket creation or upload failed
pub const ARTIFACT_ERROR: i32 = 5;

/// Database bootstrap image build failed
pub const IMAGE_BUILD_ERROR: i32 = 6;

/// Repository, registry login or image push failed
pub const IMAGE_PUSH_ERROR: i32 = 7;

/// Secret could not be written
pub const SECRET_ERROR: i32 = 8;

/// Requested stack capabilities are not allowed
pub const CAPABILITIES_ERROR: i32 = 9;

/// Stack submission was rejected
pub const STACK_ERROR: i32 = 10;
