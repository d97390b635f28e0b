/// Authentication module
///
/// Password hashing, `Authorization` header parsing, access token
/// minting/validation, refresh token lifecycle and the session service
/// that ties them together.

mod claims;
mod header;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use claims::{Claims, ISSUER};
pub use header::{api_key, bearer_token, parse_authorization, Credential, Scheme};
pub use jwt::{mint_access_token, mint_access_token_at, validate_access_token, validate_access_token_at};
pub use password::{hash_password, verify_password};
pub use refresh_token::{generate_refresh_token, RefreshToken, RefreshTokenState, RefreshTokenStore};
pub use session::{
    CredentialsRequest, LoginRequest, LoginResponse, SessionService, UpgradeEvent,
    UpgradeEventData, USER_UPGRADED_EVENT,
};
