use serde::{Deserialize, Serialize};

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub username: String,
    pub exp: usize,
    pub iat: usize,
    pub token_type: String, // only "access" is accepted
}

pub const ACCESS_TOKEN_TYPE: &str = "access";
