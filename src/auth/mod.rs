//! Bearer token handling. Tokens are issued by the institution's identity
//! service; this server only validates them and reads the username.

pub mod jwt;
pub mod middleware;
pub mod model;


pub use jwt::*;
pub use middleware::*;
pub use model::*;
