pub mod jwks;
pub mod oidc;
pub mod rbac;
