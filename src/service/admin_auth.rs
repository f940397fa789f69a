use subtle::ConstantTimeEq;

/// Decides whether a presented admin credential is valid.
pub trait AdminAuthenticator: Send + Sync {
    fn verify(&self, presented: &str) -> bool;
}

/// Compares against one configured shared secret in constant time.
///
/// The secret is still a plaintext value from configuration: there is no
/// hashing and no attempt limiting. A configured empty secret, or none at
/// all, rejects every request.
pub struct SharedSecret {
    secret: Option<String>,
}

impl SharedSecret {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }
}

impl AdminAuthenticator for SharedSecret {
    fn verify(&self, presented: &str) -> bool {
        match &self.secret {
            Some(secret) => bool::from(presented.as_bytes().ct_eq(secret.as_bytes())),
            None => false,
        }
    }
}
