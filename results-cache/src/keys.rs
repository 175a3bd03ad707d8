use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

/// Source of candidate cache keys
pub trait KeySource: Send + Sync + 'static {
    fn next_key(&self) -> String;
}

/// Generates 128-bit random keys, base64url encoded
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomKeySource;

impl KeySource for RandomKeySource {
    fn next_key(&self) -> String {
        generate_key()
    }
}

/// Generate a URL-safe key from 16 random bytes (22 characters, unpadded)
pub fn generate_key() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}
