//! Token Generator
//!
//! Random source for new bootstrap tokens.

use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::RandomSourceError;
use crate::types::{TOKEN_CHARSET, TOKEN_DELIMITER, TOKEN_ID_LENGTH, TOKEN_SECRET_LENGTH};

/// Token generator interface (for dependency injection).
///
/// Implementations return candidate token text. The manager parses every candidate
/// against the token grammar before using it.
pub trait TokenGenerator: Send + Sync {
    /// Draw a candidate `<id>.<secret>` token.
    fn generate(&self) -> Result<String, RandomSourceError>;
}

/// Default generator drawing from the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenGenerator;

impl DefaultTokenGenerator {
    /// Create new token generator.
    pub fn new() -> Self {
        Self
    }

    fn random_string(&self, length: usize) -> Result<String, RandomSourceError> {
        // Bytes at or above `limit` are rejected so every character is equally likely.
        let limit = 256 - (256 % TOKEN_CHARSET.len());
        let mut out = String::with_capacity(length);
        let mut buf = [0u8; 32];

        while out.len() < length {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| RandomSourceError {
                    message: e.to_string(),
                })?;

            for byte in buf {
                if out.len() == length {
                    break;
                }
                let index = byte as usize;
                if index < limit {
                    out.push(TOKEN_CHARSET[index % TOKEN_CHARSET.len()] as char);
                }
            }
        }

        Ok(out)
    }
}

impl TokenGenerator for DefaultTokenGenerator {
    fn generate(&self) -> Result<String, RandomSourceError> {
        let id = self.random_string(TOKEN_ID_LENGTH)?;
        let secret = self.random_string(TOKEN_SECRET_LENGTH)?;
        Ok(format!("{}{}{}", id, TOKEN_DELIMITER, secret))
    }
}

/// Mock token generator for testing.
///
/// Returns scripted draws in order, then falls back to [`DefaultTokenGenerator`].
#[derive(Default)]
pub struct MockTokenGenerator {
    scripted: Mutex<VecDeque<Result<String, RandomSourceError>>>,
    draw_count: Mutex<usize>,
}

impl MockTokenGenerator {
    /// Create new mock token generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a token text to return from the next unscripted draw.
    pub fn push_token(&self, token: impl Into<String>) -> &Self {
        self.scripted.lock().unwrap().push_back(Ok(token.into()));
        self
    }

    /// Queue a random source failure.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Err(RandomSourceError {
                message: message.into(),
            }));
        self
    }

    /// Number of draws made so far.
    pub fn draw_count(&self) -> usize {
        *self.draw_count.lock().unwrap()
    }
}

impl TokenGenerator for MockTokenGenerator {
    fn generate(&self) -> Result<String, RandomSourceError> {
        *self.draw_count.lock().unwrap() += 1;

        match self.scripted.lock().unwrap().pop_front() {
            Some(draw) => draw,
            None => DefaultTokenGenerator.generate(),
        }
    }
}

/// Create the default token generator.
pub fn create_token_generator() -> DefaultTokenGenerator {
    DefaultTokenGenerator::new()
}

/// Create mock token generator for testing.
pub fn create_mock_token_generator() -> MockTokenGenerator {
    MockTokenGenerator::new()
}
