//! Core Infrastructure
//!
//! Injectable collaborators: the random source for new tokens and the time source
//! for expiration math.

pub mod clock;
pub mod generator;

pub use clock::{Clock, MockClock, SystemClock};
pub use generator::{
    create_mock_token_generator, create_token_generator, DefaultTokenGenerator,
    MockTokenGenerator, TokenGenerator,
};
