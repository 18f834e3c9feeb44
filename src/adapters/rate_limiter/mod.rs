//! Rate limiter implementations.

mod token_bucket;

pub use token_bucket::TokenBucketLimiter;
