pub mod pool;
#[cfg(feature = "test-utils")]
pub mod test_utils;
