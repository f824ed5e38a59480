//! Shared test helpers used by every crate's unit and integration tests.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Install a `tracing_subscriber` that honors `RUST_LOG`, once per process.
///
/// Call at the top of any test that wants to see log output on failure.
pub fn maybe_start_logging() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Assert that `$e` matches an error variant, printing both sides on
/// mismatch. Mirrors the `assert_matches` crate's ergonomics without an
/// extra macro-only dependency for this one use.
#[macro_export]
macro_rules! assert_error {
    ($e:expr, $variant:pat) => {
        match $e {
            $variant => {}
            other => panic!(
                "expected {} to match {}, got {:?}",
                stringify!($e),
                stringify!($variant),
                other
            ),
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn assert_error_matches() {
        #[derive(Debug)]
        enum E {
            A,
            B(i32),
        }
        let e = E::B(4);
        assert_error!(e, E::B(4));
    }
}
