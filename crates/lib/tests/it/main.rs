/*! Integration tests for gitswitch.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - switcher: End-to-end switches through the Switcher with on-disk state
 * - token: Token vault persistence and validation against a fake platform API
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("gitswitch=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod helpers;
mod switcher;
mod token;
