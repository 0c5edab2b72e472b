//! Shared fixture for the notes API test suite.

use quay::observability::TracingConfig;
use quay::testing::TestClient;

/// A client on a freshly built, testing-mode notes application.
///
/// Dropping the client at the end of the test releases it.
pub fn client() -> TestClient {
    let _ = TracingConfig::for_tests().try_init();
    quay::testing::client(quay_demo::create_app).expect("notes application failed to start")
}
