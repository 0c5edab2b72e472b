//! Testing utilities for Quay applications.
//!
//! [`TestClient`] drives an application in-process, without starting a
//! server. The fixture functions build a fresh testing-mode application per
//! test and hand back a client that is released when it goes out of scope.

mod client;
mod fixture;

pub use client::{TestClient, TestRequestBuilder, TestResponse};
pub use fixture::{ClientFixture, FixtureError, IntoQuay, client, with_client};
