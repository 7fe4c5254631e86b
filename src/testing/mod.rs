//! Testing utilities.
//!
//! - [`Scenario`]: requests against the router without a socket
//! - [`TestWorld`]: a seeded in-memory context with token minting and an
//!   ephemeral-port server for client tests
//!
//! ```rust,ignore
//! use eshtarek::testing::TestWorld;
//!
//! #[tokio::test]
//! async fn plans_are_public() {
//!     let world = TestWorld::new().await;
//!     world.get("/api/plans/").execute().await.assert_ok();
//! }
//! ```

mod scenario;
mod world;

pub use scenario::{Scenario, ScenarioAssert, delete, get, post, put};
pub use world::{TEST_ISSUER, TEST_JWT_SECRET, TEST_PASSWORD, TestServer, TestWorld};
