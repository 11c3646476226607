//! Integration tests for vaultsync-graph
//!
//! Uses wiremock to simulate the Microsoft Graph API and verifies
//! end-to-end behavior of the client, delta listings, uploads, item
//! operations and token refresh.

mod common;

mod test_delta;
mod test_items;
