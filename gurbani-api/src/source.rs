//! Abstraction over "fetch a shabad by id".
//!
//! Backup restore and bookmark imports only need canonical shabad content.
//! They are written against [`ShabadSource`] so they can run against
//! [`GurbaniClient`] in production and an in-memory source in tests
//! (see [`crate::test_util::StaticShabads`]).

use std::future::Future;

use crate::{Result, client::GurbaniClient, shabad::Shabad};

/// Something that can fetch a shabad by numeric id.
/// Shared by reference across await points, hence `Sync`.
pub trait ShabadSource: Sync {
    /// Fetches the shabad. Errors follow [`GurbaniError`](crate::error::GurbaniError):
    /// transport failures, non-success status, or undecodable responses.
    fn fetch_shabad(&self, shabad_id: u32) -> impl Future<Output = Result<Shabad>> + Send;
}

impl ShabadSource for GurbaniClient {
    async fn fetch_shabad(&self, shabad_id: u32) -> Result<Shabad> {
        self.shabad(shabad_id).get().await
    }
}

impl<T: ShabadSource> ShabadSource for &T {
    fn fetch_shabad(&self, shabad_id: u32) -> impl Future<Output = Result<Shabad>> + Send {
        (**self).fetch_shabad(shabad_id)
    }
}

impl<T: ShabadSource + Send> ShabadSource for std::sync::Arc<T> {
    fn fetch_shabad(&self, shabad_id: u32) -> impl Future<Output = Result<Shabad>> + Send {
        (**self).fetch_shabad(shabad_id)
    }
}
