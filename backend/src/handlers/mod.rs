//! HTTP handlers
//!
//! Handlers extract the caller and the request, build the service from the
//! shared state and hand the result back as JSON.

mod activity;
mod auth;
mod document;
mod health;
mod order;
mod payment;
mod reporting;
mod schedule;
mod stock;
mod weighbridge;

pub use activity::*;
pub use auth::*;
pub use document::*;
pub use health::*;
pub use order::*;
pub use payment::*;
pub use reporting::*;
pub use schedule::*;
pub use stock::*;
pub use weighbridge::*;

use serde::Deserialize;
use shared::Pagination;

use crate::config::BusinessConfig;

/// `page` / `per_page` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self, business: &BusinessConfig) -> Pagination {
        Pagination::from_query(
            self.page,
            self.per_page,
            business.default_page_size,
            business.max_page_size,
        )
    }
}
