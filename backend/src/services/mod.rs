//! Business logic services for the TBS trading platform

pub mod activity;
pub mod auth;
pub mod document;
pub mod order;
pub mod payment;
pub mod reporting;
pub mod schedule;
pub mod sequence;
pub mod stock;
pub mod weighbridge;

pub use activity::ActivityService;
pub use auth::AuthService;
pub use document::DocumentService;
pub use order::OrderService;
pub use payment::PaymentService;
pub use reporting::ReportingService;
pub use schedule::ScheduleService;
pub use stock::StockService;
pub use weighbridge::WeighbridgeService;
