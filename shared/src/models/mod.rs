//! Domain models for the TBS trading workflow

mod activity;
mod document;
mod kebun;
mod order;
mod payment;
mod schedule;
mod stock;
mod user;
mod weighbridge;

pub use activity::*;
pub use document::*;
pub use kebun::*;
pub use order::*;
pub use payment::*;
pub use schedule::*;
pub use stock::*;
pub use user::*;
pub use weighbridge::*;
