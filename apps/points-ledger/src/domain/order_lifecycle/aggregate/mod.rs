//! Order lifecycle aggregate.

mod loyalty_order;

pub use loyalty_order::LoyaltyOrder;
