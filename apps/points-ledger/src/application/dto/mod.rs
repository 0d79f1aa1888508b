//! Data Transfer Objects (DTOs)
//!
//! Wire shapes for the HTTP boundary. Amounts travel as JSON numbers.

mod balance_dto;
mod order_dto;

pub use balance_dto::{BalanceDto, WithdrawRequestDto, WithdrawalDto};
pub use order_dto::OrderDto;
