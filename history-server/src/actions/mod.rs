//! Collection and single-record actions

mod offers;
mod operations;
mod transactions;

pub use offers::OffersAction;
pub use operations::OperationsAction;
pub use transactions::{show_transaction, TransactionsAction};
