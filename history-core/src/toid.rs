//! Total order ids
//!
//! Transactions and operations are keyed by a single i64 packing
//! (ledger sequence, transaction order, operation order). Numeric order of the
//! packed id equals occurrence order, so it doubles as the paging cursor.
//!
//! ```text
//!  63          32 31               12 11         0
//! ┌──────────────┬───────────────────┬────────────┐
//! │ ledger (32)  │ transaction (20)  │ operation  │
//! └──────────────┴───────────────────┴────────────┘
//! ```

use crate::error::{Error, Result};
use std::fmt;

const LEDGER_SHIFT: u32 = 32;
const TRANSACTION_SHIFT: u32 = 12;
const TRANSACTION_MASK: i64 = (1 << 20) - 1;
const OPERATION_MASK: i64 = (1 << 12) - 1;

/// Decomposed total order id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TotalOrderId {
    /// Ledger sequence
    pub ledger_sequence: i32,
    /// Application order of the transaction within its ledger (1-based)
    pub transaction_order: i32,
    /// Application order of the operation within its transaction (1-based)
    pub operation_order: i32,
}

impl TotalOrderId {
    /// Build and range-check an id
    pub fn new(ledger_sequence: i32, transaction_order: i32, operation_order: i32) -> Result<Self> {
        if ledger_sequence < 0 {
            return Err(Error::InvalidCursor(format!(
                "ledger sequence {} is negative",
                ledger_sequence
            )));
        }
        if !(0..=TRANSACTION_MASK as i32).contains(&transaction_order) {
            return Err(Error::InvalidCursor(format!(
                "transaction order {} out of range",
                transaction_order
            )));
        }
        if !(0..=OPERATION_MASK as i32).contains(&operation_order) {
            return Err(Error::InvalidCursor(format!(
                "operation order {} out of range",
                operation_order
            )));
        }
        Ok(Self {
            ledger_sequence,
            transaction_order,
            operation_order,
        })
    }

    /// Id of the first position in `ledger_sequence`
    pub fn ledger_start(ledger_sequence: i32) -> Self {
        Self {
            ledger_sequence,
            transaction_order: 0,
            operation_order: 0,
        }
    }

    /// Pack into the i64 stored in the id columns
    pub fn to_i64(self) -> i64 {
        ((self.ledger_sequence as i64) << LEDGER_SHIFT)
            | ((self.transaction_order as i64 & TRANSACTION_MASK) << TRANSACTION_SHIFT)
            | (self.operation_order as i64 & OPERATION_MASK)
    }

    /// Unpack a stored id
    pub fn parse(id: i64) -> Result<Self> {
        if id < 0 {
            return Err(Error::InvalidCursor(format!("id {} is negative", id)));
        }
        Ok(Self {
            ledger_sequence: (id >> LEDGER_SHIFT) as i32,
            transaction_order: ((id >> TRANSACTION_SHIFT) & TRANSACTION_MASK) as i32,
            operation_order: (id & OPERATION_MASK) as i32,
        })
    }
}

impl fmt::Display for TotalOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_i64())
    }
}

/// Half-open id range `[start, end)` covering every record of one ledger
pub fn ledger_range(ledger_sequence: i32) -> (i64, i64) {
    let start = TotalOrderId::ledger_start(ledger_sequence).to_i64();
    let end = TotalOrderId::ledger_start(ledger_sequence.saturating_add(1)).to_i64();
    (start, end)
}

/// Cursor positioned after every record of `ledger_sequence`
pub fn after_ledger(ledger_sequence: i32) -> i64 {
    ledger_range(ledger_sequence).1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let id = TotalOrderId::new(40, 3, 2).unwrap();
        assert_eq!(id.to_i64(), (40i64 << 32) | (3 << 12) | 2);
        assert_eq!(TotalOrderId::parse(id.to_i64()).unwrap(), id);
    }

    #[test]
    fn test_order_matches_occurrence() {
        let a = TotalOrderId::new(5, 1, 4095).unwrap().to_i64();
        let b = TotalOrderId::new(5, 2, 0).unwrap().to_i64();
        let c = TotalOrderId::new(6, 0, 0).unwrap().to_i64();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_ledger_range() {
        let (start, end) = ledger_range(10);
        assert_eq!(start, 10i64 << 32);
        assert_eq!(end, 11i64 << 32);
        assert_eq!(after_ledger(10), end);
    }

    #[test]
    fn test_rejects_out_of_range_parts() {
        assert!(TotalOrderId::new(-1, 0, 0).is_err());
        assert!(TotalOrderId::new(1, 1 << 20, 0).is_err());
        assert!(TotalOrderId::new(1, 0, 4096).is_err());
        assert!(TotalOrderId::parse(-5).is_err());
    }
}
