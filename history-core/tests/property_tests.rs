//! Property-based tests for paging and asset invariants
//!
//! - Walking pages never repeats a record and covers the whole set
//! - Ascending and descending walks visit the same records
//! - Asset blobs decode back to the same logical asset

use history_core::testing::{self, TransactionFixture};
use history_core::{Asset, HistoryQ, Order, PageQuery, TransactionsQuery};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for (ledger, order) positions, deduplicated
fn positions_strategy() -> impl Strategy<Value = BTreeSet<(i32, i32)>> {
    prop::collection::btree_set((2i32..6, 1i32..8), 1..25)
}

/// Strategy for valid credit asset codes
fn code_strategy() -> impl Strategy<Value = String> {
    "[A-Z0-9]{1,12}"
}

async fn store_with(positions: &BTreeSet<(i32, i32)>) -> HistoryQ {
    let pool = testing::store(9).await.unwrap();
    for ledger in 2..6 {
        testing::insert_ledger(&pool, ledger, 1_700_000_000 + ledger as i64)
            .await
            .unwrap();
    }
    for (ledger, order) in positions {
        let tx = TransactionFixture::new(*ledger, *order, testing::address(1));
        testing::insert_transaction(&pool, &tx).await.unwrap();
    }
    HistoryQ::new(pool)
}

async fn walk(q: &HistoryQ, order: Order, limit: u64) -> Vec<i64> {
    let query = TransactionsQuery::new();
    let mut page = PageQuery::new("", order, limit, 200).unwrap();
    let mut seen = Vec::new();

    loop {
        let rows = q.transactions(&query, &page).await.unwrap();
        assert!(rows.len() as u64 <= limit);
        let Some(last) = rows.last() else { break };
        page = page.with_cursor(last.paging_token());
        seen.extend(rows.iter().map(|tx| tx.id));
    }
    seen
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Pages are disjoint and their union is the full set
    #[test]
    fn prop_paging_covers_without_repeats(
        positions in positions_strategy(),
        limit in 1u64..6,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let q = store_with(&positions).await;
            let expected: BTreeSet<i64> = positions
                .iter()
                .map(|(ledger, order)| TransactionFixture::new(*ledger, *order, "").id())
                .collect();

            let asc = walk(&q, Order::Asc, limit).await;
            let unique: BTreeSet<i64> = asc.iter().copied().collect();
            assert_eq!(unique.len(), asc.len(), "a record was repeated");
            assert_eq!(unique, expected);
            assert!(asc.windows(2).all(|w| w[0] < w[1]));

            let mut desc = walk(&q, Order::Desc, limit).await;
            assert!(desc.windows(2).all(|w| w[0] > w[1]));
            desc.reverse();
            assert_eq!(desc, asc);
        });
    }

    /// Encoded assets decode to the asset they were built from
    #[test]
    fn prop_asset_blob_identity(code in code_strategy(), seed in any::<u8>()) {
        let asset = Asset::credit(code, testing::address(seed)).unwrap();
        let blob = asset.to_xdr_base64().unwrap();
        prop_assert_eq!(Asset::from_xdr_base64(&blob).unwrap(), asset);
    }
}
