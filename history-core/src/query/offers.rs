use super::Select;
use crate::asset::{Asset, AssetCodec};
use crate::db::CoreQ;
use crate::error::Result;
use crate::paging::PageQuery;
use crate::schema::SchemaVersionSource;
use crate::types::{Offer, Price};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeSet;
use tracing::debug;

fn decode_offer(codec: &AssetCodec, row: &SqliteRow) -> Result<Offer> {
    Ok(Offer {
        offer_id: row.try_get("offerid")?,
        seller_id: row.try_get("sellerid")?,
        selling: codec.decode(row, "selling")?,
        buying: codec.decode(row, "buying")?,
        amount: row.try_get("amount")?,
        price: Price {
            n: row.try_get("pricen")?,
            d: row.try_get("priced")?,
        },
        flags: row.try_get("flags")?,
        last_modified_ledger: row.try_get("lastmodified")?,
    })
}

impl CoreQ {
    /// Buying assets with at least one offer selling `selling`
    ///
    /// This is the adjacency set used by offer-based path finding. The result
    /// is deduplicated by logical asset identity and sorted.
    pub async fn connected_assets(&self, selling: &Asset) -> Result<Vec<Asset>> {
        let codec = self.asset_codec().await?;
        let columns = codec.columns("buying").join(", ");

        let mut select = Select::new(format!("SELECT {} FROM offers", columns));
        codec.push_filter(select.and_where(), "selling", selling)?;
        select.push(format!(" GROUP BY {}", columns));

        let mut builder = select.into_builder();
        debug!(
            sql = builder.sql(),
            schema_version = codec.schema_version(),
            "Selecting connected assets"
        );
        let rows = builder.build().fetch_all(&self.pool).await?;

        let assets = rows
            .iter()
            .map(|row| codec.decode(row, "buying"))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(assets.into_iter().collect())
    }

    /// One page of `seller`'s offers, ordered by offer id
    pub async fn offers_by_address(&self, seller: &str, page: &PageQuery) -> Result<Vec<Offer>> {
        let codec = self.asset_codec().await?;

        let mut columns = vec![
            "sellerid".to_string(),
            "offerid".to_string(),
            "amount".to_string(),
            "pricen".to_string(),
            "priced".to_string(),
            "flags".to_string(),
            "lastmodified".to_string(),
        ];
        columns.extend(codec.columns("selling"));
        columns.extend(codec.columns("buying"));

        let mut select = Select::new(format!("SELECT {} FROM offers", columns.join(", ")));
        select
            .and_where()
            .push("sellerid = ")
            .push_bind(seller.to_string());
        page.apply(&mut select, "offerid")?;

        let mut builder = select.into_builder();
        debug!(
            sql = builder.sql(),
            schema_version = codec.schema_version(),
            "Selecting offers"
        );
        let rows = builder.build().fetch_all(&self.pool).await?;

        rows.iter().map(|row| decode_offer(&codec, row)).collect()
    }
}
