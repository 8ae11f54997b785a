use crate::action::CollectionAction;
use crate::params::Params;
use crate::state::AppState;
use async_trait::async_trait;
use history_core::config::HistoryConfig;
use history_core::resource::{LinkBuilder, OfferResource};
use history_core::{Error, LedgerCache, Offer, PageQuery, Result};

/// `GET /accounts/{account_id}/offers`
///
/// Offers page on the offer id, not on total-order ids, and render without
/// ledger data.
#[derive(Debug, Clone, Default)]
pub struct OffersAction {
    seller: String,
}

#[async_trait]
impl CollectionAction for OffersAction {
    type Row = Offer;
    type Resource = OfferResource;

    fn name(&self) -> &'static str {
        "offers_by_account"
    }

    fn load_params(&mut self, params: &Params, config: &HistoryConfig) -> Result<PageQuery> {
        self.seller = params
            .account_id("account_id")?
            .ok_or_else(|| Error::invalid_field("account_id", "is required"))?;
        params.page(config)
    }

    fn orders_by_toid(&self) -> bool {
        false
    }

    fn path(&self) -> String {
        format!("/accounts/{}/offers", self.seller)
    }

    async fn load_records(&self, state: &AppState, page: &PageQuery) -> Result<Vec<Offer>> {
        state.core.offers_by_address(&self.seller, page).await
    }

    fn ledger_of(&self, _row: &Offer) -> Option<i32> {
        None
    }

    fn render(
        &self,
        row: &Offer,
        _ledgers: &LedgerCache,
        links: &LinkBuilder,
    ) -> Result<OfferResource> {
        Ok(OfferResource::new(row, links))
    }
}
