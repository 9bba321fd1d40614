//! Commission service: turns sale events into commission ledger entries.

use crate::db::Repository;
use crate::domain::{
    AppliedRate, CategoryId, CommissionEntry, EntryStatus, Money, OrderId, ProductId,
    SummaryPeriod, VendorId,
};
use crate::engine::{compute_commission, RuleResolver};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// One order line item from the order subsystem. Category ancestors come
/// from the catalog's ancestor lookup, nearest first.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub order_item_id: String,
    pub vendor: VendorId,
    pub product: ProductId,
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub category_ancestors: Vec<CategoryId>,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Error)]
pub enum SaleEventError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub struct CommissionService {
    repo: Arc<Repository>,
    resolver: RuleResolver,
}

impl CommissionService {
    pub fn new(repo: Arc<Repository>, default_percentage: Money) -> Self {
        CommissionService {
            repo,
            resolver: RuleResolver::new(default_percentage),
        }
    }

    /// Record a sale's line items as pending commission entries.
    ///
    /// Resolution and computation happen for every item before anything
    /// is written, so a bad item aborts the whole sale event with no
    /// partial entries. Re-submitting the same line items is a no-op via
    /// the entry key.
    pub async fn record_sale(
        &self,
        order_id: &OrderId,
        items: &[SaleItem],
        as_of: DateTime<Utc>,
    ) -> Result<Vec<CommissionEntry>, SaleEventError> {
        if items.is_empty() {
            return Err(SaleEventError::Validation("sale has no line items".into()));
        }

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            entries.push(self.build_entry(order_id, item, as_of).await?);
        }

        let mut inserted = 0usize;
        for entry in &entries {
            if self.repo.insert_entry(entry).await? {
                inserted += 1;
            }
        }
        info!(
            order = %order_id,
            items = items.len(),
            inserted,
            "recorded sale commission entries"
        );
        Ok(entries)
    }

    async fn build_entry(
        &self,
        order_id: &OrderId,
        item: &SaleItem,
        as_of: DateTime<Utc>,
    ) -> Result<CommissionEntry, SaleEventError> {
        if item.quantity <= 0 {
            return Err(SaleEventError::Validation(format!(
                "item {} has non-positive quantity",
                item.order_item_id
            )));
        }
        if !item.unit_price.is_positive() {
            return Err(SaleEventError::Validation(format!(
                "item {} has non-positive unit price",
                item.order_item_id
            )));
        }

        let sale_amount = (item.unit_price * Money::from(item.quantity)).round2();

        let mut categories: Vec<CategoryId> = Vec::new();
        if let Some(c) = &item.category {
            categories.push(c.clone());
        }
        categories.extend(item.category_ancestors.iter().cloned());

        let candidates = self
            .repo
            .candidate_rules(&item.product, &categories, &item.vendor)
            .await?;
        let resolved = self.resolver.resolve(
            &item.product,
            item.category.as_ref(),
            &item.category_ancestors,
            &item.vendor,
            as_of,
            &candidates,
        );

        // Tier selection looks at the vendor's cumulative sales in the
        // current calendar month.
        let (month_start, _) = SummaryPeriod::Monthly.bounds(as_of);
        let period_sales = self
            .repo
            .vendor_period_sales(&item.vendor, month_start, as_of)
            .await?;

        let split = compute_commission(&resolved.rate, sale_amount, period_sales);

        Ok(CommissionEntry {
            entry_key: CommissionEntry::compute_entry_key(
                order_id,
                &item.order_item_id,
                &item.vendor,
                &item.product,
                sale_amount,
            ),
            order_id: order_id.clone(),
            order_item_id: item.order_item_id.clone(),
            vendor: item.vendor.clone(),
            product: item.product.clone(),
            category: item.category.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            sale_amount,
            applied: AppliedRate {
                kind: resolved.rate.kind_str().to_string(),
                rate: split.rate_applied,
                tier_label: split.tier_label.clone(),
                rule_id: resolved.rule_id,
            },
            commission_amount: split.commission,
            vendor_earning: split.vendor_earning,
            status: EntryStatus::Pending,
            created_at: as_of,
            updated_at: as_of,
        })
    }

    /// Sum the credited split for one vendor on one order, for the
    /// fulfillment credit.
    pub async fn order_split_for_vendor(
        &self,
        order_id: &OrderId,
        vendor: &VendorId,
        status: EntryStatus,
    ) -> Result<(Money, Money), SaleEventError> {
        let entries = self.repo.entries_for_order(order_id).await?;
        let mut earning = Money::zero();
        let mut commission = Money::zero();
        for entry in entries
            .iter()
            .filter(|e| &e.vendor == vendor && e.status == status)
        {
            earning += entry.vendor_earning;
            commission += entry.commission_amount;
        }
        Ok((earning, commission))
    }
}
