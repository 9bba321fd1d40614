//! Commission rule resolution: which rate applies to a given sale.

use crate::domain::{CategoryId, CommissionRate, CommissionRule, Money, ProductId, VendorId};
use chrono::{DateTime, Utc};

/// The outcome of rule resolution: a rate plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRate {
    pub rate: CommissionRate,
    /// `None` when the hard-coded platform default applied.
    pub rule_id: Option<String>,
}

/// Resolves the single applicable commission rule for a sale.
///
/// Precedence: product scope, then the sale's category and each ancestor
/// nearest-first, then vendor scope, then platform scope. Within a scope
/// only active rules whose validity window contains `as_of` are
/// considered; highest priority wins, ties broken by most recent update.
/// When nothing matches, the configured default percentage applies.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    default_percentage: Money,
}

impl RuleResolver {
    pub fn new(default_percentage: Money) -> Self {
        RuleResolver { default_percentage }
    }

    /// Pure resolution over a pre-fetched candidate rule set.
    ///
    /// `category_ancestors` is ordered nearest-first, as returned by the
    /// catalog's ancestor lookup.
    pub fn resolve(
        &self,
        product: &ProductId,
        category: Option<&CategoryId>,
        category_ancestors: &[CategoryId],
        vendor: &VendorId,
        as_of: DateTime<Utc>,
        rules: &[CommissionRule],
    ) -> ResolvedRate {
        if let Some(rule) = self.best_match(rules, as_of, |r| {
            matches!(&r.scope, crate::domain::RuleScope::Product(p) if p == product)
        }) {
            return ResolvedRate {
                rate: rule.rate.clone(),
                rule_id: Some(rule.id.clone()),
            };
        }

        if let Some(cat) = category {
            // The sale's own category matches regardless of the
            // include_subcategories flag; ancestors only match rules that
            // opted into covering descendants.
            if let Some(rule) = self.best_match(rules, as_of, |r| {
                matches!(&r.scope, crate::domain::RuleScope::Category(c) if c == cat)
            }) {
                return ResolvedRate {
                    rate: rule.rate.clone(),
                    rule_id: Some(rule.id.clone()),
                };
            }
            for ancestor in category_ancestors {
                if let Some(rule) = self.best_match(rules, as_of, |r| {
                    r.include_subcategories
                        && matches!(&r.scope, crate::domain::RuleScope::Category(c) if c == ancestor)
                }) {
                    return ResolvedRate {
                        rate: rule.rate.clone(),
                        rule_id: Some(rule.id.clone()),
                    };
                }
            }
        }

        if let Some(rule) = self.best_match(rules, as_of, |r| {
            matches!(&r.scope, crate::domain::RuleScope::Vendor(v) if v == vendor)
        }) {
            return ResolvedRate {
                rate: rule.rate.clone(),
                rule_id: Some(rule.id.clone()),
            };
        }

        if let Some(rule) = self.best_match(rules, as_of, |r| {
            matches!(&r.scope, crate::domain::RuleScope::Platform)
        }) {
            return ResolvedRate {
                rate: rule.rate.clone(),
                rule_id: Some(rule.id.clone()),
            };
        }

        ResolvedRate {
            rate: CommissionRate::Percentage {
                value: self.default_percentage,
            },
            rule_id: None,
        }
    }

    fn best_match<'a, F>(
        &self,
        rules: &'a [CommissionRule],
        as_of: DateTime<Utc>,
        scope_filter: F,
    ) -> Option<&'a CommissionRule>
    where
        F: Fn(&CommissionRule) -> bool,
    {
        rules
            .iter()
            .filter(|r| r.is_valid_at(as_of) && scope_filter(r))
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.updated_at.cmp(&b.updated_at))
            })
    }
}
