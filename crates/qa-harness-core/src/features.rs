//! Keyword-driven feature detection and rule mining.
//!
//! The feature catalogue is closed: every [`Feature`] variant carries its
//! keyword set, its rule miner, and (in [`templates`](crate::templates))
//! its test-case templates. Detection is a case-insensitive substring scan
//! of the context and the query; mining is a handful of substring checks
//! against the lower-cased context. Recall is traded for determinism.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Functional areas the rule path knows how to test.
///
/// Declaration order is iteration order for detection results and
/// therefore for test-case numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DiscountCode,
    Cart,
    Shipping,
    Payment,
    FormValidation,
    UserDetails,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::DiscountCode,
        Feature::Cart,
        Feature::Shipping,
        Feature::Payment,
        Feature::FormValidation,
        Feature::UserDetails,
    ];

    /// Catalogue key, e.g. `"discount_code"`.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::DiscountCode => "discount_code",
            Feature::Cart => "cart",
            Feature::Shipping => "shipping",
            Feature::Payment => "payment",
            Feature::FormValidation => "form_validation",
            Feature::UserDetails => "user_details",
        }
    }

    /// Lower-case keywords whose presence signals this feature.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Feature::DiscountCode => &["discount", "coupon", "promo", "save15"],
            Feature::Cart => &["cart", "add to cart", "quantity", "item"],
            Feature::Shipping => &["shipping", "delivery", "standard", "express"],
            Feature::Payment => &["payment", "credit card", "paypal", "pay now"],
            Feature::FormValidation => &["validation", "error", "required", "email"],
            Feature::UserDetails => &["name", "email", "address", "user"],
        }
    }

    /// True if any keyword occurs in either lower-cased haystack.
    fn matches(&self, context_lower: &str, query_lower: &str) -> bool {
        self.keywords()
            .iter()
            .any(|k| context_lower.contains(k) || query_lower.contains(k))
    }

    /// Concrete rules stated by the documentation for this feature.
    pub fn mine_rules(&self, context: &str) -> Vec<String> {
        let lower = context.to_lowercase();
        let has = |needle: &str| lower.contains(needle);
        let mut specs = Vec::new();

        match self {
            Feature::DiscountCode => {
                if has("save15") && has("15%") {
                    specs.push("SAVE15 code applies 15% discount");
                }
                if has("discount") {
                    specs.push("Discount code functionality available");
                }
            }
            Feature::Shipping => {
                if has("express") && context.contains("$10") {
                    specs.push("Express shipping costs $10");
                }
                if has("standard") && has("free") {
                    specs.push("Standard shipping is free");
                }
            }
            Feature::FormValidation => {
                if has("red") && has("error") {
                    specs.push("Error messages displayed in red");
                }
                if has("required") {
                    specs.push("Required field validation");
                }
            }
            Feature::Payment => {
                if has("green") && has("pay now") {
                    specs.push("Pay Now button should be green");
                }
            }
            Feature::Cart | Feature::UserDetails => {}
        }

        specs.into_iter().map(String::from).collect()
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Facts mined for one detected feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureRecord {
    /// Every `[Source: X]` tag in the context, shared by all features.
    pub source_docs: BTreeSet<String>,
    pub specifications: Vec<String>,
}

impl FeatureRecord {
    pub fn grounded_in(&self) -> String {
        self.source_docs
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn source_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[Source: ([^\]]+)\]").expect("source tag regex is valid"))
}

/// Deduplicated source names tagged in a context string.
pub fn source_tags(context: &str) -> BTreeSet<String> {
    source_tag_regex()
        .captures_iter(context)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Detect features in `context` or `query` and mine their rules.
pub fn detect(context: &str, query: &str) -> BTreeMap<Feature, FeatureRecord> {
    let context_lower = context.to_lowercase();
    let query_lower = query.to_lowercase();
    let sources = source_tags(context);

    Feature::ALL
        .iter()
        .filter(|f| f.matches(&context_lower, &query_lower))
        .map(|&f| {
            (
                f,
                FeatureRecord {
                    source_docs: sources.clone(),
                    specifications: f.mine_rules(context),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_detected_from_context() {
        let features = detect("Enter your discount code at checkout.", "");
        assert!(features.contains_key(&Feature::DiscountCode));
    }

    #[test]
    fn test_detected_from_query_only() {
        let features = detect("Nothing to see here.", "test the PayPal flow");
        assert_eq!(features.keys().copied().collect::<Vec<_>>(), vec![Feature::Payment]);
    }

    #[test]
    fn test_nothing_detected() {
        assert!(detect("Lorem ipsum dolor sit amet.", "check it").is_empty());
    }

    #[test]
    fn test_rules_mined() {
        let ctx = "[Source: specs.md]\nCode SAVE15 gives 15% off any discount.\n\n\
                   [Source: shipping.txt]\nExpress shipping is $10; Standard is free.\n";
        let features = detect(ctx, "");

        let discount = &features[&Feature::DiscountCode];
        assert_eq!(
            discount.specifications,
            vec![
                "SAVE15 code applies 15% discount".to_string(),
                "Discount code functionality available".to_string()
            ]
        );

        let shipping = &features[&Feature::Shipping];
        assert_eq!(
            shipping.specifications,
            vec![
                "Express shipping costs $10".to_string(),
                "Standard shipping is free".to_string()
            ]
        );
    }

    #[test]
    fn test_sources_shared_and_deduplicated() {
        let ctx = "[Source: b.md]\ncart\n\n[Source: a.md]\nemail\n\n[Source: b.md]\nerror\n";
        let features = detect(ctx, "");
        assert!(features.len() >= 2);
        for record in features.values() {
            assert_eq!(record.grounded_in(), "a.md, b.md");
        }
    }

    #[test]
    fn test_catalogue_is_consistent() {
        for f in Feature::ALL {
            assert!(!f.keywords().is_empty());
            assert!(f.keywords().iter().all(|k| *k == k.to_lowercase()));
        }
    }
}
