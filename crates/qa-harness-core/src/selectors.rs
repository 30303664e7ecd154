//! Locate the checkout page elements a generated script interacts with.
//!
//! Every [`Role`] owns a small compound query: a list of alternatives, each
//! a conjunction of conditions over one element. The first element in
//! document order satisfying any alternative wins, and its locator is
//! derived by [`preferred_selector`]. Roles with no match are left out of
//! the map; script templates carry their own literal fallbacks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::markup::{self, Element};

/// Semantic roles on a checkout page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AddToCartButtons,
    CartItems,
    QuantityInputs,
    DiscountInput,
    ApplyDiscountBtn,
    NameInput,
    EmailInput,
    AddressInput,
    ShippingOptions,
    PaymentOptions,
    PayButton,
    TotalPrice,
    ErrorMessages,
}

/// Role → CSS selector for the matched element.
pub type SelectorMap = BTreeMap<Role, String>;

/// One condition on a single element.
#[derive(Debug, Clone, Copy)]
enum Cond {
    Tag(&'static str),
    Id(&'static str),
    Class(&'static str),
    AttrEq(&'static str, &'static str),
    AttrContains(&'static str, &'static str),
    TextContains(&'static str),
}

impl Cond {
    fn holds(&self, el: &Element) -> bool {
        match *self {
            Cond::Tag(t) => el.tag == t,
            Cond::Id(id) => el.attr("id") == Some(id),
            Cond::Class(c) => el.classes().any(|x| x == c),
            Cond::AttrEq(k, v) => el.attr(k) == Some(v),
            Cond::AttrContains(k, v) => el.attr(k).is_some_and(|a| a.contains(v)),
            Cond::TextContains(s) => el.text.contains(s),
        }
    }
}

use Cond::*;

impl Role {
    pub const ALL: [Role; 13] = [
        Role::AddToCartButtons,
        Role::CartItems,
        Role::QuantityInputs,
        Role::DiscountInput,
        Role::ApplyDiscountBtn,
        Role::NameInput,
        Role::EmailInput,
        Role::AddressInput,
        Role::ShippingOptions,
        Role::PaymentOptions,
        Role::PayButton,
        Role::TotalPrice,
        Role::ErrorMessages,
    ];

    /// Alternatives, each a conjunction of conditions.
    fn query(&self) -> &'static [&'static [Cond]] {
        match self {
            Role::AddToCartButtons => &[
                &[Tag("button"), AttrContains("onclick", "addToCart")],
                &[Class("add-to-cart")],
                &[Tag("button"), TextContains("Add to Cart")],
            ],
            Role::CartItems => &[&[Class("cart-item")], &[Class("item")]],
            Role::QuantityInputs => &[
                &[Tag("input"), AttrEq("type", "number")],
                &[Tag("input"), AttrContains("name", "quantity")],
            ],
            Role::DiscountInput => &[
                &[Tag("input"), AttrContains("name", "discount")],
                &[Tag("input"), AttrContains("id", "discount")],
                &[Id("discountCode")],
            ],
            Role::ApplyDiscountBtn => &[
                &[Tag("button"), AttrContains("onclick", "discount")],
                &[Id("applyDiscount")],
            ],
            Role::NameInput => &[
                &[Tag("input"), AttrEq("name", "name")],
                &[Id("name")],
                &[Tag("input"), AttrContains("placeholder", "name")],
            ],
            Role::EmailInput => &[
                &[Tag("input"), AttrEq("name", "email")],
                &[Id("email")],
                &[Tag("input"), AttrEq("type", "email")],
            ],
            Role::AddressInput => &[
                &[Tag("input"), AttrEq("name", "address")],
                &[Id("address")],
                &[Tag("textarea"), AttrEq("name", "address")],
            ],
            Role::ShippingOptions => &[
                &[Tag("input"), AttrEq("name", "shipping")],
                &[
                    Tag("input"),
                    AttrEq("type", "radio"),
                    AttrContains("value", "shipping"),
                ],
            ],
            Role::PaymentOptions => &[
                &[Tag("input"), AttrEq("name", "payment")],
                &[
                    Tag("input"),
                    AttrEq("type", "radio"),
                    AttrContains("value", "payment"),
                ],
            ],
            Role::PayButton => &[
                &[Tag("button"), AttrContains("onclick", "pay")],
                &[Id("payNow")],
                &[Tag("button"), TextContains("Pay Now")],
            ],
            Role::TotalPrice => &[&[Class("total")], &[Id("total")], &[Class("price-total")]],
            Role::ErrorMessages => &[
                &[Class("error")],
                &[Class("error-message")],
                &[Class("validation-error")],
            ],
        }
    }

    fn matches(&self, el: &Element) -> bool {
        self.query()
            .iter()
            .any(|alt| alt.iter().all(|c| c.holds(el)))
    }

    /// First matching element in document order.
    pub fn find<'a>(&self, elements: &'a [Element]) -> Option<&'a Element> {
        elements.iter().find(|el| self.matches(el))
    }

    pub fn key(&self) -> &'static str {
        match self {
            Role::AddToCartButtons => "add_to_cart_buttons",
            Role::CartItems => "cart_items",
            Role::QuantityInputs => "quantity_inputs",
            Role::DiscountInput => "discount_input",
            Role::ApplyDiscountBtn => "apply_discount_btn",
            Role::NameInput => "name_input",
            Role::EmailInput => "email_input",
            Role::AddressInput => "address_input",
            Role::ShippingOptions => "shipping_options",
            Role::PaymentOptions => "payment_options",
            Role::PayButton => "pay_button",
            Role::TotalPrice => "total_price",
            Role::ErrorMessages => "error_messages",
        }
    }
}

/// Derive a locator for `el`: `#id`, then `[name='…']`, then the first
/// class token, then the bare tag. Empty attribute values are skipped.
pub fn preferred_selector(el: &Element) -> Option<String> {
    if let Some(id) = el.attr("id").filter(|v| !v.is_empty()) {
        return Some(format!("#{}", css_escape_ident(id)));
    }
    if let Some(name) = el.attr("name").filter(|v| !v.is_empty()) {
        return Some(format!("[name='{}']", name.replace('\\', "\\\\").replace('\'', "\\'")));
    }
    if let Some(class) = el.classes().next() {
        return Some(format!(".{}", css_escape_ident(class)));
    }
    if el.tag.is_empty() {
        None
    } else {
        Some(el.tag.clone())
    }
}

/// Escape `value` for use as a CSS identifier, following `CSS.escape`.
pub fn css_escape_ident(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, &c) in chars.iter().enumerate() {
        let leading_digit =
            c.is_ascii_digit() && (i == 0 || (i == 1 && chars[0] == '-'));
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("\\{:x} ", c as u32)),
            _ if leading_digit => out.push_str(&format!("\\{:x} ", c as u32)),
            '-' if i == 0 && chars.len() == 1 => out.push_str("\\-"),
            _ if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() => out.push(c),
            _ => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Resolve every role against an already parsed page.
pub fn extract_from(elements: &[Element]) -> SelectorMap {
    Role::ALL
        .iter()
        .filter_map(|role| {
            role.find(elements)
                .and_then(preferred_selector)
                .map(|s| (*role, s))
        })
        .collect()
}

/// Parse `markup` and resolve every role.
pub fn extract(markup: &str) -> SelectorMap {
    extract_from(&markup::parse(markup).elements)
}
