//! Canonical test-case templates for the rule-based path.
//!
//! Each feature yields its positive drafts, then its negative drafts.
//! `Cart` and `UserDetails` have no negative templates. Drafts carry no ID
//! or grounding; the synthesizer numbers them and attaches sources.

use crate::features::{Feature, FeatureRecord};
use crate::models::TestType;

/// A test case before numbering and grounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDraft {
    pub feature: &'static str,
    pub test_scenario: String,
    pub expected_result: String,
    pub test_type: TestType,
    pub steps: Vec<String>,
}

fn draft(
    feature: &'static str,
    test_type: TestType,
    scenario: &str,
    expected: &str,
    steps: &[&str],
) -> CaseDraft {
    CaseDraft {
        feature,
        test_scenario: scenario.to_string(),
        expected_result: expected.to_string(),
        test_type,
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

impl Feature {
    /// Human-facing feature label used in test cases.
    pub fn label(&self) -> &'static str {
        match self {
            Feature::DiscountCode => "Discount Code",
            Feature::Cart => "Shopping Cart",
            Feature::Shipping => "Shipping",
            Feature::Payment => "Payment",
            Feature::FormValidation => "Form Validation",
            Feature::UserDetails => "User Details",
        }
    }

    pub fn positive_cases(&self, record: &FeatureRecord) -> Vec<CaseDraft> {
        use TestType::Positive;
        let label = self.label();
        match self {
            Feature::DiscountCode => vec![draft(
                label,
                Positive,
                "Apply valid discount code SAVE15",
                "Total price is reduced by 15%",
                &[
                    "Add items to cart",
                    "Navigate to checkout",
                    "Enter discount code \"SAVE15\"",
                    "Click apply",
                    "Verify 15% discount is applied",
                ],
            )],
            Feature::Cart => vec![draft(
                label,
                Positive,
                "Add items to cart and update quantities",
                "Cart updates correctly with new quantities and totals",
                &[
                    "Click \"Add to Cart\" for multiple items",
                    "Verify items appear in cart",
                    "Update item quantities",
                    "Verify total price updates correctly",
                ],
            )],
            Feature::Shipping => {
                let express_rule = record
                    .specifications
                    .iter()
                    .any(|s| s == "Express shipping costs $10");
                let expected = if express_rule {
                    "Express shipping adds $10 to the order total"
                } else {
                    "Order total reflects the selected shipping method"
                };
                vec![draft(
                    label,
                    Positive,
                    "Select express shipping at checkout",
                    expected,
                    &[
                        "Add items to cart",
                        "Navigate to checkout",
                        "Select the express shipping option",
                        "Verify the shipping cost in the order total",
                    ],
                )]
            }
            Feature::Payment => vec![draft(
                label,
                Positive,
                "Complete payment with valid details",
                "Payment succeeds and a confirmation message is displayed",
                &[
                    "Add items to cart",
                    "Fill in name and email",
                    "Select a payment method",
                    "Click \"Pay Now\"",
                    "Verify the payment success message",
                ],
            )],
            Feature::FormValidation => vec![draft(
                label,
                Positive,
                "Submit form with valid data",
                "Form submits successfully without errors",
                &[
                    "Fill all required fields with valid data",
                    "Enter valid email format",
                    "Click submit",
                    "Verify successful submission",
                ],
            )],
            Feature::UserDetails => vec![draft(
                label,
                Positive,
                "Enter valid user details at checkout",
                "Name, email and address are accepted without validation errors",
                &[
                    "Enter a full name",
                    "Enter a valid email address",
                    "Enter a shipping address",
                    "Verify no validation errors are shown",
                ],
            )],
        }
    }

    pub fn negative_cases(&self, _record: &FeatureRecord) -> Vec<CaseDraft> {
        use TestType::Negative;
        let label = self.label();
        match self {
            Feature::DiscountCode => vec![draft(
                label,
                Negative,
                "Apply invalid discount code",
                "Error message displayed, no discount applied",
                &[
                    "Add items to cart",
                    "Navigate to checkout",
                    "Enter invalid discount code \"INVALID\"",
                    "Click apply",
                    "Verify error message appears",
                ],
            )],
            Feature::Shipping => vec![draft(
                label,
                Negative,
                "Proceed to payment without selecting a shipping method",
                "Checkout is blocked until a shipping method is chosen",
                &[
                    "Add items to cart",
                    "Navigate to checkout",
                    "Leave the shipping method unselected",
                    "Click \"Pay Now\"",
                    "Verify an error message appears",
                ],
            )],
            Feature::Payment => vec![draft(
                label,
                Negative,
                "Attempt payment with required details missing",
                "Payment is not processed and error messages are displayed",
                &[
                    "Add items to cart",
                    "Leave name and email empty",
                    "Click \"Pay Now\"",
                    "Verify error messages appear",
                ],
            )],
            Feature::FormValidation => vec![
                draft(
                    label,
                    Negative,
                    "Submit form with invalid email",
                    "Email validation error displayed in red",
                    &[
                        "Fill form with invalid email format",
                        "Click submit",
                        "Verify red error message for email field",
                    ],
                ),
                draft(
                    label,
                    Negative,
                    "Submit form with empty required fields",
                    "Required field errors displayed",
                    &[
                        "Leave required fields empty",
                        "Click submit",
                        "Verify required field error messages",
                    ],
                ),
            ],
            Feature::Cart | Feature::UserDetails => Vec::new(),
        }
    }
}
