//! End-to-end pipeline over the in-memory retriever: chunk documents,
//! index them, synthesize test cases, and render a script for each.

use anyhow::{bail, Result};
use async_trait::async_trait;

use qa_harness_core::chunk::{chunk_text, ChunkOptions};
use qa_harness_core::models::TestType;
use qa_harness_core::retriever::{InMemoryRetriever, Retriever};
use qa_harness_core::script::generate_script;
use qa_harness_core::testgen::{Generator, Origin, TestCaseSynthesizer};

const PRODUCT_SPECS: &str = "\
# Product Specifications

## Discount Codes
The discount code SAVE15 applies a 15% discount to the cart total.
Invalid codes must show an error message.

## Shipping
Standard shipping is free. Express shipping costs $10.
";

const UI_GUIDE: &str = "\
Error messages must be displayed in red below the field.
Name, email and address are required fields.
The Pay Now button should be green.
";

const CHECKOUT_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>E-Shop Checkout</title></head>
<body>
  <div class="product">
    <h3>Wireless Mouse</h3>
    <button onclick="addToCart('mouse', 25)">Add to Cart</button>
  </div>
  <div id="cart"></div>
  <input type="text" id="discountCode" placeholder="Enter discount code">
  <button id="applyDiscount" onclick="applyDiscount()">Apply</button>
  <p id="total">Total: $0.00</p>
  <form id="checkoutForm">
    <input type="text" id="name" name="name">
    <input type="email" id="email" name="email">
    <textarea id="address" name="address"></textarea>
    <input type="radio" name="shipping" value="standard" checked>
    <input type="radio" name="payment" value="credit_card" checked>
    <div class="error-message" id="emailError"></div>
    <button type="button" id="payNow" onclick="processPayment()">Pay Now</button>
  </form>
</body>
</html>"#;

struct Unreachable;

#[async_trait]
impl Generator for Unreachable {
    fn is_ready(&self) -> bool {
        true
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("connection refused")
    }
}

async fn knowledge_base() -> InMemoryRetriever {
    let options = ChunkOptions::default();
    let mut chunks = chunk_text(PRODUCT_SPECS, "product_specs.md", &options).unwrap();
    chunks.extend(chunk_text(UI_GUIDE, "ui_ux_guide.txt", &options).unwrap());
    let retriever = InMemoryRetriever::new();
    retriever.index(&chunks).await.unwrap();
    retriever
}

#[tokio::test]
async fn discount_request_yields_grounded_cases_and_scripts() {
    let kb = knowledge_base().await;
    let out = TestCaseSynthesizer::new(&kb)
        .synthesize("Generate test cases for discount code feature")
        .await
        .unwrap();

    assert_eq!(out.origin, Origin::RuleBased);
    let positive = out
        .test_cases
        .iter()
        .find(|c| c.feature == "Discount Code" && c.test_type == TestType::Positive)
        .unwrap();
    assert!(positive.test_scenario.contains("SAVE15"));
    assert!(positive.grounded_in.contains("product_specs.md"));

    for case in &out.test_cases {
        let script = generate_script(&kb, case, CHECKOUT_HTML, 3).await.unwrap();
        assert!(script.contains(&format!("Test Case: {}", case.test_id)));
        assert!(script.contains("if __name__ == \"__main__\":"));
    }

    let script = generate_script(&kb, positive, CHECKOUT_HTML, 3).await.unwrap();
    assert!(script.contains("\"#discountCode\""));
    assert!(script.contains("\"#applyDiscount\""));
    assert!(script.contains("\"#total\""));
}

#[tokio::test]
async fn unreachable_model_falls_back_to_rules() {
    let kb = knowledge_base().await;
    let query = "payment with express shipping";
    let rules = TestCaseSynthesizer::new(&kb).synthesize(query).await.unwrap();
    let fallback = TestCaseSynthesizer::new(&kb)
        .with_generator(&Unreachable)
        .synthesize(query)
        .await
        .unwrap();

    assert_eq!(fallback.test_cases, rules.test_cases);
    assert!(fallback
        .model_error
        .as_deref()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn empty_knowledge_base_is_informational() {
    let kb = InMemoryRetriever::new();
    let out = TestCaseSynthesizer::new(&kb)
        .with_generator(&Unreachable)
        .synthesize("Generate test cases for discount code feature")
        .await
        .unwrap();
    assert_eq!(out.origin, Origin::NoDocumentation);
    assert_eq!(out.test_cases.len(), 1);
    assert_eq!(out.test_cases[0].test_id, "TC-001");
    assert_eq!(out.test_cases[0].test_type, TestType::Informational);
}
