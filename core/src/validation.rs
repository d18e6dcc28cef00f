//! Order validation rules.
//!
//! [`OrderValidator::validate`] checks every structural and business rule and
//! collects all violations instead of short-circuiting, so a single invalid
//! order reports every problem at once. The validator is side-effect-free and
//! deterministic given the order and the supplied wall-clock instant (the
//! future-timestamp check is the only rule that depends on "now").

use crate::order::Order;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Maximum accepted length for order and product identifiers.
pub const MAX_ID_LENGTH: usize = 50;

/// Minimum accepted quantity.
pub const MIN_QUANTITY: u32 = 1;

/// Maximum accepted quantity.
pub const MAX_QUANTITY: u32 = 1000;

/// Tolerated clock skew for client-supplied creation timestamps.
pub const CLOCK_SKEW_TOLERANCE_MINUTES: i64 = 5;

static ORDER_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // pattern is a compile-time constant
    Regex::new(r"^[A-Z]{3,4}-\d{3,6}$").expect("order id pattern is valid")
});

static PRODUCT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // pattern is a compile-time constant
    Regex::new(r"^PROD-[A-Z0-9]{3,10}$").expect("product id pattern is valid")
});

/// Outcome of validating a single order.
///
/// Constructed fresh per validation call. `errors` preserves rule order, and
/// all applicable rule groups run independently, so multiple violations are
/// reported simultaneously.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Whether the order passed every rule
    pub is_valid: bool,
    /// Summary message (present when invalid)
    pub message: Option<String>,
    /// Individual rule violations, in rule order
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
            errors: Vec::new(),
        }
    }

    /// A failing result carrying the collected violations.
    #[must_use]
    pub fn invalid(errors: Vec<String>) -> Self {
        let message = Some(errors.join("; "));
        Self {
            is_valid: false,
            message,
            errors,
        }
    }

    /// All violations joined into a single message, suitable for an
    /// [`crate::order::OrderResponse`].
    #[must_use]
    pub fn joined_message(&self) -> String {
        self.errors.join("; ")
    }
}

/// Static description of the validation rules, served to clients for
/// discovery via `GET /api/validation-rules`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    /// Rules applied to the order identifier
    pub order_id: Vec<&'static str>,
    /// Rules applied to the product identifier
    pub product_id: Vec<&'static str>,
    /// Rules applied to the quantity
    pub quantity: Vec<&'static str>,
    /// Rules applied to the creation timestamp
    pub created_at: Vec<&'static str>,
}

/// Pure validator for [`Order`] values.
pub struct OrderValidator;

impl OrderValidator {
    /// Validate an order against every rule, collecting all violations.
    ///
    /// `now` is injected so callers (and tests) control the clock; the only
    /// rule that uses it is the future-timestamp check, which tolerates
    /// [`CLOCK_SKEW_TOLERANCE_MINUTES`] of skew.
    #[must_use]
    pub fn validate(order: &Order, now: DateTime<Utc>) -> ValidationResult {
        let mut errors = Vec::new();

        Self::check_order_id(order.order_id.as_str(), &mut errors);
        Self::check_product_id(order.product_id.as_str(), &mut errors);
        Self::check_quantity(order.quantity, &mut errors);
        Self::check_created_at(order.created_at, now, &mut errors);

        if errors.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(errors)
        }
    }

    /// Fast boolean-only check of the critical fields.
    ///
    /// Verifies only that both identifiers are non-blank and the quantity is
    /// positive. Used by lightweight gating paths that do not need the full
    /// error report.
    #[must_use]
    pub fn quick_check(order: &Order) -> bool {
        !order.order_id.as_str().trim().is_empty()
            && !order.product_id.as_str().trim().is_empty()
            && order.quantity >= MIN_QUANTITY
    }

    /// Static description of all rules for client discovery.
    #[must_use]
    pub fn rules() -> ValidationRules {
        ValidationRules {
            order_id: vec![
                "Required, non-blank",
                "At most 50 characters",
                "Must match ^[A-Z]{3,4}-\\d{3,6}$ (e.g. ORD-001)",
            ],
            product_id: vec![
                "Required, non-blank",
                "At most 50 characters",
                "Must match ^PROD-[A-Z0-9]{3,10}$ (e.g. PROD-123)",
            ],
            quantity: vec!["At least 1", "At most 1000"],
            created_at: vec!["At most 5 minutes in the future (clock-skew tolerance)"],
        }
    }

    fn check_order_id(id: &str, errors: &mut Vec<String>) {
        if id.trim().is_empty() {
            errors.push("OrderId is required".to_string());
            return;
        }
        if id.len() > MAX_ID_LENGTH {
            errors.push(format!("OrderId must be at most {MAX_ID_LENGTH} characters"));
        }
        if !ORDER_ID_PATTERN.is_match(id) {
            errors.push("OrderId must match format AAA-000 (3-4 uppercase letters, dash, 3-6 digits)".to_string());
        }
    }

    fn check_product_id(id: &str, errors: &mut Vec<String>) {
        if id.trim().is_empty() {
            errors.push("ProductId is required".to_string());
            return;
        }
        if id.len() > MAX_ID_LENGTH {
            errors.push(format!("ProductId must be at most {MAX_ID_LENGTH} characters"));
        }
        if !PRODUCT_ID_PATTERN.is_match(id) {
            errors.push("ProductId must match format PROD-XXX (PROD- followed by 3-10 uppercase letters or digits)".to_string());
        }
    }

    fn check_quantity(quantity: u32, errors: &mut Vec<String>) {
        if quantity < MIN_QUANTITY {
            errors.push(format!("Quantity must be at least {MIN_QUANTITY}"));
        }
        if quantity > MAX_QUANTITY {
            errors.push(format!("Quantity must be at most {MAX_QUANTITY}"));
        }
    }

    fn check_created_at(created_at: DateTime<Utc>, now: DateTime<Utc>, errors: &mut Vec<String>) {
        let horizon = now + Duration::minutes(CLOCK_SKEW_TOLERANCE_MINUTES);
        if created_at > horizon {
            errors.push(format!(
                "CreatedAt must not be more than {CLOCK_SKEW_TOLERANCE_MINUTES} minutes in the future"
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::order::{OrderId, ProductId};
    use proptest::prelude::*;

    fn order(order_id: &str, product_id: &str, quantity: u32) -> Order {
        Order::new(
            OrderId::new(order_id.to_string()),
            ProductId::new(product_id.to_string()),
            quantity,
        )
    }

    fn valid_order() -> Order {
        order("ORD-001", "PROD-123", 5)
    }

    #[test]
    fn valid_order_passes() {
        let result = OrderValidator::validate(&valid_order(), Utc::now());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.message.is_none());
    }

    #[test]
    fn empty_order_id_is_required_error() {
        for id in ["", "   ", "\t"] {
            let result = OrderValidator::validate(&order(id, "PROD-123", 5), Utc::now());
            assert!(!result.is_valid);
            assert!(result.errors.iter().any(|e| e == "OrderId is required"), "{id:?}");
        }
    }

    #[test]
    fn order_id_format_accepts_known_good_ids() {
        for id in ["ORD-001", "SALE-123456", "CART-999999"] {
            let result = OrderValidator::validate(&order(id, "PROD-123", 5), Utc::now());
            assert!(result.is_valid, "{id} should pass: {:?}", result.errors);
        }
    }

    #[test]
    fn order_id_format_rejects_known_bad_ids() {
        for id in ["invalid", "12345", "ORD"] {
            let result = OrderValidator::validate(&order(id, "PROD-123", 5), Utc::now());
            assert!(!result.is_valid, "{id} should fail");
            assert!(
                result.errors.iter().any(|e| e.starts_with("OrderId must match")),
                "{id}: {:?}",
                result.errors
            );
        }
    }

    #[test]
    fn overlong_order_id_reports_length_and_format() {
        let long_id = format!("ORD-{}", "1".repeat(60));
        let result = OrderValidator::validate(&order(&long_id, "PROD-123", 5), Utc::now());
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("at most 50")));
    }

    #[test]
    fn product_id_format_accepts_known_good_ids() {
        for id in ["PROD-123", "PROD-ABC123"] {
            let result = OrderValidator::validate(&order("ORD-001", id, 5), Utc::now());
            assert!(result.is_valid, "{id} should pass: {:?}", result.errors);
        }
    }

    #[test]
    fn product_id_format_rejects_known_bad_ids() {
        for id in ["PRODUCT-123", "123"] {
            let result = OrderValidator::validate(&order("ORD-001", id, 5), Utc::now());
            assert!(!result.is_valid, "{id} should fail");
        }
    }

    #[test]
    fn quantity_boundaries() {
        for quantity in [1, 1000] {
            let result = OrderValidator::validate(&order("ORD-001", "PROD-123", quantity), Utc::now());
            assert!(result.is_valid, "{quantity} should pass");
        }
        let zero = OrderValidator::validate(&order("ORD-001", "PROD-123", 0), Utc::now());
        assert!(zero.errors.iter().any(|e| e.contains("at least 1")));
        let over = OrderValidator::validate(&order("ORD-001", "PROD-123", 1001), Utc::now());
        assert!(over.errors.iter().any(|e| e.contains("at most 1000")));
    }

    #[test]
    fn future_timestamp_beyond_skew_fails() {
        let now = Utc::now();
        let future = Order::with_created_at(
            OrderId::new("ORD-001".to_string()),
            ProductId::new("PROD-123".to_string()),
            5,
            now + Duration::minutes(6),
        );
        let result = OrderValidator::validate(&future, now);
        assert!(!result.is_valid);

        let within_skew = Order::with_created_at(
            OrderId::new("ORD-001".to_string()),
            ProductId::new("PROD-123".to_string()),
            5,
            now + Duration::minutes(4),
        );
        assert!(OrderValidator::validate(&within_skew, now).is_valid);
    }

    #[test]
    fn multiple_violations_are_reported_together() {
        let result = OrderValidator::validate(&order("bad", "also-bad", 0), Utc::now());
        assert!(!result.is_valid);
        assert!(result.errors.len() >= 3, "{:?}", result.errors);
        let message = result.message.unwrap();
        assert!(message.contains("OrderId"));
        assert!(message.contains("ProductId"));
        assert!(message.contains("Quantity"));
    }

    #[test]
    fn quick_check_gates_critical_fields_only() {
        assert!(OrderValidator::quick_check(&valid_order()));
        // quick_check does not enforce the format rules
        assert!(OrderValidator::quick_check(&order("anything", "whatever", 1)));
        assert!(!OrderValidator::quick_check(&order("", "PROD-123", 1)));
        assert!(!OrderValidator::quick_check(&order("ORD-001", "  ", 1)));
        assert!(!OrderValidator::quick_check(&order("ORD-001", "PROD-123", 0)));
    }

    #[test]
    fn rules_description_covers_every_field() {
        let rules = OrderValidator::rules();
        assert!(!rules.order_id.is_empty());
        assert!(!rules.product_id.is_empty());
        assert!(!rules.quantity.is_empty());
        assert!(!rules.created_at.is_empty());
    }

    proptest! {
        #[test]
        fn quantity_in_range_never_reports_quantity_error(quantity in 1u32..=1000) {
            let result = OrderValidator::validate(&order("ORD-001", "PROD-123", quantity), Utc::now());
            prop_assert!(result.is_valid);
        }

        #[test]
        fn quantity_above_max_always_fails(quantity in 1001u32..100_000) {
            let result = OrderValidator::validate(&order("ORD-001", "PROD-123", quantity), Utc::now());
            prop_assert!(!result.is_valid);
            prop_assert!(result.errors.iter().any(|e| e.contains("at most 1000")));
        }

        #[test]
        fn well_formed_order_ids_pass(prefix in "[A-Z]{3,4}", digits in "[0-9]{3,6}") {
            let id = format!("{prefix}-{digits}");
            let result = OrderValidator::validate(&order(&id, "PROD-123", 5), Utc::now());
            prop_assert!(result.is_valid, "{id}: {:?}", result.errors);
        }

        #[test]
        fn lowercase_order_ids_fail(prefix in "[a-z]{3,4}", digits in "[0-9]{3,6}") {
            let id = format!("{prefix}-{digits}");
            let result = OrderValidator::validate(&order(&id, "PROD-123", 5), Utc::now());
            prop_assert!(!result.is_valid);
        }
    }
}
