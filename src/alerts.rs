use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{AlertKind, AlertRecord, TrackedProduct};
use crate::notifier::EmailNotifier;
use crate::store::Store;
use crate::utils::error::Result;

/// Threshold for a significant price drop, in percent.
const SIGNIFICANT_DROP_PERCENT: u32 = 5;

/// The state the evaluator needs for one decision: the configured target (if
/// any), the previous known price (absent on a first-ever reading) and the
/// freshly scraped price. All other bookkeeping lives in the store.
#[derive(Debug, Clone, Copy)]
pub struct AlertDecisionInput {
    pub target_price: Option<Decimal>,
    pub previous_price: Option<Decimal>,
    pub new_price: Decimal,
}

/// An alert the evaluator decided to fire. Carries enough data to
/// reconstruct the percentage computation deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTrigger {
    pub kind: AlertKind,
    pub trigger_price: Decimal,
    pub previous_price: Option<Decimal>,
    pub percentage_change: Option<f64>,
}

/// Decide which alerts a price transition fires. Pure function: no state, no
/// side effects, at most one trigger of each kind per invocation.
///
/// TARGET_REACHED is edge-triggered: it fires on the transition to at-or-
/// below target, not on every reading that stays there, so the caller must
/// supply the true previous price.
pub fn evaluate(input: &AlertDecisionInput) -> Vec<AlertTrigger> {
    let mut triggers = Vec::new();

    if let Some(target) = input.target_price {
        let crossed = input.new_price <= target
            && input.previous_price.map_or(true, |previous| previous > target);
        if crossed {
            triggers.push(AlertTrigger {
                kind: AlertKind::TargetReached,
                trigger_price: input.new_price,
                previous_price: input.previous_price,
                percentage_change: None,
            });
        }
    }

    if let Some(previous) = input.previous_price {
        if previous > Decimal::ZERO {
            let drop = drop_percent(previous, input.new_price);
            if drop >= Decimal::from(SIGNIFICANT_DROP_PERCENT) {
                triggers.push(AlertTrigger {
                    kind: AlertKind::PriceDrop,
                    trigger_price: input.new_price,
                    previous_price: Some(previous),
                    percentage_change: drop.to_f64(),
                });
            }
        }
    }

    triggers
}

/// Percentage drop from `previous` to `new`, rounded half-up to 4 decimal
/// places before any threshold comparison. Positive when the price fell.
fn drop_percent(previous: Decimal, new: Decimal) -> Decimal {
    ((previous - new) / previous * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Turns evaluator triggers into durable alert rows and email notifications.
/// The row is written with `notified = false` first and only flipped after a
/// successful send, so delivery stays at-most-once across restarts.
pub struct AlertService {
    store: Arc<Store>,
    notifier: Arc<EmailNotifier>,
}

impl AlertService {
    pub fn new(store: Arc<Store>, notifier: Arc<EmailNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn process_reading(
        &self,
        product: &TrackedProduct,
        new_price: Decimal,
        previous_price: Option<Decimal>,
    ) -> Result<Vec<AlertRecord>> {
        // No alert email configured for this product: nothing to do
        let Some(email) = product.alert_email.as_deref() else {
            return Ok(Vec::new());
        };

        let input = AlertDecisionInput {
            target_price: product.target_price,
            previous_price,
            new_price,
        };

        let mut fired = Vec::new();
        for trigger in evaluate(&input) {
            info!(
                "Alert {} for {}: {:?} -> {}",
                trigger.kind.as_str(),
                product.name,
                previous_price,
                new_price
            );

            let mut alert = self.store.insert_alert(product.id, &trigger, email).await?;

            match self.notifier.send_alert(product, &trigger, email).await {
                Ok(()) => {
                    self.store.mark_alert_notified(alert.id).await?;
                    alert.notified = true;
                }
                Err(err) => {
                    // Row stays unnotified; visible via the pending-alerts query
                    error!(
                        "Failed to send {} alert email for product {}: {}",
                        trigger.kind.as_str(),
                        product.name,
                        err
                    );
                }
            }

            fired.push(alert);
        }

        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn input(
        target: Option<&str>,
        previous: Option<&str>,
        new_price: &str,
    ) -> AlertDecisionInput {
        AlertDecisionInput {
            target_price: target.map(dec),
            previous_price: previous.map(dec),
            new_price: dec(new_price),
        }
    }

    fn kinds(triggers: &[AlertTrigger]) -> Vec<AlertKind> {
        triggers.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_target_reached_fires_once_on_crossing() {
        // Price sequence 120 -> 110 -> 95 against a target of 100: the alert
        // fires exactly on the 110 -> 95 transition.
        let target = Some("100");
        assert!(evaluate(&input(target, Some("120"), "110")).is_empty());

        let crossing = evaluate(&input(target, Some("110"), "95"));
        assert_eq!(kinds(&crossing), vec![AlertKind::TargetReached]);

        // Still below target on the next reading: no re-fire
        let below = evaluate(&input(target, Some("95"), "90"));
        assert!(!kinds(&below).contains(&AlertKind::TargetReached));
    }

    #[test]
    fn test_first_reading_can_reach_target_but_never_drops() {
        let triggers = evaluate(&input(Some("100"), None, "80"));
        assert_eq!(kinds(&triggers), vec![AlertKind::TargetReached]);
        assert_eq!(triggers[0].previous_price, None);
    }

    #[test]
    fn test_no_target_never_fires_target_reached() {
        for (previous, new_price) in [(Some("500"), "1"), (None, "1"), (Some("2"), "1")] {
            let triggers = evaluate(&input(None, previous, new_price));
            assert!(!kinds(&triggers).contains(&AlertKind::TargetReached));
        }
    }

    #[test]
    fn test_drop_threshold_is_inclusive_at_five_percent() {
        // 100 -> 95 is exactly 5.00%: fires
        let at_boundary = evaluate(&input(None, Some("100"), "95"));
        assert_eq!(kinds(&at_boundary), vec![AlertKind::PriceDrop]);
        assert_eq!(at_boundary[0].percentage_change, Some(5.0));

        // 100 -> 95.01 is 4.99%: does not fire
        let under = evaluate(&input(None, Some("100"), "95.01"));
        assert!(under.is_empty());
    }

    #[test]
    fn test_drop_percent_rounds_to_four_places() {
        assert_eq!(drop_percent(dec("3"), dec("2.85")), dec("5.0000"));
        assert_eq!(drop_percent(dec("3"), dec("2.86")), dec("4.6667"));
    }

    #[test]
    fn test_price_increase_fires_nothing() {
        assert!(evaluate(&input(None, Some("100"), "120")).is_empty());
    }

    #[test]
    fn test_both_kinds_fire_in_one_evaluation() {
        let triggers = evaluate(&input(Some("100"), Some("110"), "90"));
        assert_eq!(
            kinds(&triggers),
            vec![AlertKind::TargetReached, AlertKind::PriceDrop]
        );
        let drop = &triggers[1];
        assert_eq!(drop.trigger_price, dec("90"));
        assert_eq!(drop.previous_price, Some(dec("110")));
        assert_eq!(drop.percentage_change, Some(18.1818));
    }

    #[test]
    fn test_zero_previous_price_is_ignored_for_drops() {
        assert!(evaluate(&input(None, Some("0"), "10")).is_empty());
    }
}
