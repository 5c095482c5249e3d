// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Monthly revenue tests: the sum is exact integer arithmetic, with no
//! accumulation drift over many fractional-pound amounts.

use chrono::Utc;
use shuttle_club::models::PaymentStatus;
use shuttle_club::services::ledger::{PaymentDraft, PaymentTarget};
use shuttle_club::models::PaymentType;
use uuid::Uuid;

mod common;
use common::create_test_app;

#[tokio::test]
async fn test_monthly_revenue_exact_over_many_fractional_amounts() {
    let (_, state) = create_test_app();
    let now = Utc::now();

    // 120 payments with awkward fractional-pound amounts (pence values
    // that are classic float troublemakers: .10, .20, .30 ...)
    let mut expected: i64 = 0;
    for i in 0..120i64 {
        let amount = 1000 + (i * 10) % 97; // e.g. £10.00, £10.10, £10.33...
        expected += amount;

        let draft = PaymentDraft {
            session_id: None,
            amount_pence: amount,
            payment_type: PaymentType::Monthly,
            month: Some(8),
            year: Some(2026),
        };
        let outcome = state
            .ledger
            .record_payment(Uuid::new_v4(), draft, now)
            .await
            .unwrap();
        state
            .ledger
            .set_payment_status(
                PaymentTarget::Payment(outcome.payment.id),
                PaymentStatus::Paid,
                now,
            )
            .await
            .unwrap();
    }

    let revenue = state.ledger.monthly_revenue(8, 2026).await.unwrap();
    assert_eq!(revenue, expected);
}

#[tokio::test]
async fn test_monthly_revenue_ignores_unpaid_and_other_periods() {
    let (_, state) = create_test_app();
    let now = Utc::now();

    let record = |month: u32, amount: i64, status: PaymentStatus| {
        let state = state.clone();
        async move {
            let draft = PaymentDraft {
                session_id: None,
                amount_pence: amount,
                payment_type: PaymentType::Monthly,
                month: Some(month),
                year: Some(2026),
            };
            let outcome = state
                .ledger
                .record_payment(Uuid::new_v4(), draft, now)
                .await
                .unwrap();
            if status != PaymentStatus::Pending {
                state
                    .ledger
                    .set_payment_status(PaymentTarget::Payment(outcome.payment.id), status, now)
                    .await
                    .unwrap();
            }
        }
    };

    record(8, 4000, PaymentStatus::Paid).await;
    record(8, 1250, PaymentStatus::Paid).await;
    record(8, 9999, PaymentStatus::Pending).await;
    record(8, 1200, PaymentStatus::Overdue).await;
    record(7, 4000, PaymentStatus::Paid).await;

    assert_eq!(state.ledger.monthly_revenue(8, 2026).await.unwrap(), 5250);
    assert_eq!(state.ledger.monthly_revenue(7, 2026).await.unwrap(), 4000);
    assert_eq!(state.ledger.monthly_revenue(6, 2026).await.unwrap(), 0);
}

#[tokio::test]
async fn test_monthly_revenue_rejects_invalid_month() {
    let (_, state) = create_test_app();
    let err = state.ledger.monthly_revenue(13, 2026).await.unwrap_err();
    assert!(matches!(err, shuttle_club::error::AppError::BadRequest(_)));
}
