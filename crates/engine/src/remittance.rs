//! Sequential attribution of courier COD parcels to bank credits.

use chrono::NaiveDate;
use ramburs_core::transaction::sort_chronologically;
use ramburs_core::{parcel::total_cod, ErrorLog, MatchingConfig, Money, Parcel, SoftError, Source, Transaction};
use serde::Serialize;

use crate::subset::find_subset_by;

/// A bank credit together with the parcels it was attributed to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemittanceMatch {
    pub bank_reference: String,
    pub bank_date: NaiveDate,
    pub source: Source,
    pub credit_amount: Money,
    pub parcels: Vec<Parcel>,
    pub matched_sum: Money,
}

#[derive(Debug, Clone, Default)]
pub struct RemittanceOutcome {
    pub matched: Vec<RemittanceMatch>,
    /// Courier credits no parcel combination could explain.
    pub unmatched_credits: Vec<Transaction>,
    /// Delivered parcels not attributed to any credit, expected on a later
    /// remittance.
    pub pending: Vec<Parcel>,
    pub pending_total: Money,
    pub errors: ErrorLog,
}

/// Matches courier credits against delivered parcels, oldest credit first.
///
/// Each credit only sees parcels of its own courier delivered on or before the
/// credit date and not consumed by an earlier credit. Matched parcels are
/// flagged and never return to the pool. Credits from other sources are
/// ignored.
pub fn match_remittances(
    credits: &[Transaction],
    mut parcels: Vec<Parcel>,
    config: &MatchingConfig,
) -> RemittanceOutcome {
    let mut courier_credits: Vec<Transaction> = credits
        .iter()
        .filter(|t| t.source.is_courier() && t.is_credit())
        .cloned()
        .collect();
    sort_chronologically(&mut courier_credits);

    let mut outcome = RemittanceOutcome::default();

    for credit in &courier_credits {
        let mut pool: Vec<usize> = parcels
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_candidate_for(credit.source, credit.date))
            .map(|(i, _)| i)
            .collect();
        pool.sort_by(|&a, &b| {
            let (pa, pb) = (&parcels[a], &parcels[b]);
            pa.delivery_date
                .cmp(&pb.delivery_date)
                .then_with(|| pa.parcel_number.cmp(&pb.parcel_number))
        });

        let pool_size = pool.len();
        let pool_sum: Money = pool.iter().map(|&i| parcels[i].cod_amount).sum();
        let result = find_subset_by(
            pool,
            |&i| parcels[i].cod_amount,
            credit.amount,
            config.tolerance,
            config.max_pool_size,
        );

        if !result.is_match() {
            outcome.errors.record(SoftError::NoCombinationFound {
                reference: credit.reference.clone(),
                target: credit.amount,
                pool_sum,
                pool_size,
                cap_hit: result.cap_hit,
            });
            outcome.unmatched_credits.push(credit.clone());
            continue;
        }

        let mut attributed = Vec::with_capacity(result.matched.len());
        for i in result.matched {
            parcels[i].mark_matched();
            attributed.push(parcels[i].clone());
        }
        let matched_sum = total_cod(&attributed);

        tracing::debug!(
            reference = %credit.reference,
            date = %credit.date,
            amount = %credit.amount,
            parcels = attributed.len(),
            left_in_pool = result.remaining.len(),
            "credit matched"
        );

        outcome.matched.push(RemittanceMatch {
            bank_reference: credit.reference.clone(),
            bank_date: credit.date,
            source: credit.source,
            credit_amount: credit.amount,
            parcels: attributed,
            matched_sum,
        });
    }

    outcome.pending = parcels.into_iter().filter(Parcel::is_pending).collect();
    outcome.pending_total = total_cod(&outcome.pending);
    outcome
}
