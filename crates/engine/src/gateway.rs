//! Payment-gateway settlement batches and their bank credits.

use chrono::NaiveDate;
use ramburs_core::{Money, Source, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// All gateway rows sharing a batch id, netted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayBatch {
    pub batch_id: String,
    pub row_count: usize,
    pub net_total: Money,
    /// Latest transaction date in the batch.
    pub closed_on: NaiveDate,
    #[serde(skip)]
    pub rows: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMatchKind {
    /// The bank line names the batch.
    BatchToken,
    /// Same amount within tolerance.
    Amount,
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMatch {
    pub batch_id: String,
    pub net_total: Money,
    pub bank_reference: Option<String>,
    pub bank_date: Option<NaiveDate>,
    pub matched_by: BatchMatchKind,
}

/// Groups gateway rows by batch id. Rows without a batch id are dropped;
/// the normalizer already reported them.
pub fn group_batches(rows: &[Transaction]) -> Vec<GatewayBatch> {
    let mut grouped: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
    for row in rows {
        if let Some(batch) = row.batch_id.as_deref() {
            grouped.entry(batch.to_string()).or_default().push(row.clone());
        }
    }

    let mut batches: Vec<GatewayBatch> = grouped
        .into_iter()
        .filter_map(|(batch_id, rows)| {
            let closed_on = rows.iter().map(|r| r.date).max()?;
            Some(GatewayBatch {
                row_count: rows.len(),
                net_total: rows.iter().map(|r| r.amount).sum(),
                closed_on,
                batch_id,
                rows,
            })
        })
        .collect();
    batches.sort_by(|a, b| a.closed_on.cmp(&b.closed_on).then_with(|| a.batch_id.cmp(&b.batch_id)));
    batches
}

fn same_batch(a: &str, b: &str) -> bool {
    let a = a.trim().trim_start_matches('0');
    let b = b.trim().trim_start_matches('0');
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// Pairs each batch with one gateway bank credit.
///
/// A credit whose details carry the batch id wins; otherwise the earliest
/// unused credit on or after the batch close date with the same amount within
/// `tolerance` is taken. Every credit is used at most once.
pub fn match_batches(batches: &[GatewayBatch], credits: &[Transaction], tolerance: Money) -> Vec<BatchMatch> {
    let mut gateway_credits: Vec<&Transaction> = credits
        .iter()
        .filter(|t| t.source == Source::PaymentGateway && t.is_credit())
        .collect();
    gateway_credits.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.reference.cmp(&b.reference)));

    let mut used: HashSet<usize> = HashSet::new();

    // Token matches first so an amount match cannot steal a named credit.
    let mut token_hits: Vec<Option<usize>> = Vec::with_capacity(batches.len());
    for batch in batches {
        let hit = gateway_credits.iter().enumerate().position(|(i, c)| {
            !used.contains(&i)
                && c.batch_id
                    .as_deref()
                    .is_some_and(|id| same_batch(id, &batch.batch_id))
        });
        if let Some(i) = hit {
            used.insert(i);
        }
        token_hits.push(hit);
    }

    batches
        .iter()
        .zip(token_hits)
        .map(|(batch, token_hit)| {
            let (hit, kind) = match token_hit {
                Some(i) => (Some(i), BatchMatchKind::BatchToken),
                None => {
                    let i = gateway_credits.iter().enumerate().position(|(i, c)| {
                        !used.contains(&i)
                            && c.date >= batch.closed_on
                            && c.amount.within(batch.net_total, tolerance)
                    });
                    if let Some(i) = i {
                        used.insert(i);
                    }
                    (i, if i.is_some() { BatchMatchKind::Amount } else { BatchMatchKind::Unmatched })
                }
            };
            let credit = hit.map(|i| gateway_credits[i]);
            if credit.is_none() {
                tracing::info!(batch = %batch.batch_id, net = %batch.net_total, "no bank credit for batch");
            }
            BatchMatch {
                batch_id: batch.batch_id.clone(),
                net_total: batch.net_total,
                bank_reference: credit.map(|c| c.reference.clone()),
                bank_date: credit.map(|c| c.date),
                matched_by: kind,
            }
        })
        .collect()
}
