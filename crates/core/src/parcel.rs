use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::money::Money;
use super::transaction::Source;

/// A cash-on-delivery shipment reported by a courier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub parcel_number: String,
    pub courier: Source,
    pub cod_amount: Money,
    pub delivery_date: NaiveDate,
    pub recipient_name: String,
    pub recipient_city: String,
    pub is_delivered: bool,
    /// Set once a bank credit has been attributed to this parcel. Never cleared.
    pub matched: bool,
}

impl Parcel {
    /// Delivered and not yet attributed to any credit.
    pub fn is_pending(&self) -> bool {
        self.is_delivered && !self.matched
    }

    /// Can this parcel be part of a remittance that landed on `credit_date`?
    pub fn is_candidate_for(&self, courier: Source, credit_date: NaiveDate) -> bool {
        self.is_pending() && self.courier == courier && self.delivery_date <= credit_date
    }

    pub fn mark_matched(&mut self) {
        self.matched = true;
    }
}

pub fn total_cod(parcels: &[Parcel]) -> Money {
    parcels.iter().map(|p| p.cod_amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcel(number: &str, cents: i64, day: u32) -> Parcel {
        Parcel {
            parcel_number: number.to_string(),
            courier: Source::CourierA,
            cod_amount: Money::from_cents(cents),
            delivery_date: NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
            recipient_name: "Ion Popescu".to_string(),
            recipient_city: "Cluj".to_string(),
            is_delivered: true,
            matched: false,
        }
    }

    #[test]
    fn candidate_requires_delivery_before_credit() {
        let p = parcel("AWB1", 1000, 10);
        let credit_day = NaiveDate::from_ymd_opt(2025, 7, 10).unwrap();
        assert!(p.is_candidate_for(Source::CourierA, credit_day));
        assert!(!p.is_candidate_for(Source::CourierA, credit_day.pred_opt().unwrap()));
        assert!(!p.is_candidate_for(Source::CourierB, credit_day));
    }

    #[test]
    fn matched_and_undelivered_parcels_are_not_pending() {
        let mut p = parcel("AWB1", 1000, 10);
        assert!(p.is_pending());
        p.mark_matched();
        assert!(!p.is_pending());

        let mut q = parcel("AWB2", 1000, 10);
        q.is_delivered = false;
        assert!(!q.is_pending());
    }

    #[test]
    fn total_cod_sums_pool() {
        let pool = vec![parcel("A", 3000, 1), parcel("B", 4550, 1), parcel("C", 1999, 1)];
        assert_eq!(total_cod(&pool), Money::from_cents(9549));
    }
}
