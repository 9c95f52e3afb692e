//! Column discovery over fuzzy, localized report headers.

use crate::util::normalize_header;

/// Finds the header matching one of `candidates`.
///
/// Candidates are tried in priority order against every header for an exact
/// (normalized) match; only when no candidate matches exactly is a second pass
/// made for the first header that contains a candidate. Returns the header as
/// written in the file.
pub fn find_column<'a, S: AsRef<str>>(headers: &'a [String], candidates: &[S]) -> Option<&'a str> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let wanted: Vec<String> = candidates
        .iter()
        .map(|c| normalize_header(c.as_ref()))
        .filter(|c| !c.is_empty())
        .collect();

    for candidate in &wanted {
        if let Some(i) = normalized.iter().position(|h| h == candidate) {
            return Some(headers[i].as_str());
        }
    }

    normalized
        .iter()
        .position(|h| wanted.iter().any(|c| h.contains(c.as_str())))
        .map(|i| headers[i].as_str())
}

/// Like [`find_column`], but a header naming a payment order number
/// ("Nr. OP", "Număr OP") wins over everything else. Bank exports also carry
/// "Dată operațiune" style columns that would otherwise satisfy a loose
/// "op" candidate.
pub fn find_reference_column<'a, S: AsRef<str>>(
    headers: &'a [String],
    candidates: &[S],
) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| is_order_number_header(h))
        .map(|h| h.as_str())
        .or_else(|| find_column(headers, candidates))
}

fn is_order_number_header(header: &str) -> bool {
    let h = normalize_header(header);
    h.contains("op") && (h.contains("nr") || h.contains("numar"))
}

/// Header candidate lists per semantic field, most specific first.
pub mod candidates {
    pub const REFERENCE: &[&str] = &[
        "referinta",
        "numar referinta",
        "reference",
        "ref",
        "id tranzactie",
        "transaction id",
    ];
    pub const AMOUNT: &[&str] = &["suma", "valoare", "amount", "value", "total"];
    pub const CREDIT: &[&str] = &["credit", "suma creditata", "incasari"];
    pub const DEBIT: &[&str] = &["debit", "suma debitata", "plati"];
    pub const DATE: &[&str] = &[
        "data valutei",
        "data",
        "data operatiunii",
        "data tranzactiei",
        "date",
        "value date",
    ];
    pub const DETAILS: &[&str] = &[
        "detalii",
        "descriere",
        "detalii tranzactie",
        "explicatii",
        "details",
        "description",
    ];
    pub const BATCH: &[&str] = &["batch", "batch id", "id lot", "lot"];

    pub const PARCEL_NUMBER: &[&str] = &["awb", "numar awb", "nr awb", "parcel", "colet"];
    pub const COD_AMOUNT: &[&str] = &["ramburs", "valoare ramburs", "cod", "suma ramburs", "cash on delivery"];
    pub const DELIVERY_DATE: &[&str] = &["data livrare", "data livrarii", "delivery date", "livrat la"];
    pub const RECIPIENT_NAME: &[&str] = &["destinatar", "nume destinatar", "recipient", "client"];
    pub const RECIPIENT_CITY: &[&str] = &["localitate", "oras", "localitate destinatar", "city"];
    pub const STATUS: &[&str] = &["status", "stare", "status livrare"];

    pub const INVOICE_ID: &[&str] = &["id", "id factura"];
    pub const INVOICE_NUMBER: &[&str] = &["numar factura", "nr factura", "serie numar", "factura", "invoice"];
    pub const INVOICE_TOTAL: &[&str] = &["total", "total factura", "valoare totala", "valoare"];
    pub const INVOICE_DATE: &[&str] = &["data emiterii", "data factura", "data", "issue date"];
    pub const INVOICE_CLIENT: &[&str] = &["client", "nume client", "cumparator"];

    pub const ORDER_ID: &[&str] = &["id comanda", "numar comanda", "nr comanda", "order id", "comanda"];
    pub const PERIOD_START: &[&str] = &["data inceput perioada", "inceput perioada", "period start", "data start"];
    pub const PERIOD_END: &[&str] = &["data sfarsit perioada", "sfarsit perioada", "period end", "data sfarsit"];
    pub const REPORTING_MONTH: &[&str] = &["luna raportare", "luna", "perioada raportare", "reporting month", "month"];
    pub const NET_VALUE: &[&str] = &["valoare neta", "comision net", "net", "valoare"];
    pub const VOUCHER_VALUE: &[&str] = &["valoare voucher", "voucher value", "valoare"];
    pub const PAYOUT_VALUE: &[&str] = &["valoare", "suma", "amount", "value"];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_beats_earlier_substring_match() {
        let h = headers(&["Suma debitata", "Suma"]);
        assert_eq!(find_column(&h, &["suma"]), Some("Suma"));
    }

    #[test]
    fn candidates_tried_in_priority_order() {
        let h = headers(&["Date", "Data valutei"]);
        assert_eq!(find_column(&h, candidates::DATE), Some("Data valutei"));
    }

    #[test]
    fn falls_back_to_substring() {
        let h = headers(&["ID", "Sumă încasată (RON)"]);
        assert_eq!(find_column(&h, &["suma"]), Some("Sumă încasată (RON)"));
    }

    #[test]
    fn diacritics_and_case_are_ignored() {
        let h = headers(&["  DATĂ OPERAȚIUNE "]);
        assert_eq!(find_column(&h, &["data operatiune"]), Some("  DATĂ OPERAȚIUNE "));
    }

    #[test]
    fn missing_column_is_none() {
        let h = headers(&["Foo", "Bar"]);
        assert_eq!(find_column(&h, candidates::AMOUNT), None);
        assert_eq!(find_column(&h, &[""]), None);
    }

    #[test]
    fn order_number_header_wins_reference() {
        let h = headers(&["Dată operațiune", "Referință", "Număr OP"]);
        assert_eq!(find_reference_column(&h, candidates::REFERENCE), Some("Număr OP"));

        let h = headers(&["Nr. OP", "Data op"]);
        assert_eq!(find_reference_column(&h, candidates::REFERENCE), Some("Nr. OP"));
    }

    #[test]
    fn order_number_header_without_separator() {
        let h = headers(&["Referinta", "NrOP"]);
        assert_eq!(find_reference_column(&h, candidates::REFERENCE), Some("NrOP"));

        let h = headers(&["Referinta", "NumarOP"]);
        assert_eq!(find_reference_column(&h, candidates::REFERENCE), Some("NumarOP"));
    }

    #[test]
    fn operation_date_is_not_a_reference() {
        let h = headers(&["Data operatiunii", "Referinta"]);
        assert_eq!(find_reference_column(&h, candidates::REFERENCE), Some("Referinta"));
    }
}
