// Column templates per bank, in 850pt reference-page coordinates.
// Order is column index; the layouts follow each bank's uncredited-deposit table.

use super::BankId;
use crate::calibration::{ColumnTemplate, ContentType};

pub fn column_templates(bank: BankId) -> Vec<ColumnTemplate> {
    use ContentType::*;

    match bank {
        BankId::Biat => vec![
            ColumnTemplate::new("date_remise", Date, 30.0, 110.0),
            ColumnTemplate::new("date_valeur", Date, 110.0, 190.0),
            ColumnTemplate::new("nature", Instrument, 190.0, 300.0),
            ColumnTemplate::new("code_client", ClientCode, 300.0, 400.0),
            ColumnTemplate::new("reference", Reference, 400.0, 560.0),
            ColumnTemplate::new("montant", Amount, 560.0, 800.0),
        ],
        BankId::Stb => vec![
            ColumnTemplate::new("date", Date, 30.0, 120.0),
            ColumnTemplate::new("reference", Reference, 120.0, 260.0),
            ColumnTemplate::new("nature", Instrument, 260.0, 400.0),
            ColumnTemplate::new("client", ClientCode, 400.0, 540.0),
            ColumnTemplate::new("montant", Amount, 540.0, 800.0),
        ],
        BankId::Bna => vec![
            ColumnTemplate::new("date_operation", Date, 25.0, 105.0),
            ColumnTemplate::new("date_valeur", Date, 105.0, 185.0),
            ColumnTemplate::new("reference", Reference, 185.0, 330.0),
            ColumnTemplate::new("libelle", Instrument, 330.0, 600.0),
            ColumnTemplate::new("montant", Amount, 600.0, 820.0),
        ],
        BankId::Attijari => vec![
            ColumnTemplate::new("date", Date, 40.0, 130.0),
            ColumnTemplate::new("libelle", Instrument, 130.0, 330.0),
            ColumnTemplate::new("client", ClientCode, 330.0, 450.0),
            ColumnTemplate::new("date_valeur", Date, 450.0, 560.0),
            ColumnTemplate::new("montant", Amount, 560.0, 810.0),
        ],
        BankId::AmenBank => vec![
            ColumnTemplate::new("date", Date, 30.0, 115.0),
            ColumnTemplate::new("nature", Instrument, 115.0, 250.0),
            ColumnTemplate::new("numero", Reference, 250.0, 380.0),
            ColumnTemplate::new("client", ClientCode, 380.0, 500.0),
            ColumnTemplate::new("montant", Amount, 500.0, 790.0),
        ],
        BankId::Uib => vec![
            ColumnTemplate::new("deposit_date", Date, 30.0, 115.0),
            ColumnTemplate::new("value_date", Date, 115.0, 200.0),
            ColumnTemplate::new("type", Instrument, 200.0, 310.0),
            ColumnTemplate::new("customer", ClientCode, 310.0, 420.0),
            ColumnTemplate::new("reference", Reference, 420.0, 580.0),
            ColumnTemplate::new("amount", Amount, 580.0, 810.0),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_ordered_and_on_page() {
        for bank in BankId::ALL {
            let templates = column_templates(bank);
            assert!(templates.len() >= 5, "{}", bank);
            for pair in templates.windows(2) {
                assert!(pair[0].x_zone.1 <= pair[1].x_zone.0, "{} overlaps", bank);
            }
            for t in &templates {
                assert!(t.x_zone.0 >= 0.0 && t.x_zone.1 <= 850.0);
                assert!(t.x_zone.0 < t.x_zone.1);
            }
            assert_eq!(templates.last().map(|t| t.content_type), Some(ContentType::Amount));
        }
    }
}
