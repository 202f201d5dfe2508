// Section grammar tables, one per bank.
//
// Capture groups are positional and differ per bank; each `CaptureLayout`
// below documents the group order of its line pattern.

use super::{BankId, Language};
use crate::grammar::{CaptureLayout, GrammarSpec, RuleSpec};
use crate::normalize::NumberFormat;

pub fn language(bank: BankId) -> Language {
    match bank {
        BankId::Uib => Language::English,
        _ => Language::French,
    }
}

pub fn identity_markers(bank: BankId) -> &'static [&'static str] {
    match bank {
        BankId::Biat => &["BIAT", "BANQUE INTERNATIONALE ARABE"],
        BankId::Stb => &["SOCIETE TUNISIENNE DE BANQUE", "SOCIÉTÉ TUNISIENNE DE BANQUE", "STB"],
        BankId::Bna => &["BANQUE NATIONALE AGRICOLE", "BNA"],
        BankId::Attijari => &["ATTIJARI", "ATTIJARIWAFA"],
        BankId::AmenBank => &["AMEN BANK"],
        BankId::Uib => &["UNION INTERNATIONALE DE BANQUES", "UIB"],
    }
}

pub fn grammar_spec(bank: BankId) -> GrammarSpec {
    match bank {
        BankId::Biat => biat(),
        BankId::Stb => stb(),
        BankId::Bna => bna(),
        BankId::Attijari => attijari(),
        BankId::AmenBank => amen_bank(),
        BankId::Uib => uib(),
    }
}

// ============================================================================
// FRENCH LAYOUTS
// ============================================================================

fn biat() -> GrammarSpec {
    GrammarSpec {
        number_format: NumberFormat::SPACE_COMMA,
        statement_date: &[r"ETAT DE RAPPROCHEMENT AU\s+({DATE})"],
        opening_balance: &[r"^SOLDE INITIAL\s*:?\s*({BAL})"],
        closing_balance: &[r"^SOLDE FINAL\s*:?\s*({BAL})"],
        sections: vec![
            // date remise | date valeur | nature | client | reference | montant
            RuleSpec {
                header: r"^REMISES NON CR[EÉ]DIT[EÉ]ES",
                line: r"^({DATE})\s+({DATE})\s+(EFFETS?|CH[EÈ]QUES?|CHQ|VIREMENT|VERSEMENT)\s+(\S+)\s+(\S+)\s+({AMT})$",
                layout: CaptureLayout::Deposit {
                    deposit_date: 1,
                    value_date: Some(2),
                    instrument: 3,
                    client_code: Some(4),
                    reference: Some(5),
                    amount: 6,
                },
                total: Some(r"^TOTAL REMISES\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // date | numero | beneficiaire | montant
            RuleSpec {
                header: r"^CH[EÈ]QUES [EÉ]MIS NON D[EÉ]BIT[EÉ]S",
                line: r"^({DATE})\s+(\d{5,})\s+(.+?)\s+({AMT})$",
                layout: CaptureLayout::Check {
                    issue_date: 1,
                    check_number: 2,
                    payee: Some(3),
                    amount: 4,
                },
                total: Some(r"^TOTAL CH[EÈ]QUES\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // type | autorisation | utilise | disponible
            RuleSpec {
                header: r"^LIGNES DE CR[EÉ]DIT",
                line: r"^([A-Z][A-Z' ]*?)\s+({AMT})\s+({AMT})\s+({AMT})$",
                layout: CaptureLayout::Facility {
                    facility_type: 1,
                    limit: 2,
                    used: 3,
                    available: 4,
                },
                total: None,
                skip: Some(r"^TYPE\b"),
            },
            // echeance | date retour | client | motif | montant
            RuleSpec {
                header: r"^EFFETS IMPAY[EÉ]S",
                line: r"^({DATE})\s+({DATE})\s+(\S+)\s+(.+?)\s+({AMT})$",
                layout: CaptureLayout::Bounced {
                    due_date: 1,
                    return_date: Some(2),
                    client_code: 3,
                    description: Some(4),
                    amount: 5,
                },
                total: Some(r"^TOTAL IMPAY[EÉ]S\s*:?\s*({BAL})"),
                skip: Some(r"^[EÉ]CH[EÉ]ANCE\b"),
            },
        ],
    }
}

fn stb() -> GrammarSpec {
    GrammarSpec {
        number_format: NumberFormat::DOT_COMMA,
        statement_date: &[r"ARR[EÊ]T[EÉ] AU\s+({DATE})"],
        opening_balance: &[r"^SOLDE D[EÉ]BUT DE P[EÉ]RIODE\s*:?\s*({BAL})"],
        closing_balance: &[r"^SOLDE FIN DE P[EÉ]RIODE\s*:?\s*({BAL})"],
        sections: vec![
            // date | reference | nature | client | montant
            RuleSpec {
                header: r"^VERSEMENTS NON PORT[EÉ]S EN COMPTE",
                line: r"^({DATE})\s+(\S+)\s+(EFFETS?|CH[EÈ]QUES?|CHQ|VIREMENT|VERSEMENT|ESP[EÈ]CES)\s+(\S+)\s+({AMT})$",
                layout: CaptureLayout::Deposit {
                    deposit_date: 1,
                    value_date: None,
                    instrument: 3,
                    client_code: Some(4),
                    reference: Some(2),
                    amount: 5,
                },
                total: Some(r"^(?:SOUS-)?TOTAL VERSEMENTS\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // numero | date | montant | beneficiaire?
            RuleSpec {
                header: r"^CH[EÈ]QUES EN CIRCULATION",
                line: r"^(\d{5,})\s+({DATE})\s+({AMT})(?:\s+(.+))?$",
                layout: CaptureLayout::Check {
                    issue_date: 2,
                    check_number: 1,
                    payee: Some(4),
                    amount: 3,
                },
                total: Some(r"^TOTAL CH[EÈ]QUES\s*:?\s*({BAL})"),
                skip: Some(r"^NUM[EÉ]RO\b"),
            },
            // <type> PLAFOND x UTILISE y DISPONIBLE z
            RuleSpec {
                header: r"^ENGAGEMENTS ET FACILIT[EÉ]S",
                line: r"^(.+?)\s+PLAFOND\s+({AMT})\s+UTILIS[EÉ]\s+({AMT})\s+DISPONIBLE\s+({AMT})$",
                layout: CaptureLayout::Facility {
                    facility_type: 1,
                    limit: 2,
                    used: 3,
                    available: 4,
                },
                total: None,
                skip: None,
            },
            // echeance | client | montant, same layout for drafts and cheques
            RuleSpec {
                header: r"^EFFETS IMPAY[EÉ]S",
                line: r"^({DATE})\s+(\S+)\s+({AMT})$",
                layout: CaptureLayout::Bounced {
                    due_date: 1,
                    return_date: None,
                    client_code: 2,
                    description: None,
                    amount: 3,
                },
                total: Some(r"^TOTAL IMPAY[EÉ]S\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            RuleSpec {
                header: r"^CH[EÈ]QUES IMPAY[EÉ]S",
                line: r"^({DATE})\s+(\S+)\s+({AMT})$",
                layout: CaptureLayout::Bounced {
                    due_date: 1,
                    return_date: None,
                    client_code: 2,
                    description: None,
                    amount: 3,
                },
                total: None,
                skip: Some(r"^DATE\b"),
            },
        ],
    }
}

fn bna() -> GrammarSpec {
    GrammarSpec {
        number_format: NumberFormat::SPACE_COMMA,
        statement_date: &[r"^SITUATION AU\s+({DATE})"],
        opening_balance: &[r"^ANCIEN SOLDE\s*:?\s*({BAL})"],
        closing_balance: &[r"^NOUVEAU SOLDE\s*:?\s*({BAL})"],
        sections: vec![
            // date operation | date valeur | reference | libelle | montant
            RuleSpec {
                header: r"^REMISES EN COURS",
                line: r"^({DATE})\s+({DATE})\s+(\S+)\s+(.+?)\s+({AMT})$",
                layout: CaptureLayout::Deposit {
                    deposit_date: 1,
                    value_date: Some(2),
                    instrument: 4,
                    client_code: None,
                    reference: Some(3),
                    amount: 5,
                },
                total: Some(r"^TOTAL REMISES EN COURS\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // numero | date | montant
            RuleSpec {
                header: r"^CH[EÈ]QUES NON PR[EÉ]SENT[EÉ]S",
                line: r"^(\d{5,})\s+({DATE})\s+({AMT})$",
                layout: CaptureLayout::Check {
                    issue_date: 2,
                    check_number: 1,
                    payee: None,
                    amount: 3,
                },
                total: Some(r"^TOTAL CH[EÈ]QUES\s*:?\s*({BAL})"),
                skip: Some(r"^NUM[EÉ]RO\b"),
            },
            // nature | limite | utilise | disponible
            RuleSpec {
                header: r"^CR[EÉ]DITS DE GESTION",
                line: r"^(.+?)\s+({AMT})\s+({AMT})\s+({AMT})$",
                layout: CaptureLayout::Facility {
                    facility_type: 1,
                    limit: 2,
                    used: 3,
                    available: 4,
                },
                total: None,
                skip: Some(r"^NATURE\b"),
            },
            // date | client | motif | montant
            RuleSpec {
                header: r"^IMPAY[EÉ]S SUR EFFETS",
                line: r"^({DATE})\s+(\S+)\s+(.+?)\s+({AMT})$",
                layout: CaptureLayout::Bounced {
                    due_date: 1,
                    return_date: None,
                    client_code: 2,
                    description: Some(3),
                    amount: 4,
                },
                total: Some(r"^TOTAL IMPAY[EÉ]S\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
        ],
    }
}

fn attijari() -> GrammarSpec {
    GrammarSpec {
        number_format: NumberFormat::SPACE_COMMA,
        statement_date: &[r"^DATE D'ARR[EÊ]T[EÉ]\s*:?\s*({DATE})"],
        opening_balance: &[r"^SOLDE D'OUVERTURE\s*:?\s*({BAL})"],
        closing_balance: &[r"^SOLDE DE CL[OÔ]TURE\s*:?\s*({BAL})"],
        sections: vec![
            // date | libelle | client | date valeur | montant
            RuleSpec {
                header: r"^REMISES [AÀ] L'ENCAISSEMENT",
                line: r"^({DATE})\s+(.+?)\s+(\S+)\s+({DATE})\s+({AMT})$",
                layout: CaptureLayout::Deposit {
                    deposit_date: 1,
                    value_date: Some(4),
                    instrument: 2,
                    client_code: Some(3),
                    reference: None,
                    amount: 5,
                },
                total: Some(r"^TOTAL REMISES\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // date | CHQ numero | beneficiaire | montant
            RuleSpec {
                header: r"^CH[EÈ]QUES [AÀ] PAYER",
                line: r"^({DATE})\s+CHQ\s+(\d{5,})\s+(.+?)\s+({AMT})$",
                layout: CaptureLayout::Check {
                    issue_date: 1,
                    check_number: 2,
                    payee: Some(3),
                    amount: 4,
                },
                total: Some(r"^TOTAL CH[EÈ]QUES\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // nature | plafond | utilise | disponible
            RuleSpec {
                header: r"^AUTORISATIONS\b",
                line: r"^(.+?)\s+({AMT})\s+({AMT})\s+({AMT})$",
                layout: CaptureLayout::Facility {
                    facility_type: 1,
                    limit: 2,
                    used: 3,
                    available: 4,
                },
                total: None,
                skip: Some(r"^NATURE\b"),
            },
            // echeance | date retour | client | montant | motif?
            RuleSpec {
                header: r"^EFFETS RETOURN[EÉ]S IMPAY[EÉ]S",
                line: r"^({DATE})\s+({DATE})\s+(\S+)\s+({AMT})(?:\s+(.+))?$",
                layout: CaptureLayout::Bounced {
                    due_date: 1,
                    return_date: Some(2),
                    client_code: 3,
                    description: Some(5),
                    amount: 4,
                },
                total: Some(r"^TOTAL IMPAY[EÉ]S\s*:?\s*({BAL})"),
                skip: Some(r"^[EÉ]CH[EÉ]ANCE\b"),
            },
        ],
    }
}

fn amen_bank() -> GrammarSpec {
    GrammarSpec {
        number_format: NumberFormat::DOT_COMMA,
        statement_date: &[r"RELEV[EÉ] .*DU\s+({DATE})"],
        opening_balance: &[r"^SOLDE PR[EÉ]C[EÉ]DENT\s*:?\s*({BAL})"],
        closing_balance: &[r"^SOLDE ACTUEL\s*:?\s*({BAL})"],
        sections: vec![
            // date | nature | numero | client | montant
            RuleSpec {
                header: r"^REMISES NON ENCAISS[EÉ]ES",
                line: r"^({DATE})\s+(EFFETS?|CH[EÈ]QUES?|CHQ|VIREMENT|VERSEMENT)\s+(\S+)\s+(\S+)\s+({AMT})$",
                layout: CaptureLayout::Deposit {
                    deposit_date: 1,
                    value_date: None,
                    instrument: 2,
                    client_code: Some(4),
                    reference: Some(3),
                    amount: 5,
                },
                total: Some(r"^TOTAL REMISES NON ENCAISS[EÉ]ES\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // date | numero | montant
            RuleSpec {
                header: r"^CH[EÈ]QUES NON D[EÉ]BIT[EÉ]S",
                line: r"^({DATE})\s+(\d{5,})\s+({AMT})$",
                layout: CaptureLayout::Check {
                    issue_date: 1,
                    check_number: 2,
                    payee: None,
                    amount: 3,
                },
                total: Some(r"^TOTAL CH[EÈ]QUES\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // type | limite | utilise | disponible
            RuleSpec {
                header: r"^LIGNES DE FINANCEMENT",
                line: r"^(.+?)\s+({AMT})\s+({AMT})\s+({AMT})$",
                layout: CaptureLayout::Facility {
                    facility_type: 1,
                    limit: 2,
                    used: 3,
                    available: 4,
                },
                total: None,
                skip: Some(r"^(?:TYPE|NATURE)\b"),
            },
            // echeance | client | motif | montant | date retour
            RuleSpec {
                header: r"^IMPAY[EÉ]S\s*$",
                line: r"^({DATE})\s+(\S+)\s+(.+?)\s+({AMT})\s+({DATE})$",
                layout: CaptureLayout::Bounced {
                    due_date: 1,
                    return_date: Some(5),
                    client_code: 2,
                    description: Some(3),
                    amount: 4,
                },
                total: Some(r"^TOTAL IMPAY[EÉ]S\s*:?\s*({BAL})"),
                skip: Some(r"^[EÉ]CH[EÉ]ANCE\b"),
            },
        ],
    }
}

// ============================================================================
// ENGLISH LAYOUT
// ============================================================================

fn uib() -> GrammarSpec {
    GrammarSpec {
        number_format: NumberFormat::COMMA_DOT,
        statement_date: &[r"^STATEMENT DATE\s*:?\s*({DATE})"],
        opening_balance: &[r"^OPENING BALANCE\s*:?\s*({BAL})"],
        closing_balance: &[r"^CLOSING BALANCE\s*:?\s*({BAL})"],
        sections: vec![
            // deposit date | value date | type | customer | reference | amount
            RuleSpec {
                header: r"^UNCREDITED DEPOSITS",
                line: r"^({DATE})\s+({DATE})\s+(DRAFTS?|CHECKS?|CHEQUES?|TRANSFER|CASH|EFFETS?)\s+(\S+)\s+(\S+)\s+({AMT})$",
                layout: CaptureLayout::Deposit {
                    deposit_date: 1,
                    value_date: Some(2),
                    instrument: 3,
                    client_code: Some(4),
                    reference: Some(5),
                    amount: 6,
                },
                total: Some(r"^TOTAL DEPOSITS\s*:?\s*({BAL})"),
                skip: Some(r"^DEPOSIT DATE\b"),
            },
            // date | check no | payee | amount
            RuleSpec {
                header: r"^OUTSTANDING CHE(?:CK|QUE)S",
                line: r"^({DATE})\s+(\d{5,})\s+(.+?)\s+({AMT})$",
                layout: CaptureLayout::Check {
                    issue_date: 1,
                    check_number: 2,
                    payee: Some(3),
                    amount: 4,
                },
                total: Some(r"^TOTAL CHE(?:CK|QUE)S\s*:?\s*({BAL})"),
                skip: Some(r"^DATE\b"),
            },
            // facility | limit | used | available
            RuleSpec {
                header: r"^CREDIT FACILITIES",
                line: r"^(.+?)\s+({AMT})\s+({AMT})\s+({AMT})$",
                layout: CaptureLayout::Facility {
                    facility_type: 1,
                    limit: 2,
                    used: 3,
                    available: 4,
                },
                total: None,
                skip: Some(r"^FACILITY\b"),
            },
            // due date | return date | customer | reason | amount
            RuleSpec {
                header: r"^RETURNED ITEMS",
                line: r"^({DATE})\s+({DATE})\s+(\S+)\s+(.+?)\s+({AMT})$",
                layout: CaptureLayout::Bounced {
                    due_date: 1,
                    return_date: Some(2),
                    client_code: 3,
                    description: Some(4),
                    amount: 5,
                },
                total: Some(r"^TOTAL RETURNED(?: ITEMS)?\s*:?\s*({BAL})"),
                skip: Some(r"^DUE DATE\b"),
            },
        ],
    }
}

// ============================================================================
// SAMPLE STATEMENTS + TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod samples {
    pub const BIAT: &str = "\
BANQUE INTERNATIONALE ARABE DE TUNISIE - BIAT
ETAT DE RAPPROCHEMENT AU 30/06/2025
SOLDE INITIAL : 15 450,000
REMISES NON CREDITEES
DATE REMISE DATE VALEUR NATURE CLIENT REFERENCE MONTANT
20/06/2025 23/06/2025 EFFET C1 REM0001 1 000,000
24/06/2025 26/06/2025 CHEQUE C2 REM0002 250,000
TOTAL REMISES 1 250,000
CHEQUES EMIS NON DEBITES
DATE NUMERO BENEFICIAIRE MONTANT
18/06/2025 0012345 SOTUVER SA 750,000
TOTAL CHEQUES 750,000
LIGNES DE CREDIT
TYPE AUTORISATION UTILISE DISPONIBLE
ESCOMPTE COMMERCIAL 50 000,000 20 000,000 30 000,000
EFFETS IMPAYES
ECHEANCE RETOUR CLIENT MOTIF MONTANT
20/06/2025 25/06/2025 C3 PROVISION INSUFFISANTE 2 000,000
TOTAL IMPAYES 2 000,000
SOLDE FINAL : 15 950,000
";

    pub const STB: &str = "\
SOCIETE TUNISIENNE DE BANQUE - STB
ETAT DE RAPPROCHEMENT ARRETE AU 30-06-2025
SOLDE DEBUT DE PERIODE 8.200,000
VERSEMENTS NON PORTES EN COMPTE
DATE REFERENCE NATURE CLIENT MONTANT
19-06-2025 VR-88120 EFFET CLT042 3.500,000
27-06-2025 VR-88121 CHEQUE CLT007 1.200,500
SOUS-TOTAL 4.700,500
CHEQUES EN CIRCULATION
NUMERO DATE MONTANT BENEFICIAIRE
0098765 25-06-2025 2.100,000 STE ALPHA
0098766 26-06-2025 400,500
ENGAGEMENTS ET FACILITES
DECOUVERT PLAFOND 10.000,000 UTILISE 6.000,000 DISPONIBLE 4.000,000
EFFETS IMPAYES
15-06-2025 CLT042 1.000,000
CHEQUES IMPAYES
22-06-2025 CLT100 350,000
TOTAL IMPAYES 1.350,000
SOLDE FIN DE PERIODE 10.400,000
";

    pub const BNA: &str = "\
BANQUE NATIONALE AGRICOLE
SITUATION AU 30/06/2025
ANCIEN SOLDE 5 000,000
REMISES EN COURS
TOTAL REMISES EN COURS : 1 300,000
CHEQUES NON PRESENTES
NUMERO DATE MONTANT
4400123 12/06/2025 300,000
4400124 15/06/2025 200,000
CREDITS DE GESTION
NATURE LIMITE UTILISE DISPONIBLE
CREDIT DE CAMPAGNE 20 000,000 12 500,000 7 500,000
IMPAYES SUR EFFETS
DATE CLIENT MOTIF MONTANT
10/06/2025 C1 DEFAUT DE PROVISION 1 500,000
NOUVEAU SOLDE 5 800,000
";

    pub const ATTIJARI: &str = "\
ATTIJARI BANK - ETAT DE RAPPROCHEMENT
DATE D'ARRETE : 30.06.2025
SOLDE D'OUVERTURE 12 000,000
REMISES A L'ENCAISSEMENT
DATE LIBELLE CLIENT VALEUR MONTANT
20.06.2025 REMISE EFFET C1 23.06.2025 2 000,000
21.06.2025 REMISE CHEQUE C4 22.06.2025 500,000
TOTAL REMISES 2 500,000
CHEQUES A PAYER
28.06.2025 CHQ 7700112 FOURNISSEUR BETA 1 000,000
AUTORISATIONS
NATURE PLAFOND UTILISE DISPONIBLE
ESCOMPTE 30 000,000 31 000,000 -1 000,000
EFFETS RETOURNES IMPAYES
18.06.2025 26.06.2025 C7 800,000 SIGNATURE NON CONFORME
SOLDE DE CLOTURE 13 500,000
";

    pub const AMEN: &str = "\
AMEN BANK
RELEVE DE RAPPROCHEMENT DU 30/06/2025
SOLDE PRECEDENT 3.000,000
REMISES NON ENCAISSEES
DATE NATURE NUMERO CLIENT MONTANT
16/06/2025 EFFET EF-5501 CLT9 900,000
17/06/2025 VIREMENT VR-0042 CLT2 1.100,000
TOTAL REMISES NON ENCAISSEES 2.000,000
CHEQUES NON DEBITES
05/06/2025 0551234 1.600,000
LIGNES DE FINANCEMENT
TYPE LIMITE UTILISE DISPONIBLE
FINANCEMENT STOCK 5.000,000 2.000,000 3.000,000
IMPAYES
12/06/2025 CLT9 EFFET IMPAYE 1.500,000 28/06/2025
SOLDE ACTUEL 3.400,000
";

    pub const UIB: &str = "\
UNION INTERNATIONALE DE BANQUES - UIB
BANK RECONCILIATION STATEMENT
STATEMENT DATE: 30/06/2025
OPENING BALANCE 7,500.000
UNCREDITED DEPOSITS
DEPOSIT DATE VALUE DATE TYPE CUSTOMER REFERENCE AMOUNT
20/06/2025 22/06/2025 DRAFT C1 DEP-1001 2,000.000
23/06/2025 24/06/2025 CHECK C8 DEP-1002 500.000
TOTAL DEPOSITS 2,500.000
OUTSTANDING CHECKS
DATE CHECK NO PAYEE AMOUNT
26/06/2025 3300456 GAMMA TRADING 1,000.000
TOTAL CHECKS 1,000.000
CREDIT FACILITIES
FACILITY LIMIT USED AVAILABLE
OVERDRAFT 10,000.000 4,000.000 6,000.000
RETURNED ITEMS
DUE DATE RETURN DATE CUSTOMER REASON AMOUNT
19/06/2025 27/06/2025 C1 INSUFFICIENT FUNDS 3,000.000
TOTAL RETURNED 3,000.000
CLOSING BALANCE 9,000.000
";
}

#[cfg(test)]
mod tests {
    use super::samples;
    use super::*;
    use crate::banks::BankRegistry;
    use crate::error::WarningKind;
    use crate::grammar::{extract_with, Extraction};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn extract(bank: BankId, text: &str) -> Extraction {
        let registry = BankRegistry::new().unwrap();
        extract_with(&registry.profile(bank).grammar, bank, text, date(2025, 7, 1))
    }

    #[test]
    fn test_biat_statement() {
        let out = extract(BankId::Biat, samples::BIAT);
        let s = &out.statement;

        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(s.statement_date, date(2025, 6, 30));
        assert_eq!(s.opening_balance, 15_450_000);
        assert_eq!(s.closing_balance, 15_950_000);
        assert_eq!(s.deposits.len(), 2);
        assert_eq!(s.deposits[0].value_date, Some(date(2025, 6, 23)));
        assert_eq!(s.deposits[0].instrument_type, "EFFET");
        assert_eq!(s.deposits[1].reference.as_deref(), Some("REM0002"));
        assert_eq!(s.checks[0].payee.as_deref(), Some("SOTUVER SA"));
        assert_eq!(s.checks[0].amount, 750_000);
        assert_eq!(s.facilities[0].facility_type, "ESCOMPTE COMMERCIAL");
        assert_eq!(s.facilities[0].available_amount, 30_000_000);
        assert_eq!(s.bounced_items[0].client_code, "C3");
        assert_eq!(
            s.bounced_items[0].description.as_deref(),
            Some("PROVISION INSUFFISANTE")
        );
    }

    #[test]
    fn test_stb_statement_with_two_bounced_sections() {
        let out = extract(BankId::Stb, samples::STB);
        let s = &out.statement;

        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(s.opening_balance, 8_200_000);
        assert_eq!(s.deposits.len(), 2);
        assert_eq!(s.deposits[1].amount, 1_200_500);
        assert_eq!(s.deposits[0].reference.as_deref(), Some("VR-88120"));
        assert_eq!(s.checks.len(), 2);
        assert_eq!(s.checks[0].check_number, "0098765");
        assert_eq!(s.checks[0].payee.as_deref(), Some("STE ALPHA"));
        assert_eq!(s.checks[1].payee, None);
        assert_eq!(s.facilities[0].limit_amount, 10_000_000);
        assert_eq!(s.bounced_items.len(), 2);
        assert_eq!(s.bounced_items[1].client_code, "CLT100");
    }

    #[test]
    fn test_bna_total_only_deposits() {
        let out = extract(BankId::Bna, samples::BNA);
        let s = &out.statement;

        assert_eq!(s.deposits.len(), 1);
        assert_eq!(s.deposits[0].reference.as_deref(), Some("TOTAL_DEPOSITS"));
        assert_eq!(s.deposits[0].amount, 1_300_000);
        assert_eq!(s.checks.len(), 2);
        assert_eq!(s.checks[1].issue_date, date(2025, 6, 15));
        assert_eq!(s.facilities[0].used_amount, 12_500_000);
        assert_eq!(s.bounced_items[0].description.as_deref(), Some("DEFAUT DE PROVISION"));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].kind, WarningKind::Degraded);
    }

    #[test]
    fn test_attijari_statement() {
        let out = extract(BankId::Attijari, samples::ATTIJARI);
        let s = &out.statement;

        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(s.statement_date, date(2025, 6, 30));
        assert_eq!(s.deposits[0].instrument_type, "REMISE EFFET");
        assert_eq!(s.deposits[0].client_code.as_deref(), Some("C1"));
        assert_eq!(s.deposits[0].value_date, Some(date(2025, 6, 23)));
        assert_eq!(s.checks[0].check_number, "7700112");
        assert_eq!(s.facilities[0].available_amount, -1_000_000);
        assert_eq!(
            s.bounced_items[0].description.as_deref(),
            Some("SIGNATURE NON CONFORME")
        );
        assert_eq!(s.closing_balance, 13_500_000);
    }

    #[test]
    fn test_amen_statement() {
        let out = extract(BankId::AmenBank, samples::AMEN);
        let s = &out.statement;

        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(s.deposits.len(), 2);
        assert_eq!(s.deposits[0].client_code.as_deref(), Some("CLT9"));
        assert_eq!(s.deposits[1].instrument_type, "VIREMENT");
        assert_eq!(s.checks[0].amount, 1_600_000);
        assert_eq!(s.bounced_items[0].return_date, Some(date(2025, 6, 28)));
        assert_eq!(s.bounced_items[0].amount, 1_500_000);
    }

    #[test]
    fn test_uib_english_statement() {
        let out = extract(BankId::Uib, samples::UIB);
        let s = &out.statement;

        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(s.opening_balance, 7_500_000);
        assert_eq!(s.closing_balance, 9_000_000);
        assert_eq!(s.deposits[0].instrument_type, "DRAFT");
        assert_eq!(s.deposits[1].amount, 500_000);
        assert_eq!(s.checks[0].payee.as_deref(), Some("GAMMA TRADING"));
        assert_eq!(s.facilities[0].facility_type, "OVERDRAFT");
        assert_eq!(s.bounced_items[0].amount, 3_000_000);
    }

    #[test]
    fn test_detection_picks_each_bank() {
        let registry = BankRegistry::new().unwrap();
        let cases = [
            (BankId::Biat, samples::BIAT),
            (BankId::Stb, samples::STB),
            (BankId::Bna, samples::BNA),
            (BankId::Attijari, samples::ATTIJARI),
            (BankId::AmenBank, samples::AMEN),
            (BankId::Uib, samples::UIB),
        ];

        for (bank, text) in cases {
            let detection = registry.detect(text, 0.5);
            assert_eq!(detection.best, Some(bank), "{:?}", detection.scores);
            assert!(detection.confidence >= 0.9, "{} scored {}", bank, detection.confidence);
        }
    }

    #[test]
    fn test_grammar_on_foreign_layout_reports_missing_sections() {
        let out = extract(BankId::Uib, samples::BIAT);

        assert!(out.statement.deposits.is_empty());
        assert!(out
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::SectionNotFound));
    }
}
