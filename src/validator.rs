//! Keyword matching between extracted text and the declared category.

use crate::category::DocumentCategory;
use crate::keywords::KeywordSet;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Found,
    NotFound,
}

impl Verdict {
    pub fn is_found(&self) -> bool {
        matches!(self, Verdict::Found)
    }
}

/// Stateless matcher over a shared keyword table.
#[derive(Debug, Clone)]
pub struct KeywordValidator {
    keywords: Arc<KeywordSet>,
}

impl KeywordValidator {
    pub fn new(keywords: Arc<KeywordSet>) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// `Found` iff the uppercased text contains any keyword of `category`.
    pub fn validate(&self, text: &str, category: DocumentCategory) -> Verdict {
        let upper = text.to_uppercase();
        let hit = self
            .keywords
            .keywords(category)
            .iter()
            .any(|keyword| upper.contains(keyword.as_str()));

        if hit {
            Verdict::Found
        } else {
            Verdict::NotFound
        }
    }
}

impl Default for KeywordValidator {
    fn default() -> Self {
        Self::new(Arc::new(KeywordSet::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_id_header_is_found() {
        let validator = KeywordValidator::default();
        assert_eq!(
            validator.validate(
                "MINISTERIO DA FAZENDA - CPF 123.456.789-00",
                DocumentCategory::TaxId
            ),
            Verdict::Found
        );
    }

    #[test]
    fn test_illegible_document_is_not_found() {
        let validator = KeywordValidator::default();
        assert_eq!(
            validator.validate("DOCUMENTO ILEGÍVEL", DocumentCategory::NationalId),
            Verdict::NotFound
        );
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let validator = KeywordValidator::default();
        assert_eq!(
            validator.validate("cpf documento", DocumentCategory::TaxId),
            Verdict::Found
        );
        assert_eq!(
            validator.validate("Departamento Estadual de Trânsito - detran", DocumentCategory::DriversLicense),
            Verdict::Found
        );
    }

    #[test]
    fn test_keywords_do_not_leak_across_categories() {
        let validator = KeywordValidator::default();
        let text = "CARTEIRA NACIONAL DE HABILITACAO";
        assert_eq!(validator.validate(text, DocumentCategory::DriversLicense), Verdict::Found);
        assert_eq!(validator.validate(text, DocumentCategory::TaxId), Verdict::NotFound);
    }

    #[test]
    fn test_substring_match_inside_longer_words() {
        // "SSP" inside "SSP-SP" and "IDENTIDADE" inside a longer run both count
        let validator = KeywordValidator::default();
        assert!(validator
            .validate("emitido por ssp-sp", DocumentCategory::NationalId)
            .is_found());
        assert!(validator
            .validate("XXIDENTIDADEXX", DocumentCategory::NationalId)
            .is_found());
    }

    #[test]
    fn test_keyword_order_does_not_change_verdict() {
        let defaults = KeywordSet::default();
        let reversed = KeywordSet::new(DocumentCategory::ALL.iter().map(|&category| {
            let mut words = defaults.keywords(category).to_vec();
            words.reverse();
            (category, words)
        }))
        .unwrap();
        assert_ne!(
            defaults.keywords(DocumentCategory::NationalId),
            reversed.keywords(DocumentCategory::NationalId)
        );

        let forward = KeywordValidator::new(Arc::new(defaults));
        let backward = KeywordValidator::new(Arc::new(reversed));
        for text in [
            "SECRETARIA DE SEGURANCA PUBLICA - REGISTRO GERAL",
            "policia civil",
            "CPF 123.456.789-00",
            "",
        ] {
            for category in DocumentCategory::ALL {
                assert_eq!(
                    forward.validate(text, category),
                    backward.validate(text, category),
                    "{text:?} as {category}"
                );
            }
        }
        assert!(backward.validate("policia civil", DocumentCategory::NationalId).is_found());
        assert!(!backward.validate("CPF 123", DocumentCategory::NationalId).is_found());
    }

    #[test]
    fn test_validation_is_repeatable() {
        let validator = KeywordValidator::default();
        let text = "REPUBLICA FEDERATIVA DO BRASIL\nREGISTRO GERAL";
        let first = validator.validate(text, DocumentCategory::NationalId);
        let second = validator.validate(text, DocumentCategory::NationalId);
        assert_eq!(first, second);
        assert_eq!(validator.validate("", DocumentCategory::NationalId), Verdict::NotFound);
    }

    #[test]
    fn test_custom_table_is_honored() {
        let set = KeywordSet::new([
            (DocumentCategory::TaxId, vec!["nif"]),
            (DocumentCategory::DriversLicense, vec!["carta de conducao"]),
            (DocumentCategory::NationalId, vec!["cartao de cidadao"]),
        ])
        .unwrap();
        let validator = KeywordValidator::new(Arc::new(set));

        assert!(validator.validate("NIF 123", DocumentCategory::TaxId).is_found());
        assert!(!validator.validate("CPF 123", DocumentCategory::TaxId).is_found());
    }
}
