//! Static locale tables: country-name localization and semantic concepts.
//!
//! All variants are stored already normalized (lowercase, no punctuation) so
//! they can be compared against `normalize_text` output directly.

use crate::matching::text::{contains_term, normalize_text};

/// A concept and the spellings it goes by across supported locales.
#[derive(Debug)]
pub struct Concept {
    pub key: &'static str,
    pub variants: &'static [&'static str],
}

/// Canonical English country name → localized variants (PL, DE, FR, ES, native).
pub const COUNTRIES: &[(&str, &[&str])] = &[
    ("Poland", &["polska", "polen", "pologne", "polonia"]),
    ("Germany", &["niemcy", "deutschland", "allemagne", "alemania"]),
    ("France", &["francja", "frankreich", "francia"]),
    ("Spain", &["hiszpania", "spanien", "espagne", "españa", "espana"]),
    ("Italy", &["włochy", "italien", "italie", "italia"]),
    ("United Kingdom", &["wielka brytania", "großbritannien", "royaume uni", "reino unido", "uk", "great britain"]),
    ("United States", &["stany zjednoczone", "usa", "vereinigte staaten", "états unis", "estados unidos", "united states of america"]),
    ("Netherlands", &["holandia", "niderlandy", "niederlande", "pays bas", "países bajos", "nederland"]),
    ("Belgium", &["belgia", "belgien", "belgique", "bélgica"]),
    ("Austria", &["österreich", "autriche"]),
    ("Switzerland", &["szwajcaria", "schweiz", "suisse", "suiza"]),
    ("Czech Republic", &["czechy", "tschechien", "république tchèque", "república checa", "česko", "czechia"]),
    ("Slovakia", &["słowacja", "slowakei", "slovaquie", "eslovaquia", "slovensko"]),
    ("Ukraine", &["ukraina", "ucrania", "україна"]),
    ("Lithuania", &["litwa", "litauen", "lituanie", "lituania", "lietuva"]),
    ("Sweden", &["szwecja", "schweden", "suède", "suecia", "sverige"]),
    ("Norway", &["norwegia", "norwegen", "norvège", "noruega", "norge"]),
    ("Denmark", &["dania", "dänemark", "danemark", "dinamarca", "danmark"]),
    ("Ireland", &["irlandia", "irland", "irlande", "irlanda"]),
    ("Portugal", &["portugalia"]),
    ("Hungary", &["węgry", "ungarn", "hongrie", "hungría", "magyarország"]),
    ("Romania", &["rumunia", "rumänien", "roumanie", "rumanía"]),
    ("Greece", &["grecja", "griechenland", "grèce", "grecia"]),
    ("Finland", &["finlandia", "finnland", "finlande", "suomi"]),
    ("Canada", &["kanada", "canadá"]),
];

/// Work-mode, contract-type and yes/no concepts. `no` precedes `yes` so
/// "nie zgadzam się" resolves to `no` before its "zgadzam się" suffix hits.
pub const SEMANTIC_CONCEPTS: &[Concept] = &[
    Concept {
        key: "remote",
        variants: &["remote", "remotely", "zdalnie", "zdalna", "zdalny", "home office", "work from home", "wfh", "telepraca", "télétravail", "fernarbeit", "teletrabajo"],
    },
    Concept {
        key: "hybrid",
        variants: &["hybrid", "hybrydowo", "hybrydowa", "hybrydowy", "hybride", "híbrido", "hibrido"],
    },
    Concept {
        key: "onsite",
        variants: &["on site", "onsite", "office", "stacjonarnie", "stacjonarna", "biuro", "w biurze", "vor ort", "presencial", "sur site"],
    },
    Concept {
        key: "full_time",
        variants: &["full time", "fulltime", "pełny etat", "pełen etat", "cały etat", "vollzeit", "temps plein", "tiempo completo"],
    },
    Concept {
        key: "part_time",
        variants: &["part time", "parttime", "niepełny etat", "pół etatu", "teilzeit", "temps partiel", "media jornada"],
    },
    Concept {
        key: "b2b",
        variants: &["b2b", "contractor", "self employed", "działalność gospodarcza", "freelance", "freiberuflich", "autónomo"],
    },
    Concept {
        key: "employment_contract",
        variants: &["employment contract", "umowa o pracę", "uop", "permanent contract", "contract of employment", "arbeitsvertrag", "festanstellung", "cdi"],
    },
    Concept {
        key: "mandate_contract",
        variants: &["umowa zlecenie", "zlecenie", "contract of mandate", "mandate contract"],
    },
    Concept {
        key: "internship",
        variants: &["internship", "intern", "staż", "praktyki", "praktikum", "prácticas"],
    },
    Concept {
        key: "no",
        variants: &["no", "nie", "nein", "non", "false", "disagree", "nie zgadzam się", "nie wyrażam zgody"],
    },
    Concept {
        key: "yes",
        variants: &["yes", "tak", "ja", "oui", "sí", "si", "true", "agree", "i agree", "zgadzam się", "wyrażam zgodę"],
    },
];

/// Maps a localized country name to its canonical English form.
pub fn canonical_country(text: &str) -> Option<&'static str> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return None;
    }
    COUNTRIES
        .iter()
        .find(|(canonical, variants)| {
            normalize_text(canonical) == normalized || variants.contains(&normalized.as_str())
        })
        .map(|(canonical, _)| *canonical)
}

/// Keys of every concept (semantic or country) mentioned in `text`, in table order.
pub fn concepts_in(text: &str) -> Vec<&'static str> {
    let normalized = normalize_text(text);
    let mut keys: Vec<&'static str> = SEMANTIC_CONCEPTS
        .iter()
        .filter(|c| c.variants.iter().any(|v| contains_term(&normalized, v)))
        .map(|c| c.key)
        .collect();

    for (canonical, variants) in COUNTRIES {
        let english = normalize_text(canonical);
        if contains_term(&normalized, &english)
            || variants.iter().any(|v| contains_term(&normalized, v))
        {
            keys.push(*canonical);
        }
    }
    keys
}
