//! Dictionary noun lemmatizer.
//!
//! Works like WordNet's `morphy` restricted to nouns:
//!
//! 1. an irregular-plural exception table (`feet` → `foot`);
//! 2. the word itself, if it is a known base form (`diabetes`);
//! 3. suffix detachment rules, accepting the first candidate that is a known
//!    base form (`rashes` → `rash`, `headaches` → `headache`);
//! 4. for words the dictionary does not know, a conservative plural strip
//!    (`reports` → `report`, `allergies` → `allergy`).
//!
//! There is no part-of-speech step: adjectives and verbs pass through
//! unchanged unless they look like a regular plural.

use std::collections::{HashMap, HashSet};

/// Noun detachment rules in morphy order.
const DETACHMENT_RULES: &[(&str, &str)] = &[
    ("s", ""),
    ("ses", "s"),
    ("xes", "x"),
    ("zes", "z"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("ies", "y"),
];

/// Shortest stem the fallback strip may leave behind.
const MIN_STEM_LEN: usize = 3;

const NOUN_EXCEPTIONS: &[(&str, &str)] = &[
    ("alveoli", "alveolus"),
    ("analyses", "analysis"),
    ("appendices", "appendix"),
    ("bacteria", "bacterium"),
    ("bronchi", "bronchus"),
    ("calves", "calf"),
    ("cervices", "cervix"),
    ("children", "child"),
    ("criteria", "criterion"),
    ("crises", "crisis"),
    ("data", "datum"),
    ("diagnoses", "diagnosis"),
    ("emboli", "embolus"),
    ("feet", "foot"),
    ("fungi", "fungus"),
    ("geese", "goose"),
    ("halves", "half"),
    ("indices", "index"),
    ("knives", "knife"),
    ("larvae", "larva"),
    ("leaves", "leaf"),
    ("lice", "louse"),
    ("lives", "life"),
    ("loaves", "loaf"),
    ("matrices", "matrix"),
    ("men", "man"),
    ("metastases", "metastasis"),
    ("mice", "mouse"),
    ("neuroses", "neurosis"),
    ("nuclei", "nucleus"),
    ("ova", "ovum"),
    ("oxen", "ox"),
    ("phenomena", "phenomenon"),
    ("prognoses", "prognosis"),
    ("psychoses", "psychosis"),
    ("selves", "self"),
    ("shelves", "shelf"),
    ("stenoses", "stenosis"),
    ("stimuli", "stimulus"),
    ("teeth", "tooth"),
    ("thieves", "thief"),
    ("thromboses", "thrombosis"),
    ("vertebrae", "vertebra"),
    ("wives", "wife"),
    ("wolves", "wolf"),
    ("women", "woman"),
];

/// Known base forms. Mostly words whose surface form would otherwise be
/// mangled by the plural strip: singular nouns ending in `s`, nouns ending
/// in `che`/`she`/`xe`, and common non-noun words ending in `s`.
const BASE_FORMS: &[&str] = &[
    // conditions
    "aids", "anemia", "appendicitis", "arthritis", "ascites", "bronchiectasis", "bronchitis",
    "bursitis", "candidiasis", "cellulitis", "cirrhosis", "colitis", "conjunctivitis",
    "cystitis", "dermatitis", "diabetes", "diverticulitis", "encephalitis", "endometriosis",
    "fibrosis", "gastritis", "gastroenteritis", "giardiasis", "glaucoma", "hepatitis",
    "herpes", "hives", "insipidus", "ketoacidosis", "laryngitis", "lupus", "measles",
    "mellitus", "meningitis", "mumps", "nephritis", "osteoarthritis", "osteoporosis",
    "otitis", "pancreatitis", "paralysis", "pemphigus", "pericarditis", "pertussis",
    "pharyngitis", "pneumonitis", "psoriasis", "pyelonephritis", "rabies", "rickets",
    "sarcoidosis", "scabies", "scoliosis", "sepsis", "shingles", "sinusitis", "stenosis",
    "syphilis", "tendinitis", "tetanus", "thrombosis", "tinnitus", "tonsillitis",
    "tuberculosis", "uveitis", "vasculitis", "vitiligo",
    // anatomy
    "abdomen", "anus", "bronchus", "cervix", "esophagus", "fetus", "humerus", "iris",
    "larynx", "oesophagus", "pancreas", "pelvis", "penis", "pharynx", "sinus", "testis",
    "thorax", "uterus", "epiglottis", "meniscus", "radius", "tibia",
    // symptoms and findings
    "abscess", "ache", "backache", "distress", "dizziness", "earache", "heartache",
    "headache", "hoarseness", "illness", "mucus", "numbness", "pus", "rash", "redness",
    "sickness", "soreness", "stiffness", "stomachache", "stress", "tenderness", "tiredness",
    "toothache", "weakness", "shortness", "loss", "mass", "gas", "itch", "patch", "stitch",
    "twitch", "bruise", "swelling", "nausea", "pulse", "dose", "disease", "nose", "case",
    "cause", "nurse", "response", "phase", "course", "reflex", "complex", "virus",
    "diagnosis", "prognosis", "analysis", "dialysis", "crisis", "metastasis", "basis",
    "axis", "status", "process", "progress", "access", "bias", "lens", "series", "species",
    "news", "canvas", "atlas", "alias", "bonus", "focus", "census", "consensus", "hiatus",
    "stimulus", "calculus", "nucleus", "fungus", "thesis", "hypothesis", "synthesis",
    "emphasis", "class", "glass", "grass", "box", "fox", "tax", "niche", "cache", "psyche",
    "moustache", "avalanche", "axe", "report", "patient", "clinic", "symptom", "lung",
    "kidney",
    // non-nouns ending in s
    "always", "perhaps", "whereas", "afterwards", "towards", "sometimes", "besides",
    "nevertheless", "thus", "plus", "unless", "upstairs", "downstairs", "outdoors",
    "indoors", "overseas", "nowadays", "sideways", "various", "previous", "serious",
    "nervous", "anxious", "numerous", "obvious", "continuous", "infectious", "contagious",
    "yes", "this", "has", "was", "his", "its", "does", "less", "across", "chaos", "tennis",
    "physics", "genetics",
];

/// Fixed noun lemmatizer over `'static` tables.
#[derive(Debug, Clone)]
pub struct Lemmatizer {
    exceptions: HashMap<&'static str, &'static str>,
    base_forms: HashSet<&'static str>,
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::english()
    }
}

impl Lemmatizer {
    /// The built-in English noun tables.
    pub fn english() -> Self {
        Self {
            exceptions: NOUN_EXCEPTIONS.iter().copied().collect(),
            base_forms: BASE_FORMS.iter().copied().collect(),
        }
    }

    /// Reduce `word` (lowercase ASCII) to its base form.
    pub fn lemmatize(&self, word: &str) -> String {
        if let Some(&base) = self.exceptions.get(word) {
            return base.to_string();
        }
        if self.base_forms.contains(word) {
            return word.to_string();
        }

        for &(suffix, replacement) in DETACHMENT_RULES {
            if let Some(stem) = word.strip_suffix(suffix) {
                let candidate = format!("{stem}{replacement}");
                if self.base_forms.contains(candidate.as_str()) {
                    return candidate;
                }
            }
        }

        fallback_strip(word)
    }

    /// Feed the exception table and base forms, in sorted order, to `hasher`.
    pub fn update_fingerprint(&self, hasher: &mut crc32fast::Hasher) {
        let mut exceptions: Vec<(&str, &str)> =
            self.exceptions.iter().map(|(k, v)| (*k, *v)).collect();
        exceptions.sort_unstable();
        for (plural, base) in exceptions {
            hasher.update(plural.as_bytes());
            hasher.update(b"=");
            hasher.update(base.as_bytes());
            hasher.update(b"\n");
        }

        let mut base_forms: Vec<&str> = self.base_forms.iter().copied().collect();
        base_forms.sort_unstable();
        for word in base_forms {
            hasher.update(word.as_bytes());
            hasher.update(b"\n");
        }
    }
}

/// Regular plural strip for words outside the dictionary.
fn fallback_strip(word: &str) -> String {
    if word.len() > 4
        && let Some(stem) = word.strip_suffix("ies")
    {
        return format!("{stem}y");
    }

    if word.ends_with("sses")
        || word.ends_with("ches")
        || word.ends_with("shes")
        || word.ends_with("xes")
        || word.ends_with("zzes")
    {
        return word[..word.len() - 2].to_string();
    }

    if word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is")
        && word.len() > MIN_STEM_LEN
    {
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}
