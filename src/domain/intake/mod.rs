//! Intake module - deterministic classification of questionnaire answers.
//!
//! Maps the structured intake bundle (porosity quiz letters plus
//! categorical answers for scalp, damage, density, and texture) to care
//! directives, product needs, and routine flags. Pure lookup tables, no
//! I/O; this is the classification collaborator consumed by the routine
//! pipeline before any generation call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The structured answer bundle from the intake questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeAnswers {
    /// Porosity quiz answers as a string of letters, e.g. "ABBCA".
    pub porosity: String,
    pub scalp: String,
    pub damage: String,
    pub density: String,
    pub texture: String,
}

/// Classification result for a single hair trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitAdvice {
    pub label: &'static str,
    pub directive: &'static str,
    pub product_needs: &'static [&'static str],
    pub routine_flags: &'static [&'static str],
}

impl TraitAdvice {
    const fn unknown(label: &'static str) -> Self {
        Self {
            label,
            directive: "No directive available.",
            product_needs: &[],
            routine_flags: &[],
        }
    }
}

/// Collated advice across all traits, keyed by trait name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Advice {
    pub directives: BTreeMap<String, String>,
    pub product_needs: BTreeMap<String, Vec<String>>,
    pub routine_flags: BTreeMap<String, Vec<String>>,
}

/// Runs every trait classifier over the answer bundle and merges the
/// results, mirroring the per-trait maps the routine prompt expects.
pub fn collate_advice(answers: &IntakeAnswers) -> Advice {
    let classified: [(&str, TraitAdvice); 5] = [
        ("porosity", classify_porosity(&answers.porosity)),
        ("scalp", classify_scalp(&answers.scalp)),
        ("damage", classify_damage(&answers.damage)),
        ("density", classify_density(&answers.density)),
        ("texture", classify_texture(&answers.texture)),
    ];

    let mut advice = Advice::default();
    for (name, info) in classified {
        advice
            .directives
            .insert(name.to_string(), info.directive.to_string());
        advice.product_needs.insert(
            name.to_string(),
            info.product_needs.iter().map(|s| s.to_string()).collect(),
        );
        advice.routine_flags.insert(
            name.to_string(),
            info.routine_flags.iter().map(|s| s.to_string()).collect(),
        );
    }
    advice
}

/// Porosity levels derived from the quiz score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PorosityLevel {
    Low,
    Medium,
    High,
}

/// Scores the porosity quiz: each 'B' answer adds 1, each 'C' adds 2.
/// Score 0-3 is low, 4-6 medium, 7+ high.
pub fn porosity_level(quiz_answers: &str) -> PorosityLevel {
    let score: u32 = quiz_answers
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'B' => 1,
            'C' => 2,
            _ => 0,
        })
        .sum();
    match score {
        0..=3 => PorosityLevel::Low,
        4..=6 => PorosityLevel::Medium,
        _ => PorosityLevel::High,
    }
}

pub fn classify_porosity(quiz_answers: &str) -> TraitAdvice {
    match porosity_level(quiz_answers) {
        PorosityLevel::Low => TraitAdvice {
            label: "Low Porosity",
            directive: "Use lightweight humectants, avoid heavy oils and butters, incorporate heat for better absorption.",
            product_needs: &["humectants", "lightweight formulas"],
            routine_flags: &["avoid_butters", "use_heat_for_masks"],
        },
        PorosityLevel::Medium => TraitAdvice {
            label: "Medium Porosity",
            directive: "Maintain balance with regular moisture and protein.",
            product_needs: &["balanced_moisture", "moderate_protein"],
            routine_flags: &["standard_care"],
        },
        PorosityLevel::High => TraitAdvice {
            label: "High Porosity",
            directive: "Use rich moisturizers, seal moisture, incorporate protein.",
            product_needs: &["protein", "occlusives"],
            routine_flags: &["seal_moisture", "strengthen"],
        },
    }
}

pub fn classify_scalp(answer: &str) -> TraitAdvice {
    match answer {
        "Oily" => TraitAdvice {
            label: "Oily Scalp",
            directive: "Focus on scalp cleansing, regulate sebum, avoid heavy oils.",
            product_needs: &["clarifying shampoo", "scalp exfoliant"],
            routine_flags: &["more_frequent_wash", "lightweight_products"],
        },
        "Dry" => TraitAdvice {
            label: "Dry Scalp",
            directive: "Increase scalp hydration, avoid strong surfactants, use soothing agents.",
            product_needs: &["soothing ingredients", "humectants"],
            routine_flags: &["gentle_cleanse", "scalp_serum"],
        },
        "Normal" => TraitAdvice {
            label: "Normal Scalp",
            directive: "Maintain balance with gentle cleansing and lightweight conditioners.",
            product_needs: &["mild shampoo"],
            routine_flags: &["standard_cleansing"],
        },
        "Sensitive" => TraitAdvice {
            label: "Sensitive Scalp",
            directive: "Avoid fragrance, use hypoallergenic formulas, avoid harsh cleansers.",
            product_needs: &["fragrance_free", "hypoallergenic"],
            routine_flags: &["low_irritation"],
        },
        _ => TraitAdvice::unknown("Unknown Scalp Type"),
    }
}

pub fn classify_damage(answer: &str) -> TraitAdvice {
    match answer {
        "Yes" => TraitAdvice {
            label: "Damaged Hair",
            directive: "Prioritize repair, strengthen with protein and bond builders.",
            product_needs: &["protein", "bond_builders"],
            routine_flags: &["repair_mode"],
        },
        "No" => TraitAdvice {
            label: "Healthy Hair",
            directive: "Maintain hydration and protect from future damage.",
            product_needs: &["moisturizers", "UV_protection"],
            routine_flags: &["maintenance"],
        },
        _ => TraitAdvice::unknown("Unknown Damage State"),
    }
}

pub fn classify_density(answer: &str) -> TraitAdvice {
    match answer {
        "Thin" => TraitAdvice {
            label: "Low Density",
            directive: "Use lightweight products to avoid flattening.",
            product_needs: &["foams", "light gels"],
            routine_flags: &["avoid_heavy"],
        },
        "Medium" => TraitAdvice {
            label: "Medium Density",
            directive: "Use balanced stylers, avoid unnecessary heaviness.",
            product_needs: &["medium_hold_gels"],
            routine_flags: &["balanced_volume"],
        },
        "Thick" => TraitAdvice {
            label: "High Density",
            directive: "Use defining stylers with strong hold to control volume.",
            product_needs: &["strong_hold_gels", "creams"],
            routine_flags: &["strong_hold"],
        },
        _ => TraitAdvice::unknown("Unknown Density"),
    }
}

pub fn classify_texture(answer: &str) -> TraitAdvice {
    match answer {
        "Straight" => TraitAdvice {
            label: "Type 1",
            directive: "Avoid heavy products, focus on volume and scalp health.",
            product_needs: &["lightweight stylers"],
            routine_flags: &["boost_volume"],
        },
        "Wavy" => TraitAdvice {
            label: "Type 2",
            directive: "Use lightweight gels and creams that enhance wave definition.",
            product_needs: &["light_gels", "light_creams"],
            routine_flags: &["enhance_waves"],
        },
        "Curly" => TraitAdvice {
            label: "Type 3",
            directive: "Enhance definition with curl creams and gels, focus on moisture retention.",
            product_needs: &["curl_creams", "gels"],
            routine_flags: &["enhance_curls"],
        },
        "Coily" => TraitAdvice {
            label: "Type 4",
            directive: "Use rich moisturizers and sealants, minimize manipulation.",
            product_needs: &["butters", "oils"],
            routine_flags: &["high_moisture", "protective_styles"],
        },
        _ => TraitAdvice::unknown("Unknown Texture"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_answers() -> IntakeAnswers {
        IntakeAnswers {
            porosity: "ACBBA".to_string(),
            scalp: "Dry".to_string(),
            damage: "Yes".to_string(),
            density: "Thick".to_string(),
            texture: "Coily".to_string(),
        }
    }

    #[test]
    fn porosity_scoring_boundaries() {
        assert_eq!(porosity_level("AAAAA"), PorosityLevel::Low);
        assert_eq!(porosity_level("BBBA"), PorosityLevel::Low); // score 3
        assert_eq!(porosity_level("BBBB"), PorosityLevel::Medium); // score 4
        assert_eq!(porosity_level("CCC"), PorosityLevel::Medium); // score 6
        assert_eq!(porosity_level("CCCB"), PorosityLevel::High); // score 7
        assert_eq!(porosity_level("CCCCC"), PorosityLevel::High);
    }

    #[test]
    fn porosity_scoring_is_case_insensitive() {
        assert_eq!(porosity_level("ccbb"), PorosityLevel::Medium);
    }

    #[test]
    fn unknown_answers_fall_back_to_empty_advice() {
        let advice = classify_scalp("Purple");
        assert_eq!(advice.label, "Unknown Scalp Type");
        assert!(advice.product_needs.is_empty());
        assert!(advice.routine_flags.is_empty());
    }

    #[test]
    fn collate_produces_all_five_traits() {
        let advice = collate_advice(&sample_answers());
        for trait_name in ["porosity", "scalp", "damage", "density", "texture"] {
            assert!(advice.directives.contains_key(trait_name), "{trait_name}");
            assert!(advice.product_needs.contains_key(trait_name));
            assert!(advice.routine_flags.contains_key(trait_name));
        }
    }

    #[test]
    fn collate_carries_trait_specific_directives() {
        let advice = collate_advice(&sample_answers());
        assert!(advice.directives["scalp"].contains("scalp hydration"));
        assert!(advice.routine_flags["texture"].contains(&"high_moisture".to_string()));
        assert!(advice.product_needs["damage"].contains(&"bond_builders".to_string()));
    }

    #[test]
    fn intake_answers_deserialize_from_api_payload() {
        let json = r#"{
            "porosity": "ABC",
            "scalp": "Oily",
            "damage": "No",
            "density": "Thin",
            "texture": "Wavy"
        }"#;
        let answers: IntakeAnswers = serde_json::from_str(json).unwrap();
        assert_eq!(answers.scalp, "Oily");
    }
}
