//! Prompt construction. Pure: identical inputs always produce identical text.

use crate::index::{ContextSource, TariffContext};
use std::fmt::Write;

#[derive(Debug, Clone, Copy)]
pub struct PromptOptions {
    /// Below this confidence the model is told to ask questions instead of guessing.
    pub clarify_below: u8,
    pub is_follow_up: bool,
}

pub fn classification_prompt(
    description: &str,
    context: &TariffContext,
    opts: PromptOptions,
) -> String {
    let mut prompt = String::from(
        "You are an expert in Indian Customs Tariff classification. \
         Classify the product below into an 8-digit Indian HS code.\n\n",
    );
    let _ = writeln!(prompt, "Product Description: \"{}\"", description.trim());
    if opts.is_follow_up {
        prompt.push_str(
            "\nThe user has already answered clarifying questions; the description above \
             includes those answers. Commit to the most specific code the details support \
             and do not ask further questions unless the product is still unidentifiable.\n",
        );
    }

    let heading = match context.source {
        ContextSource::Records => "Indian Customs Tariff reference (HS code entries)",
        ContextSource::RawText => "Indian Customs Tariff reference (raw excerpt)",
    };
    let _ = write!(prompt, "\n{heading}:\n{}\n", context.text);

    let _ = write!(
        prompt,
        "\nRules:\n\
         1. Only use HS codes that appear in the reference above.\n\
         2. Give up to 3 reasons, each grounded in the reference text.\n\
         3. Give up to 2 related codes from the reference.\n\
         4. If your confidence would be below {threshold}, do not guess: set \"hsCode\" to null \
         and ask up to 3 clarification questions specific to this kind of product \
         (material, composition, processing state, intended use, form). Never ask generic questions.\n\
         \nReturn ONLY valid JSON (no markdown, no code fences) in one of these shapes.\n\
         Classification:\n\
         {{\n  \"hsCode\": \"XXXXXXXX\",\n  \"description\": \"Tariff description of the code\",\n  \
         \"confidence\": 85,\n  \"reasons\": [\"Reason 1\", \"Reason 2\", \"Reason 3\"],\n  \
         \"relatedCodes\": [{{\"code\": \"YYYYYYYY\", \"description\": \"Related entry\"}}]\n}}\n\
         Clarification:\n\
         {{\n  \"hsCode\": null,\n  \"confidence\": 40,\n  \"message\": \"Why more detail is needed\",\n  \
         \"clarificationQuestions\": [\"Question 1?\", \"Question 2?\"]\n}}\n",
        threshold = opts.clarify_below
    );
    prompt
}

/// Asks only whether the description is specific enough to classify.
pub fn clarification_check_prompt(description: &str) -> String {
    let mut prompt = String::from(
        "You review product descriptions submitted for Indian customs HS classification. \
         Judge whether the description below is specific enough to pick an 8-digit code.\n\n",
    );
    let _ = writeln!(prompt, "Product Description: \"{}\"", description.trim());
    prompt.push_str(
        "\nScore specificity from 0 (unidentifiable) to 10 (fully specified: material, \
         form, processing state and use are clear). If the description is too vague, list up \
         to 3 questions tailored to the product type that would resolve the ambiguity.\n\
         \nReturn ONLY valid JSON (no markdown) with exactly these keys:\n\
         {\n  \"isTooVague\": false,\n  \"specificityScore\": 7,\n  \"productType\": \"short product category\",\n  \
         \"clarifications\": [\"Question 1?\"]\n}\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TariffContext {
        TariffContext {
            text: "HS Code: 09024000 - Black tea".into(),
            source: ContextSource::Records,
            records_used: 1,
        }
    }

    fn opts(is_follow_up: bool) -> PromptOptions {
        PromptOptions {
            clarify_below: 70,
            is_follow_up,
        }
    }

    #[test]
    fn classification_prompt_embeds_query_context_and_threshold() {
        let p = classification_prompt("  loose black tea  ", &context(), opts(false));
        assert!(p.contains("Product Description: \"loose black tea\""));
        assert!(p.contains("HS Code: 09024000 - Black tea"));
        assert!(p.contains("below 70"));
        assert!(p.contains("\"clarificationQuestions\""));
        assert!(p.contains("\"relatedCodes\""));
        assert!(!p.contains("already answered"));
    }

    #[test]
    fn follow_up_prompt_discourages_more_questions() {
        let p = classification_prompt("black tea, CTC, 25 kg sacks", &context(), opts(true));
        assert!(p.contains("already answered clarifying questions"));
    }

    #[test]
    fn raw_context_is_labelled() {
        let raw = TariffContext {
            text: "Chapter 9 Coffee, tea".into(),
            source: ContextSource::RawText,
            records_used: 0,
        };
        assert!(classification_prompt("tea", &raw, opts(false)).contains("raw excerpt"));
    }

    #[test]
    fn prompts_are_deterministic() {
        assert_eq!(
            classification_prompt("tea", &context(), opts(false)),
            classification_prompt("tea", &context(), opts(false))
        );
        assert_eq!(clarification_check_prompt("tea"), clarification_check_prompt("tea"));
    }

    #[test]
    fn clarification_check_asks_for_vagueness_fields() {
        let p = clarification_check_prompt("parts");
        for key in ["isTooVague", "specificityScore", "productType", "clarifications"] {
            assert!(p.contains(key), "missing {key}");
        }
        assert!(p.contains("\"parts\""));
    }
}
