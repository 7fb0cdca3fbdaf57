use std::sync::Arc;

use super::*;
use crate::test_support::ScriptedModel;

fn planner(model: &Arc<ScriptedModel>) -> ResearchPlanner {
    ResearchPlanner::new(
        Arc::clone(model) as Arc<dyn LanguageModel>,
        GenerationParams::new(512, 0.3),
    )
}

#[test]
fn parses_common_numbering_styles() {
    let output = "Here is the plan:\n\
                  1. What is personal data?\n\
                  2) Who is a controller?\n\
                  3: When does erasure apply?\n\
                  4- Are there exceptions?";

    assert_eq!(
        parse_numbered_list(output),
        vec![
            "What is personal data?",
            "Who is a controller?",
            "When does erasure apply?",
            "Are there exceptions?",
        ]
    );
}

#[test]
fn parses_bullets() {
    let output = "- First question\n* Second question\n• Third question";
    assert_eq!(
        parse_numbered_list(output),
        vec!["First question", "Second question", "Third question"]
    );
}

#[test]
fn spaced_separators_are_stripped() {
    let output = "1 - What is GDPR?\n2 - Who enforces it?\n3 . When did it apply?";
    assert_eq!(
        parse_numbered_list(output),
        vec!["What is GDPR?", "Who enforces it?", "When did it apply?"]
    );
}

#[test]
fn bold_numbered_items_are_unwrapped() {
    let output = "**Sub-questions**\n\
                  **1. What is GDPR?**\n\
                  **2.** Who enforces it?\n\
                  __3) What are the fines?__";
    assert_eq!(
        parse_numbered_list(output),
        vec!["What is GDPR?", "Who enforces it?", "What are the fines?"]
    );
}

#[test]
fn bullets_need_a_space() {
    let output = "*emphasis only*\n- Real item";
    assert_eq!(parse_numbered_list(output), vec!["Real item"]);
}

#[test]
fn two_digit_numbers_are_stripped() {
    let output = "10. Tenth\n11) Eleventh";
    assert_eq!(parse_numbered_list(output), vec!["Tenth", "Eleventh"]);
}

#[test]
fn digit_led_line_without_prefix_is_kept_whole() {
    let output = "2024 changes to the regulation?";
    assert_eq!(
        parse_numbered_list(output),
        vec!["2024 changes to the regulation?"]
    );
}

#[test]
fn prose_and_blank_items_are_ignored() {
    let output = "Sub-questions:\n\n1.   \nThe answer depends.\n  2.  Indented item  \n-";
    assert_eq!(parse_numbered_list(output), vec!["Indented item"]);
}

#[test]
fn decomposition_helpers() {
    let parsed = Decomposition::Parsed(vec!["a".to_string(), "b".to_string()]);
    assert!(!parsed.is_fallback());
    assert_eq!(parsed.into_questions(), vec!["a", "b"]);

    let fallback = Decomposition::Fallback("original".to_string());
    assert!(fallback.is_fallback());
    assert_eq!(fallback.into_questions(), vec!["original"]);
}

#[tokio::test]
async fn decompose_uses_model_output() {
    let model = Arc::new(ScriptedModel::new(["1. What is X?\n2. How does X work?"]));

    let decomposition = planner(&model).decompose("Explain X").await;

    assert_eq!(
        decomposition,
        Decomposition::Parsed(vec![
            "What is X?".to_string(),
            "How does X work?".to_string()
        ])
    );
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Research Question: Explain X"));
    assert_eq!(model.params()[0], GenerationParams::new(512, 0.3));
}

#[tokio::test]
async fn unparseable_output_falls_back() {
    let model = Arc::new(ScriptedModel::new(["I think you should just look it up."]));

    let decomposition = planner(&model).decompose("Explain X").await;

    assert_eq!(decomposition, Decomposition::Fallback("Explain X".to_string()));
}

#[tokio::test]
async fn model_failure_falls_back() {
    let model = Arc::new(ScriptedModel::default());
    model.push_err("model overloaded");

    let decomposition = planner(&model).decompose("Explain X").await;

    assert_eq!(decomposition, Decomposition::Fallback("Explain X".to_string()));
}

#[tokio::test]
async fn plan_counts_synthesis_step() {
    let model = Arc::new(ScriptedModel::new(["1. A?\n2. B?\n3. C?"]));

    let plan = planner(&model).create_plan("Complex").await;

    assert_eq!(plan.original_query, "Complex");
    assert_eq!(plan.sub_questions, vec!["A?", "B?", "C?"]);
    assert_eq!(plan.strategy, "sequential");
    assert_eq!(plan.estimated_steps, 4);
    assert!(!plan.fallback);
}

#[tokio::test]
async fn fallback_plan_has_one_question() {
    let model = Arc::new(ScriptedModel::new([""]));

    let plan = planner(&model).create_plan("Simple").await;

    assert_eq!(plan.sub_questions, vec!["Simple"]);
    assert_eq!(plan.estimated_steps, 2);
    assert!(plan.fallback);
}
