//! Embedded prompt templates for the two oracle request shapes
//!
//! Templates are Handlebars, rendered against serde-serialized contexts.

use handlebars::Handlebars;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::llm::LlmError;
use crate::search::{Action, PlanningState};
use crate::tools::ToolSpec;

/// System prompt for action proposals
pub const PROPOSE_SYSTEM: &str = r#"You are the action-proposal component of a planning engine.
Given a goal, the actions taken so far and a catalogue of tools, propose the most promising next actions.

Respond with a JSON array. Each element is an object with:
- "tool": a tool name from the catalogue
- "input": the argument string for the tool
- "cost": optional integer estimate of the step's cost (1 = trivial)
- "expected_observation": optional short description of the result
- "plan_complete": true only when the goal is fully satisfied after this action

When the goal is already satisfied, propose a single action {"tool": "DONE", "plan_complete": true}."#;

/// User message for action proposals
pub const PROPOSE_USER: &str = r#"Goal: {{goal}}

{{#if earlier}}Earlier actions (summarized): {{earlier}}
{{/if}}{{#if recent}}Recent actions:
{{#each recent}}{{this}}
{{/each}}{{else}}No actions taken yet.
{{/if}}{{#if observation}}Current observation: {{observation}}
{{/if}}
Tools:
{{#each tools}}- {{name}}{{#if signature}}: {{signature}}{{/if}}{{#each constraints}} [{{this}}]{{/each}}
{{else}}No catalogue given; name whichever tools the goal needs.
{{/each}}{{#if avoid}}
Do not propose actions in these risk categories: {{#each avoid}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}
{{/if}}
Propose at most {{max_candidates}} actions.{{#if strict}}

IMPORTANT: your previous reply could not be parsed. Reply with ONLY the JSON array, no prose and no code fences.{{/if}}"#;

/// System prompt for cost estimates
pub const ESTIMATE_SYSTEM: &str = r#"You estimate how many more tool invocations are needed to reach a goal.
Reply with a single non-negative integer and nothing else. Reply 0 if the goal is already reached."#;

/// User message for cost estimates
pub const ESTIMATE_USER: &str = r#"Goal: {{goal}}
Actions so far ({{step_count}}): {{#each actions}}{{this}}{{#unless @last}} -> {{/unless}}{{/each}}
{{#if observation}}Current observation: {{observation}}
{{/if}}Remaining steps:"#;

#[derive(Debug, Serialize)]
struct ToolView<'a> {
    name: &'a str,
    signature: &'a str,
    constraints: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProposeContext<'a> {
    goal: &'a str,
    earlier: String,
    recent: Vec<String>,
    observation: &'a str,
    tools: Vec<ToolView<'a>>,
    avoid: &'a [String],
    max_candidates: usize,
    strict: bool,
}

#[derive(Debug, Serialize)]
struct EstimateContext<'a> {
    goal: &'a str,
    step_count: usize,
    actions: Vec<String>,
    observation: &'a str,
}

/// Renders oracle prompts
pub struct PromptRenderer {
    hbs: Handlebars<'static>,
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut hbs = Handlebars::new();
        // prompts are plain text, not HTML
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs }
    }

    /// Render the proposal user message
    pub fn propose(
        &self,
        state: &PlanningState,
        tools: &[ToolSpec],
        avoid: &[String],
        max_candidates: usize,
        history_window: usize,
        strict: bool,
    ) -> Result<String, LlmError> {
        debug!(depth = state.depth, strict, "PromptRenderer::propose: called");
        let (earlier, recent) = compress_history(&state.action_history, history_window);
        let context = ProposeContext {
            goal: &state.task_description,
            earlier,
            recent,
            observation: &state.current_observation,
            tools: tools
                .iter()
                .map(|t| ToolView {
                    name: &t.name,
                    signature: &t.signature,
                    constraints: t.ordering_constraints.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
            avoid,
            max_candidates,
            strict,
        };
        self.render(PROPOSE_USER, &context)
    }

    /// Render the estimate user message
    pub fn estimate(&self, state: &PlanningState) -> Result<String, LlmError> {
        debug!(depth = state.depth, "PromptRenderer::estimate: called");
        let context = EstimateContext {
            goal: &state.task_description,
            step_count: state.action_history.len(),
            actions: state.action_history.iter().map(Action::descriptor).collect(),
            observation: &state.current_observation,
        };
        self.render(ESTIMATE_USER, &context)
    }

    fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String, LlmError> {
        self.hbs
            .render_template(template, context)
            .map_err(|e| LlmError::Malformed(format!("prompt render failed: {}", e)))
    }
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Split history into a per-tool summary of older actions and the last `window` verbatim
pub fn compress_history(history: &[Action], window: usize) -> (String, Vec<String>) {
    let split = history.len().saturating_sub(window);
    let (older, recent) = history.split_at(split);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for action in older {
        *counts.entry(action.tool.as_str()).or_default() += 1;
    }
    let earlier = counts
        .iter()
        .map(|(tool, n)| format!("{} x{}", tool, n))
        .collect::<Vec<_>>()
        .join(", ");

    let recent = recent
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", split + i + 1, a.descriptor()))
        .collect();
    (earlier, recent)
}
