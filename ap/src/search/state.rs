//! Planning states and the per-session arena that owns them
//!
//! States form a tree rooted at the initial state. Children refer to their
//! parent by `StateId` (an index into the arena), so the whole tree is freed
//! in one go when the arena is dropped at the end of a planning call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use tracing::debug;

/// Cost of an action when the oracle gives no hint
pub const DEFAULT_ACTION_COST: u64 = 1;

/// Upper bound applied to oracle cost hints
pub const MAX_COST_HINT: u64 = 100;

/// One tool invocation in a plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    /// Tool name from the catalogue
    pub tool: String,

    /// Free-form input for the tool
    #[serde(default)]
    pub input: String,

    /// Step cost added to g
    pub cost: u64,

    /// The oracle declared the goal satisfied after this action
    #[serde(default, alias = "plan-complete")]
    pub plan_complete: bool,
}

impl Action {
    pub fn new(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            input: input.into(),
            cost: DEFAULT_ACTION_COST,
            plan_complete: false,
        }
    }

    /// Apply an oracle cost hint, clamped into `1..=MAX_COST_HINT`
    pub fn with_cost_hint(mut self, hint: Option<u64>) -> Self {
        self.cost = hint.map_or(DEFAULT_ACTION_COST, |h| h.clamp(1, MAX_COST_HINT));
        self
    }

    pub fn completing(mut self, plan_complete: bool) -> Self {
        self.plan_complete = plan_complete;
        self
    }

    /// Human-readable descriptor, e.g. `book_flight(SFO->JFK)`
    pub fn descriptor(&self) -> String {
        if self.input.is_empty() {
            self.tool.clone()
        } else {
            format!("{}({})", self.tool, self.input)
        }
    }

    /// Canonical form used for signatures and experience lookups
    pub fn normalized(&self) -> String {
        experiencestore::normalize_descriptor(&self.descriptor())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

/// Index of a state inside its `StateArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub u32);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A hypothetical task state reached by a sequence of actions
#[derive(Debug, Clone)]
pub struct PlanningState {
    pub id: StateId,
    pub task_description: Arc<str>,
    pub action_history: Vec<Action>,
    pub current_observation: String,
    pub parent: Option<StateId>,
    /// Always equals the summed cost of `action_history`
    pub g_score: u64,
    pub depth: u32,
    pub plan_complete: bool,
}

impl PlanningState {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.action_history.last()
    }
}

/// Owner of every state generated during one planning call
#[derive(Debug, Default)]
pub struct StateArena {
    states: Vec<PlanningState>,
}

impl StateArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the root state: empty history, g = 0
    pub fn create_initial(&mut self, task_description: &str) -> StateId {
        debug!(%task_description, "StateArena::create_initial: called");
        let id = self.next_id();
        self.states.push(PlanningState {
            id,
            task_description: Arc::from(task_description),
            action_history: Vec::new(),
            current_observation: String::new(),
            parent: None,
            g_score: 0,
            depth: 0,
            plan_complete: false,
        });
        id
    }

    /// Create a child of `parent` by applying `action`
    pub fn expand(&mut self, parent: StateId, action: Action, observation: impl Into<String>) -> StateId {
        let id = self.next_id();
        let p = &self.states[parent.index()];
        debug!(%parent, %id, action = %action, "StateArena::expand: called");

        let mut action_history = Vec::with_capacity(p.action_history.len() + 1);
        action_history.extend_from_slice(&p.action_history);
        let g_score = p.g_score.saturating_add(action.cost);
        let plan_complete = action.plan_complete;
        action_history.push(action);

        let child = PlanningState {
            id,
            task_description: Arc::clone(&p.task_description),
            action_history,
            current_observation: observation.into(),
            parent: Some(parent),
            g_score,
            depth: p.depth + 1,
            plan_complete,
        };
        self.states.push(child);
        id
    }

    /// Walk parent links from `id` back to the root; returned root-first
    pub fn reconstruct_path(&self, id: StateId) -> Vec<StateId> {
        let mut path = vec![id];
        let mut cursor = self.states[id.index()].parent;
        while let Some(parent) = cursor {
            path.push(parent);
            cursor = self.states[parent.index()].parent;
        }
        path.reverse();
        path
    }

    pub fn get(&self, id: StateId) -> Option<&PlanningState> {
        self.states.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanningState> {
        self.states.iter()
    }

    fn next_id(&self) -> StateId {
        StateId(self.states.len() as u32)
    }
}

impl Index<StateId> for StateArena {
    type Output = PlanningState;

    fn index(&self, id: StateId) -> &Self::Output {
        &self.states[id.index()]
    }
}
