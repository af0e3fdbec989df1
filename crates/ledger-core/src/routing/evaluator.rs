use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::{ConfigurationError, EngineError};
use crate::model::{ActionStatus, ApprovalMode, WorkflowAction, WorkflowInstance};
use crate::step::{Connector, StepForest, StepNode};

/// Estado derivado de un nodo (hoja o grupo) o de la raíz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Ni satisfecho ni rechazado: todavía puede resolverse.
    Open,
    Satisfied,
    Rejected,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NodeState::Open)
    }
}

/// Atributos del documento y forma de la definición contra los que se evalúa.
#[derive(Debug, Clone, Copy)]
pub struct RoutingContext<'a> {
    pub forest: &'a StepForest,
    pub mode: ApprovalMode,
    pub root_connector: Connector,
    pub amount_in_base: Decimal,
    pub branch_id: Option<i64>,
}

impl<'a> RoutingContext<'a> {
    /// Contexto a partir del snapshot guardado en la instancia.
    pub fn for_instance(instance: &WorkflowInstance, forest: &'a StepForest) -> Self {
        Self { forest,
               mode: instance.approval_mode,
               root_connector: instance.root_connector,
               amount_in_base: instance.document_amount_in_base,
               branch_id: instance.branch_id }
    }
}

/// Resultado de una evaluación.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Estado de la raíz (conector raíz sobre los pasos de primer nivel).
    pub root: NodeState,
    /// Hojas vencidas en orden de recorrido. Vacío si la raíz es terminal.
    pub due: Vec<Uuid>,
    /// Estado de cada paso elegible.
    pub states: HashMap<Uuid, NodeState>,
    /// `order` del paso de primer nivel que contiene la primera hoja vencida.
    pub current_step_order: Option<i32>,
}

impl Evaluation {
    pub fn is_due(&self, step_id: &Uuid) -> bool {
        self.due.contains(step_id)
    }

    pub fn is_eligible(&self, step_id: &Uuid) -> bool {
        self.states.contains_key(step_id)
    }

    pub fn state_of(&self, step_id: &Uuid) -> Option<NodeState> {
        self.states.get(step_id).copied()
    }
}

/// Evaluador sin estado; todo lo que necesita llega en el contexto.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoutingEvaluator;

impl RoutingEvaluator {
    /// Recorre el bosque en profundidad.
    ///
    /// Una hoja es elegible si su compuerta contiene el monto y su regla
    /// admite la sucursal del documento; un grupo, si su compuerta contiene el
    /// monto y tiene al menos un hijo elegible. Los nodos no elegibles se
    /// ignoran por completo. Sin pasos de primer nivel elegibles la
    /// evaluación falla con `NoApplicableStep`.
    pub fn evaluate(&self, ctx: &RoutingContext<'_>, actions: &[WorkflowAction]) -> Result<Evaluation, EngineError> {
        let forest = ctx.forest;
        let decided: HashMap<Uuid, ActionStatus> = actions.iter().map(|a| (a.step_id, a.status)).collect();

        let mut eligible = vec![false; forest.len()];
        for &root in forest.roots() {
            mark_eligible(ctx, root, &mut eligible);
        }

        let mut states: Vec<Option<NodeState>> = vec![None; forest.len()];
        for &root in forest.roots() {
            resolve_state(forest, root, &eligible, &decided, &mut states);
        }

        let eligible_roots: Vec<usize> = forest.roots().iter().copied().filter(|i| eligible[*i]).collect();
        if eligible_roots.is_empty() {
            return Err(ConfigurationError::NoApplicableStep { amount_in_base: ctx.amount_in_base,
                                                              branch_id: ctx.branch_id }.into());
        }
        let root = combine(ctx.root_connector, eligible_roots.iter().filter_map(|i| states[*i]));

        let mut due = Vec::new();
        if root == NodeState::Open {
            collect_due(ctx, &eligible_roots, &states, &mut due);
        }
        let current_step_order = due.first()
                                    .and_then(|id| forest.top_level_of(id))
                                    .map(|step| step.order);

        let states = states.into_iter()
                           .enumerate()
                           .filter_map(|(idx, st)| Some((forest.at(idx)?.id, st?)))
                           .collect();
        Ok(Evaluation { root, due, states, current_step_order })
    }
}

fn mark_eligible(ctx: &RoutingContext<'_>, idx: usize, eligible: &mut [bool]) -> bool {
    let Some(step) = ctx.forest.at(idx) else {
        return false;
    };
    let gate_ok = step.gate.contains(ctx.amount_in_base);
    let ok = match &step.node {
        StepNode::Approval { rule } => gate_ok && rule.matches_branch(ctx.branch_id),
        StepNode::Group { .. } => {
            let mut any_child = false;
            for &child in ctx.forest.children_of(idx) {
                any_child |= mark_eligible(ctx, child, eligible);
            }
            gate_ok && any_child
        }
    };
    eligible[idx] = ok;
    ok
}

fn resolve_state(forest: &StepForest,
                 idx: usize,
                 eligible: &[bool],
                 decided: &HashMap<Uuid, ActionStatus>,
                 states: &mut [Option<NodeState>])
                 -> Option<NodeState> {
    if !eligible[idx] {
        return None;
    }
    let step = forest.at(idx)?;
    let state = match step.node {
        StepNode::Approval { .. } => match decided.get(&step.id) {
            Some(ActionStatus::Approved) => NodeState::Satisfied,
            Some(ActionStatus::Rejected) => NodeState::Rejected,
            _ => NodeState::Open,
        },
        StepNode::Group { connector } => {
            let mut child_states = Vec::new();
            for &child in forest.children_of(idx) {
                if let Some(st) = resolve_state(forest, child, eligible, decided, states) {
                    child_states.push(st);
                }
            }
            combine(connector, child_states)
        }
    };
    states[idx] = Some(state);
    Some(state)
}

/// AND: un rechazo rechaza, todos satisfechos satisface. OR: una
/// satisfacción satisface, todos rechazados rechaza.
fn combine(connector: Connector, children: impl IntoIterator<Item = NodeState>) -> NodeState {
    let children: Vec<NodeState> = children.into_iter().collect();
    if children.is_empty() {
        return NodeState::Open;
    }
    match connector {
        Connector::And => {
            if children.contains(&NodeState::Rejected) {
                NodeState::Rejected
            } else if children.iter().all(|s| *s == NodeState::Satisfied) {
                NodeState::Satisfied
            } else {
                NodeState::Open
            }
        }
        Connector::Or => {
            if children.contains(&NodeState::Satisfied) {
                NodeState::Satisfied
            } else if children.iter().all(|s| *s == NodeState::Rejected) {
                NodeState::Rejected
            } else {
                NodeState::Open
            }
        }
    }
}

/// Sólo los nodos abiertos vencen. En modo secuencial un hermano vence
/// cuando todos los anteriores elegibles ya terminaron.
fn collect_due(ctx: &RoutingContext<'_>, siblings: &[usize], states: &[Option<NodeState>], due: &mut Vec<Uuid>) {
    let forest = ctx.forest;
    for &idx in siblings {
        let Some(state) = states[idx] else {
            continue;
        };
        if state.is_terminal() {
            continue;
        }
        let Some(step) = forest.at(idx) else {
            continue;
        };
        match step.node {
            StepNode::Approval { .. } => due.push(step.id),
            StepNode::Group { .. } => {
                let children: Vec<usize> = forest.children_of(idx)
                                                 .iter()
                                                 .copied()
                                                 .filter(|c| states[*c].is_some())
                                                 .collect();
                collect_due(ctx, &children, states, due);
            }
        }
        if ctx.mode == ApprovalMode::Sequential {
            break;
        }
    }
}
