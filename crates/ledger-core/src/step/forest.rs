use std::collections::HashSet;

use indexmap::IndexMap;
use uuid::Uuid;

use super::{StepNode, WorkflowStep};
use crate::errors::DefinitionError;

/// Bosque de pasos indexado (arena).
///
/// Los nodos viven en un `IndexMap` por id; la topología se guarda como
/// índices, de modo que recorrerlo no requiere punteros entre pasos. Los
/// hijos y las raíces quedan ordenados por `(order, posición de inserción)`.
#[derive(Debug, Clone)]
pub struct StepForest {
    steps: IndexMap<Uuid, WorkflowStep>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl StepForest {
    /// Construye y valida el bosque.
    ///
    /// Rechaza: lista vacía, ids repetidos, padres desconocidos, ciclos,
    /// compuertas contradictorias, hojas con hijos y grupos sin hijos.
    pub fn build(steps: &[WorkflowStep]) -> Result<Self, DefinitionError> {
        if steps.is_empty() {
            return Err(DefinitionError::Empty);
        }
        let mut map: IndexMap<Uuid, WorkflowStep> = IndexMap::with_capacity(steps.len());
        for step in steps {
            if map.insert(step.id, step.clone()).is_some() {
                return Err(DefinitionError::DuplicateStep(step.id));
            }
        }
        for step in map.values() {
            if let Some(parent) = step.parent_id {
                if !map.contains_key(&parent) {
                    return Err(DefinitionError::UnknownParent { step: step.id, parent });
                }
            }
        }
        // Una cadena de padres más larga que el número de pasos implica ciclo.
        for step in map.values() {
            let mut seen = HashSet::new();
            let mut cursor = step.parent_id;
            while let Some(parent) = cursor {
                if parent == step.id || !seen.insert(parent) {
                    return Err(DefinitionError::Cycle(step.id));
                }
                cursor = map.get(&parent).and_then(|p| p.parent_id);
            }
        }
        for step in map.values() {
            if !step.gate.is_consistent() {
                return Err(DefinitionError::ContradictoryGate(step.id));
            }
        }

        let mut children = vec![Vec::new(); map.len()];
        let mut roots = Vec::new();
        for (idx, step) in map.values().enumerate() {
            match step.parent_id.and_then(|p| map.get_index_of(&p)) {
                Some(parent_idx) => children[parent_idx].push(idx),
                None => roots.push(idx),
            }
        }
        for (idx, step) in map.values().enumerate() {
            match step.node {
                StepNode::Approval { .. } if !children[idx].is_empty() => {
                    return Err(DefinitionError::ApprovalWithChildren(step.id));
                }
                StepNode::Group { .. } if children[idx].is_empty() => {
                    return Err(DefinitionError::EmptyGroup(step.id));
                }
                _ => {}
            }
        }

        let order_of = |i: &usize| map.get_index(*i).map(|(_, s)| s.order).unwrap_or(i32::MAX);
        for list in children.iter_mut() {
            list.sort_by_key(|i| (order_of(i), *i));
        }
        roots.sort_by_key(|i| (order_of(i), *i));

        Ok(Self { steps: map, children, roots })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&WorkflowStep> {
        self.steps.get(id)
    }

    pub fn index_of(&self, id: &Uuid) -> Option<usize> {
        self.steps.get_index_of(id)
    }

    pub fn at(&self, idx: usize) -> Option<&WorkflowStep> {
        self.steps.get_index(idx).map(|(_, s)| s)
    }

    /// Índices de los pasos de primer nivel, ordenados.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Índices de los hijos directos, ordenados.
    pub fn children_of(&self, idx: usize) -> &[usize] {
        self.children.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestro de primer nivel del paso (él mismo si es raíz).
    pub fn top_level_of(&self, id: &Uuid) -> Option<&WorkflowStep> {
        let mut current = self.steps.get(id)?;
        while let Some(parent) = current.parent_id {
            current = self.steps.get(&parent)?;
        }
        Some(current)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.steps.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{AmountGate, ApproverRule, Connector};
    use rust_decimal_macros::dec;

    fn leaf(order: i32) -> WorkflowStep {
        WorkflowStep::approval(format!("leaf-{order}"), order, ApproverRule::user("u"))
    }

    #[test]
    fn empty_definition_rejected() {
        assert_eq!(StepForest::build(&[]).unwrap_err(), DefinitionError::Empty);
    }

    #[test]
    fn roots_and_children_are_ordered() {
        let group = WorkflowStep::group("g", 1, Connector::And);
        let a = leaf(2).under(group.id);
        let b = leaf(1).under(group.id);
        let top = leaf(0);
        let forest = StepForest::build(&[group.clone(), a.clone(), b.clone(), top.clone()]).unwrap();
        let roots: Vec<Uuid> = forest.roots().iter().map(|i| forest.at(*i).unwrap().id).collect();
        assert_eq!(roots, vec![top.id, group.id]);
        let gidx = forest.index_of(&group.id).unwrap();
        let kids: Vec<Uuid> = forest.children_of(gidx).iter().map(|i| forest.at(*i).unwrap().id).collect();
        assert_eq!(kids, vec![b.id, a.id]);
        assert_eq!(forest.top_level_of(&a.id).unwrap().id, group.id);
    }

    #[test]
    fn cycle_detected() {
        let a_id = Uuid::new_v4();
        let b_id = Uuid::new_v4();
        let a = WorkflowStep::group("a", 1, Connector::Or).with_id(a_id).under(b_id);
        let b = WorkflowStep::group("b", 2, Connector::Or).with_id(b_id).under(a_id);
        assert!(matches!(StepForest::build(&[a, b]), Err(DefinitionError::Cycle(_))));
    }

    #[test]
    fn unknown_parent_and_duplicates_rejected() {
        let orphan = leaf(1).under(Uuid::new_v4());
        assert!(matches!(StepForest::build(&[orphan]),
                         Err(DefinitionError::UnknownParent { .. })));
        let dup = leaf(1);
        assert_eq!(StepForest::build(&[dup.clone(), dup.clone()]).unwrap_err(),
                   DefinitionError::DuplicateStep(dup.id));
    }

    #[test]
    fn structural_errors() {
        let g = WorkflowStep::group("g", 1, Connector::And);
        assert_eq!(StepForest::build(&[g.clone()]).unwrap_err(), DefinitionError::EmptyGroup(g.id));

        let l = leaf(1);
        let child = leaf(2).under(l.id);
        assert_eq!(StepForest::build(&[l.clone(), child]).unwrap_err(),
                   DefinitionError::ApprovalWithChildren(l.id));

        let bad = leaf(1).gated(AmountGate::between(dec!(10), dec!(1)));
        assert_eq!(StepForest::build(&[bad.clone()]).unwrap_err(),
                   DefinitionError::ContradictoryGate(bad.id));
    }
}
