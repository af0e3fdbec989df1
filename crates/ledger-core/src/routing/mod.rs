//! Evaluador de ruteo: decide qué pasos están vencidos y si la raíz del
//! bosque quedó satisfecha o rechazada.

mod evaluator;

pub use evaluator::{Evaluation, NodeState, RoutingContext, RoutingEvaluator};
