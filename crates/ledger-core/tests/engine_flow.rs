mod support;

use std::sync::Arc;

use ledger_core::{ActionStatus, AmountGate, ApprovalMode, ApproverRule, ConcurrencyError, ConfigurationError,
                  Connector, Decision, DocumentStatus, DocumentType, EngineError, InstanceStatus, RecordingNotifier,
                  SentNotification, WorkflowDefinition, WorkflowEventKind, WorkflowStep};
use rust_decimal_macros::dec;
use support::{engine, engine_with, submission, SimpleMapper, CASH, EXPENSE};

#[test]
fn payment_voucher_branch_approval_posts_balanced_entry() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("branch sign-off", 1, ApproverRule::branch(Some(1)))
        .gated(AmountGate::at_least(dec!(0)));
    let def = WorkflowDefinition::new("pv", DocumentType::PaymentVoucher).with_step(step.clone());
    engine.save_definition(&def).unwrap();

    let sub = submission(DocumentType::PaymentVoucher, 77, dec!(8000), Some(1));
    let instance = engine.open_instance(&sub).unwrap();
    assert_eq!(instance.status, InstanceStatus::Pending);
    let actions = engine.actions(instance.id).unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].step_id, step.id);

    let out = engine.approve(instance.id, step.id, "branch1-user").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
    assert!(out.instance.completed_at.is_some());
    let entry = out.journal_entry.expect("entry posted");
    assert_eq!(entry.lines.len(), 2);
    assert_eq!(entry.total_debit, dec!(8000.00));
    assert_eq!(entry.total_credit, dec!(8000.00));
    assert!(entry.is_balanced());
    assert_eq!(entry.number, 1);
    assert_eq!(entry.lines.iter().filter(|l| l.debit > dec!(0)).count(), 1);
    assert_eq!(entry.lines.iter().find(|l| l.debit > dec!(0)).unwrap().account_id, EXPENSE);
    assert_eq!(entry.lines.iter().find(|l| l.credit > dec!(0)).unwrap().account_id, CASH);

    let state = engine.document_state(sub.document).unwrap().unwrap();
    assert_eq!(state.status, DocumentStatus::Posted);
    assert_eq!(state.journal_entry_id, Some(entry.id));
    assert_eq!(engine.journal_entry_for_document(sub.document).unwrap().unwrap().id, entry.id);

    let kinds: Vec<&str> = engine.events(instance.id)
                                 .unwrap()
                                 .iter()
                                 .map(|e| e.kind.event_type())
                                 .collect();
    assert_eq!(kinds,
               vec!["instance_opened", "action_created", "action_decided", "instance_approved", "entry_posted"]);
}

#[test]
fn amount_gate_boundary_routes_to_single_step() {
    let (engine, _) = engine();
    let a = WorkflowStep::approval("A", 1, ApproverRule::user("u-a")).gated(AmountGate::between(dec!(0), dec!(10000)));
    let b = WorkflowStep::approval("B", 2, ApproverRule::user("u-b")).gated(AmountGate::at_least(dec!(10000)));
    let def = WorkflowDefinition::new("gated", DocumentType::ReceiptVoucher).with_step(a.clone())
                                                                             .with_step(b.clone());
    engine.save_definition(&def).unwrap();

    let low = engine.open_instance(&submission(DocumentType::ReceiptVoucher, 1, dec!(5000), None)).unwrap();
    let steps: Vec<_> = engine.actions(low.id).unwrap().iter().map(|a| a.step_id).collect();
    assert_eq!(steps, vec![a.id]);

    let edge = engine.open_instance(&submission(DocumentType::ReceiptVoucher, 2, dec!(10000), None)).unwrap();
    let steps: Vec<_> = engine.actions(edge.id).unwrap().iter().map(|a| a.step_id).collect();
    assert_eq!(steps, vec![b.id]);
}

#[test]
fn and_composite_approves_exactly_once() {
    let (engine, _) = engine();
    let g = WorkflowStep::group("dual control", 1, Connector::And);
    let c1 = WorkflowStep::approval("controller", 1, ApproverRule::permission("vouchers.approve")).under(g.id);
    let c2 = WorkflowStep::approval("manager", 2, ApproverRule::user("manager")).under(g.id);
    let def = WorkflowDefinition::new("and", DocumentType::DisbursementVoucher).with_step(g)
                                                                                .with_step(c1.clone())
                                                                                .with_step(c2.clone());
    engine.save_definition(&def).unwrap();
    let inst = engine.open_instance(&submission(DocumentType::DisbursementVoucher, 5, dec!(120), None)).unwrap();
    assert_eq!(engine.actions(inst.id).unwrap().len(), 2);

    let first = engine.approve(inst.id, c1.id, "controller").unwrap();
    assert_eq!(first.instance.status, InstanceStatus::Pending);
    assert!(first.journal_entry.is_none());

    let second = engine.approve(inst.id, c2.id, "manager").unwrap();
    assert_eq!(second.instance.status, InstanceStatus::Approved);
    assert!(second.journal_entry.is_some());

    let again = engine.approve(inst.id, c2.id, "manager").unwrap_err();
    assert!(matches!(again, EngineError::Concurrency(ConcurrencyError::InstanceTerminal { .. })));
    let approvals = engine.events(inst.id)
                          .unwrap()
                          .into_iter()
                          .filter(|e| e.kind == WorkflowEventKind::InstanceApproved)
                          .count();
    assert_eq!(approvals, 1);
}

#[test]
fn or_composite_stays_due_until_all_children_rejected() {
    let (engine, _) = engine();
    let g = WorkflowStep::group("any manager", 1, Connector::Or);
    let c1 = WorkflowStep::approval("m1", 1, ApproverRule::user("m1")).under(g.id);
    let c2 = WorkflowStep::approval("m2", 2, ApproverRule::user("m2")).under(g.id);
    let def = WorkflowDefinition::new("or", DocumentType::AssetExpense).with_step(g)
                                                                        .with_step(c1.clone())
                                                                        .with_step(c2.clone());
    engine.save_definition(&def).unwrap();
    let sub = submission(DocumentType::AssetExpense, 9, dec!(300), None);
    let inst = engine.open_instance(&sub).unwrap();

    let out = engine.reject(inst.id, c1.id, "m1", Some("wrong cost center")).unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Pending);
    assert_eq!(out.action.notes.as_deref(), Some("wrong cost center"));

    let out = engine.reject(inst.id, c2.id, "m2", None).unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Rejected);
    assert!(out.journal_entry.is_none());
    assert!(engine.journal_entry_for_document(sub.document).unwrap().is_none());
    assert_eq!(engine.document_state(sub.document).unwrap().unwrap().status,
               DocumentStatus::Rejected);
}

#[test]
fn or_sibling_withdrawn_once_satisfied() {
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = engine_with(Arc::new(SimpleMapper::default()), notifier.clone());
    let g = WorkflowStep::group("any manager", 1, Connector::Or);
    let c1 = WorkflowStep::approval("m1", 1, ApproverRule::user("m1")).under(g.id);
    let c2 = WorkflowStep::approval("m2", 2, ApproverRule::user("m2")).under(g.id);
    let def = WorkflowDefinition::new("or", DocumentType::AssetExpense).with_step(g)
                                                                        .with_step(c1.clone())
                                                                        .with_step(c2.clone());
    engine.save_definition(&def).unwrap();
    let inst = engine.open_instance(&submission(DocumentType::AssetExpense, 10, dec!(300), None)).unwrap();

    let out = engine.approve(inst.id, c1.id, "m1").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
    let c2_action = engine.actions(inst.id)
                          .unwrap()
                          .into_iter()
                          .find(|a| a.step_id == c2.id)
                          .unwrap();
    assert_eq!(c2_action.status, ActionStatus::Withdrawn);

    let sent = notifier.sent();
    assert!(sent.contains(&SentNotification::Created { instance_id: inst.id,
                                                       step_id: c2.id,
                                                       candidates: vec!["m2".into()] }));
    assert!(sent.contains(&SentNotification::Resolved { instance_id: inst.id,
                                                        step_id: c2.id,
                                                        status: ActionStatus::Withdrawn }));
}

#[test]
fn second_identical_decision_is_concurrency_error_without_duplicate_entry() {
    let (engine, _) = engine();
    let a = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    let b = WorkflowStep::approval("B", 2, ApproverRule::user("bob"));
    let def = WorkflowDefinition::new("two", DocumentType::PaymentVoucher).with_step(a.clone())
                                                                           .with_step(b.clone());
    engine.save_definition(&def).unwrap();
    let sub = submission(DocumentType::PaymentVoucher, 3, dec!(50), None);
    let inst = engine.open_instance(&sub).unwrap();

    engine.approve(inst.id, a.id, "ana").unwrap();
    let err = engine.approve(inst.id, a.id, "ana").unwrap_err();
    assert_eq!(err,
               EngineError::Concurrency(ConcurrencyError::ActionAlreadyDecided { step_id: a.id,
                                                                                 status: ActionStatus::Approved }));
    engine.approve(inst.id, b.id, "bob").unwrap();
    let err = engine.approve(inst.id, b.id, "bob").unwrap_err();
    assert!(matches!(err, EngineError::Concurrency(_)));
    let entry = engine.journal_entry_for_document(sub.document).unwrap().unwrap();
    // el contador sólo avanzó una vez
    assert_eq!(engine.next_number("JournalEntry", entry.fiscal_year).unwrap(), 2);
}

#[test]
fn unauthorized_actor_changes_nothing() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("branch", 1, ApproverRule::branch(None));
    let def = WorkflowDefinition::new("b", DocumentType::PaymentVoucher).with_step(step.clone());
    engine.save_definition(&def).unwrap();
    let inst = engine.open_instance(&submission(DocumentType::PaymentVoucher, 4, dec!(10), Some(1))).unwrap();

    let err = engine.approve(inst.id, step.id, "branch2-user").unwrap_err();
    assert_eq!(err,
               EngineError::Authorization { actor_id: "branch2-user".into(),
                                            step_id: step.id });
    let action = &engine.actions(inst.id).unwrap()[0];
    assert_eq!(action.status, ActionStatus::Pending);
    assert_eq!(engine.instance(inst.id).unwrap().status, InstanceStatus::Pending);

    assert!(engine.approve(inst.id, step.id, "branch1-user").is_ok());
}

#[test]
fn posting_invariant_failure_rolls_back_approval() {
    let (engine, mapper) = engine();
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    let def = WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(step.clone());
    engine.save_definition(&def).unwrap();
    let sub = submission(DocumentType::PaymentVoucher, 11, dec!(500), None);
    let inst = engine.open_instance(&sub).unwrap();

    *mapper.broken.lock().unwrap() = true;
    let err = engine.approve(inst.id, step.id, "ana").unwrap_err();
    assert!(matches!(err, EngineError::PostingInvariant(_)));
    assert!(err.is_system_fault());
    assert_eq!(engine.instance(inst.id).unwrap().status, InstanceStatus::Pending);
    assert_eq!(engine.actions(inst.id).unwrap()[0].status, ActionStatus::Pending);
    assert!(engine.journal_entry_for_document(sub.document).unwrap().is_none());

    *mapper.broken.lock().unwrap() = false;
    let out = engine.approve(inst.id, step.id, "ana").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
    assert!(out.journal_entry.unwrap().is_balanced());
}

#[test]
fn missing_account_mapping_is_configuration_fault() {
    let (engine, mapper) = engine();
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    let def = WorkflowDefinition::new("d", DocumentType::DynamicScreenEntry).with_step(step.clone());
    engine.save_definition(&def).unwrap();
    let inst = engine.open_instance(&submission(DocumentType::DynamicScreenEntry, 1, dec!(5), None)).unwrap();
    *mapper.missing.lock().unwrap() = true;
    let err = engine.approve(inst.id, step.id, "ana").unwrap_err();
    assert!(matches!(err, EngineError::Configuration(ConfigurationError::MissingAccountMapping(_))));
    assert_eq!(engine.instance(inst.id).unwrap().status, InstanceStatus::Pending);
}

#[test]
fn cancel_only_while_pending() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    let def = WorkflowDefinition::new("d", DocumentType::ReceiptVoucher).with_step(step.clone());
    engine.save_definition(&def).unwrap();
    let sub = submission(DocumentType::ReceiptVoucher, 21, dec!(5), None);
    let inst = engine.open_instance(&sub).unwrap();

    let cancelled = engine.cancel(inst.id, "clerk").unwrap();
    assert_eq!(cancelled.status, InstanceStatus::Cancelled);
    assert_eq!(engine.actions(inst.id).unwrap()[0].status, ActionStatus::Withdrawn);
    assert_eq!(engine.document_state(sub.document).unwrap().unwrap().status,
               DocumentStatus::Cancelled);

    assert_eq!(engine.cancel(inst.id, "clerk").unwrap_err(),
               EngineError::InvalidStateTransition { from: InstanceStatus::Cancelled,
                                                     to: InstanceStatus::Cancelled });
    assert!(matches!(engine.approve(inst.id, step.id, "ana").unwrap_err(),
                     EngineError::Concurrency(ConcurrencyError::InstanceTerminal { .. })));
    assert!(matches!(engine.post(inst.id).unwrap_err(),
                     EngineError::InvalidStateTransition { .. }));

    // el documento puede volver a enviarse tras la cancelación
    let reopened = engine.open_instance(&sub).unwrap();
    assert_ne!(reopened.id, inst.id);
    assert_eq!(engine.instance_for_document(sub.document).unwrap().unwrap().id, reopened.id);
}

#[test]
fn repost_of_posted_instance_is_invalid_transition() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    engine.save_definition(&WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(step.clone()))
          .unwrap();
    let sub = submission(DocumentType::PaymentVoucher, 31, dec!(5), None);
    let inst = engine.open_instance(&sub).unwrap();
    engine.approve(inst.id, step.id, "ana").unwrap();
    assert_eq!(engine.post(inst.id).unwrap_err(),
               EngineError::InvalidStateTransition { from: InstanceStatus::Approved,
                                                     to: InstanceStatus::Approved });
    assert!(matches!(engine.open_instance(&sub).unwrap_err(),
                     EngineError::Concurrency(ConcurrencyError::AlreadyPosted(_))));
}

#[test]
fn open_failures_leave_no_instance() {
    let (engine, _) = engine();
    let err = engine.open_instance(&submission(DocumentType::PaymentVoucher, 1, dec!(5), None))
                    .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(ConfigurationError::NoActiveDefinition { .. })));

    let big = WorkflowStep::approval("big", 1, ApproverRule::user("cfo")).gated(AmountGate::at_least(dec!(1000)));
    engine.save_definition(&WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(big))
          .unwrap();
    let sub = submission(DocumentType::PaymentVoucher, 1, dec!(5), None);
    let err = engine.open_instance(&sub).unwrap_err();
    assert!(matches!(err, EngineError::Configuration(ConfigurationError::NoApplicableStep { .. })));
    assert!(engine.instance_for_document(sub.document).unwrap().is_none());
    assert!(engine.document_state(sub.document).unwrap().is_none());
}

#[test]
fn duplicate_pending_instance_rejected() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    engine.save_definition(&WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(step))
          .unwrap();
    let sub = submission(DocumentType::PaymentVoucher, 8, dec!(5), None);
    engine.open_instance(&sub).unwrap();
    assert_eq!(engine.open_instance(&sub).unwrap_err(),
               EngineError::Concurrency(ConcurrencyError::PendingInstanceExists(sub.document)));
}

#[test]
fn deactivated_definition_keeps_open_instances_running() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    let def = WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(step.clone());
    engine.save_definition(&def).unwrap();
    let inst = engine.open_instance(&submission(DocumentType::PaymentVoucher, 1, dec!(5), None)).unwrap();

    engine.set_definition_active(def.id, false).unwrap();
    assert!(matches!(engine.delete_definition(def.id).unwrap_err(),
                     EngineError::Configuration(ConfigurationError::DefinitionInUse(_))));
    assert!(engine.open_instance(&submission(DocumentType::PaymentVoucher, 2, dec!(5), None)).is_err());

    // la definición cambia, la instancia sigue con su snapshot
    let mut edited = def.clone();
    edited.steps = vec![WorkflowStep::approval("other", 1, ApproverRule::user("zoe"))];
    engine.save_definition(&edited).unwrap();
    let out = engine.approve(inst.id, step.id, "ana").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
    assert_eq!(out.instance.definition_hash, inst.definition_hash);
}

#[test]
fn unused_definition_can_be_deleted() {
    let (engine, _) = engine();
    let def = WorkflowDefinition::new("d", DocumentType::PaymentVoucher)
        .with_step(WorkflowStep::approval("A", 1, ApproverRule::user("ana")));
    engine.save_definition(&def).unwrap();
    engine.delete_definition(def.id).unwrap();
    assert!(matches!(engine.definition(def.id).unwrap_err(), EngineError::NotFound(_)));
}

#[test]
fn invalid_definition_rejected_on_save() {
    let (engine, _) = engine();
    let group = WorkflowStep::group("g", 1, Connector::And);
    let def = WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(group);
    assert!(matches!(engine.save_definition(&def).unwrap_err(),
                     EngineError::Configuration(ConfigurationError::InvalidDefinition(_))));
    assert!(engine.definitions(None).unwrap().is_empty());
}

#[test]
fn branch_scoped_definition_wins() {
    let (engine, _) = engine();
    let global = WorkflowDefinition::new("global", DocumentType::PaymentVoucher)
        .with_step(WorkflowStep::approval("A", 1, ApproverRule::user("ana")));
    let scoped = WorkflowDefinition::new("branch 2", DocumentType::PaymentVoucher)
        .for_branch(2)
        .with_step(WorkflowStep::approval("B", 1, ApproverRule::branch(None)));
    engine.save_definition(&global).unwrap();
    engine.save_definition(&scoped).unwrap();
    assert_eq!(engine.find_active_definition(DocumentType::PaymentVoucher, Some(2)).unwrap().id,
               scoped.id);
    assert_eq!(engine.find_active_definition(DocumentType::PaymentVoucher, Some(1)).unwrap().id,
               global.id);
}

#[test]
fn sequential_mode_opens_steps_in_order() {
    let (engine, _) = engine();
    let a = WorkflowStep::approval("clerk review", 1, ApproverRule::user("ana"));
    let b = WorkflowStep::approval("controller", 2, ApproverRule::permission("vouchers.approve"));
    let def = WorkflowDefinition::new("seq", DocumentType::DisbursementVoucher).with_mode(ApprovalMode::Sequential)
                                                                                .with_step(a.clone())
                                                                                .with_step(b.clone());
    engine.save_definition(&def).unwrap();
    let inst = engine.open_instance(&submission(DocumentType::DisbursementVoucher, 1, dec!(5), None)).unwrap();
    assert_eq!(inst.current_step_order, Some(1));
    assert_eq!(engine.actions(inst.id).unwrap().len(), 1);
    assert!(matches!(engine.approve(inst.id, b.id, "controller").unwrap_err(),
                     EngineError::StepNotDue { .. }));

    let out = engine.decide(inst.id, a.id, "ana", Decision::Approve, None).unwrap();
    assert_eq!(out.new_actions.len(), 1);
    assert_eq!(out.new_actions[0].step_id, b.id);
    assert_eq!(out.instance.current_step_order, Some(2));

    let inbox = engine.pending_actions_for("auditor").unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].step_id, b.id);
    assert!(engine.pending_actions_for("ana").unwrap().is_empty());

    let out = engine.approve(inst.id, b.id, "auditor").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
}

#[test]
fn failing_notifier_does_not_block_decisions() {
    let engine = engine_with(Arc::new(SimpleMapper::default()), Arc::new(RecordingNotifier::failing()));
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    engine.save_definition(&WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(step.clone()))
          .unwrap();
    let inst = engine.open_instance(&submission(DocumentType::PaymentVoucher, 1, dec!(5), None)).unwrap();
    let out = engine.approve(inst.id, step.id, "ana").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
}

#[test]
fn foreign_currency_document_posts_in_base_currency() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("A", 1, ApproverRule::user("ana"));
    engine.save_definition(&WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(step.clone()))
          .unwrap();
    let mut sub = submission(DocumentType::PaymentVoucher, 41, dec!(0), None);
    sub.original_amount = dec!(100.005);
    sub.exchange_rate = dec!(3.75);
    sub.amount_in_base = dec!(375.02);
    sub.currency_id = 2;
    let inst = engine.open_instance(&sub).unwrap();
    let entry = engine.approve(inst.id, step.id, "ana").unwrap().journal_entry.unwrap();
    assert_eq!(entry.currency_id, 1);
    assert_eq!(entry.total_debit, entry.total_credit);
    assert_eq!(entry.total_debit, dec!(375.02));
}

#[test]
fn understated_base_amount_cannot_dodge_a_gate() {
    let (engine, _) = engine();
    let clerk = WorkflowStep::approval("clerk", 1, ApproverRule::user("ana")).gated(AmountGate::below(dec!(100)));
    let cfo = WorkflowStep::approval("cfo", 1, ApproverRule::user("cfo")).gated(AmountGate::at_least(dec!(100)));
    engine.save_definition(&WorkflowDefinition::new("d", DocumentType::PaymentVoucher).with_step(clerk)
                                                                                      .with_step(cfo))
          .unwrap();
    let mut sub = submission(DocumentType::PaymentVoucher, 42, dec!(50), None);
    sub.original_amount = dec!(100);
    sub.exchange_rate = dec!(3);
    sub.currency_id = 2;

    let err = engine.open_instance(&sub).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(engine.instance_for_document(sub.document).unwrap().is_none());

    sub.amount_in_base = dec!(300);
    let inst = engine.open_instance(&sub).unwrap();
    let actions = engine.actions(inst.id).unwrap();
    assert_eq!(actions.len(), 1);
    assert!(matches!(engine.approve(inst.id, actions[0].step_id, "ana").unwrap_err(),
                     EngineError::Authorization { .. }));
    let entry = engine.approve(inst.id, actions[0].step_id, "cfo").unwrap().journal_entry.unwrap();
    assert_eq!(entry.total_debit, dec!(300));
}

#[test]
fn branch_step_without_document_branch_fails_open() {
    let (engine, _) = engine();
    let step = WorkflowStep::approval("branch", 1, ApproverRule::branch(None));
    engine.save_definition(&WorkflowDefinition::new("d", DocumentType::ReceiptVoucher).with_step(step.clone()))
          .unwrap();

    let sub = submission(DocumentType::ReceiptVoucher, 5, dec!(20), None);
    let err = engine.open_instance(&sub).unwrap_err();
    assert!(matches!(err, EngineError::Configuration(ConfigurationError::NoApplicableStep { .. })));
    assert!(engine.instance_for_document(sub.document).unwrap().is_none());
    assert!(engine.pending_actions_for("branch1-user").unwrap().is_empty());

    let sub = submission(DocumentType::ReceiptVoucher, 6, dec!(20), Some(1));
    let inst = engine.open_instance(&sub).unwrap();
    let out = engine.approve(inst.id, step.id, "branch1-user").unwrap();
    assert_eq!(out.instance.status, InstanceStatus::Approved);
}
