//! Esquema Diesel (escrito a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    workflow_definitions (id) {
        id -> Uuid,
        name -> Text,
        document_type -> Text,
        branch_id -> Nullable<BigInt>,
        active -> Bool,
        approval_mode -> Text,
        root_connector -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_steps (id) {
        id -> Uuid,
        definition_id -> Uuid,
        parent_id -> Nullable<Uuid>,
        position -> Integer,
        step_order -> Integer,
        name -> Text,
        step_type -> Text,
        min_amount -> Nullable<Numeric>,
        max_amount -> Nullable<Numeric>,
        node -> Jsonb,
    }
}

diesel::table! {
    workflow_instances (id) {
        id -> Uuid,
        definition_id -> Uuid,
        definition_hash -> Text,
        approval_mode -> Text,
        root_connector -> Text,
        steps -> Jsonb,
        document_type -> Text,
        document_id -> BigInt,
        status -> Text,
        current_step_order -> Nullable<Integer>,
        document_amount -> Numeric,
        document_amount_in_base -> Numeric,
        document_currency_id -> BigInt,
        exchange_rate -> Numeric,
        branch_id -> Nullable<BigInt>,
        initiator_id -> Text,
        created_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    workflow_actions (id) {
        id -> Uuid,
        instance_id -> Uuid,
        step_id -> Uuid,
        status -> Text,
        user_id -> Nullable<Text>,
        actioned_at -> Nullable<Timestamptz>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    counters (key, year) {
        key -> Text,
        year -> Integer,
        value -> BigInt,
    }
}

diesel::table! {
    journal_entries (id) {
        id -> Uuid,
        number -> BigInt,
        fiscal_year -> Integer,
        entry_date -> Date,
        status -> Text,
        description -> Text,
        document_type -> Text,
        document_id -> BigInt,
        instance_id -> Uuid,
        currency_id -> BigInt,
        total_debit -> Numeric,
        total_credit -> Numeric,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    journal_entry_lines (id) {
        id -> Uuid,
        entry_id -> Uuid,
        line_no -> Integer,
        account_id -> BigInt,
        debit -> Numeric,
        credit -> Numeric,
        cost_center_id -> Nullable<BigInt>,
        memo -> Nullable<Text>,
    }
}

diesel::table! {
    document_ledger_states (document_type, document_id) {
        document_type -> Text,
        document_id -> BigInt,
        status -> Text,
        journal_entry_id -> Nullable<Uuid>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_events (seq) {
        seq -> BigInt,
        instance_id -> Uuid,
        event_type -> Text,
        payload -> Jsonb,
        ts -> Timestamptz,
    }
}

diesel::joinable!(workflow_steps -> workflow_definitions (definition_id));
diesel::joinable!(workflow_instances -> workflow_definitions (definition_id));
diesel::joinable!(workflow_actions -> workflow_instances (instance_id));
diesel::joinable!(journal_entry_lines -> journal_entries (entry_id));

diesel::allow_tables_to_appear_in_same_query!(
    workflow_definitions,
    workflow_steps,
    workflow_instances,
    workflow_actions,
    counters,
    journal_entries,
    journal_entry_lines,
    document_ledger_states,
    workflow_events,
);
