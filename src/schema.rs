// Sentinel schema - Investigation tables for Diesel ORM

diesel::table! {
    audit_logs (event_id) {
        event_id -> Text,
        created_at -> Text,
        payload_json -> Text,
    }
}

diesel::table! {
    agent_traces (id) {
        id -> Integer,
        event_id -> Text,
        agent_role -> Text,
        status -> Text,
        output_json -> Text,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(audit_logs, agent_traces);
